//! Flow graph construction.
//!
//! Two balancer runs (mining → refining, refining → manufacturing) plus the
//! three production tables become one stage-partitioned graph. Flow that
//! cannot be attributed to declared production is routed through accounting
//! nodes so every column balances visually.

use std::collections::HashMap;

use crate::balance::{balance, Balance};
use crate::config::{FinalStageMode, FlowConfig};
use crate::model::{
    AccountingCategory, FlowGraph, FlowInput, Link, LocationId, NodeKey, NodeRole,
    ProductionTable, Stage,
};
use crate::names::NameRegistry;

/// Quantities at or below this are floating-point noise and produce no link.
pub const EPSILON: f64 = 1e-9;

/// Column a node is drawn in. Accounting nodes follow the configured
/// override; every other role keeps its structural stage.
pub fn resolved_stage(role: &NodeRole, config: &FlowConfig, structural: Stage) -> Stage {
    match role {
        NodeRole::Accounting(category) => config.stage_for(*category),
        _ => structural,
    }
}

// ---------------------------------------------------------------------------
// Layer description
// ---------------------------------------------------------------------------

/// One trade-then-reconcile step between a producing and a consuming stage.
struct Layer<'a> {
    /// Column of the exporting producers (S1 / S3).
    from: Stage,
    /// Column of the importing consumers (S2 / S4).
    to: Stage,
    /// Column after the consumers (S3 / S5).
    after: Stage,
    producers: &'a ProductionTable,
    consumers: &'a ProductionTable,
    split_gaps: bool,
    /// Counts as a genuine producer and supplies consumer shortfalls.
    unknown_source: AccountingCategory,
    from_non_producer: AccountingCategory,
    to_non_consumer: AccountingCategory,
    /// Receives consumer inflow beyond declared use.
    surplus: AccountingCategory,
}

impl Layer<'_> {
    fn is_genuine(&self, exporter: LocationId) -> bool {
        self.producers.contains_key(&exporter) || exporter == self.unknown_source.id()
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

struct GraphBuilder<'a> {
    config: &'a FlowConfig,
    names: &'a NameRegistry,
    graph: FlowGraph,
}

impl<'a> GraphBuilder<'a> {
    fn new(config: &'a FlowConfig, names: &'a NameRegistry) -> Self {
        Self { config, names, graph: FlowGraph::default() }
    }

    fn add_link(
        &mut self,
        src_stage: Stage,
        src: NodeRole,
        tgt_stage: Stage,
        tgt: NodeRole,
        value: f64,
        color: NodeRole,
    ) {
        if !(value > EPSILON) || !value.is_finite() {
            return;
        }

        let source = NodeKey::new(resolved_stage(&src, self.config, src_stage), src);
        let target = NodeKey::new(resolved_stage(&tgt, self.config, tgt_stage), tgt);

        let names = self.names;
        self.graph.nodes.entry(source).or_insert_with(|| names.label(&src));
        self.graph.nodes.entry(target).or_insert_with(|| names.label(&tgt));
        self.graph.links.push(Link { source, target, value, color });

        self.graph.stage_totals.add(source.stage, value);
        self.graph.stage_totals.add(target.stage, value);
    }

    /// Route every balanced trade flow to a consumer node or
    /// an accounting node.
    fn add_trade(&mut self, layer: &Layer<'_>, bal: &Balance) {
        let before = self.graph.links.len();

        for (&exporter, row) in &bal.flow {
            let genuine = layer.is_genuine(exporter);
            let source = NodeRole::classify(exporter);

            let gap_ratio = match bal.missing.get(&exporter) {
                Some(&missing) if genuine && layer.split_gaps && missing > 0.0 => {
                    let total_export: f64 = row.values().filter(|v| **v > EPSILON).sum();
                    if total_export > 0.0 {
                        missing / total_export
                    } else {
                        0.0
                    }
                }
                _ => 0.0,
            };

            for (&importer, &value) in row {
                if value <= EPSILON {
                    continue;
                }
                let consumes = layer.consumers.contains_key(&importer);

                if !genuine {
                    if consumes {
                        let tag = NodeRole::Accounting(layer.from_non_producer);
                        self.add_link(layer.from, tag, layer.to, NodeRole::classify(importer), value, tag);
                    }
                    continue;
                }

                let target = if consumes {
                    NodeRole::classify(importer)
                } else {
                    NodeRole::Accounting(layer.to_non_consumer)
                };

                if gap_ratio > 0.0 {
                    let gap_value = value * gap_ratio;
                    let gap = NodeRole::Gap(exporter);
                    self.add_link(layer.from, source, layer.to, target, value - gap_value, source);
                    self.add_link(layer.from, gap, layer.to, target, gap_value, gap);
                } else {
                    self.add_link(layer.from, source, layer.to, target, value, source);
                }
            }
        }

        log::debug!(
            "trade {} -> {}: {} links from {} exporters",
            layer.from,
            layer.to,
            self.graph.links.len() - before,
            bal.flow.len()
        );
    }

    /// Compare what each consumer received with what it
    /// declares to have used.
    fn add_input_reconciliation(&mut self, layer: &Layer<'_>, bal: &Balance) {
        let inflow = bal.inflow();
        let surplus = NodeRole::Accounting(layer.surplus);
        let shortfall = NodeRole::Accounting(layer.unknown_source);

        for (&consumer, &declared) in layer.consumers {
            let received = inflow.get(&consumer).copied().unwrap_or(0.0);
            let diff = received - declared;
            let node = NodeRole::classify(consumer);
            if diff >= 0.0 {
                self.add_link(layer.to, node, layer.after, surplus, diff, node);
            } else {
                self.add_link(layer.from, shortfall, layer.to, node, -diff, shortfall);
            }
        }
    }

    /// Refined output moves from the refiner's input column to its
    /// output column.
    fn add_production(&mut self, from: Stage, to: Stage, production: &ProductionTable) {
        for (&location, &quantity) in production {
            if quantity > 0.0 {
                let node = NodeRole::classify(location);
                self.add_link(from, node, to, node, quantity, node);
            }
        }
    }

    /// Refiners exporting more than they produced get the excess from
    /// the unaccounted-refining node. Holders without refining production are
    /// already covered by the non-refiner route and are dropped here.
    fn add_unaccounted_refining(&mut self, refining: &ProductionTable, bal: &Balance) {
        let uarp = NodeRole::Accounting(AccountingCategory::Uarp);
        for (&holder, &deficit) in &bal.missing {
            if refining.contains_key(&holder) {
                self.add_link(Stage::S2, uarp, Stage::S3, NodeRole::classify(holder), deficit, uarp);
            }
        }
    }

    /// Final output, either per location or exploded by chemistry.
    fn add_manufacturing_output(&mut self, input: &FlowInput) {
        let by_chemistry = self.config.final_stage_mode == FinalStageMode::ByChemistry;

        for (&location, &declared) in &input.manufacturing {
            if declared <= 0.0 {
                continue;
            }
            let node = NodeRole::classify(location);

            if by_chemistry {
                if let Some(breakdown) = input.chemistry.get(&location) {
                    let breakdown_total: f64 = breakdown.values().sum();
                    if breakdown_total > 0.0 {
                        // Edited totals redistribute proportionally
                        let ratio = declared / breakdown_total;
                        for (&chemistry, &quantity) in breakdown {
                            self.add_link(
                                Stage::S4,
                                node,
                                Stage::S5,
                                NodeRole::Chemistry(chemistry),
                                quantity * ratio,
                                node,
                            );
                        }
                        continue;
                    }
                }
            }

            self.add_link(Stage::S4, node, Stage::S5, node, declared, node);
        }
    }

    /// Invisible flow of `quantity` through all five main stages, used by the
    /// renderer as a scale bar.
    fn add_reference_track(&mut self, quantity: f64) {
        for pair in Stage::MAIN.windows(2) {
            self.add_link(
                pair[0],
                NodeRole::Reference,
                pair[1],
                NodeRole::Reference,
                quantity,
                NodeRole::Reference,
            );
        }
        let last = NodeKey::new(Stage::S5, NodeRole::Reference);
        if let Some(label) = self.graph.nodes.get_mut(&last) {
            *label = format!("{} t", format_thousands(quantity));
        }
    }
}

/// Build the full flow graph. Never fails: inconsistent data shows up as
/// accounting and gap nodes.
pub fn build_graph(input: &FlowInput, config: &FlowConfig, names: &NameRegistry) -> FlowGraph {
    let mining_layer = Layer {
        from: Stage::S1,
        to: Stage::S2,
        after: Stage::S3,
        producers: &input.mining,
        consumers: &input.refining,
        split_gaps: config.mass_balance_split,
        unknown_source: AccountingCategory::Urms,
        from_non_producer: AccountingCategory::Tfcm,
        to_non_consumer: AccountingCategory::Ttcr,
        surplus: AccountingCategory::Ntrm,
    };
    let refining_layer = Layer {
        from: Stage::S3,
        to: Stage::S4,
        after: Stage::S5,
        producers: &input.refining,
        consumers: &input.manufacturing,
        split_gaps: false,
        unknown_source: AccountingCategory::Mrmt,
        from_non_producer: AccountingCategory::Tfcr,
        to_non_consumer: AccountingCategory::Ncpc,
        surplus: AccountingCategory::Nbcp,
    };

    let mining_balance = balance(&input.mining, &input.first_trade);
    let refining_balance = balance(&input.refining, &input.second_trade);

    let mut builder = GraphBuilder::new(config, names);
    builder.add_trade(&mining_layer, &mining_balance);
    builder.add_input_reconciliation(&mining_layer, &mining_balance);
    builder.add_production(Stage::S2, Stage::S3, &input.refining);
    builder.add_trade(&refining_layer, &refining_balance);
    builder.add_unaccounted_refining(&input.refining, &refining_balance);
    builder.add_input_reconciliation(&refining_layer, &refining_balance);
    builder.add_manufacturing_output(input);

    if config.reference_quantity > 0.0 {
        builder.add_reference_track(config.reference_quantity);
    }

    let mut graph = builder.graph;
    graph.mining_deficits = mining_balance.missing;
    graph.refining_deficits = refining_balance.missing;

    log::debug!(
        "graph '{}': {} nodes, {} links",
        config.name,
        graph.nodes.len(),
        graph.links.len()
    );
    graph
}

/// Merge links sharing (source, target), keeping first-appearance order and
/// the first link's color.
pub fn aggregate_links(links: &[Link]) -> Vec<Link> {
    let mut merged: Vec<Link> = Vec::new();
    let mut index: HashMap<(NodeKey, NodeKey), usize> = HashMap::new();

    for link in links {
        match index.get(&(link.source, link.target)) {
            Some(&i) => merged[i].value += link.value,
            None => {
                index.insert((link.source, link.target), merged.len());
                merged.push(link.clone());
            }
        }
    }
    merged
}

fn format_thousands(quantity: f64) -> String {
    let digits = format!("{:.0}", quantity.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if quantity < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}
