//! Explicit node placement on a unit canvas.
//!
//! Columns are fixed per stage. Node heights are proportional to throughput
//! with one vertical scale shared by every column, chosen so the most crowded
//! column still fits.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{Alignment, FlowConfig, LayoutConfig};
use crate::model::{Link, NodeKey, Stage};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NodePosition {
    pub x: f64,
    /// Vertical center of the node.
    pub y: f64,
    pub weight: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Layout {
    /// Nodes column by column, top to bottom within a column.
    pub order: Vec<NodeKey>,
    pub positions: BTreeMap<NodeKey, NodePosition>,
    /// Flow units → canvas units.
    pub y_scale: f64,
}

/// Horizontal coordinate of a stage column.
pub fn x_position(stage: Stage) -> f64 {
    match stage {
        Stage::S1 => 0.01,
        Stage::S1_5 => 0.13,
        Stage::S2 => 0.25,
        Stage::S2_5 => 0.38,
        Stage::S3 => 0.50,
        Stage::S3_5 => 0.63,
        Stage::S4 => 0.75,
        Stage::S4_5 => 0.88,
        Stage::S5 => 0.99,
    }
}

/// max(inbound, outbound) per node, so pass-through nodes are not counted twice.
pub fn node_weights<'a>(
    nodes: impl IntoIterator<Item = &'a NodeKey>,
    links: &[Link],
) -> BTreeMap<NodeKey, f64> {
    let mut inbound: BTreeMap<NodeKey, f64> = BTreeMap::new();
    let mut outbound: BTreeMap<NodeKey, f64> = BTreeMap::new();
    for link in links {
        *inbound.entry(link.target).or_insert(0.0) += link.value;
        *outbound.entry(link.source).or_insert(0.0) += link.value;
    }

    nodes
        .into_iter()
        .map(|key| {
            let i = inbound.get(key).copied().unwrap_or(0.0);
            let o = outbound.get(key).copied().unwrap_or(0.0);
            (*key, i.max(o))
        })
        .collect()
}

/// Largest scale at which a column of `count` nodes carrying `total` fits.
pub fn column_scale(count: usize, total: f64, params: &LayoutConfig) -> f64 {
    let gaps = count.saturating_sub(1) as f64 * params.gap;
    let usable = (params.usable_fraction - gaps).max(params.min_usable);
    if total > 0.0 {
        usable / total
    } else {
        1.0
    }
}

/// Sort tier inside a column: explicit names, then ordinary nodes, then
/// accounting nodes, then the reference track.
fn rank(key: &NodeKey, label: &str, explicit: &[String]) -> (u8, usize) {
    if key.role.is_reference() {
        return (3, 0);
    }
    if let Some(index) = explicit.iter().position(|name| name == label) {
        return (0, index);
    }
    if key.role.is_accounting() {
        (2, 0)
    } else {
        (1, 0)
    }
}

/// Place every node. Labels drive the explicit ordering; names in
/// `explicit_order` that match nothing are ignored.
pub fn compute_layout(
    labels: &BTreeMap<NodeKey, String>,
    links: &[Link],
    config: &FlowConfig,
) -> Layout {
    let params = &config.layout;
    let weights = node_weights(labels.keys(), links);

    let mut columns: BTreeMap<Stage, Vec<NodeKey>> = BTreeMap::new();
    for key in labels.keys() {
        columns.entry(key.stage).or_default().push(*key);
    }

    let weight = |key: &NodeKey| weights.get(key).copied().unwrap_or(0.0);

    let y_scale = columns
        .values()
        .map(|nodes| {
            let total: f64 = nodes.iter().map(weight).sum();
            column_scale(nodes.len(), total, params)
        })
        .fold(f64::INFINITY, f64::min);
    let y_scale = if y_scale.is_finite() { y_scale } else { 1.0 };

    let column_count = columns.len();
    let mut layout = Layout { y_scale, ..Default::default() };
    let no_order: Vec<String> = Vec::new();

    for (stage, mut nodes) in columns {
        let explicit = config.explicit_order.get(&stage).unwrap_or(&no_order);
        let label = |key: &NodeKey| labels.get(key).map(String::as_str).unwrap_or("");

        nodes.sort_by(|a, b| {
            rank(a, label(a), explicit)
                .cmp(&rank(b, label(b), explicit))
                .then_with(|| weight(b).partial_cmp(&weight(a)).unwrap_or(Ordering::Equal))
                .then_with(|| a.cmp(b))
        });

        let mut y = match config.alignment_for(stage) {
            Alignment::Top => params.top_margin,
            Alignment::Bottom => {
                let stacked: f64 = nodes.iter().map(|n| weight(n) * y_scale).sum::<f64>()
                    + nodes.len().saturating_sub(1) as f64 * params.gap;
                (params.bottom_margin - stacked).max(params.top_margin)
            }
        };

        let x = x_position(stage);
        for key in &nodes {
            let w = weight(key);
            let height = w * y_scale;
            layout.positions.insert(
                *key,
                NodePosition { x, y: y + height / 2.0, weight: w, height },
            );
            y += height + params.gap;
        }
        layout.order.extend(nodes);
    }

    log::debug!(
        "layout: {} nodes in {} columns, y_scale {:.3e}",
        layout.order.len(),
        column_count,
        y_scale
    );
    layout
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AccountingCategory, NodeRole};

    fn loc(stage: Stage, id: u32) -> NodeKey {
        NodeKey::new(stage, NodeRole::Location(id))
    }

    fn link(source: NodeKey, target: NodeKey, value: f64) -> Link {
        Link { source, target, value, color: source.role }
    }

    fn labels_for(links: &[Link]) -> BTreeMap<NodeKey, String> {
        let mut labels = BTreeMap::new();
        for l in links {
            for key in [l.source, l.target] {
                let label = match key.role {
                    NodeRole::Location(id) => format!("L{id}"),
                    NodeRole::Accounting(c) => c.code().to_string(),
                    _ => String::new(),
                };
                labels.insert(key, label);
            }
        }
        labels
    }

    #[test]
    fn weight_is_max_of_in_and_out() {
        let a = loc(Stage::S1, 1);
        let b = loc(Stage::S2, 2);
        let c = loc(Stage::S3, 3);
        let links = vec![link(a, b, 10.0), link(b, c, 4.0), link(a, c, 1.0)];
        let weights = node_weights([a, b, c].iter(), &links);
        assert_eq!(weights[&a], 11.0);
        assert_eq!(weights[&b], 10.0);
        assert_eq!(weights[&c], 5.0);
    }

    #[test]
    fn fixed_column_positions() {
        assert_eq!(x_position(Stage::S1), 0.01);
        assert_eq!(x_position(Stage::S3), 0.50);
        assert_eq!(x_position(Stage::S5), 0.99);
        let xs: Vec<f64> = Stage::ALL.iter().map(|s| x_position(*s)).collect();
        assert!(xs.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn column_scale_reserves_gaps_and_floors() {
        let params = LayoutConfig::default();
        assert!((column_scale(1, 95.0, &params) - 0.01).abs() < 1e-12);
        assert!((column_scale(3, 91.0, &params) - 0.91 / 91.0).abs() < 1e-12);
        assert_eq!(column_scale(4, 0.0, &params), 1.0);
        // 100 nodes: gaps alone exceed the canvas
        assert!((column_scale(100, 10.0, &params) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn crowded_column_sets_global_scale() {
        let a = loc(Stage::S1, 1);
        let b = loc(Stage::S2, 2);
        let c = loc(Stage::S2, 3);
        let links = vec![link(a, b, 50.0), link(a, c, 50.0)];
        let layout = compute_layout(&labels_for(&links), &links, &FlowConfig::default());
        // S1: 0.95 / 100, S2: 0.93 / 100
        assert!((layout.y_scale - 0.0093).abs() < 1e-12);
    }

    #[test]
    fn ordering_explicit_then_weight_then_accounting() {
        let src = loc(Stage::S1, 1);
        let big = loc(Stage::S2, 2);
        let small = loc(Stage::S2, 3);
        let pinned = loc(Stage::S2, 4);
        let ttcr = NodeKey::new(Stage::S2, NodeRole::Accounting(AccountingCategory::Ttcr));
        let reference = NodeKey::new(Stage::S2, NodeRole::Reference);
        let links = vec![
            link(src, ttcr, 100.0),
            link(src, small, 5.0),
            link(src, big, 30.0),
            link(src, pinned, 1.0),
            link(NodeKey::new(Stage::S1, NodeRole::Reference), reference, 1.0),
        ];
        let mut config = FlowConfig::default();
        config.explicit_order.insert(Stage::S2, vec!["L4".into(), "missing name".into()]);
        let layout = compute_layout(&labels_for(&links), &links, &config);

        let column: Vec<NodeKey> =
            layout.order.iter().copied().filter(|k| k.stage == Stage::S2).collect();
        assert_eq!(column, vec![pinned, big, small, ttcr, reference]);
    }

    #[test]
    fn explicit_order_can_lift_accounting_nodes() {
        let src = loc(Stage::S1, 1);
        let other = loc(Stage::S2, 2);
        let ttcr = NodeKey::new(Stage::S2, NodeRole::Accounting(AccountingCategory::Ttcr));
        let links = vec![link(src, other, 10.0), link(src, ttcr, 1.0)];
        let mut config = FlowConfig::default();
        config.explicit_order.insert(Stage::S2, vec!["TTCR".into()]);
        let layout = compute_layout(&labels_for(&links), &links, &config);
        let column: Vec<NodeKey> =
            layout.order.iter().copied().filter(|k| k.stage == Stage::S2).collect();
        assert_eq!(column, vec![ttcr, other]);
    }

    #[test]
    fn top_alignment_stacks_without_overlap() {
        let src = loc(Stage::S1, 1);
        let links: Vec<Link> = (2..6).map(|id| link(src, loc(Stage::S2, id), id as f64)).collect();
        let config = FlowConfig::default();
        let layout = compute_layout(&labels_for(&links), &links, &config);

        let mut column: Vec<NodePosition> = layout
            .order
            .iter()
            .filter(|k| k.stage == Stage::S2)
            .map(|k| layout.positions[k])
            .collect();
        column.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap());
        assert!((column[0].y - column[0].height / 2.0 - 0.01).abs() < 1e-12);
        for pair in column.windows(2) {
            let prev_bottom = pair[0].y + pair[0].height / 2.0;
            let top = pair[1].y - pair[1].height / 2.0;
            assert!(top >= prev_bottom + config.layout.gap - 1e-9);
        }
    }

    #[test]
    fn bottom_alignment_pins_column_to_bottom() {
        let src = loc(Stage::S1, 1);
        let ntrm = NodeKey::new(Stage::S2_5, NodeRole::Accounting(AccountingCategory::Ntrm));
        let links = vec![link(src, loc(Stage::S2, 2), 90.0), link(loc(Stage::S2, 2), ntrm, 10.0)];
        let mut config = FlowConfig::default();
        config.alignment.insert(Stage::S2_5, Alignment::Bottom);
        let layout = compute_layout(&labels_for(&links), &links, &config);

        let p = layout.positions[&ntrm];
        assert!((p.y + p.height / 2.0 - 0.99).abs() < 1e-12);
        assert_eq!(p.x, 0.38);
    }

    #[test]
    fn bottom_alignment_never_rises_above_top_margin() {
        let src = loc(Stage::S1, 1);
        let links: Vec<Link> = (2..80).map(|id| link(src, loc(Stage::S2, id), 1.0)).collect();
        let mut config = FlowConfig::default();
        config.alignment.insert(Stage::S2, Alignment::Bottom);
        let layout = compute_layout(&labels_for(&links), &links, &config);
        let first = layout.order.iter().find(|k| k.stage == Stage::S2).unwrap();
        let p = layout.positions[first];
        assert!((p.y - p.height / 2.0 - 0.01).abs() < 1e-12);
    }

    #[test]
    fn positions_stay_on_canvas() {
        let src = loc(Stage::S1, 1);
        let links: Vec<Link> = (2..12)
            .map(|id| link(src, loc(Stage::S2, id), (id * id) as f64))
            .collect();
        let layout = compute_layout(&labels_for(&links), &links, &FlowConfig::default());
        for p in layout.positions.values() {
            assert!(p.y >= 0.0 && p.y <= 1.0);
            assert!(p.y + p.height / 2.0 <= 1.0 + 1e-12);
        }
    }

    #[test]
    fn empty_graph_has_unit_scale() {
        let layout = compute_layout(&BTreeMap::new(), &[], &FlowConfig::default());
        assert!(layout.order.is_empty());
        assert_eq!(layout.y_scale, 1.0);
    }
}
