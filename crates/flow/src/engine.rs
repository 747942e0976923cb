use std::collections::HashMap;

use crate::config::FlowConfig;
use crate::graph::{aggregate_links, build_graph};
use crate::layout::compute_layout;
use crate::model::{Diagram, DiagramLink, DiagramMeta, DiagramNode, FlowInput, NodeKey, StageTotals};
use crate::names::NameRegistry;

/// Build, aggregate and lay out the flow diagram for one material and period.
pub fn run(config: &FlowConfig, input: &FlowInput, names: &NameRegistry) -> Diagram {
    let graph = build_graph(input, config, names);
    let links = aggregate_links(&graph.links);
    let layout = compute_layout(&graph.nodes, &links, config);

    let index: HashMap<NodeKey, usize> = layout
        .order
        .iter()
        .enumerate()
        .map(|(i, key)| (*key, i))
        .collect();

    let nodes = layout
        .order
        .iter()
        .map(|key| {
            let position = layout.positions[key];
            DiagramNode {
                key: *key,
                stage_key: key.stage_key(),
                label: graph.nodes.get(key).cloned().unwrap_or_default(),
                x: position.x,
                y: position.y,
                weight: position.weight,
                height: position.height,
                color: key.role,
            }
        })
        .collect();

    let links = links
        .iter()
        .map(|link| DiagramLink {
            source: index[&link.source],
            target: index[&link.target],
            value: link.value,
            color: link.color,
        })
        .collect();

    Diagram {
        meta: DiagramMeta {
            name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            reference_quantity: config.reference_quantity,
            y_scale: layout.y_scale,
            canvas_height: canvas_height(&graph.stage_totals, config.reference_quantity),
        },
        nodes,
        links,
        stage_totals: graph.stage_totals,
        mining_deficits: graph.mining_deficits,
        refining_deficits: graph.refining_deficits,
    }
}

/// Suggested pixel height: 50px per reference quantity of the busiest stage
/// plus 200px, at least 600. 800 when there is no reference to scale by.
pub fn canvas_height(totals: &StageTotals, reference_quantity: f64) -> u32 {
    let max_flow = totals.max();
    let height = if reference_quantity > 0.0 && max_flow > 0.0 {
        max_flow / reference_quantity * 50.0 + 200.0
    } else {
        800.0
    };
    height.max(600.0) as u32
}
