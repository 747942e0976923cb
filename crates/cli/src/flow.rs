//! `mflow run | validate | inspect | names`: config-driven flow diagrams.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use mineflow::ingest::{load_inputs, load_names, LoadedInput};
use mineflow::model::{AccountingCategory, LocationId, Stage};
use mineflow::{FlowConfig, FlowError, NameRegistry};
use serde::Serialize;

use crate::exit_codes::{flow_exit_code, EXIT_ERROR, EXIT_FLOW_INPUT};
use crate::CliError;

fn flow_err(err: FlowError) -> CliError {
    CliError { code: flow_exit_code(&err), message: err.to_string(), hint: None }
}

fn io_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

/// Read and validate the config, then load every input file it names.
/// Input paths resolve against the config file's directory.
fn load(config_path: &Path) -> Result<(FlowConfig, LoadedInput), CliError> {
    let config = read_config(config_path)?;
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let loaded = load_inputs(&config.inputs, base_dir).map_err(flow_err)?;

    tracing::debug!(
        rows = loaded.report.rows,
        skipped = loaded.report.skipped,
        "loaded inputs for '{}'",
        config.name
    );
    Ok((config, loaded))
}

fn read_config(config_path: &Path) -> Result<FlowConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| io_err(EXIT_FLOW_INPUT, format!("cannot read config: {e}")))?;
    FlowConfig::from_toml(&config_str).map_err(|e| {
        let mut err = flow_err(e);
        err.hint = Some(format!("check {}", config_path.display()));
        err
    })
}

pub fn cmd_run(config_path: PathBuf, json_output: bool, output_file: Option<PathBuf>) -> Result<(), CliError> {
    let (config, loaded) = load(&config_path)?;
    let diagram = mineflow::run(&config, &loaded.input, &loaded.names);

    let json_str = serde_json::to_string_pretty(&diagram)
        .map_err(|e| io_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;

    if let Some(ref path) = output_file {
        std::fs::write(path, &json_str)
            .map_err(|e| io_err(EXIT_ERROR, format!("cannot write output: {e}")))?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        println!("{json_str}");
    }

    if loaded.report.skipped > 0 {
        eprintln!("note: skipped {} malformed input row(s)", loaded.report.skipped);
    }
    eprintln!(
        "flow '{}': {} nodes, {} links, {} mining deficit(s), {} refining deficit(s)",
        diagram.meta.name,
        diagram.nodes.len(),
        diagram.links.len(),
        diagram.mining_deficits.len(),
        diagram.refining_deficits.len(),
    );
    Ok(())
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let inputs = &config.inputs;
    let declared = [
        &inputs.names,
        &inputs.mining,
        &inputs.refining,
        &inputs.manufacturing,
        &inputs.chemistry,
        &inputs.first_trade,
        &inputs.second_trade,
    ]
    .iter()
    .filter(|f| f.is_some())
    .count();

    eprintln!(
        "valid: flow '{}' with {} input file(s), {} stage override(s)",
        config.name,
        declared,
        config.stage_overrides.len(),
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// inspect
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct Deficit {
    id: LocationId,
    name: String,
    quantity: f64,
}

#[derive(Serialize)]
struct LegendEntry {
    code: &'static str,
    id: LocationId,
    description: &'static str,
    default_stage: Stage,
    half_stage: Stage,
}

#[derive(Serialize)]
struct InspectReport {
    name: String,
    stage_totals: BTreeMap<Stage, f64>,
    mining_deficits: Vec<Deficit>,
    refining_deficits: Vec<Deficit>,
    rows: usize,
    skipped: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    legend: Option<Vec<LegendEntry>>,
}

fn legend() -> Vec<LegendEntry> {
    AccountingCategory::ALL
        .iter()
        .map(|c| LegendEntry {
            code: c.code(),
            id: c.id(),
            description: c.description(),
            default_stage: c.default_stage(),
            half_stage: c.half_stage(),
        })
        .collect()
}

fn deficits(table: &BTreeMap<LocationId, f64>, names: &NameRegistry) -> Vec<Deficit> {
    table
        .iter()
        .map(|(&id, &quantity)| Deficit { id, name: names.location_name(id), quantity })
        .collect()
}

pub fn cmd_inspect(config_path: PathBuf, json_output: bool, with_legend: bool) -> Result<(), CliError> {
    let (config, loaded) = load(&config_path)?;
    let graph = mineflow::build_graph(&loaded.input, &config, &loaded.names);

    let report = InspectReport {
        name: config.name.clone(),
        stage_totals: graph.stage_totals.iter().collect(),
        mining_deficits: deficits(&graph.mining_deficits, &loaded.names),
        refining_deficits: deficits(&graph.refining_deficits, &loaded.names),
        rows: loaded.report.rows,
        skipped: loaded.report.skipped,
        legend: with_legend.then(legend),
    };

    if json_output {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| io_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
        return Ok(());
    }

    println!("flow '{}' ({} rows, {} skipped)", report.name, report.rows, report.skipped);
    println!();
    println!("{:<6} {:>16}", "stage", "total");
    for stage in Stage::ALL {
        if let Some(total) = report.stage_totals.get(&stage) {
            println!("{:<6} {:>16.2}", stage.label(), total);
        }
    }
    for (title, rows) in [
        ("mining deficits", &report.mining_deficits),
        ("refining deficits", &report.refining_deficits),
    ] {
        println!();
        if rows.is_empty() {
            println!("{title}: none");
            continue;
        }
        println!("{title}:");
        for d in rows {
            println!("  {:<24} {:>14.2}", d.name, d.quantity);
        }
    }
    if let Some(ref entries) = report.legend {
        println!();
        println!("legend:");
        for e in entries {
            println!(
                "  {:<5} {:>4}  {:<40} {} / {}",
                e.code, e.id, e.description, e.default_stage, e.half_stage
            );
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// names
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct NameHit<'a> {
    id: LocationId,
    name: &'a str,
}

pub fn cmd_names(config_path: PathBuf, query: &str, json_output: bool) -> Result<(), CliError> {
    let config = read_config(&config_path)?;
    let Some(ref rel) = config.inputs.names else {
        return Err(CliError {
            code: EXIT_FLOW_INPUT,
            message: format!("flow '{}' declares no names table", config.name),
            hint: Some("add `names = \"names.csv\"` under [inputs]".into()),
        });
    };

    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let path = base_dir.join(rel);
    let csv_data = std::fs::read_to_string(&path)
        .map_err(|e| io_err(EXIT_FLOW_INPUT, format!("cannot read {}: {e}", path.display())))?;
    let (names, _) = load_names(&csv_data).map_err(flow_err)?;

    let hits: Vec<NameHit> = names
        .search(query)
        .into_iter()
        .map(|(id, name)| NameHit { id, name })
        .collect();

    if json_output {
        let json_str = serde_json::to_string_pretty(&hits)
            .map_err(|e| io_err(EXIT_ERROR, format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    } else {
        for hit in &hits {
            println!("{:>6}  {}", hit.id, hit.name);
        }
    }
    eprintln!("{} match(es) for '{}' in {} name(s)", hits.len(), query, names.len());
    Ok(())
}
