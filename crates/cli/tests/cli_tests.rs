// Integration tests for the `mflow` binary: --json stdout contract and exit codes.
//
// Run with: cargo test -p mineflow-cli --test cli_tests -- --nocapture

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn mflow() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_mflow"));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    mflow().args(args).output().expect("run mflow")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("utf-8 temp path")
}

/// A small flow: A mines 100, exports 140 to refiner B; B sells to maker C.
fn write_flow(dir: &TempDir, extra: &str) -> std::path::PathBuf {
    let d = dir.path();
    std::fs::write(d.join("names.csv"), "id,text\n1,Atlantis\n2,Borduria\n3,Carpania\n").unwrap();
    std::fs::write(d.join("mining.csv"), "id,quantity\n1,100\n").unwrap();
    std::fs::write(d.join("refining.csv"), "id,quantity\n2,140\n").unwrap();
    std::fs::write(d.join("manufacturing.csv"), "id,quantity\n3,90\n").unwrap();
    std::fs::write(d.join("trade1.csv"), "exporter,importer,quantity\n1,2,140\n1,2,oops\n").unwrap();
    std::fs::write(d.join("trade2.csv"), "exporter,importer,quantity\n2,3,100\n").unwrap();

    let config = format!(
        r#"name = "test flow"
mass_balance_split = true
reference_quantity = 10.0
{extra}

[inputs]
names = "names.csv"
mining = "mining.csv"
refining = "refining.csv"
manufacturing = "manufacturing.csv"
first_trade = "trade1.csv"
second_trade = "trade2.csv"
"#
    );
    let path = d.join("test.flow.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn assert_single_json(stdout: &[u8]) -> serde_json::Value {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    assert!(!trimmed.is_empty(), "stdout should not be empty");
    serde_json::from_str(trimmed)
        .unwrap_or_else(|e| panic!("stdout must be one JSON value: {e}\n{trimmed}"))
}

// ===========================================================================
// mflow run
// ===========================================================================

#[test]
fn run_json_emits_diagram() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    let output = run(&["run", path_str(&config), "--json"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let val = assert_single_json(&output.stdout);

    assert_eq!(val["meta"]["name"], "test flow");
    assert_eq!(val["meta"]["reference_quantity"], 10.0);
    assert!(val["nodes"].as_array().unwrap().len() > 4);
    assert_eq!(val["mining_deficits"]["1"], 40.0);

    let labels: Vec<&str> = val["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["label"].as_str().unwrap())
        .collect();
    assert!(labels.contains(&"Atlantis"));
    assert!(labels.contains(&"Atlantis (Gap)"));
    assert!(labels.contains(&"10 t"));

    for link in val["links"].as_array().unwrap() {
        let n = val["nodes"].as_array().unwrap().len() as u64;
        assert!(link["source"].as_u64().unwrap() < n);
        assert!(link["target"].as_u64().unwrap() < n);
        assert!(link["value"].as_f64().unwrap() > 0.0);
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("flow 'test flow'"), "stderr: {stderr}");
    assert!(stderr.contains("skipped 1 malformed"), "stderr: {stderr}");
}

#[test]
fn run_without_json_keeps_stdout_empty() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    let output = run(&["run", path_str(&config)]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn run_output_writes_file() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    let out = dir.path().join("diagram.json");
    let output = run(&["run", path_str(&config), "--output", path_str(&out)]);

    assert!(output.status.success());
    let written = std::fs::read_to_string(&out).unwrap();
    let val: serde_json::Value = serde_json::from_str(&written).unwrap();
    assert_eq!(val["meta"]["name"], "test flow");
}

#[test]
fn run_is_deterministic() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    let a = run(&["run", path_str(&config), "--json"]);
    let b = run(&["run", path_str(&config), "--json"]);
    assert_eq!(a.stdout, b.stdout);
}

#[test]
fn run_resolves_inputs_relative_to_config() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    let output = mflow()
        .current_dir(std::env::temp_dir())
        .args(["run", path_str(&config), "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
}

// ===========================================================================
// Exit codes
// ===========================================================================

#[test]
fn invalid_override_exits_60() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "\n[stage_overrides]\nTTCR = \"S4\"\n");
    let output = run(&["run", path_str(&config)]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("stage_overrides"), "stderr: {stderr}");
}

#[test]
fn unparsable_config_exits_60() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.flow.toml");
    std::fs::write(&path, "name = \n").unwrap();
    let output = run(&["validate", path_str(&path)]);
    assert_eq!(output.status.code(), Some(60));
}

#[test]
fn missing_input_file_exits_61() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    std::fs::remove_file(dir.path().join("mining.csv")).unwrap();
    let output = run(&["run", path_str(&config), "--json"]);
    assert_eq!(output.status.code(), Some(61));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("mining.csv"));
}

#[test]
fn missing_column_exits_61() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    std::fs::write(dir.path().join("trade1.csv"), "from,to,quantity\n1,2,5\n").unwrap();
    let output = run(&["run", path_str(&config)]);
    assert_eq!(output.status.code(), Some(61));
    assert!(String::from_utf8_lossy(&output.stderr).contains("missing column"));
}

#[test]
fn missing_config_exits_61() {
    let output = run(&["run", "/nonexistent/flow.toml"]);
    assert_eq!(output.status.code(), Some(61));
}

#[test]
fn bad_arguments_exit_2() {
    let output = run(&["run"]);
    assert_eq!(output.status.code(), Some(2));
}

// ===========================================================================
// mflow validate / inspect
// ===========================================================================

#[test]
fn validate_reports_summary() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "\n[stage_overrides]\nTTCR = \"S1.5\"\n");
    let output = run(&["validate", path_str(&config)]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("valid: flow 'test flow' with 6 input file(s), 1 stage override(s)"), "{stderr}");
}

#[test]
fn inspect_json_lists_totals_and_deficits() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    let output = run(&["inspect", path_str(&config), "--json"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let val = assert_single_json(&output.stdout);
    assert_eq!(val["skipped"], 1);
    let mining = val["mining_deficits"].as_array().unwrap();
    assert_eq!(mining.len(), 1);
    assert_eq!(mining[0]["name"], "Atlantis");
    assert_eq!(mining[0]["quantity"], 40.0);
    assert!(val["stage_totals"]["S1"].as_f64().unwrap() > 0.0);
}

#[test]
fn inspect_text_output() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    let output = run(&["inspect", path_str(&config)]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("flow 'test flow'"));
    assert!(stdout.contains("mining deficits:"));
    assert!(stdout.contains("Atlantis"));
    assert!(stdout.contains("refining deficits: none"));
}

#[test]
fn inspect_legend_lists_every_accounting_category() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    let output = run(&["inspect", path_str(&config), "--json", "--legend"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let val = assert_single_json(&output.stdout);
    let legend = val["legend"].as_array().unwrap();
    assert_eq!(legend.len(), 9);
    let ttcr = legend.iter().find(|e| e["code"] == "TTCR").unwrap();
    assert_eq!(ttcr["id"], 993);
    assert_eq!(ttcr["description"], "Trade to non-refining countries");
    assert_eq!(ttcr["default_stage"], "S2");
    assert_eq!(ttcr["half_stage"], "S1.5");

    let text = run(&["inspect", path_str(&config), "--legend"]);
    let stdout = String::from_utf8_lossy(&text.stdout);
    assert!(stdout.contains("legend:"));
    assert!(stdout.contains("Unknown raw material source"));

    let plain = run(&["inspect", path_str(&config), "--json"]);
    assert!(assert_single_json(&plain.stdout).get("legend").is_none());
}

// ===========================================================================
// mflow names
// ===========================================================================

#[test]
fn names_search_is_case_insensitive() {
    let dir = TempDir::new().unwrap();
    let config = write_flow(&dir, "");
    let output = run(&["names", path_str(&config), "ANIA", "--json"]);
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let val = assert_single_json(&output.stdout);
    let hits = val.as_array().unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0]["id"], 3);
    assert_eq!(hits[0]["name"], "Carpania");

    let text = run(&["names", path_str(&config), "a"]);
    let stdout = String::from_utf8_lossy(&text.stdout);
    assert_eq!(stdout.lines().count(), 3);
    assert!(String::from_utf8_lossy(&text.stderr).contains("3 match(es) for 'a' in 3 name(s)"));
}

#[test]
fn names_without_names_table_exits_61() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bare.flow.toml");
    std::fs::write(&path, "name = \"bare\"\n").unwrap();
    let output = run(&["names", path_str(&path), "x"]);
    assert_eq!(output.status.code(), Some(61));
    assert!(String::from_utf8_lossy(&output.stderr).contains("declares no names table"));
}
