//! CSV loaders for production, chemistry, trade and name tables.
//!
//! Missing columns are errors. Individual rows with unusable ids or
//! quantities are skipped and counted, so one bad record never discards a
//! whole table.

use std::path::Path;

use crate::config::InputFiles;
use crate::error::FlowError;
use crate::model::{ChemistryBreakdown, ChemistryCategory, FlowInput, LocationId, ProductionTable, TradeRecord};
use crate::names::NameRegistry;

/// Rows accepted and skipped while loading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub rows: usize,
    pub skipped: usize,
}

impl IngestReport {
    pub fn merge(&mut self, other: IngestReport) {
        self.rows += other.rows;
        self.skipped += other.skipped;
    }
}

struct Table {
    name: String,
    headers: Vec<String>,
    reader: csv::Reader<std::io::Cursor<Vec<u8>>>,
}

impl Table {
    fn open(name: &str, csv_data: &str) -> Result<Self, FlowError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(std::io::Cursor::new(csv_data.as_bytes().to_vec()));

        let headers = reader.headers()?.iter().map(|h| h.to_string()).collect();
        Ok(Self { name: name.to_string(), headers, reader })
    }

    fn column(&self, column: &str) -> Result<usize, FlowError> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(column))
            .ok_or_else(|| FlowError::MissingColumn {
                table: self.name.clone(),
                column: column.into(),
            })
    }

    /// Visit every row; `parse` returning `None` counts the row as skipped.
    fn for_each_row<F>(&mut self, mut parse: F) -> IngestReport
    where
        F: FnMut(&csv::StringRecord) -> Option<()>,
    {
        let mut report = IngestReport::default();
        for (line, record) in self.reader.records().enumerate() {
            let accepted = match record {
                Ok(record) => parse(&record).is_some(),
                Err(e) => {
                    log::warn!("{}: row {}: {e}", self.name, line + 1);
                    false
                }
            };
            if accepted {
                report.rows += 1;
            } else {
                report.skipped += 1;
                log::warn!("{}: skipping row {}", self.name, line + 1);
            }
        }
        report
    }
}

/// Accepts `156` as well as spreadsheet-style `156.0`.
pub fn parse_id(field: &str) -> Option<LocationId> {
    let field = field.trim();
    if let Ok(id) = field.parse::<LocationId>() {
        return Some(id);
    }
    let value: f64 = field.parse().ok()?;
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= LocationId::MAX as f64 {
        Some(value as LocationId)
    } else {
        None
    }
}

/// Finite quantity, thousands separators allowed.
pub fn parse_quantity(field: &str) -> Option<f64> {
    let cleaned: String = field.trim().chars().filter(|c| *c != ',').collect();
    let value: f64 = cleaned.parse().ok()?;
    value.is_finite().then_some(value)
}

/// `id,text` reference list.
pub fn load_names(csv_data: &str) -> Result<(NameRegistry, IngestReport), FlowError> {
    let mut table = Table::open("names", csv_data)?;
    let id_idx = table.column("id")?;
    let text_idx = table.column("text")?;

    let mut names = NameRegistry::new();
    let report = table.for_each_row(|record| {
        let id = parse_id(record.get(id_idx)?)?;
        let text = record.get(text_idx)?;
        if text.is_empty() {
            return None;
        }
        names.insert(id, text);
        Some(())
    });
    Ok((names, report))
}

/// `id,quantity` production table. Repeated ids sum.
pub fn load_production(name: &str, csv_data: &str) -> Result<(ProductionTable, IngestReport), FlowError> {
    let mut table = Table::open(name, csv_data)?;
    let id_idx = table.column("id")?;
    let qty_idx = table.column("quantity")?;

    let mut production = ProductionTable::new();
    let report = table.for_each_row(|record| {
        let id = parse_id(record.get(id_idx)?)?;
        let quantity = parse_quantity(record.get(qty_idx)?)?;
        *production.entry(id).or_insert(0.0) += quantity;
        Some(())
    });
    Ok((production, report))
}

/// `id,chemistry,quantity` manufacturing breakdown (NCM / NCA / LFP).
pub fn load_chemistry(csv_data: &str) -> Result<(ChemistryBreakdown, IngestReport), FlowError> {
    let mut table = Table::open("chemistry", csv_data)?;
    let id_idx = table.column("id")?;
    let chem_idx = table.column("chemistry")?;
    let qty_idx = table.column("quantity")?;

    let mut breakdown = ChemistryBreakdown::new();
    let report = table.for_each_row(|record| {
        let id = parse_id(record.get(id_idx)?)?;
        let chemistry: ChemistryCategory = record.get(chem_idx)?.parse().ok()?;
        let quantity = parse_quantity(record.get(qty_idx)?)?;
        *breakdown.entry(id).or_default().entry(chemistry).or_insert(0.0) += quantity;
        Some(())
    });
    Ok((breakdown, report))
}

/// Manufacturing totals implied by a chemistry breakdown.
pub fn breakdown_totals(breakdown: &ChemistryBreakdown) -> ProductionTable {
    breakdown
        .iter()
        .map(|(id, parts)| (*id, parts.values().sum()))
        .collect()
}

/// `exporter,importer,quantity` trade records. Id 0 marks unallocated
/// partners and is skipped.
pub fn load_trade(name: &str, csv_data: &str) -> Result<(Vec<TradeRecord>, IngestReport), FlowError> {
    let mut table = Table::open(name, csv_data)?;
    let exp_idx = table.column("exporter")?;
    let imp_idx = table.column("importer")?;
    let qty_idx = table.column("quantity")?;

    let mut trades = Vec::new();
    let report = table.for_each_row(|record| {
        let exporter = parse_id(record.get(exp_idx)?)?;
        let importer = parse_id(record.get(imp_idx)?)?;
        if exporter == 0 || importer == 0 {
            return None;
        }
        let quantity = parse_quantity(record.get(qty_idx)?)?;
        trades.push(TradeRecord::new(exporter, importer, quantity));
        Some(())
    });
    Ok((trades, report))
}

/// Everything a run needs, read from the files named in `[inputs]`.
#[derive(Debug, Default)]
pub struct LoadedInput {
    pub input: FlowInput,
    pub names: NameRegistry,
    pub report: IngestReport,
}

/// Load every configured input relative to `base_dir`. Absent entries yield
/// empty tables.
pub fn load_inputs(files: &InputFiles, base_dir: &Path) -> Result<LoadedInput, FlowError> {
    let read = |file: &Option<String>| -> Result<Option<String>, FlowError> {
        match file {
            Some(rel) => {
                let path = base_dir.join(rel);
                std::fs::read_to_string(&path).map(Some).map_err(|source| FlowError::ReadFile {
                    path: path.display().to_string(),
                    source,
                })
            }
            None => Ok(None),
        }
    };

    let mut loaded = LoadedInput::default();

    if let Some(data) = read(&files.names)? {
        let (names, report) = load_names(&data)?;
        loaded.names = names;
        loaded.report.merge(report);
    }
    if let Some(data) = read(&files.mining)? {
        let (table, report) = load_production("mining", &data)?;
        loaded.input.mining = table;
        loaded.report.merge(report);
    }
    if let Some(data) = read(&files.refining)? {
        let (table, report) = load_production("refining", &data)?;
        loaded.input.refining = table;
        loaded.report.merge(report);
    }
    if let Some(data) = read(&files.chemistry)? {
        let (breakdown, report) = load_chemistry(&data)?;
        loaded.input.chemistry = breakdown;
        loaded.report.merge(report);
    }
    match read(&files.manufacturing)? {
        Some(data) => {
            let (table, report) = load_production("manufacturing", &data)?;
            loaded.input.manufacturing = table;
            loaded.report.merge(report);
        }
        None => loaded.input.manufacturing = breakdown_totals(&loaded.input.chemistry),
    }
    if let Some(data) = read(&files.first_trade)? {
        let (trades, report) = load_trade("first_trade", &data)?;
        loaded.input.first_trade = trades;
        loaded.report.merge(report);
    }
    if let Some(data) = read(&files.second_trade)? {
        let (trades, report) = load_trade("second_trade", &data)?;
        loaded.input.second_trade = trades;
        loaded.report.merge(report);
    }

    log::debug!(
        "loaded {} rows ({} skipped): {} miners, {} refiners, {} manufacturers, {}+{} trade records",
        loaded.report.rows,
        loaded.report.skipped,
        loaded.input.mining.len(),
        loaded.input.refining.len(),
        loaded.input.manufacturing.len(),
        loaded.input.first_trade.len(),
        loaded.input.second_trade.len()
    );
    Ok(loaded)
}
