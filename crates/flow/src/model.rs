use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;

/// Country/region identifier as it appears in production and trade data.
pub type LocationId = u32;

/// Declared production per location for one stage.
pub type ProductionTable = BTreeMap<LocationId, f64>;

/// Manufacturing output split by cathode chemistry.
pub type ChemistryBreakdown = BTreeMap<LocationId, BTreeMap<ChemistryCategory, f64>>;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Column of the flow diagram. Half stages are detour positions that only
/// accounting nodes can be moved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Stage {
    S1,
    S1_5,
    S2,
    S2_5,
    S3,
    S3_5,
    S4,
    S4_5,
    S5,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::S1,
        Stage::S1_5,
        Stage::S2,
        Stage::S2_5,
        Stage::S3,
        Stage::S3_5,
        Stage::S4,
        Stage::S4_5,
        Stage::S5,
    ];

    /// The five structural stages, in flow order.
    pub const MAIN: [Stage; 5] = [Stage::S1, Stage::S2, Stage::S3, Stage::S4, Stage::S5];

    pub fn label(&self) -> &'static str {
        match self {
            Self::S1 => "S1",
            Self::S1_5 => "S1.5",
            Self::S2 => "S2",
            Self::S2_5 => "S2.5",
            Self::S3 => "S3",
            Self::S3_5 => "S3.5",
            Self::S4 => "S4",
            Self::S4_5 => "S4.5",
            Self::S5 => "S5",
        }
    }

    pub fn is_half(&self) -> bool {
        matches!(self, Self::S1_5 | Self::S2_5 | Self::S3_5 | Self::S4_5)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Stage {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Stage::ALL
            .iter()
            .copied()
            .find(|stage| stage.label() == s.trim())
            .ok_or_else(|| FlowError::UnknownStage(s.to_string()))
    }
}

impl TryFrom<String> for Stage {
    type Error = FlowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Stage> for String {
    fn from(stage: Stage) -> Self {
        stage.label().to_string()
    }
}

// ---------------------------------------------------------------------------
// Accounting categories
// ---------------------------------------------------------------------------

/// Synthetic nodes that absorb flow which cannot be attributed to declared
/// production.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AccountingCategory {
    /// Trade from non-mining country.
    Tfcm,
    /// Trade from non-refining country.
    Tfcr,
    /// Trade to non-refining country.
    Ttcr,
    /// Unaccounted refining production.
    Uarp,
    /// Unknown raw material source.
    Urms,
    /// Missing refined trade.
    Mrmt,
    /// Unaccounted raw materials.
    Ntrm,
    /// Trade to country without production.
    Ncpc,
    /// Non-battery cathode products.
    Nbcp,
}

impl AccountingCategory {
    pub const ALL: [AccountingCategory; 9] = [
        Self::Tfcm,
        Self::Tfcr,
        Self::Ttcr,
        Self::Uarp,
        Self::Urms,
        Self::Mrmt,
        Self::Ntrm,
        Self::Ncpc,
        Self::Nbcp,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Tfcm => "TFCM",
            Self::Tfcr => "TFCR",
            Self::Ttcr => "TTCR",
            Self::Uarp => "UARP",
            Self::Urms => "URMS",
            Self::Mrmt => "MRMT",
            Self::Ntrm => "NTRM",
            Self::Ncpc => "NCPC",
            Self::Nbcp => "NBCP",
        }
    }

    pub fn id(&self) -> LocationId {
        match self {
            Self::Tfcm => 991,
            Self::Tfcr => 992,
            Self::Ttcr => 993,
            Self::Uarp => 994,
            Self::Urms => 995,
            Self::Mrmt => 996,
            Self::Ntrm => 997,
            Self::Ncpc => 998,
            Self::Nbcp => 999,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Self::Tfcm => "Trade from non-mining countries",
            Self::Tfcr => "Trade from non-refining countries",
            Self::Ttcr => "Trade to non-refining countries",
            Self::Uarp => "Unaccounted refining production",
            Self::Urms => "Unknown raw material source",
            Self::Mrmt => "Missing refined trade",
            Self::Ntrm => "Unaccounted raw materials",
            Self::Ncpc => "Trade to countries without production",
            Self::Nbcp => "Non-battery cathode products",
        }
    }

    /// Column the category occupies unless redirected.
    pub fn default_stage(&self) -> Stage {
        match self {
            Self::Tfcm | Self::Urms => Stage::S1,
            Self::Ttcr | Self::Uarp => Stage::S2,
            Self::Tfcr | Self::Mrmt | Self::Ntrm => Stage::S3,
            Self::Ncpc => Stage::S4,
            Self::Nbcp => Stage::S5,
        }
    }

    /// The only alternative column the category may be redirected to.
    pub fn half_stage(&self) -> Stage {
        match self {
            Self::Tfcm | Self::Ttcr | Self::Urms => Stage::S1_5,
            Self::Uarp | Self::Ntrm => Stage::S2_5,
            Self::Tfcr | Self::Mrmt | Self::Ncpc => Stage::S3_5,
            Self::Nbcp => Stage::S4_5,
        }
    }

    pub fn from_id(id: LocationId) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.id() == id)
    }
}

impl fmt::Display for AccountingCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for AccountingCategory {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| FlowError::UnknownCategory(s.to_string()))
    }
}

impl TryFrom<String> for AccountingCategory {
    type Error = FlowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AccountingCategory> for String {
    fn from(category: AccountingCategory) -> Self {
        category.code().to_string()
    }
}

// ---------------------------------------------------------------------------
// Chemistry categories
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChemistryCategory {
    Ncm,
    Nca,
    Lfp,
}

impl ChemistryCategory {
    pub const ALL: [ChemistryCategory; 3] = [Self::Ncm, Self::Nca, Self::Lfp];

    pub fn code(&self) -> &'static str {
        match self {
            Self::Ncm => "NCM",
            Self::Nca => "NCA",
            Self::Lfp => "LFP",
        }
    }

    pub fn id(&self) -> LocationId {
        match self {
            Self::Ncm => 901,
            Self::Nca => 902,
            Self::Lfp => 903,
        }
    }

    pub fn from_id(id: LocationId) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.id() == id)
    }
}

impl fmt::Display for ChemistryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ChemistryCategory {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.code().eq_ignore_ascii_case(code))
            .ok_or_else(|| FlowError::UnknownCategory(s.to_string()))
    }
}

impl TryFrom<String> for ChemistryCategory {
    type Error = FlowError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ChemistryCategory> for String {
    fn from(category: ChemistryCategory) -> Self {
        category.code().to_string()
    }
}

// ---------------------------------------------------------------------------
// Nodes + links
// ---------------------------------------------------------------------------

/// What a node stands for. Also used as the color attribution of a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum NodeRole {
    Location(LocationId),
    Accounting(AccountingCategory),
    Chemistry(ChemistryCategory),
    /// Unreconciled remainder of a location's exports.
    Gap(LocationId),
    /// Invisible calibration track.
    Reference,
}

impl NodeRole {
    /// Interpret a raw id from trade or production data. Reserved ids map to
    /// their category.
    pub fn classify(id: LocationId) -> Self {
        if let Some(category) = AccountingCategory::from_id(id) {
            Self::Accounting(category)
        } else if let Some(chemistry) = ChemistryCategory::from_id(id) {
            Self::Chemistry(chemistry)
        } else {
            Self::Location(id)
        }
    }

    pub fn is_accounting(&self) -> bool {
        matches!(self, Self::Accounting(_))
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, Self::Reference)
    }
}

/// Stage-qualified node identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeKey {
    pub stage: Stage,
    pub role: NodeRole,
}

impl NodeKey {
    pub fn new(stage: Stage, role: NodeRole) -> Self {
        Self { stage, role }
    }

    /// Stage label as handed to the renderer; reference nodes carry a
    /// `REF_` prefix.
    pub fn stage_key(&self) -> String {
        if self.role.is_reference() {
            format!("REF_{}", self.stage)
        } else {
            self.stage.label().to_string()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Link {
    pub source: NodeKey,
    pub target: NodeKey,
    pub value: f64,
    pub color: NodeRole,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub exporter: LocationId,
    pub importer: LocationId,
    pub quantity: f64,
}

impl TradeRecord {
    pub fn new(exporter: LocationId, importer: LocationId, quantity: f64) -> Self {
        Self { exporter, importer, quantity }
    }
}

/// Production and trade for one material and one period.
#[derive(Debug, Clone, Default)]
pub struct FlowInput {
    pub mining: ProductionTable,
    pub refining: ProductionTable,
    pub manufacturing: ProductionTable,
    pub chemistry: ChemistryBreakdown,
    /// Mined material traded to refiners.
    pub first_trade: Vec<TradeRecord>,
    /// Refined material traded to manufacturers.
    pub second_trade: Vec<TradeRecord>,
}

// ---------------------------------------------------------------------------
// Graph
// ---------------------------------------------------------------------------

/// Cumulative link value per stage. A link counts once for each endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct StageTotals(BTreeMap<Stage, f64>);

impl StageTotals {
    pub fn add(&mut self, stage: Stage, value: f64) {
        *self.0.entry(stage).or_insert(0.0) += value;
    }

    pub fn get(&self, stage: Stage) -> f64 {
        self.0.get(&stage).copied().unwrap_or(0.0)
    }

    pub fn max(&self) -> f64 {
        self.0.values().copied().fold(0.0, f64::max)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Stage, f64)> + '_ {
        self.0.iter().map(|(stage, value)| (*stage, *value))
    }
}

/// Output of the graph builder: labelled nodes, raw links, totals and the
/// deficits detected by both balancer runs.
#[derive(Debug, Clone, Default)]
pub struct FlowGraph {
    pub nodes: BTreeMap<NodeKey, String>,
    pub links: Vec<Link>,
    pub stage_totals: StageTotals,
    pub mining_deficits: BTreeMap<LocationId, f64>,
    pub refining_deficits: BTreeMap<LocationId, f64>,
}

// ---------------------------------------------------------------------------
// Diagram (renderer contract)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct DiagramNode {
    pub key: NodeKey,
    pub stage_key: String,
    pub label: String,
    pub x: f64,
    pub y: f64,
    pub weight: f64,
    pub height: f64,
    pub color: NodeRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagramLink {
    pub source: usize,
    pub target: usize,
    pub value: f64,
    pub color: NodeRole,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagramMeta {
    pub name: String,
    pub engine_version: String,
    pub reference_quantity: f64,
    pub y_scale: f64,
    pub canvas_height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagram {
    pub meta: DiagramMeta,
    pub nodes: Vec<DiagramNode>,
    pub links: Vec<DiagramLink>,
    pub stage_totals: StageTotals,
    pub mining_deficits: BTreeMap<LocationId, f64>,
    pub refining_deficits: BTreeMap<LocationId, f64>,
}
