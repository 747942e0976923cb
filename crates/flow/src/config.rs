use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::FlowError;
use crate::model::{AccountingCategory, Stage};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct FlowConfig {
    #[serde(default = "default_name")]
    pub name: String,
    /// Split exports of over-exporting miners into an actual and a gap part.
    #[serde(default)]
    pub mass_balance_split: bool,
    #[serde(default)]
    pub final_stage_mode: FinalStageMode,
    /// Size of the invisible calibration flow. 0 disables it.
    #[serde(default)]
    pub reference_quantity: f64,
    /// Accounting category → column it is drawn in.
    #[serde(default)]
    pub stage_overrides: BTreeMap<AccountingCategory, Stage>,
    #[serde(default)]
    pub alignment: BTreeMap<Stage, Alignment>,
    /// Stage → display names, top to bottom.
    #[serde(default)]
    pub explicit_order: BTreeMap<Stage, Vec<String>>,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub inputs: InputFiles,
}

fn default_name() -> String {
    "flow".into()
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            mass_balance_split: false,
            final_stage_mode: FinalStageMode::default(),
            reference_quantity: 0.0,
            stage_overrides: BTreeMap::new(),
            alignment: BTreeMap::new(),
            explicit_order: BTreeMap::new(),
            layout: LayoutConfig::default(),
            inputs: InputFiles::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// How the last column is broken down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStageMode {
    #[default]
    ByLocation,
    ByChemistry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Alignment {
    #[default]
    Top,
    Bottom,
}

// ---------------------------------------------------------------------------
// Layout + inputs
// ---------------------------------------------------------------------------

/// Vertical packing parameters, in unit-canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_gap")]
    pub gap: f64,
    /// Share of the canvas height available to nodes and gaps.
    #[serde(default = "default_usable_fraction")]
    pub usable_fraction: f64,
    /// Floor for a column's usable height once gaps are subtracted.
    #[serde(default = "default_min_usable")]
    pub min_usable: f64,
    #[serde(default = "default_top_margin")]
    pub top_margin: f64,
    #[serde(default = "default_bottom_margin")]
    pub bottom_margin: f64,
}

fn default_gap() -> f64 {
    0.02
}
fn default_usable_fraction() -> f64 {
    0.95
}
fn default_min_usable() -> f64 {
    0.1
}
fn default_top_margin() -> f64 {
    0.01
}
fn default_bottom_margin() -> f64 {
    0.99
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            gap: default_gap(),
            usable_fraction: default_usable_fraction(),
            min_usable: default_min_usable(),
            top_margin: default_top_margin(),
            bottom_margin: default_bottom_margin(),
        }
    }
}

/// CSV files feeding a run, relative to the config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InputFiles {
    #[serde(default)]
    pub names: Option<String>,
    #[serde(default)]
    pub mining: Option<String>,
    #[serde(default)]
    pub refining: Option<String>,
    #[serde(default)]
    pub manufacturing: Option<String>,
    #[serde(default)]
    pub chemistry: Option<String>,
    #[serde(default)]
    pub first_trade: Option<String>,
    #[serde(default)]
    pub second_trade: Option<String>,
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl FlowConfig {
    pub fn from_toml(input: &str) -> Result<Self, FlowError> {
        let config: FlowConfig =
            toml::from_str(input).map_err(|e| FlowError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if !self.reference_quantity.is_finite() || self.reference_quantity < 0.0 {
            return Err(FlowError::ConfigValidation(format!(
                "reference_quantity must be >= 0, got {}",
                self.reference_quantity
            )));
        }

        // Categories may only move to their own detour column
        for (category, stage) in &self.stage_overrides {
            if *stage != category.default_stage() && *stage != category.half_stage() {
                return Err(FlowError::ConfigValidation(format!(
                    "stage_overrides: {category} can be placed in {} or {}, not {stage}",
                    category.default_stage(),
                    category.half_stage()
                )));
            }
        }

        let l = &self.layout;
        if !l.gap.is_finite() || l.gap < 0.0 {
            return Err(FlowError::ConfigValidation(format!(
                "layout.gap must be >= 0, got {}",
                l.gap
            )));
        }
        if !(l.usable_fraction > 0.0 && l.usable_fraction <= 1.0) {
            return Err(FlowError::ConfigValidation(format!(
                "layout.usable_fraction must be in (0, 1], got {}",
                l.usable_fraction
            )));
        }
        if !(l.min_usable > 0.0 && l.min_usable <= l.usable_fraction) {
            return Err(FlowError::ConfigValidation(format!(
                "layout.min_usable must be in (0, usable_fraction], got {}",
                l.min_usable
            )));
        }
        if !(l.top_margin >= 0.0 && l.top_margin < l.bottom_margin && l.bottom_margin <= 1.0) {
            return Err(FlowError::ConfigValidation(format!(
                "layout margins must satisfy 0 <= top < bottom <= 1, got {} / {}",
                l.top_margin, l.bottom_margin
            )));
        }

        Ok(())
    }

    /// Column an accounting category is drawn in.
    pub fn stage_for(&self, category: AccountingCategory) -> Stage {
        self.stage_overrides
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_stage())
    }

    pub fn alignment_for(&self, stage: Stage) -> Alignment {
        self.alignment.get(&stage).copied().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
