use std::collections::BTreeMap;

use crate::model::{LocationId, ProductionTable, TradeRecord};

/// Per-exporter allocation of declared production for one trade layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Balance {
    /// exporter → counterpart → quantity. The self entry holds production
    /// that was not exported.
    pub flow: BTreeMap<LocationId, BTreeMap<LocationId, f64>>,
    /// Exports beyond declared production. Only deficits are present, always > 0.
    pub missing: BTreeMap<LocationId, f64>,
}

impl Balance {
    /// Production retained at home after exports (0 for exporters in deficit).
    pub fn retained(&self, location: LocationId) -> f64 {
        self.flow
            .get(&location)
            .and_then(|row| row.get(&location))
            .copied()
            .unwrap_or(0.0)
    }

    /// Sum of positive flows arriving at each counterpart, self entries included.
    pub fn inflow(&self) -> BTreeMap<LocationId, f64> {
        let mut inflow = BTreeMap::new();
        for row in self.flow.values() {
            for (&importer, &value) in row {
                if value > 0.0 {
                    *inflow.entry(importer).or_insert(0.0) += value;
                }
            }
        }
        inflow
    }
}

/// Reconcile declared production against trade for one layer.
///
/// Every record consumes from the exporter's self entry. Exporters without
/// declared production start from zero, so all of their trade ends up in
/// `missing`. Duplicate records sum; non-finite quantities are skipped.
pub fn balance(production: &ProductionTable, trades: &[TradeRecord]) -> Balance {
    let mut flow: BTreeMap<LocationId, BTreeMap<LocationId, f64>> = BTreeMap::new();

    for (&location, &quantity) in production {
        if !quantity.is_finite() {
            log::warn!("skipping non-finite production for location {location}");
            continue;
        }
        flow.entry(location).or_default().insert(location, quantity);
    }

    for trade in trades {
        if !trade.quantity.is_finite() {
            log::warn!(
                "skipping non-finite trade {} -> {}",
                trade.exporter,
                trade.importer
            );
            continue;
        }
        let row = flow.entry(trade.exporter).or_default();
        row.entry(trade.exporter).or_insert(0.0);
        *row.entry(trade.importer).or_insert(0.0) += trade.quantity;
        *row.entry(trade.exporter).or_insert(0.0) -= trade.quantity;
    }

    let mut missing = BTreeMap::new();
    for (&exporter, row) in flow.iter_mut() {
        if let Some(retained) = row.get_mut(&exporter) {
            if *retained < 0.0 {
                missing.insert(exporter, -*retained);
                *retained = 0.0;
            }
        }
    }

    Balance { flow, missing }
}
