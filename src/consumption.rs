use std::{collections::BTreeMap, path::Path};

use chrono::NaiveDateTime;
use csv::ReaderBuilder;
use serde::Deserialize;

use crate::{
    market::{Period, Profile},
    prelude::*,
    quantity::{energy::KilowattHours, power::Kilovoltamperes},
};

/// What we know about the consumer's usage.
pub enum ConsumptionRecord {
    /// Real smart-meter diagram, aligned to the market timestamps.
    Diagram(Vec<(NaiveDateTime, KilowattHours)>),
    /// Manual monthly inputs: the window total, optionally with explicit
    /// per-period splits entered by the user.
    Manual {
        total: KilowattHours,
        splits: Option<BTreeMap<Period, KilowattHours>>,
    },
}

impl ConsumptionRecord {
    pub fn total(&self) -> KilowattHours {
        match self {
            Self::Diagram(slots) => slots.iter().map(|(_, energy)| *energy).sum(),
            Self::Manual { total, .. } => *total,
        }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_diagram_from(path: &Path) -> Result<Self> {
        #[derive(Deserialize)]
        struct DiagramRow {
            timestamp: String,
            kwh: f64,
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("failed to open the diagram at {}", path.display()))?;
        let mut slots = Vec::new();
        for row in reader.deserialize() {
            let row: DiagramRow = match row {
                Ok(row) => row,
                Err(error) => {
                    warn!("skipping an invalid diagram row: {error:#}");
                    continue;
                }
            };
            match NaiveDateTime::parse_from_str(&row.timestamp, "%Y-%m-%d %H:%M") {
                Ok(timestamp) => slots.push((timestamp, KilowattHours::from(row.kwh))),
                Err(error) => {
                    warn!("skipping an invalid diagram timestamp {:?}: {error:#}", row.timestamp);
                }
            }
        }
        slots.sort_by_key(|(timestamp, _)| *timestamp);
        info!(n_slots = slots.len(), "loaded the consumption diagram");
        Ok(Self::Diagram(slots))
    }
}

impl Profile {
    /// ERSE BTN profile class decision table: class A above 13.8 kVA,
    /// otherwise class B above 7140 kWh of annualised consumption, class C
    /// below.
    pub fn estimate(total: KilowattHours, days: u32, power: Kilovoltamperes) -> Self {
        if power.0 > 13.8 {
            return Self::A;
        }
        let annualised = if days == 0 { 0.0 } else { total.0 / f64::from(days) * 365.0 };
        if annualised > 7140.0 { Self::B } else { Self::C }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_decision_table() {
        // 20.7 kVA is class A regardless of consumption.
        assert_eq!(
            Profile::estimate(KilowattHours::from(10.0), 30, Kilovoltamperes::from(20.7)),
            Profile::A,
        );
        // 900 kWh over 30 days annualises to 10 950 kWh.
        assert_eq!(
            Profile::estimate(KilowattHours::from(900.0), 30, Kilovoltamperes::from(6.9)),
            Profile::B,
        );
        assert_eq!(
            Profile::estimate(KilowattHours::from(150.0), 30, Kilovoltamperes::from(3.45)),
            Profile::C,
        );
    }

    #[test]
    fn test_manual_total() {
        let record = ConsumptionRecord::Manual { total: KilowattHours::from(150.0), splits: None };
        assert!((record.total().0 - 150.0).abs() < 1e-12);
    }
}
