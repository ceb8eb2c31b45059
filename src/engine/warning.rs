use std::fmt::{Display, Formatter};

use chrono::NaiveDateTime;
use serde::Serialize;

use crate::market::{Cycle, Period, Schedule};

/// The only typed failure the engine produces. Per-plan and non-fatal to a
/// catalog run: the caller reports the plan as unavailable, never as zero.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no market data between {from:?} and {to:?}")]
    MissingMarketData {
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    },
}

/// Degraded-but-computed conditions, surfaced alongside the breakdown.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case", tag = "kind")]
pub enum Warning {
    /// The cycle's period classification is absent from the market table;
    /// whole-window averages were used for every period.
    CycleFallback { schedule: Schedule, cycle: Cycle },
    /// No market slot matched the period; the whole-window average was
    /// substituted.
    EmptyPeriodFallback { period: Period },
    /// Unregistered formula; the generic spot × loss fallback was applied.
    UnknownFormula { formula_id: String },
    /// A user-entered value is out of range; the computation went ahead so
    /// the caller can decide whether to block submission.
    InvalidInput { field: String, value: f64 },
    /// Explicit per-period consumption did not sum to the window total and
    /// was scaled to match.
    SplitMismatch { entered_kwh: f64, total_kwh: f64 },
    /// The contracted power matches no published tier; the nearest tier's
    /// TAR was used.
    UnknownPowerTier { kva: f64 },
}

impl Display for Warning {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CycleFallback { schedule, cycle } => {
                write!(f, "{schedule} {cycle} is not classified; using window averages")
            }
            Self::EmptyPeriodFallback { period } => {
                write!(f, "no market slots in {period}; using the window average")
            }
            Self::UnknownFormula { formula_id } => {
                write!(f, "unknown formula {formula_id:?}; using spot × loss")
            }
            Self::InvalidInput { field, value } => {
                write!(f, "suspicious input: {field} = {value}")
            }
            Self::SplitMismatch { entered_kwh, total_kwh } => {
                write!(f, "period splits sum to {entered_kwh} kWh, not {total_kwh} kWh; rescaled")
            }
            Self::UnknownPowerTier { kva } => {
                write!(f, "{kva} kVA is not a published tier; using the nearest one")
            }
        }
    }
}
