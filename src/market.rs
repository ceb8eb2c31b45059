use std::{fmt::Display, path::Path, str::FromStr};

use chrono::{Datelike, NaiveDateTime};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::{prelude::*, quantity::rate::KilowattHourRate};

/// Time-of-use period. `S` is the single period of the Simples option; the
/// others are Vazio, Fora de Vazio, Cheias and Ponta.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub enum Period {
    S,
    V,
    F,
    C,
    P,
}

impl Period {
    pub const fn label(self) -> &'static str {
        match self {
            Self::S => "Simples",
            Self::V => "Vazio",
            Self::F => "Fora de Vazio",
            Self::C => "Cheias",
            Self::P => "Ponta",
        }
    }
}

impl FromStr for Period {
    type Err = Error;

    fn from_str(code: &str) -> Result<Self> {
        match code.trim() {
            "S" | "s" => Ok(Self::S),
            "V" | "v" => Ok(Self::V),
            "F" | "f" => Ok(Self::F),
            "C" | "c" => Ok(Self::C),
            "P" | "p" => Ok(Self::P),
            other => bail!("unknown period code {other:?}"),
        }
    }
}

impl Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Tariff option: which set of periods the plan bills on.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Schedule {
    Simples,
    BiHoraria,
    TriHoraria,
}

impl Schedule {
    pub const fn periods(self) -> &'static [Period] {
        match self {
            Self::Simples => &[Period::S],
            Self::BiHoraria => &[Period::V, Period::F],
            Self::TriHoraria => &[Period::V, Period::C, Period::P],
        }
    }
}

impl Display for Schedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simples => write!(f, "Simples"),
            Self::BiHoraria => write!(f, "Bi-horária"),
            Self::TriHoraria => write!(f, "Tri-horária"),
        }
    }
}

/// Whether the period-of-day mapping follows the daily or the weekly cycle.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cycle {
    Daily,
    Weekly,
}

impl Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Daily => write!(f, "Ciclo Diário"),
            Self::Weekly => write!(f, "Ciclo Semanal"),
        }
    }
}

/// ERSE standard consumption-shape class.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum Profile {
    A,
    B,
    C,
}

/// One market slot: hourly or quarter-hourly, exactly one period code per
/// cycle, plus the ERSE profile weights for the BTN path.
#[derive(Clone, Debug)]
pub struct MarketSlot {
    pub timestamp: NaiveDateTime,
    pub spot: KilowattHourRate,
    pub loss: f64,
    pub bi_daily: Option<Period>,
    pub bi_weekly: Option<Period>,
    pub tri_daily: Option<Period>,
    pub tri_weekly: Option<Period>,
    pub profile_a: f64,
    pub profile_b: f64,
    pub profile_c: f64,
}

impl MarketSlot {
    /// The slot's period under the given option and cycle. `None` means the
    /// cycle column was absent from the source table.
    pub fn period(&self, schedule: Schedule, cycle: Cycle) -> Option<Period> {
        match (schedule, cycle) {
            (Schedule::Simples, _) => Some(Period::S),
            (Schedule::BiHoraria, Cycle::Daily) => self.bi_daily,
            (Schedule::BiHoraria, Cycle::Weekly) => self.bi_weekly,
            (Schedule::TriHoraria, Cycle::Daily) => self.tri_daily,
            (Schedule::TriHoraria, Cycle::Weekly) => self.tri_weekly,
        }
    }

    pub fn profile_weight(&self, profile: Profile) -> f64 {
        match profile {
            Profile::A => self.profile_a,
            Profile::B => self.profile_b,
            Profile::C => self.profile_c,
        }
    }
}

#[derive(Deserialize)]
struct MarketRow {
    timestamp: String,
    /// OMIE clearing price in €/MWh.
    spot: f64,
    loss: f64,
    #[serde(default)]
    bd: String,
    #[serde(default)]
    bs: String,
    #[serde(default)]
    td: String,
    #[serde(default)]
    ts: String,
    #[serde(default)]
    profile_a: f64,
    #[serde(default)]
    profile_b: f64,
    #[serde(default)]
    profile_c: f64,
}

fn parse_period(code: &str) -> Option<Period> {
    let code = code.trim();
    if code.is_empty() { None } else { code.parse().ok() }
}

/// The loaded OMIE/ERSE market table. Immutable once loaded and shared
/// read-only across all plan evaluations of a run.
pub struct MarketSeries {
    slots: Vec<MarketSlot>,
}

impl MarketSeries {
    pub fn from_slots(mut slots: Vec<MarketSlot>) -> Self {
        slots.sort_by_key(|slot| slot.timestamp);
        slots.dedup_by_key(|slot| slot.timestamp);
        Self { slots }
    }

    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_from(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("failed to open the market table at {}", path.display()))?;
        let mut slots = Vec::new();
        for row in reader.deserialize() {
            let row: MarketRow = match row {
                Ok(row) => row,
                Err(error) => {
                    warn!("skipping an invalid market row: {error:#}");
                    continue;
                }
            };
            let timestamp = match NaiveDateTime::parse_from_str(&row.timestamp, "%Y-%m-%d %H:%M") {
                Ok(timestamp) => timestamp,
                Err(error) => {
                    warn!("skipping an invalid market timestamp {:?}: {error:#}", row.timestamp);
                    continue;
                }
            };
            slots.push(MarketSlot {
                timestamp,
                spot: KilowattHourRate::from_megawatt_hour_rate(row.spot),
                loss: row.loss,
                bi_daily: parse_period(&row.bd),
                bi_weekly: parse_period(&row.bs),
                tri_daily: parse_period(&row.td),
                tri_weekly: parse_period(&row.ts),
                profile_a: row.profile_a,
                profile_b: row.profile_b,
                profile_c: row.profile_c,
            });
        }
        let series = Self::from_slots(slots);
        info!(n_slots = series.slots.len(), "loaded the market table");
        Ok(series)
    }

    pub fn slots(&self) -> &[MarketSlot] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots within `[from, to)`. Open bounds default to the series extent.
    pub fn window(&self, from: Option<NaiveDateTime>, to: Option<NaiveDateTime>) -> &[MarketSlot] {
        let start = from
            .map_or(0, |from| self.slots.partition_point(|slot| slot.timestamp < from));
        let end = to
            .map_or(self.slots.len(), |to| self.slots.partition_point(|slot| slot.timestamp < to));
        &self.slots[start..end.max(start)]
    }

    /// Mean loss coefficient over the full calendar year, used by formulas
    /// that specify annually-averaged losses.
    pub fn annual_mean_loss(&self, year: i32) -> Option<f64> {
        let (sum, count) = self
            .slots
            .iter()
            .filter(|slot| slot.timestamp.year() == year)
            .fold((0.0, 0_usize), |(sum, count), slot| (sum + slot.loss, count + 1));
        (count > 0).then(|| sum / count as f64)
    }
}

#[cfg(test)]
pub mod tests {
    use chrono::NaiveDate;

    use super::*;

    /// A flat synthetic series: hourly slots, constant spot and loss, the
    /// bi-daily cycle alternating V (night) / F (day), profile B weights.
    pub fn synthetic_series(n_hours: usize, spot_mwh: f64, loss: f64) -> MarketSeries {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let slots = (0..n_hours)
            .map(|hour| {
                let timestamp = start + chrono::TimeDelta::hours(hour as i64);
                let night = !(8..22).contains(&chrono::Timelike::hour(&timestamp));
                MarketSlot {
                    timestamp,
                    spot: KilowattHourRate::from_megawatt_hour_rate(spot_mwh),
                    loss,
                    bi_daily: Some(if night { Period::V } else { Period::F }),
                    bi_weekly: Some(if night { Period::V } else { Period::F }),
                    tri_daily: Some(if night { Period::V } else { Period::C }),
                    tri_weekly: Some(if night { Period::V } else { Period::C }),
                    profile_a: 1.0,
                    profile_b: 1.0,
                    profile_c: 1.0,
                }
            })
            .collect();
        MarketSeries::from_slots(slots)
    }

    #[test]
    fn test_window_bounds() {
        let series = synthetic_series(48, 60.0, 1.1);
        let from = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap().and_hms_opt(12, 0, 0).unwrap();
        let to = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(series.window(Some(from), Some(to)).len(), 12);
        assert_eq!(series.window(None, None).len(), 48);
    }

    #[test]
    fn test_annual_mean_loss() {
        let series = synthetic_series(24, 60.0, 1.1);
        assert!((series.annual_mean_loss(2025).unwrap() - 1.1).abs() < 1e-12);
        assert!(series.annual_mean_loss(2024).is_none());
    }

    #[test]
    fn test_one_period_code_per_cycle() {
        let series = synthetic_series(24, 60.0, 1.1);
        for slot in series.slots() {
            assert!(slot.period(Schedule::BiHoraria, Cycle::Daily).is_some());
            assert_eq!(slot.period(Schedule::Simples, Cycle::Daily), Some(Period::S));
        }
    }
}
