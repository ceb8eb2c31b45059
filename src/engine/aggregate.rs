use std::collections::BTreeMap;

use chrono::Datelike;

use crate::{
    consumption::ConsumptionRecord,
    engine::warning::{EngineError, Warning},
    market::{Cycle, MarketSeries, MarketSlot, Period, Profile, Schedule},
    quantity::{energy::KilowattHours, rate::KilowattHourRate},
};

/// Averaged market data for one period bucket.
#[derive(Copy, Clone, Debug)]
pub struct PeriodSample {
    pub spot: KilowattHourRate,
    pub loss: f64,
    /// The whole-window average was substituted for an empty bucket.
    pub fallback: bool,
}

/// Per-period market averages over the evaluation window.
pub struct MarketStats {
    pub periods: BTreeMap<Period, PeriodSample>,
    /// Whole-window ("Simples") averages, also the fallback for empty
    /// buckets.
    pub simples: PeriodSample,
    /// Calendar-year mean loss coefficient.
    pub annual_loss: f64,
}

fn mean_sample(slots: impl Iterator<Item = (KilowattHourRate, f64)>) -> Option<(KilowattHourRate, f64)> {
    let (spot_sum, loss_sum, count) = slots.fold(
        (0.0, 0.0, 0_usize),
        |(spot_sum, loss_sum, count), (spot, loss)| (spot_sum + spot.0, loss_sum + loss, count + 1),
    );
    (count > 0)
        .then(|| (KilowattHourRate::from(spot_sum / count as f64), loss_sum / count as f64))
}

/// Average the window's spot prices and loss coefficients into period
/// buckets for the given option and cycle.
///
/// An empty window is a `MissingMarketData` error; an empty period bucket or
/// a missing cycle column degrades to the whole-window average with a
/// warning, never an error.
pub fn market_stats(
    series: &MarketSeries,
    window: &[MarketSlot],
    schedule: Schedule,
    cycle: Cycle,
    warnings: &mut Vec<Warning>,
) -> Result<MarketStats, EngineError> {
    let Some((simples_spot, simples_loss)) =
        mean_sample(window.iter().map(|slot| (slot.spot, slot.loss)))
    else {
        return Err(EngineError::MissingMarketData { from: None, to: None });
    };
    let simples = PeriodSample { spot: simples_spot, loss: simples_loss, fallback: false };

    let annual_loss = series
        .annual_mean_loss(window[0].timestamp.year())
        .unwrap_or(simples_loss);

    let cycle_missing = window.iter().any(|slot| slot.period(schedule, cycle).is_none());
    if cycle_missing {
        warnings.push(Warning::CycleFallback { schedule, cycle });
    }

    let mut periods = BTreeMap::new();
    for &period in schedule.periods() {
        let sample = if cycle_missing {
            PeriodSample { fallback: true, ..simples }
        } else {
            match mean_sample(
                window
                    .iter()
                    .filter(|slot| slot.period(schedule, cycle) == Some(period))
                    .map(|slot| (slot.spot, slot.loss)),
            ) {
                Some((spot, loss)) => PeriodSample { spot, loss, fallback: false },
                None => {
                    warnings.push(Warning::EmptyPeriodFallback { period });
                    PeriodSample { fallback: true, ..simples }
                }
            }
        };
        periods.insert(period, sample);
    }

    Ok(MarketStats { periods, simples, annual_loss })
}

/// Per-period consumption for the given option, satisfying
/// Σ periods == total.
pub struct ConsumptionSplit {
    pub periods: BTreeMap<Period, KilowattHours>,
    pub total: KilowattHours,
}

impl ConsumptionSplit {
    pub fn get(&self, period: Period) -> KilowattHours {
        self.periods.get(&period).copied().unwrap_or(KilowattHours::ZERO)
    }
}

/// Split the consumption record into the option's period buckets.
///
/// A diagram is classified slot by slot through the market cycle columns; a
/// manual record uses the explicit splits when given (rescaled to the total
/// when they disagree) and the profile-weight shares otherwise. Paths that
/// need the market table fail with `MissingMarketData` when the window is
/// empty.
pub fn split_consumption(
    record: &ConsumptionRecord,
    window: &[MarketSlot],
    schedule: Schedule,
    cycle: Cycle,
    profile: Profile,
    warnings: &mut Vec<Warning>,
) -> Result<ConsumptionSplit, EngineError> {
    let total = record.total();
    if let Schedule::Simples = schedule {
        return Ok(ConsumptionSplit {
            periods: BTreeMap::from([(Period::S, total)]),
            total,
        });
    }

    let mut periods: BTreeMap<Period, KilowattHours> =
        schedule.periods().iter().map(|&period| (period, KilowattHours::ZERO)).collect();

    match record {
        ConsumptionRecord::Diagram(slots) => {
            if window.is_empty() {
                return Err(EngineError::MissingMarketData { from: None, to: None });
            }
            // Both sides are sorted by timestamp: a single merge walk.
            let mut market = window.iter().peekable();
            for (timestamp, energy) in slots {
                while market.next_if(|slot| slot.timestamp < *timestamp).is_some() {}
                let period = market
                    .peek()
                    .filter(|slot| slot.timestamp == *timestamp)
                    .and_then(|slot| slot.period(schedule, cycle));
                if let Some(period) = period {
                    *periods.entry(period).or_default() += *energy;
                }
            }
            let classified: KilowattHours = periods.values().copied().sum();
            if classified.0 <= 0.0 && total.0 > 0.0 {
                // Nothing in the diagram lines up with the window: there is
                // no defensible split, and billing zero would be worse.
                return Err(EngineError::MissingMarketData { from: None, to: None });
            }
            if (classified.0 - total.0).abs() > 1e-9 && classified.0 > 0.0 {
                // Slots outside the window or without a period code: scale
                // the classified shape up to the full total.
                warnings.push(Warning::SplitMismatch {
                    entered_kwh: classified.0,
                    total_kwh: total.0,
                });
                let scale = total.0 / classified.0;
                for energy in periods.values_mut() {
                    *energy = *energy * scale;
                }
            }
        }

        ConsumptionRecord::Manual { total: _, splits: Some(splits) } => {
            let entered: f64 = schedule
                .periods()
                .iter()
                .map(|period| splits.get(period).map_or(0.0, |energy| energy.0))
                .sum();
            if entered <= 0.0 {
                return split_by_profile(window, schedule, cycle, profile, total, &mut periods)
                    .map(|()| ConsumptionSplit { periods, total });
            }
            if (entered - total.0).abs() > 1e-9 {
                warnings.push(Warning::SplitMismatch { entered_kwh: entered, total_kwh: total.0 });
            }
            for (&period, energy) in periods.iter_mut() {
                let share = splits.get(&period).map_or(0.0, |energy| energy.0) / entered;
                *energy = KilowattHours::from(total.0 * share);
            }
        }

        ConsumptionRecord::Manual { total: _, splits: None } => {
            split_by_profile(window, schedule, cycle, profile, total, &mut periods)?;
        }
    }

    Ok(ConsumptionSplit { periods, total })
}

/// Distribute the total across periods pro rata to the standard profile's
/// energy share in each period.
fn split_by_profile(
    window: &[MarketSlot],
    schedule: Schedule,
    cycle: Cycle,
    profile: Profile,
    total: KilowattHours,
    periods: &mut BTreeMap<Period, KilowattHours>,
) -> Result<(), EngineError> {
    if window.is_empty() {
        return Err(EngineError::MissingMarketData { from: None, to: None });
    }
    let mut weight_sum = 0.0;
    let mut weights: BTreeMap<Period, f64> = BTreeMap::new();
    for slot in window {
        if let Some(period) = slot.period(schedule, cycle) {
            let weight = slot.profile_weight(profile);
            *weights.entry(period).or_default() += weight;
            weight_sum += weight;
        }
    }
    if weight_sum <= 0.0 {
        return Err(EngineError::MissingMarketData { from: None, to: None });
    }
    for (&period, energy) in periods.iter_mut() {
        let share = weights.get(&period).copied().unwrap_or(0.0) / weight_sum;
        *energy = KilowattHours::from(total.0 * share);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    use super::*;
    use crate::market::tests::synthetic_series;

    #[test]
    fn test_market_stats_simples_means() {
        let series = synthetic_series(48, 60.0, 1.1);
        let mut warnings = Vec::new();
        let stats = market_stats(
            &series,
            series.slots(),
            Schedule::BiHoraria,
            Cycle::Daily,
            &mut warnings,
        )
        .unwrap();
        assert!(warnings.is_empty());
        assert_abs_diff_eq!(stats.simples.spot.0, 0.060, epsilon = 1e-12);
        assert_abs_diff_eq!(stats.periods[&Period::V].loss, 1.1, epsilon = 1e-12);
    }

    #[test]
    fn test_market_stats_empty_window() {
        let series = synthetic_series(0, 60.0, 1.1);
        let mut warnings = Vec::new();
        let result =
            market_stats(&series, series.slots(), Schedule::Simples, Cycle::Daily, &mut warnings);
        assert!(matches!(result, Err(EngineError::MissingMarketData { .. })));
    }

    #[test]
    fn test_empty_period_falls_back_to_window_average() {
        // A tri plan over a series that never labels Ponta.
        let series = synthetic_series(24, 60.0, 1.1);
        let mut warnings = Vec::new();
        let stats = market_stats(
            &series,
            series.slots(),
            Schedule::TriHoraria,
            Cycle::Daily,
            &mut warnings,
        )
        .unwrap();
        assert!(stats.periods[&Period::P].fallback);
        assert_abs_diff_eq!(stats.periods[&Period::P].spot.0, stats.simples.spot.0);
        assert!(warnings.contains(&Warning::EmptyPeriodFallback { period: Period::P }));
    }

    #[test]
    fn test_split_sums_to_total() {
        let series = synthetic_series(24 * 7, 60.0, 1.1);
        let record = ConsumptionRecord::Manual { total: KilowattHours::from(150.0), splits: None };
        let mut warnings = Vec::new();
        let split = split_consumption(
            &record,
            series.slots(),
            Schedule::BiHoraria,
            Cycle::Daily,
            Profile::C,
            &mut warnings,
        )
        .unwrap();
        let sum: f64 = split.periods.values().map(|energy| energy.0).sum();
        assert_abs_diff_eq!(sum, 150.0, epsilon = 1e-9);
    }

    #[test]
    fn test_diagram_disjoint_from_window_is_missing_data() {
        // A March diagram against a January market table classifies
        // nothing; that must surface as missing data, never as a zero
        // energy bill under a non-zero total.
        let series = synthetic_series(24, 60.0, 1.1);
        let start =
            NaiveDate::from_ymd_opt(2025, 3, 1).unwrap().and_hms_opt(0, 0, 0).unwrap();
        let slots = (0..24_i64)
            .map(|hour| (start + chrono::TimeDelta::hours(hour), KilowattHours::from(5.0)))
            .collect();
        let mut warnings = Vec::new();
        let result = split_consumption(
            &ConsumptionRecord::Diagram(slots),
            series.slots(),
            Schedule::BiHoraria,
            Cycle::Daily,
            Profile::C,
            &mut warnings,
        );
        assert!(matches!(result, Err(EngineError::MissingMarketData { .. })));
    }

    #[test]
    fn test_explicit_splits_rescaled() {
        let series = synthetic_series(24, 60.0, 1.1);
        let record = ConsumptionRecord::Manual {
            total: KilowattHours::from(100.0),
            splits: Some(BTreeMap::from([
                (Period::V, KilowattHours::from(30.0)),
                (Period::F, KilowattHours::from(90.0)),
            ])),
        };
        let mut warnings = Vec::new();
        let split = split_consumption(
            &record,
            series.slots(),
            Schedule::BiHoraria,
            Cycle::Daily,
            Profile::C,
            &mut warnings,
        )
        .unwrap();
        assert!(matches!(warnings[0], Warning::SplitMismatch { .. }));
        assert_abs_diff_eq!(split.get(Period::V).0, 25.0, epsilon = 1e-9);
        assert_abs_diff_eq!(split.get(Period::F).0, 75.0, epsilon = 1e-9);
    }
}
