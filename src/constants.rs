use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
    market::{Period, Schedule},
    prelude::*,
    quantity::{
        cost::Cost,
        power::Kilovoltamperes,
        rate::{DayRate, KilowattHourRate},
    },
};

/// Regulated access tariffs (TAR), €/kWh per option-period and €/day per
/// contracted-power tier.
#[derive(Clone, Serialize, Deserialize)]
pub struct Tar {
    pub energy: TarEnergy,
    pub power: Vec<PowerTier>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TarEnergy {
    pub simples: KilowattHourRate,
    pub bi_vazio: KilowattHourRate,
    pub bi_fora_vazio: KilowattHourRate,
    pub tri_vazio: KilowattHourRate,
    pub tri_cheias: KilowattHourRate,
    pub tri_ponta: KilowattHourRate,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct PowerTier {
    pub kva: Kilovoltamperes,
    pub rate: DayRate,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SocialTariff {
    /// Discount per kWh, taken off the regulated energy component.
    pub energy: KilowattHourRate,
    /// Discount per day, taken off the regulated power component.
    pub power: DayRate,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Vat {
    pub reduced: f64,
    pub standard: f64,
    /// Contracted power at or below this tier is taxed at the reduced rate.
    pub power_threshold: Kilovoltamperes,
    /// Reduced-rate energy allowance, kWh per 30-day billing month.
    pub reduced_energy_kwh: f64,
    pub reduced_energy_kwh_large_family: f64,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct Levies {
    /// Special consumption tax (IEC), €/kWh. Waived under the social tariff.
    pub iec: KilowattHourRate,
    /// DGEG operating fee, € per billing month.
    pub dgeg_monthly: Cost,
    /// Audiovisual contribution (CAV), € per billing month.
    pub cav_monthly: Cost,
}

/// The full regulated catalog, loaded once per run and passed explicitly to
/// every engine call.
#[derive(Clone, Serialize, Deserialize)]
pub struct RegulatedConstants {
    /// Publication date of the values below.
    pub as_of: NaiveDate,
    pub tar: Tar,
    /// Social-tariff financing surcharge (TSE), €/kWh.
    pub tse: KilowattHourRate,
    pub social: SocialTariff,
    pub vat: Vat,
    pub levies: Levies,
}

impl RegulatedConstants {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_from(path: &Path) -> Result<Self> {
        let constants: Self = toml::from_str(
            &std::fs::read_to_string(path)
                .with_context(|| format!("failed to read the constants at {}", path.display()))?,
        )?;
        ensure!(!constants.tar.power.is_empty(), "the power-tier table must not be empty");
        info!(as_of = %constants.as_of, "loaded the regulated constants");
        Ok(constants)
    }

    pub fn tar_energy(&self, schedule: Schedule, period: Period) -> KilowattHourRate {
        let energy = &self.tar.energy;
        match (schedule, period) {
            (Schedule::Simples, _) => energy.simples,
            (Schedule::BiHoraria, Period::V) => energy.bi_vazio,
            (Schedule::BiHoraria, _) => energy.bi_fora_vazio,
            (Schedule::TriHoraria, Period::V) => energy.tri_vazio,
            (Schedule::TriHoraria, Period::P) => energy.tri_ponta,
            (Schedule::TriHoraria, _) => energy.tri_cheias,
        }
    }

    /// The daily TAR for the tier, or the nearest tier when the requested
    /// power does not match any published one (`false` in that case).
    pub fn tar_power(&self, power: Kilovoltamperes) -> (DayRate, bool) {
        let nearest = self
            .tar
            .power
            .iter()
            .min_by(|lhs, rhs| {
                (lhs.kva.0 - power.0).abs().total_cmp(&(rhs.kva.0 - power.0).abs())
            })
            .expect("the power-tier table is never empty");
        (nearest.rate, (nearest.kva.0 - power.0).abs() < 1e-9)
    }
}

impl Default for RegulatedConstants {
    /// ERSE values for the 2025 tariff year.
    fn default() -> Self {
        Self {
            as_of: NaiveDate::from_ymd_opt(2025, 1, 1).expect("valid date"),
            tar: Tar {
                energy: TarEnergy {
                    simples: KilowattHourRate::from(0.0436),
                    bi_vazio: KilowattHourRate::from(0.0208),
                    bi_fora_vazio: KilowattHourRate::from(0.0563),
                    tri_vazio: KilowattHourRate::from(0.0208),
                    tri_cheias: KilowattHourRate::from(0.0477),
                    tri_ponta: KilowattHourRate::from(0.0938),
                },
                power: [
                    (1.15, 0.0609),
                    (2.30, 0.1218),
                    (3.45, 0.1827),
                    (4.60, 0.2436),
                    (5.75, 0.3045),
                    (6.90, 0.3654),
                    (10.35, 0.5481),
                    (13.80, 0.7308),
                    (17.25, 0.9135),
                    (20.70, 1.0962),
                ]
                .into_iter()
                .map(|(kva, rate)| PowerTier {
                    kva: Kilovoltamperes::from(kva),
                    rate: DayRate::from(rate),
                })
                .collect(),
            },
            tse: KilowattHourRate::from(0.000_12),
            social: SocialTariff {
                energy: KilowattHourRate::from(0.0687),
                power: DayRate::from(0.1188),
            },
            vat: Vat {
                reduced: 0.06,
                standard: 0.23,
                power_threshold: Kilovoltamperes::from(3.45),
                reduced_energy_kwh: 100.0,
                reduced_energy_kwh_large_family: 150.0,
            },
            levies: Levies {
                iec: KilowattHourRate::from(0.001),
                dgeg_monthly: Cost::from(0.07),
                cav_monthly: Cost::from(2.85),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tar_power_exact_tier() {
        let constants = RegulatedConstants::default();
        let (rate, exact) = constants.tar_power(Kilovoltamperes::from(3.45));
        assert!(exact);
        assert!((rate.0 - 0.1827).abs() < 1e-12);
    }

    #[test]
    fn test_tar_power_nearest_tier() {
        let constants = RegulatedConstants::default();
        let (rate, exact) = constants.tar_power(Kilovoltamperes::from(3.3));
        assert!(!exact);
        assert!((rate.0 - 0.1827).abs() < 1e-12);
    }

    #[test]
    fn test_toml_round_trip() {
        let constants = RegulatedConstants::default();
        let serialized = toml::to_string(&constants).unwrap();
        let restored: RegulatedConstants = toml::from_str(&serialized).unwrap();
        assert_eq!(restored.as_of, constants.as_of);
        assert!((restored.tse.0 - constants.tse.0).abs() < 1e-12);
    }
}
