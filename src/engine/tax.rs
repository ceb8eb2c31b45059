use serde::Serialize;

use crate::{
    constants::RegulatedConstants,
    quantity::{cost::Cost, power::Kilovoltamperes},
};

/// A money amount with its VAT, kept as discrete fields for the display and
/// export layers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct TaxedAmount {
    /// Tax-exclusive base.
    pub base: Cost,
    pub vat_reduced: Cost,
    pub vat_standard: Cost,
}

impl TaxedAmount {
    pub const ZERO: Self =
        Self { base: Cost::ZERO, vat_reduced: Cost::ZERO, vat_standard: Cost::ZERO };

    pub fn reduced(base: Cost, constants: &RegulatedConstants) -> Self {
        Self { base, vat_reduced: base * constants.vat.reduced, vat_standard: Cost::ZERO }
    }

    pub fn standard(base: Cost, constants: &RegulatedConstants) -> Self {
        Self { base, vat_reduced: Cost::ZERO, vat_standard: base * constants.vat.standard }
    }

    pub fn total(self) -> Cost {
        self.base + self.vat_reduced + self.vat_standard
    }
}

impl std::ops::Add for TaxedAmount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            base: self.base + rhs.base,
            vat_reduced: self.vat_reduced + rhs.vat_reduced,
            vat_standard: self.vat_standard + rhs.vat_standard,
        }
    }
}

/// A 28–31-day window bills as a full month: monthly values apply undiluted
/// and the reduced-VAT allowance is not prorated.
pub const fn is_full_billing_month(days: u32) -> bool {
    matches!(days, 28..=31)
}

/// Monthly levy over the window: the flat monthly value within a full
/// billing month, `monthly / 30 × days` otherwise. The two branches are
/// intentionally separate; they differ at month boundaries.
pub fn prorate_monthly(monthly: Cost, days: u32) -> Cost {
    if is_full_billing_month(days) {
        monthly
    } else {
        monthly / 30.0 * f64::from(days)
    }
}

/// Reduced-VAT energy allowance in kWh for the window.
pub fn reduced_energy_allowance(
    constants: &RegulatedConstants,
    days: u32,
    large_family: bool,
) -> f64 {
    let monthly = if large_family {
        constants.vat.reduced_energy_kwh_large_family
    } else {
        constants.vat.reduced_energy_kwh
    };
    if is_full_billing_month(days) { monthly } else { monthly / 30.0 * f64::from(days) }
}

/// Tax one period's energy: `reduced_share` of the quantity at the reduced
/// rate, the remainder at the standard rate.
pub fn tax_energy_period(
    unit_price: f64,
    quantity_kwh: f64,
    reduced_kwh: f64,
    constants: &RegulatedConstants,
) -> TaxedAmount {
    let reduced_kwh = reduced_kwh.min(quantity_kwh);
    let base = Cost::from(unit_price * quantity_kwh);
    TaxedAmount {
        base,
        vat_reduced: Cost::from(unit_price * reduced_kwh * constants.vat.reduced),
        vat_standard: Cost::from(unit_price * (quantity_kwh - reduced_kwh) * constants.vat.standard),
    }
}

/// Tax the power charge: reduced rate at or below the threshold tier,
/// standard above it.
pub fn tax_power(base: Cost, power: Kilovoltamperes, constants: &RegulatedConstants) -> TaxedAmount {
    if power.0 <= constants.vat.power_threshold.0 + 1e-9 {
        TaxedAmount::reduced(base, constants)
    } else {
        TaxedAmount::standard(base, constants)
    }
}

/// Which of the fixed levies the caller wants on the invoice.
#[derive(Copy, Clone, Debug)]
pub struct LevySwitches {
    pub iec: bool,
    pub dgeg: bool,
    pub cav: bool,
}

impl Default for LevySwitches {
    fn default() -> Self {
        Self { iec: true, dgeg: true, cav: true }
    }
}

/// The fixed levies block of the invoice.
#[derive(Copy, Clone, Debug, Default, Serialize)]
pub struct Levies {
    /// Special consumption tax, per kWh. Waived under the social tariff.
    pub iec: TaxedAmount,
    pub dgeg: TaxedAmount,
    pub cav: TaxedAmount,
}

impl Levies {
    pub fn combined(self) -> TaxedAmount {
        self.iec + self.dgeg + self.cav
    }

    pub fn compute(
        total_kwh: f64,
        days: u32,
        social_tariff: bool,
        switches: LevySwitches,
        constants: &RegulatedConstants,
    ) -> Self {
        let iec = if switches.iec && !social_tariff {
            TaxedAmount::standard(Cost::from(constants.levies.iec.0 * total_kwh), constants)
        } else {
            TaxedAmount::ZERO
        };
        let dgeg = if switches.dgeg {
            TaxedAmount::standard(prorate_monthly(constants.levies.dgeg_monthly, days), constants)
        } else {
            TaxedAmount::ZERO
        };
        let cav = if switches.cav {
            TaxedAmount::reduced(prorate_monthly(constants.levies.cav_monthly, days), constants)
        } else {
            TaxedAmount::ZERO
        };
        Self { iec, dgeg, cav }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_allowance_undiluted_in_a_full_month() {
        let constants = RegulatedConstants::default();
        assert_abs_diff_eq!(reduced_energy_allowance(&constants, 30, false), 100.0);
        assert_abs_diff_eq!(reduced_energy_allowance(&constants, 31, false), 100.0);
        assert_abs_diff_eq!(reduced_energy_allowance(&constants, 30, true), 150.0);
    }

    #[test]
    fn test_allowance_halved_at_fifteen_days() {
        let constants = RegulatedConstants::default();
        assert_abs_diff_eq!(reduced_energy_allowance(&constants, 15, false), 50.0);
    }

    #[test]
    fn test_power_vat_threshold() {
        let constants = RegulatedConstants::default();
        let low = tax_power(Cost::from(3.0), Kilovoltamperes::from(3.45), &constants);
        assert_abs_diff_eq!(low.vat_reduced.0, 0.18, epsilon = 1e-12);
        assert_abs_diff_eq!(low.vat_standard.0, 0.0);
        let high = tax_power(Cost::from(3.0), Kilovoltamperes::from(4.6), &constants);
        assert_abs_diff_eq!(high.vat_standard.0, 0.69, epsilon = 1e-12);
    }

    #[test]
    fn test_levy_proration_branches() {
        // Flat within a full billing month, daily-rated otherwise.
        assert_abs_diff_eq!(prorate_monthly(Cost::from(2.85), 30).0, 2.85);
        assert_abs_diff_eq!(prorate_monthly(Cost::from(2.85), 15).0, 1.425, epsilon = 1e-12);
        assert_abs_diff_eq!(prorate_monthly(Cost::from(2.85), 31).0, 2.85);
    }

    #[test]
    fn test_iec_waived_under_social_tariff() {
        let constants = RegulatedConstants::default();
        let levies = Levies::compute(150.0, 30, true, LevySwitches::default(), &constants);
        assert_abs_diff_eq!(levies.iec.total().0, 0.0);
        let levies = Levies::compute(150.0, 30, false, LevySwitches::default(), &constants);
        assert_abs_diff_eq!(levies.iec.base.0, 0.15, epsilon = 1e-12);
    }
}
