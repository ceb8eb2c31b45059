use serde::Serialize;

/// Tax-exclusive unit price, decomposed. Energy prices are €/kWh, power
/// prices €/day; every intermediate is retained for the audit breakdown.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
pub struct PriceDecomposition {
    /// The resolved input price, as the provider publishes it.
    pub input: f64,
    /// Commercial component, excluding the regulated tariff.
    pub commercial: f64,
    pub regulated_before_discount: f64,
    /// Social-tariff discount actually applied (clamped, see `regulated`).
    pub social_discount: f64,
    /// Regulated component after the discount, never negative.
    pub regulated: f64,
    /// TSE surcharge adder; zero for power and for plans that declare it
    /// included.
    pub tse: f64,
    /// Final tax-exclusive unit price: commercial + regulated + tse.
    pub unit_price: f64,
}

impl PriceDecomposition {
    /// Round every field to four decimals, the published unit-price
    /// resolution.
    pub fn round_prices(mut self) -> Self {
        let round = |value: f64| (value * 10_000.0).round() / 10_000.0;
        self.input = round(self.input);
        self.commercial = round(self.commercial);
        self.regulated_before_discount = round(self.regulated_before_discount);
        self.social_discount = round(self.social_discount);
        self.regulated = round(self.regulated);
        self.tse = round(self.tse);
        self.unit_price = round(self.unit_price);
        self
    }
}

/// Split an input price into commercial and regulated components, add the
/// TSE surcharge, apply the social-tariff discount.
///
/// When the TAR is declared included, `commercial + regulated == input`;
/// otherwise the catalog TAR is layered on top. The discount only ever
/// reduces the regulated component down to zero; any excess is dropped.
pub fn decompose(
    input: f64,
    tar: f64,
    tar_included: bool,
    tse: f64,
    tse_included: bool,
    social_discount: f64,
) -> PriceDecomposition {
    let commercial = if tar_included { input - tar } else { input };
    let regulated_before_discount = tar;
    let regulated = (regulated_before_discount - social_discount).max(0.0);
    let applied_discount = regulated_before_discount - regulated;
    let tse = if tse_included { 0.0 } else { tse };
    PriceDecomposition {
        input,
        commercial,
        regulated_before_discount,
        social_discount: applied_discount,
        regulated,
        tse,
        unit_price: commercial + regulated + tse,
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn test_tar_included_splits_the_input() {
        let split = decompose(0.15, 0.0436, true, 0.0, true, 0.0);
        assert_abs_diff_eq!(split.commercial + split.regulated, 0.15, epsilon = 1e-12);
        assert_abs_diff_eq!(split.unit_price, 0.15, epsilon = 1e-12);
    }

    #[test]
    fn test_tar_excluded_layers_on_top() {
        let split = decompose(0.10, 0.0436, false, 0.0, true, 0.0);
        assert_abs_diff_eq!(split.commercial, 0.10, epsilon = 1e-12);
        assert_abs_diff_eq!(split.unit_price, 0.1436, epsilon = 1e-12);
    }

    #[test]
    fn test_tse_added_unless_included() {
        let with_tse = decompose(0.10, 0.04, false, 0.000_12, false, 0.0);
        assert_abs_diff_eq!(with_tse.unit_price, 0.140_12, epsilon = 1e-12);
        let without = decompose(0.10, 0.04, false, 0.000_12, true, 0.0);
        assert_abs_diff_eq!(without.unit_price, 0.14, epsilon = 1e-12);
    }

    #[test]
    fn test_social_discount_clamped_at_zero() {
        // The discount exceeds the raw TAR value: the regulated component
        // bottoms out at zero instead of going negative.
        let split = decompose(0.20, 0.05, true, 0.0, true, 0.12);
        assert_abs_diff_eq!(split.regulated, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(split.social_discount, 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(split.unit_price, 0.15, epsilon = 1e-12);
    }
}
