use crate::quantity::rate::KilowattHourRate;

/// Market inputs to a provider formula: the spot price and loss coefficient
/// are either period averages (indexed-average plans) or single-slot values
/// (quarter-hourly plans); the annual loss is always the calendar-year mean.
#[derive(Copy, Clone, Debug)]
pub struct MarketSample {
    pub spot: KilowattHourRate,
    pub loss: f64,
    pub annual_loss: f64,
}

pub type PriceFormula = fn(&MarketSample) -> KilowattHourRate;

pub struct Formula {
    pub id: &'static str,
    pub provider: &'static str,
    pub price: PriceFormula,
}

/// `(spot + K) × loss`, K = 3.75 €/MWh.
fn coopernico_base(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from((sample.spot.0 + 0.003_75) * sample.loss)
}

/// `(spot + K) × loss`, K = 4.75 €/MWh, the green-origin variant.
fn coopernico_go(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from((sample.spot.0 + 0.004_75) * sample.loss)
}

/// `spot × loss × FA + fee`.
fn luzboa_spot(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from(sample.spot.0 * sample.loss * 1.02 + 0.012_52)
}

/// `(spot + CGS) × loss × FA + K`.
fn ezu_indexada(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from((sample.spot.0 + 0.003_5) * sample.loss * 1.015 + 0.000_9)
}

/// `(spot + CGS) × loss + K`: the additive constant lands after the loss
/// multiplier, unlike the Coopérnico shape.
fn galp_dinamico(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from((sample.spot.0 + 0.002_5) * sample.loss + 0.008)
}

/// `spot × loss × FA + fee`.
fn endesa_indexada(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from(sample.spot.0 * sample.loss * 1.035 + 0.005_45)
}

/// `(spot + K) × loss`.
fn meo_energia_spot(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from((sample.spot.0 + 0.005) * sample.loss)
}

/// `(spot + K) × loss × FA`.
fn plenitude_flex(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from((sample.spot.0 + 0.002_14) * sample.loss * 1.02)
}

/// `spot × loss + K`.
fn edp_indexada(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from(sample.spot.0 * sample.loss + 0.01)
}

/// `(spot + K) × annual loss + fee`, the only registered formula on the
/// annually-averaged loss coefficient.
fn alfa_indexado(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from((sample.spot.0 + 0.003) * sample.annual_loss + 0.006_5)
}

/// `(spot + K) × loss`.
fn repsol_spot(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from((sample.spot.0 + 0.005_8) * sample.loss)
}

/// `spot × loss × FA + fee`.
fn goldenergy_index(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from(sample.spot.0 * sample.loss * 1.025 + 0.006_5)
}

/// One registered function per provider formula. The shapes are close but
/// not interchangeable; adding a provider means adding a function here,
/// never extending a branch chain.
pub const REGISTRY: &[Formula] = &[
    Formula { id: "coopernico-base", provider: "Coopérnico", price: coopernico_base },
    Formula { id: "coopernico-go", provider: "Coopérnico", price: coopernico_go },
    Formula { id: "luzboa-spot", provider: "Luzboa", price: luzboa_spot },
    Formula { id: "ezu-indexada", provider: "EZU", price: ezu_indexada },
    Formula { id: "galp-dinamico", provider: "Galp", price: galp_dinamico },
    Formula { id: "endesa-indexada", provider: "Endesa", price: endesa_indexada },
    Formula { id: "meo-energia-spot", provider: "MEO Energia", price: meo_energia_spot },
    Formula { id: "plenitude-flex", provider: "Plenitude", price: plenitude_flex },
    Formula { id: "edp-indexada", provider: "EDP", price: edp_indexada },
    Formula { id: "alfa-indexado", provider: "Alfa Energia", price: alfa_indexado },
    Formula { id: "repsol-spot", provider: "Repsol", price: repsol_spot },
    Formula { id: "goldenergy-index", provider: "Goldenergy", price: goldenergy_index },
];

pub fn lookup(formula_id: &str) -> Option<&'static Formula> {
    REGISTRY.iter().find(|formula| formula.id == formula_id)
}

/// Generic fallback for unregistered formulas.
pub fn fallback(sample: &MarketSample) -> KilowattHourRate {
    KilowattHourRate::from(sample.spot.0 * sample.loss)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn sample(spot_mwh: f64, loss: f64) -> MarketSample {
        MarketSample {
            spot: KilowattHourRate::from_megawatt_hour_rate(spot_mwh),
            loss,
            annual_loss: loss,
        }
    }

    #[test]
    fn test_additive_before_loss() {
        // (0.060 + 0.003) × 1.10, the worked example for this shape.
        let sample = MarketSample {
            spot: KilowattHourRate::from(0.060),
            loss: 1.10,
            annual_loss: 1.10,
        };
        let price = KilowattHourRate::from((sample.spot.0 + 0.003) * sample.loss);
        assert_abs_diff_eq!(price.0, 0.0693, epsilon = 1e-12);
    }

    #[test]
    fn test_shapes_are_distinct() {
        // The same inputs must price differently under the four shapes.
        let sample = sample(60.0, 1.1);
        assert_abs_diff_eq!(coopernico_base(&sample).0, (0.060 + 0.003_75) * 1.1, epsilon = 1e-12);
        assert_abs_diff_eq!(luzboa_spot(&sample).0, 0.060 * 1.1 * 1.02 + 0.012_52, epsilon = 1e-12);
        assert_abs_diff_eq!(
            ezu_indexada(&sample).0,
            (0.060 + 0.003_5) * 1.1 * 1.015 + 0.000_9,
            epsilon = 1e-12,
        );
        assert_abs_diff_eq!(edp_indexada(&sample).0, 0.060 * 1.1 + 0.01, epsilon = 1e-12);
        let prices = [
            coopernico_base(&sample).0,
            luzboa_spot(&sample).0,
            ezu_indexada(&sample).0,
            edp_indexada(&sample).0,
        ];
        for (i, lhs) in prices.iter().enumerate() {
            for rhs in &prices[i + 1..] {
                assert!((lhs - rhs).abs() > 1e-6);
            }
        }
    }

    #[test]
    fn test_annual_loss_formula() {
        let sample = MarketSample {
            spot: KilowattHourRate::from(0.060),
            loss: 1.3,
            annual_loss: 1.1,
        };
        // Uses the annual mean, not the windowed one.
        assert_abs_diff_eq!(alfa_indexado(&sample).0, (0.060 + 0.003) * 1.1 + 0.006_5, epsilon = 1e-12);
    }

    #[test]
    fn test_lookup_and_fallback() {
        assert!(lookup("coopernico-base").is_some());
        assert!(lookup("nope").is_none());
        assert_abs_diff_eq!(fallback(&sample(60.0, 1.1)).0, 0.066, epsilon = 1e-12);
    }
}
