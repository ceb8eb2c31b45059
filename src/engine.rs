pub mod aggregate;
pub mod breakdown;
pub mod formula;
pub mod regulated;
pub mod tax;
pub mod warning;

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use crate::{
    catalog::{PartnerRule, PlanKind, PriceOverride, PromoRebate, TariffDefinition},
    consumption::ConsumptionRecord,
    constants::RegulatedConstants,
    engine::{
        aggregate::{ConsumptionSplit, market_stats, split_consumption},
        breakdown::{Adjustment, ComponentTotals, CostBreakdown},
        formula::MarketSample,
        regulated::{PriceDecomposition, decompose},
        tax::{
            Levies, LevySwitches, TaxedAmount, is_full_billing_month, reduced_energy_allowance,
            tax_energy_period, tax_power,
        },
        warning::{EngineError, Warning},
    },
    market::{MarketSeries, Period, Profile},
    quantity::{cost::Cost, power::Kilovoltamperes, rate::DayRate},
};

/// The consumer scenario a catalog is evaluated against.
#[derive(Clone, Debug)]
pub struct SimulationOptions {
    pub from: Option<NaiveDateTime>,
    pub to: Option<NaiveDateTime>,
    /// Billing days in the window.
    pub days: u32,
    pub power: Kilovoltamperes,
    pub social_tariff: bool,
    pub large_family: bool,
    pub levies: LevySwitches,
    /// Euro discount for personal/custom plans; zero otherwise.
    pub user_discount: Cost,
    /// Euro surcharge for personal/custom plans; zero otherwise.
    pub user_surcharge: Cost,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            from: None,
            to: None,
            days: 30,
            power: Kilovoltamperes::from(3.45),
            social_tariff: false,
            large_family: false,
            levies: LevySwitches::default(),
            user_discount: Cost::ZERO,
            user_surcharge: Cost::ZERO,
        }
    }
}

/// The outcome for one plan.
pub struct Evaluated {
    pub plan: TariffDefinition,
    pub breakdown: CostBreakdown,
    pub warnings: Vec<Warning>,
}

/// Pure evaluation of one plan against shared, read-only inputs. Nothing is
/// mutated, so a catalog can be mapped over trivially.
#[derive(bon::Builder)]
pub struct Evaluation<'a> {
    plan: &'a TariffDefinition,
    market: &'a MarketSeries,
    consumption: &'a ConsumptionRecord,
    constants: &'a RegulatedConstants,
    options: &'a SimulationOptions,
}

/// VAT-inclusive pre-adjustment bill, produced by the pure billing core.
struct Bill {
    unit_prices: BTreeMap<Period, PriceDecomposition>,
    power_unit_price: PriceDecomposition,
    energy: ComponentTotals,
    power: ComponentTotals,
    levies: Levies,
    tax_exclusive_subtotal: Cost,
    vat_reduced: Cost,
    vat_standard: Cost,
    subtotal: Cost,
}

impl Evaluation<'_> {
    pub fn evaluate(self) -> Result<Evaluated, EngineError> {
        let options = self.options;
        let plan = self.plan;
        let mut warnings = Vec::new();

        self.validate_inputs(&mut warnings);

        let window = self.market.window(options.from, options.to);
        let profile =
            Profile::estimate(self.consumption.total(), options.days, options.power);
        let split = split_consumption(
            self.consumption,
            window,
            plan.schedule,
            plan.cycle,
            profile,
            &mut warnings,
        )
        .map_err(|_| self.missing_market_data())?;

        let mut resolved = self.resolve_energy_prices(window, profile, &mut warnings)?;
        if let Some(PriceOverride::FlattenToSimples) = plan.price_override {
            flatten_to_simples(&mut resolved, &split);
        }

        let (power_tar, exact_tier) = self.constants.tar_power(options.power);
        if !exact_tier {
            warnings.push(Warning::UnknownPowerTier { kva: options.power.0 });
        }

        let bill = self.bill(&resolved, &split, power_tar, options.social_tariff);

        let mut adjustments = Vec::new();
        let mut total = bill.subtotal;
        if let Some(promo) = plan.promo {
            let amount = -promo_rebate(promo, options.days);
            push_adjustment(&mut adjustments, &mut total, "promotional rebate", amount);
        }
        if let Some(partner) = plan.partner {
            let (label, amount) = match partner {
                PartnerRule::PercentOfGross(percent) => {
                    // Deliberately based on the gross bill with the social
                    // tariff off, unlike every other rebate.
                    let gross = if options.social_tariff {
                        self.bill(&resolved, &split, power_tar, false).subtotal
                    } else {
                        bill.subtotal
                    };
                    ("partner rebate (gross base)", -(gross * percent))
                }
                PartnerRule::PercentOfTotal(percent) => ("partner rebate", -(total * percent)),
            };
            push_adjustment(&mut adjustments, &mut total, label, amount);
        }
        if options.user_discount != Cost::ZERO {
            push_adjustment(&mut adjustments, &mut total, "user discount", -options.user_discount);
        }
        if options.user_surcharge != Cost::ZERO {
            push_adjustment(&mut adjustments, &mut total, "user surcharge", options.user_surcharge);
        }

        let breakdown = CostBreakdown {
            unit_prices: bill
                .unit_prices
                .iter()
                .map(|(&period, decomposition)| (period, decomposition.round_prices()))
                .collect(),
            power_unit_price: bill.power_unit_price.round_prices(),
            consumption: split
                .periods
                .iter()
                .map(|(&period, energy)| (period, energy.0))
                .collect(),
            total_kwh: split.total.0,
            billing_days: options.days,
            energy: bill.energy.round_cents(),
            power: bill.power.round_cents(),
            iec: bill.levies.iec,
            dgeg: bill.levies.dgeg,
            cav: bill.levies.cav,
            tax_exclusive_subtotal: bill.tax_exclusive_subtotal.round_cents(),
            vat_reduced: bill.vat_reduced.round_cents(),
            vat_standard: bill.vat_standard.round_cents(),
            subtotal: bill.subtotal.round_cents(),
            adjustments,
            total: total.round_cents(),
        };
        Ok(Evaluated { plan: plan.clone(), breakdown, warnings })
    }

    fn missing_market_data(&self) -> EngineError {
        EngineError::MissingMarketData { from: self.options.from, to: self.options.to }
    }

    fn validate_inputs(&self, warnings: &mut Vec<Warning>) {
        for (&period, price) in &self.plan.prices {
            if !price.0.is_finite() || price.0 < 0.0 {
                warnings
                    .push(Warning::InvalidInput { field: format!("price_{period}"), value: price.0 });
            }
        }
        if !self.plan.power_price.0.is_finite() || self.plan.power_price.0 < 0.0 {
            warnings.push(Warning::InvalidInput {
                field: "power_price".to_string(),
                value: self.plan.power_price.0,
            });
        }
        if self.options.days == 0 {
            warnings.push(Warning::InvalidInput { field: "days".to_string(), value: 0.0 });
        }
    }

    /// Resolve the per-period tax-exclusive unit energy input prices, before
    /// the regulated-component handling.
    fn resolve_energy_prices(
        &self,
        window: &[crate::market::MarketSlot],
        profile: Profile,
        warnings: &mut Vec<Warning>,
    ) -> Result<BTreeMap<Period, f64>, EngineError> {
        let plan = self.plan;
        let mut resolved = BTreeMap::new();
        match plan.kind {
            PlanKind::Fixed => {
                for &period in plan.schedule.periods() {
                    let price = plan.prices.get(&period).copied().unwrap_or_else(|| {
                        warnings.push(Warning::InvalidInput {
                            field: format!("price_{period}"),
                            value: 0.0,
                        });
                        crate::quantity::rate::KilowattHourRate::ZERO
                    });
                    resolved.insert(period, price.0);
                }
            }

            PlanKind::IndexedAverage => {
                let stats =
                    market_stats(self.market, window, plan.schedule, plan.cycle, warnings)
                        .map_err(|_| self.missing_market_data())?;
                let price = self.formula(warnings);
                for (&period, sample) in &stats.periods {
                    let sample = MarketSample {
                        spot: sample.spot,
                        loss: sample.loss,
                        annual_loss: stats.annual_loss,
                    };
                    resolved.insert(period, price(&sample).0);
                }
            }

            PlanKind::IndexedQuarterHourly => {
                let stats =
                    market_stats(self.market, window, plan.schedule, plan.cycle, warnings)
                        .map_err(|_| self.missing_market_data())?;
                let price = self.formula(warnings);
                let diagram: Option<BTreeMap<NaiveDateTime, f64>> = match self.consumption {
                    ConsumptionRecord::Diagram(slots) => Some(
                        slots.iter().map(|(timestamp, energy)| (*timestamp, energy.0)).collect(),
                    ),
                    ConsumptionRecord::Manual { .. } => None,
                };

                // Per period: profile-weighted average always, and the
                // real-consumption-weighted one when a diagram is present.
                let mut profile_acc: BTreeMap<Period, (f64, f64)> = BTreeMap::new();
                let mut diagram_acc: BTreeMap<Period, (f64, f64)> = BTreeMap::new();
                for slot in window {
                    let Some(period) = slot.period(plan.schedule, plan.cycle) else {
                        continue;
                    };
                    let sample = MarketSample {
                        spot: slot.spot,
                        loss: slot.loss,
                        annual_loss: stats.annual_loss,
                    };
                    let instantaneous = price(&sample).0;
                    let weight = slot.profile_weight(profile);
                    let acc = profile_acc.entry(period).or_default();
                    acc.0 += weight;
                    acc.1 += weight * instantaneous;
                    if let Some(diagram) = &diagram {
                        let consumed = diagram.get(&slot.timestamp).copied().unwrap_or(0.0);
                        let acc = diagram_acc.entry(period).or_default();
                        acc.0 += consumed;
                        acc.1 += consumed * instantaneous;
                    }
                }
                for &period in plan.schedule.periods() {
                    // Diagram mode sums cost directly; the effective unit
                    // price is cost over consumption, with the profile
                    // price standing in for an unused period.
                    let by_diagram = diagram_acc
                        .get(&period)
                        .filter(|(consumed, _)| *consumed > 0.0)
                        .map(|(consumed, cost)| cost / consumed);
                    let by_profile = profile_acc
                        .get(&period)
                        .filter(|(weight, _)| *weight > 0.0)
                        .map(|(weight, weighted)| weighted / weight);
                    let unit_price = by_diagram.or(by_profile).unwrap_or_else(|| {
                        let sample = stats.periods[&period];
                        price(&MarketSample {
                            spot: sample.spot,
                            loss: sample.loss,
                            annual_loss: stats.annual_loss,
                        })
                        .0
                    });
                    resolved.insert(period, unit_price);
                }
            }
        }
        Ok(resolved)
    }

    /// The registered provider formula, or the generic spot × loss fallback
    /// with a warning.
    fn formula(&self, warnings: &mut Vec<Warning>) -> formula::PriceFormula {
        let formula_id = self.plan.formula_id.as_deref().unwrap_or_default();
        formula::lookup(formula_id).map_or_else(
            || {
                warnings.push(Warning::UnknownFormula { formula_id: formula_id.to_string() });
                formula::fallback as formula::PriceFormula
            },
            |formula| formula.price,
        )
    }

    /// The pure billing core: unit-price decomposition, VAT split and
    /// levies. Called a second time with the social tariff off when a
    /// partner rule needs the parallel gross total.
    fn bill(
        &self,
        resolved: &BTreeMap<Period, f64>,
        split: &ConsumptionSplit,
        power_tar: DayRate,
        social_tariff: bool,
    ) -> Bill {
        let plan = self.plan;
        let options = self.options;
        let constants = self.constants;

        let social_energy = if social_tariff { constants.social.energy.0 } else { 0.0 };
        let social_power = if social_tariff { constants.social.power.0 } else { 0.0 };

        let allowance = reduced_energy_allowance(constants, options.days, options.large_family);
        // Each period gets its consumption-share slice of the allowance;
        // with nothing consumed the reduced share is simply 0 %.
        let reduced_fraction =
            if split.total.0 > 0.0 { (allowance / split.total.0).min(1.0) } else { 0.0 };

        let mut unit_prices = BTreeMap::new();
        let mut energy = ComponentTotals::default();
        let mut energy_tax = TaxedAmount::ZERO;
        for (&period, &input) in resolved {
            let decomposition = decompose(
                input,
                constants.tar_energy(plan.schedule, period).0,
                plan.tar_in_energy,
                constants.tse.0,
                plan.tse_in_energy,
                social_energy,
            );
            let quantity = split.get(period).0;
            energy.commercial += Cost::from(decomposition.commercial * quantity);
            energy.regulated += Cost::from(decomposition.regulated * quantity);
            energy.tse += Cost::from(decomposition.tse * quantity);
            energy_tax = energy_tax
                + tax_energy_period(
                    decomposition.unit_price,
                    quantity,
                    quantity * reduced_fraction,
                    constants,
                );
            unit_prices.insert(period, decomposition);
        }
        energy.subtotal = energy_tax.base;
        energy.vat_reduced = energy_tax.vat_reduced;
        energy.vat_standard = energy_tax.vat_standard;
        energy.total = energy_tax.total();

        let power_unit_price = decompose(
            plan.power_price.0,
            power_tar.0,
            plan.tar_in_power,
            0.0,
            true,
            social_power,
        );
        let power_base = DayRate::from(power_unit_price.unit_price).over_days(options.days);
        let power_tax = tax_power(power_base, options.power, constants);
        let power = ComponentTotals {
            commercial: DayRate::from(power_unit_price.commercial).over_days(options.days),
            regulated: DayRate::from(power_unit_price.regulated).over_days(options.days),
            tse: Cost::ZERO,
            subtotal: power_tax.base,
            vat_reduced: power_tax.vat_reduced,
            vat_standard: power_tax.vat_standard,
            total: power_tax.total(),
        };

        let levies =
            Levies::compute(split.total.0, options.days, social_tariff, options.levies, constants);
        let levies_tax = levies.combined();

        let tax_exclusive_subtotal = energy_tax.base + power_tax.base + levies_tax.base;
        let vat_reduced = energy_tax.vat_reduced + power_tax.vat_reduced + levies_tax.vat_reduced;
        let vat_standard =
            energy_tax.vat_standard + power_tax.vat_standard + levies_tax.vat_standard;

        Bill {
            unit_prices,
            power_unit_price,
            energy,
            power,
            levies,
            tax_exclusive_subtotal,
            vat_reduced,
            vat_standard,
            subtotal: tax_exclusive_subtotal + vat_reduced + vat_standard,
        }
    }
}

/// Replace every period price by the plan's consumption-weighted
/// Simples-equivalent value.
fn flatten_to_simples(resolved: &mut BTreeMap<Period, f64>, split: &ConsumptionSplit) {
    let simples = if split.total.0 > 0.0 {
        resolved
            .iter()
            .map(|(&period, price)| price * split.get(period).0)
            .sum::<f64>()
            / split.total.0
    } else {
        resolved.values().sum::<f64>() / resolved.len().max(1) as f64
    };
    for price in resolved.values_mut() {
        *price = simples;
    }
}

/// Monthly promotional rebate over the window: flat within a full billing
/// month, `monthly / 30 × days` otherwise; the equivalent months are capped
/// by the plan's month-limit.
fn promo_rebate(promo: PromoRebate, days: u32) -> Cost {
    let equivalent_months =
        if is_full_billing_month(days) { 1.0 } else { f64::from(days) / 30.0 };
    let months = promo
        .month_limit
        .map_or(equivalent_months, |limit| equivalent_months.min(f64::from(limit)));
    promo.monthly * months
}

fn push_adjustment(
    adjustments: &mut Vec<Adjustment>,
    total: &mut Cost,
    label: &str,
    amount: Cost,
) {
    let total_before = *total;
    *total += amount;
    adjustments.push(Adjustment {
        label: label.to_string(),
        amount: amount.round_cents(),
        total_before: total_before.round_cents(),
        total_after: total.round_cents(),
    });
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use chrono::Timelike;

    use super::*;
    use crate::{
        catalog::tests::fixed_simples_plan,
        market::{Cycle, MarketSlot, Schedule, tests::synthetic_series},
        quantity::{energy::KilowattHours, rate::KilowattHourRate},
    };

    fn evaluate(
        plan: &TariffDefinition,
        market: &MarketSeries,
        consumption: &ConsumptionRecord,
        options: &SimulationOptions,
    ) -> Result<Evaluated, EngineError> {
        Evaluation::builder()
            .plan(plan)
            .market(market)
            .consumption(consumption)
            .constants(&RegulatedConstants::default())
            .options(options)
            .build()
            .evaluate()
    }

    fn indexed_plan(kind: PlanKind, formula_id: &str) -> TariffDefinition {
        TariffDefinition {
            kind,
            schedule: Schedule::BiHoraria,
            cycle: Cycle::Daily,
            prices: BTreeMap::new(),
            formula_id: Some(formula_id.to_string()),
            tar_in_energy: false,
            tar_in_power: false,
            tse_in_energy: false,
            ..fixed_simples_plan()
        }
    }

    /// Half a year of hourly slots with the spot price swinging through the
    /// day and the profile weight peaking in the evening.
    fn swinging_series(n_hours: usize) -> MarketSeries {
        let base = synthetic_series(n_hours, 60.0, 1.1);
        let slots = base
            .slots()
            .iter()
            .map(|slot| {
                let hour = f64::from(slot.timestamp.hour());
                MarketSlot {
                    spot: KilowattHourRate::from(0.060 + 0.002 * (hour - 12.0).abs()),
                    profile_a: 0.5 + 0.1 * hour,
                    profile_b: 0.5 + 0.1 * hour,
                    profile_c: 0.5 + 0.1 * hour,
                    ..slot.clone()
                }
            })
            .collect();
        MarketSeries::from_slots(slots)
    }

    #[test]
    fn test_fixed_simples_hand_check() {
        // 150 kWh over a full month at 0.15 €/kWh (everything included),
        // 3.45 kVA at 0.10 €/day: the invoice lines are reproducible by
        // hand.
        let plan = fixed_simples_plan();
        let market = synthetic_series(0, 0.0, 1.0);
        let consumption = ConsumptionRecord::Manual { total: KilowattHours::from(150.0), splits: None };
        let evaluated =
            evaluate(&plan, &market, &consumption, &SimulationOptions::default()).unwrap();
        let breakdown = &evaluated.breakdown;

        assert_abs_diff_eq!(breakdown.energy.subtotal.0, 22.50, epsilon = 0.005);
        assert_abs_diff_eq!(breakdown.energy.vat_reduced.0, 0.90, epsilon = 0.005);
        assert_abs_diff_eq!(breakdown.energy.vat_standard.0, 1.73, epsilon = 0.01);
        assert_abs_diff_eq!(breakdown.power.subtotal.0, 3.00, epsilon = 0.005);
        assert_abs_diff_eq!(breakdown.power.vat_reduced.0, 0.18, epsilon = 0.005);
        assert_abs_diff_eq!(breakdown.iec.base.0, 0.15, epsilon = 0.005);
        assert_abs_diff_eq!(breakdown.dgeg.base.0, 0.07, epsilon = 0.005);
        assert_abs_diff_eq!(breakdown.cav.base.0, 2.85, epsilon = 0.005);
        assert_abs_diff_eq!(breakdown.total.0, 31.60, epsilon = 0.01);
    }

    #[test]
    fn test_breakdown_identity() {
        let mut plan = fixed_simples_plan();
        plan.promo = Some(PromoRebate { monthly: Cost::from(1.50), month_limit: None });
        plan.partner = Some(PartnerRule::PercentOfTotal(0.05));
        let market = synthetic_series(24 * 30, 55.0, 1.08);
        let consumption = ConsumptionRecord::Manual { total: KilowattHours::from(210.0), splits: None };
        let options = SimulationOptions {
            user_discount: Cost::from(2.0),
            user_surcharge: Cost::from(0.5),
            ..SimulationOptions::default()
        };
        let evaluated = evaluate(&plan, &market, &consumption, &options).unwrap();
        let breakdown = &evaluated.breakdown;

        let rebuilt = breakdown.tax_exclusive_subtotal
            + breakdown.vat_reduced
            + breakdown.vat_standard
            + breakdown.adjustment_sum();
        assert_abs_diff_eq!(breakdown.total.0, rebuilt.0, epsilon = 0.01);
    }

    #[test]
    fn test_idempotence() {
        let plan = indexed_plan(PlanKind::IndexedAverage, "luzboa-spot");
        let market = swinging_series(24 * 30);
        let consumption = ConsumptionRecord::Manual { total: KilowattHours::from(180.0), splits: None };
        let options = SimulationOptions::default();
        let first = evaluate(&plan, &market, &consumption, &options).unwrap();
        let second = evaluate(&plan, &market, &consumption, &options).unwrap();
        assert_eq!(first.breakdown.total.0.to_bits(), second.breakdown.total.0.to_bits());
        assert_eq!(
            first.breakdown.tax_exclusive_subtotal.0.to_bits(),
            second.breakdown.tax_exclusive_subtotal.0.to_bits(),
        );
    }

    #[test]
    fn test_missing_market_data() {
        let market = synthetic_series(0, 0.0, 1.0);
        let consumption = ConsumptionRecord::Manual { total: KilowattHours::from(150.0), splits: None };
        let options = SimulationOptions::default();

        // Indexed plans report the condition...
        let indexed = indexed_plan(PlanKind::IndexedAverage, "coopernico-base");
        assert!(matches!(
            evaluate(&indexed, &market, &consumption, &options),
            Err(EngineError::MissingMarketData { .. }),
        ));

        // ...while a fixed Simples plan still computes normally.
        let fixed = fixed_simples_plan();
        assert!(evaluate(&fixed, &market, &consumption, &options).is_ok());
    }

    #[test]
    fn test_quarter_hourly_paths_agree() {
        // A synthetic diagram with exactly the standard profile's shape must
        // cost the same as the profile path.
        let market = swinging_series(24 * 30);
        let plan = indexed_plan(PlanKind::IndexedQuarterHourly, "coopernico-base");
        let options = SimulationOptions::default();

        let diagram_slots: Vec<_> = market
            .slots()
            .iter()
            .map(|slot| (slot.timestamp, KilowattHours::from(slot.profile_c * 0.1)))
            .collect();
        let total: KilowattHours = diagram_slots.iter().map(|(_, energy)| *energy).sum();

        let by_diagram = evaluate(
            &plan,
            &market,
            &ConsumptionRecord::Diagram(diagram_slots),
            &options,
        )
        .unwrap();
        let by_profile = evaluate(
            &plan,
            &market,
            &ConsumptionRecord::Manual { total, splits: None },
            &options,
        )
        .unwrap();
        assert_abs_diff_eq!(
            by_diagram.breakdown.total.0,
            by_profile.breakdown.total.0,
            epsilon = 0.01,
        );
    }

    #[test]
    fn test_continente_style_rebate_ignores_social_tariff() {
        // Intentional asymmetry: the partner percentage applies to the
        // gross bill with the social tariff off, while everything else
        // applies to the post-social total.
        let mut plan = fixed_simples_plan();
        plan.partner = Some(PartnerRule::PercentOfGross(0.10));
        let market = synthetic_series(0, 0.0, 1.0);
        let consumption = ConsumptionRecord::Manual { total: KilowattHours::from(150.0), splits: None };
        let social = SimulationOptions { social_tariff: true, ..SimulationOptions::default() };

        let evaluated = evaluate(&plan, &market, &consumption, &social).unwrap();
        let rebate = evaluated.breakdown.adjustments[0].amount;

        let mut gross_plan = plan.clone();
        gross_plan.partner = None;
        let gross = evaluate(&gross_plan, &market, &consumption, &SimulationOptions::default())
            .unwrap()
            .breakdown
            .subtotal;
        assert_abs_diff_eq!(rebate.0, -(gross.0 * 0.10), epsilon = 0.01);
        // And it is genuinely different from a post-social base.
        assert!((rebate.0.abs() - evaluated.breakdown.subtotal.0 * 0.10).abs() > 0.01);
    }

    #[test]
    fn test_promo_rebate_proration() {
        let promo = PromoRebate { monthly: Cost::from(1.50), month_limit: None };
        // Flat within a full billing month, including 28 and 31 days.
        assert_abs_diff_eq!(promo_rebate(promo, 30).0, 1.50);
        assert_abs_diff_eq!(promo_rebate(promo, 31).0, 1.50);
        // Daily-rated otherwise.
        assert_abs_diff_eq!(promo_rebate(promo, 15).0, 0.75, epsilon = 1e-12);
        // The month-limit caps a long window.
        let limited = PromoRebate { monthly: Cost::from(1.50), month_limit: Some(2) };
        assert_abs_diff_eq!(promo_rebate(limited, 90).0, 3.00, epsilon = 1e-12);
    }

    #[test]
    fn test_flatten_override_equalises_periods() {
        let mut plan = indexed_plan(PlanKind::IndexedAverage, "coopernico-base");
        plan.price_override = Some(PriceOverride::FlattenToSimples);
        let market = swinging_series(24 * 30);
        let consumption = ConsumptionRecord::Manual { total: KilowattHours::from(180.0), splits: None };
        let evaluated =
            evaluate(&plan, &market, &consumption, &SimulationOptions::default()).unwrap();
        let inputs: Vec<f64> =
            evaluated.breakdown.unit_prices.values().map(|price| price.input).collect();
        assert!(inputs.windows(2).all(|pair| (pair[0] - pair[1]).abs() < 1e-9));
    }

    #[test]
    fn test_unknown_formula_falls_back() {
        let plan = indexed_plan(PlanKind::IndexedAverage, "no-such-provider");
        let market = synthetic_series(24 * 30, 60.0, 1.1);
        let consumption = ConsumptionRecord::Manual { total: KilowattHours::from(150.0), splits: None };
        let evaluated =
            evaluate(&plan, &market, &consumption, &SimulationOptions::default()).unwrap();
        assert!(
            evaluated
                .warnings
                .iter()
                .any(|warning| matches!(warning, Warning::UnknownFormula { .. })),
        );
        // spot × loss, identical across these flat-market periods.
        for price in evaluated.breakdown.unit_prices.values() {
            assert_abs_diff_eq!(price.input, 0.060 * 1.1, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_negative_price_flagged_but_computed() {
        let mut plan = fixed_simples_plan();
        plan.prices.insert(Period::S, KilowattHourRate::from(-0.05));
        let market = synthetic_series(0, 0.0, 1.0);
        let consumption = ConsumptionRecord::Manual { total: KilowattHours::from(150.0), splits: None };
        let evaluated =
            evaluate(&plan, &market, &consumption, &SimulationOptions::default()).unwrap();
        assert!(
            evaluated
                .warnings
                .iter()
                .any(|warning| matches!(warning, Warning::InvalidInput { .. })),
        );
        assert!(evaluated.breakdown.energy.subtotal.0 < 0.0);
    }
}
