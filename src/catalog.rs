use std::{collections::BTreeMap, path::Path};

use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};

use crate::{
    market::{Cycle, Period, Schedule},
    prelude::*,
    quantity::{
        cost::Cost,
        rate::{DayRate, KilowattHourRate},
    },
};

/// How the plan's energy price is formed.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlanKind {
    /// Catalog unit prices, taken as-is per period.
    Fixed,
    /// A provider formula over period-averaged market data.
    IndexedAverage,
    /// A provider formula over each market slot, weighted by a consumption
    /// shape (BTN).
    IndexedQuarterHourly,
}

/// Post-processing on the resolved per-period prices.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceOverride {
    /// All periods forced to the plan's Simples-equivalent price.
    FlattenToSimples,
}

/// Partner-specific rebate rule.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "rule", content = "percent")]
pub enum PartnerRule {
    /// Percent of a parallel gross total computed with the social tariff
    /// forced off (Continente-style coupon).
    PercentOfGross(f64),
    /// Percent of the running post-discount total.
    PercentOfTotal(f64),
}

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromoRebate {
    /// Monthly rebate, euros.
    pub monthly: Cost,
    /// Number of billing months the rebate lasts, when limited.
    pub month_limit: Option<u32>,
}

/// One catalog entry. Immutable per evaluation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TariffDefinition {
    pub name: String,
    pub provider: String,
    pub kind: PlanKind,
    pub schedule: Schedule,
    pub cycle: Cycle,
    /// Per-period unit energy prices for fixed plans, €/kWh.
    pub prices: BTreeMap<Period, KilowattHourRate>,
    /// Registry key for indexed plans.
    pub formula_id: Option<String>,
    /// €/day of contracted power.
    pub power_price: DayRate,
    pub tar_in_energy: bool,
    pub tar_in_power: bool,
    pub tse_in_energy: bool,
    pub price_override: Option<PriceOverride>,
    pub promo: Option<PromoRebate>,
    pub partner: Option<PartnerRule>,
    pub segment: String,
    pub billing: String,
    pub payment: String,
    pub url: Option<String>,
    pub notes: Option<String>,
}

#[derive(Deserialize)]
struct CatalogRow {
    name: String,
    provider: String,
    kind: String,
    schedule: String,
    cycle: String,
    price_s: Option<f64>,
    price_v: Option<f64>,
    price_f: Option<f64>,
    price_c: Option<f64>,
    price_p: Option<f64>,
    #[serde(default)]
    formula_id: String,
    power_price: f64,
    tar_in_energy: bool,
    tar_in_power: bool,
    tse_in_energy: bool,
    #[serde(default)]
    price_override: String,
    promo_rebate: Option<f64>,
    promo_month_limit: Option<u32>,
    #[serde(default)]
    partner_rule: String,
    partner_percent: Option<f64>,
    #[serde(default)]
    segment: String,
    #[serde(default)]
    billing: String,
    #[serde(default)]
    payment: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    notes: String,
}

impl CatalogRow {
    fn into_definition(self) -> Result<TariffDefinition> {
        let kind = match self.kind.as_str() {
            "fixed" => PlanKind::Fixed,
            "indexed-average" => PlanKind::IndexedAverage,
            "indexed-quarter-hourly" => PlanKind::IndexedQuarterHourly,
            other => bail!("unknown plan kind {other:?}"),
        };
        let schedule = match self.schedule.as_str() {
            "simples" => Schedule::Simples,
            "bi" | "bi-horaria" => Schedule::BiHoraria,
            "tri" | "tri-horaria" => Schedule::TriHoraria,
            other => bail!("unknown schedule {other:?}"),
        };
        let cycle = match self.cycle.as_str() {
            "" | "daily" => Cycle::Daily,
            "weekly" => Cycle::Weekly,
            other => bail!("unknown cycle {other:?}"),
        };
        let price_override = match self.price_override.as_str() {
            "" => None,
            "flatten-to-simples" => Some(PriceOverride::FlattenToSimples),
            other => bail!("unknown price override {other:?}"),
        };
        let partner = match self.partner_rule.as_str() {
            "" => None,
            "percent-of-gross" => Some(PartnerRule::PercentOfGross(
                self.partner_percent.context("partner rule without a percent")?,
            )),
            "percent-of-total" => Some(PartnerRule::PercentOfTotal(
                self.partner_percent.context("partner rule without a percent")?,
            )),
            other => bail!("unknown partner rule {other:?}"),
        };
        let mut prices = BTreeMap::new();
        for (period, price) in [
            (Period::S, self.price_s),
            (Period::V, self.price_v),
            (Period::F, self.price_f),
            (Period::C, self.price_c),
            (Period::P, self.price_p),
        ] {
            if let Some(price) = price {
                prices.insert(period, KilowattHourRate::from(price));
            }
        }
        Ok(TariffDefinition {
            name: self.name,
            provider: self.provider,
            kind,
            schedule,
            cycle,
            prices,
            formula_id: (!self.formula_id.is_empty()).then_some(self.formula_id),
            power_price: DayRate::from(self.power_price),
            tar_in_energy: self.tar_in_energy,
            tar_in_power: self.tar_in_power,
            tse_in_energy: self.tse_in_energy,
            price_override,
            promo: self.promo_rebate.map(|monthly| PromoRebate {
                monthly: Cost::from(monthly),
                month_limit: self.promo_month_limit,
            }),
            partner,
            segment: self.segment,
            billing: self.billing,
            payment: self.payment,
            url: (!self.url.is_empty()).then_some(self.url),
            notes: (!self.notes.is_empty()).then_some(self.notes),
        })
    }
}

/// The loaded plan catalog.
pub struct Catalog(pub Vec<TariffDefinition>);

impl Catalog {
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn read_from(path: &Path) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .with_context(|| format!("failed to open the catalog at {}", path.display()))?;
        let mut plans = Vec::new();
        for row in reader.deserialize() {
            let row: CatalogRow = match row {
                Ok(row) => row,
                Err(error) => {
                    warn!("skipping an invalid catalog row: {error:#}");
                    continue;
                }
            };
            let name = row.name.clone();
            match row.into_definition() {
                Ok(plan) => plans.push(plan),
                Err(error) => warn!("skipping the plan {name:?}: {error:#}"),
            }
        }
        info!(n_plans = plans.len(), "loaded the catalog");
        Ok(Self(plans))
    }

    pub fn find(&self, name: &str) -> Option<&TariffDefinition> {
        self.0.iter().find(|plan| plan.name == name)
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;

    /// A plain fixed Simples plan used across engine tests.
    pub fn fixed_simples_plan() -> TariffDefinition {
        TariffDefinition {
            name: "Fixo Simples".to_string(),
            provider: "Test Energia".to_string(),
            kind: PlanKind::Fixed,
            schedule: Schedule::Simples,
            cycle: Cycle::Daily,
            prices: BTreeMap::from([(Period::S, KilowattHourRate::from(0.15))]),
            formula_id: None,
            power_price: DayRate::from(0.10),
            tar_in_energy: true,
            tar_in_power: true,
            tse_in_energy: true,
            price_override: None,
            promo: None,
            partner: None,
            segment: "residencial".to_string(),
            billing: "mensal".to_string(),
            payment: "debito-direto".to_string(),
            url: None,
            notes: None,
        }
    }

    #[test]
    fn test_catalog_row_parsing() {
        let csv = "\
name,provider,kind,schedule,cycle,price_s,price_v,price_f,price_c,price_p,formula_id,power_price,tar_in_energy,tar_in_power,tse_in_energy,price_override,promo_rebate,promo_month_limit,partner_rule,partner_percent,segment,billing,payment,url,notes
Indexado Bi,Coop,indexed-average,bi,weekly,,,,,,coopernico-base,0.1543,false,false,false,,1.5,12,percent-of-gross,0.10,residencial,mensal,debito-direto,,";
        let mut reader = ReaderBuilder::new().from_reader(csv.as_bytes());
        let row: CatalogRow = reader.deserialize().next().unwrap().unwrap();
        let plan = row.into_definition().unwrap();
        assert_eq!(plan.kind, PlanKind::IndexedAverage);
        assert_eq!(plan.schedule, Schedule::BiHoraria);
        assert_eq!(plan.cycle, Cycle::Weekly);
        assert_eq!(plan.formula_id.as_deref(), Some("coopernico-base"));
        assert_eq!(plan.partner, Some(PartnerRule::PercentOfGross(0.10)));
        assert_eq!(plan.promo.unwrap().month_limit, Some(12));
    }
}
