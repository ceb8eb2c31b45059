use std::{collections::BTreeMap, path::PathBuf};

use chrono::NaiveDateTime;
use clap::{Parser, Subcommand};

use crate::{
    consumption::ConsumptionRecord,
    engine::{SimulationOptions, tax::LevySwitches},
    market::Period,
    prelude::*,
    quantity::{cost::Cost, energy::KilowattHours, power::Kilovoltamperes},
};

#[derive(Parser)]
#[command(author, version, about, propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Evaluate the whole catalog against one consumption scenario and rank
    /// the plans by total cost.
    #[clap(name = "simulate")]
    Simulate(Box<SimulateArgs>),

    /// Fully decompose a single plan's bill: unit prices, VAT split, levies
    /// and the adjustment ledger.
    #[clap(name = "detail")]
    Detail(Box<DetailArgs>),
}

#[derive(Parser)]
pub struct InputArgs {
    /// Market table CSV: timestamp, spot (€/MWh), loss, cycle period
    /// columns (bd/bs/td/ts) and profile weight columns.
    #[clap(long = "market-file", env = "MARKET_FILE")]
    pub market_file: PathBuf,

    /// Plan catalog CSV.
    #[clap(long = "catalog-file", env = "CATALOG_FILE")]
    pub catalog_file: PathBuf,

    /// Regulated-constants TOML; compiled-in defaults when omitted.
    #[clap(long = "constants-file", env = "CONSTANTS_FILE")]
    pub constants_file: Option<PathBuf>,

    /// Window start, for example `2025-01-01T00:00:00`.
    #[clap(long)]
    pub from: Option<NaiveDateTime>,

    /// Window end (exclusive).
    #[clap(long)]
    pub to: Option<NaiveDateTime>,
}

#[derive(Parser)]
pub struct ConsumptionArgs {
    /// Smart-meter diagram CSV (timestamp, kwh); takes precedence over the
    /// manual inputs.
    #[clap(long = "diagram-file", env = "DIAGRAM_FILE")]
    pub diagram_file: Option<PathBuf>,

    /// Window total consumption for the manual path.
    #[clap(long = "total-kwh", default_value = "150")]
    pub total: KilowattHours,

    /// Explicit Vazio kWh (bi and tri options).
    #[clap(long = "kwh-vazio")]
    pub vazio: Option<f64>,

    /// Explicit Fora de Vazio kWh (bi option).
    #[clap(long = "kwh-fora-vazio")]
    pub fora_vazio: Option<f64>,

    /// Explicit Cheias kWh (tri option).
    #[clap(long = "kwh-cheias")]
    pub cheias: Option<f64>,

    /// Explicit Ponta kWh (tri option).
    #[clap(long = "kwh-ponta")]
    pub ponta: Option<f64>,
}

impl ConsumptionArgs {
    pub fn to_record(&self) -> Result<ConsumptionRecord> {
        if let Some(path) = &self.diagram_file {
            return ConsumptionRecord::read_diagram_from(path);
        }
        let mut splits = BTreeMap::new();
        for (period, value) in [
            (Period::V, self.vazio),
            (Period::F, self.fora_vazio),
            (Period::C, self.cheias),
            (Period::P, self.ponta),
        ] {
            if let Some(value) = value {
                splits.insert(period, KilowattHours::from(value));
            }
        }
        Ok(ConsumptionRecord::Manual {
            total: self.total,
            splits: (!splits.is_empty()).then_some(splits),
        })
    }
}

#[derive(Parser)]
pub struct BillingArgs {
    /// Billing days in the window.
    #[clap(long, default_value = "30", env = "BILLING_DAYS")]
    pub days: u32,

    /// Contracted power tier.
    #[clap(long = "power-kva", default_value = "3.45", env = "POWER_KVA")]
    pub power: Kilovoltamperes,

    /// The consumer qualifies for the regulated social tariff.
    #[clap(long = "social-tariff")]
    pub social_tariff: bool,

    /// Large-family reduced-VAT allowance (150 kWh instead of 100).
    #[clap(long = "large-family")]
    pub large_family: bool,

    /// Leave the IEC consumption tax off the invoice.
    #[clap(long = "no-iec")]
    pub no_iec: bool,

    /// Leave the DGEG fee off the invoice.
    #[clap(long = "no-dgeg")]
    pub no_dgeg: bool,

    /// Leave the audiovisual contribution off the invoice.
    #[clap(long = "no-cav")]
    pub no_cav: bool,

    /// Euro discount for personal/custom plans.
    #[clap(long, default_value = "0")]
    pub discount: Cost,

    /// Euro surcharge for personal/custom plans.
    #[clap(long, default_value = "0")]
    pub surcharge: Cost,
}

impl BillingArgs {
    pub fn options(
        &self,
        from: Option<NaiveDateTime>,
        to: Option<NaiveDateTime>,
    ) -> SimulationOptions {
        SimulationOptions {
            from,
            to,
            days: self.days,
            power: self.power,
            social_tariff: self.social_tariff,
            large_family: self.large_family,
            levies: LevySwitches { iec: !self.no_iec, dgeg: !self.no_dgeg, cav: !self.no_cav },
            user_discount: self.discount,
            user_surcharge: self.surcharge,
        }
    }
}

#[derive(Parser)]
pub struct SimulateArgs {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub consumption: ConsumptionArgs,

    #[clap(flatten)]
    pub billing: BillingArgs,

    /// Emit the full breakdown list as JSON instead of the table.
    #[clap(long)]
    pub json: bool,
}

#[derive(Parser)]
pub struct DetailArgs {
    #[clap(flatten)]
    pub input: InputArgs,

    #[clap(flatten)]
    pub consumption: ConsumptionArgs,

    #[clap(flatten)]
    pub billing: BillingArgs,

    /// Catalog name of the plan to decompose.
    #[clap(long)]
    pub plan: String,

    /// Emit the breakdown as JSON instead of the tables.
    #[clap(long)]
    pub json: bool,
}
