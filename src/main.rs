mod catalog;
mod cli;
mod constants;
mod consumption;
mod engine;
mod market;
mod prelude;
mod quantity;
mod tables;

use clap::Parser;
use serde::Serialize;
use tracing::level_filters::LevelFilter;

use crate::{
    catalog::{Catalog, TariffDefinition},
    cli::{Args, Command, DetailArgs, InputArgs, SimulateArgs},
    constants::RegulatedConstants,
    consumption::ConsumptionRecord,
    engine::{
        Evaluated, Evaluation, SimulationOptions,
        breakdown::CostBreakdown,
        warning::{EngineError, Warning},
    },
    market::MarketSeries,
    prelude::*,
    tables::{build_invoice_table, build_ranking_table, build_unit_price_table, format_warnings},
};

fn main() -> Result {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::INFO)
        .with_writer(std::io::stderr)
        .init();

    match Args::parse().command {
        Command::Simulate(args) => simulate(&args),
        Command::Detail(args) => detail(&args),
    }
}

fn load(input: &InputArgs) -> Result<(MarketSeries, Catalog, RegulatedConstants)> {
    let market = MarketSeries::read_from(&input.market_file)?;
    let catalog = Catalog::read_from(&input.catalog_file)?;
    let constants = match &input.constants_file {
        Some(path) => RegulatedConstants::read_from(path)?,
        None => RegulatedConstants::default(),
    };
    Ok((market, catalog, constants))
}

/// JSON shape of one catalog outcome, the export interface.
#[derive(Serialize)]
struct ReportRow<'a> {
    plan: &'a TariffDefinition,
    #[serde(skip_serializing_if = "Option::is_none")]
    breakdown: Option<&'a CostBreakdown>,
    warnings: &'a [Warning],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn report_row<'a>(
    plan: &'a TariffDefinition,
    result: &'a Result<Evaluated, EngineError>,
) -> ReportRow<'a> {
    match result {
        Ok(evaluated) => ReportRow {
            plan,
            breakdown: Some(&evaluated.breakdown),
            warnings: &evaluated.warnings,
            error: None,
        },
        Err(error) => ReportRow { plan, breakdown: None, warnings: &[], error: Some(error.to_string()) },
    }
}

fn evaluate_one(
    plan: &TariffDefinition,
    market: &MarketSeries,
    consumption: &ConsumptionRecord,
    constants: &RegulatedConstants,
    options: &SimulationOptions,
) -> Result<Evaluated, EngineError> {
    Evaluation::builder()
        .plan(plan)
        .market(market)
        .consumption(consumption)
        .constants(constants)
        .options(options)
        .build()
        .evaluate()
}

fn simulate(args: &SimulateArgs) -> Result {
    let (market, catalog, constants) = load(&args.input)?;
    let consumption = args.consumption.to_record()?;
    let options = args.billing.options(args.input.from, args.input.to);

    // Every plan is evaluated independently against the shared read-only
    // inputs.
    let mut rows: Vec<(&TariffDefinition, Result<Evaluated, EngineError>)> = catalog
        .0
        .iter()
        .map(|plan| {
            let result = evaluate_one(plan, &market, &consumption, &constants, &options);
            match &result {
                Ok(evaluated) => {
                    for warning in &evaluated.warnings {
                        warn!(plan = %plan.name, %warning);
                    }
                }
                Err(error) => warn!(plan = %plan.name, %error, "plan unavailable"),
            }
            (plan, result)
        })
        .collect();
    rows.sort_by(|(_, lhs), (_, rhs)| match (lhs, rhs) {
        (Ok(lhs), Ok(rhs)) => lhs.breakdown.total.0.total_cmp(&rhs.breakdown.total.0),
        (Ok(_), Err(_)) => std::cmp::Ordering::Less,
        (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
        (Err(_), Err(_)) => std::cmp::Ordering::Equal,
    });
    info!(n_plans = rows.len(), "evaluated the catalog");

    if args.json {
        let report: Vec<ReportRow<'_>> =
            rows.iter().map(|(plan, result)| report_row(plan, result)).collect();
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", build_ranking_table(&rows));
    }
    Ok(())
}

fn detail(args: &DetailArgs) -> Result {
    let (market, catalog, constants) = load(&args.input)?;
    let plan = catalog
        .find(&args.plan)
        .with_context(|| format!("no plan named {:?} in the catalog", args.plan))?;
    let consumption = args.consumption.to_record()?;
    let options = args.billing.options(args.input.from, args.input.to);

    let result = evaluate_one(plan, &market, &consumption, &constants, &options);
    if args.json {
        println!("{}", serde_json::to_string_pretty(&report_row(plan, &result))?);
        return Ok(());
    }
    match result {
        Ok(evaluated) => {
            println!("{}, {} ({})", plan.name, plan.provider, plan.schedule);
            println!("{}", build_unit_price_table(&evaluated));
            println!("{}", build_invoice_table(&evaluated));
            if !evaluated.warnings.is_empty() {
                println!("{}", format_warnings(&evaluated));
            }
        }
        Err(error) => bail!("{}: {error}", plan.name),
    }
    Ok(())
}
