use comfy_table::{Attribute, Cell, CellAlignment, Color, Table, modifiers, presets};
use itertools::Itertools;

use crate::{
    catalog::{PlanKind, TariffDefinition},
    engine::{Evaluated, warning::EngineError},
    quantity::cost::Cost,
};

fn new_table() -> Table {
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED).apply_modifier(modifiers::UTF8_ROUND_CORNERS);
    table.enforce_styling();
    table
}

const fn kind_color(kind: PlanKind) -> Color {
    match kind {
        PlanKind::Fixed => Color::Reset,
        PlanKind::IndexedAverage => Color::DarkYellow,
        PlanKind::IndexedQuarterHourly => Color::Magenta,
    }
}

const fn kind_label(kind: PlanKind) -> &'static str {
    match kind {
        PlanKind::Fixed => "Fixed",
        PlanKind::IndexedAverage => "Indexed (avg)",
        PlanKind::IndexedQuarterHourly => "Indexed (¼h)",
    }
}

/// The catalog ranking: one row per plan, cheapest highlighted, plans
/// without market data shown as unavailable rather than zero.
pub fn build_ranking_table(
    rows: &[(&TariffDefinition, Result<Evaluated, EngineError>)],
) -> Table {
    let cheapest = rows
        .iter()
        .filter_map(|(_, result)| result.as_ref().ok())
        .map(|evaluated| evaluated.breakdown.total)
        .min_by(|lhs, rhs| lhs.0.total_cmp(&rhs.0));

    let mut table = new_table();
    table.set_header(vec![
        "Plan", "Provider", "Kind", "Schedule", "Energy", "Power", "Levies", "Adjust", "Total",
        "Notes",
    ]);
    for (plan, result) in rows {
        match result {
            Ok(evaluated) => {
                let breakdown = &evaluated.breakdown;
                let levies = (breakdown.iec + breakdown.dgeg + breakdown.cav).total();
                let total_color = if Some(breakdown.total) == cheapest {
                    Color::Green
                } else {
                    Color::Reset
                };
                let notes = if evaluated.warnings.is_empty() {
                    String::new()
                } else {
                    format!("⚠ {}", evaluated.warnings.len())
                };
                table.add_row(vec![
                    Cell::new(&plan.name),
                    Cell::new(&plan.provider).add_attribute(Attribute::Dim),
                    Cell::new(kind_label(plan.kind)).fg(kind_color(plan.kind)),
                    Cell::new(plan.schedule),
                    Cell::new(breakdown.energy.total).set_alignment(CellAlignment::Right),
                    Cell::new(breakdown.power.total).set_alignment(CellAlignment::Right),
                    Cell::new(levies).set_alignment(CellAlignment::Right),
                    Cell::new(breakdown.adjustment_sum().round_cents())
                        .set_alignment(CellAlignment::Right)
                        .fg(if breakdown.adjustments.is_empty() {
                            Color::Reset
                        } else {
                            Color::Green
                        }),
                    Cell::new(breakdown.total)
                        .set_alignment(CellAlignment::Right)
                        .fg(total_color)
                        .add_attribute(Attribute::Bold),
                    Cell::new(notes).fg(Color::DarkYellow),
                ]);
            }
            Err(error) => {
                table.add_row(vec![
                    Cell::new(&plan.name),
                    Cell::new(&plan.provider).add_attribute(Attribute::Dim),
                    Cell::new(kind_label(plan.kind)).fg(kind_color(plan.kind)),
                    Cell::new(plan.schedule),
                    Cell::new("—").set_alignment(CellAlignment::Right),
                    Cell::new("—").set_alignment(CellAlignment::Right),
                    Cell::new("—").set_alignment(CellAlignment::Right),
                    Cell::new("—").set_alignment(CellAlignment::Right),
                    Cell::new("unavailable").fg(Color::Red),
                    Cell::new(error.to_string()).fg(Color::Red),
                ]);
            }
        }
    }
    table
}

/// Per-period unit-price decomposition, plus the power price as its own
/// row.
pub fn build_unit_price_table(evaluated: &Evaluated) -> Table {
    let mut table = new_table();
    table.set_header(vec![
        "Component",
        "Input",
        "Commercial",
        "TAR",
        "Social disc.",
        "TAR after disc.",
        "TSE",
        "Final",
    ]);
    for (period, price) in &evaluated.breakdown.unit_prices {
        table.add_row(vec![
            Cell::new(format!("Energy {}", period.label())),
            Cell::new(format!("{:.4}", price.input)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", price.commercial)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", price.regulated_before_discount))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", price.social_discount))
                .set_alignment(CellAlignment::Right)
                .fg(if price.social_discount > 0.0 { Color::Green } else { Color::Reset }),
            Cell::new(format!("{:.4}", price.regulated)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", price.tse)).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.4}", price.unit_price))
                .set_alignment(CellAlignment::Right)
                .add_attribute(Attribute::Bold),
        ]);
    }
    let power = &evaluated.breakdown.power_unit_price;
    table.add_row(vec![
        Cell::new("Power (per day)"),
        Cell::new(format!("{:.4}", power.input)).set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.4}", power.commercial)).set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.4}", power.regulated_before_discount))
            .set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.4}", power.social_discount)).set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.4}", power.regulated)).set_alignment(CellAlignment::Right),
        Cell::new("—").set_alignment(CellAlignment::Right),
        Cell::new(format!("{:.4}", power.unit_price))
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
    ]);
    table
}

/// The invoice body: component subtotals, VAT, levies, adjustment ledger
/// and grand total.
pub fn build_invoice_table(evaluated: &Evaluated) -> Table {
    let breakdown = &evaluated.breakdown;
    let mut table = new_table();
    table.set_header(vec!["Line", "Excl. VAT", "VAT 6%", "VAT 23%", "Total"]);

    let mut money_row = |label: &str, base: Cost, reduced: Cost, standard: Cost| {
        table.add_row(vec![
            Cell::new(label),
            Cell::new(base.round_cents()).set_alignment(CellAlignment::Right),
            Cell::new(reduced.round_cents()).set_alignment(CellAlignment::Right),
            Cell::new(standard.round_cents()).set_alignment(CellAlignment::Right),
            Cell::new((base + reduced + standard).round_cents())
                .set_alignment(CellAlignment::Right),
        ]);
    };
    money_row(
        "Energy",
        breakdown.energy.subtotal,
        breakdown.energy.vat_reduced,
        breakdown.energy.vat_standard,
    );
    money_row(
        "Power",
        breakdown.power.subtotal,
        breakdown.power.vat_reduced,
        breakdown.power.vat_standard,
    );
    money_row("IEC", breakdown.iec.base, breakdown.iec.vat_reduced, breakdown.iec.vat_standard);
    money_row(
        "DGEG",
        breakdown.dgeg.base,
        breakdown.dgeg.vat_reduced,
        breakdown.dgeg.vat_standard,
    );
    money_row("CAV", breakdown.cav.base, breakdown.cav.vat_reduced, breakdown.cav.vat_standard);
    money_row(
        "Subtotal",
        breakdown.tax_exclusive_subtotal,
        breakdown.vat_reduced,
        breakdown.vat_standard,
    );

    for adjustment in &breakdown.adjustments {
        table.add_row(vec![
            Cell::new(format!(
                "{} (was {})",
                adjustment.label, adjustment.total_before,
            )),
            Cell::new(""),
            Cell::new(""),
            Cell::new(""),
            Cell::new(adjustment.amount)
                .set_alignment(CellAlignment::Right)
                .fg(if adjustment.amount.0 < 0.0 { Color::Green } else { Color::Red }),
        ]);
    }

    table.add_row(vec![
        Cell::new("Total").add_attribute(Attribute::Bold),
        Cell::new(""),
        Cell::new(""),
        Cell::new(""),
        Cell::new(breakdown.total)
            .set_alignment(CellAlignment::Right)
            .add_attribute(Attribute::Bold),
    ]);
    table
}

/// One line per warning, for the detail view.
pub fn format_warnings(evaluated: &Evaluated) -> String {
    evaluated.warnings.iter().map(|warning| format!("⚠ {warning}")).join("\n")
}
