use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    engine::{regulated::PriceDecomposition, tax::TaxedAmount},
    market::Period,
    quantity::cost::Cost,
};

/// One block of the invoice (energy or power), taxed.
#[derive(Copy, Clone, Debug, Default, Serialize)]
pub struct ComponentTotals {
    /// Commercial share of the tax-exclusive base, euros.
    pub commercial: Cost,
    /// Regulated share (TAR after the social discount), euros.
    pub regulated: Cost,
    /// TSE share, euros; zero for power.
    pub tse: Cost,
    /// Tax-exclusive subtotal.
    pub subtotal: Cost,
    pub vat_reduced: Cost,
    pub vat_standard: Cost,
    /// VAT-inclusive total.
    pub total: Cost,
}

impl ComponentTotals {
    pub fn round_cents(mut self) -> Self {
        self.commercial = self.commercial.round_cents();
        self.regulated = self.regulated.round_cents();
        self.tse = self.tse.round_cents();
        self.subtotal = self.subtotal.round_cents();
        self.vat_reduced = self.vat_reduced.round_cents();
        self.vat_standard = self.vat_standard.round_cents();
        self.total = self.total.round_cents();
        self
    }
}

/// One step of the final adjustment ledger, with the running totals around
/// it so the caller can show "includes a rebate of X €; without it the cost
/// would be Y €".
#[derive(Clone, Debug, Serialize)]
pub struct Adjustment {
    pub label: String,
    /// Signed: rebates and discounts negative, surcharges positive.
    pub amount: Cost,
    pub total_before: Cost,
    pub total_after: Cost,
}

/// The fully decomposed bill for one plan. Every field the display and
/// export collaborators rely on is kept discrete under a stable key.
#[derive(Clone, Debug, Serialize)]
pub struct CostBreakdown {
    /// Final tax-exclusive unit energy prices per period, with their
    /// commercial/regulated/TSE decomposition (€/kWh, 4 decimals).
    pub unit_prices: BTreeMap<Period, PriceDecomposition>,
    /// Final tax-exclusive power price decomposition (€/day, 4 decimals).
    pub power_unit_price: PriceDecomposition,
    /// Billed kWh per period.
    pub consumption: BTreeMap<Period, f64>,
    pub total_kwh: f64,
    pub billing_days: u32,
    pub energy: ComponentTotals,
    pub power: ComponentTotals,
    pub iec: TaxedAmount,
    pub dgeg: TaxedAmount,
    pub cav: TaxedAmount,
    /// Tax-exclusive subtotal across energy, power and levies.
    pub tax_exclusive_subtotal: Cost,
    pub vat_reduced: Cost,
    pub vat_standard: Cost,
    /// VAT-inclusive total before any rebate or user adjustment.
    pub subtotal: Cost,
    pub adjustments: Vec<Adjustment>,
    /// Grand total after the adjustment ledger.
    pub total: Cost,
}

impl CostBreakdown {
    /// Sum of the signed rebate amounts (a negative number when anything
    /// was discounted).
    pub fn adjustment_sum(&self) -> Cost {
        self.adjustments.iter().map(|adjustment| adjustment.amount).sum()
    }
}
