//! Bonification simulation engine.
//!
//! The `engine` module turns order totals, a tier table and the order
//! lines into a [`SimulationResult`]: margin without bonus, with the
//! tier's cash bonus, with the tier's free packages, and with any
//! hand-entered bonuses.  Every call is a pure function of its
//! arguments.  Batches of orders are evaluated in parallel with
//! [`rayon`].

use crate::allocation::{order_skus, package_for, PackageAllocator, ProportionalAllocator};
use crate::error::EngineError;
use crate::models::{
    FreePackage, ManualRegime, OrderLine, Product, Scenario, SimulationResult, TierRule,
};
use crate::pricing::{aggregate, CatalogIndex, PricedLine};
use crate::rules::{match_tier, validate_rules};
use rayon::prelude::*;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeMap;
use tracing::debug;

/// Decimal places kept for money derived from percentages.
pub const MONEY_SCALE: u32 = 2;
/// Decimal places kept for margins (0.01 %).
pub const MARGIN_SCALE: u32 = 4;

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

fn overflow(quantity: &'static str) -> EngineError {
    EngineError::AmountOverflow { quantity }
}

fn checked_sum(
    amounts: impl IntoIterator<Item = Decimal>,
    quantity: &'static str,
) -> Result<Decimal, EngineError> {
    amounts.into_iter().try_fold(Decimal::ZERO, |acc, amount| {
        acc.checked_add(amount).ok_or_else(|| overflow(quantity))
    })
}

/// `(revenue - cogs - bonus) / revenue`, or zero when there is no
/// revenue.
pub fn margin(revenue: Decimal, cogs: Decimal, bonus: Decimal) -> Result<Decimal, EngineError> {
    if revenue <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    let ratio = revenue
        .checked_sub(cogs)
        .and_then(|net| net.checked_sub(bonus))
        .and_then(|net| net.checked_div(revenue))
        .ok_or_else(|| overflow("margin"))?;
    Ok(ratio.round_dp_with_strategy(MARGIN_SCALE, RoundingStrategy::MidpointAwayFromZero))
}

/// Simulate with the default [`ProportionalAllocator`].
///
/// `revenue` and `cogs` are normally produced by
/// [`aggregate`](crate::pricing::aggregate) over the same `lines` and
/// `catalog`.
pub fn simulate(
    revenue: Decimal,
    cogs: Decimal,
    rules: &[TierRule],
    lines: &[OrderLine],
    catalog: &[Product],
) -> Result<SimulationResult, EngineError> {
    simulate_with(&ProportionalAllocator, revenue, cogs, rules, lines, catalog)
}

/// Simulate using a caller-supplied free-package allocator.
///
/// Fails on a broken tier table, or when a bonus amount cannot be
/// represented (for example a free-package cost past the decimal
/// range).
pub fn simulate_with<A: PackageAllocator + ?Sized>(
    allocator: &A,
    revenue: Decimal,
    cogs: Decimal,
    rules: &[TierRule],
    lines: &[OrderLine],
    catalog: &[Product],
) -> Result<SimulationResult, EngineError> {
    validate_rules(rules)?;
    let index = CatalogIndex::new(catalog);
    let priced = index.price_lines(lines);

    let applied_rule = match_tier(rules, revenue);
    match applied_rule {
        Some(rule) => debug!(label = %rule.label, revenue = %revenue, "matched tier"),
        None => debug!(revenue = %revenue, "no tier matches revenue"),
    }

    // percent is at most 100, so the product stays within revenue
    let cash_bonus = applied_rule
        .map(|rule| round_money(revenue * (rule.cash_bonus_percent / Decimal::ONE_HUNDRED)))
        .unwrap_or(Decimal::ZERO);

    let free_packages = match applied_rule {
        Some(rule) => allocator.allocate(rule.free_package_count, &order_skus(&priced))?,
        None => Vec::new(),
    };
    let package_cost = checked_sum(free_packages.iter().map(|p| p.total_cost), "free package cost")?;

    Ok(SimulationResult {
        revenue,
        cogs,
        margin_no_bonus: margin(revenue, cogs, Decimal::ZERO)?,
        cash_bonus,
        margin_with_cash: margin(revenue, cogs, cash_bonus)?,
        free_packages,
        package_cost,
        margin_with_packages: margin(revenue, cogs, package_cost)?,
        applied_rule: applied_rule.cloned(),
        manual: manual_regime(revenue, cogs, &priced)?,
    })
}

/// Evaluate the bonuses typed in by hand on the order lines.  Yields
/// `None` when no priced line carries an override.
fn manual_regime(
    revenue: Decimal,
    cogs: Decimal,
    priced: &[PricedLine<'_, '_>],
) -> Result<Option<ManualRegime>, EngineError> {
    let mut seen = false;
    let mut cash_bonus = Decimal::ZERO;
    let mut units: BTreeMap<&str, (&Product, u64)> = BTreeMap::new();

    for PricedLine { line, product, .. } in priced {
        if !line.has_manual_override() {
            continue;
        }
        seen = true;
        if let Some(cash) = line.manual_cash_bonus {
            cash_bonus = cash_bonus
                .checked_add(cash.max(Decimal::ZERO))
                .ok_or_else(|| overflow("manual cash bonus"))?;
        }
        let free = line.manual_free_packages.unwrap_or(0).max(0).unsigned_abs();
        if free > 0 {
            let entry = units.entry(product.sku.as_str()).or_insert((*product, 0));
            entry.1 = entry
                .1
                .checked_add(free)
                .ok_or_else(|| overflow("manual free packages"))?;
        }
    }
    if !seen {
        return Ok(None);
    }

    let free_packages = units
        .into_values()
        .map(|(product, qty)| package_for(product, qty))
        .collect::<Result<Vec<FreePackage>, EngineError>>()?;
    let package_cost = checked_sum(free_packages.iter().map(|p| p.total_cost), "manual package cost")?;
    let bonus = cash_bonus
        .checked_add(package_cost)
        .ok_or_else(|| overflow("manual bonus"))?;
    Ok(Some(ManualRegime {
        cash_bonus,
        margin: margin(revenue, cogs, bonus)?,
        free_packages,
        package_cost,
    }))
}

/// Aggregate an order and simulate it in one step.
pub fn simulate_order(
    lines: &[OrderLine],
    catalog: &[Product],
    rules: &[TierRule],
) -> Result<SimulationResult, EngineError> {
    let totals = aggregate(lines, catalog);
    simulate(totals.revenue, totals.cogs, rules, lines, catalog)
}

/// Simulate many orders against the same catalog and tier table.
/// Orders are evaluated in parallel; results keep input order.
pub fn simulate_many(
    scenarios: &[Scenario],
    catalog: &[Product],
    rules: &[TierRule],
) -> Result<Vec<SimulationResult>, EngineError> {
    validate_rules(rules)?;
    scenarios
        .par_iter()
        .map(|scenario| simulate_order(&scenario.lines, catalog, rules))
        .collect()
}
