//! Free-package allocation.
//!
//! A tier grants a number of free units; an allocator decides which
//! SKUs of the order they are drawn from.  The engine is generic over
//! [`PackageAllocator`] so alternative policies can be plugged in;
//! [`ProportionalAllocator`] is the default.

use crate::error::EngineError;
use crate::models::{FreePackage, Product};
use crate::pricing::PricedLine;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A SKU present in the order with its merged revenue.
#[derive(Debug, Clone)]
pub struct OrderSku<'a> {
    pub product: &'a Product,
    pub revenue: Decimal,
}

/// Merge priced lines by SKU.  Entries are sorted by SKU.
pub fn order_skus<'a>(priced: &[PricedLine<'_, 'a>]) -> Vec<OrderSku<'a>> {
    let mut merged: BTreeMap<&'a str, OrderSku<'a>> = BTreeMap::new();
    for p in priced {
        let entry = merged.entry(p.product.sku.as_str()).or_insert(OrderSku {
            product: p.product,
            revenue: Decimal::ZERO,
        });
        entry.revenue = entry.revenue.saturating_add(p.revenue);
    }
    merged.into_values().collect()
}

/// Build the package entry for `qty` free units of `product`.
pub fn package_for(product: &Product, qty: u64) -> Result<FreePackage, EngineError> {
    let total_cost = product
        .unit_cost
        .checked_mul(Decimal::from(qty))
        .ok_or(EngineError::AmountOverflow {
            quantity: "free package cost",
        })?;
    Ok(FreePackage {
        sku: product.sku.clone(),
        qty,
        total_cost,
    })
}

/// Distributes a count of free units across the SKUs of an order.
///
/// Allocators must be thread‑safe (`Send + Sync`) because batch
/// simulations run concurrently.
pub trait PackageAllocator: Send + Sync {
    /// Split `count` units over `skus` (sorted by SKU).  Entries with
    /// zero units should be omitted.
    fn allocate(&self, count: u32, skus: &[OrderSku<'_>]) -> Result<Vec<FreePackage>, EngineError>;
}

/// Allocates units in proportion to each SKU's share of revenue,
/// rounding down, and gives the units lost to rounding to the SKU with
/// the largest revenue (lowest SKU on ties).
#[derive(Debug, Clone, Copy, Default)]
pub struct ProportionalAllocator;

/// `floor(units * revenue / total)`, never above the exact quotient.
fn proportional_share(units: Decimal, revenue: Decimal, total: Decimal) -> u64 {
    let exact = units.checked_mul(revenue).and_then(|weighted| {
        let mut share = weighted.checked_div(total)?.floor();
        // division rounds at 28 digits
        if share.checked_mul(total).map_or(true, |back| back > weighted) {
            share = share.saturating_sub(Decimal::ONE);
        }
        Some(share)
    });
    // past the decimal range, fall back to the ratio (revenue <= total)
    let share = exact.or_else(|| {
        revenue
            .checked_div(total)
            .and_then(|ratio| units.checked_mul(ratio))
            .map(|v| v.floor())
    });
    share
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO)
        .to_u64()
        .unwrap_or(0)
}

impl PackageAllocator for ProportionalAllocator {
    fn allocate(&self, count: u32, skus: &[OrderSku<'_>]) -> Result<Vec<FreePackage>, EngineError> {
        if count == 0 || skus.is_empty() {
            return Ok(Vec::new());
        }
        let total_revenue = skus
            .iter()
            .fold(Decimal::ZERO, |acc, s| acc.saturating_add(s.revenue));
        let units = Decimal::from(count);

        let mut shares: Vec<u64> = skus
            .iter()
            .map(|s| {
                if total_revenue.is_zero() {
                    0
                } else {
                    proportional_share(units, s.revenue, total_revenue)
                }
            })
            .collect();

        // skus is sorted, so keeping the first maximum picks the lowest SKU
        let leader = skus
            .iter()
            .enumerate()
            .fold(0, |best, (i, s)| if s.revenue > skus[best].revenue { i } else { best });
        let assigned = shares.iter().fold(0u64, |acc, q| acc.saturating_add(*q));
        shares[leader] = shares[leader].saturating_add(u64::from(count).saturating_sub(assigned));

        skus.iter()
            .zip(shares)
            .filter(|(_, qty)| *qty > 0)
            .map(|(s, qty)| package_for(s.product, qty))
            .collect()
    }
}
