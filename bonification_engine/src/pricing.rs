//! Order pricing.
//!
//! The aggregator reduces a list of order lines and a catalog
//! snapshot into total revenue and cost of goods sold.  Malformed rows
//! (unknown SKU, non-positive quantity, amounts past the decimal range)
//! are skipped, not rejected.

use crate::error::EngineError;
use crate::models::{OrderLine, OrderTotals, Product};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Lookup from SKU to catalog entry.  On duplicate SKUs the last entry
/// wins.
pub struct CatalogIndex<'a> {
    by_sku: HashMap<&'a str, &'a Product>,
}

/// An order line that takes part in pricing, with its extended amounts.
#[derive(Debug, Clone)]
pub struct PricedLine<'l, 'a> {
    pub line: &'l OrderLine,
    pub product: &'a Product,
    pub revenue: Decimal,
    pub cost: Decimal,
}

impl<'a> CatalogIndex<'a> {
    pub fn new(catalog: &'a [Product]) -> Self {
        let by_sku = catalog.iter().map(|p| (p.sku.as_str(), p)).collect();
        Self { by_sku }
    }

    pub fn get(&self, sku: &str) -> Option<&'a Product> {
        self.by_sku.get(sku).copied()
    }

    /// Price every usable line of an order.
    ///
    /// A line is dropped when its SKU is unknown, its quantity is not
    /// positive, or its amounts (or the running order totals) would leave
    /// the decimal range.  The sums of `revenue` and `cost` over the
    /// result always fit in a [`Decimal`].
    pub fn price_lines<'l>(&self, lines: &'l [OrderLine]) -> Vec<PricedLine<'l, 'a>> {
        let mut priced = Vec::with_capacity(lines.len());
        let mut totals = OrderTotals::default();
        for line in lines {
            let Some(product) = self.get(&line.sku) else {
                debug!(sku = %line.sku, "unknown sku");
                continue;
            };
            if line.quantity <= 0 {
                debug!(sku = %line.sku, quantity = line.quantity, "non-positive quantity");
                continue;
            }
            let qty = Decimal::from(line.quantity);
            let amounts = product
                .unit_sale_price
                .checked_mul(qty)
                .zip(product.unit_cost.checked_mul(qty))
                .and_then(|(revenue, cost)| {
                    let next = OrderTotals {
                        revenue: totals.revenue.checked_add(revenue)?,
                        cogs: totals.cogs.checked_add(cost)?,
                    };
                    Some((revenue, cost, next))
                });
            let Some((revenue, cost, next)) = amounts else {
                debug!(sku = %line.sku, quantity = line.quantity, "line amount overflows");
                continue;
            };
            totals = next;
            priced.push(PricedLine {
                line,
                product,
                revenue,
                cost,
            });
        }
        priced
    }
}

/// Sum revenue and COGS over the priced lines of an order.
pub fn aggregate(lines: &[OrderLine], catalog: &[Product]) -> OrderTotals {
    let index = CatalogIndex::new(catalog);
    let priced = index.price_lines(lines);
    let skipped = lines.len() - priced.len();
    if skipped > 0 {
        warn!(skipped, "ignored order lines that could not be priced");
    }
    priced.iter().fold(OrderTotals::default(), |acc, p| OrderTotals {
        revenue: acc.revenue + p.revenue,
        cogs: acc.cogs + p.cost,
    })
}

/// Reject catalog entries that cannot be looked up.
pub fn validate_catalog(catalog: &[Product]) -> Result<(), EngineError> {
    if catalog.iter().any(|p| p.sku.trim().is_empty()) {
        return Err(EngineError::MissingField {
            entity: "product",
            field: "sku",
        });
    }
    Ok(())
}
