//! Data models for the Bonification Engine.
//!
//! The `models` module defines the serialisable structs describing a
//! product catalog, an order, a tiered incentive table and the result
//! of a simulation.  Money and percentages are carried as
//! [`Decimal`] so that revenue bands and margins are exact.  These
//! types form the basis of both the library contract and the JSON
//! bodies accepted by the HTTP API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A catalog entry.  Products are reference data owned by an external
/// catalog service; the engine only ever reads them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique stock keeping unit.
    pub sku: String,
    /// Display name.
    pub name: String,
    /// Price charged per unit.
    pub unit_sale_price: Decimal,
    /// Cost of one unit to the seller.
    pub unit_cost: Decimal,
}

/// One line of an order as entered by the caller.
///
/// Lines whose `sku` is not in the catalog or whose `quantity` is not
/// positive are ignored during aggregation rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub sku: String,
    #[serde(alias = "qty")]
    pub quantity: i64,
    /// Cash bonus typed in by hand for this line.  Negative values are
    /// treated as zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_cash_bonus: Option<Decimal>,
    /// Free units typed in by hand for this line.  Negative values are
    /// treated as zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_free_packages: Option<i64>,
}

impl OrderLine {
    /// A plain line with no manual overrides.
    pub fn new(sku: impl Into<String>, quantity: i64) -> Self {
        Self {
            sku: sku.into(),
            quantity,
            manual_cash_bonus: None,
            manual_free_packages: None,
        }
    }

    /// Whether the line carries any hand-entered bonus.
    pub fn has_manual_override(&self) -> bool {
        self.manual_cash_bonus.is_some() || self.manual_free_packages.is_some()
    }
}

/// A revenue band mapping to a cash bonus and a number of free units.
///
/// Bands are inclusive on both ends.  `cash_bonus_percent` is expressed
/// on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierRule {
    pub range_start: Decimal,
    pub range_end: Decimal,
    pub cash_bonus_percent: Decimal,
    #[serde(default)]
    pub free_package_count: u32,
    pub label: String,
}

impl TierRule {
    /// Whether `revenue` falls inside this band.
    pub fn contains(&self, revenue: Decimal) -> bool {
        self.range_start <= revenue && revenue <= self.range_end
    }
}

/// Revenue and cost of goods sold for an order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub revenue: Decimal,
    pub cogs: Decimal,
}

/// Free units granted for one SKU and what they cost the seller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreePackage {
    pub sku: String,
    pub qty: u64,
    pub total_cost: Decimal,
}

/// Bonuses entered by hand on the order lines, evaluated side by side
/// with the rule-driven regimes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManualRegime {
    pub cash_bonus: Decimal,
    pub free_packages: Vec<FreePackage>,
    pub package_cost: Decimal,
    pub margin: Decimal,
}

/// The outcome of a single simulation.  Margins are ratios (0.28 means
/// 28 %), not percentages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub margin_no_bonus: Decimal,
    pub cash_bonus: Decimal,
    pub margin_with_cash: Decimal,
    pub free_packages: Vec<FreePackage>,
    pub package_cost: Decimal,
    pub margin_with_packages: Decimal,
    pub applied_rule: Option<TierRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual: Option<ManualRegime>,
}

/// Body of a simulation request.  `rules` and `catalog` override the
/// server's snapshots for this call only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub lines: Vec<OrderLine>,
    #[serde(default)]
    pub rules: Option<Vec<TierRule>>,
    #[serde(default)]
    pub catalog: Option<Vec<Product>>,
}

/// Body of a totals request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalsRequest {
    pub lines: Vec<OrderLine>,
}

/// One order in a batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub lines: Vec<OrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRequest {
    pub scenarios: Vec<Scenario>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResponse {
    pub results: Vec<SimulationResult>,
}
