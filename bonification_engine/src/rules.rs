//! Tier rules and data snapshots.
//!
//! The `rules` module validates tiered incentive tables, finds the
//! band an order's revenue falls into, and loads catalog and rule
//! snapshots from a data directory.  Tables passed straight to the
//! engine are only checked rule by rule; overlapping bands resolve to
//! the first match in table order.  Tables loaded through [`RuleTable`]
//! are additionally checked for overlap.

use crate::error::EngineError;
use crate::models::{Product, TierRule};
use crate::pricing::validate_catalog;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{info, warn};

pub const CATALOG_FILE: &str = "catalog.json";
pub const RULES_FILE: &str = "rules.json";

/// Check a single rule for contract violations.
pub fn validate_rule(rule: &TierRule) -> Result<(), EngineError> {
    if rule.label.trim().is_empty() {
        return Err(EngineError::MissingField {
            entity: "tier rule",
            field: "label",
        });
    }
    if rule.range_start > rule.range_end {
        return Err(EngineError::InvalidTierRange {
            label: rule.label.clone(),
            start: rule.range_start,
            end: rule.range_end,
        });
    }
    if rule.cash_bonus_percent < Decimal::ZERO || rule.cash_bonus_percent > Decimal::ONE_HUNDRED {
        return Err(EngineError::InvalidBonusPercent {
            label: rule.label.clone(),
            percent: rule.cash_bonus_percent,
        });
    }
    Ok(())
}

pub fn validate_rules(rules: &[TierRule]) -> Result<(), EngineError> {
    rules.iter().try_for_each(validate_rule)
}

/// The first rule, in table order, whose band contains `revenue`.
pub fn match_tier(rules: &[TierRule], revenue: Decimal) -> Option<&TierRule> {
    rules.iter().find(|rule| rule.contains(revenue))
}

/// A tier table whose bands are known to be valid and disjoint.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<TierRule>,
}

impl RuleTable {
    /// Validate every rule and reject any pair of overlapping bands.
    /// Table order is preserved.
    pub fn new(rules: Vec<TierRule>) -> Result<Self, EngineError> {
        validate_rules(&rules)?;
        let mut by_start: Vec<&TierRule> = rules.iter().collect();
        by_start.sort_by(|a, b| a.range_start.cmp(&b.range_start));
        for pair in by_start.windows(2) {
            // inclusive bounds: touching bands overlap
            if pair[1].range_start <= pair[0].range_end {
                return Err(EngineError::OverlappingTiers {
                    first: pair[0].label.clone(),
                    second: pair[1].label.clone(),
                });
            }
        }
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[TierRule] {
        &self.rules
    }

    pub fn matching(&self, revenue: Decimal) -> Option<&TierRule> {
        match_tier(&self.rules, revenue)
    }
}

/// Read a JSON array from `dir/file`.  A missing file yields an empty
/// snapshot; a file that fails to parse is an error.
fn load_json_array<T: DeserializeOwned>(dir: &Path, file: &str) -> Result<Vec<T>> {
    let path = dir.join(file);
    if !path.is_file() {
        warn!(path = %path.display(), "snapshot file not found, using an empty snapshot");
        return Ok(Vec::new());
    }
    let data = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let items = serde_json::from_str::<Vec<T>>(&data)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(items)
}

/// Load the product catalog snapshot from `dir/catalog.json`.
pub fn load_catalog_from_dir(dir: &Path) -> Result<Vec<Product>> {
    let catalog: Vec<Product> = load_json_array(dir, CATALOG_FILE)?;
    validate_catalog(&catalog).context("invalid catalog snapshot")?;
    info!(products = catalog.len(), "loaded catalog");
    Ok(catalog)
}

/// Load and validate the tier table from `dir/rules.json`.
pub fn load_rules_from_dir(dir: &Path) -> Result<RuleTable> {
    let rules: Vec<TierRule> = load_json_array(dir, RULES_FILE)?;
    let table = RuleTable::new(rules).context("invalid tier rule table")?;
    info!(rules = table.rules().len(), "loaded tier rules");
    Ok(table)
}
