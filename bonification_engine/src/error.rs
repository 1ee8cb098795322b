//! Errors surfaced by the engine.
//!
//! Data-quality problems (unknown SKUs, empty orders, revenue outside
//! every band) never show up here; they degrade to zero contributions.
//! Only broken configuration and caller-contract violations are
//! reported.

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("tier rule `{label}` has range start {start} greater than range end {end}")]
    InvalidTierRange {
        label: String,
        start: Decimal,
        end: Decimal,
    },

    #[error("tier rule `{label}` has cash bonus percent {percent} outside 0..=100")]
    InvalidBonusPercent { label: String, percent: Decimal },

    #[error("tier rules `{first}` and `{second}` have overlapping revenue ranges")]
    OverlappingTiers { first: String, second: String },

    #[error("{entity} is missing required field `{field}`")]
    MissingField {
        entity: &'static str,
        field: &'static str,
    },

    #[error("{quantity} exceeds the representable decimal range")]
    AmountOverflow { quantity: &'static str },
}
