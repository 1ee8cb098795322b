//! Bonification Engine library crate.
//!
//! This crate exposes the order pricing and bonus simulation engine
//! and the API components as reusable modules.  External applications
//! may depend on the `bonification_engine` crate and call into
//! `engine::simulate` directly or embed the API via `api::build_router`.

pub mod models;
pub mod error;
pub mod pricing;
pub mod rules;
pub mod allocation;
pub mod engine;
pub mod config;
pub mod api;

pub use engine::{simulate, simulate_many, simulate_order, simulate_with};
pub use error::EngineError;
pub use pricing::aggregate;
