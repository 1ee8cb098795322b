//! HTTP API for the Bonification Engine.
//!
//! This module exposes a minimal REST API around the simulation engine
//! using the [`axum`](https://crates.io/crates/axum) framework.  The
//! server holds catalog and tier-rule snapshots loaded from a data
//! directory and evaluates orders against them in-process.
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /api/products` | catalog snapshot |
//! | `GET /api/rules` | tier table |
//! | `POST /api/totals` | revenue and COGS of an order |
//! | `POST /api/simulate` | full simulation of one order |
//! | `POST /api/simulate/batch` | simulations of several orders |

use crate::engine::{simulate_many, simulate_order};
use crate::error::EngineError;
use crate::models::{
    BatchRequest, BatchResponse, Product, SimulationRequest, TotalsRequest,
};
use crate::pricing::{aggregate, validate_catalog};
use crate::rules::{load_catalog_from_dir, load_rules_from_dir, RuleTable};
use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Application state shared across requests.
pub struct AppState {
    pub catalog: RwLock<Vec<Product>>,
    pub rules: RwLock<RuleTable>,
}

impl AppState {
    pub fn new(catalog: Vec<Product>, rules: RuleTable) -> Self {
        Self {
            catalog: RwLock::new(catalog),
            rules: RwLock::new(rules),
        }
    }
}

/// Build the API router and load snapshots from the given directory.
/// Returns the router and a handle to the state.
pub async fn build_router(data_dir: &Path) -> Result<(Router, Arc<AppState>)> {
    let catalog = load_catalog_from_dir(data_dir)?;
    let rules = load_rules_from_dir(data_dir)?;
    let state = Arc::new(AppState::new(catalog, rules));
    Ok((router(state.clone()), state))
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/products", get(products_handler))
        .route("/api/rules", get(rules_handler))
        .route("/api/totals", post(totals_handler))
        .route("/api/simulate", post(simulate_handler))
        .route("/api/simulate/batch", post(batch_handler))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    let body = Json(serde_json::json!({ "error": message.into() }));
    (status, body).into_response()
}

/// Every unusable body (bad syntax, wrong shape, missing content type)
/// is reported as 422 with the extractor's reason.
fn rejected(rejection: JsonRejection) -> Response {
    warn!(status = %rejection.status(), reason = %rejection.body_text(), "rejected request body");
    error_response(StatusCode::UNPROCESSABLE_ENTITY, rejection.body_text())
}

fn engine_error(err: EngineError) -> Response {
    warn!(error = %err, "simulation rejected");
    error_response(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
}

/// Handler for GET /api/products
async fn products_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let catalog = app_state.catalog.read().await;
    Json(catalog.clone())
}

/// Handler for GET /api/rules
async fn rules_handler(State(app_state): State<Arc<AppState>>) -> impl IntoResponse {
    let rules = app_state.rules.read().await;
    Json(rules.rules().to_vec())
}

/// Handler for POST /api/totals
async fn totals_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<TotalsRequest>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let catalog = app_state.catalog.read().await;
    Json(aggregate(&input.lines, &catalog)).into_response()
}

/// Handler for POST /api/simulate
async fn simulate_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<SimulationRequest>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    if let Some(catalog) = &input.catalog {
        if let Err(err) = validate_catalog(catalog) {
            return engine_error(err);
        }
    }
    let shared_catalog = app_state.catalog.read().await;
    let shared_rules = app_state.rules.read().await;
    let catalog = input.catalog.as_deref().unwrap_or(shared_catalog.as_slice());
    let rules = input.rules.as_deref().unwrap_or(shared_rules.rules());
    debug!(lines = input.lines.len(), products = catalog.len(), rules = rules.len(), "simulating order");
    match simulate_order(&input.lines, catalog, rules) {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => engine_error(err),
    }
}

/// Handler for POST /api/simulate/batch
async fn batch_handler(
    State(app_state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> Response {
    let Json(input) = match payload {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    let catalog = app_state.catalog.read().await;
    let rules = app_state.rules.read().await;
    debug!(scenarios = input.scenarios.len(), "simulating batch");
    match simulate_many(&input.scenarios, &catalog, rules.rules()) {
        Ok(results) => (StatusCode::OK, Json(BatchResponse { results })).into_response(),
        Err(err) => engine_error(err),
    }
}

/// Launch the API server.  This function builds the router from the
/// given data directory and binds to the supplied address.  It blocks
/// until the server terminates.
pub async fn serve(addr: SocketAddr, data_dir: &Path) -> Result<()> {
    let (router, _state) = build_router(data_dir).await?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");
    axum::serve(listener, router).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderTotals, SimulationResult, TierRule};
    use axum::body::{to_bytes, Body};
    use axum::extract::FromRequest;
    use axum::http::Request;
    use rust_decimal::Decimal;
    use serde::de::DeserializeOwned;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn state() -> Arc<AppState> {
        let catalog = vec![Product {
            sku: "A".into(),
            name: "Alpha".into(),
            unit_sale_price: dec("100"),
            unit_cost: dec("60"),
        }];
        let rules = RuleTable::new(vec![TierRule {
            range_start: dec("500"),
            range_end: dec("1500"),
            cash_bonus_percent: dec("5"),
            free_package_count: 2,
            label: "T1".into(),
        }])
        .unwrap();
        Arc::new(AppState::new(catalog, rules))
    }

    async fn json_body<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn extract<T: DeserializeOwned>(body: &str) -> Result<Json<T>, JsonRejection> {
        let request = Request::builder()
            .method("POST")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        Json::<T>::from_request(request, &()).await
    }

    #[tokio::test]
    async fn simulate_uses_server_snapshots() {
        let payload = extract(r#"{"lines":[{"sku":"A","qty":10}]}"#).await;
        let response = simulate_handler(State(state()), payload).await;
        assert_eq!(response.status(), StatusCode::OK);
        let result: SimulationResult = json_body(response).await;
        assert_eq!(result.revenue, dec("1000"));
        assert_eq!(result.cash_bonus, dec("50"));
        assert_eq!(result.margin_with_packages, dec("0.28"));
    }

    #[tokio::test]
    async fn simulate_accepts_per_call_rules() {
        let payload = extract(
            r#"{"lines":[{"sku":"A","quantity":10}],
                "rules":[{"range_start":0,"range_end":5000,"cash_bonus_percent":10,"label":"wide"}]}"#,
        )
        .await;
        let response = simulate_handler(State(state()), payload).await;
        let result: SimulationResult = json_body(response).await;
        assert_eq!(result.applied_rule.unwrap().label, "wide");
        assert_eq!(result.cash_bonus, dec("100"));
        assert!(result.free_packages.is_empty());
    }

    #[tokio::test]
    async fn inverted_rule_is_unprocessable() {
        let payload = extract(
            r#"{"lines":[{"sku":"A","quantity":1}],
                "rules":[{"range_start":10,"range_end":0,"cash_bonus_percent":1,"label":"bad"}]}"#,
        )
        .await;
        let response = simulate_handler(State(state()), payload).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("bad"));
    }

    #[tokio::test]
    async fn missing_field_is_rejected_with_reason() {
        let payload = extract::<SimulationRequest>(r#"{"lines":[{"qty":1}]}"#).await;
        let response = simulate_handler(State(state()), payload).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("sku"));
    }

    #[tokio::test]
    async fn truncated_body_is_unprocessable() {
        let payload = extract::<SimulationRequest>(r#"{"lines": ["#).await;
        let response = simulate_handler(State(state()), payload).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = json_body(response).await;
        assert!(!body["error"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_content_type_is_unprocessable() {
        let request = Request::builder()
            .method("POST")
            .body(Body::from(r#"{"lines":[]}"#))
            .unwrap();
        let payload = Json::<TotalsRequest>::from_request(request, &()).await;
        let response = totals_handler(State(state()), payload).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn overflowing_package_cost_is_unprocessable() {
        let payload = extract(
            r#"{"lines":[{"sku":"A","qty":1}],
                "rules":[{"range_start":0,"range_end":1000,"cash_bonus_percent":0,
                          "free_package_count":4000000000,"label":"huge"}],
                "catalog":[{"sku":"A","name":"Alpha","unit_sale_price":100,
                            "unit_cost":"70000000000000000000"}]}"#,
        )
        .await;
        let response = simulate_handler(State(state()), payload).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body: serde_json::Value = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("free package cost"));
    }

    #[tokio::test]
    async fn totals_skip_unknown_skus() {
        let payload = extract(r#"{"lines":[{"sku":"A","qty":3},{"sku":"ZZZ","qty":9}]}"#).await;
        let response = totals_handler(State(state()), payload).await;
        let totals: OrderTotals = json_body(response).await;
        assert_eq!(totals.revenue, dec("300"));
        assert_eq!(totals.cogs, dec("180"));
    }

    #[tokio::test]
    async fn batch_returns_one_result_per_scenario() {
        let payload = extract(
            r#"{"scenarios":[{"lines":[{"sku":"A","qty":1}]},{"lines":[{"sku":"A","qty":10}]}]}"#,
        )
        .await;
        let response = batch_handler(State(state()), payload).await;
        let batch: BatchResponse = json_body(response).await;
        assert_eq!(batch.results.len(), 2);
        assert!(batch.results[0].applied_rule.is_none());
        assert_eq!(batch.results[1].applied_rule.as_ref().unwrap().label, "T1");
    }

    #[tokio::test]
    async fn snapshots_are_served() {
        let response = products_handler(State(state())).await.into_response();
        let products: Vec<Product> = json_body(response).await;
        assert_eq!(products[0].sku, "A");
        let response = rules_handler(State(state())).await.into_response();
        let rules: Vec<TierRule> = json_body(response).await;
        assert_eq!(rules[0].label, "T1");
    }
}
