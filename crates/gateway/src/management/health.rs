//! `/health`, `/ready`, `/live` (spec §6, SPEC_FULL §[SUPPLEMENT] Health
//! endpoints detail). Grounded on the teacher's
//! `management::readiness_server::handle_ready`, generalized from a single
//! ready/not-ready text line into the three-endpoint surface spec §6 names
//! plus the per-check detail SPEC_FULL adds.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use itertools::Itertools;
use serde::Serialize;

use gateway_core::readiness::Ready;

#[derive(Serialize)]
struct CheckResult {
	name: String,
	healthy: bool,
	detail: Option<String>,
}

#[derive(Serialize)]
struct HealthResponse {
	status: &'static str,
	checks: Vec<CheckResult>,
}

/// A named dependency the `/health` endpoint reports on (registry
/// reachability, JWKS cache freshness, rate-limit store connectivity).
/// Grounded on spec §6's "per-check results with overall status" wording.
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
	fn name(&self) -> &str;
	async fn check(&self) -> Result<(), String>;
}

#[derive(Clone)]
pub struct HealthState {
	pub ready: Ready,
	pub checks: Arc<Vec<Box<dyn HealthCheck>>>,
}

/// `GET /health`: runs every registered check and reports per-check plus
/// overall status. Never fails the HTTP call itself; the body carries the
/// verdict.
pub async fn health(State(state): State<HealthState>) -> impl IntoResponse {
	let mut checks = Vec::with_capacity(state.checks.len());
	let mut all_healthy = true;
	for check in state.checks.iter() {
		let result = check.check().await;
		all_healthy &= result.is_ok();
		checks.push(CheckResult {
			name: check.name().to_string(),
			healthy: result.is_ok(),
			detail: result.err(),
		});
	}
	let status = if all_healthy { "healthy" } else { "unhealthy" };
	let code = if all_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
	(code, Json(HealthResponse { status, checks }))
}

/// `GET /ready`: 200 iff no pending startup task remains (spec §6).
pub async fn ready(State(state): State<HealthState>) -> impl IntoResponse {
	let pending = state.ready.pending();
	if pending.is_empty() {
		(StatusCode::OK, "ready\n".to_string())
	} else {
		(StatusCode::SERVICE_UNAVAILABLE, format!("not ready, pending: {}\n", pending.into_iter().sorted().join(", ")))
	}
}

/// `GET /live`: 200 always (spec §6 "liveness").
pub async fn live() -> impl IntoResponse {
	(StatusCode::OK, "live\n")
}

pub fn router(state: HealthState) -> axum::Router {
	axum::Router::new()
		.route("/health", axum::routing::get(health))
		.route("/ready", axum::routing::get(ready))
		.route("/live", axum::routing::get(live))
		.with_state(state)
}
