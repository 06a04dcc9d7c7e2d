//! `GET /metrics` in Prometheus exposition format (spec §6). Grounded on
//! the teacher's `management::metrics_server`, which encodes a shared
//! `prometheus_client::Registry` on demand per request.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use parking_lot::Mutex;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;

#[derive(Clone)]
pub struct MetricsState {
	pub registry: Arc<Mutex<Registry>>,
}

pub async fn metrics(State(state): State<MetricsState>) -> impl IntoResponse {
	let mut buffer = String::new();
	let result = {
		let registry = state.registry.lock();
		encode(&mut buffer, &registry)
	};
	match result {
		Ok(()) => (
			StatusCode::OK,
			[(header::CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
			buffer,
		)
			.into_response(),
		Err(err) => {
			tracing::error!(error = %err, "failed to encode metrics");
			StatusCode::INTERNAL_SERVER_ERROR.into_response()
		}
	}
}

pub fn router(state: MetricsState) -> axum::Router {
	axum::Router::new().route("/metrics", axum::routing::get(metrics)).with_state(state)
}
