//! Config-dump admin endpoint. Grounded on the teacher's
//! `management::admin::ConfigDumpHandler`/`ConfigDump` pattern: a trait any
//! component can implement to contribute its current state to a combined
//! dump, serialized with `#[serde(flatten)]`.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use serde_json::Value;

/// A component that can describe its current configuration for the admin
/// dump (the router's compiled rule table, the breaker registry's per-key
/// snapshot, etc).
pub trait ConfigDumpHandler: Send + Sync {
	fn name(&self) -> &str;
	fn dump(&self) -> Value;
}

#[derive(Clone)]
pub struct AdminState {
	pub build_info: gateway_core::version::BuildInfo,
	pub handlers: Arc<Vec<Box<dyn ConfigDumpHandler>>>,
}

#[derive(Serialize)]
struct ConfigDump {
	build_info: gateway_core::version::BuildInfo,
	#[serde(flatten)]
	components: serde_json::Map<String, Value>,
}

pub async fn config_dump(State(state): State<AdminState>) -> Json<ConfigDump> {
	let mut components = serde_json::Map::new();
	for handler in state.handlers.iter() {
		components.insert(handler.name().to_string(), handler.dump());
	}
	Json(ConfigDump { build_info: state.build_info.clone(), components })
}

pub fn router(state: AdminState) -> axum::Router {
	axum::Router::new().route("/config_dump", axum::routing::get(config_dump)).with_state(state)
}
