// Structured logging/tracing bootstrap. Simplified relative to the
// production non-blocking-writer pipeline this is grounded on
// (agentgateway's agent-core::telemetry), which hand-rolls a custom
// allocation-free JSON formatter; here we lean on tracing-subscriber's own
// `fmt` layer with an EnvFilter, which is the idiomatic default for a crate
// this size and keeps the dependency surface small.
use std::sync::OnceLock;
use std::time::Instant;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

/// Process start time, used to report "time to ready" in readiness logs.
pub static APPLICATION_START_TIME: OnceLock<Instant> = OnceLock::new();

pub fn application_start_time() -> Instant {
	*APPLICATION_START_TIME.get_or_init(Instant::now)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
	Text,
	Json,
}

/// Installs the global tracing subscriber. Call once at process start.
/// `RUST_LOG` (or the gateway's own `GATEWAY_LOG_LEVEL` env override, applied
/// by the config loader before this is called) controls verbosity.
pub fn init(format: LogFormat) {
	let _ = application_start_time();
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

	let builder = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_span_events(FmtSpan::CLOSE)
		.with_target(true);

	let result = match format {
		LogFormat::Json => builder.json().try_init(),
		LogFormat::Text => builder.try_init(),
	};
	// try_init fails if a subscriber is already installed (e.g. in tests); that's fine.
	let _ = result;
}

/// Registers the process-wide metric sub-registry under the `gateway`
/// namespace, mirroring agent-core's `metrics::sub_registry` helper.
pub fn sub_registry(
	registry: &mut prometheus_client::registry::Registry,
) -> &mut prometheus_client::registry::Registry {
	registry.sub_registry_with_prefix("gateway")
}
