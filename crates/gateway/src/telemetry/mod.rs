//! Gateway-specific telemetry: request log shape and Prometheus metric
//! definitions (spec §2 "Telemetry/Metrics"). Ambient process-wide
//! logging bootstrap lives in `gateway_core::telemetry`; this module is
//! only the gateway domain's instrumentation surface.

pub mod log;
pub mod metrics;
