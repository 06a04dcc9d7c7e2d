//! The structured per-request summary record, grounded on the teacher's
//! `telemetry::log` per-request line (method, path, status, latency, plus
//! gateway-specific fields the teacher's mesh log doesn't carry: resolved
//! route id and backend instance id).

use serde::Serialize;

#[derive(Serialize, Debug, Clone)]
pub struct RequestLog {
	pub request_id: String,
	pub method: String,
	pub path: String,
	pub status: u16,
	pub route_id: Option<String>,
	pub instance_id: Option<String>,
	pub elapsed_ms: u64,
}

impl RequestLog {
	/// Emits the record as a single `tracing` event at `info` (2xx-4xx) or
	/// `warn` (5xx), matching the severity convention the request logging
	/// middleware already uses.
	pub fn emit(&self) {
		if self.status >= 500 {
			tracing::warn!(
				request_id = %self.request_id, method = %self.method, path = %self.path,
				status = self.status, route_id = ?self.route_id, instance_id = ?self.instance_id,
				elapsed_ms = self.elapsed_ms, "request"
			);
		} else {
			tracing::info!(
				request_id = %self.request_id, method = %self.method, path = %self.path,
				status = self.status, route_id = ?self.route_id, instance_id = ?self.instance_id,
				elapsed_ms = self.elapsed_ms, "request"
			);
		}
	}
}
