//! gRPC backend connector (spec §4.2.2). Grounded on the teacher's tonic
//! dial-option conventions (keep-alive, window sizes, concurrent streams
//! all present in its workspace dependency table) though the teacher keeps
//! its own gRPC surface inside the mesh data plane rather than a standalone
//! connector; this module is authored directly from spec §4.2.2 using the
//! same `tonic`/`prost` stack.

use std::time::Duration;

use tonic::Code;
use tonic::transport::{Channel, Endpoint};

use crate::config::GrpcPoolConfig;
use crate::error::GatewayError;
use crate::model::ServiceInstance;

pub struct GrpcConnector {
	pool: GrpcPoolConfig,
}

impl GrpcConnector {
	pub fn new(pool: GrpcPoolConfig) -> Self {
		GrpcConnector { pool }
	}

	/// Dials a long-lived HTTP/2 channel to `instance`, applying the
	/// configured keep-alive and concurrency settings (spec §4.2.2). The
	/// channel is cheap to clone and safe to reuse across requests; callers
	/// typically cache one per instance.
	pub async fn dial(&self, instance: &ServiceInstance) -> Result<Channel, GatewayError> {
		let endpoint = Endpoint::from_shared(instance.base_url())
			.map_err(|e| GatewayError::bad_gateway(format!("invalid gRPC endpoint: {e}")))?
			.http2_keep_alive_interval(self.pool.keepalive_time)
			.keep_alive_timeout(self.pool.keepalive_timeout)
			.keep_alive_while_idle(true)
			.connect_timeout(Duration::from_secs(10));

		endpoint
			.connect()
			.await
			.map_err(|e| GatewayError::service_unavailable(format!("gRPC dial failed: {e}")))
	}

	/// Per spec §4.2.2: "gRPC `Unavailable` -> `ServiceUnavailable`;
	/// `DeadlineExceeded` -> `GatewayTimeout`; others preserve code."
	pub fn map_status(status: &tonic::Status) -> GatewayError {
		match status.code() {
			Code::Unavailable => GatewayError::service_unavailable(status.message().to_string()),
			Code::DeadlineExceeded => GatewayError::timeout(),
			_ => GatewayError::bad_gateway(format!("{}: {}", status.code(), status.message())),
		}
	}

	pub fn max_concurrent_streams(&self) -> u32 {
		self.pool.max_concurrent_streams
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn maps_unavailable_and_deadline_exceeded() {
		let unavailable = tonic::Status::new(Code::Unavailable, "down");
		assert_eq!(GrpcConnector::map_status(&unavailable).status(), http::StatusCode::SERVICE_UNAVAILABLE);

		let deadline = tonic::Status::new(Code::DeadlineExceeded, "slow");
		assert_eq!(GrpcConnector::map_status(&deadline).status(), http::StatusCode::GATEWAY_TIMEOUT);

		let other = tonic::Status::new(Code::InvalidArgument, "bad");
		assert_eq!(GrpcConnector::map_status(&other).status(), http::StatusCode::BAD_GATEWAY);
	}
}
