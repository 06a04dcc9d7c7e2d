//! gRPC frontend adapter (spec §4.8): dispatches by the `:path`
//! pseudo-header of the form `/Service/Method` over an HTTP/2 listener.
//! Grounded on the teacher's HTTP/2-based routing; full proto-descriptor
//! transcoding stays an external collaborator per spec §1, so this adapter
//! exposes only the routing/forwarding seam a transcoder would plug into.

use crate::error::GatewayError;

/// Splits a gRPC `:path` header (`/package.Service/Method`) into its
/// service and method components, the unit the router matches a
/// [`crate::model::RouteRule`] against when `protocol = grpc`.
pub fn split_grpc_path(path: &str) -> Result<(&str, &str), GatewayError> {
	let trimmed = path.trim_start_matches('/');
	trimmed
		.split_once('/')
		.ok_or_else(|| GatewayError::bad_request(format!("malformed gRPC path: {path}")))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_service_and_method() {
		let (service, method) = split_grpc_path("/greet.Greeter/SayHello").unwrap();
		assert_eq!(service, "greet.Greeter");
		assert_eq!(method, "SayHello");
	}

	#[test]
	fn rejects_malformed_path() {
		assert!(split_grpc_path("/justservice").is_err());
	}
}
