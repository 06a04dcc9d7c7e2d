//! HTTP backend connector (spec §4.2.1). Grounded on the teacher's
//! `client::mod` connection-pool setup (`hyper_util::client::legacy::Client`
//! with a pool config) and `proxy::httpproxy`'s URL-rewrite + header-copy
//! forwarding path, generalized from the teacher's mesh-address dialing to
//! a plain `scheme://address:port` rewrite against the chosen
//! `ServiceInstance`.

use std::time::Duration;

use http_body_util::BodyExt;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector as HyperHttpConnector;
use hyper_util::rt::TokioExecutor;

use crate::config::HttpPoolConfig;
use crate::error::GatewayError;
use crate::http_types::{self, Body, Request, Response};
use crate::model::ServiceInstance;

pub struct HttpConnector {
	client: Client<HyperHttpConnector, Body>,
}

impl HttpConnector {
	pub fn new(pool: &HttpPoolConfig) -> Self {
		let mut connector = HyperHttpConnector::new();
		connector.set_connect_timeout(Some(pool.dial_timeout));
		connector.set_keepalive(pool.keep_alive.then_some(Duration::from_secs(60)));

		let client = Client::builder(TokioExecutor::new())
			.pool_max_idle_per_host(pool.max_idle_per_host)
			.pool_idle_timeout(pool.idle_timeout)
			.build(connector);

		HttpConnector { client }
	}

	/// Rewrites `req`'s URL against `instance`, strips hop-by-hop headers,
	/// adds the forwarding headers spec §6 requires, and streams the
	/// response back as a lazy body. No per-request timeout is applied
	/// here; the caller's context deadline governs (spec §4.2.1).
	pub async fn forward(
		&self,
		mut req: Request,
		instance: &ServiceInstance,
		remote_addr: &str,
		request_id: &str,
	) -> Result<Response, GatewayError> {
		let path_and_query =
			req.uri().path_and_query().map(|pq| pq.as_str().to_string()).unwrap_or_default();
		let uri: http::Uri = format!("{}{}", instance.base_url(), path_and_query)
			.parse()
			.map_err(|e| GatewayError::bad_gateway(format!("invalid upstream URI: {e}")))?;
		*req.uri_mut() = uri;

		http_types::strip_hop_by_hop(req.headers_mut());
		append_forwarded_headers(&mut req, remote_addr, request_id);

		let resp = self
			.client
			.request(req)
			.await
			.map_err(|e| GatewayError::bad_gateway(format!("upstream call failed: {e}")))?;

		let (parts, body) = resp.into_parts();
		let body = Body::new(body.map_err(|e| {
			std::io::Error::new(std::io::ErrorKind::Other, format!("upstream body error: {e}"))
		}));
		Ok(http::Response::from_parts(parts, body))
	}
}

fn append_forwarded_headers(req: &mut Request, remote_addr: &str, request_id: &str) {
	use http_types::x_headers::*;

	let headers = req.headers_mut();
	let existing_xff = headers
		.get(X_FORWARDED_FOR)
		.and_then(|v| v.to_str().ok())
		.map(|s| s.to_string());
	let xff_value = match existing_xff {
		Some(existing) => format!("{existing}, {remote_addr}"),
		None => remote_addr.to_string(),
	};
	if let Ok(hv) = http::HeaderValue::from_str(&xff_value) {
		headers.insert(X_FORWARDED_FOR, hv);
	}
	headers.insert(X_FORWARDED_PROTO, http::HeaderValue::from_static("http"));
	if let Some(host) = req.uri().host() {
		if let Ok(hv) = http::HeaderValue::from_str(host) {
			headers.insert(X_FORWARDED_HOST, hv);
		}
	}
	if let Ok(hv) = http::HeaderValue::from_str(request_id) {
		headers.insert(X_REQUEST_ID, hv);
	}
}
