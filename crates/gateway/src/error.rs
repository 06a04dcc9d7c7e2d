//! Error taxonomy for the request lifecycle (spec §7). Grounded on the
//! teacher's `proxy::ProxyError`: a flat `thiserror` enum with an
//! `is_retryable()` classifier and an `into_response()` renderer, so every
//! layer of the chain can produce, enrich, or convert an error without
//! reaching for a trait object. Widened with a `detail` map and a `cause`
//! chain per spec §7 ("each carrying an optional cause chain and detail
//! map"), which the teacher's simpler enum did not need.

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt;

use serde::Serialize;

use crate::http_types::{Body, HeaderValue, Response, StatusCode, x_headers};

#[derive(thiserror::Error, Debug)]
pub enum ErrorKind {
	#[error("no route matched {0} {1}")]
	NotFound(http::Method, String),

	#[error("bad request: {0}")]
	BadRequest(String),

	#[error("unauthorized: {0}")]
	Unauthorized(String),

	#[error("forbidden: {0}")]
	Forbidden(String),

	#[error("rate limit exceeded, retry after {retry_after_secs}s")]
	TooManyRequests { retry_after_secs: u64 },

	#[error("request timed out")]
	Timeout,

	#[error("upstream misbehaved: {0}")]
	BadGateway(String),

	#[error("service unavailable: {0}")]
	ServiceUnavailable(String),

	#[error("internal error: {0}")]
	Internal(String),
}

/// A [`ErrorKind`] plus the cause chain and free-form detail map spec §7
/// asks every error to be able to carry.
#[derive(Debug)]
pub struct GatewayError {
	pub kind: ErrorKind,
	pub detail: HashMap<String, String>,
	pub cause: Option<Box<dyn StdError + Send + Sync>>,
}

impl fmt::Display for GatewayError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.kind)
	}
}

impl StdError for GatewayError {
	fn source(&self) -> Option<&(dyn StdError + 'static)> {
		self.cause.as_ref().map(|c| c.as_ref() as &(dyn StdError + 'static))
	}
}

impl From<ErrorKind> for GatewayError {
	fn from(kind: ErrorKind) -> Self {
		GatewayError { kind, detail: HashMap::new(), cause: None }
	}
}

impl GatewayError {
	pub fn not_found(method: http::Method, path: impl Into<String>) -> Self {
		ErrorKind::NotFound(method, path.into()).into()
	}

	pub fn bad_request(msg: impl Into<String>) -> Self {
		ErrorKind::BadRequest(msg.into()).into()
	}

	pub fn unauthorized(msg: impl Into<String>) -> Self {
		ErrorKind::Unauthorized(msg.into()).into()
	}

	pub fn forbidden(msg: impl Into<String>) -> Self {
		ErrorKind::Forbidden(msg.into()).into()
	}

	pub fn rate_limited(retry_after_secs: u64) -> Self {
		ErrorKind::TooManyRequests { retry_after_secs }.into()
	}

	pub fn timeout() -> Self {
		ErrorKind::Timeout.into()
	}

	pub fn bad_gateway(msg: impl Into<String>) -> Self {
		ErrorKind::BadGateway(msg.into()).into()
	}

	pub fn service_unavailable(msg: impl Into<String>) -> Self {
		ErrorKind::ServiceUnavailable(msg.into()).into()
	}

	pub fn internal(msg: impl Into<String>) -> Self {
		ErrorKind::Internal(msg.into()).into()
	}

	pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.detail.insert(key.into(), value.into());
		self
	}

	pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
		self.cause = Some(Box::new(cause));
		self
	}

	/// Per spec §7: "Non-error responses with status ≥ 500 are treated as
	/// downstream failures by the breaker/retry; status 4xx is not." This
	/// mirrors that classification for errors raised before a Response ever
	/// exists (transport failures, timeouts).
	pub fn is_downstream_failure(&self) -> bool {
		matches!(
			self.kind,
			ErrorKind::Timeout | ErrorKind::BadGateway(_) | ErrorKind::ServiceUnavailable(_)
		)
	}

	/// Spec §4.4: "Retryable conditions: transport errors, 502/503/504, gRPC
	/// Unavailable and DeadlineExceeded. Non-retryable: 4xx, 501, other gRPC
	/// application codes."
	pub fn is_retryable(&self) -> bool {
		self.is_downstream_failure()
	}

	pub fn status(&self) -> StatusCode {
		match &self.kind {
			ErrorKind::NotFound(_, _) => StatusCode::NOT_FOUND,
			ErrorKind::BadRequest(_) => StatusCode::BAD_REQUEST,
			ErrorKind::Unauthorized(_) => StatusCode::UNAUTHORIZED,
			ErrorKind::Forbidden(_) => StatusCode::FORBIDDEN,
			ErrorKind::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
			ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
			ErrorKind::BadGateway(_) => StatusCode::BAD_GATEWAY,
			ErrorKind::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
			ErrorKind::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
		}
	}

	/// Renders the short JSON body spec §7 requires: `error` and, when a
	/// request id is available, `error_id` for correlation. Falls back to
	/// the `request_id` detail key the logging middleware attaches on its
	/// way out when the caller has no request id of its own to pass.
	pub fn into_response(mut self, request_id: Option<&str>) -> Response {
		let status = self.status();
		let retry_after = match &self.kind {
			ErrorKind::TooManyRequests { retry_after_secs } => Some(*retry_after_secs),
			_ => None,
		};
		let request_id = request_id.map(|s| s.to_string()).or_else(|| self.detail.remove("request_id"));
		let body = ErrorBody {
			error: self.kind.to_string(),
			error_id: request_id.clone(),
			detail: self.detail,
		};
		let payload = serde_json::to_vec(&body).unwrap_or_else(|_| b"{}".to_vec());
		let mut builder = http::Response::builder()
			.status(status)
			.header(http::header::CONTENT_TYPE, "application/json");
		if let Some(secs) = retry_after {
			if let Ok(hv) = HeaderValue::try_from(secs.to_string()) {
				builder = builder.header(x_headers::RETRY_AFTER, hv);
			}
		}
		if let Some(id) = &request_id {
			if let Ok(hv) = HeaderValue::from_str(id) {
				builder = builder.header(x_headers::X_REQUEST_ID, hv);
			}
		}
		builder.body(Body::from(payload)).unwrap_or_else(|_| {
			http::Response::new(Body::from("internal error rendering error response"))
		})
	}
}

#[derive(Serialize)]
struct ErrorBody {
	error: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	error_id: Option<String>,
	#[serde(skip_serializing_if = "HashMap::is_empty")]
	detail: HashMap<String, String>,
}
