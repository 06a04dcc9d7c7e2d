//! Shared request/response type aliases, mirroring the teacher's
//! `http/mod.rs` which re-exports `Request`/`Response`/`StatusCode` etc. so
//! the rest of the crate never has to spell out the body type.

pub use axum::body::Body;
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, Version};

pub type Request = http::Request<Body>;
pub type Response = http::Response<Body>;

/// Headers the proxy adds to every upstream request (spec §6, "HTTP
/// upstream wire").
pub mod x_headers {
	pub const X_FORWARDED_FOR: &str = "x-forwarded-for";
	pub const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
	pub const X_FORWARDED_HOST: &str = "x-forwarded-host";
	pub const X_REQUEST_ID: &str = "x-request-id";
	pub const X_RATELIMIT_LIMIT: &str = "x-ratelimit-limit";
	pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
	pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";
	pub const RETRY_AFTER: &str = "retry-after";
}

/// Headers that must never be copied verbatim between the client and
/// upstream connections (RFC 7230 §6.1 hop-by-hop headers).
pub const HOP_BY_HOP_HEADERS: &[&str] = &[
	"connection",
	"keep-alive",
	"proxy-authenticate",
	"proxy-authorization",
	"te",
	"trailers",
	"transfer-encoding",
	"upgrade",
];

pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
	for h in HOP_BY_HOP_HEADERS {
		headers.remove(*h);
	}
}
