//! Request-scoped context plumbing (spec §9 "Context value plumbing"):
//! request id, resolved route, auth claims, and the cancellation/deadline
//! pair, carried alongside the request rather than inside it so middleware
//! can read and write typed values without a stringly-typed map. Grounded
//! on the teacher's extension-based `http::Extensions` usage in
//! `proxy/httpproxy.rs` for passing route/backend state down the chain.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::model::RouteResult;

/// Claims extracted by the authentication middleware (spec §4.6), attached
/// to the context regardless of whether the route requires auth so
/// downstream middleware can read them when present.
#[derive(Clone, Debug, Default)]
pub struct Claims(pub HashMap<String, Value>);

/// Carried by every request from the frontend adapter down through the
/// handler. Cheap to clone: everything mutable is behind an `Arc` or a
/// `Clone`-cheap primitive.
#[derive(Clone)]
pub struct RequestContext {
	pub request_id: String,
	pub remote_addr: SocketAddr,
	pub started_at: Instant,
	pub deadline: Option<Instant>,
	pub cancellation: CancellationToken,
	pub route: Option<Arc<RouteResult>>,
	pub claims: Option<Claims>,
}

impl RequestContext {
	pub fn new(request_id: String, remote_addr: SocketAddr) -> Self {
		RequestContext {
			request_id,
			remote_addr,
			started_at: Instant::now(),
			deadline: None,
			cancellation: CancellationToken::new(),
			route: None,
			claims: None,
		}
	}

	pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
		self.deadline = deadline;
		self
	}

	pub fn with_route(&mut self, route: RouteResult) {
		self.route = Some(Arc::new(route));
	}

	pub fn with_claims(&mut self, claims: Claims) {
		self.claims = Some(claims);
	}

	pub fn remaining_budget(&self) -> Option<std::time::Duration> {
		self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
	}
}
