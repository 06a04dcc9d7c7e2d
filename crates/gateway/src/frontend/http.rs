//! HTTP frontend adapter (spec §4.8): terminates client HTTP/1.1 and HTTP/2
//! connections, builds a [`RequestContext`], invokes the middleware chain,
//! writes the response back. Grounded on the teacher's `axum::serve` +
//! `gateway_core::drain` graceful-shutdown wiring in `app.rs`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, FromRequest, State};
use axum::response::IntoResponse;

use crate::connectors::{SseConnector, WebSocketConnector};
use crate::context::RequestContext;
use crate::http_types::Request;
use crate::middleware::{DynHandler, Handler};
use crate::model::Protocol;
use crate::router::Router;

/// Streaming protocols bypass the generic HTTP middleware chain the way the
/// teacher's proxy splits its HTTP and WS paths at the listener: a
/// long-lived socket or event stream has no single "response" for
/// request-scoped middleware like retry or the circuit breaker to wrap, so
/// only the router (for backend selection) and auth-adjacent concerns the
/// adapter itself enforces apply to them.
#[derive(Clone)]
pub struct HttpAdapter {
	chain: DynHandler,
	max_request_bytes: usize,
	router: Arc<Router>,
	websocket: Arc<WebSocketConnector>,
	sse: Arc<SseConnector>,
}

impl HttpAdapter {
	pub fn new(
		chain: DynHandler,
		max_request_bytes: usize,
		router: Arc<Router>,
		websocket: Arc<WebSocketConnector>,
		sse: Arc<SseConnector>,
	) -> Self {
		HttpAdapter { chain, max_request_bytes, router, websocket, sse }
	}

	/// Builds the `axum::Router` this adapter serves. A catch-all route
	/// hands every method/path to the chain (or, for WebSocket/SSE routes,
	/// to the protocol-specific connector); the router itself does no path
	/// matching (spec §4.1's router owns that).
	pub fn into_axum_router(self) -> axum::Router {
		axum::Router::new()
			.fallback(Self::handle)
			.layer(tower_http::limit::RequestBodyLimitLayer::new(self.max_request_bytes))
			.with_state(Arc::new(self))
	}

	async fn handle(
		State(adapter): State<Arc<HttpAdapter>>,
		ConnectInfo(remote_addr): ConnectInfo<SocketAddr>,
		req: Request,
	) -> axum::response::Response {
		let path = req.uri().path().to_string();
		let is_ws_upgrade = req
			.headers()
			.get(http::header::UPGRADE)
			.and_then(|v| v.to_str().ok())
			.is_some_and(|v| v.eq_ignore_ascii_case("websocket"));

		if is_ws_upgrade {
			return match adapter.router.resolve(req.method(), &path, Protocol::WebSocket, None).await {
				Ok(route) => {
					let forwarded_headers = req.headers().clone();
					match WebSocketUpgrade::from_request(req, &()).await {
						Ok(upgrade) => {
							crate::frontend::websocket::upgrade_and_proxy(
								upgrade,
								adapter.websocket.clone(),
								route.instance.clone(),
								path,
								forwarded_headers,
							)
							.await
						}
						Err(rejection) => rejection.into_response(),
					}
				}
				Err(err) => err.into_response(None).into_response(),
			};
		}

		if let Ok(route) = adapter.router.resolve(req.method(), &path, Protocol::Sse, None).await {
			return match crate::frontend::sse::proxy(adapter.sse.clone(), &route, &path).await {
				Ok(sse) => sse.into_response(),
				Err(err) => err.into_response(None).into_response(),
			};
		}

		let ctx = RequestContext::new(String::new(), remote_addr);
		match adapter.chain.call(ctx, req).await {
			Ok(resp) => resp.into_response(),
			Err(err) => err.into_response(None).into_response(),
		}
	}
}
