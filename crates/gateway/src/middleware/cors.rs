//! CORS middleware, HTTP-frontend only (spec §4.7 item 4, SPEC_FULL
//! §[SUPPLEMENT] CORS). `tower-http` (already in the teacher's dependency
//! table) ships a `CorsLayer` for `tower::Service`, but this chain's
//! `Middleware = Handler -> Handler` seam (spec §9) isn't a `tower::Layer`,
//! so the same allow-origin/methods/headers/credentials semantics
//! `CorsLayer` implements are authored directly here against `http`
//! headers instead of pulled in as a `tower` adapter.

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::config::CorsConfig;
use crate::context::RequestContext;
use crate::http_types::Request;

pub struct Cors {
	config: CorsConfig,
}

impl Cors {
	pub fn new(config: CorsConfig) -> Self {
		Cors { config }
	}

	fn is_allowed_origin(&self, origin: &str) -> bool {
		self.config.allowed_origins.iter().any(|o| o == "*" || o == origin)
	}
}

impl Middleware for Cors {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(CorsHandler {
			next,
			allowed_origins: self.config.allowed_origins.clone(),
			allowed_methods: self.config.allowed_methods.clone(),
			allowed_headers: self.config.allowed_headers.clone(),
			allow_credentials: self.config.allow_credentials,
		})
	}
}

struct CorsHandler {
	next: DynHandler,
	allowed_origins: Vec<String>,
	allowed_methods: Vec<String>,
	allowed_headers: Vec<String>,
	allow_credentials: bool,
}

impl Handler for CorsHandler {
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		let origin = req
			.headers()
			.get(http::header::ORIGIN)
			.and_then(|v| v.to_str().ok())
			.map(|s| s.to_string());
		let allowed = origin
			.as_deref()
			.map(|o| self.allowed_origins.iter().any(|a| a == "*" || a == o))
			.unwrap_or(false);
		let methods = self.allowed_methods.join(", ");
		let headers = self.allowed_headers.join(", ");
		let allow_credentials = self.allow_credentials;

		Box::pin(async move {
			let is_preflight = req.method() == http::Method::OPTIONS;
			if is_preflight {
				let mut builder = http::Response::builder().status(http::StatusCode::NO_CONTENT);
				if allowed {
					if let Some(o) = &origin {
						builder = builder.header(http::header::ACCESS_CONTROL_ALLOW_ORIGIN, o.as_str());
					}
					builder = builder
						.header(http::header::ACCESS_CONTROL_ALLOW_METHODS, methods)
						.header(http::header::ACCESS_CONTROL_ALLOW_HEADERS, headers);
					if allow_credentials {
						builder = builder.header(http::header::ACCESS_CONTROL_ALLOW_CREDENTIALS, "true");
					}
				}
				return Ok(builder.body(crate::http_types::Body::empty()).unwrap());
			}

			let mut result = next.call(ctx, req).await;
			if allowed {
				if let (Ok(resp), Some(o)) = (&mut result, &origin) {
					if let Ok(hv) = http::HeaderValue::from_str(o) {
						resp.headers_mut().insert(http::header::ACCESS_CONTROL_ALLOW_ORIGIN, hv);
					}
				}
			}
			result
		})
	}
}
