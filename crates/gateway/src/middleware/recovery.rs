//! Recovery middleware (spec §4.7 item 1, SPEC_FULL §[AMBIENT]2): catches a
//! panic anywhere in the inner chain and converts it to a 500 response
//! instead of tearing down the task. Grounded on the pattern named in
//! SPEC_FULL: `AssertUnwindSafe` + `FutureExt::catch_unwind`, the same
//! mechanism `tower_http`'s own `CatchPanic` layer uses.

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::context::RequestContext;
use crate::error::GatewayError;
use crate::http_types::Request;

pub struct Recovery;

impl Middleware for Recovery {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(RecoveryHandler { next })
	}
}

struct RecoveryHandler {
	next: DynHandler,
}

impl Handler for RecoveryHandler {
	fn call(&self, ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		Box::pin(async move {
			match AssertUnwindSafe(next.call(ctx, req)).catch_unwind().await {
				Ok(result) => result,
				Err(panic) => {
					let message = panic_message(&panic);
					tracing::error!(panic = %message, "recovered from panic in request handler");
					Err(GatewayError::internal(format!("internal error: {message}")))
				}
			}
		})
	}
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
	if let Some(s) = payload.downcast_ref::<&str>() {
		s.to_string()
	} else if let Some(s) = payload.downcast_ref::<String>() {
		s.clone()
	} else {
		"unknown panic payload".to_string()
	}
}
