//! SSE frontend adapter (spec §4.8): registered on specific paths in the
//! HTTP adapter, upgrades the response to `text/event-stream`, streams
//! events from the SSE connector until either side closes. Grounded on
//! `axum::response::sse` (already reachable through the teacher's `axum`
//! dependency) plus the field semantics in spec §4.2.3.

use std::sync::Arc;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};

use crate::connectors::SseConnector;
use crate::error::GatewayError;
use crate::model::{RouteResult, StreamEvent};

/// Converts the connector's event stream into the `axum` SSE wire format,
/// preserving original ids/types verbatim (spec §4.2.3).
pub fn into_sse_response(
	stream: impl Stream<Item = Result<StreamEvent, GatewayError>> + Send + 'static,
) -> Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>> {
	let mapped = stream.map(|item| {
		Ok(match item {
			Ok(evt) => {
				let mut event = Event::default().event(evt.event).data(evt.data);
				if let Some(id) = evt.id {
					event = event.id(id);
				}
				if let Some(retry_ms) = evt.retry_ms {
					event = event.retry(Duration::from_millis(retry_ms));
				}
				event
			}
			Err(err) => Event::default().event("error").data(err.to_string()),
		})
	});

	Sse::new(mapped).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("keep-alive"))
}

/// Opens the backend SSE connection for a resolved route and adapts it to
/// the client-facing wire format in one call, spec §6 "SSE wire":
/// `Content-Type: text/event-stream`, `Cache-Control: no-cache`.
pub async fn proxy(
	connector: Arc<SseConnector>,
	route: &RouteResult,
	path: &str,
) -> Result<Sse<impl Stream<Item = Result<Event, std::convert::Infallible>>>, GatewayError> {
	let stream = connector.connect(&route.instance, path).await?;
	Ok(into_sse_response(stream))
}
