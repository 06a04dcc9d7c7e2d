//! WebSocket backend connector and the bidirectional proxy loop (spec
//! §4.2.4, the "central WS algorithm"). The teacher's `agent_core::copy`
//! module implements a similar bidirectional-pump-plus-single-error-channel
//! shape for raw TCP/HBONE streams (`BufferedSplitter`, `CopyError`); this
//! module follows that same structure — two directional tasks, one error
//! channel, serialized writes — applied to `tokio-tungstenite` WS frames
//! instead of raw bytes, since the HBONE-specific plumbing in `copy.rs`
//! doesn't carry over to application-level WS messages.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, Mutex};
use tokio::time::interval;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::GatewayError;
use crate::model::{ServiceInstance, WebSocketMessage};

type BackendStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

pub struct WebSocketConnector {
	pub ping_interval: Duration,
	pub pong_timeout: Duration,
	pub max_message_size: usize,
}

impl Default for WebSocketConnector {
	fn default() -> Self {
		WebSocketConnector {
			ping_interval: Duration::from_secs(20),
			pong_timeout: Duration::from_secs(60),
			max_message_size: 16 * 1024 * 1024,
		}
	}
}

impl WebSocketConnector {
	/// Performs the client-side WS handshake against `instance`, forwarding
	/// the configured header subset (spec §4.2.4).
	pub async fn dial(
		&self,
		instance: &ServiceInstance,
		path: &str,
		forwarded_headers: &http::HeaderMap,
	) -> Result<BackendStream, GatewayError> {
		let scheme = if instance.scheme == "https" { "wss" } else { "ws" };
		let uri = format!("{scheme}://{}:{}{path}", instance.address, instance.port);

		let mut request = tungstenite::http::Request::builder().uri(&uri);
		for (name, value) in forwarded_headers {
			request = request.header(name, value);
		}
		let request = request
			.body(())
			.map_err(|e| GatewayError::bad_gateway(format!("building WS handshake: {e}")))?;

		let (stream, _response) = tokio_tungstenite::connect_async(request)
			.await
			.map_err(|e| GatewayError::bad_gateway(format!("WS handshake failed: {e}")))?;
		Ok(stream)
	}

	/// The bidirectional proxy loop itself: spawns a client->backend and a
	/// backend->client reader, a ping scheduler, and drives all three to
	/// completion through a single error/termination channel. Returns `Ok(())`
	/// on a normal close (Normal or GoingAway close code, or clean EOF);
	/// any other outcome is an error (spec §4.2.4).
	pub async fn proxy<C>(&self, client: C, backend: BackendStream) -> Result<(), GatewayError>
	where
		C: futures_util::Sink<Message, Error = axum::Error>
			+ futures_util::Stream<Item = Result<Message, axum::Error>>
			+ Unpin
			+ Send
			+ 'static,
	{
		let (client_sink, client_stream) = client.split();
		let (backend_sink, backend_stream) = backend.split();

		let client_sink = Arc::new(Mutex::new(client_sink));
		let backend_sink = Arc::new(Mutex::new(backend_sink));

		let (done_tx, mut done_rx) = mpsc::channel::<Result<(), GatewayError>>(3);

		let c2b = tokio::spawn(pump_client_to_backend(
			client_stream,
			backend_sink.clone(),
			done_tx.clone(),
		));
		let b2c = tokio::spawn(pump_backend_to_client(
			backend_stream,
			client_sink.clone(),
			done_tx.clone(),
			self.pong_timeout,
		));
		let pinger =
			tokio::spawn(ping_scheduler(self.ping_interval, backend_sink.clone(), done_tx.clone()));

		// First termination signal from any of the three tasks wins; the
		// other two are aborted so neither side is left half-proxied.
		let outcome = done_rx.recv().await.unwrap_or(Ok(()));

		c2b.abort();
		b2c.abort();
		pinger.abort();

		let close_frame = Some(CloseFrame {
			code: tungstenite::protocol::frame::coding::CloseCode::Normal,
			reason: "proxy closing".into(),
		});
		let _ = client_sink.lock().await.send(Message::Close(close_frame.clone())).await;
		let _ = backend_sink.lock().await.send(Message::Close(close_frame)).await;

		outcome
	}
}

async fn pump_client_to_backend<S, Sink>(
	mut reader: S,
	sink: Arc<Mutex<Sink>>,
	done: mpsc::Sender<Result<(), GatewayError>>,
) where
	S: futures_util::Stream<Item = Result<Message, axum::Error>> + Unpin,
	Sink: futures_util::Sink<Message, Error = tungstenite::Error> + Unpin,
{
	while let Some(msg) = reader.next().await {
		match msg {
			Ok(Message::Close(_)) => {
				let _ = done.send(Ok(())).await;
				return;
			}
			Ok(message) => {
				if sink.lock().await.send(message).await.is_err() {
					let _ = done.send(Err(GatewayError::bad_gateway("backend write failed"))).await;
					return;
				}
			}
			Err(e) => {
				let _ = done.send(Err(GatewayError::bad_gateway(format!("client read failed: {e}")))).await;
				return;
			}
		}
	}
	let _ = done.send(Ok(())).await;
}

async fn pump_backend_to_client<S, Sink>(
	mut reader: S,
	sink: Arc<Mutex<Sink>>,
	done: mpsc::Sender<Result<(), GatewayError>>,
	pong_timeout: Duration,
) where
	S: futures_util::Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
	Sink: futures_util::Sink<Message, Error = axum::Error> + Unpin,
{
	loop {
		// Every inbound frame (data or pong) refreshes the backend read
		// deadline; silence for longer than `pong_timeout` ends the proxy
		// the same way a hard read error would (spec §4.2.4, §5).
		let msg = match tokio::time::timeout(pong_timeout, reader.next()).await {
			Ok(Some(msg)) => msg,
			Ok(None) => break,
			Err(_) => {
				let _ = done.send(Err(GatewayError::bad_gateway("backend pong timeout"))).await;
				return;
			}
		};
		match msg {
			Ok(Message::Close(frame)) => {
				// Normal-closure and going-away are success outcomes per
				// spec §4.2.4; anything else still ends the proxy but is
				// reported so the caller can log it.
				let ok = frame.as_ref().map(is_clean_close).unwrap_or(true);
				let _ = done.send(if ok { Ok(()) } else {
					Err(GatewayError::bad_gateway("backend closed with non-normal code"))
				}).await;
				return;
			}
			Ok(message) => {
				if sink.lock().await.send(message).await.is_err() {
					let _ = done.send(Err(GatewayError::bad_gateway("client write failed"))).await;
					return;
				}
			}
			Err(e) => {
				let _ = done.send(Err(GatewayError::bad_gateway(format!("backend read failed: {e}")))).await;
				return;
			}
		}
	}
	let _ = done.send(Ok(())).await;
}

fn is_clean_close(frame: &CloseFrame) -> bool {
	matches!(
		frame.code,
		tungstenite::protocol::frame::coding::CloseCode::Normal
			| tungstenite::protocol::frame::coding::CloseCode::Away
	)
}

/// Sends a ping to the backend every `interval`; pongs (and any other
/// inbound frame) are observed in `pump_backend_to_client`, which refreshes
/// the backend read deadline on each one (spec §4.2.4). Writes are
/// serialized through the same mutex data frames use, so a ping never
/// interleaves with an in-flight data write (spec §9 open question: all
/// writes go through one mutex).
async fn ping_scheduler<Sink>(
	interval_duration: Duration,
	sink: Arc<Mutex<Sink>>,
	done: mpsc::Sender<Result<(), GatewayError>>,
) where
	Sink: futures_util::Sink<Message, Error = tungstenite::Error> + Unpin,
{
	let mut ticker = interval(interval_duration);
	loop {
		ticker.tick().await;
		if sink.lock().await.send(Message::Ping(Vec::new())).await.is_err() {
			let _ = done.send(Err(GatewayError::bad_gateway("ping failed"))).await;
			return;
		}
	}
}

impl From<Message> for WebSocketMessage {
	fn from(msg: Message) -> Self {
		match msg {
			Message::Text(t) => WebSocketMessage::Text(t),
			Message::Binary(b) => WebSocketMessage::Binary(b),
			Message::Ping(b) => WebSocketMessage::Ping(b),
			Message::Pong(b) => WebSocketMessage::Pong(b),
			Message::Close(frame) => WebSocketMessage::Close {
				code: frame.as_ref().map(|f| f.code.into()),
				reason: frame.map(|f| f.reason.to_string()).unwrap_or_default(),
			},
			Message::Frame(_) => WebSocketMessage::Close { code: None, reason: String::new() },
		}
	}
}

#[cfg(test)]
mod tests {
	use std::pin::Pin;
	use std::task::{Context, Poll};

	use super::*;

	struct NullSink;

	impl futures_util::Sink<Message> for NullSink {
		type Error = axum::Error;

		fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
			Poll::Ready(Ok(()))
		}
		fn start_send(self: Pin<&mut Self>, _item: Message) -> Result<(), Self::Error> {
			Ok(())
		}
		fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
			Poll::Ready(Ok(()))
		}
		fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
			Poll::Ready(Ok(()))
		}
	}

	#[tokio::test(start_paused = true)]
	async fn silent_backend_times_out_via_pong_timeout() {
		let (done_tx, mut done_rx) = mpsc::channel::<Result<(), GatewayError>>(1);
		let sink = Arc::new(Mutex::new(NullSink));
		let reader = futures_util::stream::pending::<Result<Message, tungstenite::Error>>();

		tokio::spawn(pump_backend_to_client(reader, sink, done_tx, Duration::from_millis(50)));

		let outcome = done_rx.recv().await.expect("pump reports a terminal outcome");
		assert!(outcome.is_err(), "silence past pong_timeout must end the proxy with an error");
	}

	#[test]
	fn normal_and_going_away_are_clean_closes() {
		let normal = CloseFrame {
			code: tungstenite::protocol::frame::coding::CloseCode::Normal,
			reason: "".into(),
		};
		let away = CloseFrame {
			code: tungstenite::protocol::frame::coding::CloseCode::Away,
			reason: "".into(),
		};
		let error = CloseFrame {
			code: tungstenite::protocol::frame::coding::CloseCode::Error,
			reason: "".into(),
		};
		assert!(is_clean_close(&normal));
		assert!(is_clean_close(&away));
		assert!(!is_clean_close(&error));
	}
}
