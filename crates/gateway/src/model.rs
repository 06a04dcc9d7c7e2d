//! Core data model shared by the router, registry, load balancer and
//! connectors (spec §3). Grounded on the shape of the teacher's
//! `types::local` config structs, simplified to the flat entities the
//! specification actually names instead of the teacher's XDS-derived
//! workload graph.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One instance of a backend service, as handed out by a [`crate::discovery::ServiceRegistry`].
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServiceInstance {
	pub id: String,
	pub service_name: String,
	pub address: String,
	pub port: u16,
	#[serde(default = "default_scheme")]
	pub scheme: String,
	#[serde(default = "default_true")]
	pub healthy: bool,
	#[serde(default = "default_weight")]
	pub weight: u32,
	#[serde(default)]
	pub tags: Vec<String>,
	#[serde(default)]
	pub metadata: HashMap<String, String>,
}

fn default_scheme() -> String {
	"http".to_string()
}
fn default_true() -> bool {
	true
}
fn default_weight() -> u32 {
	1
}

impl ServiceInstance {
	/// `scheme://address:port`, the base the HTTP/gRPC/WS connectors rewrite
	/// the outbound URL against.
	pub fn base_url(&self) -> String {
		format!("{}://{}:{}", self.scheme, self.address, self.port)
	}
}

/// The wire protocol a [`RouteRule`] is bound to. Default is `Http`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
	Http,
	Grpc,
	WebSocket,
	Sse,
}

impl Default for Protocol {
	fn default() -> Self {
		Protocol::Http
	}
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalanceStrategy {
	RoundRobin,
	Random,
	Sticky,
}

impl Default for LoadBalanceStrategy {
	fn default() -> Self {
		LoadBalanceStrategy::RoundRobin
	}
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum RateLimitKeyBy {
	#[serde(rename = "ip")]
	ClientIp,
	#[serde(rename = "path")]
	Path,
	#[serde(rename = "ip_path")]
	IpAndPath,
}

impl Default for RateLimitKeyBy {
	fn default() -> Self {
		RateLimitKeyBy::ClientIp
	}
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitPolicy {
	pub rate: u32,
	pub burst: u32,
	#[serde(default)]
	pub key_by: RateLimitKeyBy,
	/// Name of the configured storage backend (local or a named shared store).
	#[serde(default)]
	pub storage: Option<String>,
}

/// One routing rule, built once at config load and swapped atomically on
/// reload (spec §9 "Dynamic configuration reload").
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouteRule {
	pub id: String,
	/// May end in `*` for prefix matching; exact paths always win over
	/// prefix-wildcard paths of the same length class.
	pub path: String,
	#[serde(default)]
	pub methods: Vec<http::Method>,
	pub service_name: String,
	#[serde(default)]
	pub protocol: Protocol,
	#[serde(default)]
	pub load_balance: LoadBalanceStrategy,
	#[serde(default, with = "humantime_serde_opt")]
	pub timeout: Option<Duration>,
	#[serde(default)]
	pub session_affinity: Option<SessionAffinity>,
	#[serde(default)]
	pub auth_required: bool,
	#[serde(default)]
	pub rate_limit: Option<RateLimitPolicy>,
	#[serde(default)]
	pub metadata: HashMap<String, String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionAffinity {
	pub source: SessionSource,
	pub name: String,
	#[serde(default = "default_affinity_ttl", with = "humantime_serde")]
	pub ttl: Duration,
}

fn default_affinity_ttl() -> Duration {
	Duration::from_secs(3600)
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
	Cookie,
	Header,
	Query,
}

impl RouteRule {
	/// True when `path` is a prefix rule (ends in `*`).
	pub fn is_prefix(&self) -> bool {
		self.path.ends_with('*')
	}

	/// Specificity used to order candidate matches most-specific-first:
	/// exact paths outrank prefix paths; among prefixes, longer outranks
	/// shorter.
	pub fn specificity(&self) -> (u8, usize) {
		if self.is_prefix() {
			(0, self.path.len())
		} else {
			(1, self.path.len())
		}
	}

	pub fn matches_method(&self, method: &http::Method) -> bool {
		self.methods.is_empty() || self.methods.iter().any(|m| m == method)
	}

	pub fn matches_path(&self, path: &str) -> bool {
		if let Some(prefix) = self.path.strip_suffix('*') {
			path.starts_with(prefix)
		} else {
			path == self.path
		}
	}
}

/// The outcome of routing: a rule plus the instance the load balancer chose
/// for this particular request.
#[derive(Clone, Debug)]
pub struct RouteResult {
	pub rule: Arc<RouteRule>,
	pub instance: ServiceInstance,
}

/// A single Server-Sent Event, assembled field-by-field by the SSE connector
/// (spec §4.2.3) and forwarded verbatim to the client-facing SSE writer.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StreamEvent {
	pub id: Option<String>,
	pub event: String,
	pub data: String,
	pub retry_ms: Option<u64>,
}

impl StreamEvent {
	pub fn new() -> Self {
		StreamEvent { event: "message".to_string(), ..Default::default() }
	}

	pub fn is_empty(&self) -> bool {
		self.id.is_none() && self.event == "message" && self.data.is_empty() && self.retry_ms.is_none()
	}
}

/// A frame crossing the WebSocket bidirectional proxy (spec §4.2.4).
#[derive(Clone, Debug)]
pub enum WebSocketMessage {
	Text(String),
	Binary(Vec<u8>),
	Ping(Vec<u8>),
	Pong(Vec<u8>),
	Close { code: Option<u16>, reason: String },
}

/// `humantime`-backed (de)serialization for `Option<Duration>` fields, since
/// serde has no blanket impl for `with` over `Option<T>`.
mod humantime_serde_opt {
	use super::Duration;
	use serde::{Deserialize, Deserializer, Serialize, Serializer};

	pub fn serialize<S: Serializer>(v: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
		match v {
			Some(d) => humantime_serde::serialize(d, s),
			None => s.serialize_none(),
		}
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
		#[derive(Deserialize)]
		#[serde(transparent)]
		struct Wrap(#[serde(with = "humantime_serde")] Duration);
		Ok(Option::<Wrap>::deserialize(d)?.map(|w| w.0))
	}
}
