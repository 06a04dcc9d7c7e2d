//! Configuration model and loading pipeline (spec §6, SPEC_FULL §[AMBIENT]1).
//! Grounded on the teacher's `config.rs` load-from-YAML-plus-env pattern and
//! `serdes::FileInlineOrRemote` for file/inline config duality, generalized
//! from the teacher's XDS bootstrap config to the flat `gateway:` document
//! spec §6 describes.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::model::RouteRule;

fn ser_redact<S: Serializer>(_: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str("<redacted>")
}

fn de_secret<'de, D: serde::Deserializer<'de>>(deserializer: D) -> Result<SecretString, D::Error> {
	String::deserialize(deserializer).map(|s| SecretString::new(s.into()))
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct GatewayConfig {
	#[serde(default)]
	pub frontend: FrontendConfig,
	#[serde(default)]
	pub backend: BackendConfig,
	pub registry: RegistryConfig,
	pub router: RouterConfig,
	#[serde(default)]
	pub auth: Option<AuthConfig>,
	#[serde(default)]
	pub health: HealthConfig,
	#[serde(default)]
	pub metrics: MetricsConfig,
	#[serde(default)]
	pub circuit_breaker: CircuitBreakerConfig,
	#[serde(default)]
	pub retry: RetryConfig,
	#[serde(default)]
	pub cors: Option<CorsConfig>,
	#[serde(default)]
	pub rate_limit_storage: RateLimitStorageConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FrontendConfig {
	#[serde(default = "default_http_addr")]
	pub http: SocketAddr,
	#[serde(default)]
	pub websocket: Option<SocketAddr>,
	#[serde(default)]
	pub sse: Option<SocketAddr>,
	#[serde(default = "default_read_timeout", with = "humantime_serde")]
	pub read_timeout: Duration,
	#[serde(default = "default_write_timeout", with = "humantime_serde")]
	pub write_timeout: Duration,
	#[serde(default = "default_max_request_bytes")]
	pub max_request_bytes: usize,
	#[serde(default)]
	pub tls: Option<TlsConfig>,
}

fn default_http_addr() -> SocketAddr {
	"0.0.0.0:8080".parse().unwrap()
}
fn default_read_timeout() -> Duration {
	Duration::from_secs(30)
}
fn default_write_timeout() -> Duration {
	Duration::from_secs(30)
}
fn default_max_request_bytes() -> usize {
	10 * 1024 * 1024
}

impl Default for FrontendConfig {
	fn default() -> Self {
		FrontendConfig {
			http: default_http_addr(),
			websocket: None,
			sse: None,
			read_timeout: default_read_timeout(),
			write_timeout: default_write_timeout(),
			max_request_bytes: default_max_request_bytes(),
			tls: None,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TlsConfig {
	pub cert_path: PathBuf,
	pub key_path: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct BackendConfig {
	#[serde(default)]
	pub http: HttpPoolConfig,
	#[serde(default)]
	pub grpc: GrpcPoolConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HttpPoolConfig {
	#[serde(default = "default_max_idle")]
	pub max_idle_connections: usize,
	#[serde(default = "default_max_idle_per_host")]
	pub max_idle_per_host: usize,
	#[serde(default = "default_idle_timeout", with = "humantime_serde")]
	pub idle_timeout: Duration,
	#[serde(default = "default_dial_timeout", with = "humantime_serde")]
	pub dial_timeout: Duration,
	#[serde(default = "default_dial_timeout", with = "humantime_serde")]
	pub tls_handshake_timeout: Duration,
	#[serde(default = "default_true")]
	pub keep_alive: bool,
}

fn default_max_idle() -> usize {
	256
}
fn default_max_idle_per_host() -> usize {
	32
}
fn default_idle_timeout() -> Duration {
	Duration::from_secs(90)
}
fn default_dial_timeout() -> Duration {
	Duration::from_secs(10)
}
fn default_true() -> bool {
	true
}

impl Default for HttpPoolConfig {
	fn default() -> Self {
		HttpPoolConfig {
			max_idle_connections: default_max_idle(),
			max_idle_per_host: default_max_idle_per_host(),
			idle_timeout: default_idle_timeout(),
			dial_timeout: default_dial_timeout(),
			tls_handshake_timeout: default_dial_timeout(),
			keep_alive: true,
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GrpcPoolConfig {
	#[serde(default = "default_keepalive_time", with = "humantime_serde")]
	pub keepalive_time: Duration,
	#[serde(default = "default_keepalive_timeout", with = "humantime_serde")]
	pub keepalive_timeout: Duration,
	#[serde(default = "default_max_concurrent_streams")]
	pub max_concurrent_streams: u32,
}

fn default_keepalive_time() -> Duration {
	Duration::from_secs(30)
}
fn default_keepalive_timeout() -> Duration {
	Duration::from_secs(10)
}
fn default_max_concurrent_streams() -> u32 {
	100
}

impl Default for GrpcPoolConfig {
	fn default() -> Self {
		GrpcPoolConfig {
			keepalive_time: default_keepalive_time(),
			keepalive_timeout: default_keepalive_timeout(),
			max_concurrent_streams: default_max_concurrent_streams(),
		}
	}
}

/// `registry.type` selects the discovery adapter; `static.services` is the
/// one reference implementation this crate ships per spec §1's "external
/// collaborator, interface specified" carve-out.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RegistryConfig {
	Static { services: HashMap<String, Vec<crate::model::ServiceInstance>> },
	Dynamic { source: String, options: HashMap<String, String> },
}

impl Default for RegistryConfig {
	fn default() -> Self {
		RegistryConfig::Static { services: HashMap::new() }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct RouterConfig {
	pub rules: Vec<RouteRule>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AuthConfig {
	#[serde(default)]
	pub jwt: Option<JwtConfig>,
	#[serde(default)]
	pub api_keys: Option<ApiKeyConfig>,
	#[serde(default)]
	pub skip_paths: Vec<String>,
	#[serde(default = "default_token_check_interval", with = "humantime_serde")]
	pub token_check_interval: Duration,
}

fn default_token_check_interval() -> Duration {
	Duration::from_secs(60)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JwtConfig {
	pub issuer: Option<String>,
	#[serde(default)]
	pub audiences: Vec<String>,
	pub signing: JwtSigning,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum JwtSigning {
	Hmac {
		#[serde(serialize_with = "ser_redact", deserialize_with = "de_secret")]
		secret: SecretString,
	},
	Rsa { public_key_path: PathBuf },
	Jwks { url: url::Url, #[serde(default = "default_jwks_ttl", with = "humantime_serde")] ttl: Duration },
}

fn default_jwks_ttl() -> Duration {
	Duration::from_secs(300)
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiKeyConfig {
	pub keys: Vec<ApiKeyEntry>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiKeyEntry {
	/// Hash of the key, not the key itself; compared in constant time.
	pub hash: String,
	#[serde(default)]
	pub scopes: Vec<String>,
	#[serde(default)]
	pub disabled: bool,
	#[serde(default)]
	pub expires_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HealthConfig {
	#[serde(default = "default_health_addr")]
	pub addr: SocketAddr,
}

fn default_health_addr() -> SocketAddr {
	"0.0.0.0:8081".parse().unwrap()
}

impl Default for HealthConfig {
	fn default() -> Self {
		HealthConfig { addr: default_health_addr() }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetricsConfig {
	#[serde(default = "default_true")]
	pub enabled: bool,
	#[serde(default = "default_metrics_path")]
	pub path: String,
}

fn default_metrics_path() -> String {
	"/metrics".to_string()
}

impl Default for MetricsConfig {
	fn default() -> Self {
		MetricsConfig { enabled: true, path: default_metrics_path() }
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
	#[serde(default = "default_max_failures")]
	pub max_failures: u32,
	#[serde(default = "default_failure_threshold")]
	pub failure_threshold: f64,
	#[serde(default = "default_breaker_interval", with = "humantime_serde")]
	pub interval: Duration,
	#[serde(default = "default_breaker_timeout", with = "humantime_serde")]
	pub timeout: Duration,
	#[serde(default = "default_half_open_max_requests")]
	pub max_requests: u32,
}

fn default_max_failures() -> u32 {
	5
}
fn default_failure_threshold() -> f64 {
	0.5
}
fn default_breaker_interval() -> Duration {
	Duration::from_secs(60)
}
fn default_breaker_timeout() -> Duration {
	Duration::from_secs(30)
}
fn default_half_open_max_requests() -> u32 {
	1
}

impl Default for CircuitBreakerConfig {
	fn default() -> Self {
		CircuitBreakerConfig {
			max_failures: default_max_failures(),
			failure_threshold: default_failure_threshold(),
			interval: default_breaker_interval(),
			timeout: default_breaker_timeout(),
			max_requests: default_half_open_max_requests(),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
	#[serde(default = "default_max_attempts")]
	pub max_attempts: u32,
	#[serde(default = "default_initial_delay", with = "humantime_serde")]
	pub initial_delay: Duration,
	#[serde(default = "default_max_delay", with = "humantime_serde")]
	pub max_delay: Duration,
	#[serde(default = "default_multiplier")]
	pub multiplier: f64,
	#[serde(default = "default_budget_ratio")]
	pub budget_ratio: f64,
}

fn default_max_attempts() -> u32 {
	1
}
fn default_initial_delay() -> Duration {
	Duration::from_millis(50)
}
fn default_max_delay() -> Duration {
	Duration::from_secs(2)
}
fn default_multiplier() -> f64 {
	2.0
}
fn default_budget_ratio() -> f64 {
	0.1
}

impl Default for RetryConfig {
	fn default() -> Self {
		RetryConfig {
			max_attempts: default_max_attempts(),
			initial_delay: default_initial_delay(),
			max_delay: default_max_delay(),
			multiplier: default_multiplier(),
			budget_ratio: default_budget_ratio(),
		}
	}
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorsConfig {
	#[serde(default)]
	pub allowed_origins: Vec<String>,
	#[serde(default)]
	pub allowed_methods: Vec<String>,
	#[serde(default)]
	pub allowed_headers: Vec<String>,
	#[serde(default)]
	pub allow_credentials: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RateLimitStorageConfig {
	Local { #[serde(default = "default_lru_capacity")] capacity: u64 },
	Shared { url: url::Url },
}

fn default_lru_capacity() -> u64 {
	100_000
}

impl Default for RateLimitStorageConfig {
	fn default() -> Self {
		RateLimitStorageConfig::Local { capacity: default_lru_capacity() }
	}
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
	#[error("reading config file {path}: {source}")]
	Read { path: PathBuf, #[source] source: std::io::Error },
	#[error("parsing YAML: {0}")]
	Parse(#[from] serde_yaml::Error),
	#[error("applying environment overrides: {0}")]
	Env(#[from] serde_json::Error),
	#[error("invalid configuration: {0}")]
	Invalid(String),
}

/// Loads, overrides, and validates a [`GatewayConfig`] per
/// SPEC_FULL §[AMBIENT]1 steps 1-3.
pub fn load(path: &Path) -> Result<GatewayConfig, ConfigError> {
	let raw = std::fs::read_to_string(path)
		.map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
	let mut value: Value = serde_yaml::from_str(&raw)?;
	apply_env_overrides(&mut value, "GATEWAY", std::env::vars());
	let config: GatewayConfig = serde_json::from_value(value)?;
	validate(&config)?;
	Ok(config)
}

/// Applies `GATEWAY_<UPPER_SNAKE_PATH>` overrides onto a parsed
/// `serde_json::Value` tree before the final typed deserialization pass, so
/// string→number/bool/list coercion happens exactly once.
fn apply_env_overrides(
	value: &mut Value,
	prefix: &str,
	vars: impl Iterator<Item = (String, String)>,
) {
	for (key, raw) in vars {
		let Some(path) = key.strip_prefix(&format!("{prefix}_")) else { continue };
		let segments: Vec<String> = path.to_lowercase().split('_').map(|s| s.to_string()).collect();
		if segments.is_empty() {
			continue;
		}
		set_path(value, &segments, coerce(&raw));
	}
}

fn coerce(raw: &str) -> Value {
	if let Ok(b) = raw.parse::<bool>() {
		return Value::Bool(b);
	}
	if let Ok(n) = raw.parse::<i64>() {
		return Value::Number(n.into());
	}
	if let Ok(f) = raw.parse::<f64>() {
		if let Some(n) = serde_json::Number::from_f64(f) {
			return Value::Number(n);
		}
	}
	if raw.contains(',') {
		return Value::Array(raw.split(',').map(|s| Value::String(s.trim().to_string())).collect());
	}
	Value::String(raw.to_string())
}

fn set_path(root: &mut Value, segments: &[String], leaf: Value) {
	let mut cursor = root;
	for (i, seg) in segments.iter().enumerate() {
		if !cursor.is_object() {
			*cursor = Value::Object(serde_json::Map::new());
		}
		let map = cursor.as_object_mut().expect("coerced to object above");
		if i == segments.len() - 1 {
			map.insert(seg.clone(), leaf);
			return;
		}
		cursor = map.entry(seg.clone()).or_insert_with(|| Value::Object(serde_json::Map::new()));
	}
}

/// Spec §3 invariants plus spec §6's "validate against the same rules as
/// initial load."
fn validate(config: &GatewayConfig) -> Result<(), ConfigError> {
	if config.router.rules.is_empty() {
		return Err(ConfigError::Invalid("router.rules must not be empty".into()));
	}
	for rule in &config.router.rules {
		if rule.path.is_empty() {
			return Err(ConfigError::Invalid(format!("rule {} has an empty path", rule.id)));
		}
		if rule.service_name.is_empty() {
			return Err(ConfigError::Invalid(format!("rule {} has an empty serviceName", rule.id)));
		}
		if let Some(rl) = &rule.rate_limit {
			if rl.rate == 0 || rl.burst == 0 {
				return Err(ConfigError::Invalid(format!("rule {} rate_limit must be positive", rule.id)));
			}
		}
	}
	if config.circuit_breaker.max_failures == 0 {
		return Err(ConfigError::Invalid("circuitBreaker.maxFailures must be positive".into()));
	}
	if config.retry.max_attempts == 0 {
		return Err(ConfigError::Invalid("retry.maxAttempts must be positive".into()));
	}
	if let Some(tls) = &config.frontend.tls {
		if !tls.cert_path.exists() {
			return Err(ConfigError::Invalid(format!("TLS cert not found: {}", tls.cert_path.display())));
		}
		if !tls.key_path.exists() {
			return Err(ConfigError::Invalid(format!("TLS key not found: {}", tls.key_path.display())));
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn coerces_bool_number_and_list() {
		assert_eq!(coerce("true"), Value::Bool(true));
		assert_eq!(coerce("42"), Value::Number(42.into()));
		assert!(matches!(coerce("a,b,c"), Value::Array(v) if v.len() == 3));
		assert_eq!(coerce("svc-1"), Value::String("svc-1".into()));
	}

	#[test]
	fn env_override_sets_nested_path() {
		let mut v: Value = serde_json::json!({"frontend": {"http": "0.0.0.0:8080"}});
		apply_env_overrides(
			&mut v,
			"GATEWAY",
			std::iter::once(("GATEWAY_FRONTEND_HTTP".to_string(), "127.0.0.1:9999".to_string())),
		);
		assert_eq!(v["frontend"]["http"], Value::String("127.0.0.1:9999".into()));
	}
}
