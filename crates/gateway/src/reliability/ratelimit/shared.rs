//! Shared (external) rate-limit store: an atomic check-and-decrement
//! executed in one round-trip against an external process, namespaced
//! `ratelimit:<key>` (spec §4.5 "Shared"). Grounded on the teacher's
//! `http/remoteratelimit.rs` gRPC-to-an-external-limiter pattern; this
//! crate speaks to a Redis-compatible store executing a Lua script so the
//! whole check-and-decrement is one atomic round-trip, matching spec §6's
//! "must be atomic across the outcome pair."

use async_trait::async_trait;

use super::{Decision, RateLimiterStore};

/// `EVAL` script implementing the same token-bucket math as
/// [`super::local::LocalStore`], kept in the client so no server-side
/// install step is required. `KEYS[1]` is the namespaced bucket key;
/// `ARGV` carries rate, burst, cost, and the current time so the script
/// stays pure (testable, replayable).
const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local rate = tonumber(ARGV[1])
local burst = tonumber(ARGV[2])
local cost = tonumber(ARGV[3])
local now = tonumber(ARGV[4])

local data = redis.call('HMGET', key, 'tokens', 'ts')
local tokens = tonumber(data[1]) or burst
local ts = tonumber(data[2]) or now

local elapsed = math.max(0, now - ts)
tokens = math.min(burst, tokens + elapsed * rate)

local allowed = tokens >= cost
if allowed then
  tokens = tokens - cost
end

redis.call('HMSET', key, 'tokens', tokens, 'ts', now)
redis.call('EXPIRE', key, 3600)

return {allowed and 1 or 0, tokens}
"#;

pub struct SharedStore {
	client: redis::Client,
}

impl SharedStore {
	pub fn new(url: &url::Url) -> Result<Self, redis::RedisError> {
		let client = redis::Client::open(url.as_str())?;
		Ok(SharedStore { client })
	}
}

#[async_trait]
impl RateLimiterStore for SharedStore {
	async fn allow(&self, key: &str, rate: u32, burst: u32, n: u32) -> Decision {
		let namespaced = format!("ratelimit:{key}");
		let now = chrono::Utc::now().timestamp() as f64;

		let result: Result<(i64, f64), redis::RedisError> = async {
			let mut conn = self.client.get_multiplexed_async_connection().await?;
			redis::Script::new(TOKEN_BUCKET_SCRIPT)
				.key(namespaced)
				.arg(rate)
				.arg(burst)
				.arg(n)
				.arg(now)
				.invoke_async(&mut conn)
				.await
		}
		.await;

		match result {
			Ok((allowed, tokens)) => {
				let reset_seconds =
					if allowed == 1 { 0 } else { (1.0 / rate.max(1) as f64).ceil().max(1.0) as u64 };
				Decision { allowed: allowed == 1, remaining: tokens.max(0.0) as u32, reset_seconds }
			}
			Err(err) => {
				tracing::error!(error = %err, "shared rate limit store unreachable, failing open");
				Decision { allowed: true, remaining: burst, reset_seconds: 0 }
			}
		}
	}

	async fn reset(&self, key: &str) {
		let namespaced = format!("ratelimit:{key}");
		if let Ok(mut conn) = self.client.get_multiplexed_async_connection().await {
			let _: Result<(), _> = redis::AsyncCommands::del(&mut conn, namespaced).await;
		}
	}
}
