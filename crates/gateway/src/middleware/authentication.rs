//! Authentication middleware (spec §4.6). Grounded on the teacher's
//! `http/jwt.rs` (`LocalJwtConfig`, JWKS loading via `jsonwebtoken::jwk`)
//! for the JWT path, and the constant-time `subtle` comparison pattern the
//! teacher's dependency table already carries for the API-key path
//! (SPEC_FULL §[SUPPLEMENT] API-key authentication).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use parking_lot::RwLock;
use secrecy::ExposeSecret;
use serde_json::Value;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use super::{DynHandler, Handler, HandlerFuture, Middleware};
use crate::config::{ApiKeyConfig, AuthConfig, JwtConfig, JwtSigning};
use crate::context::{Claims, RequestContext};
use crate::error::GatewayError;
use crate::http_types::Request;

/// `Validate(token) -> (claims, error)` (spec §6 auth provider contract).
#[async_trait::async_trait]
pub trait AuthProvider: Send + Sync {
	async fn validate(&self, token: &str) -> Result<HashMap<String, Value>, GatewayError>;
}

pub struct JwtProvider {
	issuer: Option<String>,
	audiences: Vec<String>,
	keys: JwtKeys,
}

enum JwtKeys {
	Static(DecodingKey, Algorithm),
	Jwks { url: url::Url, cache: Arc<RwLock<Option<(JwkSet, Instant)>>>, ttl: Duration },
}

impl JwtProvider {
	pub async fn from_config(config: &JwtConfig) -> Result<Self, GatewayError> {
		let keys = match &config.signing {
			JwtSigning::Hmac { secret } => {
				JwtKeys::Static(DecodingKey::from_secret(secret.expose_secret().as_bytes()), Algorithm::HS256)
			}
			JwtSigning::Rsa { public_key_path } => {
				let pem = std::fs::read(public_key_path)
					.map_err(|e| GatewayError::internal(format!("reading JWT public key: {e}")))?;
				let key = DecodingKey::from_rsa_pem(&pem)
					.map_err(|e| GatewayError::internal(format!("parsing JWT public key: {e}")))?;
				JwtKeys::Static(key, Algorithm::RS256)
			}
			JwtSigning::Jwks { url, ttl } => {
				JwtKeys::Jwks { url: url.clone(), cache: Arc::new(RwLock::new(None)), ttl: *ttl }
			}
		};
		Ok(JwtProvider { issuer: config.issuer.clone(), audiences: config.audiences.clone(), keys })
	}

	async fn decoding_key_for(&self, kid: Option<&str>) -> Result<(DecodingKey, Algorithm), GatewayError> {
		match &self.keys {
			JwtKeys::Static(key, alg) => Ok((key.clone(), *alg)),
			JwtKeys::Jwks { url, cache, ttl } => {
				let needs_refresh = {
					let guard = cache.read();
					guard.as_ref().map(|(_, fetched_at)| fetched_at.elapsed() > *ttl).unwrap_or(true)
				};
				if needs_refresh {
					let jwks: JwkSet = reqwest::get(url.clone())
						.await
						.map_err(|e| GatewayError::internal(format!("fetching JWKS: {e}")))?
						.json()
						.await
						.map_err(|e| GatewayError::internal(format!("parsing JWKS: {e}")))?;
					*cache.write() = Some((jwks, Instant::now()));
				}
				let guard = cache.read();
				let (jwks, _) = guard.as_ref().expect("just populated above");
				let kid = kid.ok_or_else(|| GatewayError::unauthorized("token missing key id"))?;
				let jwk = jwks
					.find(kid)
					.ok_or_else(|| GatewayError::unauthorized(format!("unknown key id {kid}")))?;
				let key = DecodingKey::from_jwk(jwk)
					.map_err(|e| GatewayError::unauthorized(format!("invalid JWKS key: {e}")))?;
				let alg = jwk.common.algorithm.and_then(|a| Algorithm::from_str_opt(&a.to_string()))
					.unwrap_or(Algorithm::RS256);
				Ok((key, alg))
			}
		}
	}
}

trait AlgorithmExt {
	fn from_str_opt(s: &str) -> Option<Algorithm>;
}
impl AlgorithmExt for Algorithm {
	fn from_str_opt(s: &str) -> Option<Algorithm> {
		s.parse().ok()
	}
}

#[async_trait::async_trait]
impl AuthProvider for JwtProvider {
	async fn validate(&self, token: &str) -> Result<HashMap<String, Value>, GatewayError> {
		let header = jsonwebtoken::decode_header(token)
			.map_err(|e| GatewayError::unauthorized(format!("malformed token: {e}")))?;
		let (key, alg) = self.decoding_key_for(header.kid.as_deref()).await?;

		let mut validation = Validation::new(alg);
		if let Some(iss) = &self.issuer {
			validation.set_issuer(&[iss]);
		}
		if !self.audiences.is_empty() {
			validation.set_audience(&self.audiences);
		}

		let data = decode::<HashMap<String, Value>>(token, &key, &validation)
			.map_err(|e| GatewayError::unauthorized(format!("token validation failed: {e}")))?;
		Ok(data.claims)
	}
}

/// Constant-time comparison against a configured table of hashed keys
/// (spec §4.6 "API key").
pub struct ApiKeyProvider {
	keys: Vec<crate::config::ApiKeyEntry>,
}

impl ApiKeyProvider {
	pub fn from_config(config: &ApiKeyConfig) -> Self {
		ApiKeyProvider { keys: config.keys.clone() }
	}

	fn hash(candidate: &str) -> String {
		let digest = Sha256::digest(candidate.as_bytes());
		hex::encode(digest)
	}
}

#[async_trait::async_trait]
impl AuthProvider for ApiKeyProvider {
	async fn validate(&self, token: &str) -> Result<HashMap<String, Value>, GatewayError> {
		let candidate_hash = Self::hash(token);
		for entry in &self.keys {
			if entry.disabled {
				continue;
			}
			if let Some(expires_at) = entry.expires_at {
				if expires_at < chrono::Utc::now() {
					continue;
				}
			}
			if candidate_hash.as_bytes().ct_eq(entry.hash.as_bytes()).into() {
				let mut claims = HashMap::new();
				claims.insert("scopes".to_string(), Value::from(entry.scopes.clone()));
				return Ok(claims);
			}
		}
		Err(GatewayError::unauthorized("invalid API key"))
	}
}

pub struct Authentication {
	jwt: Option<Arc<JwtProvider>>,
	api_key: Option<Arc<ApiKeyProvider>>,
	skip_paths: Vec<String>,
}

impl Authentication {
	pub async fn from_config(config: &AuthConfig) -> Result<Self, GatewayError> {
		let jwt = match &config.jwt {
			Some(jwt_config) => Some(Arc::new(JwtProvider::from_config(jwt_config).await?)),
			None => None,
		};
		let api_key = config.api_keys.as_ref().map(|c| Arc::new(ApiKeyProvider::from_config(c)));
		Ok(Authentication { jwt, api_key, skip_paths: config.skip_paths.clone() })
	}

	fn extract_token(req: &Request) -> Option<(&'static str, String)> {
		if let Some(header) = req.headers().get(http::header::AUTHORIZATION) {
			if let Ok(s) = header.to_str() {
				if let Some(bearer) = s.strip_prefix("Bearer ") {
					return Some(("bearer", bearer.to_string()));
				}
			}
		}
		if let Some(key) = req.headers().get("x-api-key") {
			if let Ok(s) = key.to_str() {
				return Some(("api_key", s.to_string()));
			}
		}
		None
	}
}

impl Middleware for Authentication {
	fn wrap(&self, next: DynHandler) -> DynHandler {
		std::sync::Arc::new(AuthenticationHandler {
			next,
			jwt: self.jwt.clone(),
			api_key: self.api_key.clone(),
			skip_paths: self.skip_paths.clone(),
		})
	}
}

struct AuthenticationHandler {
	next: DynHandler,
	jwt: Option<Arc<JwtProvider>>,
	api_key: Option<Arc<ApiKeyProvider>>,
	skip_paths: Vec<String>,
}

impl Handler for AuthenticationHandler {
	fn call(&self, mut ctx: RequestContext, req: Request) -> HandlerFuture {
		let next = self.next.clone();
		let jwt = self.jwt.clone();
		let api_key = self.api_key.clone();
		let path = req.uri().path().to_string();
		let skip = self.skip_paths.iter().any(|p| p == &path);
		let auth_required = ctx.route.as_ref().map(|r| r.rule.auth_required).unwrap_or(false);

		Box::pin(async move {
			if skip {
				return next.call(ctx, req).await;
			}

			match Authentication::extract_token(&req) {
				Some((kind, token)) => {
					let result = match kind {
						"bearer" => match &jwt {
							Some(provider) => provider.validate(&token).await,
							None => Err(GatewayError::unauthorized("JWT auth not configured")),
						},
						_ => match &api_key {
							Some(provider) => provider.validate(&token).await,
							None => Err(GatewayError::unauthorized("API key auth not configured")),
						},
					};
					match result {
						Ok(claims) => {
							ctx.with_claims(Claims(claims));
							next.call(ctx, req).await
						}
						Err(err) if auth_required => Err(err),
						Err(_) => next.call(ctx, req).await,
					}
				}
				None if auth_required => Err(GatewayError::unauthorized("missing credentials")),
				None => next.call(ctx, req).await,
			}
		})
	}
}

