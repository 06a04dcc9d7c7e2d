//! Router: matches (method, path, protocol) to a [`RouteRule`] and, via the
//! registry + load balancer, to a [`ServiceInstance`] (spec §4.1). Grounded
//! on the teacher's `proxy::resolve_backend`/`resolve_simple_backend`
//! two-step "find the rule, then pick the instance" shape, with the
//! teacher's XDS route table replaced by the flat rule list spec §3
//! describes.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::discovery::SharedRegistry;
use crate::error::GatewayError;
use crate::lb::{self, LoadBalancer};
use crate::model::{Protocol, RouteResult, RouteRule};

/// A rule plus the long-lived balancer instance bound to it (round-robin's
/// counter must survive across requests).
struct CompiledRule {
	rule: Arc<RouteRule>,
	balancer: Box<dyn LoadBalancer>,
}

struct RouterInner {
	/// Sorted most-specific-first per spec §4.1: exact paths before
	/// prefix-wildcards; among same-shape rules, original (stable) order is
	/// preserved as a tie-break.
	rules: Vec<CompiledRule>,
}

fn compile(rules: Vec<RouteRule>) -> RouterInner {
	let mut indexed: Vec<(usize, RouteRule)> = rules.into_iter().enumerate().collect();
	indexed.sort_by(|(ia, a), (ib, b)| {
		b.specificity().cmp(&a.specificity()).then(ia.cmp(ib))
	});
	let rules = indexed
		.into_iter()
		.map(|(_, rule)| {
			let strategy = rule.load_balance;
			CompiledRule { rule: Arc::new(rule), balancer: lb::build(strategy) }
		})
		.collect();
	RouterInner { rules }
}

/// Swappable atomically on config reload (spec §9 "Dynamic configuration
/// reload"); in-flight requests keep whichever `Arc` snapshot they already
/// resolved against.
pub struct Router {
	inner: ArcSwap<RouterInner>,
	registry: SharedRegistry,
}

impl Router {
	pub fn new(rules: Vec<RouteRule>, registry: SharedRegistry) -> Self {
		Router { inner: ArcSwap::from_pointee(compile(rules)), registry }
	}

	/// Atomically replaces the rule table, e.g. after a validated config
	/// reload. Existing `RouteResult`s already handed out are unaffected.
	pub fn reload(&self, rules: Vec<RouteRule>) {
		self.inner.store(Arc::new(compile(rules)));
	}

	/// Finds the first matching rule (already sorted most-specific-first),
	/// then resolves an instance via the registry and that rule's load
	/// balancer. Spec §4.1 failure semantics: no rule matched -> `NotFound`;
	/// protocol mismatch on an otherwise-matching path -> `BadRequest`; no
	/// healthy instance -> `ServiceUnavailable`.
	pub async fn resolve(
		&self,
		method: &http::Method,
		path: &str,
		protocol: Protocol,
		affinity_key: Option<&str>,
	) -> Result<RouteResult, GatewayError> {
		let snapshot = self.inner.load();

		let mut path_matched_other_protocol = false;
		let mut matched: Option<&CompiledRule> = None;
		for candidate in snapshot.rules.iter() {
			if !candidate.rule.matches_path(path) {
				continue;
			}
			if candidate.rule.protocol != protocol {
				path_matched_other_protocol = true;
				continue;
			}
			if !candidate.rule.matches_method(method) {
				continue;
			}
			matched = Some(candidate);
			break;
		}

		let Some(compiled) = matched else {
			if path_matched_other_protocol {
				return Err(GatewayError::bad_request(format!(
					"path {path} is not configured for protocol {protocol:?}"
				)));
			}
			return Err(GatewayError::not_found(method.clone(), path.to_string()));
		};

		let healthy = self.registry.get_healthy(&compiled.rule.service_name).await;
		if healthy.is_empty() {
			return Err(GatewayError::service_unavailable(format!(
				"no healthy instances for service {}",
				compiled.rule.service_name
			)));
		}

		let key = affinity_key.unwrap_or(path);
		let instance = compiled
			.balancer
			.select(key, &healthy)
			.ok_or_else(|| {
				GatewayError::service_unavailable(format!(
					"load balancer returned no instance for service {}",
					compiled.rule.service_name
				))
			})?
			.clone();

		Ok(RouteResult { rule: compiled.rule.clone(), instance })
	}
}

/// Route metadata keyed by id, exposed for middleware that needs to look up
/// policy without holding a `RouteResult` (e.g. the breaker registry using
/// route id as a key before the route is even resolved).
pub fn index_by_id(rules: &[RouteRule]) -> HashMap<String, RouteRule> {
	rules.iter().map(|r| (r.id.clone(), r.clone())).collect()
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap as StdHashMap;

	use super::*;
	use crate::discovery::StaticRegistry;
	use crate::model::ServiceInstance;

	fn rule(id: &str, path: &str) -> RouteRule {
		RouteRule {
			id: id.to_string(),
			path: path.to_string(),
			methods: vec![],
			service_name: "svc".to_string(),
			protocol: Protocol::Http,
			load_balance: crate::model::LoadBalanceStrategy::RoundRobin,
			timeout: None,
			session_affinity: None,
			auth_required: false,
			rate_limit: None,
			metadata: StdHashMap::new(),
		}
	}

	fn instance(id: &str) -> ServiceInstance {
		ServiceInstance {
			id: id.to_string(),
			service_name: "svc".to_string(),
			address: "127.0.0.1".to_string(),
			port: 9000,
			scheme: "http".to_string(),
			healthy: true,
			weight: 1,
			tags: vec![],
			metadata: StdHashMap::new(),
		}
	}

	fn registry() -> SharedRegistry {
		let mut services = StdHashMap::new();
		services.insert("svc".to_string(), vec![instance("i1")]);
		Arc::new(StaticRegistry::new(services))
	}

	#[tokio::test]
	async fn exact_path_wins_over_prefix() {
		let rules = vec![rule("prefix", "/api/*"), rule("exact", "/api/x")];
		let router = Router::new(rules, registry());
		let resolved =
			router.resolve(&http::Method::GET, "/api/x", Protocol::Http, None).await.unwrap();
		assert_eq!(resolved.rule.id, "exact");
	}

	#[tokio::test]
	async fn no_match_is_not_found() {
		let router = Router::new(vec![rule("r1", "/api/*")], registry());
		let err = router.resolve(&http::Method::GET, "/other", Protocol::Http, None).await.unwrap_err();
		assert_eq!(err.status(), http::StatusCode::NOT_FOUND);
	}

	#[tokio::test]
	async fn protocol_mismatch_is_bad_request() {
		let mut ws_rule = rule("r1", "/ws");
		ws_rule.protocol = Protocol::WebSocket;
		let router = Router::new(vec![ws_rule], registry());
		let err = router.resolve(&http::Method::GET, "/ws", Protocol::Http, None).await.unwrap_err();
		assert_eq!(err.status(), http::StatusCode::BAD_REQUEST);
	}

	#[tokio::test]
	async fn no_healthy_instance_is_service_unavailable() {
		let empty_registry: SharedRegistry = Arc::new(StaticRegistry::new(StdHashMap::new()));
		let router = Router::new(vec![rule("r1", "/api/*")], empty_registry);
		let err =
			router.resolve(&http::Method::GET, "/api/x", Protocol::Http, None).await.unwrap_err();
		assert_eq!(err.status(), http::StatusCode::SERVICE_UNAVAILABLE);
	}
}
