//! End-to-end scenarios from spec §8, driven against an in-process mock
//! backend (a tiny `axum` server bound to `127.0.0.1:0`), the way the
//! teacher's `tests/integration.rs` spins up a local listener rather than
//! mocking at the trait level. Each test builds the real router +
//! middleware chain and calls it directly, skipping only the outermost
//! TCP/axum listener (`frontend::http::HttpAdapter`) since that's pure
//! wire-protocol plumbing already covered by the frontend adapter's own
//! unit tests.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gateway::config::{CircuitBreakerConfig, HttpPoolConfig, RetryConfig};
use gateway::connectors::HttpConnector;
use gateway::context::RequestContext;
use gateway::discovery::{SharedRegistry, StaticRegistry};
use gateway::http_types::{Body, Request};
use gateway::middleware::{self, Handler, Middleware};
use gateway::model::{
	LoadBalanceStrategy, Protocol, RateLimitKeyBy, RateLimitPolicy, RouteRule, ServiceInstance,
};
use gateway::reliability::ratelimit::LocalStore;
use gateway::reliability::{BreakerRegistry, RateLimiter, RetryBudget};
use gateway::router::Router;

async fn spawn_backend(app: axum::Router) -> SocketAddr {
	let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	tokio::spawn(async move {
		axum::serve(listener, app.into_make_service()).await.unwrap();
	});
	addr
}

fn instance(id: &str, addr: SocketAddr) -> ServiceInstance {
	ServiceInstance {
		id: id.to_string(),
		service_name: "svc".to_string(),
		address: addr.ip().to_string(),
		port: addr.port(),
		scheme: "http".to_string(),
		healthy: true,
		weight: 1,
		tags: vec![],
		metadata: HashMap::new(),
	}
}

fn rule(path: &str, lb: LoadBalanceStrategy) -> RouteRule {
	RouteRule {
		id: "r1".to_string(),
		path: path.to_string(),
		methods: vec![],
		service_name: "svc".to_string(),
		protocol: Protocol::Http,
		load_balance: lb,
		timeout: None,
		session_affinity: None,
		auth_required: false,
		rate_limit: None,
		metadata: HashMap::new(),
	}
}

fn registry(instances: Vec<ServiceInstance>) -> SharedRegistry {
	let mut services = HashMap::new();
	services.insert("svc".to_string(), instances);
	Arc::new(StaticRegistry::new(services))
}

fn base_handler(router: Arc<Router>) -> Arc<dyn Handler> {
	let http = Arc::new(HttpConnector::new(&HttpPoolConfig::default()));
	Arc::new(gateway::handler::BaseHandler::new(router, http))
}

fn get_request(path: &str) -> Request {
	http::Request::builder().method("GET").uri(path).body(Body::empty()).unwrap()
}

fn ctx() -> RequestContext {
	RequestContext::new(String::new(), "127.0.0.1:1234".parse().unwrap())
}

async fn body_to_string(resp: http::Response<Body>) -> (http::StatusCode, String) {
	use http_body_util::BodyExt;
	let status = resp.status();
	let bytes = resp.into_body().collect().await.unwrap().to_bytes();
	(status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Scenario 1: happy HTTP path, single instance, 200 passthrough with
/// `X-Request-ID` attached by the logging middleware.
#[tokio::test(flavor = "multi_thread")]
async fn happy_http_round_trip() {
	let backend = axum::Router::new().route("/api/x", axum::routing::get(|| async { "ok" }));
	let addr = spawn_backend(backend).await;

	let router = Arc::new(Router::new(
		vec![rule("/api/*", LoadBalanceStrategy::RoundRobin)],
		registry(vec![instance("i1", addr)]),
	));
	let base = base_handler(router.clone());
	let chain = middleware::compose(
		vec![
			Box::new(middleware::recovery::Recovery),
			Box::new(middleware::logging::RequestLogging),
		],
		base,
	);

	let resp = chain.call(ctx(), get_request("/api/x")).await.unwrap();
	assert!(resp.headers().contains_key("x-request-id"));
	let (status, body) = body_to_string(resp).await;
	assert_eq!(status, http::StatusCode::OK);
	assert_eq!(body, "ok");
}

/// Scenario 2: round-robin alternates deterministically across two
/// instances for ten sequential requests.
#[tokio::test(flavor = "multi_thread")]
async fn round_robin_alternates_across_instances() {
	let hits_a = Arc::new(AtomicUsize::new(0));
	let hits_b = Arc::new(AtomicUsize::new(0));
	let (ha, hb) = (hits_a.clone(), hits_b.clone());
	let backend_a = axum::Router::new().route(
		"/x",
		axum::routing::get(move || {
			let ha = ha.clone();
			async move {
				ha.fetch_add(1, Ordering::SeqCst);
				"a"
			}
		}),
	);
	let backend_b = axum::Router::new().route(
		"/x",
		axum::routing::get(move || {
			let hb = hb.clone();
			async move {
				hb.fetch_add(1, Ordering::SeqCst);
				"b"
			}
		}),
	);
	let addr_a = spawn_backend(backend_a).await;
	let addr_b = spawn_backend(backend_b).await;

	let router = Arc::new(Router::new(
		vec![rule("/x", LoadBalanceStrategy::RoundRobin)],
		registry(vec![instance("i1", addr_a), instance("i2", addr_b)]),
	));
	let chain = base_handler(router);

	for _ in 0..10 {
		let resp = chain.call(ctx(), get_request("/x")).await.unwrap();
		assert_eq!(resp.status(), http::StatusCode::OK);
	}

	assert_eq!(hits_a.load(Ordering::SeqCst), 5);
	assert_eq!(hits_b.load(Ordering::SeqCst), 5);
}

/// Scenario 3: rate limit of rate=2/burst=2 admits two requests and denies
/// the third with 429 + `Retry-After`.
#[tokio::test(flavor = "multi_thread")]
async fn rate_limit_denies_third_request() {
	let backend = axum::Router::new().route("/x", axum::routing::get(|| async { "ok" }));
	let addr = spawn_backend(backend).await;

	let mut route = rule("/x", LoadBalanceStrategy::RoundRobin);
	route.rate_limit =
		Some(RateLimitPolicy { rate: 2, burst: 2, key_by: RateLimitKeyBy::ClientIp, storage: None });
	let router = Arc::new(Router::new(vec![route], registry(vec![instance("i1", addr)])));
	let base = base_handler(router.clone());
	let limiter = Arc::new(RateLimiter::new(Box::new(LocalStore::new(1_000))));
	let chain = middleware::compose(
		vec![
			Box::new(middleware::route_resolution::RouteResolution::new(router.clone())),
			Box::new(middleware::rate_limit::RateLimitMiddleware::new(limiter)),
		],
		base,
	);

	for _ in 0..2 {
		let resp = chain.call(ctx(), get_request("/x")).await.unwrap();
		assert_eq!(resp.status(), http::StatusCode::OK);
	}

	let err = chain.call(ctx(), get_request("/x")).await.unwrap_err();
	assert_eq!(err.status(), http::StatusCode::TOO_MANY_REQUESTS);
}

/// Scenario 4: three consecutive 5xx responses open the breaker; the fourth
/// request fails fast without reaching the backend.
#[tokio::test(flavor = "multi_thread")]
async fn circuit_breaker_opens_after_max_failures() {
	let hits = Arc::new(AtomicUsize::new(0));
	let h = hits.clone();
	let backend = axum::Router::new().route(
		"/x",
		axum::routing::get(move || {
			let h = h.clone();
			async move {
				h.fetch_add(1, Ordering::SeqCst);
				http::StatusCode::SERVICE_UNAVAILABLE
			}
		}),
	);
	let addr = spawn_backend(backend).await;

	let router =
		Arc::new(Router::new(vec![rule("/x", LoadBalanceStrategy::RoundRobin)], registry(vec![instance("i1", addr)])));
	let base = base_handler(router.clone());
	let breaker_config = CircuitBreakerConfig {
		max_failures: 3,
		failure_threshold: 1.0,
		interval: std::time::Duration::from_secs(60),
		timeout: std::time::Duration::from_secs(2),
		max_requests: 1,
	};
	let breaker = BreakerRegistry::new(breaker_config);
	let retry_budget = RetryBudget::new(0.1, 10.0);
	let chain = middleware::compose(
		vec![
			Box::new(middleware::route_resolution::RouteResolution::new(router.clone())),
			Box::new(middleware::circuit_breaker::CircuitBreakerMiddleware::new(breaker)),
			Box::new(middleware::retry::RetryMiddleware::new((&RetryConfig::default()).into(), retry_budget)),
		],
		base,
	);

	for _ in 0..3 {
		let resp = chain.call(ctx(), get_request("/x")).await.unwrap();
		assert_eq!(resp.status(), http::StatusCode::SERVICE_UNAVAILABLE);
	}
	assert_eq!(hits.load(Ordering::SeqCst), 3);

	// Fourth request: breaker is open, must fail without another backend hit.
	let err = chain.call(ctx(), get_request("/x")).await.unwrap_err();
	assert_eq!(err.status(), http::StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(hits.load(Ordering::SeqCst), 3, "breaker-open request must not reach the connector");
}
