//! Prometheus metric definitions for the gateway domain (spec §6 "Metrics
//! endpoint"). Grounded on the teacher's `mtrcs.rs` registration pattern:
//! a struct of `Family<Labels, Counter/Histogram>` fields registered once
//! against a `prometheus_client::registry::Registry` sub-registry.

use std::sync::Arc;
use std::time::Duration;

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
struct RequestLabels {
	method: String,
	status: String,
}

struct Inner {
	requests_total: Family<RequestLabels, Counter>,
	request_duration_seconds: Family<RequestLabels, Histogram>,
}

#[derive(Clone)]
pub struct GatewayMetrics {
	inner: Arc<Inner>,
}

impl GatewayMetrics {
	pub fn new(registry: &mut Registry) -> Self {
		let requests_total = Family::<RequestLabels, Counter>::default();
		let request_duration_seconds = Family::<RequestLabels, Histogram>::new_with_constructor(|| {
			Histogram::new([0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0].into_iter())
		});

		registry.register("gateway_requests_total", "Total requests processed", requests_total.clone());
		registry.register(
			"gateway_request_duration_seconds",
			"Request latency in seconds",
			request_duration_seconds.clone(),
		);

		GatewayMetrics { inner: Arc::new(Inner { requests_total, request_duration_seconds }) }
	}

	pub fn observe_request(&self, method: &str, _path: &str, status: u16, elapsed: Duration) {
		let labels = RequestLabels { method: method.to_string(), status: status.to_string() };
		self.inner.requests_total.get_or_create(&labels).inc();
		self.inner.request_duration_seconds.get_or_create(&labels).observe(elapsed.as_secs_f64());
	}
}
