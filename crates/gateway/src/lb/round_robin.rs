use std::sync::atomic::{AtomicUsize, Ordering};

use super::LoadBalancer;
use crate::model::ServiceInstance;

/// Atomic counter modulo instance count; ties broken by stable (registry)
/// order, per spec §4.1.
#[derive(Default)]
pub struct RoundRobinBalancer {
	counter: AtomicUsize,
}

impl LoadBalancer for RoundRobinBalancer {
	fn select<'a>(&self, _key: &str, candidates: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
		if candidates.is_empty() {
			return None;
		}
		let idx = self.counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
		candidates.get(idx)
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use super::*;

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
			metadata: HashMap::new(),
		}
	}

	#[test]
	fn alternates_deterministically() {
		let candidates = vec![instance("i1"), instance("i2")];
		let lb = RoundRobinBalancer::default();
		let picks: Vec<&str> =
			(0..10).map(|_| lb.select("k", &candidates).unwrap().id.as_str()).collect();
		let i1_count = picks.iter().filter(|id| **id == "i1").count();
		let i2_count = picks.iter().filter(|id| **id == "i2").count();
		assert_eq!(i1_count, 5);
		assert_eq!(i2_count, 5);
		assert_eq!(picks, vec!["i1", "i2", "i1", "i2", "i1", "i2", "i1", "i2", "i1", "i2"]);
	}
}
