//! Load balancer: picks one [`ServiceInstance`] from a healthy candidate set
//! (spec §4.1). Grounded on the teacher's `httpproxy::select_backend`
//! weighted-random selection, generalized into the three named strategies
//! and given a sticky-session variant the teacher's mesh proxy didn't need.

mod round_robin;
mod sticky;

pub use round_robin::RoundRobinBalancer;
pub use sticky::StickyBalancer;

use rand::seq::SliceRandom;

use crate::model::{LoadBalanceStrategy, ServiceInstance};

/// Selects an instance from `candidates`, which callers must have already
/// filtered to `healthy == true` (spec §3 invariant: "A ServiceInstance
/// returned by the registry for the purpose of load balancing is
/// healthy=true").
pub trait LoadBalancer: Send + Sync {
	fn select<'a>(
		&self,
		key: &str,
		candidates: &'a [ServiceInstance],
	) -> Option<&'a ServiceInstance>;
}

pub struct RandomBalancer;

impl LoadBalancer for RandomBalancer {
	fn select<'a>(&self, _key: &str, candidates: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
		weighted_choice(candidates)
	}
}

/// Weighted-random pick, mirroring the teacher's `select_backend`: each
/// instance's `weight` scales its probability, defaulting all weights to 1
/// behaves like a uniform pick.
fn weighted_choice(candidates: &[ServiceInstance]) -> Option<&ServiceInstance> {
	if candidates.is_empty() {
		return None;
	}
	candidates.choose_weighted(&mut rand::thread_rng(), |i| i.weight.max(1) as f64).ok()
}

/// Builds the configured strategy's balancer. Each variant owns its own
/// concurrency-safe state (e.g. the round-robin counter), so the router
/// keeps one long-lived instance per route rather than constructing one per
/// request.
pub fn build(strategy: LoadBalanceStrategy) -> Box<dyn LoadBalancer> {
	match strategy {
		LoadBalanceStrategy::RoundRobin => Box::new(RoundRobinBalancer::default()),
		LoadBalanceStrategy::Random => Box::new(RandomBalancer),
		LoadBalanceStrategy::Sticky => Box::new(StickyBalancer::default()),
	}
}
