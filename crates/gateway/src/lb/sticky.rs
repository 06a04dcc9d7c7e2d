use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use dashmap::DashMap;

use super::LoadBalancer;
use crate::model::ServiceInstance;

struct Session {
	instance_id: String,
	expires_at: Instant,
}

/// Maps a session key (already extracted from cookie/header/query by the
/// caller) to a consistent instance index over a TTL, per spec §4.1
/// "sticky (session)". Falls back to a stable hash of the key when no
/// session entry exists yet or it expired.
pub struct StickyBalancer {
	sessions: DashMap<String, Session>,
	ttl: std::time::Duration,
}

impl Default for StickyBalancer {
	fn default() -> Self {
		StickyBalancer { sessions: DashMap::new(), ttl: std::time::Duration::from_secs(3600) }
	}
}

impl LoadBalancer for StickyBalancer {
	fn select<'a>(&self, key: &str, candidates: &'a [ServiceInstance]) -> Option<&'a ServiceInstance> {
		if candidates.is_empty() {
			return None;
		}
		let now = Instant::now();
		if let Some(session) = self.sessions.get(key) {
			if session.expires_at > now {
				if let Some(instance) = candidates.iter().find(|i| i.id == session.instance_id) {
					return Some(instance);
				}
			}
		}

		let mut sorted: Vec<&ServiceInstance> = candidates.iter().collect();
		sorted.sort_by(|a, b| a.id.cmp(&b.id));
		let mut hasher = DefaultHasher::new();
		key.hash(&mut hasher);
		let idx = (hasher.finish() as usize) % sorted.len();
		let chosen = sorted[idx];
		self.sessions.insert(
			key.to_string(),
			Session { instance_id: chosen.id.clone(), expires_at: now + self.ttl },
		);
		Some(chosen)
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
	fn same_key_maps_to_same_instance() {
		let candidates = vec![instance("i1"), instance("i2"), instance("i3")];
		let lb = StickyBalancer::default();
		let first = lb.select("session-42", &candidates).unwrap().id.clone();
		for _ in 0..10 {
			assert_eq!(lb.select("session-42", &candidates).unwrap().id, first);
		}
	}
}
