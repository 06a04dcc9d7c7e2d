//! Static, config-loaded registry: the one discovery adapter spec §1 asks
//! this crate to ship as a reference implementation. Grounded on the shape
//! of the teacher's `store::discovery::Store`, stripped of its XDS
//! event-sourcing since a static registry never mutates after load.

use std::collections::HashMap;

use async_trait::async_trait;

use super::ServiceRegistry;
use crate::model::ServiceInstance;

#[derive(Debug, Default)]
pub struct StaticRegistry {
	services: HashMap<String, Vec<ServiceInstance>>,
}

impl StaticRegistry {
	pub fn new(services: HashMap<String, Vec<ServiceInstance>>) -> Self {
		StaticRegistry { services }
	}
}

#[async_trait]
impl ServiceRegistry for StaticRegistry {
	async fn get_service(&self, name: &str) -> Vec<ServiceInstance> {
		self.services.get(name).cloned().unwrap_or_default()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn instance(id: &str, healthy: bool) -> ServiceInstance {
		ServiceInstance {
			id: id.to_string(),
			service_name: "svc".to_string(),
			address: "127.0.0.1".to_string(),
			port: 9000,
			scheme: "http".to_string(),
			healthy,
			weight: 1,
			tags: vec![],
			metadata: HashMap::new(),
		}
	}

	#[tokio::test]
	async fn filters_unhealthy_instances() {
		let mut services = HashMap::new();
		services.insert("svc".to_string(), vec![instance("i1", true), instance("i2", false)]);
		let registry = StaticRegistry::new(services);

		assert_eq!(registry.get_service("svc").await.len(), 2);
		let healthy = registry.get_healthy("svc").await;
		assert_eq!(healthy.len(), 1);
		assert_eq!(healthy[0].id, "i1");
	}

	#[tokio::test]
	async fn unknown_service_returns_empty() {
		let registry = StaticRegistry::new(HashMap::new());
		assert!(registry.get_service("missing").await.is_empty());
	}
}
