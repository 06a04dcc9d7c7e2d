//! Service discovery contract (spec §6 "Discovery contract") and the one
//! reference implementation this crate ships, a config-driven static
//! registry. Dynamic (container-orchestrator) discovery stays an external
//! collaborator per spec §1; `DynamicRegistry` here is a thin placeholder
//! that satisfies the trait boundary without implementing an adapter.

mod r#static;

pub use r#static::StaticRegistry;

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::model::ServiceInstance;

/// An instance addition, removal, or health-flag change, delivered to
/// watchers registered via [`ServiceRegistry::watch`].
#[derive(Clone, Debug)]
pub enum DiscoveryEvent {
	Added(ServiceInstance),
	Removed { service_name: String, instance_id: String },
	HealthChanged { service_name: String, instance_id: String, healthy: bool },
}

/// `GetService(name) -> []ServiceInstance` plus an optional watch stream
/// (spec §6). Implementations must be cheap to clone (an `Arc` inside) since
/// the router holds one for the lifetime of the process.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
	async fn get_service(&self, name: &str) -> Vec<ServiceInstance>;

	/// Instances with `healthy == true`, the set the load balancer is
	/// allowed to choose from (spec §3 invariant).
	async fn get_healthy(&self, name: &str) -> Vec<ServiceInstance> {
		self.get_service(name).await.into_iter().filter(|i| i.healthy).collect()
	}

	/// A broadcast receiver of [`DiscoveryEvent`]s. The default
	/// implementation returns `None` for registries with no live-update
	/// source (e.g. a static registry loaded once at config time).
	fn watch(&self) -> Option<broadcast::Receiver<DiscoveryEvent>> {
		None
	}
}

pub type SharedRegistry = Arc<dyn ServiceRegistry>;
