//! Config hot-reload watcher (spec §9 "Dynamic configuration reload",
//! SPEC_FULL §[AMBIENT]1 step 4). Grounded on the `notify` +
//! `notify-debouncer-full` pair already in the workspace dependency table:
//! debounce filesystem events on the config file, re-run the same
//! load-and-validate pipeline `config::load` uses for the initial read, and
//! only swap the router's rule table if validation succeeds. A swap failure
//! is logged and the previous configuration stays live — spec: "in-flight
//! requests keep their original policies via reference counting or
//! immutable snapshots", which `Router::reload`'s `ArcSwap` already gives us.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify_debouncer_full::notify::RecursiveMode;
use notify_debouncer_full::{DebounceEventResult, new_debouncer};

use crate::config;
use crate::router::Router;

/// Spawns a background task that watches `path` and swaps `router`'s rule
/// table whenever the file changes and the new contents validate. Returns a
/// guard; dropping it stops the watcher. The debouncer itself runs on its
/// own thread (that's how `notify` delivers events), forwarding into this
/// task over a channel so the reload logic stays on the Tokio runtime.
pub fn watch(path: PathBuf, router: Router2) -> ReloadGuard {
	let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<DebounceEventResult>();

	let watch_path = path.clone();
	let debouncer_thread = std::thread::spawn(move || {
		let mut debouncer = match new_debouncer(Duration::from_millis(500), None, move |result| {
			let _ = tx.send(result);
		}) {
			Ok(d) => d,
			Err(e) => {
				tracing::error!(error = %e, "failed to start config file watcher");
				return;
			}
		};
		if let Err(e) = debouncer.watch(&watch_path, RecursiveMode::NonRecursive) {
			tracing::error!(error = %e, path = %watch_path.display(), "failed to watch config file");
			return;
		}
		// Park this thread for the process lifetime; the debouncer's internal
		// watcher thread keeps delivering events through `tx` until dropped.
		std::thread::park();
	});

	let task = tokio::spawn(async move {
		while let Some(result) = rx.recv().await {
			match result {
				Ok(events) if events.iter().any(|e| e.kind.is_modify() || e.kind.is_create()) => {
					reload_once(&path, &router).await;
				}
				Ok(_) => {}
				Err(errors) => {
					for e in errors {
						tracing::warn!(error = %e, "config watcher error");
					}
				}
			}
		}
	});

	ReloadGuard { task, _debouncer_thread: debouncer_thread }
}

async fn reload_once(path: &Path, router: &Router2) {
	match config::load(path) {
		Ok(new_config) => {
			router.reload(new_config.router.rules.clone());
			tracing::info!(path = %path.display(), rules = new_config.router.rules.len(), "config reloaded");
		}
		Err(e) => {
			tracing::warn!(path = %path.display(), error = %e, "config reload failed validation, keeping previous configuration");
		}
	}
}

/// `Router` is typically held behind an `Arc` by the caller; this alias
/// documents that `watch` only needs the shared handle, not ownership.
pub type Router2 = std::sync::Arc<Router>;

pub struct ReloadGuard {
	task: tokio::task::JoinHandle<()>,
	_debouncer_thread: std::thread::JoinHandle<()>,
}

impl Drop for ReloadGuard {
	fn drop(&mut self) {
		self.task.abort();
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use super::*;

	#[tokio::test]
	async fn reload_swaps_rules_on_valid_change() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(
			file,
			"registry:\n  type: static\n  services: {{}}\nrouter:\n  rules:\n    - id: r1\n      path: /a\n      serviceName: svc\n"
		)
		.unwrap();
		let registry: crate::discovery::SharedRegistry =
			std::sync::Arc::new(crate::discovery::StaticRegistry::new(Default::default()));
		let router = std::sync::Arc::new(Router::new(vec![], registry));

		reload_once(file.path(), &router).await;
		let resolved = router
			.resolve(&http::Method::GET, "/a", crate::model::Protocol::Http, None)
			.await;
		// No healthy instance registered, but the rule itself must now match
		// instead of 404ing -- proves the reload swapped the table.
		assert!(matches!(resolved, Err(e) if e.status() == http::StatusCode::SERVICE_UNAVAILABLE));
	}

	#[tokio::test]
	async fn invalid_reload_keeps_previous_rules() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "not: valid: yaml: [").unwrap();
		let registry: crate::discovery::SharedRegistry =
			std::sync::Arc::new(crate::discovery::StaticRegistry::new(Default::default()));
		let rules = vec![crate::model::RouteRule {
			id: "kept".into(),
			path: "/kept".into(),
			methods: vec![],
			service_name: "svc".into(),
			protocol: crate::model::Protocol::Http,
			load_balance: crate::model::LoadBalanceStrategy::RoundRobin,
			timeout: None,
			session_affinity: None,
			auth_required: false,
			rate_limit: None,
			metadata: Default::default(),
		}];
		let router = std::sync::Arc::new(Router::new(rules, registry));

		reload_once(file.path(), &router).await;
		let resolved = router
			.resolve(&http::Method::GET, "/kept", crate::model::Protocol::Http, None)
			.await;
		assert!(matches!(resolved, Err(e) if e.status() == http::StatusCode::SERVICE_UNAVAILABLE));
	}
}
