//! Registry of loaded plugins, keyed by package name.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use futures::future::join_all;
use rtcgate_protocol::PluginDescriptor;
use tracing::{info, warn};

use super::{EventSink, Plugin, PluginError};

/// Loaded once at startup and immutable afterwards.
#[derive(Clone, Default)]
pub struct PluginRegistry {
    plugins: Arc<HashMap<String, Arc<dyn Plugin>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from already initialized plugins.
    pub fn from_plugins(plugins: Vec<Arc<dyn Plugin>>) -> Result<Self, PluginError> {
        let mut map = HashMap::with_capacity(plugins.len());
        for plugin in plugins {
            let package = plugin.package().to_string();
            if map.contains_key(&package) {
                return Err(PluginError::DuplicatePackage(package));
            }
            map.insert(package, plugin);
        }
        Ok(Self {
            plugins: Arc::new(map),
        })
    }

    /// Initialize and register every candidate not listed in `disabled`.
    ///
    /// Two candidates claiming the same package name is fatal. A plugin whose
    /// init fails is skipped.
    pub async fn load_all(
        candidates: Vec<Arc<dyn Plugin>>,
        disabled: &[String],
        sink: EventSink,
    ) -> Result<Self, PluginError> {
        let mut seen = HashSet::new();
        for plugin in &candidates {
            if !seen.insert(plugin.package().to_string()) {
                return Err(PluginError::DuplicatePackage(plugin.package().to_string()));
            }
        }

        let mut plugins = HashMap::new();
        for plugin in candidates {
            let package = plugin.package().to_string();
            if disabled.contains(&package) {
                info!(plugin = %package, "Plugin disabled, skipping");
                continue;
            }
            if let Err(e) = plugin.init(sink.clone()).await {
                warn!(plugin = %package, error = %e, "Plugin failed to initialize, skipping");
                continue;
            }
            let descriptor = plugin.descriptor();
            info!(
                plugin = %package,
                name = %descriptor.name,
                version = %descriptor.version,
                "Registered plugin"
            );
            plugins.insert(package, plugin);
        }

        if plugins.is_empty() {
            warn!("No plugins loaded; clients will not be able to attach handles");
        }

        Ok(Self {
            plugins: Arc::new(plugins),
        })
    }

    /// Get a plugin by package name.
    pub fn find(&self, package: &str) -> Option<Arc<dyn Plugin>> {
        self.plugins.get(package).cloned()
    }

    /// Metadata of every registered plugin, ordered by package.
    pub fn descriptors(&self) -> BTreeMap<String, PluginDescriptor> {
        self.plugins
            .iter()
            .map(|(package, plugin)| (package.clone(), plugin.descriptor()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Run every plugin's teardown hook concurrently, so one slow plugin does
    /// not hold up the others.
    pub async fn close_all(&self) {
        join_all(self.plugins.iter().map(|(package, plugin)| async move {
            plugin.destroy().await;
            info!(plugin = %package, "Plugin closed");
        }))
        .await;
    }
}
