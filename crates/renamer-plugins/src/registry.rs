//! Plugin kinds and their factories.

use std::collections::BTreeMap;
use std::sync::Arc;

use renamer_core::{Plugin, PluginConfig, PluginError};
use tracing::{debug, info};

use crate::builtin::{FieldPattern, RequiredFields, SequenceNumber, SummaryFile};
use crate::pipeline::PluginPipeline;

/// Constructs an uninitialised plugin.
pub type PluginFactory = fn() -> Box<dyn Plugin>;

/// Table of known plugin kinds.
#[derive(Debug, Clone)]
pub struct PluginRegistry {
    factories: BTreeMap<String, PluginFactory>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl PluginRegistry {
    /// Registry without any kinds.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry pre-populated with the shipped plugins.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register(RequiredFields::KIND, || Box::new(RequiredFields::default()));
        registry.register(FieldPattern::KIND, || Box::new(FieldPattern::default()));
        registry.register(SequenceNumber::KIND, || Box::new(SequenceNumber::default()));
        registry.register(SummaryFile::KIND, || Box::new(SummaryFile::default()));
        registry
    }

    /// Add or replace the factory for `kind`.
    pub fn register(&mut self, kind: impl Into<String>, factory: PluginFactory) {
        self.factories.insert(kind.into(), factory);
    }

    /// Registered kinds in name order.
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    /// Construct and initialise one plugin per configuration entry.
    ///
    /// Every plugin is initialised before any is shared. The first failure
    /// refuses the whole pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`PluginError::Configuration`] for unknown kinds or rejected
    /// properties, or whatever error a plugin's `init` raises.
    pub fn build(&self, configs: &[PluginConfig]) -> Result<PluginPipeline, PluginError> {
        let mut plugins: Vec<Arc<dyn Plugin>> = Vec::with_capacity(configs.len());
        for config in configs {
            let factory = self.factories.get(&config.kind).ok_or_else(|| {
                PluginError::configuration(&config.kind, "kind", "is not a registered plugin")
            })?;
            let mut plugin = factory();
            plugin.init(config)?;
            debug!(
                plugin = plugin.name(),
                roles = %plugin.roles().describe(),
                "plugin initialised"
            );
            plugins.push(Arc::from(plugin));
        }
        info!(plugins = plugins.len(), "plugin pipeline ready");
        Ok(PluginPipeline::from_plugins(plugins))
    }
}
