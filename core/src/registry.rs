//! Application module registry and bootstrap.
//!
//! Modules are registered explicitly at startup under their name. `start`
//! receives per-module data keyed by name and calls `init` on every
//! registered module it names; unknown names are logged and skipped.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde_json::Value;

/// An application module consuming the core services.
pub trait Module: Send + Sync {
    fn name(&self) -> &str;

    /// Called once by `ModuleRegistry::start` with the module's data.
    fn init(&self, _data: &Value) {}
}

/// Which names `start` initialized and which it skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartReport {
    pub initialized: Vec<String>,
    pub skipped: Vec<String>,
}

#[derive(Default)]
pub struct ModuleRegistry {
    modules: HashMap<String, Arc<dyn Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one module, replacing any previous module of the same name.
    pub fn register(&mut self, module: Arc<dyn Module>) {
        let name = module.name().to_string();
        if name.is_empty() {
            tracing::warn!("ignoring module without a name");
            return;
        }
        if self.modules.insert(name.clone(), module).is_some() {
            tracing::debug!(module = %name, "module replaced");
        }
    }

    pub fn register_modules(&mut self, modules: impl IntoIterator<Item = Arc<dyn Module>>) {
        for module in modules {
            self.register(module);
        }
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Module>> {
        self.modules.get(name)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Initialize the named modules in key order.
    pub fn start(&self, config: &BTreeMap<String, Value>) -> StartReport {
        tracing::info!(modules = config.len(), "starting modules");
        let mut report = StartReport::default();
        for (name, data) in config {
            match self.modules.get(name) {
                Some(module) => {
                    module.init(data);
                    report.initialized.push(name.clone());
                }
                None => {
                    tracing::warn!(module = %name, "attempting to load an undefined module");
                    report.skipped.push(name.clone());
                }
            }
        }
        report
    }
}
