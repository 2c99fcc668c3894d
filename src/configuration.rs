use std::cell::{
    RefCell,
    RefMut
};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use serde::{
    Deserialize,
    Serialize
};

use crate::manager::manager::{
    IManager,
    Manager
};
use crate::manager::managererror::ManagerError;
use crate::rv::engine::Engine;
use crate::rv::randomvariable::RandomVariable;
use crate::rv::randomvariablemanager::RandomVariableManager;

/// Numeric and resource settings of an [`Engine`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Breakpoints and probe values closer than this are treated as equal.
    pub tolerance: f64,
    /// Allowed deviation of mixture weights from a total of one.
    pub mixture_tolerance: f64,
    /// Wall-clock budget of a single backend call.
    pub backend_timeout_ms: u64,
    pub newton_iterations: usize,
    pub newton_tolerance: f64,
    /// Largest number of ordered arrangements enumerated for an order
    /// statistic drawn without replacement.
    pub permutation_budget: u64,
    pub cache_forms: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            tolerance: 1e-9,
            mixture_tolerance: 1e-4,
            backend_timeout_ms: 10_000,
            newton_iterations: 10,
            newton_tolerance: 1e-10,
            permutation_budget: 1_000_000,
            cache_forms: true,
        }
    }
}

#[derive(Deserialize)]
struct ConfigurationJsonProp {
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    random_variables: Vec<serde_json::Value>,
}

pub struct Configuration {
    engine_config_cell: RefCell<EngineConfig>,
    random_variable_manager_cell: RefCell<Manager<Arc<RandomVariable>>>,
}

impl Configuration {
    pub fn new() -> Configuration {
        Configuration {
            engine_config_cell: RefCell::new(EngineConfig::default()),
            random_variable_manager_cell: RefCell::new(RandomVariableManager::new()),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        self.engine_config_cell.borrow().clone()
    }

    pub fn engine(&self) -> Engine {
        Engine::new(self.engine_config())
    }

    pub fn random_variable_manager(&self) -> RefMut<'_, Manager<Arc<RandomVariable>>> {
        self.random_variable_manager_cell.borrow_mut()
    }

    pub fn from_json_value(&self, json_value: serde_json::Value) -> Result<(), ManagerError> {
        let json_prop: ConfigurationJsonProp = ManagerError::from_json(json_value)?;
        *self.engine_config_cell.borrow_mut() = json_prop.engine;
        let random_variable_manager = self.random_variable_manager_cell.borrow_mut();
        random_variable_manager.insert_obj_from_json_vec(&json_prop.random_variables, &())
    }

    pub fn from_reader(&self, file_path: impl AsRef<Path>) -> Result<(), ManagerError> {
        let file = File::open(file_path)?;
        let reader = BufReader::new(file);
        let json_value: serde_json::Value = serde_json::from_reader(reader)?;
        self.from_json_value(json_value)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partial_engine_section_keeps_defaults() {
        let configuration = Configuration::new();
        configuration
            .from_json_value(json!({ "engine": { "backend_timeout_ms": 250 } }))
            .unwrap();
        let config = configuration.engine_config();
        assert_eq!(config.backend_timeout_ms, 250);
        assert_eq!(config.newton_iterations, 10);
        assert!(config.cache_forms);
    }

    #[test]
    fn test_random_variables_are_registered() {
        let configuration = Configuration::new();
        configuration
            .from_json_value(json!({
                "random_variables": [
                    { "name": "u", "pieces": [1], "breakpoints": [0, 1], "nature": "continuous" },
                    { "name": "coin", "pieces": [0.5, 0.5], "breakpoints": [0, 1], "nature": "discrete_explicit" }
                ]
            }))
            .unwrap();
        assert_eq!(configuration.random_variable_manager().names(), vec!["coin", "u"]);
    }
}
