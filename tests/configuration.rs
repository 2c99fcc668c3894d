use std::fs;

use serde_json::json;

use symdist::configuration::Configuration;
use symdist::manager::manager::IManager;
use symdist::manager::managererror::ManagerError;

#[test]
fn test_load_engine_and_registry_from_file() {
    let path = std::env::temp_dir().join(format!("symdist-config-{}.json", std::process::id()));
    let document = json!({
        "engine": { "tolerance": 1e-10, "cache_forms": false },
        "random_variables": [
            { "name": "exp2", "pieces": ["2*exp(-2*x)"], "breakpoints": [0, "inf"], "nature": "continuous" },
            { "name": "coin", "pieces": [0.5, 0.5], "breakpoints": [0, 1], "nature": "discrete-explicit" }
        ]
    });
    fs::write(&path, document.to_string()).unwrap();

    let configuration = Configuration::new();
    configuration.from_reader(&path).unwrap();
    fs::remove_file(&path).unwrap();

    let config = configuration.engine_config();
    assert_eq!(config.tolerance, 1e-10);
    assert!(!config.cache_forms);
    assert_eq!(config.newton_iterations, 10);

    let engine = configuration.engine();
    let manager = configuration.random_variable_manager();
    assert_eq!(manager.names(), vec!["coin".to_owned(), "exp2".to_owned()]);
    let exp2 = manager.get("exp2").unwrap();
    assert!((engine.cdf_at(&exp2, 1.0).unwrap() - (1.0 - (-2.0_f64).exp())).abs() < 1e-12);
    let coin = manager.get("coin").unwrap();
    assert_eq!(engine.cdf_at(&coin, 0.5).unwrap(), 0.5);
}

#[test]
fn test_missing_file_is_an_io_error() {
    let configuration = Configuration::new();
    let result = configuration.from_reader("/nonexistent/symdist.json");
    assert!(matches!(result, Err(ManagerError::Io(_))));
}

#[test]
fn test_bad_entry_names_the_variable() {
    let configuration = Configuration::new();
    let result = configuration.from_json_value(json!({
        "random_variables": [
            { "name": "broken", "pieces": ["1"], "breakpoints": [1, 0], "nature": "continuous" }
        ]
    }));
    match result {
        Err(ManagerError::Engine { name, .. }) => assert_eq!(name, "broken"),
        other => panic!("unexpected {other:?}"),
    }
}
