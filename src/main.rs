use std::process::ExitCode;

use symdist::configuration::Configuration;
use symdist::manager::manager::IManager;
use symdist::rv::randomvariable::Form;

fn main() -> ExitCode {
    let Some(config_path) = std::env::args().nth(1) else {
        eprintln!("usage: symdist <config.json>");
        return ExitCode::FAILURE;
    };
    let config = Configuration::new();
    if let Err(error) = config.from_reader(&config_path) {
        eprintln!("{config_path}: {error}");
        return ExitCode::FAILURE;
    }
    let engine = config.engine();
    let manager = config.random_variable_manager();
    for name in manager.names() {
        let rv = match manager.get(&name) {
            Ok(rv) => rv,
            Err(error) => {
                eprintln!("{error}");
                continue;
            }
        };
        println!("{name}: {rv}");
        match engine.to_form(&rv, Form::Cdf) {
            Ok(cdf) => println!("  CDF      {cdf}"),
            Err(error) => println!("  CDF      {error}"),
        }
        match engine.mean(&rv) {
            Ok(mean) => println!("  mean     {mean}"),
            Err(error) => println!("  mean     {error}"),
        }
        match engine.variance(&rv) {
            Ok(variance) => println!("  variance {variance}"),
            Err(error) => println!("  variance {error}"),
        }
    }
    ExitCode::SUCCESS
}
