use std::sync::Arc;

use serde::Deserialize;

use crate::manager::manager::Manager;
use crate::manager::managererror::ManagerError;
use crate::rv::engineerror::EngineError;
use crate::rv::randomvariable::{
    DEFAULT_VARIABLE,
    RandomVariable
};
use crate::symbolic::expr::{
    Expr,
    Symbol
};
use crate::symbolic::parser::parse;

/// A piece or breakpoint written either as a JSON number or as infix text.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonExpr {
    Number(f64),
    Text(String),
}

impl JsonExpr {
    fn to_expr(&self) -> Result<Expr, EngineError> {
        match self {
            JsonExpr::Number(v) => Ok(Expr::num(*v)),
            JsonExpr::Text(text) => Ok(parse(text)?),
        }
    }
}

fn default_form() -> String {
    "pdf".to_owned()
}

fn default_variable() -> String {
    DEFAULT_VARIABLE.to_owned()
}

#[derive(Deserialize)]
struct RandomVariableJsonProp {
    name: String,
    pieces: Vec<JsonExpr>,
    breakpoints: Vec<JsonExpr>,
    nature: String,
    #[serde(default = "default_form")]
    form: String,
    #[serde(default = "default_variable")]
    variable: String,
}

fn build(json_prop: &RandomVariableJsonProp) -> Result<RandomVariable, EngineError> {
    let pieces = json_prop.pieces.iter().map(JsonExpr::to_expr).collect::<Result<Vec<_>, _>>()?;
    let breakpoints = json_prop.breakpoints.iter().map(JsonExpr::to_expr).collect::<Result<Vec<_>, _>>()?;
    RandomVariable::with_variable(
        pieces,
        breakpoints,
        json_prop.nature.parse()?,
        json_prop.form.parse()?,
        Symbol::new(&json_prop.variable),
    )
}

fn get_random_variable_from_json(json_value: serde_json::Value) -> Result<Arc<RandomVariable>, ManagerError> {
    let json_prop: RandomVariableJsonProp = ManagerError::from_json(json_value)?;
    build(&json_prop)
        .map(Arc::new)
        .map_err(|error| ManagerError::engine(&json_prop.name, error))
}

pub struct RandomVariableManager;

impl RandomVariableManager {
    pub fn new() -> Manager<Arc<RandomVariable>> {
        Manager::new(get_random_variable_from_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::manager::IManager;
    use crate::rv::randomvariable::{
        Form,
        Nature
    };
    use serde_json::json;

    #[test]
    fn test_insert_and_get() {
        let manager = RandomVariableManager::new();
        let entry = json!({
            "name": "lifetime",
            "pieces": ["2*exp(-2*x)"],
            "breakpoints": [0, "inf"],
            "nature": "continuous"
        });
        manager.insert_obj_from_json(entry, &()).unwrap();
        let rv = manager.get("lifetime").unwrap();
        assert_eq!(rv.nature(), Nature::Continuous);
        assert_eq!(rv.form(), Form::Pdf);
    }

    #[test]
    fn test_unknown_nature_is_a_kind_error() {
        let manager = RandomVariableManager::new();
        let entry = json!({
            "name": "bad",
            "pieces": [1],
            "breakpoints": [0, 1],
            "nature": "gaussian"
        });
        let r = manager.insert_obj_from_json(entry, &());
        assert!(matches!(r, Err(ManagerError::Engine { source: EngineError::Kind(_), .. })));
    }

    #[test]
    fn test_missing_name() {
        let manager = RandomVariableManager::new();
        assert!(matches!(manager.get("nothing"), Err(ManagerError::NameNotFound(_))));
    }
}
