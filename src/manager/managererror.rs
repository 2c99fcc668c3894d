use serde::Deserialize;
use thiserror::Error;

use crate::rv::engineerror::EngineError;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    JsonParse(#[from] serde_json::Error),
    #[error("key '{0}' not found")]
    NameNotFound(String),
    #[error("cannot build '{name}': {source}")]
    Engine {
        name: String,
        #[source]
        source: EngineError,
    },
}

impl ManagerError {
    pub fn from_json<T>(json_value: serde_json::Value) -> Result<T, ManagerError>
    where
        T: for<'a> Deserialize<'a>,
    {
        serde_json::from_value(json_value).map_err(ManagerError::JsonParse)
    }

    pub fn engine(name: &str, source: EngineError) -> ManagerError {
        ManagerError::Engine {
            name: name.to_owned(),
            source,
        }
    }
}
