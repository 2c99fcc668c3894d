use serde::{
    Deserialize,
    Serialize
};

/// The `name` every registry entry carries next to its own fields.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamedJsonObject {
    name: String,
}

impl NamedJsonObject {
    pub fn new(name: String) -> NamedJsonObject {
        NamedJsonObject { name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}
