use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::FormError;
use crate::schema::component::{ComponentNode, lenient_list};

/// Root form document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FormSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// `"wizard"` switches the top-level components into pages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub components: Vec<ComponentNode>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FormSchema {
    pub fn new(components: Vec<ComponentNode>) -> Self {
        Self {
            components,
            ..Self::default()
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, FormError> {
        serde_json::from_str(raw).map_err(FormError::SchemaParse)
    }

    pub fn from_value(value: Value) -> Result<Self, FormError> {
        serde_json::from_value(value).map_err(FormError::SchemaParse)
    }

    pub fn is_wizard(&self) -> bool {
        self.display.as_deref() == Some("wizard")
    }

    /// Wizard pages: the top-level components in wizard display, otherwise the
    /// pages of the first `wizard` node, otherwise nothing.
    pub fn pages(&self) -> &[ComponentNode] {
        if self.is_wizard() {
            return &self.components;
        }
        self.components
            .iter()
            .find(|component| component.kind == "wizard")
            .map(|wizard| wizard.pages.as_slice())
            .unwrap_or(&[])
    }
}

/// JSON Schema describing the form document accepted by the engine.
pub fn json_schema() -> Value {
    serde_json::to_value(schemars::schema_for!(FormSchema)).unwrap_or(Value::Null)
}
