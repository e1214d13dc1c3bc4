use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Declarative visibility rule: show (or hide) when `data[when] === eq`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Conditional {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    /// `None` stands for an absent `eq`, which only matches an absent value.
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub eq: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<Value>,
}

impl Conditional {
    /// The `when` key, ignoring blanks.
    pub fn when_key(&self) -> Option<&str> {
        self.when.as_deref().filter(|when| !when.is_empty())
    }

    /// Polarity of the rule; only an explicit `false` inverts it.
    pub fn shows(&self) -> bool {
        match &self.show {
            Some(Value::Bool(show)) => *show,
            Some(Value::String(text)) => text != "false",
            _ => true,
        }
    }
}

/// Per-field validation rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ValidateRules {
    #[serde(default, deserialize_with = "lenient_bool")]
    pub required: bool,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub min_length: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub max_length: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub min: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_message: Option<String>,
}

impl ValidateRules {
    pub fn pattern(&self) -> Option<&str> {
        non_blank(self.pattern.as_deref())
    }

    pub fn custom(&self) -> Option<&str> {
        non_blank(self.custom.as_deref())
    }

    pub fn custom_message(&self) -> Option<&str> {
        non_blank(self.custom_message.as_deref())
    }
}

/// One track of a `columns` layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Column {
    #[serde(default, deserialize_with = "lenient_list")]
    pub components: Vec<ComponentNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Value>,
}

/// A schema-declared field or container.
///
/// Only the properties the engine interprets are typed; everything else the
/// schema author wrote is kept in `extra` for rendering collaborators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentNode {
    #[serde(rename = "type", default, deserialize_with = "lenient_string")]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<bool>,
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub hidden: bool,
    #[serde(
        default,
        deserialize_with = "lenient_bool",
        skip_serializing_if = "std::ops::Not::not"
    )]
    pub required: bool,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default_value: Option<Value>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub components: Vec<ComponentNode>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub columns: Vec<Column>,
    #[serde(
        default,
        deserialize_with = "lenient_list",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub pages: Vec<ComponentNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Conditional>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_conditional: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calculate_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<ValidateRules>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComponentNode {
    /// Builds a bare node of the given type and key.
    pub fn new(kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            key: key.into(),
            ..Self::default()
        }
    }

    /// `input: false` marks static content that never holds data.
    pub fn is_input(&self) -> bool {
        self.input != Some(false)
    }

    pub fn has_key(&self) -> bool {
        !self.key.is_empty()
    }

    /// Input-bearing node with a usable data key.
    pub fn holds_value(&self) -> bool {
        self.is_input() && self.has_key()
    }

    pub fn is_required(&self) -> bool {
        self.required || self.validate.as_ref().is_some_and(|rules| rules.required)
    }

    pub fn custom_conditional(&self) -> Option<&str> {
        non_blank(self.custom_conditional.as_deref())
    }

    pub fn calculate_value(&self) -> Option<&str> {
        non_blank(self.calculate_value.as_deref())
    }

    /// Label for messages: the label when set, the key otherwise.
    pub fn display_name(&self) -> &str {
        non_blank(self.label.as_deref()).unwrap_or(&self.key)
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|text| !text.trim().is_empty())
}

/// Keeps an explicit JSON `null` as `Some(Value::Null)`; absence stays `None`
/// through `#[serde(default)]`.
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Form builders emit numeric limits as numbers, numeric strings, or `""`.
fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(match raw {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// `null` and non-string scalars degrade to `""` instead of failing the form.
fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(text) => text,
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        _ => String::new(),
    })
}

/// `true` and `"true"` are set; everything else, `null` included, is unset.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Bool(flag) => flag,
        Value::String(text) => text == "true",
        _ => false,
    })
}

/// Child lists: a non-array is read as empty and entries that are not valid
/// nodes are dropped, each with a warning.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            tracing::warn!(found = %kind_of(&other), "expected a list of components; ignoring it");
            return Ok(Vec::new());
        }
    };
    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(index, item)| match serde_json::from_value(item) {
            Ok(node) => Some(node),
            Err(err) => {
                tracing::warn!(index, error = %err, "dropping malformed component entry");
                None
            }
        })
        .collect())
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
