use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Validation message identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Required,
    MinLength,
    MaxLength,
    Pattern,
    MinValue,
    MaxValue,
    CustomError,
}

impl MessageKey {
    pub const ALL: [MessageKey; 7] = [
        MessageKey::Required,
        MessageKey::MinLength,
        MessageKey::MaxLength,
        MessageKey::Pattern,
        MessageKey::MinValue,
        MessageKey::MaxValue,
        MessageKey::CustomError,
    ];

    /// Key handed to a [`Translate`] hook.
    pub fn translation_key(self) -> &'static str {
        match self {
            MessageKey::Required => "validation.REQUIRED",
            MessageKey::MinLength => "validation.MIN_LENGTH",
            MessageKey::MaxLength => "validation.MAX_LENGTH",
            MessageKey::Pattern => "validation.PATTERN",
            MessageKey::MinValue => "validation.MIN_VALUE",
            MessageKey::MaxValue => "validation.MAX_VALUE",
            MessageKey::CustomError => "validation.CUSTOM_ERROR",
        }
    }

    /// English template with `{name}` placeholders.
    pub fn default_template(self) -> &'static str {
        match self {
            MessageKey::Required => "{field} is required",
            MessageKey::MinLength => "Minimum length is {min}",
            MessageKey::MaxLength => "Maximum length is {max}",
            MessageKey::Pattern => "Invalid format",
            MessageKey::MinValue => "Minimum value is {min}",
            MessageKey::MaxValue => "Maximum value is {max}",
            MessageKey::CustomError => "{field} is invalid",
        }
    }

    /// Stable machine-readable code carried on each validation error.
    pub fn code(self) -> &'static str {
        match self {
            MessageKey::Required => "required",
            MessageKey::MinLength => "min_length",
            MessageKey::MaxLength => "max_length",
            MessageKey::Pattern => "pattern",
            MessageKey::MinValue => "min",
            MessageKey::MaxValue => "max",
            MessageKey::CustomError => "custom",
        }
    }
}

/// Message translation hook. Receives the translation key and the English
/// template; returns the template to use. Placeholders are filled afterwards.
pub trait Translate {
    fn translate(&self, key: &str, fallback: &str) -> String;
}

impl<F> Translate for F
where
    F: Fn(&str, &str) -> String,
{
    fn translate(&self, key: &str, fallback: &str) -> String {
        self(key, fallback)
    }
}

/// Keeps the English templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTranslation;

impl Translate for NoTranslation {
    fn translate(&self, _key: &str, fallback: &str) -> String {
        fallback.to_string()
    }
}

/// Lookup table of translated templates keyed by translation key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranslationTable(BTreeMap<String, String>);

impl TranslationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, template: impl Into<String>) -> Self {
        self.0.insert(key.into(), template.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for TranslationTable {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Translate for TranslationTable {
    fn translate(&self, key: &str, fallback: &str) -> String {
        self.0
            .get(key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    }
}

/// Renders `key` through `translator` and fills its placeholders.
pub fn render(translator: &dyn Translate, key: MessageKey, args: &[(&str, String)]) -> String {
    let template = translator.translate(key.translation_key(), key.default_template());
    interpolate(&template, args)
}

pub fn interpolate(template: &str, args: &[(&str, String)]) -> String {
    let mut output = template.to_string();
    for (name, value) in args {
        output = output.replace(&format!("{{{}}}", name), value);
    }
    output
}

/// Formats a limit for display; integral values print without a fraction.
pub fn format_number(number: f64) -> String {
    if number == 0.0 {
        "0".into()
    } else {
        format!("{}", number)
    }
}
