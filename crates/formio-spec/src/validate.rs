use regex::Regex;
use serde_json::Value;

use crate::config::HiddenFieldPolicy;
use crate::data::{FormData, ValidationError, is_empty_value};
use crate::engine::Engine;
use crate::fallback;
use crate::messages::{self, MessageKey, format_number};
use crate::sandbox::CustomVerdict;
use crate::schema::{ComponentNode, ValidateRules};
use crate::tree::{self, ContainerKind};
use crate::visibility;

/// Rule chain for one field: required (short-circuits), string rules,
/// numeric rules, then the custom script.
pub fn field(
    engine: &Engine,
    node: &ComponentNode,
    value: Option<&Value>,
    data: &FormData,
) -> Vec<ValidationError> {
    field_at(engine, node, &node.key, value, data, None)
}

fn field_at(
    engine: &Engine,
    node: &ComponentNode,
    field: &str,
    value: Option<&Value>,
    data: &FormData,
    row: Option<&Value>,
) -> Vec<ValidationError> {
    let name = [("field", node.display_name().to_string())];
    let error = |key: MessageKey, message: String| ValidationError::new(field, message, key.code());
    let translator = engine.translator();
    let mut errors = Vec::new();

    if node.is_required() && is_empty_value(value) {
        errors.push(error(
            MessageKey::Required,
            messages::render(translator, MessageKey::Required, &name),
        ));
        return errors;
    }

    let default_rules = ValidateRules::default();
    let rules = node.validate.as_ref().unwrap_or(&default_rules);

    if let Some(Value::String(text)) = value
        && !text.is_empty()
    {
        let length = text.chars().count() as f64;
        if let Some(min) = rules.min_length
            && length < min
        {
            let args = [("min", format_number(min))];
            errors.push(error(
                MessageKey::MinLength,
                messages::render(translator, MessageKey::MinLength, &args),
            ));
        }
        if let Some(max) = rules.max_length
            && length > max
        {
            let args = [("max", format_number(max))];
            errors.push(error(
                MessageKey::MaxLength,
                messages::render(translator, MessageKey::MaxLength, &args),
            ));
        }
        if let Some(pattern) = rules.pattern()
            && !pattern_matches(field, pattern, text)
        {
            let message = match rules.custom_message() {
                Some(custom) => custom.to_string(),
                None => messages::render(translator, MessageKey::Pattern, &[]),
            };
            errors.push(error(MessageKey::Pattern, message));
        }
    }

    if let Some(Value::Number(number)) = value
        && let Some(number) = number.as_f64()
    {
        if let Some(min) = rules.min
            && number < min
        {
            let args = [("min", format_number(min))];
            errors.push(error(
                MessageKey::MinValue,
                messages::render(translator, MessageKey::MinValue, &args),
            ));
        }
        if let Some(max) = rules.max
            && number > max
        {
            let args = [("max", format_number(max))];
            errors.push(error(
                MessageKey::MaxValue,
                messages::render(translator, MessageKey::MaxValue, &args),
            ));
        }
    }

    if let Some(code) = rules.custom() {
        let ctx = engine.context(data).with_row(row).with_value(value);
        let verdict = fallback::validation(field, engine.sandbox().validation(code, &ctx));
        match verdict {
            CustomVerdict::Valid => {}
            CustomVerdict::Invalid(Some(message)) => {
                errors.push(error(MessageKey::CustomError, message));
            }
            CustomVerdict::Invalid(None) => {
                let message = match rules.custom_message() {
                    Some(custom) => custom.to_string(),
                    None => messages::render(translator, MessageKey::CustomError, &name),
                };
                errors.push(error(MessageKey::CustomError, message));
            }
        }
    }

    errors
}

/// Unanchored regex test. An invalid pattern cannot reject input.
fn pattern_matches(field: &str, pattern: &str, text: &str) -> bool {
    match Regex::new(pattern) {
        Ok(regex) => regex.is_match(text),
        Err(err) => {
            tracing::warn!(field, pattern, error = %err, "invalid validation pattern; skipping rule");
            true
        }
    }
}

/// Validates the tree in canonical traversal order.
pub fn form(engine: &Engine, nodes: &[ComponentNode], data: &FormData) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let scope = Scope {
        data,
        row: None,
        prefix: String::new(),
    };
    for node in nodes {
        walk(engine, node, &scope, &mut errors);
    }
    errors
}

/// Where a node's value lives: the top-level snapshot or a grid row.
struct Scope<'a> {
    data: &'a FormData,
    row: Option<&'a Value>,
    prefix: String,
}

impl<'a> Scope<'a> {
    fn lookup(&self, key: &str) -> Option<&'a Value> {
        match self.row {
            Some(row) => row.get(key),
            None => self.data.get(key),
        }
    }
}

fn walk(engine: &Engine, node: &ComponentNode, scope: &Scope<'_>, errors: &mut Vec<ValidationError>) {
    let skip_self = match engine.config().hidden_fields {
        HiddenFieldPolicy::Computed => {
            if visibility::is_hidden(engine, node, scope.data, scope.row) {
                return;
            }
            false
        }
        HiddenFieldPolicy::StaticOnly => node.hidden,
    };

    let value = scope.lookup(&node.key);
    if node.holds_value() && !skip_self {
        let field_name = format!("{}{}", scope.prefix, node.key);
        errors.extend(field_at(
            engine,
            node,
            &field_name,
            value,
            scope.data,
            scope.row,
        ));
    }

    if ContainerKind::of(node) == ContainerKind::Grid {
        if !node.has_key() {
            return;
        }
        let Some(rows) = value.and_then(Value::as_array) else {
            return;
        };
        for (index, row) in rows.iter().enumerate() {
            let row_scope = Scope {
                data: scope.data,
                row: Some(row),
                prefix: format!("{}{}[{}].", scope.prefix, node.key, index),
            };
            for child in tree::row_template(node) {
                walk(engine, child, &row_scope, errors);
            }
        }
        return;
    }

    for (_, child) in tree::children(node) {
        walk(engine, child, scope, errors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> ComponentNode {
        serde_json::from_value(value).expect("component")
    }

    fn messages_of(errors: &[ValidationError]) -> Vec<&str> {
        errors.iter().map(|error| error.message.as_str()).collect()
    }

    #[test]
    fn string_rules_can_all_fire() {
        let field_node = node(json!({
            "type": "textfield", "key": "code",
            "validate": { "minLength": 5, "pattern": "^[0-9]+$" }
        }));
        let value = json!("ab");
        let errors = field(&Engine::default(), &field_node, Some(&value), &FormData::new());
        assert_eq!(messages_of(&errors), vec!["Minimum length is 5", "Invalid format"]);
        assert_eq!(errors[1].code.as_deref(), Some("pattern"));
    }

    #[test]
    fn length_counts_characters() {
        let field_node = node(json!({
            "type": "textfield", "key": "word", "validate": { "maxLength": 3 }
        }));
        let value = json!("été");
        assert!(field(&Engine::default(), &field_node, Some(&value), &FormData::new()).is_empty());
    }

    #[test]
    fn pattern_is_unanchored_and_uses_custom_message() {
        let field_node = node(json!({
            "type": "textfield", "key": "zip",
            "validate": { "pattern": "[0-9]{4}", "customMessage": "Four digits please" }
        }));
        let engine = Engine::default();
        let ok = json!("NL-1234-AB");
        assert!(field(&engine, &field_node, Some(&ok), &FormData::new()).is_empty());
        let bad = json!("none");
        assert_eq!(
            messages_of(&field(&engine, &field_node, Some(&bad), &FormData::new())),
            vec!["Four digits please"]
        );
    }

    #[test]
    fn invalid_pattern_passes() {
        let field_node = node(json!({
            "type": "textfield", "key": "x", "validate": { "pattern": "([" }
        }));
        let value = json!("anything");
        assert!(field(&Engine::default(), &field_node, Some(&value), &FormData::new()).is_empty());
    }

    #[test]
    fn numeric_rules_ignore_strings() {
        let field_node = node(json!({
            "type": "number", "key": "age", "validate": { "min": 18 }
        }));
        let value = json!("5");
        assert!(field(&Engine::default(), &field_node, Some(&value), &FormData::new()).is_empty());
    }

    #[test]
    fn custom_rule_messages() {
        let engine = Engine::default();
        let data = FormData::new();
        let returns_message = node(json!({
            "type": "textfield", "key": "pw", "label": "Password",
            "validate": { "custom": "valid = value.length > 3 ? true : 'Too short'" }
        }));
        let short = json!("abc");
        assert_eq!(
            messages_of(&field(&engine, &returns_message, Some(&short), &data)),
            vec!["Too short"]
        );

        let returns_false = node(json!({
            "type": "textfield", "key": "pw", "label": "Password",
            "validate": { "custom": "valid = false" }
        }));
        assert_eq!(
            messages_of(&field(&engine, &returns_false, Some(&short), &data)),
            vec!["Password is invalid"]
        );

        let throws = node(json!({
            "type": "textfield", "key": "pw",
            "validate": { "custom": "valid = nothing.here" }
        }));
        assert!(field(&engine, &throws, Some(&short), &data).is_empty());
    }

    #[test]
    fn translator_changes_text_not_outcome() {
        let field_node = node(json!({ "type": "textfield", "key": "name", "required": true }));
        let plain = field(&Engine::default(), &field_node, None, &FormData::new());
        let translated = field(
            &Engine::default().with_translator(|key: &str, fallback: &str| {
                if key == "validation.REQUIRED" {
                    "{field} est requis".to_string()
                } else {
                    fallback.to_string()
                }
            }),
            &field_node,
            None,
            &FormData::new(),
        );
        assert_eq!(plain.len(), translated.len());
        assert_eq!(translated[0].message, "name est requis");
        assert_eq!(plain[0].field, translated[0].field);
    }
}
