use std::fmt::Write;

use formio_spec::{ComponentNode, ContainerKind, Submission, tree};
use serde_json::{Number, Value};

/// Controls which bits of state the fill loop prints.
#[derive(Copy, Clone, Eq, PartialEq)]
pub enum Verbosity {
    /// Clean output: field prompts only.
    Clean,
    /// Verbose output: visibility, calculated values, parse expectations.
    Verbose,
}

impl Verbosity {
    pub fn from_verbose(verbose: bool) -> Self {
        if verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Clean
        }
    }

    pub fn is_verbose(&self) -> bool {
        matches!(self, Verbosity::Verbose)
    }
}

/// Prints prompts, field errors and the final submission.
pub struct FillPresenter {
    verbosity: Verbosity,
    header_printed: bool,
    show_data_json: bool,
}

impl FillPresenter {
    pub fn new(verbosity: Verbosity, show_data_json: bool) -> Self {
        Self {
            verbosity,
            header_printed: false,
            show_data_json,
        }
    }

    pub fn show_header(&mut self, title: Option<&str>, fields: usize) {
        if self.header_printed {
            return;
        }
        println!("Form: {}", title.unwrap_or("(untitled)"));
        if self.verbosity.is_verbose() {
            println!("Fields to fill: {}", fields);
        }
        self.header_printed = true;
    }

    pub fn show_skipped(&self, key: &str) {
        if self.verbosity.is_verbose() {
            println!("Skipping hidden field '{}'", key);
        }
    }

    pub fn show_prompt(&self, prompt: &PromptContext) {
        let mut line = format!("{}/{} {}", prompt.index, prompt.total, prompt.title);
        if prompt.required {
            line.push_str(" *");
        }
        if let Some(hint) = &prompt.hint {
            line.push(' ');
            line.push_str(hint);
        }
        println!("{}", line);
        if let Some(description) = &prompt.description {
            println!("{}", description);
        }
        if self.verbosity.is_verbose() && !prompt.choices.is_empty() {
            println!("Choices: {}", prompt.choices.join(", "));
        }
    }

    pub fn show_parse_error(&self, error: &AnswerParseError) {
        eprintln!("Invalid answer: {}", error.user_message);
        if self.verbosity.is_verbose()
            && let Some(debug) = &error.debug_message
        {
            eprintln!("  Expected: {}", debug);
        }
    }

    pub fn show_field_errors(&self, errors: &[&Value]) {
        for error in errors {
            eprintln!(
                "  {} - {}",
                error["field"].as_str().unwrap_or("<unknown>"),
                error["message"].as_str().unwrap_or_default()
            );
        }
    }

    pub fn show_data(&self, data: &Value) {
        if self.verbosity.is_verbose() {
            println!("Data: {}", data);
        }
    }

    pub fn show_completion(&self, submission: &Submission) {
        println!("Done ✅");
        match submission.to_cbor() {
            Ok(bytes) => println!("Submission (CBOR hex): {}", encode_hex(&bytes)),
            Err(err) => eprintln!("Failed to serialize submission to CBOR: {}", err),
        }
        if self.show_data_json {
            match submission.to_json_pretty() {
                Ok(pretty) => println!("{}", pretty),
                Err(err) => eprintln!("Failed to serialize submission to JSON: {}", err),
            }
        }
    }
}

/// Fields the fill loop asks for, in traversal order.
///
/// Calculated fields and layout containers are skipped; grid rows are
/// entered as one JSON array.
pub fn fillable_fields(nodes: &[ComponentNode]) -> Vec<&ComponentNode> {
    tree::input_components(nodes)
        .into_iter()
        .filter(|node| node.calculate_value().is_none())
        .filter(|node| {
            matches!(
                ContainerKind::of(node),
                ContainerKind::Leaf | ContainerKind::Grid
            )
        })
        .collect()
}

/// What the presenter needs to know about the current field.
pub struct PromptContext {
    pub index: usize,
    pub total: usize,
    pub key: String,
    pub title: String,
    pub description: Option<String>,
    pub kind: FieldKind,
    pub required: bool,
    pub hint: Option<String>,
    pub choices: Vec<String>,
}

impl PromptContext {
    pub fn new(node: &ComponentNode, index: usize, total: usize, current: Option<&Value>) -> Self {
        let kind = FieldKind::of(node);
        let choices = choice_values(node);
        Self {
            index,
            total,
            key: node.key.clone(),
            title: node.display_name().to_string(),
            description: node.description.clone(),
            kind,
            required: node.is_required(),
            hint: describe_hint(kind, current),
            choices,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Number,
    Boolean,
    Rows,
}

impl FieldKind {
    fn of(node: &ComponentNode) -> Self {
        match node.kind.as_str() {
            "number" | "currency" => FieldKind::Number,
            "checkbox" => FieldKind::Boolean,
            kind if tree::GRID_TYPES.contains(&kind) => FieldKind::Rows,
            _ => FieldKind::Text,
        }
    }
}

fn describe_hint(kind: FieldKind, current: Option<&Value>) -> Option<String> {
    let mut parts = Vec::new();
    match kind {
        FieldKind::Number => parts.push("number".to_string()),
        FieldKind::Boolean => parts.push("y/n".to_string()),
        FieldKind::Rows => parts.push("JSON array of rows".to_string()),
        FieldKind::Text => {}
    }
    if let Some(value) = current.filter(|value| !value.is_null()) {
        parts.push(format!("current: {}", value));
    }
    if parts.is_empty() {
        None
    } else {
        Some(format!("({})", parts.join(", ")))
    }
}

/// `values` / `data.values` entries of select-like components.
fn choice_values(node: &ComponentNode) -> Vec<String> {
    let values = node
        .extra
        .get("values")
        .or_else(|| node.extra.get("data").and_then(|data| data.get("values")));
    values
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| entry.get("value").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Error surfaced when input cannot be parsed for a field.
#[derive(Debug)]
pub struct AnswerParseError {
    pub user_message: String,
    pub debug_message: Option<String>,
}

impl AnswerParseError {
    pub fn new(user_message: impl Into<String>, debug_message: Option<String>) -> Self {
        Self {
            user_message: user_message.into(),
            debug_message,
        }
    }
}

/// Parses one line of input. `Ok(None)` keeps the current value.
pub fn parse_answer(prompt: &PromptContext, raw: &str) -> Result<Option<Value>, AnswerParseError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    let value = match prompt.kind {
        FieldKind::Boolean => parse_boolean(raw)?,
        FieldKind::Number => parse_number(raw)?,
        FieldKind::Rows => parse_rows(raw)?,
        FieldKind::Text => {
            if !prompt.choices.is_empty() && !prompt.choices.iter().any(|choice| choice == raw) {
                return Err(AnswerParseError::new(
                    format!("Choose one of: {}", prompt.choices.join(", ")),
                    Some(format!("got '{}'", raw)),
                ));
            }
            Value::String(raw.to_string())
        }
    };
    Ok(Some(value))
}

fn parse_boolean(raw: &str) -> Result<Value, AnswerParseError> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
        "false" | "f" | "no" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(AnswerParseError::new(
            "Please enter yes or no.",
            Some("expected boolean (y/n/true/false)".to_string()),
        )),
    }
}

fn parse_number(raw: &str) -> Result<Value, AnswerParseError> {
    if let Ok(integer) = raw.parse::<i64>() {
        return Ok(Value::Number(Number::from(integer)));
    }
    raw.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| {
            AnswerParseError::new(
                "Please enter a number.",
                Some("expected a finite number".to_string()),
            )
        })
}

fn parse_rows(raw: &str) -> Result<Value, AnswerParseError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(rows)) if rows.iter().all(Value::is_object) => Ok(Value::Array(rows)),
        Ok(_) => Err(AnswerParseError::new(
            "Rows must be a JSON array of objects.",
            Some(r#"e.g. [{"item": "pen", "qty": 2}]"#.to_string()),
        )),
        Err(err) => Err(AnswerParseError::new(
            "Rows must be valid JSON.",
            Some(err.to_string()),
        )),
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut encoded = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        let _ = write!(&mut encoded, "{:02x}", byte);
    }
    encoded
}
