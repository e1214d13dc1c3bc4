use std::collections::BTreeMap;

use serde_json::{Number, Value};

/// Callable exposed to scripts. Receivers of methods are captured so a
/// member lookup like `name.trim` can be called later.
#[derive(Debug, Clone, PartialEq)]
pub enum Builtin {
    /// Global object such as `Math`.
    Namespace(&'static str),
    /// Global function such as `parseInt` or `Math.max`.
    Function(&'static str),
    /// String or array method bound to its receiver.
    Method {
        receiver: Box<ScriptValue>,
        name: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<ScriptValue>),
    Object(BTreeMap<String, ScriptValue>),
    Builtin(Builtin),
}

impl ScriptValue {
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => ScriptValue::Null,
            Value::Bool(flag) => ScriptValue::Bool(*flag),
            Value::Number(number) => ScriptValue::Number(number.as_f64().unwrap_or(f64::NAN)),
            Value::String(text) => ScriptValue::String(text.clone()),
            Value::Array(items) => ScriptValue::Array(items.iter().map(Self::from_json).collect()),
            Value::Object(map) => ScriptValue::Object(
                map.iter()
                    .map(|(key, value)| (key.clone(), Self::from_json(value)))
                    .collect(),
            ),
        }
    }

    pub fn from_optional_json(value: Option<&Value>) -> Self {
        value.map(Self::from_json).unwrap_or(ScriptValue::Undefined)
    }

    /// JSON view of the value; `None` is `undefined`. Follows `JSON.stringify`:
    /// non-finite numbers become `null`, undefined array slots become `null`
    /// and undefined object members are dropped.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            ScriptValue::Undefined | ScriptValue::Builtin(_) => None,
            ScriptValue::Null => Some(Value::Null),
            ScriptValue::Bool(flag) => Some(Value::Bool(*flag)),
            ScriptValue::Number(number) => Some(number_to_json(*number)),
            ScriptValue::String(text) => Some(Value::String(text.clone())),
            ScriptValue::Array(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.to_json().unwrap_or(Value::Null))
                    .collect(),
            )),
            ScriptValue::Object(map) => Some(Value::Object(
                map.iter()
                    .filter_map(|(key, value)| value.to_json().map(|value| (key.clone(), value)))
                    .collect(),
            )),
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Undefined | ScriptValue::Null)
    }

    pub fn truthy(&self) -> bool {
        match self {
            ScriptValue::Undefined | ScriptValue::Null => false,
            ScriptValue::Bool(flag) => *flag,
            ScriptValue::Number(number) => *number != 0.0 && !number.is_nan(),
            ScriptValue::String(text) => !text.is_empty(),
            ScriptValue::Array(_) | ScriptValue::Object(_) | ScriptValue::Builtin(_) => true,
        }
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            ScriptValue::Undefined => "undefined",
            ScriptValue::Null | ScriptValue::Array(_) | ScriptValue::Object(_) => "object",
            ScriptValue::Bool(_) => "boolean",
            ScriptValue::Number(_) => "number",
            ScriptValue::String(_) => "string",
            ScriptValue::Builtin(Builtin::Namespace(_)) => "object",
            ScriptValue::Builtin(_) => "function",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            ScriptValue::Undefined | ScriptValue::Object(_) | ScriptValue::Builtin(_) => f64::NAN,
            ScriptValue::Null => 0.0,
            ScriptValue::Bool(flag) => f64::from(u8::from(*flag)),
            ScriptValue::Number(number) => *number,
            ScriptValue::String(text) => string_to_number(text),
            ScriptValue::Array(_) => string_to_number(&self.to_display()),
        }
    }

    /// `String(value)` semantics.
    pub fn to_display(&self) -> String {
        match self {
            ScriptValue::Undefined => "undefined".into(),
            ScriptValue::Null => "null".into(),
            ScriptValue::Bool(flag) => flag.to_string(),
            ScriptValue::Number(number) => number_to_string(*number),
            ScriptValue::String(text) => text.clone(),
            ScriptValue::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_display()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            ScriptValue::Object(_) => "[object Object]".into(),
            ScriptValue::Builtin(Builtin::Namespace(name)) => format!("[object {}]", name),
            ScriptValue::Builtin(_) => "function () { [native code] }".into(),
        }
    }

    pub fn strict_equals(&self, other: &ScriptValue) -> bool {
        match (self, other) {
            (ScriptValue::Number(left), ScriptValue::Number(right)) => left == right,
            (ScriptValue::Array(left), ScriptValue::Array(right)) => {
                left.len() == right.len()
                    && left
                        .iter()
                        .zip(right)
                        .all(|(left, right)| left.strict_equals(right))
            }
            (ScriptValue::Object(left), ScriptValue::Object(right)) => {
                left.len() == right.len()
                    && left.iter().all(|(key, value)| {
                        right.get(key).is_some_and(|other| value.strict_equals(other))
                    })
            }
            _ => self == other,
        }
    }

    /// Abstract equality (`==`), restricted to the value kinds scripts see.
    pub fn loose_equals(&self, other: &ScriptValue) -> bool {
        match (self, other) {
            (ScriptValue::Undefined | ScriptValue::Null, ScriptValue::Undefined | ScriptValue::Null) => {
                true
            }
            (ScriptValue::Undefined | ScriptValue::Null, _)
            | (_, ScriptValue::Undefined | ScriptValue::Null) => false,
            (ScriptValue::Number(_), ScriptValue::String(_))
            | (ScriptValue::String(_), ScriptValue::Number(_)) => {
                self.to_number() == other.to_number()
            }
            (ScriptValue::Bool(_), _) => ScriptValue::Number(self.to_number()).loose_equals(other),
            (_, ScriptValue::Bool(_)) => self.loose_equals(&ScriptValue::Number(other.to_number())),
            (ScriptValue::Array(_), ScriptValue::String(_) | ScriptValue::Number(_)) => {
                ScriptValue::String(self.to_display()).loose_equals(other)
            }
            (ScriptValue::String(_) | ScriptValue::Number(_), ScriptValue::Array(_)) => {
                self.loose_equals(&ScriptValue::String(other.to_display()))
            }
            _ => self.strict_equals(other),
        }
    }
}

/// Number to JSON, keeping integral values integral so `5` round-trips as `5`.
pub fn number_to_json(number: f64) -> Value {
    const MAX_SAFE: f64 = 9_007_199_254_740_991.0;
    if number.fract() == 0.0 && number.abs() <= MAX_SAFE {
        // Exact: integral and within the 53-bit mantissa.
        return Value::Number(Number::from(number as i64));
    }
    Number::from_f64(number)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

pub fn number_to_string(number: f64) -> String {
    if number.is_nan() {
        "NaN".into()
    } else if number.is_infinite() {
        if number > 0.0 { "Infinity" } else { "-Infinity" }.into()
    } else if number == 0.0 {
        "0".into()
    } else if number.abs() >= 1e21 || number.abs() < 1e-6 {
        exponential(number)
    } else {
        format!("{}", number)
    }
}

/// Shortest exponential form with an explicit exponent sign: `1e+21`, `1.5e-7`.
fn exponential(number: f64) -> String {
    let formatted = format!("{:e}", number);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) if !exponent.starts_with('-') => {
            format!("{}e+{}", mantissa, exponent)
        }
        _ => formatted,
    }
}

/// `Number(text)`: whitespace-trimmed decimal; `""` is `0`; anything else is NaN.
pub fn string_to_number(text: &str) -> f64 {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let plausible = trimmed
        .chars()
        .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-'));
    if !plausible {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// `parseFloat`: longest numeric prefix.
pub fn parse_float_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let mut best = f64::NAN;
    for (index, ch) in trimmed.char_indices() {
        if !(ch.is_ascii_digit() || matches!(ch, '.' | 'e' | 'E' | '+' | '-')) {
            break;
        }
        if let Ok(number) = trimmed[..index + ch.len_utf8()].parse::<f64>() {
            best = number;
        }
    }
    best
}

/// `parseInt` in base 10: optional sign then leading digits.
pub fn parse_int_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let prefix: String = digits.chars().take_while(char::is_ascii_digit).collect();
    if prefix.is_empty() {
        return f64::NAN;
    }
    prefix
        .parse::<f64>()
        .map(|number| sign * number)
        .unwrap_or(f64::NAN)
}
