//! Restricted evaluator for form-author scripts.
//!
//! Scripts see `data`, `row`, `value` (alias `input`), `util`, `show` and
//! `valid` plus a short list of whitelisted globals. They run in a fresh scope
//! per call under [`ScriptLimits`]; nothing persists between calls.

mod interp;
mod lexer;
mod parser;
mod value;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ScriptLimits;
use crate::data::FormData;

pub use interp::RESULT_BINDINGS;
pub use value::ScriptValue;

use interp::{Bindings, Interpreter};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error("script is {len} bytes, limit is {max}")]
    SourceTooLong { len: usize, max: usize },
    #[error("{0} is not defined")]
    Reference(String),
    #[error("type error: {0}")]
    Type(String),
    #[error("cannot assign to {0}")]
    ReadOnly(String),
    #[error("script exceeded {0} evaluation steps")]
    StepBudget(u64),
    #[error("script exceeded {0}ms")]
    TimeBudget(u64),
    #[error("script nests too deeply")]
    TooDeep,
}

impl ScriptError {
    pub(crate) fn syntax(offset: usize, message: impl Into<String>) -> Self {
        ScriptError::Syntax {
            offset,
            message: message.into(),
        }
    }
}

/// Outcome of a custom validation script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CustomVerdict {
    Valid,
    /// Rejected; carries the script's own message when it returned one.
    Invalid(Option<String>),
}

/// Read-only view handed to a script.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub data: &'a FormData,
    /// Row of the enclosing grid; scripts see `data` when unset.
    pub row: Option<&'a Value>,
    pub value: Option<&'a Value>,
    pub util: Option<&'a Value>,
}

impl<'a> EvalContext<'a> {
    pub fn new(data: &'a FormData) -> Self {
        Self {
            data,
            row: None,
            value: None,
            util: None,
        }
    }

    pub fn with_row(mut self, row: Option<&'a Value>) -> Self {
        self.row = row;
        self
    }

    pub fn with_value(mut self, value: Option<&'a Value>) -> Self {
        self.value = value;
        self
    }

    pub fn with_util(mut self, util: Option<&'a Value>) -> Self {
        self.util = util;
        self
    }

    fn bindings(&self) -> Bindings {
        let data = object_value(self.data);
        let row = match self.row {
            Some(row) => ScriptValue::from_json(row),
            None => data.clone(),
        };
        Bindings {
            data,
            row,
            value: ScriptValue::from_optional_json(self.value),
            util: self
                .util
                .map(ScriptValue::from_json)
                .unwrap_or_else(|| ScriptValue::Object(Default::default())),
        }
    }
}

fn object_value(map: &Map<String, Value>) -> ScriptValue {
    ScriptValue::Object(
        map.iter()
            .map(|(key, value)| (key.clone(), ScriptValue::from_json(value)))
            .collect(),
    )
}

/// Script runner bound to a set of limits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sandbox {
    limits: ScriptLimits,
}

impl Sandbox {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> ScriptLimits {
        self.limits
    }

    /// Runs `code` and returns the raw script result.
    pub fn run(&self, code: &str, ctx: &EvalContext<'_>) -> Result<ScriptValue, ScriptError> {
        if self.limits.max_source_len > 0 && code.len() > self.limits.max_source_len {
            return Err(ScriptError::SourceTooLong {
                len: code.len(),
                max: self.limits.max_source_len,
            });
        }
        let program = parser::parse(code)?;
        Interpreter::new(ctx.bindings(), self.limits).run(&program)
    }

    /// Runs `code`; any failure is logged and read as undefined (`None`).
    pub fn evaluate(&self, code: &str, ctx: &EvalContext<'_>) -> Option<Value> {
        match self.run(code, ctx) {
            Ok(result) => result.to_json(),
            Err(err) => {
                tracing::warn!(error = %err, code, "script evaluation failed");
                None
            }
        }
    }

    /// Boolean reading of the result; undefined reads as `false`.
    pub fn conditional(&self, code: &str, ctx: &EvalContext<'_>) -> Result<bool, ScriptError> {
        self.run(code, ctx).map(|result| result.truthy())
    }

    /// `false` rejects with the default message, a non-empty string rejects
    /// with that message, anything else passes.
    pub fn validation(
        &self,
        code: &str,
        ctx: &EvalContext<'_>,
    ) -> Result<CustomVerdict, ScriptError> {
        Ok(match self.run(code, ctx)? {
            ScriptValue::Bool(false) => CustomVerdict::Invalid(None),
            ScriptValue::String(message) if !message.is_empty() => {
                CustomVerdict::Invalid(Some(message))
            }
            _ => CustomVerdict::Valid,
        })
    }

    /// JSON value of the result; `None` means no value was produced.
    pub fn value(&self, code: &str, ctx: &EvalContext<'_>) -> Result<Option<Value>, ScriptError> {
        self.run(code, ctx).map(|result| result.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> FormData {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    fn eval(code: &str, snapshot: &FormData) -> Option<Value> {
        Sandbox::default().evaluate(code, &EvalContext::new(snapshot))
    }

    #[test]
    fn assignment_to_value_is_the_result() {
        let snapshot = data(json!({ "a": 2, "b": 3 }));
        assert_eq!(eval("value = data.a + data.b", &snapshot), Some(json!(5)));
    }

    #[test]
    fn show_assignment_drives_conditionals() {
        let sandbox = Sandbox::default();
        let code = "show = data.a === 'x'";
        let yes = data(json!({ "a": "x" }));
        let no = data(json!({ "a": "y" }));
        assert_eq!(sandbox.conditional(code, &EvalContext::new(&yes)), Ok(true));
        assert_eq!(sandbox.conditional(code, &EvalContext::new(&no)), Ok(false));
    }

    #[test]
    fn explicit_return_wins_over_assignment() {
        let snapshot = FormData::new();
        assert_eq!(eval("value = 1; return 2;", &snapshot), Some(json!(2)));
    }

    #[test]
    fn trailing_expression_is_the_result() {
        let snapshot = data(json!({ "firstName": "John" }));
        assert_eq!(
            eval("data.firstName === 'John'", &snapshot),
            Some(json!(true))
        );
        assert_eq!(eval("var x = 1;", &snapshot), None);
    }

    #[test]
    fn row_defaults_to_data_and_input_aliases_value() {
        let snapshot = data(json!({ "qty": 4 }));
        let own = json!(10);
        let ctx = EvalContext::new(&snapshot).with_value(Some(&own));
        let sandbox = Sandbox::default();
        assert_eq!(sandbox.value("return row.qty * input", &ctx), Ok(Some(json!(40))));

        let row = json!({ "qty": 1 });
        let ctx = ctx.with_row(Some(&row));
        assert_eq!(sandbox.value("return row.qty + data.qty", &ctx), Ok(Some(json!(5))));
    }

    #[test]
    fn control_flow_and_locals() {
        let snapshot = data(json!({ "age": 20 }));
        let code = "let label; if (data.age >= 18) { label = 'adult' } else label = 'minor'; return label";
        assert_eq!(eval(code, &snapshot), Some(json!("adult")));
    }

    #[test]
    fn whitelisted_helpers() {
        let snapshot = data(json!({ "name": "  Ada Lovelace ", "tags": ["a", "b"] }));
        assert_eq!(
            eval("return data.name.trim().split(' ')[1].toUpperCase()", &snapshot),
            Some(json!("LOVELACE"))
        );
        assert_eq!(
            eval("return Math.max(1, parseInt('7px'), Math.round(2.5))", &snapshot),
            Some(json!(7))
        );
        assert_eq!(
            eval("return data.tags.concat(['c']).join('-')", &snapshot),
            Some(json!("a-b-c"))
        );
        assert_eq!(eval("return (2.345).toFixed(1)", &snapshot), Some(json!("2.3")));
        assert_eq!(
            eval("return Array.isArray(data.tags) && data.tags.includes('b')", &snapshot),
            Some(json!(true))
        );
    }

    #[test]
    fn optional_chaining_and_nullish() {
        let snapshot = data(json!({ "address": null }));
        assert_eq!(
            eval("return data.address?.city ?? 'none'", &snapshot),
            Some(json!("none"))
        );
        assert_eq!(eval("return data.address.city", &snapshot), None);
    }

    #[test]
    fn failures_degrade_to_undefined() {
        let snapshot = FormData::new();
        for code in [
            "return (",
            "return missing + 1",
            "data = {}",
            "data.a = 1",
            "return window.location",
            "return alert('x')",
            "while (true) {}",
        ] {
            assert_eq!(eval(code, &snapshot), None, "{code}");
        }
    }

    #[test]
    fn failures_carry_their_kind() {
        let sandbox = Sandbox::default();
        let snapshot = FormData::new();
        let ctx = EvalContext::new(&snapshot);
        assert!(matches!(
            sandbox.run("return nope", &ctx),
            Err(ScriptError::Reference(name)) if name == "nope"
        ));
        assert!(matches!(
            sandbox.run("row = 1", &ctx),
            Err(ScriptError::ReadOnly(_))
        ));
        assert!(matches!(
            sandbox.run("return data.a.b", &ctx),
            Err(ScriptError::Type(_))
        ));
    }

    #[test]
    fn limits_are_enforced() {
        let snapshot = FormData::new();
        let ctx = EvalContext::new(&snapshot);
        let tight = Sandbox::new(ScriptLimits {
            max_source_len: 8,
            ..ScriptLimits::default()
        });
        assert!(matches!(
            tight.run("return 1 + 2 + 3", &ctx),
            Err(ScriptError::SourceTooLong { max: 8, .. })
        ));

        let few_steps = Sandbox::new(ScriptLimits {
            max_steps: 5,
            ..ScriptLimits::default()
        });
        assert_eq!(
            few_steps.run("return 1 + 2 + 3 + 4 + 5", &ctx),
            Err(ScriptError::StepBudget(5))
        );

        let nested = format!("return {}1{}", "(".repeat(500), ")".repeat(500));
        assert_eq!(Sandbox::default().run(&nested, &ctx), Err(ScriptError::TooDeep));
    }

    #[test]
    fn validation_convention() {
        let sandbox = Sandbox::default();
        let snapshot = FormData::new();
        let ctx = EvalContext::new(&snapshot);
        assert_eq!(
            sandbox.validation("valid = false", &ctx),
            Ok(CustomVerdict::Invalid(None))
        );
        assert_eq!(
            sandbox.validation("valid = 'Too short'", &ctx),
            Ok(CustomVerdict::Invalid(Some("Too short".into())))
        );
        assert_eq!(sandbox.validation("valid = ''", &ctx), Ok(CustomVerdict::Valid));
        assert_eq!(sandbox.validation("valid = true", &ctx), Ok(CustomVerdict::Valid));
        assert_eq!(sandbox.validation("var x = 1", &ctx), Ok(CustomVerdict::Valid));
    }

    #[test]
    fn scripts_do_not_share_state() {
        let sandbox = Sandbox::default();
        let snapshot = FormData::new();
        let ctx = EvalContext::new(&snapshot);
        assert_eq!(sandbox.value("var counter = 1; value = counter", &ctx), Ok(Some(json!(1))));
        assert!(sandbox.run("return counter", &ctx).is_err());
    }
}
