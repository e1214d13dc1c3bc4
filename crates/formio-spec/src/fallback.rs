//! Neutral results used when a form script fails.
//!
//! | site        | on failure                       |
//! |-------------|----------------------------------|
//! | visibility  | visible (`hidden = false`)       |
//! | calculation | no new value, keep existing      |
//! | validation  | rule passes                      |
//!
//! Every call site that runs a script routes its error through one of the
//! functions below so the policy lives in one place.

use serde_json::Value;

use crate::sandbox::{CustomVerdict, ScriptError};

/// Visible is `true`. A failing `customConditional` keeps the field visible.
pub fn visibility(key: &str, result: Result<bool, ScriptError>) -> bool {
    result.unwrap_or_else(|err| {
        tracing::warn!(field = key, error = %err, "customConditional failed; keeping field visible");
        true
    })
}

/// A failing `calculateValue` yields no value.
pub fn calculation(key: &str, result: Result<Option<Value>, ScriptError>) -> Option<Value> {
    result.unwrap_or_else(|err| {
        tracing::warn!(field = key, error = %err, "calculateValue failed; keeping current value");
        None
    })
}

/// A failing `validate.custom` passes.
pub fn validation(key: &str, result: Result<CustomVerdict, ScriptError>) -> CustomVerdict {
    result.unwrap_or_else(|err| {
        tracing::warn!(field = key, error = %err, "custom validation failed; treating as valid");
        CustomVerdict::Valid
    })
}
