use serde::{Deserialize, Serialize};

use crate::error::FormError;

/// Upper bound on calculation passes before the result is accepted as-is.
pub const DEFAULT_MAX_CALCULATION_PASSES: usize = 5;

/// Which hidden fields the validation walk leaves out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum HiddenFieldPolicy {
    /// Skip every field whose resolved visibility is hidden, including fields
    /// inside hidden containers.
    #[default]
    Computed,
    /// Skip only nodes carrying the static `hidden` flag; their children are
    /// still walked.
    StaticOnly,
}

/// Resource limits for one script evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// `0` disables the check.
    pub max_source_len: usize,
    /// Deterministic bound on work per script; `0` disables it.
    pub max_steps: u64,
    /// Wall-clock bound; `0` (the default) disables it so results do not
    /// depend on host speed.
    pub max_duration_ms: u64,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_source_len: 16 * 1024,
            max_steps: 10_000,
            max_duration_ms: 0,
        }
    }
}

/// Engine configuration threaded through [`crate::Engine`] and the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub max_calculation_passes: usize,
    pub script: ScriptLimits,
    pub hidden_fields: HiddenFieldPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_calculation_passes: DEFAULT_MAX_CALCULATION_PASSES,
            script: ScriptLimits::default(),
            hidden_fields: HiddenFieldPolicy::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a config document; an empty document yields the defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, FormError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw).map_err(FormError::ConfigParse)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_keeps_defaults() {
        let config =
            EngineConfig::from_json_str(r#"{ "script": { "max_steps": 42 } }"#).expect("parse");
        assert_eq!(config.max_calculation_passes, 5);
        assert_eq!(config.script.max_steps, 42);
        assert_eq!(config.script.max_duration_ms, 0);
        assert_eq!(config.hidden_fields, HiddenFieldPolicy::Computed);
    }

    #[test]
    fn wall_clock_budget_is_opt_in() {
        assert_eq!(ScriptLimits::default().max_duration_ms, 0);
        let config = EngineConfig::from_json_str(r#"{ "script": { "max_duration_ms": 25 } }"#)
            .expect("parse");
        assert_eq!(config.script.max_duration_ms, 25);
        assert_eq!(config.script.max_steps, 10_000);
    }

    #[test]
    fn blank_config_is_default() {
        assert_eq!(EngineConfig::from_json_str("  ").expect("parse"), EngineConfig::default());
    }

    #[test]
    fn policy_uses_snake_case() {
        let config = EngineConfig::from_json_str(r#"{ "hidden_fields": "static_only" }"#)
            .expect("parse");
        assert_eq!(config.hidden_fields, HiddenFieldPolicy::StaticOnly);
    }
}
