use std::fmt;

use serde_json::{Map, Value};

use crate::calculate::{self, CalculationOutcome};
use crate::config::EngineConfig;
use crate::data::{FormData, ValidationError};
use crate::messages::{NoTranslation, Translate};
use crate::sandbox::{EvalContext, Sandbox};
use crate::schema::{ComponentNode, FormSchema};
use crate::validate;
use crate::visibility::{self, VisibilityMap};

/// Evaluation context shared by every engine operation: configuration,
/// script sandbox, message translator and the `util` object scripts see.
pub struct Engine {
    config: EngineConfig,
    sandbox: Sandbox,
    translator: Box<dyn Translate + Send + Sync>,
    util: Value,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("util", &self.util)
            .finish_non_exhaustive()
    }
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            sandbox: Sandbox::new(config.script),
            config,
            translator: Box::new(NoTranslation),
            util: Value::Object(Map::new()),
        }
    }

    pub fn with_translator(mut self, translator: impl Translate + Send + Sync + 'static) -> Self {
        self.translator = Box::new(translator);
        self
    }

    /// Replaces the `util` object bound into scripts.
    pub fn with_util(mut self, util: Value) -> Self {
        self.util = util;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    pub fn translator(&self) -> &dyn Translate {
        &*self.translator
    }

    pub fn util(&self) -> &Value {
        &self.util
    }

    pub(crate) fn context<'a>(&'a self, data: &'a FormData) -> EvalContext<'a> {
        EvalContext::new(data).with_util(Some(&self.util))
    }

    /// `true` when `node` is hidden for `data`.
    pub fn evaluate_visibility(&self, node: &ComponentNode, data: &FormData) -> bool {
        visibility::is_hidden(self, node, data, None)
    }

    /// Visible flag for every keyed node, with hidden containers hiding
    /// their descendants.
    pub fn resolve_visibility(&self, nodes: &[ComponentNode], data: &FormData) -> VisibilityMap {
        visibility::resolve(self, nodes, data)
    }

    pub fn seed_defaults(&self, nodes: &[ComponentNode], data: &FormData) -> FormData {
        calculate::seed_defaults(nodes, data)
    }

    pub fn run_calculations(&self, nodes: &[ComponentNode], data: &FormData) -> CalculationOutcome {
        calculate::run(self, nodes, data)
    }

    pub fn validate_field(
        &self,
        node: &ComponentNode,
        value: Option<&Value>,
        data: &FormData,
    ) -> Vec<ValidationError> {
        validate::field(self, node, value, data)
    }

    pub fn validate_form(&self, nodes: &[ComponentNode], data: &FormData) -> Vec<ValidationError> {
        validate::form(self, nodes, data)
    }

    /// Validates one wizard page; an out-of-range index yields no errors.
    pub fn validate_page(
        &self,
        schema: &FormSchema,
        page: usize,
        data: &FormData,
    ) -> Vec<ValidationError> {
        match schema.pages().get(page) {
            Some(page) => validate::form(self, std::slice::from_ref(page), data),
            None => Vec::new(),
        }
    }
}

/// [`Engine::evaluate_visibility`] with default settings.
pub fn evaluate_visibility(node: &ComponentNode, data: &FormData) -> bool {
    Engine::default().evaluate_visibility(node, data)
}

/// [`Engine::run_calculations`] with default settings, keeping only the data.
pub fn run_calculations(nodes: &[ComponentNode], data: &FormData) -> FormData {
    Engine::default().run_calculations(nodes, data).data
}

pub fn validate_field(
    node: &ComponentNode,
    value: Option<&Value>,
    data: &FormData,
) -> Vec<ValidationError> {
    Engine::default().validate_field(node, value, data)
}

pub fn validate_form(nodes: &[ComponentNode], data: &FormData) -> Vec<ValidationError> {
    Engine::default().validate_form(nodes, data)
}
