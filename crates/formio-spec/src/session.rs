//! Stateful controller owning one form's data snapshot and error list.

use serde_json::Value;

use crate::data::{FormData, ValidationError};
use crate::engine::Engine;
use crate::schema::FormSchema;
use crate::visibility::VisibilityMap;

/// Receives session updates. Every method defaults to a no-op.
pub trait SessionObserver {
    fn on_change(&mut self, _data: &FormData) {}
    fn on_validation(&mut self, _errors: &[ValidationError]) {}
    fn on_submit(&mut self, _data: &FormData) {}
}

impl SessionObserver for () {}

/// One recorded observer notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Change(FormData),
    Validation(Vec<ValidationError>),
    Submit(FormData),
}

/// Records every notification in order.
impl SessionObserver for Vec<SessionEvent> {
    fn on_change(&mut self, data: &FormData) {
        self.push(SessionEvent::Change(data.clone()));
    }

    fn on_validation(&mut self, errors: &[ValidationError]) {
        self.push(SessionEvent::Validation(errors.to_vec()));
    }

    fn on_submit(&mut self, data: &FormData) {
        self.push(SessionEvent::Submit(data.clone()));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Initializing,
    Ready,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Accepted(FormData),
    Rejected(Vec<ValidationError>),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, SubmitOutcome::Accepted(_))
    }
}

#[derive(Debug)]
pub struct FormSession<O = ()> {
    engine: Engine,
    schema: FormSchema,
    data: FormData,
    errors: Vec<ValidationError>,
    visibility: VisibilityMap,
    state: SessionState,
    converged: bool,
    observer: O,
}

impl<O: SessionObserver> FormSession<O> {
    pub fn new(engine: Engine, schema: FormSchema, observer: O) -> Self {
        Self {
            engine,
            schema,
            data: FormData::new(),
            errors: Vec::new(),
            visibility: VisibilityMap::new(),
            state: SessionState::Initializing,
            converged: true,
            observer,
        }
    }

    /// Seeds defaults into `initial`, runs calculations and validation, and
    /// publishes both.
    pub fn initialize(&mut self, initial: FormData) {
        self.state = SessionState::Initializing;
        let seeded = self.engine.seed_defaults(&self.schema.components, &initial);
        self.recalculate(&seeded);
        self.state = SessionState::Ready;
        tracing::debug!(fields = self.data.len(), errors = self.errors.len(), "session initialized");
    }

    /// Swaps the schema and re-initializes from the current data.
    pub fn replace_schema(&mut self, schema: FormSchema) {
        self.schema = schema;
        let current = std::mem::take(&mut self.data);
        self.initialize(current);
    }

    /// Merges one field value, recalculates and revalidates.
    pub fn on_field_change(&mut self, key: &str, value: Value) {
        let mut merged = self.data.clone();
        merged.insert(key.to_string(), value);
        tracing::debug!(field = key, "field changed");
        self.recalculate(&merged);
    }

    /// Validates the current data; accepted data is handed to `on_submit`.
    pub fn submit(&mut self) -> SubmitOutcome {
        let errors = self
            .engine
            .validate_form(&self.schema.components, &self.data);
        self.errors = errors;
        if self.errors.is_empty() {
            self.observer.on_submit(&self.data);
            SubmitOutcome::Accepted(self.data.clone())
        } else {
            tracing::debug!(errors = self.errors.len(), "submission rejected");
            self.observer.on_validation(&self.errors);
            SubmitOutcome::Rejected(self.errors.clone())
        }
    }

    /// Errors for one wizard page of the current data.
    pub fn validate_page(&self, page: usize) -> Vec<ValidationError> {
        self.engine.validate_page(&self.schema, page, &self.data)
    }

    fn recalculate(&mut self, base: &FormData) {
        let outcome = self.engine.run_calculations(&self.schema.components, base);
        self.converged = outcome.converged;
        self.data = outcome.data;
        self.visibility = self
            .engine
            .resolve_visibility(&self.schema.components, &self.data);
        self.observer.on_change(&self.data);
        self.errors = self
            .engine
            .validate_form(&self.schema.components, &self.data);
        self.observer.on_validation(&self.errors);
    }

    pub fn data(&self) -> &FormData {
        &self.data
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn visibility(&self) -> &VisibilityMap {
        &self.visibility
    }

    /// Whether `key` is visible; unknown keys count as visible.
    pub fn is_visible(&self, key: &str) -> bool {
        self.visibility.get(key).copied().unwrap_or(true)
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn schema(&self) -> &FormSchema {
        &self.schema
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// `false` when the last calculation hit the pass limit.
    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn observer(&self) -> &O {
        &self.observer
    }

    pub fn into_observer(self) -> O {
        self.observer
    }
}
