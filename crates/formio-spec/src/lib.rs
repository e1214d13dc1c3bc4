#![allow(missing_docs)]

pub mod calculate;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod fallback;
pub mod messages;
pub mod sandbox;
pub mod schema;
pub mod session;
pub mod tree;
pub mod validate;
pub mod visibility;

pub use calculate::CalculationOutcome;
pub use config::{DEFAULT_MAX_CALCULATION_PASSES, EngineConfig, HiddenFieldPolicy, ScriptLimits};
pub use data::{FormData, Submission, ValidationError, data_from_value, is_empty_value};
pub use engine::{Engine, evaluate_visibility, run_calculations, validate_field, validate_form};
pub use error::FormError;
pub use messages::{MessageKey, NoTranslation, Translate, TranslationTable};
pub use sandbox::{CustomVerdict, EvalContext, Sandbox, ScriptError};
pub use schema::{Column, ComponentNode, Conditional, FormSchema, ValidateRules, json_schema};
pub use session::{FormSession, SessionEvent, SessionObserver, SessionState, SubmitOutcome};
pub use tree::{ContainerKind, TreeStats};
pub use visibility::VisibilityMap;
