use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use formio_spec::{
    Engine, EngineConfig, FormData, FormError, FormSchema, FormSession, SubmitOutcome,
    TranslationTable, data_from_value, json_schema as form_json_schema, tree,
};

const DEFAULT_FORM: &str = include_str!("../../formio-spec/tests/fixtures/simple_form.json");

#[derive(Debug, Error)]
enum ComponentError {
    #[error("failed to parse config/{0}")]
    ConfigParse(#[source] serde_json::Error),
    #[error("failed to parse data: {0}")]
    DataParse(#[source] serde_json::Error),
    #[error("json encode error: {0}")]
    JsonEncode(#[source] serde_json::Error),
    #[error(transparent)]
    Form(#[from] FormError),
}

#[derive(Debug, Deserialize, Serialize, Default)]
struct ComponentConfig {
    #[serde(default)]
    form_schema_json: Option<String>,
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    translations: TranslationTable,
    #[serde(default)]
    util: Option<Value>,
}

struct LoadedForm {
    schema: FormSchema,
    engine: Engine,
}

fn load_form(config_json: &str) -> Result<LoadedForm, ComponentError> {
    let config = if config_json.trim().is_empty() {
        ComponentConfig::default()
    } else {
        serde_json::from_str(config_json).map_err(ComponentError::ConfigParse)?
    };

    let schema_json = config.form_schema_json.as_deref().unwrap_or(DEFAULT_FORM);
    let schema = FormSchema::from_json_str(schema_json)?;

    let mut engine = Engine::new(config.engine);
    if !config.translations.is_empty() {
        engine = engine.with_translator(config.translations);
    }
    if let Some(util) = config.util {
        engine = engine.with_util(util);
    }
    Ok(LoadedForm { schema, engine })
}

/// Blank input is an empty snapshot; anything else must be a JSON object.
fn parse_data(data_json: &str) -> Result<FormData, ComponentError> {
    if data_json.trim().is_empty() {
        return Ok(FormData::new());
    }
    let value: Value = serde_json::from_str(data_json).map_err(ComponentError::DataParse)?;
    Ok(data_from_value(value)?)
}

fn respond(result: Result<Value, ComponentError>) -> String {
    match result {
        Ok(value) => serde_json::to_string(&value).unwrap_or_else(|error| {
            json!({"error": format!("json encode: {}", error)}).to_string()
        }),
        Err(err) => {
            tracing::debug!(error = %err, "component call failed");
            json!({ "error": err.to_string() }).to_string()
        }
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, ComponentError> {
    serde_json::to_value(value).map_err(ComponentError::JsonEncode)
}

/// Form summary: title, wizard pages, tree statistics and the schema itself.
pub fn describe(config_json: &str) -> String {
    respond(load_form(config_json).and_then(|form| {
        let schema = &form.schema;
        let pages: Vec<Value> = schema
            .pages()
            .iter()
            .map(|page| json!({ "key": page.key, "title": page.extra.get("title") }))
            .collect();
        Ok(json!({
            "title": schema.title,
            "wizard": schema.is_wizard(),
            "pages": pages,
            "stats": encode(&tree::stats(&schema.components))?,
            "required": tree::required_keys(&schema.components),
            "schema": encode(schema)?,
        }))
    }))
}

/// JSON Schema of the accepted form document.
pub fn form_schema() -> String {
    respond(Ok(form_json_schema()))
}

pub fn visibility(config_json: &str, data_json: &str) -> String {
    respond(load_form(config_json).and_then(|form| {
        let data = parse_data(data_json)?;
        encode(&form.engine.resolve_visibility(&form.schema.components, &data))
    }))
}

pub fn calculate(config_json: &str, data_json: &str) -> String {
    respond(load_form(config_json).and_then(|form| {
        let data = parse_data(data_json)?;
        encode(&form.engine.run_calculations(&form.schema.components, &data))
    }))
}

pub fn validate_data(config_json: &str, data_json: &str) -> String {
    respond(load_form(config_json).and_then(|form| {
        let data = parse_data(data_json)?;
        let errors = form.engine.validate_form(&form.schema.components, &data);
        Ok(json!({
            "valid": errors.is_empty(),
            "errors": encode(&errors)?,
        }))
    }))
}

fn session_response(session: &FormSession, status: &str) -> Result<Value, ComponentError> {
    Ok(json!({
        "status": status,
        "data": session.data(),
        "errors": encode(&session.errors())?,
        "visibility": encode(session.visibility())?,
    }))
}

/// Seeds defaults into `data_json`, then calculates and validates, the way a
/// form does when it is first shown.
pub fn initialize(config_json: &str, data_json: &str) -> String {
    respond(load_form(config_json).and_then(|form| {
        let data = parse_data(data_json)?;
        let mut session = FormSession::new(form.engine, form.schema, ());
        session.initialize(data);
        let status = if session.errors().is_empty() {
            "valid"
        } else {
            "invalid"
        };
        session_response(&session, status)
    }))
}

/// Applies one field change on top of `data_json` the way a live form does:
/// merge, recalculate, revalidate.
pub fn submit_patch(config_json: &str, data_json: &str, field_key: &str, value_json: &str) -> String {
    respond(load_form(config_json).and_then(|form| {
        let data = parse_data(data_json)?;
        let value: Value = serde_json::from_str(value_json).map_err(ComponentError::DataParse)?;
        let mut session = FormSession::new(form.engine, form.schema, ());
        session.initialize(data);
        session.on_field_change(field_key, value);
        let status = if session.errors().is_empty() {
            "valid"
        } else {
            "invalid"
        };
        session_response(&session, status)
    }))
}

/// Initializes a session from `data_json` and submits it.
pub fn submit_all(config_json: &str, data_json: &str) -> String {
    respond(load_form(config_json).and_then(|form| {
        let data = parse_data(data_json)?;
        let mut session = FormSession::new(form.engine, form.schema, ());
        session.initialize(data);
        match session.submit() {
            SubmitOutcome::Accepted(_) => session_response(&session, "accepted"),
            SubmitOutcome::Rejected(_) => session_response(&session, "rejected"),
        }
    }))
}
