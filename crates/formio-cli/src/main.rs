mod fill;

use clap::{Parser, Subcommand};
use component_formio::{
    calculate, describe, form_schema, initialize, submit_all, submit_patch, validate_data,
    visibility,
};
use fill::{AnswerParseError, FillPresenter, PromptContext, Verbosity};
use formio_spec::{
    Engine, EngineConfig, EvalContext, FormSchema, Submission, data_from_value, is_empty_value,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

/// Environment variable holding the log filter, e.g. `FORMIO_LOG=debug`.
const LOG_ENV: &str = "FORMIO_LOG";

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Form evaluation CLI",
    long_about = "Evaluates visibility, calculated values and validation of Formio-style form schemas, and fills forms interactively"
)]
struct Cli {
    /// Component config JSON (engine limits, translations, util object).
    #[arg(long, value_name = "CONFIG", global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the form title, wizard pages, tree statistics and required keys.
    Inspect {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
    },
    /// Validate a data snapshot against a form schema.
    Validate {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Path to the data JSON object.
        #[arg(long, value_name = "DATA")]
        data: PathBuf,
    },
    /// Run calculated values until the data stops changing.
    Calculate {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Path to the data JSON object.
        #[arg(long, value_name = "DATA")]
        data: PathBuf,
    },
    /// Print the resolved visibility of every keyed component.
    Visibility {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Path to the data JSON object.
        #[arg(long, value_name = "DATA")]
        data: PathBuf,
    },
    /// Evaluate one script in the sandbox and print its result.
    Eval {
        /// Script source, e.g. `value = data.a + data.b`.
        #[arg(long, value_name = "CODE")]
        code: String,
        /// Optional JSON file bound as `data`.
        #[arg(long, value_name = "DATA")]
        data: Option<PathBuf>,
        /// Optional JSON literal bound as `input`/`value`.
        #[arg(long, value_name = "JSON")]
        value: Option<String>,
        /// Optional JSON object bound as `row`.
        #[arg(long, value_name = "JSON")]
        row: Option<String>,
    },
    /// Print the JSON Schema of the form document format.
    Schema,
    /// Fill a form interactively in a text shell.
    Fill {
        /// Path to the form schema JSON.
        #[arg(long, value_name = "SCHEMA")]
        schema: PathBuf,
        /// Optional JSON file containing initial data.
        #[arg(long, value_name = "DATA")]
        data: Option<PathBuf>,
        /// Show verbose output (skipped fields, data after each change, parse expectations).
        #[arg(long, alias = "debug")]
        verbose: bool,
        /// Also print the submission as JSON.
        #[arg(long)]
        data_json: bool,
    },
}

fn main() -> CliResult<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = cli.config.as_deref();
    match cli.command {
        Command::Inspect { schema } => run_inspect(&FormInput::load(&schema, config)?),
        Command::Validate { schema, data } => {
            run_validate(&FormInput::load(&schema, config)?, &data)
        }
        Command::Calculate { schema, data } => {
            let form = FormInput::load(&schema, config)?;
            print_response(&calculate(&form.config_json, &read_text(&data)?))
        }
        Command::Visibility { schema, data } => {
            let form = FormInput::load(&schema, config)?;
            print_response(&visibility(&form.config_json, &read_text(&data)?))
        }
        Command::Eval {
            code,
            data,
            value,
            row,
        } => run_eval(config, &code, data, value, row),
        Command::Schema => print_response(&form_schema()),
        Command::Fill {
            schema,
            data,
            verbose,
            data_json,
        } => run_fill(&FormInput::load(&schema, config)?, data, verbose, data_json),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Schema text plus the component config document that embeds it.
struct FormInput {
    schema_json: String,
    config_json: String,
}

impl FormInput {
    fn load(schema_path: &Path, config_path: Option<&Path>) -> CliResult<Self> {
        let schema_json = fs::read_to_string(schema_path)
            .map_err(|err| format!("failed to read {}: {}", schema_path.display(), err))?;
        let mut config = read_config(config_path)?;
        config.insert("form_schema_json".into(), Value::String(schema_json.clone()));
        tracing::debug!(schema = %schema_path.display(), "form loaded");
        Ok(Self {
            schema_json,
            config_json: Value::Object(config).to_string(),
        })
    }
}

fn read_config(path: Option<&Path>) -> CliResult<Map<String, Value>> {
    let Some(path) = path else {
        return Ok(Map::new());
    };
    match serde_json::from_str::<Value>(&read_text(path)?)? {
        Value::Object(config) => Ok(config),
        _ => Err(format!("config {} must be a JSON object", path.display()).into()),
    }
}

fn read_text(path: &Path) -> CliResult<String> {
    fs::read_to_string(path)
        .map_err(|err| format!("failed to read {}: {}", path.display(), err).into())
}

fn parse_component_result(response: &str) -> CliResult<Value> {
    let value: Value = serde_json::from_str(response)?;
    if let Some(error) = value.get("error").and_then(Value::as_str) {
        Err(error.into())
    } else {
        Ok(value)
    }
}

fn print_response(response: &str) -> CliResult<()> {
    let value = parse_component_result(response)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

fn run_inspect(form: &FormInput) -> CliResult<()> {
    let summary = parse_component_result(&describe(&form.config_json))?;
    println!(
        "Form: {}",
        summary["title"].as_str().unwrap_or("(untitled)")
    );
    if summary["wizard"] == Value::Bool(true) {
        let pages: Vec<&str> = summary["pages"]
            .as_array()
            .map(|pages| {
                pages
                    .iter()
                    .filter_map(|page| page["key"].as_str())
                    .collect()
            })
            .unwrap_or_default();
        println!("Wizard pages: {}", pages.join(", "));
    }
    let stats = &summary["stats"];
    println!(
        "Components: {} ({} inputs)",
        stats["total"], stats["input_count"]
    );
    if let Some(distribution) = stats["type_distribution"].as_object() {
        for (kind, count) in distribution {
            println!("  {}: {}", kind, count);
        }
    }
    let required: Vec<&str> = summary["required"]
        .as_array()
        .map(|keys| keys.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    if !required.is_empty() {
        println!("Required: {}", required.join(", "));
    }
    Ok(())
}

fn run_validate(form: &FormInput, data_path: &Path) -> CliResult<()> {
    let result = parse_component_result(&validate_data(&form.config_json, &read_text(data_path)?))?;
    let valid = result["valid"] == Value::Bool(true);
    println!(
        "Validation result: {}",
        if valid { "valid" } else { "invalid" }
    );
    describe_errors(&result["errors"]);

    if valid {
        Ok(())
    } else {
        Err("validation failed".into())
    }
}

fn describe_errors(errors: &Value) {
    let Some(errors) = errors.as_array().filter(|errors| !errors.is_empty()) else {
        return;
    };
    println!("Errors:");
    for error in errors {
        println!(
            "  {} - {}",
            error["field"].as_str().unwrap_or("<unknown>"),
            error["message"].as_str().unwrap_or_default()
        );
    }
}

#[derive(Deserialize, Default)]
struct ScriptSettings {
    #[serde(default)]
    engine: EngineConfig,
    #[serde(default)]
    util: Option<Value>,
}

fn run_eval(
    config_path: Option<&Path>,
    code: &str,
    data_path: Option<PathBuf>,
    value: Option<String>,
    row: Option<String>,
) -> CliResult<()> {
    let settings: ScriptSettings = serde_json::from_value(Value::Object(read_config(config_path)?))?;
    let mut engine = Engine::new(settings.engine);
    if let Some(util) = settings.util {
        engine = engine.with_util(util);
    }

    let data = match data_path {
        Some(path) => data_from_value(serde_json::from_str::<Value>(&read_text(&path)?)?)?,
        None => Map::new(),
    };
    let value: Option<Value> = value.as_deref().map(serde_json::from_str).transpose()?;
    let row: Option<Value> = row.as_deref().map(serde_json::from_str).transpose()?;

    let ctx = EvalContext::new(&data)
        .with_row(row.as_ref())
        .with_value(value.as_ref())
        .with_util(Some(engine.util()));
    match engine.sandbox().value(code, &ctx)? {
        Some(result) => println!("{}", serde_json::to_string_pretty(&result)?),
        None => println!("undefined"),
    }
    Ok(())
}

fn run_fill(
    form: &FormInput,
    data_path: Option<PathBuf>,
    verbose: bool,
    data_json: bool,
) -> CliResult<()> {
    let schema = FormSchema::from_json_str(&form.schema_json)?;
    let fields = fill::fillable_fields(&schema.components);
    let mut presenter = FillPresenter::new(Verbosity::from_verbose(verbose), data_json);
    presenter.show_header(schema.title.as_deref(), fields.len());

    let initial = match data_path {
        Some(path) => read_text(&path)?,
        None => "{}".to_string(),
    };
    let seeded = parse_component_result(&initialize(&form.config_json, &initial))?;
    let mut data = seeded["data"].clone();

    for (position, node) in fields.iter().enumerate() {
        let visible = parse_component_result(&visibility(&form.config_json, &data.to_string()))?;
        if visible.get(&node.key) == Some(&Value::Bool(false)) {
            presenter.show_skipped(&node.key);
            continue;
        }

        loop {
            let current = data.get(&node.key);
            let prompt = PromptContext::new(node, position + 1, fields.len(), current);
            let Some(answer) = prompt_field(&prompt, &presenter, is_empty_value(current))? else {
                break;
            };
            let response = parse_component_result(&submit_patch(
                &form.config_json,
                &data.to_string(),
                &node.key,
                &serde_json::to_string(&answer)?,
            ))?;
            let field_errors = errors_for(&response, &prompt.key);
            if field_errors.is_empty() {
                data = response["data"].clone();
                presenter.show_data(&data);
                break;
            }
            presenter.show_field_errors(&field_errors);
        }
    }

    let response = parse_component_result(&submit_all(&form.config_json, &data.to_string()))?;
    if response["status"] == "accepted" {
        let submitted = data_from_value(response["data"].clone())?;
        presenter.show_completion(&Submission::new(schema.title.clone(), submitted));
        Ok(())
    } else {
        println!("Submission rejected.");
        describe_errors(&response["errors"]);
        Err("submission rejected".into())
    }
}

/// Reads answers until one parses. `None` keeps the current value.
fn prompt_field(
    prompt: &PromptContext,
    presenter: &FillPresenter,
    missing: bool,
) -> CliResult<Option<Value>> {
    loop {
        presenter.show_prompt(prompt);
        print!("> ");
        io::stdout().flush()?;
        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            return Err("input closed before the form was complete".into());
        }

        let trimmed = input.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            return Err("fill aborted by user".into());
        }

        match fill::parse_answer(prompt, trimmed) {
            Ok(None) if prompt.required && missing => {
                presenter.show_parse_error(&AnswerParseError::new(
                    "This field requires an answer.",
                    None,
                ));
            }
            Ok(answer) => return Ok(answer),
            Err(err) => presenter.show_parse_error(&err),
        }
    }
}

/// Errors reported for `key` itself or for cells of its grid rows.
fn errors_for<'a>(response: &'a Value, key: &str) -> Vec<&'a Value> {
    let row_prefix = format!("{}[", key);
    response["errors"]
        .as_array()
        .map(|errors| {
            errors
                .iter()
                .filter(|error| {
                    error["field"]
                        .as_str()
                        .is_some_and(|field| field == key || field.starts_with(&row_prefix))
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn component_errors_become_cli_errors() {
        let err = parse_component_result(r#"{"error": "boom"}"#).unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert!(parse_component_result(r#"{"valid": true}"#).is_ok());
    }

    #[test]
    fn errors_for_matches_field_and_rows() {
        let response = json!({
            "errors": [
                { "field": "lines", "message": "Lines is required" },
                { "field": "lines[0].item", "message": "Item is required" },
                { "field": "linesTotal", "message": "other" },
                { "field": "name", "message": "Name is required" }
            ]
        });
        let fields: Vec<&str> = errors_for(&response, "lines")
            .iter()
            .filter_map(|error| error["field"].as_str())
            .collect();
        assert_eq!(fields, vec!["lines", "lines[0].item"]);
    }

    #[test]
    fn script_settings_default_when_config_is_empty() {
        let settings: ScriptSettings = serde_json::from_value(json!({})).unwrap();
        assert_eq!(settings.engine, EngineConfig::default());
        assert!(settings.util.is_none());
    }
}
