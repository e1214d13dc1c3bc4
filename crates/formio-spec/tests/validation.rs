use serde_json::{Value, json};

use formio_spec::{
    ComponentNode, Engine, EngineConfig, FormData, FormSchema, HiddenFieldPolicy, data_from_value,
    validate_field, validate_form,
};

fn simple_form() -> FormSchema {
    FormSchema::from_json_str(include_str!("fixtures/simple_form.json")).unwrap()
}

fn data(value: Value) -> FormData {
    data_from_value(value).unwrap()
}

fn components(value: Value) -> Vec<ComponentNode> {
    serde_json::from_value(value).unwrap()
}

fn fields(errors: &[formio_spec::ValidationError]) -> Vec<&str> {
    errors.iter().map(|error| error.field.as_str()).collect()
}

#[test]
fn missing_required_field_reports_once() {
    let nodes = components(json!([{ "type": "textfield", "key": "name", "required": true }]));
    let errors = validate_form(&nodes, &FormData::new());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].field, "name");
    assert_eq!(errors[0].message, "name is required");
    assert_eq!(errors[0].code.as_deref(), Some("required"));
}

#[test]
fn value_above_max_reports_max() {
    let node: ComponentNode = serde_json::from_value(json!({
        "type": "number", "key": "age", "validate": { "min": 18, "max": 65 }
    }))
    .unwrap();
    let snapshot = data(json!({ "age": 70 }));
    let errors = validate_field(&node, snapshot.get("age"), &snapshot);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Maximum value is 65");
    assert_eq!(errors[0].code.as_deref(), Some("max"));
}

#[test]
fn required_failure_skips_every_other_rule() {
    let node: ComponentNode = serde_json::from_value(json!({
        "type": "textfield", "key": "code", "label": "Code",
        "validate": {
            "required": true, "minLength": 3, "pattern": "^x",
            "custom": "valid = false", "customMessage": "nope"
        }
    }))
    .unwrap();
    for empty in [None, Some(json!(null)), Some(json!("")), Some(json!([]))] {
        let errors = validate_field(&node, empty.as_ref(), &FormData::new());
        assert_eq!(errors.len(), 1, "{empty:?}");
        assert_eq!(errors[0].field, "code");
        assert_eq!(errors[0].message, "Code is required");
    }
}

#[test]
fn errors_follow_tree_order() {
    let nodes = components(json!([
        {
            "type": "columns", "key": "cols", "input": false,
            "columns": [
                { "components": [ { "type": "textfield", "key": "left", "required": true } ] },
                { "components": [ { "type": "textfield", "key": "right", "required": true } ] }
            ]
        },
        {
            "type": "panel", "key": "panel", "input": false,
            "components": [ { "type": "textfield", "key": "inner", "required": true } ]
        },
        { "type": "textfield", "key": "last", "required": true }
    ]));
    let first = validate_form(&nodes, &FormData::new());
    assert_eq!(fields(&first), vec!["left", "right", "inner", "last"]);
    for _ in 0..3 {
        assert_eq!(validate_form(&nodes, &FormData::new()), first);
    }
}

#[test]
fn non_input_and_keyless_nodes_are_skipped() {
    let nodes = components(json!([
        { "type": "content", "key": "html", "input": false, "required": true },
        { "type": "textfield", "required": true },
        { "type": "textfield", "key": "kept", "required": true }
    ]));
    assert_eq!(fields(&validate_form(&nodes, &FormData::new())), vec!["kept"]);
}

#[test]
fn statically_hidden_node_still_walks_children_under_static_policy() {
    let nodes = components(json!([
        {
            "type": "panel", "key": "box", "hidden": true, "required": true,
            "components": [ { "type": "textfield", "key": "child", "required": true } ]
        }
    ]));
    let static_only = Engine::new(EngineConfig {
        hidden_fields: HiddenFieldPolicy::StaticOnly,
        ..EngineConfig::default()
    });
    assert_eq!(
        fields(&static_only.validate_form(&nodes, &FormData::new())),
        vec!["child"]
    );
    assert!(Engine::default().validate_form(&nodes, &FormData::new()).is_empty());
}

#[test]
fn conditionally_hidden_fields_follow_policy() {
    let schema = simple_form();
    let snapshot = data(json!({ "name": "Ada", "contact": "email" }));

    assert!(Engine::default().validate_form(&schema.components, &snapshot).is_empty());

    let static_only = Engine::new(EngineConfig {
        hidden_fields: HiddenFieldPolicy::StaticOnly,
        ..EngineConfig::default()
    });
    let errors = static_only.validate_form(&schema.components, &snapshot);
    assert_eq!(fields(&errors), vec!["phone"]);
    assert_eq!(errors[0].message, "Phone is required");
}

#[test]
fn fixture_form_reports_each_rule() {
    let schema = simple_form();
    let snapshot = data(json!({
        "name": "Ada", "email": "not-an-email", "age": 70, "contact": "email"
    }));
    let errors = validate_form(&schema.components, &snapshot);
    let pairs: Vec<(&str, &str)> = errors
        .iter()
        .map(|error| (error.field.as_str(), error.message.as_str()))
        .collect();
    assert_eq!(
        pairs,
        vec![
            ("email", "Enter a valid email address"),
            ("age", "Maximum value is 65"),
        ]
    );
}

#[test]
fn grid_rows_are_validated_per_cell() {
    let schema = FormSchema::from_json_str(include_str!("fixtures/order_form.json")).unwrap();

    let empty = validate_form(&schema.components, &FormData::new());
    assert_eq!(fields(&empty), vec!["lines"]);
    assert_eq!(empty[0].message, "Lines is required");

    let snapshot = data(json!({
        "lines": [
            { "item": "Pen", "qty": 2, "price": 1.5 },
            { "item": "", "qty": 0, "price": 2 }
        ]
    }));
    let errors = validate_form(&schema.components, &snapshot);
    assert_eq!(fields(&errors), vec!["lines[1].item", "lines[1].qty"]);
    assert_eq!(errors[0].message, "Item is required");
    assert_eq!(errors[1].message, "Minimum value is 1");
}

#[test]
fn custom_rule_sees_other_fields() {
    let schema = FormSchema::from_json_str(include_str!("fixtures/order_form.json")).unwrap();
    let snapshot = data(json!({
        "lines": [ { "item": "Pen", "qty": 1, "price": 1 } ],
        "total": 1.2,
        "express": true
    }));
    let errors = validate_form(&schema.components, &snapshot);
    assert_eq!(fields(&errors), vec!["express"]);
    assert_eq!(errors[0].message, "Express needs an order of 50 or more");
    assert_eq!(errors[0].code.as_deref(), Some("custom"));
}

#[test]
fn wizard_pages_validate_independently() {
    let schema = FormSchema::from_json_str(include_str!("fixtures/wizard_form.json")).unwrap();
    let engine = Engine::default();
    assert!(schema.is_wizard());
    assert_eq!(schema.pages().len(), 2);

    let first = engine.validate_page(&schema, 0, &FormData::new());
    assert_eq!(fields(&first), vec!["username", "password"]);

    let second = engine.validate_page(&schema, 1, &FormData::new());
    assert_eq!(fields(&second), vec!["terms"]);
    assert_eq!(second[0].message, "Accept terms is invalid");

    assert!(engine.validate_page(&schema, 7, &FormData::new()).is_empty());
}

#[test]
fn translator_only_changes_text() {
    let schema = simple_form();
    let snapshot = data(json!({ "age": 10 }));
    let table = formio_spec::TranslationTable::new()
        .with("validation.REQUIRED", "{field} ist erforderlich")
        .with("validation.MIN_VALUE", "Mindestwert ist {min}");
    let plain = validate_form(&schema.components, &snapshot);
    let german = Engine::default()
        .with_translator(table)
        .validate_form(&schema.components, &snapshot);
    assert_eq!(fields(&plain), fields(&german));
    assert_eq!(german[0].message, "Name ist erforderlich");
    assert_eq!(german[1].message, "Mindestwert ist 18");
}

#[test]
fn schema_anomalies_still_produce_errors() {
    let schema = FormSchema::from_json_str(
        r#"{
            "components": [
                { "type": "panel", "key": null, "hidden": null, "components": {} },
                { "type": "textfield", "key": "name", "required": true, "hidden": null },
                { "type": "columns", "columns": [ { "components": "none" } ] },
                { "type": "textfield", "key": "note", "required": null }
            ]
        }"#,
    )
    .expect("lenient schema");
    assert_eq!(schema.components.len(), 4);
    assert!(schema.components[0].components.is_empty());

    let errors = validate_form(&schema.components, &FormData::new());
    assert_eq!(fields(&errors), vec!["name"]);

    let bare = FormSchema::from_json_str(r#"{ "components": { "oops": true } }"#)
        .expect("lenient schema");
    assert!(bare.components.is_empty());
    assert!(validate_form(&bare.components, &FormData::new()).is_empty());
}
