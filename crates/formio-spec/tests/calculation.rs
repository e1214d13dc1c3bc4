use serde_json::{Value, json};

use formio_spec::{
    ComponentNode, Engine, EngineConfig, FormData, FormSchema, data_from_value, run_calculations,
};

fn components(value: Value) -> Vec<ComponentNode> {
    serde_json::from_value(value).unwrap()
}

fn data(value: Value) -> FormData {
    data_from_value(value).unwrap()
}

#[test]
fn sum_is_assigned_to_value() {
    let nodes = components(json!([
        { "type": "number", "key": "total", "calculateValue": "value = data.a + data.b" }
    ]));
    let result = run_calculations(&nodes, &data(json!({ "a": 2, "b": 3 })));
    assert_eq!(result.get("total"), Some(&json!(5)));
    assert_eq!(result.get("a"), Some(&json!(2)));
}

#[test]
fn calculation_is_idempotent_for_acyclic_forms() {
    let schema = FormSchema::from_json_str(include_str!("fixtures/order_form.json")).unwrap();
    let snapshot = data(json!({
        "lines": [
            { "item": "Pen", "qty": 2, "price": 1.5 },
            { "item": "Book", "qty": 1, "price": 12 }
        ]
    }));
    let once = run_calculations(&schema.components, &snapshot);
    let twice = run_calculations(&schema.components, &once);
    assert_eq!(once, twice);

    assert_eq!(once["lines"][0]["amount"], json!(3));
    assert_eq!(once["lines"][1]["amount"], json!(12));
    assert_eq!(once["subtotal"], json!(15));
    assert_eq!(once["total"], json!(18));
}

#[test]
fn outcome_reports_passes_and_convergence() {
    let schema = FormSchema::from_json_str(include_str!("fixtures/order_form.json")).unwrap();
    let snapshot = data(json!({ "lines": [ { "item": "Pen", "qty": 1, "price": 10 } ] }));
    let outcome = Engine::default().run_calculations(&schema.components, &snapshot);
    assert!(outcome.converged);
    assert_eq!(outcome.passes, 2);
    assert_eq!(outcome.data["total"], json!(12));
}

#[test]
fn cycles_stop_at_the_pass_limit() {
    let nodes = components(json!([
        { "type": "number", "key": "a", "calculateValue": "value = (data.b || 0) + 1" },
        { "type": "number", "key": "b", "calculateValue": "value = (data.a || 0) + 1" }
    ]));
    let outcome = Engine::default().run_calculations(&nodes, &FormData::new());
    assert!(!outcome.converged);
    assert_eq!(outcome.passes, 5);
    assert_eq!(outcome.data["a"], json!(9));
    assert_eq!(outcome.data["b"], json!(10));

    let tight = Engine::new(EngineConfig {
        max_calculation_passes: 2,
        ..EngineConfig::default()
    });
    let outcome = tight.run_calculations(&nodes, &FormData::new());
    assert_eq!(outcome.passes, 2);
    assert_eq!(outcome.data["b"], json!(4));
}

#[test]
fn undefined_result_leaves_value_untouched() {
    let nodes = components(json!([
        { "type": "textfield", "key": "label", "calculateValue": "if (data.first) { value = data.first }" }
    ]));
    let untouched = run_calculations(&nodes, &data(json!({ "label": "manual" })));
    assert_eq!(untouched["label"], json!("manual"));

    let computed = run_calculations(&nodes, &data(json!({ "first": "Ada", "label": "manual" })));
    assert_eq!(computed["label"], json!("Ada"));
}

#[test]
fn non_input_and_keyless_nodes_never_calculate() {
    let nodes = components(json!([
        { "type": "content", "key": "html", "input": false, "calculateValue": "value = 1" },
        { "type": "number", "calculateValue": "value = 2" }
    ]));
    let result = run_calculations(&nodes, &FormData::new());
    assert!(result.is_empty());
}

#[test]
fn input_snapshot_is_not_modified() {
    let nodes = components(json!([
        { "type": "number", "key": "n", "calculateValue": "value = 1" }
    ]));
    let original = FormData::new();
    let result = run_calculations(&nodes, &original);
    assert!(original.is_empty());
    assert_eq!(result["n"], json!(1));
}

#[test]
fn nested_and_column_fields_calculate() {
    let nodes = components(json!([
        {
            "type": "panel", "key": "p", "input": false,
            "components": [
                { "type": "textfield", "key": "upper", "calculateValue": "value = (data.name || '').toUpperCase()" }
            ]
        },
        {
            "type": "columns", "key": "c", "input": false,
            "columns": [
                { "components": [ { "type": "number", "key": "len", "calculateValue": "value = data.upper.length" } ] }
            ]
        }
    ]));
    let result = run_calculations(&nodes, &data(json!({ "name": "ada" })));
    assert_eq!(result["upper"], json!("ADA"));
    assert_eq!(result["len"], json!(3));
}
