use serde_json::{Value, json};

use formio_spec::{ComponentNode, Engine, FormData, FormSchema, data_from_value, evaluate_visibility};

fn node(value: Value) -> ComponentNode {
    serde_json::from_value(value).unwrap()
}

fn data(value: Value) -> FormData {
    data_from_value(value).unwrap()
}

#[test]
fn declarative_conditional_is_symmetric() {
    let shown_when_one = node(json!({
        "type": "textfield", "key": "b",
        "conditional": { "when": "a", "eq": 1, "show": true }
    }));
    let hidden_when_one = node(json!({
        "type": "textfield", "key": "b",
        "conditional": { "when": "a", "eq": 1, "show": false }
    }));

    for (snapshot, matches) in [
        (json!({ "a": 1 }), true),
        (json!({ "a": 1.0 }), true),
        (json!({ "a": 2 }), false),
        (json!({ "a": "1" }), false),
        (json!({}), false),
    ] {
        let snapshot = data(snapshot);
        assert_eq!(evaluate_visibility(&shown_when_one, &snapshot), !matches);
        assert_eq!(evaluate_visibility(&hidden_when_one, &snapshot), matches);
    }
}

#[test]
fn show_defaults_to_true() {
    let field = node(json!({
        "type": "textfield", "key": "b", "conditional": { "when": "a", "eq": "yes" }
    }));
    assert!(!evaluate_visibility(&field, &data(json!({ "a": "yes" }))));
    assert!(evaluate_visibility(&field, &data(json!({ "a": "no" }))));
}

#[test]
fn custom_conditional_assigns_show() {
    let field = node(json!({
        "type": "textfield", "key": "b", "customConditional": "show = data.a === 'x'"
    }));
    assert!(evaluate_visibility(&field, &data(json!({ "a": "y" }))));
    assert!(!evaluate_visibility(&field, &data(json!({ "a": "x" }))));
}

#[test]
fn custom_conditional_can_return_or_use_its_value() {
    let returns = node(json!({
        "type": "textfield", "key": "b", "customConditional": "return data.count > 2;"
    }));
    assert!(evaluate_visibility(&returns, &data(json!({ "count": 1 }))));
    assert!(!evaluate_visibility(&returns, &data(json!({ "count": 3 }))));

    let own_value = node(json!({
        "type": "textfield", "key": "b", "customConditional": "show = value !== 'secret'"
    }));
    assert!(evaluate_visibility(&own_value, &data(json!({ "b": "secret" }))));
    assert!(!evaluate_visibility(&own_value, &data(json!({ "b": "open" }))));
}

#[test]
fn failing_custom_conditional_keeps_field_visible() {
    for code in [
        "show = data.missing.deep",
        "show = (",
        "throw new Error('x')",
        "show = document.cookie",
    ] {
        let field = node(json!({ "type": "textfield", "key": "b", "customConditional": code }));
        assert!(!evaluate_visibility(&field, &FormData::new()), "{code}");
    }
}

#[test]
fn custom_conditional_without_result_hides() {
    let field = node(json!({
        "type": "textfield", "key": "b", "customConditional": "var unused = 1;"
    }));
    assert!(evaluate_visibility(&field, &FormData::new()));
}

#[test]
fn resolved_map_covers_every_keyed_node() {
    let schema = FormSchema::from_json_str(include_str!("fixtures/simple_form.json")).unwrap();
    let engine = Engine::default();

    let email_contact = engine.resolve_visibility(&schema.components, &data(json!({ "contact": "email" })));
    assert_eq!(email_contact.get("phone"), Some(&false));
    assert_eq!(email_contact.get("name"), Some(&true));
    assert_eq!(email_contact.get("notice"), Some(&true));

    let phone_contact = engine.resolve_visibility(&schema.components, &data(json!({ "contact": "phone" })));
    assert_eq!(phone_contact.get("phone"), Some(&true));
}

#[test]
fn util_object_is_available_to_scripts() {
    let field = node(json!({
        "type": "textfield", "key": "b", "customConditional": "show = util.region === 'eu'"
    }));
    let eu = Engine::default().with_util(json!({ "region": "eu" }));
    let us = Engine::default().with_util(json!({ "region": "us" }));
    assert!(!eu.evaluate_visibility(&field, &FormData::new()));
    assert!(us.evaluate_visibility(&field, &FormData::new()));
}
