//! Filling schema defaults into the request body.

use jsonguard_core::{ExpectsJson, GuardConfig, GuardOutcome, RequestContext};
use serde_json::{json, Value};

fn check(config: GuardConfig, body: &str) -> (Result<GuardOutcome, String>, Option<Value>) {
    let guard = ExpectsJson::new(config).unwrap();
    let mut ctx = RequestContext::new("GET", "/").with_json_body(body);
    let outcome = guard.check(&mut ctx).map_err(|e| e.to_string());
    (outcome, ctx.data().cloned())
}

fn filling(schema: Value) -> GuardConfig {
    GuardConfig::new().schema(schema).fill_defaults(true)
}

#[test]
fn defaults_are_filled() {
    let schema = json!({
        "type": "object",
        "properties": {
            "price": {"type": "number", "default": 5.3},
            "name": {"type": "string", "default": "hubert"},
            "tags": {"type": "array"}
        }
    });
    let (outcome, data) = check(filling(schema), "{}");
    assert_eq!(outcome, Ok(GuardOutcome::Validated));
    assert_eq!(data, Some(json!({"price": 5.3, "name": "hubert"})));
}

#[test]
fn supplied_values_win_over_defaults() {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "default": "hubert"}
        }
    });
    let (outcome, data) = check(filling(schema), r#"{"name": "berta"}"#);
    assert_eq!(outcome, Ok(GuardOutcome::Validated));
    assert_eq!(data, Some(json!({"name": "berta"})));
}

#[test]
fn defaults_get_validated() {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "default": 5}
        }
    });
    let (outcome, data) = check(filling(schema), "{}");
    let message = outcome.unwrap_err();
    assert!(message.contains("5 is not of type 'string'"), "{message}");
    assert_eq!(data, None);
}

#[test]
fn defaults_are_off_by_default() {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "default": 5}
        }
    });
    let (outcome, data) = check(GuardConfig::new().schema(schema), "{}");
    assert_eq!(outcome, Ok(GuardOutcome::Validated));
    assert_eq!(data, Some(json!({})));
}

#[test]
fn string_body_is_rejected_not_defaulted() {
    let schema = json!({
        "type": "object",
        "properties": {
            "name": {"type": "string", "default": "hubert"}
        }
    });
    let (outcome, _) = check(filling(schema), r#""invalid""#);
    assert_eq!(
        outcome.unwrap_err(),
        "'invalid' is not of type 'object'"
    );
}

#[test]
fn default_satisfies_required() {
    let schema = json!({
        "type": "object",
        "required": ["currency"],
        "properties": {
            "currency": {"type": "string", "default": "EUR"}
        }
    });
    let (outcome, data) = check(filling(schema.clone()), "{}");
    assert_eq!(outcome, Ok(GuardOutcome::Validated));
    assert_eq!(data, Some(json!({"currency": "EUR"})));

    let (outcome, _) = check(GuardConfig::new().schema(schema), "{}");
    assert_eq!(outcome.unwrap_err(), "'currency' is a required property");
}

#[test]
fn nested_defaults_are_filled_inside_defaults() {
    let schema = json!({
        "type": "object",
        "properties": {
            "address": {
                "type": "object",
                "default": {},
                "properties": {
                    "city": {"type": "string", "default": "Berlin"},
                    "zip": {"type": "string"}
                }
            }
        }
    });
    let (_, data) = check(filling(schema.clone()), "{}");
    assert_eq!(data, Some(json!({"address": {"city": "Berlin"}})));

    let (_, data) = check(filling(schema), r#"{"address": {"zip": "10115"}}"#);
    assert_eq!(data, Some(json!({"address": {"zip": "10115", "city": "Berlin"}})));
}

#[test]
fn array_items_get_defaults() {
    let schema = json!({
        "type": "object",
        "properties": {
            "lines": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "qty": {"type": "integer", "default": 1}
                    }
                }
            }
        }
    });
    let (_, data) = check(filling(schema), r#"{"lines": [{}, {"qty": 3}]}"#);
    assert_eq!(data, Some(json!({"lines": [{"qty": 1}, {"qty": 3}]})));
}

#[test]
fn tuple_items_get_trailing_defaults() {
    let schema = json!({
        "type": "array",
        "items": [
            {"type": "string"},
            {"type": "integer", "default": 0},
            {"type": "boolean", "default": false}
        ]
    });
    let (_, data) = check(filling(schema.clone()), r#"["a"]"#);
    assert_eq!(data, Some(json!(["a", 0, false])));

    let (_, data) = check(filling(schema), r#"["a", 7]"#);
    assert_eq!(data, Some(json!(["a", 7, false])));
}

#[test]
fn referenced_definitions_get_defaults() {
    let schema = json!({
        "definitions": {
            "line": {
                "type": "object",
                "properties": {
                    "qty": {"type": "integer", "default": 1}
                }
            }
        },
        "type": "object",
        "properties": {
            "first": {"$ref": "#/definitions/line"},
            "second": {"$ref": "#/definitions/line"}
        }
    });
    let (_, data) = check(filling(schema), r#"{"first": {}, "second": {"qty": 2}}"#);
    assert_eq!(data, Some(json!({"first": {"qty": 1}, "second": {"qty": 2}})));
}

#[test]
fn all_of_branches_contribute_defaults() {
    let schema = json!({
        "allOf": [
            {"properties": {"a": {"default": 1}}},
            {"properties": {"b": {"default": 2}}}
        ]
    });
    let (_, data) = check(filling(schema), "{}");
    assert_eq!(data, Some(json!({"a": 1, "b": 2})));
}

#[test]
fn additional_properties_schema_gets_defaults() {
    let schema = json!({
        "type": "object",
        "properties": {"id": {"type": "integer"}},
        "additionalProperties": {
            "type": "object",
            "properties": {"enabled": {"type": "boolean", "default": true}}
        }
    });
    let (_, data) = check(filling(schema), r#"{"id": 1, "feature": {}}"#);
    assert_eq!(data, Some(json!({"id": 1, "feature": {"enabled": true}})));
}

#[test]
fn recursive_default_is_filled_once() {
    let schema = json!({
        "definitions": {
            "node": {
                "type": "object",
                "properties": {
                    "child": {"$ref": "#/definitions/node", "default": {}}
                }
            }
        },
        "$ref": "#/definitions/node"
    });
    let (outcome, data) = check(filling(schema.clone()), "{}");
    assert_eq!(outcome, Ok(GuardOutcome::Validated));
    assert_eq!(data, Some(json!({"child": {}})));

    let (outcome, data) = check(filling(schema), r#"{"child": {"child": {}}}"#);
    assert_eq!(outcome, Ok(GuardOutcome::Validated));
    assert_eq!(data, Some(json!({"child": {"child": {"child": {}}}})));
}

#[test]
fn recursive_tuple_default_is_filled_once() {
    let schema = json!({
        "definitions": {
            "pair": {
                "type": "array",
                "items": [{"type": "integer"}, {"$ref": "#/definitions/pair", "default": [0]}]
            }
        },
        "$ref": "#/definitions/pair"
    });
    let (outcome, data) = check(filling(schema), "[1]");
    assert_eq!(outcome, Ok(GuardOutcome::Validated));
    assert_eq!(data, Some(json!([1, [0]])));
}

#[test]
fn pattern_properties_take_precedence_over_additional_properties() {
    let schema = json!({
        "patternProperties": {
            "^x-": {"type": "object", "properties": {"p": {"default": "pat"}}}
        },
        "additionalProperties": {"type": "object", "properties": {"a": {"default": 1}}}
    });
    let (outcome, data) = check(filling(schema), r#"{"x-foo": {}, "other": {}}"#);
    assert_eq!(outcome, Ok(GuardOutcome::Validated));
    assert_eq!(data, Some(json!({"x-foo": {"p": "pat"}, "other": {"a": 1}})));
}

#[test]
fn every_matching_pattern_contributes_defaults() {
    let schema = json!({
        "properties": {"x-known": {"type": "object"}},
        "patternProperties": {
            "^x-": {"properties": {"p": {"default": 1}}},
            "known$": {"properties": {"q": {"default": 2}}}
        }
    });
    let (_, data) = check(filling(schema), r#"{"x-known": {}}"#);
    assert_eq!(data, Some(json!({"x-known": {"p": 1, "q": 2}})));
}

#[test]
fn if_then_else_branch_gets_defaults() {
    let schema = json!({
        "type": "object",
        "if": {"properties": {"kind": {"const": "a"}}},
        "then": {"properties": {"v": {"default": 1}}},
        "else": {"properties": {"w": {"default": 2}}}
    });
    let (_, data) = check(filling(schema.clone()), r#"{"kind": "a"}"#);
    assert_eq!(data, Some(json!({"kind": "a", "v": 1})));

    let (_, data) = check(filling(schema), r#"{"kind": "b"}"#);
    assert_eq!(data, Some(json!({"kind": "b", "w": 2})));
}

#[test]
fn if_condition_resolves_root_definitions() {
    let schema = json!({
        "definitions": {"premium": {"properties": {"plan": {"const": "premium"}}, "required": ["plan"]}},
        "if": {"$ref": "#/definitions/premium"},
        "then": {"properties": {"quota": {"default": 100}}},
        "else": {"properties": {"quota": {"default": 10}}}
    });
    let (_, data) = check(filling(schema), r#"{"plan": "premium"}"#);
    assert_eq!(data, Some(json!({"plan": "premium", "quota": 100})));
}

#[test]
fn schema_dependencies_get_defaults_when_key_present() {
    let schema = json!({
        "type": "object",
        "dependencies": {
            "card": {"properties": {"currency": {"type": "string", "default": "EUR"}}},
            "iban": ["bic"]
        }
    });
    let (_, data) = check(filling(schema.clone()), r#"{"card": "4111"}"#);
    assert_eq!(data, Some(json!({"card": "4111", "currency": "EUR"})));

    let (_, data) = check(filling(schema), "{}");
    assert_eq!(data, Some(json!({})));
}
