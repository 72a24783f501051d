//! Integration tests for structure resolution and state projection.

use schema_form::{
    expand, filter_empty, project_errors, project_metas, project_values, resolve, DirtySet,
    RequiredPaths, SchemaResolutionError,
};
use serde_json::{json, Value};

fn required_of(schema: Value, ui: Value) -> Vec<String> {
    resolve(&schema, &ui)
        .unwrap()
        .required
        .iter()
        .cloned()
        .collect()
}

// === Composition ===

mod composition {
    use super::*;

    #[test]
    fn refs_are_inlined() {
        let schema = json!({
            "definitions": {
                "address": {
                    "type": "object",
                    "required": ["city"],
                    "properties": { "city": { "type": "string" } }
                }
            },
            "type": "object",
            "properties": {
                "home": { "$ref": "#/definitions/address" },
                "work": { "$ref": "#/definitions/address", "title": "Work" }
            }
        });
        let structure = resolve(&schema, &json!({})).unwrap();
        assert!(structure.schema.at("home.city").is_some());
        assert_eq!(structure.schema.at("work").unwrap().title.as_deref(), Some("Work"));
        assert_eq!(
            structure.required.iter().cloned().collect::<Vec<_>>(),
            vec!["home.city", "work.city"]
        );
    }

    #[test]
    fn circular_ref_is_fatal() {
        let schema = json!({
            "definitions": { "node": { "$ref": "#/definitions/node" } },
            "type": "object",
            "properties": { "root": { "$ref": "#/definitions/node" } }
        });
        let err = resolve(&schema, &json!({})).unwrap_err();
        assert!(matches!(err, SchemaResolutionError::CircularRef { .. }));
        assert!(err.path().starts_with("/properties/root"));
    }

    #[test]
    fn dangling_ref_names_pointer() {
        let schema = json!({
            "type": "object",
            "properties": { "a": { "$ref": "#/definitions/nope" } }
        });
        let err = resolve(&schema, &json!({})).unwrap_err();
        assert!(matches!(err, SchemaResolutionError::UnresolvedRef { .. }));
        assert_eq!(err.path(), "/properties/a/$ref");
    }

    #[test]
    fn all_of_merges_properties_and_required() {
        let schema = json!({
            "allOf": [
                { "type": "object", "required": ["a"], "properties": { "a": { "type": "string" } } },
                { "required": ["b"], "properties": { "b": { "type": "integer" } } }
            ]
        });
        let structure = resolve(&schema, &json!({})).unwrap();
        assert_eq!(structure.schema.at("b").unwrap().type_name(), "integer");
        assert!(structure.required.contains("a"));
        assert!(structure.required.contains("b"));
    }

    #[test]
    fn one_of_selected_by_ui_branch() {
        let schema = json!({
            "type": "object",
            "properties": {
                "contact": {
                    "oneOf": [
                        { "type": "object", "properties": { "email": { "type": "string" } } },
                        { "type": "object", "properties": { "phone": { "type": "string" } } }
                    ]
                }
            }
        });
        let first = resolve(&schema, &json!({})).unwrap();
        assert!(first.schema.at("contact.email").is_some());

        let second = resolve(&schema, &json!({"contact": {"ui:branch": 1}})).unwrap();
        assert!(second.schema.at("contact.phone").is_some());
        assert!(second.schema.at("contact.email").is_none());
    }

    #[test]
    fn condition_uses_defaults() {
        let schema = json!({
            "type": "object",
            "properties": { "kind": { "type": "string", "default": "company" } },
            "if": { "properties": { "kind": { "const": "company" } } },
            "then": { "properties": { "vat": { "type": "string" } } },
            "else": { "properties": { "birthday": { "type": "string" } } }
        });
        let structure = resolve(&schema, &json!({})).unwrap();
        assert!(structure.schema.at("vat").is_some());
        assert!(structure.schema.at("birthday").is_none());
    }
}

// === Required Index ===

mod required_index {
    use super::*;

    #[test]
    fn array_items_use_wildcards() {
        let required = required_of(
            json!({
                "type": "object",
                "properties": {
                    "tags": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "required": ["label"],
                            "properties": { "label": { "type": "string" } }
                        }
                    }
                }
            }),
            json!({}),
        );
        assert_eq!(required, vec!["tags[].label"]);
    }

    #[test]
    fn draft3_required_flag() {
        let required = required_of(
            json!({
                "type": "object",
                "properties": { "name": { "type": "string", "required": true } }
            }),
            json!({}),
        );
        assert_eq!(required, vec!["name"]);
    }

    #[test]
    fn hidden_fields_are_not_visible_requirements() {
        let structure = resolve(
            &json!({
                "type": "object",
                "properties": {
                    "a": {
                        "type": "object",
                        "required": ["b", "c"],
                        "properties": { "b": { "type": "string" }, "c": { "type": "string" } }
                    }
                }
            }),
            &json!({"a": {"c": {"ui:widget": "hidden"}}}),
        )
        .unwrap();
        assert_eq!(structure.required_and_visible(), vec!["a.b"]);
    }
}

// === Projection ===

mod projection {
    use super::*;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": { "type": "string" },
                "age": { "type": "integer", "default": 30 },
                "tags": { "type": "array", "items": { "type": "string" } },
                "address": {
                    "type": "object",
                    "properties": { "city": { "type": "string" } }
                }
            }
        })
    }

    #[test]
    fn projection_is_idempotent() {
        let structure = resolve(&schema(), &json!({})).unwrap();
        let inputs = [
            json!({}),
            json!(null),
            json!({"name": "Ann", "tags": ["a"], "extra": 1}),
            json!({"address": [1, 2], "age": null}),
        ];
        for raw in inputs {
            let once = project_values(&raw, &structure.schema);
            assert_eq!(project_values(&once, &structure.schema), once, "input {}", raw);
        }
    }

    #[test]
    fn errors_metas_and_values_are_parallel() {
        let structure = resolve(&schema(), &json!({})).unwrap();
        let values = project_values(&json!({"tags": ["a", "b"]}), &structure.schema);
        let metas = project_metas(&values, &structure.schema, &structure.ui_schema);
        let errors = project_errors(&json!({}), &structure.schema);
        for leaf in ["name", "age", "tags", "address.city"] {
            assert!(schema_form::path::get(&values, leaf).is_some(), "{}", leaf);
            assert!(schema_form::path::get(&metas, leaf).is_some(), "{}", leaf);
            assert!(errors.get(leaf).is_some(), "{}", leaf);
        }
        assert_eq!(metas["tags"], json!([{}, {}]));
    }
}

// === Propagation ===

mod propagation {
    use super::*;

    #[test]
    fn expand_includes_ancestors_not_siblings() {
        for name in ["a", "a.b", "a.b.c", "list.3.item"] {
            let dirty = expand(name);
            assert!(dirty.contains(name));
            for ancestor in schema_form::path::ancestors(name) {
                assert!(dirty.contains(&ancestor), "{} missing {}", name, ancestor);
            }
            assert!(!dirty.contains("sibling"));
            assert!(!dirty.contains(&format!("{}.child", name)));
        }
    }

    #[test]
    fn all_request_is_all() {
        assert_eq!(expand(schema_form::UpdateRequest::All), DirtySet::All);
    }
}

// === Filtering ===

mod filtering {
    use super::*;

    #[test]
    fn filter_empty_without_required() {
        let values = json!({"a": "", "b": {"c": []}, "d": "k"});
        assert_eq!(filter_empty(&values, &RequiredPaths::default()), json!({"d": "k"}));
    }

    #[test]
    fn filter_empty_keeps_required_branch() {
        let values = json!({"a": "", "b": {"c": []}, "d": "k"});
        let required: RequiredPaths = ["b.c"].into_iter().collect();
        assert_eq!(filter_empty(&values, &required), json!({"b": {"c": []}, "d": "k"}));
    }
}
