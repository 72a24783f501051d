//! Submit-time value filtering and required-field checks.

use serde_json::{Map, Value};

use crate::path;
use crate::resolver::{RequiredPaths, Structure};
use crate::types::{is_empty_value, UI_DISABLED};

/// Drop values whose meta is flagged `ui:disabled`.
pub fn filter_disabled(values: &Value, metas: &Value) -> Value {
    match values {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let meta = metas.get(key).unwrap_or(&Value::Null);
                if disabled_flag(meta) {
                    continue;
                }
                out.insert(key.clone(), filter_disabled(value, meta));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            let out = items
                .iter()
                .enumerate()
                .filter_map(|(i, value)| {
                    let meta = metas.get(i).unwrap_or(&Value::Null);
                    (!disabled_flag(meta)).then(|| filter_disabled(value, meta))
                })
                .collect();
            Value::Array(out)
        }
        other => other.clone(),
    }
}

/// Drop empty values unless their path is required.
///
/// Containers left empty by the filtering are dropped too.
pub fn filter_empty(values: &Value, required: &RequiredPaths) -> Value {
    filter_empty_at(values, "", required).unwrap_or_else(|| Value::Object(Map::new()))
}

fn filter_empty_at(value: &Value, name: &str, required: &RequiredPaths) -> Option<Value> {
    let keep = !name.is_empty() && required.contains(name);
    let filtered = match value {
        Value::Object(map) => {
            let out: Map<String, Value> = map
                .iter()
                .filter_map(|(k, v)| {
                    filter_empty_at(v, &path::join(name, k), required).map(|v| (k.clone(), v))
                })
                .collect();
            Value::Object(out)
        }
        Value::Array(items) => {
            let out: Vec<Value> = items
                .iter()
                .enumerate()
                .filter_map(|(i, v)| filter_empty_at(v, &path::join(name, &i.to_string()), required))
                .collect();
            Value::Array(out)
        }
        other => other.clone(),
    };
    if keep || !is_empty_value(&filtered) {
        Some(filtered)
    } else {
        None
    }
}

/// True when the meta at `name`, or at any ancestor, is flagged disabled.
pub fn is_disabled(metas: &Value, name: &str) -> bool {
    let mut chain = vec![name.to_string()];
    chain.extend(path::ancestors(name));
    chain
        .iter()
        .any(|p| path::get(metas, p).is_some_and(disabled_flag))
}

fn disabled_flag(meta: &Value) -> bool {
    match meta.get(UI_DISABLED) {
        Some(Value::Bool(b)) => *b,
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

/// Required, visible, enabled fields whose value is absent or empty.
///
/// Wildcard paths are checked for every array item present.
pub fn missing_required(structure: &Structure, values: &Value, metas: &Value) -> Vec<String> {
    let mut missing = Vec::new();
    for wildcard in structure.required_and_visible() {
        for name in path::concretize(&wildcard, values) {
            if is_disabled(metas, &name) {
                continue;
            }
            if path::get(values, &name).map_or(true, is_empty_value) {
                missing.push(name);
            }
        }
    }
    missing
}
