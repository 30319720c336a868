use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::path::Path;

use crate::ConfigError;

/// Nesting key the control node expects when the saved file is fed back as
/// its startup parameter set.
pub const PARAMS_KEY: &str = "ros__parameters";

pub fn strip_node_name(node: &str) -> &str {
    node.trim_start_matches('/')
}

/// Loads a persisted parameter document, or an empty one when the file does
/// not exist yet.
pub fn load_params_file<P: AsRef<Path>>(path: P) -> Result<Mapping, ConfigError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Mapping::new());
    }
    let text = std::fs::read_to_string(path)?;
    if text.trim().is_empty() {
        return Ok(Mapping::new());
    }
    match serde_yaml::from_str::<Value>(&text)? {
        Value::Mapping(doc) => Ok(doc),
        _ => Err(ConfigError::NotAMapping(path.display().to_string())),
    }
}

pub fn save_params_file<P: AsRef<Path>>(path: P, doc: &Mapping) -> Result<(), ConfigError> {
    let text = serde_yaml::to_string(doc)?;
    std::fs::write(path, text)?;
    Ok(())
}

/// Folds one node's values into the document under the stripped node name.
/// Existing entries are updated in place; top-level keys and nested values
/// absent from `values` are left untouched.
pub fn merge_node_params(doc: &mut Mapping, node: &str, values: &IndexMap<String, f64>) {
    let node_key = Value::from(strip_node_name(node));
    if doc.get(&node_key).map_or(true, |v| !v.is_mapping()) {
        doc.insert(node_key.clone(), Value::Mapping(Mapping::new()));
    }
    let record = match doc.get_mut(&node_key) {
        Some(Value::Mapping(record)) => record,
        _ => return,
    };

    let params_key = Value::from(PARAMS_KEY);
    if record.get(&params_key).map_or(true, |v| !v.is_mapping()) {
        record.insert(params_key.clone(), Value::Mapping(Mapping::new()));
    }
    let params = match record.get_mut(&params_key) {
        Some(Value::Mapping(params)) => params,
        _ => return,
    };

    for (name, value) in values {
        params.insert(Value::from(name.as_str()), Value::from(*value));
    }
}
