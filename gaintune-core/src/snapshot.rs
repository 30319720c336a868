use std::path::Path;

use config::{load_params_file, merge_node_params, save_params_file, ConfigError, TuningConfig};
use indexmap::IndexMap;

use crate::client::ParamClient;

/// Raw (remote-unit) current values for one group. Parameters whose read
/// fails are skipped; a sentinel must never reach the persisted file.
pub fn snapshot_group(
    client: &ParamClient,
    config: &TuningConfig,
    group: &str,
) -> IndexMap<String, f64> {
    let mut values = IndexMap::new();
    if let Some(group_cfg) = config.group(group) {
        for param in group_cfg.params.keys() {
            if let Ok(value) = client.get(group, param, false) {
                values.insert(param.clone(), value);
            }
        }
    }
    values
}

/// Reads every tracked parameter's raw value and folds it into the
/// persisted document at `path`. A pre-existing document is loaded first so
/// top-level entries for other nodes survive the merge unchanged.
pub fn save_params(
    client: &ParamClient,
    config: &TuningConfig,
    path: &Path,
) -> Result<(), ConfigError> {
    let mut doc = load_params_file(path)?;
    for (group_name, group) in &config.groups {
        let values = snapshot_group(client, config, group_name);
        merge_node_params(&mut doc, &group.node, &values);
    }
    save_params_file(path, &doc)
}
