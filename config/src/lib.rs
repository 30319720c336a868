use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod params_file;
pub use params_file::{
    load_params_file, merge_node_params, save_params_file, strip_node_name, PARAMS_KEY,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterGroup {
    pub node: String,
    #[serde(default)]
    pub plot_topics: IndexMap<String, String>,
    #[serde(default)]
    pub params: IndexMap<String, ParameterSpec>,
}

/// Top-level tuning configuration: group name to group, in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TuningConfig {
    pub groups: IndexMap<String, ParameterGroup>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("configuration declares no parameter groups")]
    EmptyGroups,
    #[error("group {group} declares no target node")]
    EmptyNode { group: String },
    #[error("group {group} parameter {param} has a non-finite or zero scale")]
    BadScale { group: String, param: String },
    #[error("params file {0} is not a mapping")]
    NotAMapping(String),
}

impl TuningConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        let config: TuningConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.groups.is_empty() {
            return Err(ConfigError::EmptyGroups);
        }
        for (name, group) in &self.groups {
            if group.node.trim().is_empty() {
                return Err(ConfigError::EmptyNode {
                    group: name.clone(),
                });
            }
            for (param, spec) in &group.params {
                if let Some(scale) = spec.scale {
                    if !scale.is_finite() || scale == 0.0 {
                        return Err(ConfigError::BadScale {
                            group: name.clone(),
                            param: param.clone(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn group(&self, name: &str) -> Option<&ParameterGroup> {
        self.groups.get(name)
    }

    pub fn spec(&self, group: &str, param: &str) -> Option<&ParameterSpec> {
        self.groups.get(group)?.params.get(param)
    }

    pub fn node_of(&self, group: &str) -> Option<&str> {
        self.groups.get(group).map(|g| g.node.as_str())
    }

    pub fn first_group(&self) -> Option<&str> {
        self.groups.keys().next().map(String::as_str)
    }

    /// Distinct target nodes, in declaration order.
    pub fn nodes(&self) -> Vec<&str> {
        let mut nodes = Vec::new();
        for group in self.groups.values() {
            if !nodes.contains(&group.node.as_str()) {
                nodes.push(group.node.as_str());
            }
        }
        nodes
    }
}
