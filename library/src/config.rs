use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::backend::{DEFAULT_NAMESPACE, Namespace};
use crate::error::GearsimError;

pub const CONFIG_FILE_NAME: &str = "gearsim.toml";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CompilerConfig {
    /// Tag on every scalar and expression the compiler creates.
    pub namespace: String,
    /// Prefix of per-node scopes, `{prefix}{index}_`.
    pub scope_prefix: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            scope_prefix: "Node".to_string(),
        }
    }
}

impl CompilerConfig {
    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.namespace.clone())
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct HostConfig {
    pub max_expression_length: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            max_expression_length: 256,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct GearsimConfig {
    pub compiler: CompilerConfig,
    pub host: HostConfig,
}

impl GearsimConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, GearsimError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_toml_string(&self) -> Result<String, GearsimError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn load_from(path: &Path) -> Result<Self, GearsimError> {
        let text = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reads the per-user config file. A missing file yields the defaults; an
    /// unreadable one is reported and also yields the defaults.
    pub fn load() -> Self {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => warn!("Failed to load {}, using defaults: {}", path.display(), e),
                }
            }
        }
        Self::default()
    }

    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "gearsim", "gearsim")
            .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }
}
