use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use cap_core::errors::{CapError, ErrorInfo};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;
use crate::store::{Configuration, Strictness};
use crate::value::ParamValue;

fn config_error(code: &str, err: impl ToString) -> CapError {
    CapError::Config(ErrorInfo::new(code, err.to_string()))
}

/// On-disk YAML layout of a configuration: parameters grouped by task path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigFile {
    /// Duplicate-key policy for parameters added after loading.
    #[serde(default)]
    pub strictness: Strictness,
    /// Parameters keyed by path (`""` is the root), then by name.
    #[serde(default)]
    pub parameters: BTreeMap<String, BTreeMap<String, ParamValue>>,
}

impl ConfigFile {
    /// Parses a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, CapError> {
        serde_yaml::from_str(contents).map_err(|err| config_error("config-parse", err))
    }

    /// Reads and parses a YAML file.
    pub fn load(path: &Path) -> Result<Self, CapError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            CapError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Converts into a [`Configuration`]; later duplicates cannot occur since
    /// keys are map keys.
    pub fn into_configuration(self) -> Result<Configuration, CapError> {
        let mut config = Configuration::with_strictness(self.strictness);
        for (path, params) in self.parameters {
            let scope = Scope::from_path(&path)?;
            for (name, value) in params {
                config.set_parameter(&scope, &name, value);
            }
        }
        Ok(config)
    }

    /// Captures a configuration in file form.
    pub fn from_configuration(config: &Configuration) -> Self {
        Self {
            strictness: config.strictness(),
            parameters: config.entries().clone(),
        }
    }

    /// Serializes to YAML.
    pub fn to_yaml_string(&self) -> Result<String, CapError> {
        serde_yaml::to_string(self).map_err(|err| config_error("config-serialize", err))
    }
}

/// Loads a YAML configuration file.
pub fn load_configuration(path: &Path) -> Result<Configuration, CapError> {
    ConfigFile::load(path)?.into_configuration()
}

/// Writes a configuration to a YAML file.
pub fn write_configuration(config: &Configuration, path: &Path) -> Result<(), CapError> {
    let yaml = ConfigFile::from_configuration(config).to_yaml_string()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| config_error("config-mkdir", err))?;
    }
    fs::write(path, yaml).map_err(|err| {
        CapError::Config(
            ErrorInfo::new("config-write", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })
}
