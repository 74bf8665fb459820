//! Process settings, layered from an optional `filecabinet.{toml,json,yaml}`
//! file and `FILECABINET_*` environment variables (e.g.
//! `FILECABINET_STORAGE=file`, `FILECABINET_RULES=custom`).

use std::path::PathBuf;
use std::sync::Arc;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::construct::CabinetConfig;
use crate::error::Result;
use crate::persist::PersistenceMode;
use crate::validation::{load_rule_sets, RuleValidator, ValidationRules};

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Storage {
    Memory,
    File,
}

#[derive(Deserialize, Clone, Debug)]
pub struct Settings {
    pub storage: Storage,
    pub path: PathBuf,
    /// Name of the validation rule set to use.
    pub rules: String,
    /// Optional JSON file with additional or overriding rule sets.
    pub rules_file: Option<PathBuf>,
    pub bind: String,
}

impl Settings {
    /// Reads `filecabinet.*` from the working directory, if present.
    pub fn load() -> Result<Self> {
        Self::from_file("filecabinet")
    }
    pub fn from_file(name: &str) -> Result<Self> {
        let settings = Self::builder()?
            .add_source(File::with_name(name).required(false))
            .add_source(Environment::with_prefix("FILECABINET"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            .set_default("storage", "memory")?
            .set_default("path", "cabinet.db")?
            .set_default("rules", "default")?
            .set_default("bind", "127.0.0.1:8080")?)
    }
    pub fn persistence_mode(&self) -> PersistenceMode {
        match self.storage {
            Storage::Memory => PersistenceMode::InMemory,
            Storage::File => PersistenceMode::File(self.path.clone()),
        }
    }
    pub fn validation_rules(&self) -> Result<ValidationRules> {
        let sets = match &self.rules_file {
            Some(path) => load_rule_sets(path)?,
            None => Default::default(),
        };
        ValidationRules::named(&self.rules, &sets)
    }
    pub fn cabinet_config(&self) -> Result<CabinetConfig> {
        Ok(CabinetConfig::new(Arc::new(RuleValidator::new(self.validation_rules()?))))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            storage: Storage::Memory,
            path: PathBuf::from("cabinet.db"),
            rules: "default".to_string(),
            rules_file: None,
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}
