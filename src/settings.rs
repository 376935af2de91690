use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::Result;
use crate::persist::PersistenceMode;

/// What an ancestor walk does when a parent key points at a row that was
/// not fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrokenLinkPolicy {
    /// Report a broken reference carrying the keys resolved so far.
    #[default]
    Fail,
    /// Stop at the broken link and return the partial chain.
    Truncate,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broken_links: BrokenLinkPolicy,
    pub database: Option<String>,
    pub log_queries: bool,
}

impl Settings {
    /// Reads `path` (any format the config crate recognizes by extension,
    /// missing file allowed) and then `ARBOR_*` environment variables.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix("ARBOR"))
            .build()?
            .try_deserialize()?;
        Ok(settings)
    }
    pub fn persistence_mode(&self) -> PersistenceMode {
        match &self.database {
            Some(path) => PersistenceMode::File(path.clone()),
            None => PersistenceMode::InMemory,
        }
    }
}
