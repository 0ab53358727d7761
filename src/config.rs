//! Node configuration.
//!
//! Loaded from a JSON file; every section falls back to its defaults when
//! omitted.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;
use crate::ledger::AccountId;
use crate::vote::dividend::DividendTargets;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Parameter values this validator votes for.
    pub voting: DividendTargets,
    pub change: ChangeConfig,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChangeConfig {
    /// Protocol root account, never paid a dividend.
    pub root_account: AccountId,
}

impl NodeConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&contents)?;
        info!(path = %path.display(), "loaded config");
        Ok(config)
    }
}
