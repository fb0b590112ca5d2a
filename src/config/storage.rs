use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Where processed ids are recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Path of the append-only ledger file. Created if missing.
    #[serde(default = "default_ledger_path")]
    pub path: PathBuf,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            path: default_ledger_path(),
        }
    }
}

fn default_ledger_path() -> PathBuf {
    PathBuf::from("deleted_tweets.csv")
}

impl LedgerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.path.as_os_str().is_empty() {
            return Err("ledger.path must not be empty".into());
        }
        Ok(())
    }
}
