//! Configuration for a deletion run.
//!
//! The tool is configured via a TOML file, with support for environment
//! variable interpolation using `${VAR_NAME}` syntax so that credentials
//! never have to be written to disk.
//!
//! # Example
//!
//! ```toml
//! [archive]
//! path = "twitter-2021-04-20/data/tweets.js"
//!
//! [rate_limit]
//! window_ms = 900000
//! max_per_window = 450
//!
//! [remote.auth]
//! type = "oauth1"
//! api_key = "${TWITTER_API_KEY}"
//! api_secret = "${TWITTER_API_SECRET_KEY}"
//! access_token = "${TWITTER_ACCESS_TOKEN}"
//! access_token_secret = "${TWITTER_ACCESS_TOKEN_SECRET}"
//! ```

mod archive;
mod limits;
mod observability;
mod remote;
mod run;
mod storage;

use std::path::Path;

pub use archive::*;
pub use limits::*;
pub use observability::*;
pub use remote::*;
pub use run::*;
use serde::{Deserialize, Serialize};
pub use storage::*;

/// Root configuration.
///
/// All sections are optional with defaults matching the remote API's
/// published quota, so a minimal file only needs credentials.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReaperConfig {
    /// Archive export to read records from.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Selection predicate settings.
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Ledger of processed ids.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Remote API quota.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Remote deletion API.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Per-run behaviour.
    #[serde(default)]
    pub run: RunConfig,

    /// Logging.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl ReaperConfig {
    /// Load configuration from a TOML file.
    ///
    /// Environment variables in the format `${VAR_NAME}` are expanded.
    /// Missing variables cause an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e, path.as_ref().to_path_buf()))?;

        Self::from_str(&contents)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(contents: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env_vars(contents)?;
        let config: ReaperConfig = toml::from_str(&expanded).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration for consistency and completeness.
    fn validate(&self) -> Result<(), ConfigError> {
        self.ledger.validate().map_err(ConfigError::Validation)?;
        self.rate_limit.validate().map_err(ConfigError::Validation)?;
        self.remote.validate().map_err(ConfigError::Validation)?;
        Ok(())
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {1}: {0}")]
    Io(std::io::Error, std::path::PathBuf),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Commented starter configuration written by `reaper init`.
pub fn default_config_toml() -> &'static str {
    r#"# reaper configuration

[archive]
# tweets.js from an extracted archive export (or the export directory itself)
path = "data/tweets.js"

[selection]
# Treat retweets as engagement in addition to likes
include_retweets = false

[ledger]
# Append-only record of deleted ids; keeps reruns from repeating work
path = "deleted_tweets.csv"

[rate_limit]
# Remote quota: 450 deletions per 15 minutes
window_ms = 900000
max_per_window = 450

[remote]
base_url = "https://api.twitter.com"
timeout_secs = 30

# OAuth 1.0a user context. Use `type = "bearer"` with `token = "..."` for an
# OAuth 2.0 user token with the tweet.write scope instead.
[remote.auth]
type = "oauth1"
api_key = "${TWITTER_API_KEY}"
api_secret = "${TWITTER_API_SECRET_KEY}"
access_token = "${TWITTER_ACCESS_TOKEN}"
access_token_secret = "${TWITTER_ACCESS_TOKEN_SECRET}"

[run]
dry_run = false
# 0 = no bound beyond the rate limit
max_in_flight = 0

[observability.logging]
level = "info"
format = "compact"
"#
}

/// Expand environment variables in the format `${VAR_NAME}`.
/// Skips commented lines (lines where content before the variable is a comment).
fn expand_env_vars(input: &str) -> Result<String, ConfigError> {
    let re = env_var_pattern();
    let mut result = String::with_capacity(input.len());

    for line in input.lines() {
        // Find if there's a comment on this line
        let comment_pos = line.find('#');

        let mut line_result = String::with_capacity(line.len());
        let mut last_end = 0;

        for cap in re.captures_iter(line) {
            let Some(whole) = cap.get(0) else {
                continue;
            };

            // Skip if this variable is inside a comment
            if let Some(pos) = comment_pos
                && whole.start() >= pos
            {
                continue;
            }

            line_result.push_str(&line[last_end..whole.start()]);

            let var_name = &cap[1];
            let value = std::env::var(var_name)
                .map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
            line_result.push_str(&value);

            last_end = whole.end();
        }

        line_result.push_str(&line[last_end..]);
        result.push_str(&line_result);
        result.push('\n');
    }

    // Remove trailing newline if input didn't have one
    if !input.ends_with('\n') && result.ends_with('\n') {
        result.pop();
    }

    Ok(result)
}

fn env_var_pattern() -> &'static regex::Regex {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"\$\{([^}]+)\}").expect("valid regex"))
}
