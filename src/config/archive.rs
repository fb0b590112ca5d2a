use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Location of the archive export.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Path to `tweets.js` from an extracted archive, or a directory
    /// containing `data/tweets.js`.
    #[serde(default = "default_archive_path")]
    pub path: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            path: default_archive_path(),
        }
    }
}

fn default_archive_path() -> PathBuf {
    PathBuf::from("data/tweets.js")
}

/// Which archive records count as having engagement.
///
/// A record is selected for deletion when its engagement count is zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    /// Count retweets as engagement in addition to likes.
    #[serde(default)]
    pub include_retweets: bool,
}
