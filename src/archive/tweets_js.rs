use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;

use super::{
    error::{ArchiveError, ArchiveResult},
    traits::{Archive, CandidateRecord},
};
use crate::config::{ArchiveConfig, SelectionConfig};

/// Reads `tweets.js` from an extracted archive export.
///
/// The export wraps a JSON array in a JavaScript assignment
/// (`window.YTD.tweets.part0 = [...]`); a plain JSON array is accepted too.
/// Numeric fields are strings in the export but integers are tolerated.
///
/// Entries without a usable id or with an unreadable like count are skipped:
/// a record whose engagement is unknown is never selected for deletion.
pub struct TweetsJsArchive {
    path: PathBuf,
    include_retweets: bool,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawEntry {
    Wrapped { tweet: RawTweet },
    Bare(RawTweet),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct RawTweet {
    id_str: Option<RawCount>,
    id: Option<RawCount>,
    favorite_count: Option<RawCount>,
    retweet_count: Option<RawCount>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawCount {
    Number(u64),
    Text(String),
    /// Negative, fractional or non-scalar values.
    Other(serde_json::Value),
}

impl RawCount {
    fn value(&self) -> Option<u64> {
        match self {
            RawCount::Number(n) => Some(*n),
            RawCount::Text(s) => s.trim().parse().ok(),
            RawCount::Other(_) => None,
        }
    }

    fn text(&self) -> Option<String> {
        match self {
            RawCount::Number(n) => Some(n.to_string()),
            RawCount::Text(s) => Some(s.trim().to_string()),
            RawCount::Other(_) => None,
        }
    }
}

impl TweetsJsArchive {
    pub fn new(path: impl Into<PathBuf>, include_retweets: bool) -> Self {
        Self {
            path: path.into(),
            include_retweets,
        }
    }

    pub fn from_config(archive: &ArchiveConfig, selection: &SelectionConfig) -> Self {
        Self::new(archive.path.clone(), selection.include_retweets)
    }

    /// Resolve a directory to the `tweets.js` file inside it.
    fn resolve(&self) -> ArchiveResult<PathBuf> {
        if self.path.is_file() {
            return Ok(self.path.clone());
        }
        if self.path.is_dir() {
            for candidate in ["data/tweets.js", "tweets.js"] {
                let path = self.path.join(candidate);
                if path.is_file() {
                    return Ok(path);
                }
            }
        }
        Err(ArchiveError::NotFound(self.path.clone()))
    }

    fn parse(&self, path: &Path, contents: &str) -> ArchiveResult<Vec<CandidateRecord>> {
        let entries: Vec<RawEntry> =
            serde_json::from_str(strip_assignment(contents)).map_err(|source| {
                ArchiveError::Parse {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        let total = entries.len();
        let records: Vec<_> = entries
            .into_iter()
            .filter_map(|entry| self.to_record(entry))
            .collect();

        let skipped = total - records.len();
        if skipped > 0 {
            tracing::warn!(skipped, "Skipped archive entries without a usable id or like count");
        }

        Ok(records)
    }

    fn to_record(&self, entry: RawEntry) -> Option<CandidateRecord> {
        let tweet = match entry {
            RawEntry::Wrapped { tweet } => tweet,
            RawEntry::Bare(tweet) => tweet,
            RawEntry::Other(_) => return None,
        };

        let id = tweet
            .id_str
            .as_ref()
            .and_then(RawCount::text)
            .or_else(|| tweet.id.as_ref().and_then(RawCount::text))
            .filter(|id| !id.is_empty() && !id.contains([',', '"', '\n', '\r']))?;

        let mut engagement = tweet.favorite_count.as_ref()?.value()?;
        if self.include_retweets {
            engagement = engagement.saturating_add(tweet.retweet_count.as_ref()?.value()?);
        }

        Some(CandidateRecord::new(id, engagement))
    }
}

/// Drop a leading `window.YTD.<name>.part0 =` assignment if present.
fn strip_assignment(contents: &str) -> &str {
    let trimmed = contents.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with('[') {
        return trimmed;
    }
    match (trimmed.find('='), trimmed.find('[')) {
        (Some(eq), Some(bracket)) if eq < bracket => &trimmed[eq + 1..],
        _ => trimmed,
    }
}

#[async_trait]
impl Archive for TweetsJsArchive {
    async fn records(&self) -> ArchiveResult<Vec<CandidateRecord>> {
        let path = self.resolve()?;
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| ArchiveError::Io {
                path: path.clone(),
                source,
            })?;

        let records = self.parse(&path, &contents)?;
        tracing::debug!(path = ?path, records = records.len(), "Loaded archive");
        Ok(records)
    }
}
