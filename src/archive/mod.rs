//! Archive access and record selection.

mod error;
mod traits;
mod tweets_js;

pub use error::{ArchiveError, ArchiveResult};
pub use traits::{Archive, CandidateRecord, StaticArchive, select_unengaged};
pub use tweets_js::TweetsJsArchive;
