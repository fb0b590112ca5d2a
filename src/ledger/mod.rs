//! Durable record of processed record ids.
//!
//! The ledger is what makes a run resumable: every successful remote deletion
//! is appended here before the worker reports success, and the next run skips
//! any id it finds.
//!
//! The on-disk format is an append-only, headerless CSV file with one
//! `id,processedAt` record per entry:
//!
//! ```text
//! 1384583129182347265,2021-04-20T12:30:05.120Z
//! 1384583129182347266,2021-04-20T12:30:07.981Z
//! ```

mod error;
mod file;
mod index;
mod memory;
mod traits;

pub use error::{LedgerError, LedgerResult};
pub use file::FileLedger;
pub use memory::MemoryLedger;
pub use traits::{Ledger, LedgerEntry, LineError, LoadStats};
pub(crate) use traits::validate_id;
