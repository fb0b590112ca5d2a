use std::collections::HashMap;

use super::traits::{LedgerEntry, LoadStats, reader_builder};

/// In-memory view of a ledger: O(1) membership plus chronological order.
#[derive(Debug, Default)]
pub(crate) struct LedgerIndex {
    positions: HashMap<String, usize>,
    entries: Vec<LedgerEntry>,
}

impl LedgerIndex {
    /// Decode a persisted ledger, skipping malformed records.
    ///
    /// Blank lines are ignored. The first occurrence of an id wins; later
    /// duplicates are counted and dropped.
    pub(crate) fn parse(contents: &[u8]) -> (Self, LoadStats) {
        let mut index = Self::default();
        let mut stats = LoadStats::default();
        let mut reader = reader_builder().from_reader(contents);

        for result in reader.records() {
            let decoded = match result {
                Ok(record) => {
                    let line = record.position().map(|p| p.line());
                    LedgerEntry::from_record(&record)
                        .map_err(|e| (line, e.to_string()))
                }
                Err(e) => Err((e.position().map(|p| p.line()), e.to_string())),
            };

            match decoded {
                Ok(entry) => {
                    if !index.insert(entry) {
                        stats.duplicates += 1;
                    }
                }
                Err((line, error)) => {
                    stats.malformed += 1;
                    tracing::warn!(line = ?line, error = %error, "Skipping malformed ledger record");
                }
            }
        }

        stats.entries = index.len();
        (index, stats)
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Insert an entry; returns false if the id is already present.
    pub(crate) fn insert(&mut self, entry: LedgerEntry) -> bool {
        if self.positions.contains_key(&entry.id) {
            return false;
        }
        self.positions.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    #[cfg(test)]
    pub(crate) fn get(&self, id: &str) -> Option<&LedgerEntry> {
        self.positions.get(id).map(|&pos| &self.entries[pos])
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }
}
