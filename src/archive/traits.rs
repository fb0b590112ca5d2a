use async_trait::async_trait;

use super::error::ArchiveResult;

/// A record that may be selected for deletion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateRecord {
    pub id: String,
    pub engagement_count: u64,
}

impl CandidateRecord {
    pub fn new(id: impl Into<String>, engagement_count: u64) -> Self {
        Self {
            id: id.into(),
            engagement_count,
        }
    }
}

/// Read-only source of candidate records, loaded once per run.
#[async_trait]
pub trait Archive: Send + Sync {
    /// All records in archive order.
    async fn records(&self) -> ArchiveResult<Vec<CandidateRecord>>;
}

/// Archive backed by an in-memory list.
#[derive(Debug, Clone, Default)]
pub struct StaticArchive {
    records: Vec<CandidateRecord>,
}

impl StaticArchive {
    pub fn new(records: Vec<CandidateRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl Archive for StaticArchive {
    async fn records(&self) -> ArchiveResult<Vec<CandidateRecord>> {
        Ok(self.records.clone())
    }
}

/// Keep only records nobody engaged with.
pub fn select_unengaged(records: Vec<CandidateRecord>) -> Vec<CandidateRecord> {
    records
        .into_iter()
        .filter(|record| record.engagement_count == 0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_unengaged_keeps_order() {
        let records = vec![
            CandidateRecord::new("A", 0),
            CandidateRecord::new("B", 5),
            CandidateRecord::new("C", 0),
        ];
        let selected = select_unengaged(records);
        let ids: Vec<_> = selected.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["A", "C"]);
    }

    #[tokio::test]
    async fn test_static_archive() {
        let archive = StaticArchive::new(vec![CandidateRecord::new("1", 3)]);
        assert_eq!(archive.records().await.unwrap().len(), 1);
    }
}
