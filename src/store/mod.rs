//! Persistence of canonical records, keyed by employee and date.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::attendance::{CanonicalRecord, StoredRecord};

#[cfg(test)]
pub mod memory;
pub mod mysql;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("stored value could not be decoded: {0}")]
    Decode(String),
}

/// Row selection applied by [`RecordStore::query`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Drop records whose worked time is absent, empty or unreadable.
    pub exclude_absent: bool,
    /// Case-insensitive substring of the employee name.
    pub name_contains: Option<String>,
    /// Case-insensitive prefix of the employee name.
    pub name_prefix: Option<String>,
}

impl RecordFilter {
    pub fn worked_only() -> Self {
        Self {
            exclude_absent: true,
            ..Self::default()
        }
    }

    pub fn matches(&self, record: &CanonicalRecord) -> bool {
        if self.exclude_absent && record.worked.is_absent() {
            return false;
        }
        let name = record.employee_name.to_lowercase();
        if let Some(needle) = &self.name_contains {
            if !name.contains(&needle.to_lowercase()) {
                return false;
            }
        }
        if let Some(prefix) = &self.name_prefix {
            if !name.starts_with(&prefix.to_lowercase()) {
                return false;
            }
        }
        true
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts `record` unless its `(employee_name, work_date)` pair exists.
    /// Returns the stored record and whether this call created it; an
    /// existing record is returned untouched.
    async fn get_or_create(
        &self,
        record: CanonicalRecord,
    ) -> Result<(StoredRecord, bool), StoreError>;

    /// Full scan in insertion order, filtered.
    async fn query(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn worked(name: &str) -> CanonicalRecord {
        CanonicalRecord::worked(
            name,
            NaiveDate::from_ymd_opt(2023, 1, 2),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            3600,
        )
    }

    #[test]
    fn filter_matches_names_case_insensitively() {
        let filter = RecordFilter {
            name_contains: Some("MRA".into()),
            ..RecordFilter::default()
        };
        assert!(filter.matches(&worked("Yasmin Mrabet")));
        assert!(!filter.matches(&worked("Ana")));

        let prefix = RecordFilter {
            name_prefix: Some("yas".into()),
            ..RecordFilter::default()
        };
        assert!(prefix.matches(&worked("Yasmin Mrabet")));
        assert!(!prefix.matches(&worked("Ana Yasmin")));
    }

    #[test]
    fn worked_only_drops_absences() {
        let filter = RecordFilter::worked_only();
        assert!(filter.matches(&worked("Ana")));
        assert!(!filter.matches(&CanonicalRecord::absent("Ana", None)));
    }
}
