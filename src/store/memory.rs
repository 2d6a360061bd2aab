use std::sync::Mutex;

use async_trait::async_trait;

use super::{RecordFilter, RecordStore, StoreError};
use crate::model::attendance::{CanonicalRecord, StoredRecord};

/// Vec-backed store used by handler and pipeline tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<StoredRecord>>,
}

impl MemoryStore {
    pub fn with_records(records: Vec<CanonicalRecord>) -> Self {
        let rows = records
            .into_iter()
            .enumerate()
            .map(|(i, record)| StoredRecord {
                id: i as u64 + 1,
                record,
            })
            .collect();
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("memory store poisoned").len()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn get_or_create(
        &self,
        record: CanonicalRecord,
    ) -> Result<(StoredRecord, bool), StoreError> {
        let mut rows = self.rows.lock().expect("memory store poisoned");
        if let Some(existing) = rows.iter().find(|r| {
            r.record.employee_name == record.employee_name
                && r.record.work_date == record.work_date
        }) {
            return Ok((existing.clone(), false));
        }
        let stored = StoredRecord {
            id: rows.len() as u64 + 1,
            record,
        };
        rows.push(stored.clone());
        Ok((stored, true))
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>, StoreError> {
        let rows = self.rows.lock().expect("memory store poisoned");
        Ok(rows
            .iter()
            .filter(|r| filter.matches(&r.record))
            .cloned()
            .collect())
    }
}
