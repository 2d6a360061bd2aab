use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use futures::TryStreamExt;
use sqlx::{FromRow, MySqlPool};
use tracing::{debug, warn};

use super::{RecordFilter, RecordStore, StoreError};
use crate::model::attendance::{CanonicalRecord, StoredRecord};
use crate::pipeline::duration::{ABSENCE_SENTINEL, WorkDuration, format_hms, parse_lenient};
use crate::utils::cipher::FieldCipher;

const STORED_DATE_FORMAT: &str = "%Y-%m-%d";

/// Every text column except `record_key` holds a [`FieldCipher`] envelope.
#[derive(Debug, FromRow)]
struct AttendanceRow {
    id: u64,
    nom: String,
    date: Option<String>,
    entree: Option<String>,
    sortie: Option<String>,
    travail: Option<String>,
    travail_cumulee: Option<String>,
}

const SELECT_COLUMNS: &str =
    "SELECT id, nom, date, entree, sortie, travail, travail_cumulee FROM attendance_records";

pub struct MySqlRecordStore {
    pool: MySqlPool,
    cipher: FieldCipher,
}

impl MySqlRecordStore {
    pub fn new(pool: MySqlPool, cipher: FieldCipher) -> Self {
        Self { pool, cipher }
    }

    fn seal(&self, plaintext: &str) -> Result<String, StoreError> {
        self.cipher
            .encrypt(plaintext)
            .map_err(|e| StoreError::Decode(e.to_string()))
    }

    fn open(&self, column: &str, stored: Option<&str>) -> Result<Option<String>, StoreError> {
        stored
            .map(|s| {
                self.cipher
                    .decrypt(s)
                    .map_err(|e| StoreError::Decode(format!("{column}: {e}")))
            })
            .transpose()
    }

    fn decode(&self, row: AttendanceRow) -> Result<StoredRecord, StoreError> {
        let employee_name = self.open("nom", Some(&row.nom))?.unwrap_or_default();

        let work_date = self
            .open("date", row.date.as_deref())?
            .and_then(|text| match NaiveDate::parse_from_str(&text, STORED_DATE_FORMAT) {
                Ok(d) => Some(d),
                Err(_) => {
                    warn!(id = row.id, value = %text, "unreadable stored date");
                    None
                }
            });

        let travail = self.open("travail", row.travail.as_deref())?;
        let worked = parse_lenient(travail.as_deref());
        if worked.malformed {
            warn!(id = row.id, value = ?travail, "unreadable stored work time, counted as absence");
        }

        let cumul = self.open("travail_cumulee", row.travail_cumulee.as_deref())?;
        let cumulative = parse_lenient(cumul.as_deref()).value.seconds();

        let (entry_time, exit_time) = match worked.value {
            WorkDuration::Absent => (None, None),
            WorkDuration::Worked(_) => (
                stored_time(self.open("entree", row.entree.as_deref())?),
                stored_time(self.open("sortie", row.sortie.as_deref())?),
            ),
        };

        Ok(StoredRecord {
            id: row.id,
            record: CanonicalRecord {
                employee_name,
                work_date,
                entry_time,
                exit_time,
                worked: worked.value,
                cumulative,
            },
        })
    }

    async fn fetch_by_key(&self, key: &str) -> Result<StoredRecord, StoreError> {
        let sql = format!("{SELECT_COLUMNS} WHERE record_key = ?");
        let row = sqlx::query_as::<_, AttendanceRow>(&sql)
            .bind(key)
            .fetch_one(&self.pool)
            .await?;
        self.decode(row)
    }
}

fn stored_time(text: Option<String>) -> Option<NaiveTime> {
    text.filter(|t| t != ABSENCE_SENTINEL)
        .and_then(|t| NaiveTime::parse_from_str(&t, "%H:%M:%S").ok())
}

#[async_trait]
impl RecordStore for MySqlRecordStore {
    async fn get_or_create(
        &self,
        record: CanonicalRecord,
    ) -> Result<(StoredRecord, bool), StoreError> {
        let date_text = record
            .work_date
            .map(|d| d.format(STORED_DATE_FORMAT).to_string());
        let key = self
            .cipher
            .blind_index(&[&record.employee_name, date_text.as_deref().unwrap_or("")]);

        let result = sqlx::query(
            r#"
            INSERT INTO attendance_records
            (record_key, nom, date, entree, sortie, travail, travail_cumulee)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&key)
        .bind(self.seal(&record.employee_name)?)
        .bind(date_text.as_deref().map(|d| self.seal(d)).transpose()?)
        .bind(self.seal(&record.entry_text())?)
        .bind(self.seal(&record.exit_text())?)
        .bind(self.seal(&record.worked.to_string())?)
        .bind(self.seal(&format_hms(record.cumulative))?)
        .execute(&self.pool)
        .await;

        match result {
            Ok(res) => Ok((
                StoredRecord {
                    id: res.last_insert_id(),
                    record,
                },
                true,
            )),
            Err(sqlx::Error::Database(db_err)) if db_err.code().as_deref() == Some("23000") => {
                debug!(employee = %record.employee_name, date = ?record.work_date, "record already stored");
                Ok((self.fetch_by_key(&key).await?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn query(&self, filter: &RecordFilter) -> Result<Vec<StoredRecord>, StoreError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY id");
        let mut stream = sqlx::query_as::<_, AttendanceRow>(&sql).fetch(&self.pool);

        let mut records = Vec::new();
        while let Some(row) = stream.try_next().await? {
            let stored = self.decode(row)?;
            if filter.matches(&stored.record) {
                records.push(stored);
            }
        }

        debug!(count = records.len(), ?filter, "records scanned");
        Ok(records)
    }
}
