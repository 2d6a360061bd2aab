use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::pipeline::duration::{ABSENCE_SENTINEL, WorkDuration, format_hms};

/// One employee/date attendance entry.
///
/// `worked` is [`WorkDuration::Absent`] exactly when the entry or exit time is
/// missing, in which case neither time is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRecord {
    pub employee_name: String,
    pub work_date: Option<NaiveDate>,
    pub entry_time: Option<NaiveTime>,
    pub exit_time: Option<NaiveTime>,
    pub worked: WorkDuration,
    /// Running total for the employee, in seconds, stamped by the aggregator.
    pub cumulative: u64,
}

impl CanonicalRecord {
    pub fn worked(
        employee_name: impl Into<String>,
        work_date: Option<NaiveDate>,
        entry_time: NaiveTime,
        exit_time: NaiveTime,
        seconds: u64,
    ) -> Self {
        Self {
            employee_name: employee_name.into(),
            work_date,
            entry_time: Some(entry_time),
            exit_time: Some(exit_time),
            worked: WorkDuration::Worked(seconds),
            cumulative: 0,
        }
    }

    pub fn absent(employee_name: impl Into<String>, work_date: Option<NaiveDate>) -> Self {
        Self {
            employee_name: employee_name.into(),
            work_date,
            entry_time: None,
            exit_time: None,
            worked: WorkDuration::Absent,
            cumulative: 0,
        }
    }

    pub fn entry_text(&self) -> String {
        time_text(self.entry_time)
    }

    pub fn exit_text(&self) -> String {
        time_text(self.exit_time)
    }
}

fn time_text(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| ABSENCE_SENTINEL.to_string())
}

/// A record as held by the store, with its row id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: u64,
    pub record: CanonicalRecord,
}

/// Record as returned by the upload endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "Nom": "Yasmin Mrabet",
    "Date": "2023-12-01",
    "Entrée": "08:00:00",
    "Sortie": "17:00:00",
    "Travail": "09:00:00",
    "Travail Cumulée": "09:00:00"
}))]
pub struct RecordRow {
    #[serde(rename = "Nom")]
    pub nom: String,
    #[serde(rename = "Date")]
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[serde(rename = "Entrée")]
    pub entree: String,
    #[serde(rename = "Sortie")]
    pub sortie: String,
    #[serde(rename = "Travail")]
    pub travail: String,
    #[serde(rename = "Travail Cumulée")]
    pub travail_cumulee: String,
}

impl From<&CanonicalRecord> for RecordRow {
    fn from(rec: &CanonicalRecord) -> Self {
        Self {
            nom: rec.employee_name.clone(),
            date: rec.work_date,
            entree: rec.entry_text(),
            sortie: rec.exit_text(),
            travail: rec.worked.to_string(),
            travail_cumulee: format_hms(rec.cumulative),
        }
    }
}

/// Stored record as listed by `GET /dbbi/all`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AttendanceView {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = "Yasmin Mrabet")]
    pub nom: String,
    #[schema(example = "2023-12-01", value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[schema(example = "08:00:00")]
    pub entree: String,
    #[schema(example = "17:00:00")]
    pub sortie: String,
    #[schema(example = "09:00:00")]
    pub travail: String,
    #[schema(example = "09:00:00")]
    pub travail_cumulee: String,
}

impl From<&StoredRecord> for AttendanceView {
    fn from(stored: &StoredRecord) -> Self {
        let rec = &stored.record;
        Self {
            id: stored.id,
            nom: rec.employee_name.clone(),
            date: rec.work_date,
            entree: rec.entry_text(),
            sortie: rec.exit_text(),
            travail: rec.worked.to_string(),
            travail_cumulee: format_hms(rec.cumulative),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_record_renders_sentinels() {
        let rec = CanonicalRecord::absent("Ana", NaiveDate::from_ymd_opt(2023, 1, 2));
        let row = RecordRow::from(&rec);
        assert_eq!(row.entree, "Abs");
        assert_eq!(row.sortie, "Abs");
        assert_eq!(row.travail, "Abs");
        assert_eq!(row.travail_cumulee, "00:00:00");
    }

    #[test]
    fn record_row_uses_spreadsheet_keys() {
        let rec = CanonicalRecord::worked(
            "Ana",
            NaiveDate::from_ymd_opt(2023, 12, 1),
            NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
            NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            9 * 3600,
        );
        let json = serde_json::to_value(RecordRow::from(&rec)).unwrap();
        assert_eq!(json["Nom"], "Ana");
        assert_eq!(json["Date"], "2023-12-01");
        assert_eq!(json["Entrée"], "08:00:00");
        assert_eq!(json["Travail"], "09:00:00");
        assert_eq!(json["Travail Cumulée"], "00:00:00");
    }
}
