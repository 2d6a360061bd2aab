//! Raw spreadsheet rows to canonical attendance records.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::SchemaError;
use crate::model::attendance::CanonicalRecord;
use crate::utils::spreadsheet::RawTable;

pub const ENTRY_COLUMN: &str = "Entrée.";
pub const EXIT_COLUMN: &str = "Sortie.";
pub const NAME_COLUMN: &str = "Nom.";
pub const DATE_COLUMN: &str = "Date.";
pub const REQUIRED_COLUMNS: [&str; 4] = [ENTRY_COLUMN, EXIT_COLUMN, NAME_COLUMN, DATE_COLUMN];

pub const DATE_FORMAT: &str = "%d/%m/%Y";

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

const DAY_SECONDS: i64 = 86_400;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowField {
    Entry,
    Exit,
    Date,
    Span,
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RowField::Entry => ENTRY_COLUMN,
            RowField::Exit => EXIT_COLUMN,
            RowField::Date => DATE_COLUMN,
            RowField::Span => "span",
        };
        f.write_str(name)
    }
}

/// A row value that could not be interpreted. The row is still kept, degraded
/// to an absence (or to a dateless record for a bad date).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowParseError {
    /// 1-based worksheet line, header included.
    pub line: usize,
    pub field: RowField,
    pub value: String,
}

impl fmt::Display for RowParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: unusable {} value {:?}", self.line, self.field, self.value)
    }
}

#[derive(Debug, Default)]
pub struct Normalized {
    /// Sorted by `(employee_name, work_date)`, dateless first.
    pub records: Vec<CanonicalRecord>,
    pub issues: Vec<RowParseError>,
}

struct Columns {
    entry: usize,
    exit: usize,
    name: usize,
    date: usize,
}

fn columns(table: &RawTable) -> Result<Columns, SchemaError> {
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| table.column(c).is_none())
        .map(|c| c.to_string())
        .collect();

    match (
        table.column(ENTRY_COLUMN),
        table.column(EXIT_COLUMN),
        table.column(NAME_COLUMN),
        table.column(DATE_COLUMN),
    ) {
        (Some(entry), Some(exit), Some(name), Some(date)) => Ok(Columns {
            entry,
            exit,
            name,
            date,
        }),
        _ => Err(SchemaError {
            missing,
            available: table.headers.clone(),
        }),
    }
}

/// Normalizes every non-blank row into exactly one record, then sorts the
/// batch for the cumulative pass.
pub fn normalize(table: &RawTable) -> Result<Normalized, SchemaError> {
    let cols = columns(table)?;
    let mut out = Normalized::default();

    for (index, row) in table.rows.iter().enumerate() {
        if row.iter().all(Option::is_none) {
            continue;
        }
        let cell = |i: usize| row.get(i).and_then(|c| c.as_deref());
        let line = index + 2;

        let work_date = match cell(cols.date) {
            None => None,
            Some(text) => {
                let parsed = parse_date(text);
                if parsed.is_none() {
                    out.issues.push(RowParseError {
                        line,
                        field: RowField::Date,
                        value: text.to_string(),
                    });
                }
                parsed
            }
        };

        let name = cell(cols.name).unwrap_or_default().to_string();
        let entry = timestamp_field(cell(cols.entry), work_date, RowField::Entry, line, &mut out.issues);
        let exit = timestamp_field(cell(cols.exit), work_date, RowField::Exit, line, &mut out.issues);

        let record = match (entry, exit) {
            (Some(entry), Some(exit)) => match worked_seconds(entry, exit) {
                Some(seconds) => {
                    CanonicalRecord::worked(name, work_date, entry.time(), exit.time(), seconds)
                }
                None => {
                    out.issues.push(RowParseError {
                        line,
                        field: RowField::Span,
                        value: format!("{entry} -> {exit}"),
                    });
                    CanonicalRecord::absent(name, work_date)
                }
            },
            _ => CanonicalRecord::absent(name, work_date),
        };
        out.records.push(record);
    }

    sort_for_aggregation(&mut out.records);
    Ok(out)
}

/// Orders by name, then date with missing dates first. The sort is stable so
/// duplicate keys keep their sheet order.
pub fn sort_for_aggregation(records: &mut [CanonicalRecord]) {
    records.sort_by(|a, b| {
        a.employee_name
            .cmp(&b.employee_name)
            .then(a.work_date.cmp(&b.work_date))
    });
}

fn timestamp_field(
    text: Option<&str>,
    work_date: Option<NaiveDate>,
    field: RowField,
    line: usize,
    issues: &mut Vec<RowParseError>,
) -> Option<NaiveDateTime> {
    let text = text?;
    let parsed = parse_timestamp(text, work_date);
    if parsed.is_none() {
        issues.push(RowParseError {
            line,
            field,
            value: text.to_string(),
        });
    }
    parsed
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .ok()
        .or_else(|| NaiveDate::parse_from_str(text, "%Y-%m-%d").ok())
        .or_else(|| parse_datetime(text).map(|dt| dt.date()))
}

/// Free-form timestamp. A bare time of day is anchored on `anchor`, or on an
/// arbitrary fixed day when the row has no usable date.
pub fn parse_timestamp(text: &str, anchor: Option<NaiveDate>) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Some(dt) = parse_datetime(text) {
        return Some(dt);
    }
    let time = TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())?;
    let day = anchor.unwrap_or(NaiveDate::MIN);
    Some(day.and_time(time))
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
}

/// `exit - entry` in whole seconds. An exit before the entry by less than a day
/// is an overnight shift ending the next day; anything earlier is rejected.
fn worked_seconds(entry: NaiveDateTime, exit: NaiveDateTime) -> Option<u64> {
    let mut span = (exit - entry).num_seconds();
    if span < 0 && span > -DAY_SECONDS {
        span += DAY_SECONDS;
    }
    u64::try_from(span).ok()
}
