use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};
use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::AppError;

pub const ACCEPTED_EXTENSIONS: [&str; 2] = [".xlsx", ".xls"];

/// Header row plus data rows of the first worksheet, every cell rendered to
/// text. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl RawTable {
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }
}

pub fn has_accepted_extension(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    ACCEPTED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Reads the first worksheet of an `.xlsx`/`.xls` workbook held in memory.
pub fn read_workbook(bytes: Vec<u8>) -> Result<RawTable, AppError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| AppError::Workbook(e.to_string()))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| AppError::Workbook("workbook has no worksheet".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| AppError::Workbook(e.to_string()))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header) => header
            .iter()
            .map(|c| cell_to_text(c).unwrap_or_default())
            .collect(),
        None => return Ok(RawTable::default()),
    };

    let rows = rows
        .map(|row| row.iter().map(cell_to_text).collect())
        .collect();

    tracing::debug!(sheet = %sheet_name, "worksheet loaded");
    Ok(RawTable { headers, rows })
}

fn cell_to_text(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Int(n) => n.to_string(),
        Data::Float(f) => format!("{}", f),
        Data::Bool(b) => b.to_string(),
        Data::Error(e) => format!("#ERR({:?})", e),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            let value = serial_to_datetime(serial)?;
            // time-only cells carry no day, the normalizer anchors them on the row date
            if serial < 1.0 {
                value.format("%H:%M:%S").to_string()
            } else {
                value.format("%Y-%m-%d %H:%M:%S").to_string()
            }
        }
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    };
    if text.is_empty() { None } else { Some(text) }
}

/// Excel serial day number (1900 date system) to a timestamp, rounded to the
/// second. Serials below 1 are pure times of day and land on 1899-12-30;
/// [`cell_to_text`] drops that placeholder day.
fn serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(TimeDelta::try_seconds(seconds)?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};

    /// Cell written with its Excel type, as a timesheet export would.
    #[derive(Debug, Clone, Copy)]
    pub(crate) enum Cell<'a> {
        Text(&'a str),
        Time(u16, u8, u8),
        Date(u16, u8, u8),
        Empty,
    }

    pub(crate) fn workbook_bytes(rows: &[&[&str]]) -> Vec<u8> {
        let typed: Vec<Vec<Cell>> = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| if v.is_empty() { Cell::Empty } else { Cell::Text(*v) })
                    .collect()
            })
            .collect();
        let refs: Vec<&[Cell]> = typed.iter().map(Vec::as_slice).collect();
        typed_workbook_bytes(&refs)
    }

    pub(crate) fn typed_workbook_bytes(rows: &[&[Cell]]) -> Vec<u8> {
        let time_format = Format::new().set_num_format("hh:mm:ss");
        let date_format = Format::new().set_num_format("dd/mm/yyyy");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match *cell {
                    Cell::Text(value) => {
                        sheet.write_string(r, c, value).unwrap();
                    }
                    Cell::Time(h, m, s) => {
                        let time = ExcelDateTime::from_hms(h, m, s).unwrap();
                        sheet.write_datetime_with_format(r, c, &time, &time_format).unwrap();
                    }
                    Cell::Date(y, m, d) => {
                        let date = ExcelDateTime::from_ymd(y, m, d).unwrap();
                        sheet.write_datetime_with_format(r, c, &date, &date_format).unwrap();
                    }
                    Cell::Empty => {}
                }
            }
        }
        workbook.save_to_buffer().unwrap()
    }

    #[test]
    fn reads_headers_and_text_cells() {
        let bytes = workbook_bytes(&[
            &["Entrée.", "Sortie.", "Nom.", "Date."],
            &["2023-01-02 08:00:00", "2023-01-02 16:30:00", " Ana ", "02/01/2023"],
            &["", "", "Ben", "02/01/2023"],
        ]);
        let table = read_workbook(bytes).unwrap();
        assert_eq!(table.headers, vec!["Entrée.", "Sortie.", "Nom.", "Date."]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][2].as_deref(), Some("Ana"));
        assert_eq!(table.rows[1][0], None);
        assert_eq!(table.column("Nom."), Some(2));
    }

    #[test]
    fn typed_time_cells_read_as_bare_times() {
        let bytes = typed_workbook_bytes(&[
            &[Cell::Text("Entrée."), Cell::Text("Date.")],
            &[Cell::Time(8, 0, 0), Cell::Date(2023, 1, 2)],
            &[Cell::Time(17, 30, 15), Cell::Date(2023, 12, 31)],
        ]);
        let table = read_workbook(bytes).unwrap();
        assert_eq!(table.rows[0][0].as_deref(), Some("08:00:00"));
        assert_eq!(table.rows[0][1].as_deref(), Some("2023-01-02 00:00:00"));
        assert_eq!(table.rows[1][0].as_deref(), Some("17:30:15"));
        assert_eq!(table.rows[1][1].as_deref(), Some("2023-12-31 00:00:00"));
    }

    #[test]
    fn garbage_bytes_are_a_workbook_error() {
        let err = read_workbook(b"not a spreadsheet".to_vec()).unwrap_err();
        assert!(matches!(err, AppError::Workbook(_)));
    }

    #[test]
    fn converts_excel_serials() {
        let dt = serial_to_datetime(45_000.75).unwrap();
        assert_eq!(dt.to_string(), "2023-03-15 18:00:00");
        let t = serial_to_datetime(0.5).unwrap();
        assert_eq!(t.format("%H:%M:%S").to_string(), "12:00:00");
        assert_eq!(serial_to_datetime(1e300), None);
        assert_eq!(serial_to_datetime(-1.0), None);
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert!(has_accepted_extension("pointage.XLSX"));
        assert!(has_accepted_extension("old.xls"));
        assert!(!has_accepted_extension("export.csv"));
    }
}
