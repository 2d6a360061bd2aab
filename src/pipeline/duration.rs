//! Text <-> seconds conversions for worked durations.
//!
//! Two textual renderings exist: `HH:MM:SS` for stored and detailed values and
//! `HH:MM` for dashboard figures. The hour field is zero-padded to two digits
//! but never capped, cumulative totals routinely pass 24h.

use std::fmt;

use thiserror::Error;

/// Marker stored in place of entry, exit and worked values on days without work.
pub const ABSENCE_SENTINEL: &str = "Abs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkDuration {
    Worked(u64),
    Absent,
}

impl WorkDuration {
    /// Contribution to a sum: absences net to zero.
    pub fn seconds(self) -> u64 {
        match self {
            WorkDuration::Worked(s) => s,
            WorkDuration::Absent => 0,
        }
    }

    pub fn is_absent(self) -> bool {
        matches!(self, WorkDuration::Absent)
    }
}

impl fmt::Display for WorkDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkDuration::Worked(s) => f.write_str(&format_hms(*s)),
            WorkDuration::Absent => f.write_str(ABSENCE_SENTINEL),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid duration {text:?}: expected H:M, H:M:S or \"Abs\"")]
pub struct DurationParseError {
    pub text: String,
}

/// Result of [`parse_lenient`]: a value usable for aggregation plus a flag
/// telling whether the input was garbage rather than a real absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LenientDuration {
    pub value: WorkDuration,
    pub malformed: bool,
}

/// Parses `Abs`, `H:M` or `H:M:S`. Components are non-negative integers of
/// any width.
pub fn parse(text: &str) -> Result<WorkDuration, DurationParseError> {
    let text = text.trim();
    if text == ABSENCE_SENTINEL {
        return Ok(WorkDuration::Absent);
    }

    let invalid = || DurationParseError {
        text: text.to_string(),
    };

    let parts = text
        .split(':')
        .map(|p| {
            if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            p.parse::<u64>().map_err(|_| invalid())
        })
        .collect::<Result<Vec<_>, _>>()?;

    let (h, m, s) = match parts.as_slice() {
        [h, m] => (*h, *m, 0),
        [h, m, s] => (*h, *m, *s),
        _ => return Err(invalid()),
    };

    h.checked_mul(3600)
        .and_then(|v| v.checked_add(m.checked_mul(60)?))
        .and_then(|v| v.checked_add(s))
        .map(WorkDuration::Worked)
        .ok_or_else(invalid)
}

/// Missing, blank and `Abs` are absences. Anything [`parse`] rejects is
/// treated as an absence too, with `malformed` set.
pub fn parse_lenient(text: Option<&str>) -> LenientDuration {
    match text.map(str::trim) {
        None | Some("") => LenientDuration {
            value: WorkDuration::Absent,
            malformed: false,
        },
        Some(t) => match parse(t) {
            Ok(value) => LenientDuration {
                value,
                malformed: false,
            },
            Err(_) => LenientDuration {
                value: WorkDuration::Absent,
                malformed: true,
            },
        },
    }
}

pub fn format_hms(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    format!("{h:02}:{m:02}:{s:02}")
}

pub fn format_hm(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    format!("{h:02}:{m:02}")
}

/// Float-hours view used by the per-day and per-employee listings. Seconds
/// are dropped, so the value is always a whole number of minutes.
pub fn hours_from_seconds(seconds: u64) -> f64 {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    h as f64 + m as f64 / 60.0
}

pub fn format_hm_hours(hours: f64) -> String {
    if !hours.is_finite() || hours <= 0.0 {
        return "00:00".to_string();
    }
    let mut h = hours.trunc() as u64;
    let mut m = ((hours - hours.trunc()) * 60.0).round() as u64;
    if m >= 60 {
        h += m / 60;
        m %= 60;
    }
    format!("{h:02}:{m:02}")
}
