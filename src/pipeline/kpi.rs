//! Dashboard KPIs. Every function is a read-only reduction over the full
//! record set and returns its payload even when the set is empty.
//!
//! Two formatting paths coexist: totals in integer seconds rendered with
//! [`format_hm`], and the per-day/per-employee listings which sum float hours
//! and render with [`format_hm_hours`]. Both agree on any single duration.

use std::collections::BTreeMap;

use chrono::{Datelike, Weekday};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use utoipa::ToSchema;

use crate::model::attendance::CanonicalRecord;
use crate::pipeline::duration::{
    WorkDuration, format_hm, format_hm_hours, format_hms, hours_from_seconds,
};

/// Expected work per worked day.
pub const EXPECTED_DAILY_SECONDS: u64 = 8 * 3600;

pub const NO_DATA: &str = "No data";
pub const NO_EMPLOYEE_WITH_HOURS: &str = "No employees with hours worked";
pub const UNKNOWN_DAY: &str = "Unknown";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumIter)]
pub enum DayName {
    Lun,
    Mar,
    Mer,
    Jeu,
    Ven,
    Sam,
    Dim,
}

impl From<Weekday> for DayName {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Mon => DayName::Lun,
            Weekday::Tue => DayName::Mar,
            Weekday::Wed => DayName::Mer,
            Weekday::Thu => DayName::Jeu,
            Weekday::Fri => DayName::Ven,
            Weekday::Sat => DayName::Sam,
            Weekday::Sun => DayName::Dim,
        }
    }
}

// -------------------- Payloads --------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmployeeHours {
    #[schema(example = "Yasmin Mrabet")]
    pub nom: String,
    #[schema(example = "42:30")]
    pub total_hours: String,
}

impl EmployeeHours {
    fn placeholder(nom: &str) -> Self {
        Self {
            nom: nom.to_string(),
            total_hours: "00:00".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AverageHours {
    #[schema(example = "42:30")]
    pub total_realized: String,
    #[schema(example = "8.50")]
    pub avg_hours: String,
    #[schema(example = "00:00")]
    pub remaining_hours: String,
    #[schema(example = 5)]
    pub total_entries_processed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DayTotal {
    #[schema(example = "Lun")]
    pub day_name: String,
    #[schema(example = "16:00")]
    pub total_hours: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WeeklyTrends {
    pub trends: Vec<DayTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmployeeList {
    pub employees: Vec<EmployeeHours>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardStats {
    pub total_employees: u64,
    pub employees_with_work: u64,
    pub average_hours: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DashboardSummary {
    pub best_employee: EmployeeHours,
    pub worst_employee: EmployeeHours,
    pub weekly_trends: Vec<DayTotal>,
    pub total_realized: String,
    pub remaining_hours: String,
    pub stats: DashboardStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HeuresRealisees {
    #[schema(example = "42:30")]
    pub heures_realisees: String,
    #[schema(example = "42:30:15")]
    pub heures_realisees_detailed: String,
    #[schema(example = 153015)]
    pub total_seconds: u64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HeuresRestantes {
    #[schema(example = "16:00")]
    pub travail_attendu: String,
    #[schema(example = "10:00")]
    pub heures_realisees: String,
    #[schema(example = "06:00")]
    pub heures_restantes: String,
    #[schema(example = 2)]
    pub nombre_jours_travailles: u64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmployeeDeficit {
    pub nom: String,
    pub jours_travailles: u64,
    pub heures_realisees: String,
    pub travail_attendu: String,
    pub heures_restantes: String,
    pub deficit_heures: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeficitList {
    pub employees: Vec<EmployeeDeficit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EmployeeStat {
    pub nom: String,
    pub jours_travailles: u64,
    pub heures_realisees: String,
    pub travail_attendu: String,
    pub heures_restantes: String,
    pub deficit: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GlobalStats {
    pub total_heures_realisees: String,
    pub jours_avec_travail: u64,
    pub travail_attendu_total: String,
    pub heures_restantes_total: String,
    #[schema(example = "93.8%")]
    pub taux_realisation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct StatsCompletes {
    pub global: GlobalStats,
    pub par_employe: Vec<EmployeeStat>,
    pub total_records: u64,
}

// -------------------- Reductions --------------------

#[derive(Debug, Default, Clone, Copy)]
struct Balance {
    days: u64,
    seconds: u64,
}

impl Balance {
    fn expected(self) -> u64 {
        self.days * EXPECTED_DAILY_SECONDS
    }

    fn remaining(self) -> u64 {
        self.expected().saturating_sub(self.seconds)
    }
}

fn worked_seconds(rec: &CanonicalRecord) -> Option<u64> {
    match rec.worked {
        WorkDuration::Worked(s) => Some(s),
        WorkDuration::Absent => None,
    }
}

/// Worked days and seconds per employee, absences excluded. Keyed by name so
/// iteration order is the tie-break order.
fn balances(records: &[CanonicalRecord]) -> BTreeMap<&str, Balance> {
    let mut map: BTreeMap<&str, Balance> = BTreeMap::new();
    for rec in records {
        if let Some(s) = worked_seconds(rec) {
            let b = map.entry(rec.employee_name.as_str()).or_default();
            b.days += 1;
            b.seconds += s;
        }
    }
    map
}

fn global_balance(records: &[CanonicalRecord]) -> Balance {
    records
        .iter()
        .filter_map(worked_seconds)
        .fold(Balance::default(), |acc, s| Balance {
            days: acc.days + 1,
            seconds: acc.seconds + s,
        })
}

/// Float hours per employee over every record, absences counting zero.
fn employee_hours(records: &[CanonicalRecord]) -> BTreeMap<&str, f64> {
    let mut map: BTreeMap<&str, f64> = BTreeMap::new();
    for rec in records {
        *map.entry(rec.employee_name.as_str()).or_default() +=
            hours_from_seconds(rec.worked.seconds());
    }
    map
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// First entry wins on equal values; callers iterate in name order.
fn pick<'a, V: PartialOrd + Copy>(
    entries: impl Iterator<Item = (&'a str, V)>,
    better: fn(&V, &V) -> bool,
) -> Option<(&'a str, V)> {
    entries.fold(None, |best, (name, value)| match best {
        Some((_, current)) if !better(&value, &current) => best,
        _ => Some((name, value)),
    })
}

pub fn best_employee(records: &[CanonicalRecord]) -> EmployeeHours {
    let totals = balances(records);
    match pick(totals.iter().map(|(n, b)| (*n, b.seconds)), |a, b| a > b) {
        Some((nom, seconds)) => EmployeeHours {
            nom: nom.to_string(),
            total_hours: format_hm(seconds),
        },
        None => EmployeeHours::placeholder(NO_DATA),
    }
}

/// Lowest non-zero total. Employees with only zero-length days have no data
/// rather than being the worst.
pub fn worst_employee(records: &[CanonicalRecord]) -> EmployeeHours {
    let totals = balances(records);
    if totals.is_empty() {
        return EmployeeHours::placeholder(NO_DATA);
    }
    let with_hours = totals
        .iter()
        .filter(|(_, b)| b.seconds > 0)
        .map(|(n, b)| (*n, b.seconds));
    match pick(with_hours, |a, b| a < b) {
        Some((nom, seconds)) => EmployeeHours {
            nom: nom.to_string(),
            total_hours: format_hm(seconds),
        },
        None => EmployeeHours::placeholder(NO_EMPLOYEE_WITH_HOURS),
    }
}

pub fn average_hours(records: &[CanonicalRecord]) -> AverageHours {
    let total = global_balance(records);
    let avg = if total.days > 0 {
        round2(total.seconds as f64 / 3600.0 / total.days as f64)
    } else {
        0.0
    };
    AverageHours {
        total_realized: format_hm(total.seconds),
        avg_hours: format!("{avg:.2}"),
        remaining_hours: format_hm(total.remaining()),
        total_entries_processed: total.days,
    }
}

/// Hours per day of week, all seven days in week order, then an `Unknown`
/// bucket when some records carry no date.
pub fn weekly_trends(records: &[CanonicalRecord]) -> WeeklyTrends {
    WeeklyTrends {
        trends: day_totals(records, true),
    }
}

/// With `bucket_unknown` unset, dateless records are left out entirely.
fn day_totals(records: &[CanonicalRecord], bucket_unknown: bool) -> Vec<DayTotal> {
    let mut by_day: BTreeMap<DayName, f64> = DayName::iter().map(|d| (d, 0.0)).collect();
    let mut unknown: Option<f64> = None;

    for rec in records {
        let hours = hours_from_seconds(rec.worked.seconds());
        match rec.work_date {
            Some(date) => *by_day.entry(DayName::from(date.weekday())).or_default() += hours,
            None if bucket_unknown => *unknown.get_or_insert(0.0) += hours,
            None => {}
        }
    }

    let mut trends: Vec<DayTotal> = by_day
        .into_iter()
        .map(|(day, hours)| DayTotal {
            day_name: day.to_string(),
            total_hours: format_hm_hours(hours),
        })
        .collect();
    if let Some(hours) = unknown {
        trends.push(DayTotal {
            day_name: UNKNOWN_DAY.to_string(),
            total_hours: format_hm_hours(hours),
        });
    }
    trends
}

/// Every employee with their total, highest first.
pub fn all_employees(records: &[CanonicalRecord]) -> EmployeeList {
    let mut rows: Vec<(&str, f64)> = employee_hours(records).into_iter().collect();
    rows.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(b.0)));
    EmployeeList {
        employees: rows
            .into_iter()
            .map(|(nom, hours)| EmployeeHours {
                nom: nom.to_string(),
                total_hours: format_hm_hours(hours),
            })
            .collect(),
    }
}

pub fn dashboard_summary(records: &[CanonicalRecord]) -> DashboardSummary {
    let hours = employee_hours(records);
    let with_hours = || hours.iter().filter(|(_, h)| **h > 0.0).map(|(n, h)| (*n, *h));

    let to_payload = |found: Option<(&str, f64)>| match found {
        Some((nom, h)) => EmployeeHours {
            nom: nom.to_string(),
            total_hours: format_hm_hours(h),
        },
        None => EmployeeHours::placeholder(NO_DATA),
    };
    let best_employee = to_payload(pick(with_hours(), |a, b| a > b));
    let worst_employee = to_payload(pick(with_hours(), |a, b| a < b));

    let total_realized: f64 = hours.values().sum();
    let employees_with_work = with_hours().count() as u64;
    let average_hours = if employees_with_work > 0 {
        round2(total_realized / employees_with_work as f64)
    } else {
        0.0
    };

    DashboardSummary {
        best_employee,
        worst_employee,
        weekly_trends: day_totals(records, false),
        total_realized: format_hm_hours(total_realized),
        remaining_hours: format_hm(global_balance(records).remaining()),
        stats: DashboardStats {
            total_employees: hours.len() as u64,
            employees_with_work,
            average_hours,
        },
    }
}

pub fn heures_realisees(records: &[CanonicalRecord]) -> HeuresRealisees {
    let total_seconds: u64 = records.iter().map(|r| r.worked.seconds()).sum();
    HeuresRealisees {
        heures_realisees: format_hm(total_seconds),
        heures_realisees_detailed: format_hms(total_seconds),
        total_seconds,
        description: "Total des heures travaillées par tous les employés".to_string(),
    }
}

/// Expected versus realized over worked days. Absences are ignored even if
/// the caller did not filter them out.
pub fn heures_restantes(records: &[CanonicalRecord]) -> HeuresRestantes {
    let total = global_balance(records);
    let expected = format_hm(total.expected());
    HeuresRestantes {
        description: format!(
            "Travail attendu: {} jours × 8 heures = {}",
            total.days, expected
        ),
        travail_attendu: expected,
        heures_realisees: format_hm(total.seconds),
        heures_restantes: format_hm(total.remaining()),
        nombre_jours_travailles: total.days,
    }
}

/// Per-employee balances, largest remaining first. Sorting uses the numeric
/// remainder, which matches the order of the zero-padded text while hours
/// stay two digits wide and keeps holding beyond that.
fn ranked_balances(records: &[CanonicalRecord]) -> Vec<(&str, Balance)> {
    let mut rows: Vec<(&str, Balance)> = balances(records).into_iter().collect();
    rows.sort_by(|a, b| b.1.remaining().cmp(&a.1.remaining()).then(a.0.cmp(b.0)));
    rows
}

pub fn heures_restantes_par_employe(records: &[CanonicalRecord]) -> DeficitList {
    DeficitList {
        employees: ranked_balances(records)
            .into_iter()
            .map(|(nom, b)| EmployeeDeficit {
                nom: nom.to_string(),
                jours_travailles: b.days,
                heures_realisees: format_hm(b.seconds),
                travail_attendu: format_hm(b.expected()),
                heures_restantes: format_hm(b.remaining()),
                deficit_heures: b.remaining() > 0,
            })
            .collect(),
    }
}

pub fn realization_rate(realized_seconds: u64, expected_seconds: u64) -> String {
    if expected_seconds == 0 {
        return "0%".to_string();
    }
    format!(
        "{:.1}%",
        realized_seconds as f64 / expected_seconds as f64 * 100.0
    )
}

pub fn stats_completes(records: &[CanonicalRecord]) -> StatsCompletes {
    let total = global_balance(records);
    StatsCompletes {
        global: GlobalStats {
            total_heures_realisees: format_hm(total.seconds),
            jours_avec_travail: total.days,
            travail_attendu_total: format_hm(total.expected()),
            heures_restantes_total: format_hm(total.remaining()),
            taux_realisation: realization_rate(total.seconds, total.expected()),
        },
        par_employe: ranked_balances(records)
            .into_iter()
            .map(|(nom, b)| EmployeeStat {
                nom: nom.to_string(),
                jours_travailles: b.days,
                heures_realisees: format_hm(b.seconds),
                travail_attendu: format_hm(b.expected()),
                heures_restantes: format_hm(b.remaining()),
                deficit: b.remaining() > 0,
            })
            .collect(),
        total_records: records.len() as u64,
    }
}
