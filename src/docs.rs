use crate::api::attendance::{AttendanceQuery, ParseExcelResponse, UploadForm};
use crate::model::attendance::{AttendanceView, RecordRow};
use crate::pipeline::kpi::{
    AverageHours, DashboardStats, DashboardSummary, DayTotal, DeficitList, EmployeeDeficit,
    EmployeeHours, EmployeeList, EmployeeStat, GlobalStats, HeuresRealisees, HeuresRestantes,
    StatsCompletes, WeeklyTrends,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Attendance KPI API",
        version = "1.0.0",
        description = r#"
## Attendance ingestion and KPI dashboard

Upload a clock-in/clock-out spreadsheet, keep one record per employee and day, and read dashboard indicators computed over everything stored.

### 🔹 Upload
- `.xlsx`/`.xls` workbook in the `file` form field
- Required columns: `Entrée.`, `Sortie.`, `Nom.`, `Date.`
- Dates as `DD/MM/YYYY`; a missing entry or exit marks the day as `Abs`
- Re-uploading a day already stored leaves the stored record untouched

### 📊 Indicators
- Best and worst employee, average hours, weekly trends
- Realized, expected (8h per worked day) and remaining hours, globally and per employee

### 📦 Response Format
- Durations are `HH:MM` strings; hours can exceed 24
- Errors are `{"error": "..."}` with a `details` object for missing columns
"#,
    ),
    paths(
        crate::api::attendance::parse_excel,
        crate::api::attendance::sample_data,
        crate::api::attendance::list_attendance,

        crate::api::kpi::best_employee,
        crate::api::kpi::worst_employee,
        crate::api::kpi::average_hours,
        crate::api::kpi::weekly_trends,
        crate::api::kpi::all_employees,
        crate::api::kpi::dashboard_summary,

        crate::api::kpi::heures_realisees,
        crate::api::kpi::heures_restantes,
        crate::api::kpi::heures_restantes_par_employe,
        crate::api::kpi::stats_completes
    ),
    components(
        schemas(
            UploadForm,
            ParseExcelResponse,
            RecordRow,
            AttendanceQuery,
            AttendanceView,
            EmployeeHours,
            AverageHours,
            DayTotal,
            WeeklyTrends,
            EmployeeList,
            DashboardStats,
            DashboardSummary,
            HeuresRealisees,
            HeuresRestantes,
            EmployeeDeficit,
            DeficitList,
            EmployeeStat,
            GlobalStats,
            StatsCompletes
        )
    ),
    tags(
        (name = "Attendance", description = "Spreadsheet upload and stored records"),
        (name = "KPI", description = "Dashboard indicators"),
        (name = "Hours", description = "Realized and remaining hours"),
    )
)]
pub struct ApiDoc;

/// Documented paths are declared under `/api`; rebase them on the configured prefix.
pub fn openapi_for(prefix: &str) -> utoipa::openapi::OpenApi {
    let prefix = prefix.trim_end_matches('/');
    let mut doc = ApiDoc::openapi();
    doc.paths.paths = std::mem::take(&mut doc.paths.paths)
        .into_iter()
        .map(|(path, item)| match path.strip_prefix("/api") {
            Some(rest) => (format!("{prefix}{rest}"), item),
            None => (path, item),
        })
        .collect();
    doc
}
