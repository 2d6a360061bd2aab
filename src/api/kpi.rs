use actix_web::{HttpResponse, web};

use crate::error::AppError;
use crate::model::attendance::CanonicalRecord;
use crate::pipeline::kpi::{
    self, AverageHours, DashboardSummary, DeficitList, EmployeeHours, EmployeeList,
    HeuresRealisees, HeuresRestantes, StatsCompletes, WeeklyTrends,
};
use crate::store::{RecordFilter, RecordStore};

async fn load(
    store: &web::Data<dyn RecordStore>,
    filter: RecordFilter,
) -> Result<Vec<CanonicalRecord>, AppError> {
    let rows = store.query(&filter).await?;
    Ok(rows.into_iter().map(|stored| stored.record).collect())
}

/// Employee with the highest total worked time
#[utoipa::path(
    get,
    path = "/api/best-employee",
    responses(
        (status = 200, description = "Best employee, or `No data` when nothing is stored", body = EmployeeHours),
        (status = 500, description = "Internal server error")
    ),
    tag = "KPI"
)]
pub async fn best_employee(store: web::Data<dyn RecordStore>) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::default()).await?;
    Ok(HttpResponse::Ok().json(kpi::best_employee(&records)))
}

/// Employee with the lowest non-zero total worked time
#[utoipa::path(
    get,
    path = "/api/worst-employee",
    responses(
        (status = 200, description = "Worst employee with hours", body = EmployeeHours),
        (status = 500, description = "Internal server error")
    ),
    tag = "KPI"
)]
pub async fn worst_employee(store: web::Data<dyn RecordStore>) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::default()).await?;
    Ok(HttpResponse::Ok().json(kpi::worst_employee(&records)))
}

#[utoipa::path(
    get,
    path = "/api/average-hours",
    responses(
        (status = 200, description = "Average hours per worked day", body = AverageHours),
        (status = 500, description = "Internal server error")
    ),
    tag = "KPI"
)]
pub async fn average_hours(store: web::Data<dyn RecordStore>) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::default()).await?;
    Ok(HttpResponse::Ok().json(kpi::average_hours(&records)))
}

#[utoipa::path(
    get,
    path = "/api/weekly-trends",
    responses(
        (status = 200, description = "Hours per day of the week", body = WeeklyTrends),
        (status = 500, description = "Internal server error")
    ),
    tag = "KPI"
)]
pub async fn weekly_trends(store: web::Data<dyn RecordStore>) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::default()).await?;
    Ok(HttpResponse::Ok().json(kpi::weekly_trends(&records)))
}

#[utoipa::path(
    get,
    path = "/api/all-employees",
    responses(
        (status = 200, description = "Every employee with their total, highest first", body = EmployeeList),
        (status = 500, description = "Internal server error")
    ),
    tag = "KPI"
)]
pub async fn all_employees(store: web::Data<dyn RecordStore>) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::default()).await?;
    Ok(HttpResponse::Ok().json(kpi::all_employees(&records)))
}

#[utoipa::path(
    get,
    path = "/api/dashboard-summary",
    responses(
        (status = 200, description = "Combined dashboard payload", body = DashboardSummary),
        (status = 500, description = "Internal server error")
    ),
    tag = "KPI"
)]
pub async fn dashboard_summary(
    store: web::Data<dyn RecordStore>,
) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::default()).await?;
    Ok(HttpResponse::Ok().json(kpi::dashboard_summary(&records)))
}

#[utoipa::path(
    get,
    path = "/api/heures-realisees",
    responses(
        (status = 200, description = "Total realized hours", body = HeuresRealisees),
        (status = 500, description = "Internal server error")
    ),
    tag = "Hours"
)]
pub async fn heures_realisees(
    store: web::Data<dyn RecordStore>,
) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::default()).await?;
    Ok(HttpResponse::Ok().json(kpi::heures_realisees(&records)))
}

#[utoipa::path(
    get,
    path = "/api/heures-restantes",
    responses(
        (status = 200, description = "Expected, realized and remaining hours over worked days", body = HeuresRestantes),
        (status = 500, description = "Internal server error")
    ),
    tag = "Hours"
)]
pub async fn heures_restantes(
    store: web::Data<dyn RecordStore>,
) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::worked_only()).await?;
    Ok(HttpResponse::Ok().json(kpi::heures_restantes(&records)))
}

#[utoipa::path(
    get,
    path = "/api/heures-restantes-par-employe",
    responses(
        (status = 200, description = "Remaining hours per employee, largest first", body = DeficitList),
        (status = 500, description = "Internal server error")
    ),
    tag = "Hours"
)]
pub async fn heures_restantes_par_employe(
    store: web::Data<dyn RecordStore>,
) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::worked_only()).await?;
    Ok(HttpResponse::Ok().json(kpi::heures_restantes_par_employe(&records)))
}

#[utoipa::path(
    get,
    path = "/api/stats-completes",
    responses(
        (status = 200, description = "Global and per-employee statistics", body = StatsCompletes),
        (status = 500, description = "Internal server error")
    ),
    tag = "Hours"
)]
pub async fn stats_completes(store: web::Data<dyn RecordStore>) -> Result<HttpResponse, AppError> {
    let records = load(&store, RecordFilter::default()).await?;
    Ok(HttpResponse::Ok().json(kpi::stats_completes(&records)))
}
