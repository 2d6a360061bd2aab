use crate::{
    api::{attendance, kpi},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{Resource, web};
use std::sync::Arc;

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    // Helper to build per-route limiter
    fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
        let requests_per_min = requests_per_min.max(1);
        let per_ms = (60_000 / requests_per_min as u64).max(1);
        let cfg = GovernorConfigBuilder::default()
            .per_millisecond(per_ms)
            .burst_size(requests_per_min)
            .key_extractor(PeerIpKeyExtractor)
            .finish()
            .expect("period and burst size are non-zero");
        Governor::new(&cfg)
    }

    let upload_limiter = Arc::new(build_limiter(config.rate_upload_per_min));
    let read_limiter = Arc::new(build_limiter(config.rate_kpi_per_min));

    cfg.service(
        web::scope(&config.api_prefix)
            .service(upload_resource().wrap(upload_limiter))
            .service(web::scope("").wrap(read_limiter).configure(read_routes)),
    );
}

/// Upload endpoint, without rate limiting.
pub fn upload_resource() -> Resource {
    web::resource("/dbbi/parse-excel").route(web::post().to(attendance::parse_excel))
}

/// Listing and KPI endpoints, without rate limiting.
pub fn read_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/dbbi")
            .service(web::resource("/sample-data").route(web::get().to(attendance::sample_data)))
            .service(web::resource("/all").route(web::get().to(attendance::list_attendance))),
    )
    // dashboard
    .service(web::resource("/best-employee").route(web::get().to(kpi::best_employee)))
    .service(web::resource("/worst-employee").route(web::get().to(kpi::worst_employee)))
    .service(web::resource("/average-hours").route(web::get().to(kpi::average_hours)))
    .service(web::resource("/weekly-trends").route(web::get().to(kpi::weekly_trends)))
    .service(web::resource("/all-employees").route(web::get().to(kpi::all_employees)))
    .service(web::resource("/dashboard-summary").route(web::get().to(kpi::dashboard_summary)))
    // hours balance
    .service(web::resource("/heures-realisees").route(web::get().to(kpi::heures_realisees)))
    .service(web::resource("/heures-restantes").route(web::get().to(kpi::heures_restantes)))
    .service(
        web::resource("/heures-restantes-par-employe")
            .route(web::get().to(kpi::heures_restantes_par_employe)),
    )
    .service(web::resource("/stats-completes").route(web::get().to(kpi::stats_completes)));
}
