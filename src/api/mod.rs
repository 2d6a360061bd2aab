pub mod attendance;
pub mod kpi;
