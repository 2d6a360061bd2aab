//! Spreadsheet rows to canonical records, running totals and KPIs.

pub mod cumulative;
pub mod duration;
pub mod kpi;
pub mod normalizer;
