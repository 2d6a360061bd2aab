use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::audit::{AuditLog, Outcome};
use crate::config::Config;
use crate::error::AppError;
use crate::model::attendance::{AttendanceView, CanonicalRecord, RecordRow};
use crate::pipeline::{cumulative, normalizer};
use crate::store::{RecordFilter, RecordStore};
use crate::utils::spreadsheet::{self, RawTable};

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ParseExcelResponse {
    #[schema(example = "File parsed successfully")]
    pub message: String,
    pub data: Vec<RecordRow>,
    #[schema(example = 12)]
    pub total_records: usize,
    /// Records newly persisted by this upload.
    #[schema(example = 10)]
    pub saved_records: usize,
    /// Records whose employee/date pair was already stored.
    #[schema(example = 2)]
    pub skipped_records: usize,
    /// Rows kept with an unusable entry, exit or date value.
    #[schema(example = 1)]
    pub degraded_rows: usize,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    /// Case-insensitive substring of the employee name
    #[schema(example = "mrabet")]
    pub nom: Option<String>,
    /// Case-insensitive prefix of the employee name
    #[schema(example = "yas")]
    pub prefix: Option<String>,
}

/// Multipart form accepted by the upload endpoint.
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// `.xlsx` or `.xls` workbook
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

struct Upload {
    file_name: String,
    bytes: Vec<u8>,
}

/// Pulls the `file` part out of the multipart body, enforcing the size cap.
async fn read_upload(mut payload: Multipart, max_bytes: usize) -> Result<Upload, AppError> {
    let bad_request = |e: actix_multipart::MultipartError| AppError::BadRequest(e.to_string());

    while let Some(mut field) = payload.try_next().await.map_err(bad_request)? {
        let disposition = field.content_disposition();
        if disposition.get_name() != Some("file") {
            continue;
        }
        let file_name = disposition.get_filename().unwrap_or_default().to_string();

        let mut bytes = Vec::new();
        while let Some(chunk) = field.try_next().await.map_err(bad_request)? {
            if bytes.len() + chunk.len() > max_bytes {
                return Err(AppError::BadRequest(format!(
                    "File exceeds the {max_bytes} bytes upload limit"
                )));
            }
            bytes.extend_from_slice(&chunk);
        }
        return Ok(Upload { file_name, bytes });
    }

    Err(AppError::BadRequest("No file provided".to_string()))
}

/// Persists each record unless its employee/date pair exists. Returns
/// (saved, skipped).
async fn save_to_database(
    store: &dyn RecordStore,
    records: &[CanonicalRecord],
) -> Result<(usize, usize), AppError> {
    let mut saved = 0;
    let mut skipped = 0;
    for record in records {
        let (_, created) = store.get_or_create(record.clone()).await?;
        if created {
            saved += 1;
        } else {
            skipped += 1;
        }
    }
    Ok((saved, skipped))
}

/// Upload an attendance spreadsheet
#[utoipa::path(
    post,
    path = "/api/dbbi/parse-excel",
    request_body(
        content = UploadForm,
        content_type = "multipart/form-data",
        description = "Excel workbook in the `file` field with columns Entrée., Sortie., Nom., Date."
    ),
    responses(
        (status = 200, description = "File parsed and stored", body = ParseExcelResponse),
        (status = 400, description = "Missing file, wrong format or missing columns", body = Object, example = json!({
            "error": "Colonnes requises manquantes: [\"Nom.\"]. Disponibles: [\"Entrée.\", \"Sortie.\", \"Date.\"]",
            "details": { "missing": ["Nom."], "available": ["Entrée.", "Sortie.", "Date."] }
        })),
        (status = 500, description = "Internal server error", body = Object, example = json!({
            "error": "database error: pool timed out while waiting for an open connection"
        }))
    ),
    tag = "Attendance"
)]
pub async fn parse_excel(
    store: web::Data<dyn RecordStore>,
    audit: web::Data<dyn AuditLog>,
    config: web::Data<Config>,
    payload: Multipart,
) -> Result<HttpResponse, AppError> {
    let upload = read_upload(payload, config.max_upload_bytes).await?;
    if !spreadsheet::has_accepted_extension(&upload.file_name) {
        return Err(AppError::BadRequest(
            "File must be in Excel format (.xlsx or .xls)".to_string(),
        ));
    }

    let batch_id = Uuid::new_v4();
    let args = format!(
        "batch={batch_id} file={:?} size={}",
        upload.file_name,
        upload.bytes.len()
    );
    info!(%batch_id, file = %upload.file_name, size = upload.bytes.len(), "Parsing upload");

    let parsed = spreadsheet::read_workbook(upload.bytes)
        .and_then(|table: RawTable| normalizer::normalize(&table).map_err(AppError::from));
    let normalized = match parsed {
        Ok(n) => {
            audit
                .record_invocation(
                    "parse_excel",
                    &args,
                    Outcome::Success(json!({
                        "total_records": n.records.len(),
                        "degraded_rows": n.issues.len(),
                    })),
                )
                .await;
            n
        }
        Err(e) => {
            audit
                .record_invocation("parse_excel", &args, Outcome::Failure(e.to_string()))
                .await;
            return Err(e);
        }
    };

    for issue in &normalized.issues {
        warn!(%batch_id, %issue, "Row degraded");
    }

    let records = cumulative::annotate(normalized.records);

    let (saved, skipped) = match save_to_database(store.get_ref(), &records).await {
        Ok(counts) => {
            audit
                .record_invocation("save_to_database", &args, Outcome::Success(json!(counts.0)))
                .await;
            counts
        }
        Err(e) => {
            audit
                .record_invocation("save_to_database", &args, Outcome::Failure(e.to_string()))
                .await;
            return Err(e);
        }
    };

    info!(%batch_id, total = records.len(), saved, skipped, "Upload stored");

    Ok(HttpResponse::Ok().json(ParseExcelResponse {
        message: "File parsed successfully".to_string(),
        data: records.iter().map(RecordRow::from).collect(),
        total_records: records.len(),
        saved_records: saved,
        skipped_records: skipped,
        degraded_rows: normalized.issues.len(),
    }))
}

/// List stored attendance records
#[utoipa::path(
    get,
    path = "/api/dbbi/all",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Stored records, decrypted", body = [AttendanceView]),
        (status = 500, description = "Internal server error")
    ),
    tag = "Attendance"
)]
pub async fn list_attendance(
    store: web::Data<dyn RecordStore>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let filter = RecordFilter {
        exclude_absent: false,
        name_contains: query.nom.filter(|s| !s.is_empty()),
        name_prefix: query.prefix.filter(|s| !s.is_empty()),
    };

    let rows: Vec<AttendanceView> = store
        .query(&filter)
        .await?
        .iter()
        .map(AttendanceView::from)
        .collect();

    Ok(HttpResponse::Ok().json(rows))
}

/// Expected upload layout
#[utoipa::path(
    get,
    path = "/api/dbbi/sample-data",
    responses(
        (status = 200, description = "Column list and a sample record", body = Object)
    ),
    tag = "Attendance"
)]
pub async fn sample_data() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "columns": ["Nom", "Date", "Entrée", "Sortie", "Travail", "Travail Cumulée"],
        "sample_record": {
            "Nom": "Yasmin Mrabet",
            "Date": "2023-12-01",
            "Entrée": "08:00:00",
            "Sortie": "17:00:00",
            "Travail": "09:00:00",
            "Travail Cumulée": "09:00:00"
        }
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use actix_web::http::{StatusCode, header};
    use actix_web::{App, test};
    use chrono::{NaiveDate, NaiveTime};
    use serde_json::Value;

    use super::*;
    use crate::audit::memory::MemoryAuditLog;
    use crate::routes;
    use crate::store::memory::MemoryStore;
    use crate::utils::spreadsheet::tests::{Cell, typed_workbook_bytes, workbook_bytes};

    const BOUNDARY: &str = "attendance-test-boundary";
    const HEADER: &[&str] = &["Entrée.", "Sortie.", "Nom.", "Date."];

    fn test_config() -> Config {
        Config::from_lookup(|key| match key {
            "SERVER_ADDR" => Some("127.0.0.1:0".to_string()),
            "DATABASE_URL" => Some("mysql://localhost/attendance".to_string()),
            "FIELD_ENCRYPTION_KEY" => Some("test-secret".to_string()),
            "MAX_UPLOAD_BYTES" => Some("65536".to_string()),
            _ => None,
        })
        .unwrap()
    }

    fn multipart_body(field: &str, file_name: &str, bytes: &[u8]) -> Vec<u8> {
        let mut body = format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .into_bytes();
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn upload_request(field: &str, file_name: &str, bytes: &[u8]) -> test::TestRequest {
        test::TestRequest::post()
            .uri("/api/dbbi/parse-excel")
            .insert_header((
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            ))
            .set_payload(multipart_body(field, file_name, bytes))
    }

    macro_rules! upload_app {
        ($store:expr, $audit:expr) => {{
            let store: Arc<dyn RecordStore> = $store.clone();
            let audit: Arc<dyn AuditLog> = $audit.clone();
            test::init_service(
                App::new()
                    .app_data(web::Data::from(store))
                    .app_data(web::Data::from(audit))
                    .app_data(web::Data::new(test_config()))
                    .service(
                        web::scope("/api")
                            .service(routes::upload_resource())
                            .configure(routes::read_routes),
                    ),
            )
            .await
        }};
    }

    fn timesheet() -> Vec<u8> {
        workbook_bytes(&[
            HEADER,
            &["08:00:00", "17:00:00", "Ana", "02/01/2023"],
            &["09:00:00", "12:00:00", "Ben", "02/01/2023"],
            &["", "", "Ana", "03/01/2023"],
            &["08:30:00", "12:00:00", "Ana", "04/01/2023"],
        ])
    }

    #[actix_web::test]
    async fn upload_stores_records_and_skips_them_on_reupload() {
        let store = Arc::new(MemoryStore::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let app = upload_app!(store, audit);

        let req = upload_request("file", "week.xlsx", &timesheet()).to_request();
        let first: ParseExcelResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(first.message, "File parsed successfully");
        assert_eq!(first.total_records, 4);
        assert_eq!(first.saved_records, 4);
        assert_eq!(first.skipped_records, 0);
        assert_eq!(first.degraded_rows, 0);

        let ana: Vec<(&str, &str)> = first
            .data
            .iter()
            .filter(|r| r.nom == "Ana")
            .map(|r| (r.travail.as_str(), r.travail_cumulee.as_str()))
            .collect();
        assert_eq!(
            ana,
            [("09:00:00", "09:00:00"), ("Abs", "09:00:00"), ("03:30:00", "12:30:00")]
        );

        let req = upload_request("file", "week.xlsx", &timesheet()).to_request();
        let second: ParseExcelResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(second.saved_records, 0);
        assert_eq!(second.skipped_records, 4);
        assert_eq!(store.len(), 4);

        let calls = audit.names();
        assert_eq!(calls.len(), 4);
        assert!(calls.iter().all(|(_, ok)| *ok));
        assert_eq!(calls[0].0, "parse_excel");
        assert_eq!(calls[1].0, "save_to_database");
    }

    #[actix_web::test]
    async fn typed_excel_cells_are_anchored_on_the_row_date() {
        let store = Arc::new(MemoryStore::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let app = upload_app!(store, audit);

        let header: Vec<Cell> = HEADER.iter().map(|h| Cell::Text(*h)).collect();
        let bytes = typed_workbook_bytes(&[
            &header,
            &[Cell::Time(8, 0, 0), Cell::Time(17, 0, 0), Cell::Text("Ana"), Cell::Date(2023, 1, 2)],
            &[Cell::Time(8, 0, 0), Cell::Text("17:00:00"), Cell::Text("Ana"), Cell::Date(2023, 1, 3)],
            &[Cell::Text("08:00:00"), Cell::Time(17, 0, 0), Cell::Text("Ana"), Cell::Date(2023, 1, 4)],
            &[Cell::Time(22, 0, 0), Cell::Time(6, 0, 0), Cell::Text("Ben"), Cell::Date(2023, 1, 2)],
        ]);

        let req = upload_request("file", "typed.xlsx", &bytes).to_request();
        let body: ParseExcelResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.degraded_rows, 0);

        let rows: Vec<(&str, Option<NaiveDate>, &str)> = body
            .data
            .iter()
            .map(|r| (r.nom.as_str(), r.date, r.travail.as_str()))
            .collect();
        let date = |d| NaiveDate::from_ymd_opt(2023, 1, d);
        assert_eq!(
            rows,
            [
                ("Ana", date(2), "09:00:00"),
                ("Ana", date(3), "09:00:00"),
                ("Ana", date(4), "09:00:00"),
                ("Ben", date(2), "08:00:00"),
            ]
        );
        assert_eq!(body.data[2].travail_cumulee, "27:00:00");
        assert_eq!(body.data[3].entree, "22:00:00");
    }

    #[actix_web::test]
    async fn unreadable_cells_are_reported_not_fatal() {
        let store = Arc::new(MemoryStore::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let app = upload_app!(store, audit);

        let bytes = workbook_bytes(&[HEADER, &["later", "17:00:00", "Ana", "02/01/2023"]]);
        let req = upload_request("file", "a.xlsx", &bytes).to_request();
        let body: ParseExcelResponse = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.total_records, 1);
        assert_eq!(body.degraded_rows, 1);
        assert_eq!(body.data[0].travail, "Abs");
    }

    #[actix_web::test]
    async fn missing_columns_are_rejected_with_details() {
        let store = Arc::new(MemoryStore::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let app = upload_app!(store, audit);

        let bytes = workbook_bytes(&[&["Entrée.", "Sortie.", "Nom."], &["08:00", "17:00", "Ana"]]);
        let req = upload_request("file", "a.xlsx", &bytes).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["details"]["missing"], serde_json::json!(["Date."]));
        assert_eq!(store.len(), 0);
        assert_eq!(audit.names(), [("parse_excel".to_string(), false)]);
    }

    #[actix_web::test]
    async fn non_excel_file_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let app = upload_app!(store, audit);

        let req = upload_request("file", "week.csv", b"a,b").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "File must be in Excel format (.xlsx or .xls)");
        assert!(audit.names().is_empty());
    }

    #[actix_web::test]
    async fn request_without_file_field_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let app = upload_app!(store, audit);

        let req = upload_request("other", "week.xlsx", b"x").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "No file provided");
    }

    #[actix_web::test]
    async fn oversized_upload_is_rejected() {
        let store = Arc::new(MemoryStore::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let app = upload_app!(store, audit);

        let big = vec![0u8; 70_000];
        let req = upload_request("file", "big.xlsx", &big).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(store.len(), 0);
    }

    #[actix_web::test]
    async fn listing_filters_by_name() {
        let time = |h| NaiveTime::from_hms_opt(h, 0, 0).unwrap();
        let date = NaiveDate::from_ymd_opt(2023, 1, 2);
        let store = Arc::new(MemoryStore::with_records(vec![
            CanonicalRecord::worked("Yasmin Mrabet", date, time(8), time(17), 9 * 3600),
            CanonicalRecord::absent("Ben Ali", date),
        ]));
        let audit = Arc::new(MemoryAuditLog::default());
        let app = upload_app!(store, audit);

        let req = test::TestRequest::get().uri("/api/dbbi/all").to_request();
        let all: Vec<AttendanceView> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(all.len(), 2);

        let req = test::TestRequest::get()
            .uri("/api/dbbi/all?nom=MRABET")
            .to_request();
        let by_name: Vec<AttendanceView> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(by_name.len(), 1);
        assert_eq!(by_name[0].travail, "09:00:00");

        let req = test::TestRequest::get()
            .uri("/api/dbbi/all?prefix=ben")
            .to_request();
        let by_prefix: Vec<AttendanceView> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(by_prefix.len(), 1);
        assert_eq!(by_prefix[0].entree, "Abs");
    }

    #[actix_web::test]
    async fn sample_data_describes_the_layout() {
        let store = Arc::new(MemoryStore::default());
        let audit = Arc::new(MemoryAuditLog::default());
        let app = upload_app!(store, audit);

        let req = test::TestRequest::get().uri("/api/dbbi/sample-data").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["sample_record"]["Nom"], "Yasmin Mrabet");
        assert_eq!(body["columns"].as_array().map(Vec::len), Some(6));
    }
}
