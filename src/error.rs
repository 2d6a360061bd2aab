use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::{Value, json};
use thiserror::Error;

use crate::store::StoreError;

/// Required spreadsheet columns are missing; the whole upload is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Colonnes requises manquantes: {missing:?}. Disponibles: {available:?}")]
pub struct SchemaError {
    pub missing: Vec<String>,
    pub available: Vec<String>,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("{0}")]
    BadRequest(String),

    #[error("Cannot read Excel file. Please ensure it's a valid Excel file (.xls or .xlsx). Error: {0}")]
    Workbook(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn details(&self) -> Option<Value> {
        match self {
            AppError::Schema(e) => Some(json!({
                "missing": e.missing,
                "available": e.available,
            })),
            _ => None,
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::Schema(_) | AppError::BadRequest(_) | AppError::Workbook(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Store(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = match self.details() {
            Some(details) => json!({ "error": self.to_string(), "details": details }),
            None => json!({ "error": self.to_string() }),
        };
        HttpResponse::build(status).json(body)
    }
}
