use std::sync::Arc;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use anyhow::Context;
use dotenvy::dotenv;

mod api;
mod audit;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod pipeline;
mod routes;
mod store;
mod utils;

use config::Config;
use db::init_db;

use crate::audit::{AuditLog, MySqlAuditLog};
use crate::docs::openapi_for;
use crate::store::RecordStore;
use crate::store::mysql::MySqlRecordStore;
use crate::utils::cipher::FieldCipher;
use tracing::info;
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa_swagger_ui::SwaggerUi;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_ansi(false)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, prefix = %config.api_prefix, "Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .context("failed to connect to the database")?;

    let store: Arc<dyn RecordStore> = Arc::new(MySqlRecordStore::new(
        pool.clone(),
        FieldCipher::new(&config.field_encryption_key),
    ));
    let audit: Arc<dyn AuditLog> = Arc::new(MySqlAuditLog::new(pool));

    let server_addr = config.server_addr.clone();
    let openapi = openapi_for(&config.api_prefix);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // wildcard matches the JS/CSS assets
                    .url("/api-doc/openapi.json", openapi.clone()),
            )
            .app_data(Data::from(store.clone()))
            .app_data(Data::from(audit.clone()))
            .app_data(Data::new(config.clone()))
            .configure(|cfg| routes::configure(cfg, &config))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
