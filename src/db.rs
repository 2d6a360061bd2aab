use sqlx::MySqlPool;

pub async fn init_db(database_url: &str) -> Result<MySqlPool, sqlx::Error> {
    let pool = MySqlPool::connect(database_url).await?;
    ensure_schema(&pool).await?;
    Ok(pool)
}

/// Creates the tables on first start. Values are stored encrypted, so the
/// uniqueness of (nom, date) is carried by the `record_key` blind index.
async fn ensure_schema(pool: &MySqlPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance_records (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
            record_key CHAR(64) NOT NULL,
            nom TEXT NOT NULL,
            date TEXT NULL,
            entree TEXT NULL,
            sortie TEXT NULL,
            travail TEXT NULL,
            travail_cumulee TEXT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE KEY uq_attendance_record_key (record_key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS function_results (
            id BIGINT UNSIGNED NOT NULL AUTO_INCREMENT PRIMARY KEY,
            function_name VARCHAR(255) NOT NULL,
            arguments TEXT NULL,
            result LONGTEXT NULL,
            success BOOLEAN NOT NULL DEFAULT TRUE,
            error_message TEXT NULL,
            executed_at DATETIME NOT NULL,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            INDEX idx_function_results_executed_at (executed_at)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
