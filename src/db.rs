use anyhow::{Context as _, Result, anyhow};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::pipeline::ReadingSink;
use crate::reading::NormalizedReading;

pub async fn new_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .connect(database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    Ok(pool)
}

pub async fn insert_reading(pool: &PgPool, reading: &NormalizedReading) -> Result<()> {
    let measured_at = reading
        .measured_at()
        .ok_or_else(|| anyhow!("timestamp out of range: {}", reading.timestamp_ms))?;
    let fields = &reading.fields;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    sqlx::query(
        r#"
        INSERT INTO air_quality_readings (node_id, measured_at, aqi_category, pm1, pm25, pm4, pm10, voc, nox, temperature, humidity, aqi)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        "#,
    )
    .bind(reading.node_id.as_str())
    .bind(measured_at)
    .bind(reading.aqi.category.as_str())
    .bind(fields.pm1)
    .bind(fields.pm25)
    .bind(fields.pm4)
    .bind(fields.pm10)
    .bind(fields.voc)
    .bind(fields.nox)
    .bind(fields.temperature)
    .bind(fields.humidity)
    .bind(reading.aqi.aqi)
    .execute(&mut *tx)
    .await
    .context("failed to execute insert query")?;

    tx.commit().await.context("failed to commit transaction")?;

    Ok(())
}

/// Writes each reading as one row of `air_quality_readings`.
#[derive(Debug, Clone)]
pub struct PgReadingSink {
    pool: PgPool,
}

impl PgReadingSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl ReadingSink for PgReadingSink {
    async fn write(&self, reading: &NormalizedReading) -> Result<()> {
        insert_reading(&self.pool, reading)
            .await
            .with_context(|| format!("failed to insert reading from {}", reading.node_id))
    }
}
