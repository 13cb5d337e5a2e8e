use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cloudprint_core::{FileRecord, FileRecordId, FileStatus, NewFileRecord};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};
use std::time::Duration;

use crate::repository::FileRecordRepository;

const FILE_RECORD_COLUMNS: &str = "id, owner_id, original_name, stored_path, byte_size, \
    content_type, digest, page_count, preview_path, preview_note, status, error, \
    created_at, updated_at";

/// Connect to Postgres and apply pending migrations.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool> {
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .idle_timeout(Duration::from_secs(600))
        .max_lifetime(Duration::from_secs(1800))
        .connect(database_url)
        .await
        .context("Failed to connect to database")?;

    tracing::info!(max_connections, "Database connected successfully");

    sqlx::migrate!("../../migrations")
        .run(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database migrations applied");

    Ok(pool)
}

#[derive(Clone)]
pub struct PgFileRecordRepository {
    pool: PgPool,
}

impl PgFileRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FileRecordRepository for PgFileRecordRepository {
    #[tracing::instrument(skip(self, new), fields(db.table = "file_records", owner_id = new.owner_id))]
    async fn create(&self, new: NewFileRecord, now: DateTime<Utc>) -> Result<FileRecord> {
        let query = format!(
            r#"
            INSERT INTO file_records
                (owner_id, original_name, stored_path, byte_size, content_type,
                 page_count, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, 0, $6, $7, $7)
            RETURNING {}
            "#,
            FILE_RECORD_COLUMNS
        );
        sqlx::query_as::<Postgres, FileRecord>(&query)
            .bind(new.owner_id)
            .bind(&new.original_name)
            .bind(&new.stored_path)
            .bind(new.byte_size)
            .bind(&new.content_type)
            .bind(FileStatus::Created.code())
            .bind(now)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to insert file record");
                e
            })
            .context("Failed to create file record")
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_records"))]
    async fn get(&self, id: FileRecordId) -> Result<Option<FileRecord>> {
        let query = format!("SELECT {} FROM file_records WHERE id = $1", FILE_RECORD_COLUMNS);
        sqlx::query_as::<Postgres, FileRecord>(&query)
            .bind(id.as_i64())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch file record")
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "file_records", file_id = %record.id, status = %record.status))]
    async fn upsert(&self, record: &FileRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO file_records
                (id, owner_id, original_name, stored_path, byte_size, content_type, digest,
                 page_count, preview_path, preview_note, status, error, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (id) DO UPDATE SET
                owner_id = EXCLUDED.owner_id,
                original_name = EXCLUDED.original_name,
                stored_path = EXCLUDED.stored_path,
                byte_size = EXCLUDED.byte_size,
                content_type = EXCLUDED.content_type,
                digest = EXCLUDED.digest,
                page_count = EXCLUDED.page_count,
                preview_path = EXCLUDED.preview_path,
                preview_note = EXCLUDED.preview_note,
                status = EXCLUDED.status,
                error = EXCLUDED.error,
                created_at = EXCLUDED.created_at,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.id.as_i64())
        .bind(record.owner_id)
        .bind(&record.original_name)
        .bind(&record.stored_path)
        .bind(record.byte_size)
        .bind(&record.content_type)
        .bind(&record.digest)
        .bind(record.page_count)
        .bind(&record.preview_path)
        .bind(&record.preview_note)
        .bind(record.status.code())
        .bind(&record.error)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .context("Failed to upsert file record")?;

        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "file_records"))]
    async fn list_by_status(&self, statuses: &[FileStatus]) -> Result<Vec<FileRecord>> {
        let codes: Vec<i16> = statuses.iter().map(FileStatus::code).collect();
        let query = format!(
            "SELECT {} FROM file_records WHERE status = ANY($1) ORDER BY created_at, id",
            FILE_RECORD_COLUMNS
        );
        sqlx::query_as::<Postgres, FileRecord>(&query)
            .bind(codes)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list file records by status")
    }
}
