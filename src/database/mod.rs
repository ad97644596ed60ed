use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::chunking::ChunkDocument;
use crate::database::models::{PatientRow, PersistedChunk};
use crate::database::queries::{ChunkQueries, PatientQueries, SourceQueries};
use crate::sources::PatientSources;

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    /// In-memory database, used by tests. A single pooled connection
    /// keeps the database alive for the pool's lifetime.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to create in-memory database")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Cheap connectivity probe used by the operational endpoint before
    /// it starts a run.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Page of patients to process; empty on query failure.
    pub async fn fetch_patients(
        &self,
        patient_id: Option<&str>,
        organization_id: Option<&str>,
        limit: i64,
    ) -> Vec<PatientRow> {
        PatientQueries::list_for_indexing(&self.pool, patient_id, organization_id, limit).await
    }

    /// Fetch all five source row sets for one patient concurrently.
    /// Each query is independently fault-tolerant, so the result holds
    /// whatever subset of sources was reachable. The two pain tables
    /// merge into one stream here, legacy rows first.
    pub async fn fetch_patient_sources(
        &self,
        patient_id: &str,
        organization_id: Option<&str>,
    ) -> PatientSources {
        let (sessions, medical_records, goals, legacy_pain, recent_pain) = tokio::join!(
            SourceQueries::sessions(&self.pool, patient_id, organization_id),
            SourceQueries::medical_records(&self.pool, patient_id, organization_id),
            SourceQueries::goals(&self.pool, patient_id, organization_id),
            SourceQueries::pain_records(&self.pool, patient_id, organization_id),
            SourceQueries::patient_pain_records(&self.pool, patient_id, organization_id),
        );

        let mut pain_records = legacy_pain;
        pain_records.extend(recent_pain);

        PatientSources {
            sessions,
            medical_records,
            goals,
            pain_records,
        }
    }

    /// Transactionally replace the patient's persisted chunk set.
    pub async fn replace_patient_chunks(
        &self,
        patient_id: &str,
        chunks: &[ChunkDocument],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        ChunkQueries::replace_for_patient(&self.pool, patient_id, chunks, embeddings).await
    }

    pub async fn delete_patient_chunks(
        &self,
        patient_id: &str,
        organization_id: Option<&str>,
    ) -> Result<u64> {
        ChunkQueries::delete_for_patient(&self.pool, patient_id, organization_id).await
    }

    pub async fn chunks_for_patient(&self, patient_id: &str) -> Result<Vec<PersistedChunk>> {
        ChunkQueries::list_for_patient(&self.pool, patient_id).await
    }

    pub async fn count_chunks_for_patient(&self, patient_id: &str) -> Result<i64> {
        ChunkQueries::count_for_patient(&self.pool, patient_id).await
    }
}
