
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, warn};

use super::models::{GoalRow, MedicalRecordRow, PainRecordRow, PatientRow, PersistedChunk, SessionRow};
use crate::chunking::ChunkDocument;

const SESSIONS_CAP: i64 = 80;
const MEDICAL_RECORDS_CAP: i64 = 60;
const GOALS_CAP: i64 = 30;
const PAIN_RECORDS_CAP: i64 = 30;

/// Absorb a failed source query into "zero rows". A missing table or a
/// transient error must never abort a patient; the reachable sources
/// still get indexed.
fn absorb<T>(label: &str, result: std::result::Result<Vec<T>, sqlx::Error>) -> Vec<T> {
    match result {
        Ok(rows) => rows,
        Err(error) => {
            warn!("RAG indexing query failed ({label}): {error}");
            Vec::new()
        }
    }
}

pub struct PatientQueries;

impl PatientQueries {
    /// Select the page of patients to process, most recently updated
    /// first. Fault-tolerant: failure yields an empty page.
    #[inline]
    pub async fn list_for_indexing(
        pool: &SqlitePool,
        patient_id: Option<&str>,
        organization_id: Option<&str>,
        limit: i64,
    ) -> Vec<PatientRow> {
        let mut where_parts = Vec::new();
        if patient_id.is_some() {
            where_parts.push("id = ?");
        }
        if organization_id.is_some() {
            where_parts.push("organization_id = ?");
        }
        let where_clause = if where_parts.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", where_parts.join(" AND "))
        };

        let sql = format!(
            r#"
            SELECT id, organization_id, name, main_condition, medical_history
            FROM patients
            {where_clause}
            ORDER BY COALESCE(updated_at, created_at, CURRENT_TIMESTAMP) DESC
            LIMIT ?
            "#
        );

        let mut query = sqlx::query_as::<_, PatientRow>(&sql);
        if let Some(patient_id) = patient_id {
            query = query.bind(patient_id);
        }
        if let Some(organization_id) = organization_id {
            query = query.bind(organization_id);
        }
        query = query.bind(limit);

        absorb("patients", query.fetch_all(pool).await)
    }
}

pub struct SourceQueries;

impl SourceQueries {
    #[inline]
    pub async fn sessions(
        pool: &SqlitePool,
        patient_id: &str,
        organization_id: Option<&str>,
    ) -> Vec<SessionRow> {
        let sql = with_org_filter(
            r#"
            SELECT id, session_date, evolution, observations, next_session_goals,
                   pain_level_before, pain_level_after
            FROM treatment_sessions
            WHERE patient_id = ?{org}
            ORDER BY session_date DESC, created_at DESC
            LIMIT ?
            "#,
            organization_id,
        );

        absorb(
            "treatment_sessions",
            bind_scope(sqlx::query_as::<_, SessionRow>(&sql), patient_id, organization_id)
                .bind(SESSIONS_CAP)
                .fetch_all(pool)
                .await,
        )
    }

    #[inline]
    pub async fn medical_records(
        pool: &SqlitePool,
        patient_id: &str,
        organization_id: Option<&str>,
    ) -> Vec<MedicalRecordRow> {
        let sql = with_org_filter(
            r#"
            SELECT id, record_date, type AS record_type, title, content
            FROM medical_records
            WHERE patient_id = ?{org}
            ORDER BY record_date DESC, created_at DESC
            LIMIT ?
            "#,
            organization_id,
        );

        absorb(
            "medical_records",
            bind_scope(
                sqlx::query_as::<_, MedicalRecordRow>(&sql),
                patient_id,
                organization_id,
            )
            .bind(MEDICAL_RECORDS_CAP)
            .fetch_all(pool)
            .await,
        )
    }

    #[inline]
    pub async fn goals(
        pool: &SqlitePool,
        patient_id: &str,
        organization_id: Option<&str>,
    ) -> Vec<GoalRow> {
        let sql = with_org_filter(
            r#"
            SELECT id, description, status, priority, target_date
            FROM patient_goals
            WHERE patient_id = ?{org}
            ORDER BY target_date DESC NULLS LAST
            LIMIT ?
            "#,
            organization_id,
        );

        absorb(
            "patient_goals",
            bind_scope(sqlx::query_as::<_, GoalRow>(&sql), patient_id, organization_id)
                .bind(GOALS_CAP)
                .fetch_all(pool)
                .await,
        )
    }

    /// Legacy pain table, keyed by `record_date`.
    #[inline]
    pub async fn pain_records(
        pool: &SqlitePool,
        patient_id: &str,
        organization_id: Option<&str>,
    ) -> Vec<PainRecordRow> {
        let sql = with_org_filter(
            r#"
            SELECT id, record_date, pain_level, notes
            FROM pain_records
            WHERE patient_id = ?{org}
            ORDER BY record_date DESC, created_at DESC
            LIMIT ?
            "#,
            organization_id,
        );

        absorb(
            "pain_records",
            bind_scope(sqlx::query_as::<_, PainRecordRow>(&sql), patient_id, organization_id)
                .bind(PAIN_RECORDS_CAP)
                .fetch_all(pool)
                .await,
        )
    }

    /// Newer pain table, keyed by `created_at`. The timestamp is aliased
    /// onto `record_date` so both tables feed one rendering path.
    #[inline]
    pub async fn patient_pain_records(
        pool: &SqlitePool,
        patient_id: &str,
        organization_id: Option<&str>,
    ) -> Vec<PainRecordRow> {
        let sql = with_org_filter(
            r#"
            SELECT id, created_at AS record_date, pain_level, notes
            FROM patient_pain_records
            WHERE patient_id = ?{org}
            ORDER BY created_at DESC
            LIMIT ?
            "#,
            organization_id,
        );

        absorb(
            "patient_pain_records",
            bind_scope(sqlx::query_as::<_, PainRecordRow>(&sql), patient_id, organization_id)
                .bind(PAIN_RECORDS_CAP)
                .fetch_all(pool)
                .await,
        )
    }
}

fn with_org_filter(template: &str, organization_id: Option<&str>) -> String {
    let org = if organization_id.is_some() {
        " AND organization_id = ?"
    } else {
        ""
    };
    template.replace("{org}", org)
}

fn bind_scope<'q, T>(
    query: sqlx::query::QueryAs<'q, sqlx::Sqlite, T, sqlx::sqlite::SqliteArguments<'q>>,
    patient_id: &'q str,
    organization_id: Option<&'q str>,
) -> sqlx::query::QueryAs<'q, sqlx::Sqlite, T, sqlx::sqlite::SqliteArguments<'q>> {
    let query = query.bind(patient_id);
    match organization_id {
        Some(organization_id) => query.bind(organization_id),
        None => query,
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    /// Atomically replace a patient's indexed chunk set: delete all
    /// existing rows, insert the new chunk/embedding pairs, commit. A
    /// chunk paired with an empty embedding is skipped, not an error;
    /// that is how partial-embedding salvage surfaces as a smaller but
    /// valid index. Any insert failure rolls the whole replace back.
    #[inline]
    pub async fn replace_for_patient(
        pool: &SqlitePool,
        patient_id: &str,
        chunks: &[ChunkDocument],
        embeddings: &[Vec<f32>],
    ) -> Result<usize> {
        let mut transaction = pool
            .begin()
            .await
            .context("Failed to begin index replace transaction")?;

        sqlx::query("DELETE FROM patient_rag_chunks WHERE patient_id = ?")
            .bind(patient_id)
            .execute(&mut *transaction)
            .await
            .context("Failed to delete existing index chunks")?;

        let mut inserted = 0;
        let now = Utc::now().naive_utc();

        for (chunk, embedding) in chunks.iter().zip(embeddings.iter()) {
            if embedding.is_empty() {
                continue;
            }

            let embedding_json =
                serde_json::to_string(embedding).context("Failed to serialize embedding")?;

            sqlx::query(
                r#"
                INSERT INTO patient_rag_chunks (
                    patient_id, organization_id, source_type, source_id, source_date,
                    document_key, chunk_index, chunk_text, chunk_hash, embedding,
                    metadata, created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&chunk.patient_id)
            .bind(chunk.organization_id.as_deref())
            .bind(chunk.source_type.as_str())
            .bind(&chunk.source_id)
            .bind(chunk.source_date.as_deref())
            .bind(&chunk.document_key)
            .bind(chunk.chunk_index as i64)
            .bind(&chunk.chunk_text)
            .bind(&chunk.chunk_hash)
            .bind(embedding_json)
            .bind(chunk.metadata.to_string())
            .bind(now)
            .bind(now)
            .execute(&mut *transaction)
            .await
            .context("Failed to insert index chunk")?;

            inserted += 1;
        }

        transaction
            .commit()
            .await
            .context("Failed to commit index replace transaction")?;

        debug!("Replaced index for patient {patient_id} with {inserted} chunks");
        Ok(inserted)
    }

    #[inline]
    pub async fn delete_for_patient(
        pool: &SqlitePool,
        patient_id: &str,
        organization_id: Option<&str>,
    ) -> Result<u64> {
        let result = match organization_id {
            Some(organization_id) => {
                sqlx::query(
                    "DELETE FROM patient_rag_chunks WHERE patient_id = ? AND organization_id = ?",
                )
                .bind(patient_id)
                .bind(organization_id)
                .execute(pool)
                .await
            }
            None => {
                sqlx::query("DELETE FROM patient_rag_chunks WHERE patient_id = ?")
                    .bind(patient_id)
                    .execute(pool)
                    .await
            }
        }
        .context("Failed to delete index chunks")?;

        Ok(result.rows_affected())
    }

    #[inline]
    pub async fn list_for_patient(pool: &SqlitePool, patient_id: &str) -> Result<Vec<PersistedChunk>> {
        let chunks = sqlx::query_as::<_, PersistedChunk>(
            r#"
            SELECT id, patient_id, organization_id, source_type, source_id, source_date,
                   document_key, chunk_index, chunk_text, chunk_hash, embedding,
                   metadata, created_at, updated_at
            FROM patient_rag_chunks
            WHERE patient_id = ?
            ORDER BY document_key, chunk_index
            "#,
        )
        .bind(patient_id)
        .fetch_all(pool)
        .await
        .context("Failed to list index chunks")?;

        Ok(chunks)
    }

    #[inline]
    pub async fn count_for_patient(pool: &SqlitePool, patient_id: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM patient_rag_chunks WHERE patient_id = ?")
                .bind(patient_id)
                .fetch_one(pool)
                .await
                .context("Failed to count index chunks")?;

        Ok(count)
    }
}
