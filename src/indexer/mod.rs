//! Batch orchestration of the per-patient index pipeline, plus the
//! best-effort single-patient trigger used from record-mutation flows.


use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::chunking::{self, ChunkingConfig, MIN_CHUNKS_PER_PATIENT};
use crate::config::{FlagProvider, IndexingConfig};
use crate::database::Database;
use crate::database::models::PatientRow;
use crate::embeddings::EmbeddingProvider;
use crate::normalize::clean_string;
use crate::sources;
use crate::{RagError, Result};

/// Parameters of one maintenance run. All fields are optional and
/// defaulted; bad input is clamped, never rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RebuildRequest {
    pub patient_id: Option<String>,
    pub organization_id: Option<String>,
    pub limit: Option<i64>,
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    #[serde(rename = "dry-run")]
    DryRun,
    #[serde(rename = "write")]
    Write,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexStatus {
    Indexed,
    Skipped,
    Error,
}

/// Run accounting for one patient. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientProcessResult {
    pub patient_id: String,
    pub chunk_count: usize,
    pub status: IndexStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate report of one maintenance run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RebuildReport {
    pub success: bool,
    pub mode: RunMode,
    pub processed_patients: usize,
    pub indexed_chunks: usize,
    pub skipped_patients: usize,
    pub patients: Vec<PatientProcessResult>,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TriggerRequest {
    pub patient_id: String,
    pub organization_id: Option<String>,
    /// Opaque, logged only; says why a reindex was triggered.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOutcome {
    pub success: bool,
    pub indexed_chunks: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearOutcome {
    pub success: bool,
    pub deleted_chunks: u64,
}

impl TriggerOutcome {
    fn noop() -> Self {
        Self {
            success: false,
            indexed_chunks: 0,
        }
    }
}

/// Drives the full pipeline per patient: aggregate sources, chunk, cap,
/// embed, write. Patients are processed strictly sequentially; one
/// patient's failure never aborts the batch.
pub struct RagIndexer<E> {
    database: Database,
    embedder: E,
    chunking: ChunkingConfig,
    limits: IndexingConfig,
}

struct PatientOutcome {
    result: PatientProcessResult,
    skipped: bool,
}

impl PatientOutcome {
    fn indexed(patient_id: &str, chunk_count: usize) -> Self {
        Self {
            result: PatientProcessResult {
                patient_id: patient_id.to_string(),
                chunk_count,
                status: IndexStatus::Indexed,
                error: None,
            },
            skipped: false,
        }
    }

    fn skipped(patient_id: &str) -> Self {
        Self {
            result: PatientProcessResult {
                patient_id: patient_id.to_string(),
                chunk_count: 0,
                status: IndexStatus::Skipped,
                error: None,
            },
            skipped: true,
        }
    }

    fn error(patient_id: &str, chunk_count: usize, message: &str, skipped: bool) -> Self {
        Self {
            result: PatientProcessResult {
                patient_id: patient_id.to_string(),
                chunk_count,
                status: IndexStatus::Error,
                error: Some(message.to_string()),
            },
            skipped,
        }
    }
}

impl<E: EmbeddingProvider> RagIndexer<E> {
    #[inline]
    pub fn new(database: Database, embedder: E, chunking: ChunkingConfig, limits: IndexingConfig) -> Self {
        Self {
            database,
            embedder,
            chunking,
            limits,
        }
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Run the pipeline over a page of patients and produce the run
    /// report. Per-patient failures are recorded and processing moves
    /// on; the report itself is always produced.
    pub async fn rebuild(&self, request: &RebuildRequest) -> RebuildReport {
        let started = Instant::now();

        let limit = self.sanitize_limit(request.limit);
        let dry_run = request.dry_run;
        let max_chunks = self.limits.max_chunks_per_patient.max(MIN_CHUNKS_PER_PATIENT) as usize;

        let patient_filter = clean_string(request.patient_id.as_deref());
        let organization_filter = clean_string(request.organization_id.as_deref());

        let patients = self
            .database
            .fetch_patients(patient_filter.as_deref(), organization_filter.as_deref(), limit)
            .await;

        let mut results = Vec::with_capacity(patients.len());
        let mut indexed_chunks = 0;
        let mut skipped_patients = 0;

        for patient in &patients {
            let Some(patient_id) = clean_string(Some(&patient.id)) else {
                skipped_patients += 1;
                continue;
            };

            let organization_id = clean_string(patient.organization_id.as_deref())
                .or_else(|| organization_filter.clone());

            let outcome = match self
                .index_one(patient, &patient_id, organization_id.as_deref(), dry_run, max_chunks)
                .await
            {
                Ok(outcome) => outcome,
                Err(error) => PatientOutcome::error(&patient_id, 0, &format!("{error:#}"), true),
            };

            if outcome.skipped {
                skipped_patients += 1;
            }
            if outcome.result.status == IndexStatus::Indexed {
                indexed_chunks += outcome.result.chunk_count;
            }
            results.push(outcome.result);
        }

        let report = RebuildReport {
            success: true,
            mode: if dry_run { RunMode::DryRun } else { RunMode::Write },
            processed_patients: patients.len(),
            indexed_chunks,
            skipped_patients,
            patients: results,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
        };

        info!(
            "Index maintenance run finished: {} patients, {} chunks, {} skipped, {}ms",
            report.processed_patients,
            report.indexed_chunks,
            report.skipped_patients,
            report.duration_ms
        );

        report
    }

    /// Administrative entry point: same run, behind a role check. The
    /// caller resolves the user's role; anything outside the admin set
    /// is rejected before any pipeline work starts.
    pub async fn rebuild_for_admin(
        &self,
        role: Option<&str>,
        request: &RebuildRequest,
    ) -> Result<RebuildReport> {
        match clean_string(role).as_deref() {
            Some("admin" | "owner" | "superadmin") => Ok(self.rebuild(request).await),
            _ => Err(RagError::PermissionDenied("Admin only".to_string())),
        }
    }

    /// Best-effort single-patient reindex, safe to call from unrelated
    /// CRUD flows. Disabled feature flag, blank patient id, and every
    /// error inside the run all collapse to a no-op failure outcome;
    /// nothing here may break the caller's primary operation.
    pub async fn trigger_patient_reindex(
        &self,
        request: &TriggerRequest,
        flags: &dyn FlagProvider,
    ) -> TriggerOutcome {
        if !flags.indexing_enabled() {
            return TriggerOutcome::noop();
        }

        let Some(patient_id) = clean_string(Some(&request.patient_id)) else {
            return TriggerOutcome::noop();
        };
        let reason = request.reason.clone().unwrap_or_else(|| "unspecified".to_string());

        let report = self
            .rebuild(&RebuildRequest {
                patient_id: Some(patient_id.clone()),
                organization_id: clean_string(request.organization_id.as_deref()),
                limit: Some(1),
                dry_run: false,
            })
            .await;

        let Some(result) = report.patients.first() else {
            warn!("Incremental reindex selected no patients (patient {patient_id}, reason {reason})");
            return TriggerOutcome::noop();
        };

        if result.status == IndexStatus::Error {
            warn!(
                "Incremental reindex for patient {} returned error status (reason {}): {}",
                patient_id,
                reason,
                result.error.as_deref().unwrap_or("unknown")
            );
            return TriggerOutcome::noop();
        }

        info!(
            "Incremental reindex completed for patient {} ({} chunks, reason {}, {}ms)",
            patient_id, result.chunk_count, reason, report.duration_ms
        );

        TriggerOutcome {
            success: true,
            indexed_chunks: result.chunk_count,
        }
    }

    /// Delete all persisted chunks for one patient. Used when the
    /// feature is disabled or a patient/record is deleted; like the
    /// trigger, errors are logged and swallowed.
    pub async fn clear_patient_index(
        &self,
        patient_id: &str,
        organization_id: Option<&str>,
        flags: &dyn FlagProvider,
    ) -> ClearOutcome {
        if !flags.indexing_enabled() {
            return ClearOutcome {
                success: false,
                deleted_chunks: 0,
            };
        }

        let Some(patient_id) = clean_string(Some(patient_id)) else {
            return ClearOutcome {
                success: false,
                deleted_chunks: 0,
            };
        };

        match self
            .database
            .delete_patient_chunks(&patient_id, clean_string(organization_id).as_deref())
            .await
        {
            Ok(deleted_chunks) => {
                info!("Cleared index for patient {patient_id}: {deleted_chunks} chunks");
                ClearOutcome {
                    success: true,
                    deleted_chunks,
                }
            }
            Err(error) => {
                warn!("Failed to clear index for patient {patient_id}: {error:#}");
                ClearOutcome {
                    success: false,
                    deleted_chunks: 0,
                }
            }
        }
    }

    async fn index_one(
        &self,
        patient: &PatientRow,
        patient_id: &str,
        organization_id: Option<&str>,
        dry_run: bool,
        max_chunks: usize,
    ) -> anyhow::Result<PatientOutcome> {
        let source_rows = self
            .database
            .fetch_patient_sources(patient_id, organization_id)
            .await;
        let documents = sources::build_source_documents(patient, &source_rows);
        let chunks = chunking::build_chunk_documents(
            patient_id,
            organization_id,
            &documents,
            max_chunks,
            &self.chunking,
        );

        // Nothing indexable yet: a skip, not a failure.
        if chunks.is_empty() {
            return Ok(PatientOutcome::skipped(patient_id));
        }

        // Dry run reports the would-be chunk volume without touching
        // the embedding provider or the index.
        if dry_run {
            return Ok(PatientOutcome::indexed(patient_id, chunks.len()));
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.chunk_text.clone()).collect();
        let mut embeddings = self.embedder.embed_texts(texts).await?;

        if embeddings.is_empty() {
            return Ok(PatientOutcome::error(
                patient_id,
                chunks.len(),
                "Embedding generation returned no vectors",
                true,
            ));
        }

        // A short result means partial provider failure: pad the tail
        // with empty vectors so the embedded prefix is still written.
        let partial = embeddings.len() != chunks.len();
        if partial {
            embeddings.resize(chunks.len(), Vec::new());
        }

        let inserted = self
            .database
            .replace_patient_chunks(patient_id, &chunks, &embeddings)
            .await?;

        if partial && inserted == 0 {
            return Ok(PatientOutcome::error(patient_id, 0, "No chunks inserted", false));
        }

        Ok(PatientOutcome::indexed(patient_id, inserted))
    }

    fn sanitize_limit(&self, limit: Option<i64>) -> i64 {
        let max_limit = i64::from(self.limits.max_limit);
        match limit {
            Some(value) if value > 0 => value.min(max_limit),
            _ => i64::from(self.limits.default_limit).min(max_limit),
        }
    }
}

/// Fire-and-forget dispatch of the incremental trigger: the reindex runs
/// on a detached task with its own error boundary so the caller's
/// primary mutation never waits on, or fails because of, indexing.
pub fn spawn_patient_reindex<E>(
    indexer: Arc<RagIndexer<E>>,
    flags: Arc<dyn FlagProvider>,
    request: TriggerRequest,
) -> tokio::task::JoinHandle<()>
where
    E: EmbeddingProvider + 'static,
{
    tokio::spawn(async move {
        let outcome = indexer.trigger_patient_reindex(&request, flags.as_ref()).await;
        if !outcome.success {
            warn!(
                "Detached reindex for patient {} did not complete",
                request.patient_id
            );
        }
    })
}
