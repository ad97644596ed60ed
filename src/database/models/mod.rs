#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Logical origin of a source document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    TreatmentSession,
    MedicalRecord,
    Goal,
    PainRecord,
}

impl SourceType {
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            SourceType::TreatmentSession => "treatment_session",
            SourceType::MedicalRecord => "medical_record",
            SourceType::Goal => "goal",
            SourceType::PainRecord => "pain_record",
        }
    }
}

impl std::fmt::Display for SourceType {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patient row as selected for indexing. Profile fields double as the
/// synthetic profile source document.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PatientRow {
    pub id: String,
    pub organization_id: Option<String>,
    pub name: Option<String>,
    pub main_condition: Option<String>,
    pub medical_history: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct SessionRow {
    pub id: Option<String>,
    pub session_date: Option<String>,
    pub evolution: Option<String>,
    pub observations: Option<String>,
    pub next_session_goals: Option<String>,
    // Pain levels arrive as loosely typed columns; coerced downstream.
    pub pain_level_before: Option<String>,
    pub pain_level_after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct MedicalRecordRow {
    pub id: Option<String>,
    pub record_date: Option<String>,
    pub record_type: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GoalRow {
    pub id: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub target_date: Option<String>,
}

/// Unified pain record. The legacy table keys by `record_date`; the newer
/// table keys by `created_at`, which the query layer aliases onto
/// `record_date` so both feed the same rendering path.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct PainRecordRow {
    pub id: Option<String>,
    pub record_date: Option<String>,
    pub pain_level: Option<String>,
    pub notes: Option<String>,
}

/// Durable index row, read back for verification and tooling.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PersistedChunk {
    pub id: i64,
    pub patient_id: String,
    pub organization_id: Option<String>,
    pub source_type: String,
    pub source_id: String,
    pub source_date: Option<String>,
    pub document_key: String,
    pub chunk_index: i64,
    pub chunk_text: String,
    pub chunk_hash: String,
    /// Embedding vector serialized as a JSON array.
    pub embedding: String,
    /// Provenance bag serialized as JSON.
    pub metadata: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl PersistedChunk {
    /// Decode the stored embedding. Rows written by the index writer
    /// always carry a non-empty vector.
    #[inline]
    pub fn embedding_vector(&self) -> anyhow::Result<Vec<f32>> {
        Ok(serde_json::from_str(&self.embedding)?)
    }
}
