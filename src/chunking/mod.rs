//! Windowed text chunking with deterministic, content-addressed identity.


use std::fmt::Write;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::database::models::SourceType;
use crate::sources::SourceDocument;

/// Truncated hash length, in hex characters. 128 bits is plenty for the
/// bounded chunk cardinality of a single patient index.
const CHUNK_HASH_LEN: usize = 32;

/// Chunk lists per patient never truncate below this floor.
pub const MIN_CHUNKS_PER_PATIENT: u32 = 20;

/// Chunking window configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Window size in characters.
    pub chunk_size: usize,
    /// Back-step between adjacent windows, in characters. Must be
    /// smaller than `chunk_size` to guarantee forward progress.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 520,
            chunk_overlap: 100,
        }
    }
}

/// A bounded slice of one source document, the atomic unit of the index.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkDocument {
    pub patient_id: String,
    pub organization_id: Option<String>,
    pub source_type: SourceType,
    pub source_id: String,
    pub source_date: Option<String>,
    pub document_key: String,
    pub chunk_index: usize,
    pub chunk_text: String,
    pub chunk_hash: String,
    pub metadata: Value,
}

/// Split text into overlapping fixed-size windows, counted in characters.
///
/// The emitted windows cover the whole text with no gaps; each advances
/// at least `chunk_size - chunk_overlap` characters, so the loop
/// terminates for any overlap smaller than the window.
pub fn split_into_chunks(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= config.chunk_size {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0;
    loop {
        let end = (start + config.chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end >= chars.len() {
            break;
        }
        start = end.saturating_sub(config.chunk_overlap);
    }
    chunks
}

/// Deterministic content-derived chunk identity: sha-256 over the
/// patient, document key, window position and text, truncated to
/// [`CHUNK_HASH_LEN`] hex characters. Re-chunking unchanged text yields
/// identical hashes, which is what makes reindex runs idempotent.
pub fn chunk_hash(patient_id: &str, document_key: &str, chunk_index: usize, chunk_text: &str) -> String {
    let digest = Sha256::digest(
        format!("{patient_id}:{document_key}:{chunk_index}:{chunk_text}").as_bytes(),
    );
    let mut hex = String::with_capacity(CHUNK_HASH_LEN);
    for byte in digest.iter().take(CHUNK_HASH_LEN / 2) {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}

/// Chunk every source document for one patient, flatten in document
/// order and truncate to the per-patient cap (prefix take, favoring the
/// profile and most recent rows).
///
/// `chunk_index` is assigned by position in the pre-filter window
/// sequence: a window that trims to empty is dropped but still consumes
/// its index slot, so `document_key + chunk_index` stays stable across
/// reindex runs.
pub fn build_chunk_documents(
    patient_id: &str,
    organization_id: Option<&str>,
    source_documents: &[SourceDocument],
    max_chunks: usize,
    config: &ChunkingConfig,
) -> Vec<ChunkDocument> {
    let mut chunks = Vec::new();

    for document in source_documents {
        let document_key = format!("{}:{}", document.source_type, document.source_id);

        for (chunk_index, window) in split_into_chunks(&document.text, config).iter().enumerate() {
            let chunk_text = window.trim();
            if chunk_text.is_empty() {
                continue;
            }

            chunks.push(ChunkDocument {
                patient_id: patient_id.to_string(),
                organization_id: organization_id.map(str::to_string),
                source_type: document.source_type,
                source_id: document.source_id.clone(),
                source_date: document.source_date.clone(),
                document_key: document_key.clone(),
                chunk_index,
                chunk_text: chunk_text.to_string(),
                chunk_hash: chunk_hash(patient_id, &document_key, chunk_index, chunk_text),
                metadata: document.metadata.clone(),
            });
        }
    }

    let cap = max_chunks.max(1);
    if chunks.len() > cap {
        debug!(
            "Capping chunk list for patient {} from {} to {}",
            patient_id,
            chunks.len(),
            cap
        );
        chunks.truncate(cap);
    }
    chunks
}
