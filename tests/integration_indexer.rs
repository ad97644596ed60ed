//! End-to-end pipeline runs against an in-memory store: seed clinical
//! rows, rebuild, and inspect what was persisted.

use async_trait::async_trait;

use clinrag::chunking::ChunkingConfig;
use clinrag::config::IndexingConfig;
use clinrag::database::Database;
use clinrag::embeddings::EmbeddingProvider;
use clinrag::indexer::{IndexStatus, RagIndexer, RebuildRequest};

struct CountingEmbedder;

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed_texts(&self, texts: Vec<String>) -> anyhow::Result<Vec<Vec<f32>>> {
        // Vector content is irrelevant here; length keeps positions honest.
        Ok(texts
            .iter()
            .map(|text| vec![text.chars().count() as f32])
            .collect())
    }
}

async fn indexer() -> RagIndexer<CountingEmbedder> {
    indexer_with_limits(IndexingConfig::default()).await
}

async fn indexer_with_limits(limits: IndexingConfig) -> RagIndexer<CountingEmbedder> {
    let db = Database::in_memory().await.expect("in-memory db");
    RagIndexer::new(db, CountingEmbedder, ChunkingConfig::default(), limits)
}

async fn seed_bare_patient(db: &Database, id: &str) {
    sqlx::query("INSERT INTO patients (id) VALUES (?)")
        .bind(id)
        .execute(db.pool())
        .await
        .expect("seed patient");
}

async fn seed_note(db: &Database, id: &str, patient_id: &str, content: &str) {
    sqlx::query(
        "INSERT INTO medical_records (id, patient_id, record_date, type, content)
         VALUES (?, ?, '2026-03-01', 'progress', ?)",
    )
    .bind(id)
    .bind(patient_id)
    .bind(content)
    .execute(db.pool())
    .await
    .expect("seed note");
}

fn request_for(patient_id: &str) -> RebuildRequest {
    RebuildRequest {
        patient_id: Some(patient_id.to_string()),
        ..RebuildRequest::default()
    }
}

#[tokio::test]
async fn short_note_becomes_exactly_one_chunk() {
    let indexer = indexer().await;
    seed_bare_patient(indexer.database(), "p1").await;
    seed_note(indexer.database(), "m1", "p1", "Paciente sem queixas novas.").await;

    let report = indexer.rebuild(&request_for("p1")).await;
    assert_eq!(report.indexed_chunks, 1);

    let chunks = indexer.database().chunks_for_patient("p1").await.expect("chunks");
    assert_eq!(chunks.len(), 1);
    let chunk = &chunks[0];
    assert_eq!(chunk.document_key, "medical_record:m1");
    assert_eq!(chunk.chunk_index, 0);
    assert_eq!(chunk.chunk_hash.len(), 32);
    assert!(chunk.chunk_text.contains("Paciente sem queixas novas."));
    assert_eq!(chunk.source_date.as_deref(), Some("2026-03-01"));
}

#[tokio::test]
async fn long_session_evolution_splits_into_overlapping_windows() {
    let indexer = indexer().await;
    seed_bare_patient(indexer.database(), "p1").await;
    // 1500 characters with no whitespace, so trimming cannot shift the
    // window boundaries under us.
    let evolution = "abcdefghij".repeat(150);
    sqlx::query(
        "INSERT INTO treatment_sessions (id, patient_id, session_date, evolution, created_at)
         VALUES ('s1', 'p1', '2026-03-02', ?, '2026-03-02T09:00:00Z')",
    )
    .bind(&evolution)
    .execute(indexer.database().pool())
    .await
    .expect("seed session");

    indexer.rebuild(&request_for("p1")).await;
    let chunks = indexer.database().chunks_for_patient("p1").await.expect("chunks");

    // "Evolucao: " prefix plus 1500 characters: 4 windows of 520 with a
    // 100-character back-step.
    assert_eq!(chunks.len(), 4);
    for chunk in &chunks {
        assert_eq!(chunk.document_key, "treatment_session:s1");
    }
    assert_eq!(
        chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
    for pair in chunks.windows(2) {
        let tail: String = pair[0].chunk_text.chars().rev().take(100).collect::<Vec<_>>()
            .into_iter().rev().collect();
        assert!(pair[1].chunk_text.starts_with(&tail));
    }
}

#[tokio::test]
async fn chunk_cap_keeps_the_earliest_documents() {
    // A configured cap below the floor is raised to the floor of 20.
    let indexer = indexer_with_limits(IndexingConfig {
        max_chunks_per_patient: 5,
        ..IndexingConfig::default()
    })
    .await;
    seed_bare_patient(indexer.database(), "p1").await;
    for n in 0..25 {
        seed_note(
            indexer.database(),
            &format!("m{n:02}"),
            "p1",
            &format!("Anotacao numero {n}."),
        )
        .await;
    }

    let report = indexer.rebuild(&request_for("p1")).await;

    assert_eq!(report.indexed_chunks, 20);
    let count = indexer
        .database()
        .count_chunks_for_patient("p1")
        .await
        .expect("count");
    assert_eq!(count, 20);
}

#[tokio::test]
async fn editing_one_record_changes_only_its_chunk_hashes() {
    let indexer = indexer().await;
    seed_bare_patient(indexer.database(), "p1").await;
    seed_note(indexer.database(), "m1", "p1", "Primeira nota.").await;
    seed_note(indexer.database(), "m2", "p1", "Segunda nota.").await;

    indexer.rebuild(&request_for("p1")).await;
    let hash_of = |chunks: &[clinrag::database::models::PersistedChunk], key: &str| {
        chunks
            .iter()
            .find(|c| c.document_key == key)
            .map(|c| c.chunk_hash.clone())
            .expect("chunk present")
    };
    let before = indexer.database().chunks_for_patient("p1").await.expect("chunks");
    let stable_before = hash_of(&before, "medical_record:m2");
    let edited_before = hash_of(&before, "medical_record:m1");

    sqlx::query("UPDATE medical_records SET content = 'Primeira nota, revisada.' WHERE id = 'm1'")
        .execute(indexer.database().pool())
        .await
        .expect("edit note");
    indexer.rebuild(&request_for("p1")).await;

    let after = indexer.database().chunks_for_patient("p1").await.expect("chunks");
    assert_eq!(hash_of(&after, "medical_record:m2"), stable_before);
    assert_ne!(hash_of(&after, "medical_record:m1"), edited_before);
}

#[tokio::test]
async fn batch_run_scopes_by_organization_and_isolates_patients() {
    let indexer = indexer().await;
    let db = indexer.database();
    sqlx::query(
        "INSERT INTO patients (id, organization_id, name) VALUES
         ('a1', 'org-a', 'Ana'),
         ('a2', 'org-a', NULL),
         ('b1', 'org-b', 'Bruno')",
    )
    .execute(db.pool())
    .await
    .expect("seed patients");
    seed_note(db, "m1", "a1", "Nota da Ana.").await;

    let report = indexer
        .rebuild(&RebuildRequest {
            organization_id: Some("org-a".to_string()),
            ..RebuildRequest::default()
        })
        .await;

    assert_eq!(report.processed_patients, 2);
    // a1 has a profile and a note; a2 has nothing renderable.
    assert_eq!(report.skipped_patients, 1);
    let indexed = report
        .patients
        .iter()
        .find(|r| r.patient_id == "a1")
        .expect("a1 result");
    assert_eq!(indexed.status, IndexStatus::Indexed);
    assert_eq!(indexed.chunk_count, 2);

    assert_eq!(db.count_chunks_for_patient("b1").await.expect("count"), 0);
    let a1_chunks = db.chunks_for_patient("a1").await.expect("chunks");
    assert!(a1_chunks.iter().all(|c| c.organization_id.as_deref() == Some("org-a")));
}
