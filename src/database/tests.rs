use super::*;

async fn seed_full_patient(db: &Database) {
    sqlx::query(
        "INSERT INTO patients (id, organization_id, name, main_condition, medical_history, updated_at)
         VALUES ('p1', 'org-a', 'Maria', 'Lombalgia', 'Cirurgia em 2022', '2026-01-01T00:00:00Z')",
    )
    .execute(db.pool())
    .await
    .expect("seed patient");

    sqlx::query(
        "INSERT INTO treatment_sessions (id, patient_id, organization_id, session_date, evolution, created_at)
         VALUES ('s1', 'p1', 'org-a', '2026-02-01', 'Melhora gradual', '2026-02-01T10:00:00Z')",
    )
    .execute(db.pool())
    .await
    .expect("seed session");

    sqlx::query(
        "INSERT INTO pain_records (id, patient_id, record_date, pain_level, notes)
         VALUES ('pr1', 'p1', '2026-01-15', '6', 'Dor ao subir escadas')",
    )
    .execute(db.pool())
    .await
    .expect("seed legacy pain record");

    sqlx::query(
        "INSERT INTO patient_pain_records (id, patient_id, pain_level, notes, created_at)
         VALUES ('pr2', 'p1', '4', 'Melhora com gelo', '2026-02-10T08:00:00Z')",
    )
    .execute(db.pool())
    .await
    .expect("seed recent pain record");
}

#[tokio::test]
async fn migrations_create_the_index_table() {
    let db = Database::in_memory().await.expect("in-memory db");
    let count = db.count_chunks_for_patient("nobody").await.expect("count");
    assert_eq!(count, 0);
}

#[tokio::test]
async fn sources_are_fetched_and_pain_tables_merge() {
    let db = Database::in_memory().await.expect("in-memory db");
    seed_full_patient(&db).await;

    let sources = db.fetch_patient_sources("p1", None).await;

    assert_eq!(sources.sessions.len(), 1);
    assert_eq!(sources.pain_records.len(), 2);
    // Legacy rows come first; the newer table's created_at is exposed
    // as record_date.
    assert_eq!(sources.pain_records[0].id.as_deref(), Some("pr1"));
    assert_eq!(sources.pain_records[1].id.as_deref(), Some("pr2"));
    assert_eq!(
        sources.pain_records[1].record_date.as_deref(),
        Some("2026-02-10T08:00:00Z")
    );
}

#[tokio::test]
async fn organization_filter_scopes_source_queries() {
    let db = Database::in_memory().await.expect("in-memory db");
    seed_full_patient(&db).await;

    let scoped = db.fetch_patient_sources("p1", Some("org-a")).await;
    assert_eq!(scoped.sessions.len(), 1);

    let other_org = db.fetch_patient_sources("p1", Some("org-b")).await;
    assert!(other_org.sessions.is_empty());
}

#[tokio::test]
async fn missing_source_table_yields_partial_sources() {
    let db = Database::in_memory().await.expect("in-memory db");
    seed_full_patient(&db).await;

    sqlx::query("DROP TABLE treatment_sessions")
        .execute(db.pool())
        .await
        .expect("drop sessions table");

    let sources = db.fetch_patient_sources("p1", None).await;
    assert!(sources.sessions.is_empty());
    // The remaining sources are still served.
    assert_eq!(sources.pain_records.len(), 2);
}

#[tokio::test]
async fn on_disk_database_is_created_if_missing() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let path = dir.path().join("clinrag.db");

    let db = Database::new(&path).await.expect("on-disk db");
    assert!(path.exists());
    assert_eq!(db.fetch_patients(None, None, 10).await.len(), 0);
}
