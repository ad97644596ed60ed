use super::*;

#[test]
fn source_type_wire_names() {
    assert_eq!(SourceType::TreatmentSession.as_str(), "treatment_session");
    assert_eq!(SourceType::MedicalRecord.as_str(), "medical_record");
    assert_eq!(SourceType::Goal.as_str(), "goal");
    assert_eq!(SourceType::PainRecord.as_str(), "pain_record");
}

#[test]
fn source_type_display_matches_as_str() {
    assert_eq!(SourceType::Goal.to_string(), "goal");
    assert_eq!(SourceType::PainRecord.to_string(), "pain_record");
}

#[test]
fn persisted_chunk_embedding_roundtrip() {
    let chunk = PersistedChunk {
        id: 1,
        patient_id: "p1".to_string(),
        organization_id: None,
        source_type: "goal".to_string(),
        source_id: "g1".to_string(),
        source_date: None,
        document_key: "goal:g1".to_string(),
        chunk_index: 0,
        chunk_text: "Meta".to_string(),
        chunk_hash: "00".repeat(16),
        embedding: "[0.25,-1.5,3.0]".to_string(),
        metadata: "{}".to_string(),
        created_at: chrono::Utc::now().naive_utc(),
        updated_at: chrono::Utc::now().naive_utc(),
    };

    let vector = chunk.embedding_vector().expect("valid embedding JSON");
    assert_eq!(vector, vec![0.25, -1.5, 3.0]);
}
