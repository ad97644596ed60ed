//! Source aggregation: render fetched clinical rows into plain-text
//! source documents ready for chunking.
//!
//! Rendering templates match what the retrieval side was trained against,
//! so they stay in Portuguese. Blank rows are suppressed here; nothing
//! downstream ever sees an empty document.


use serde_json::{Map, Value};

use crate::database::models::{
    GoalRow, MedicalRecordRow, PainRecordRow, PatientRow, SessionRow, SourceType,
};
use crate::normalize::{clean_string, coerce_number, truncate_text};

/// Synthetic source id for the patient-profile document.
pub const PROFILE_SOURCE_ID: &str = "patient_profile";

/// Maximum characters kept per source document before chunking.
const SOURCE_TEXT_CAP: usize = 6000;

/// One clinical fact rendered to a single plain-text passage.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    pub source_type: SourceType,
    pub source_id: String,
    pub source_date: Option<String>,
    pub text: String,
    pub metadata: Value,
}

/// The bounded row sets fetched for one patient.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientSources {
    pub sessions: Vec<SessionRow>,
    pub medical_records: Vec<MedicalRecordRow>,
    pub goals: Vec<GoalRow>,
    pub pain_records: Vec<PainRecordRow>,
}

/// Render every source row for one patient. Order is profile first, then
/// sessions, medical records, goals, pain records, each most recent
/// first as fetched, so the downstream chunk cap favors recency.
pub fn build_source_documents(
    patient: &PatientRow,
    sources: &PatientSources,
) -> Vec<SourceDocument> {
    let mut documents = Vec::new();

    push_document(&mut documents, profile_document(patient));

    for (index, row) in sources.sessions.iter().enumerate() {
        push_document(&mut documents, session_document(row, index));
    }

    for (index, row) in sources.medical_records.iter().enumerate() {
        push_document(&mut documents, medical_record_document(row, index));
    }

    for (index, row) in sources.goals.iter().enumerate() {
        push_document(&mut documents, goal_document(row, index));
    }

    for (index, row) in sources.pain_records.iter().enumerate() {
        push_document(&mut documents, pain_record_document(row, index));
    }

    documents
}

fn push_document(target: &mut Vec<SourceDocument>, document: Option<SourceDocument>) {
    let Some(mut document) = document else {
        return;
    };
    if document.text.trim().is_empty() {
        return;
    }
    document.text = truncate_text(&document.text, SOURCE_TEXT_CAP);
    target.push(document);
}

/// The profile is a synthetic medical record built from the patient row
/// itself. A patient with no profile content at all produces no document,
/// which is what lets an all-blank patient be skipped upstream.
fn profile_document(patient: &PatientRow) -> Option<SourceDocument> {
    let name = clean_string(patient.name.as_deref());
    let main_condition = clean_string(patient.main_condition.as_deref());
    let medical_history = clean_string(patient.medical_history.as_deref());

    if name.is_none() && main_condition.is_none() && medical_history.is_none() {
        return None;
    }

    let mut text = format!(
        "Perfil clinico: {}. Condicao principal: {}.",
        name.unwrap_or_else(|| "Paciente".to_string()),
        main_condition.unwrap_or_else(|| "Nao informada".to_string()),
    );
    if let Some(history) = medical_history {
        text.push_str(" Historico: ");
        text.push_str(&history);
    }

    Some(SourceDocument {
        source_type: SourceType::MedicalRecord,
        source_id: PROFILE_SOURCE_ID.to_string(),
        source_date: None,
        text,
        metadata: metadata_with_kind("patient_profile", &[]),
    })
}

fn session_document(row: &SessionRow, index: usize) -> Option<SourceDocument> {
    let source_id = clean_string(row.id.as_deref()).unwrap_or_else(|| format!("session_{}", index + 1));
    let pain_before = coerce_number(row.pain_level_before.as_deref());
    let pain_after = coerce_number(row.pain_level_after.as_deref());
    let evolution = clean_string(row.evolution.as_deref());
    let observations = clean_string(row.observations.as_deref());
    let next_goals = clean_string(row.next_session_goals.as_deref());

    let fragments: Vec<String> = [
        pain_before.map(|level| format!("Dor antes {level}/10.")),
        pain_after.map(|level| format!("Dor apos {level}/10.")),
        evolution.map(|text| format!("Evolucao: {text}")),
        observations.map(|text| format!("Observacoes: {text}")),
        next_goals.map(|text| format!("Proximos objetivos: {text}")),
    ]
    .into_iter()
    .flatten()
    .collect();

    Some(SourceDocument {
        source_type: SourceType::TreatmentSession,
        source_id,
        source_date: clean_string(row.session_date.as_deref()),
        text: fragments.join(" "),
        metadata: metadata_with_kind("treatment_session", &[]),
    })
}

fn medical_record_document(row: &MedicalRecordRow, index: usize) -> Option<SourceDocument> {
    let source_id = clean_string(row.id.as_deref()).unwrap_or_else(|| format!("medical_{}", index + 1));
    let record_type = clean_string(row.record_type.as_deref()).unwrap_or_else(|| "registro".to_string());
    let title = clean_string(row.title.as_deref());
    let content = clean_string(row.content.as_deref());

    let text = format!(
        "{}{}: {}",
        title
            .as_deref()
            .map(|title| format!("[{title}] "))
            .unwrap_or_default(),
        record_type,
        content.as_deref().unwrap_or_default(),
    );

    Some(SourceDocument {
        source_type: SourceType::MedicalRecord,
        source_id,
        source_date: clean_string(row.record_date.as_deref()),
        text,
        metadata: metadata_with_kind(
            "medical_record",
            &[("type", Some(record_type)), ("title", title)],
        ),
    })
}

fn goal_document(row: &GoalRow, index: usize) -> Option<SourceDocument> {
    let source_id = clean_string(row.id.as_deref()).unwrap_or_else(|| format!("goal_{}", index + 1));
    let source_date = clean_string(row.target_date.as_deref());
    let description = clean_string(row.description.as_deref());
    let status = clean_string(row.status.as_deref()).unwrap_or_else(|| "sem_status".to_string());
    let priority =
        clean_string(row.priority.as_deref()).unwrap_or_else(|| "sem_prioridade".to_string());

    let text = format!(
        "Meta ({status}, prioridade {priority}){}: {}",
        source_date
            .as_deref()
            .map(|date| format!(", prazo {date}"))
            .unwrap_or_default(),
        description.as_deref().unwrap_or_default(),
    );

    Some(SourceDocument {
        source_type: SourceType::Goal,
        source_id,
        source_date,
        text,
        metadata: metadata_with_kind(
            "goal",
            &[("status", Some(status)), ("priority", Some(priority))],
        ),
    })
}

fn pain_record_document(row: &PainRecordRow, index: usize) -> Option<SourceDocument> {
    let source_id = clean_string(row.id.as_deref()).unwrap_or_else(|| format!("pain_{}", index + 1));
    let pain_level = coerce_number(row.pain_level.as_deref());
    let notes = clean_string(row.notes.as_deref());

    let text = format!(
        "Registro de dor{}{}",
        pain_level.map(|level| format!(" {level}/10")).unwrap_or_default(),
        notes.as_deref().map(|notes| format!(": {notes}")).unwrap_or_default(),
    );

    Some(SourceDocument {
        source_type: SourceType::PainRecord,
        source_id,
        source_date: clean_string(row.record_date.as_deref()),
        text,
        metadata: metadata_with_kind("pain_record", &[]),
    })
}

/// Provenance bag: `kind` plus optional type-specific fields. Absent
/// fields are omitted rather than serialized as null.
fn metadata_with_kind(kind: &str, fields: &[(&str, Option<String>)]) -> Value {
    let mut map = Map::new();
    map.insert("kind".to_string(), Value::String(kind.to_string()));
    for (key, value) in fields {
        if let Some(value) = value {
            map.insert((*key).to_string(), Value::String(value.clone()));
        }
    }
    Value::Object(map)
}
