//! The consultation state record threaded through the pipeline.
//!
//! Field visibility encodes the mutation rules: identity and transcript are fixed at
//! construction, `symptoms`, `safety_flags`, `executed_actions` and `audit_log` can only
//! grow, and only the planning stage may replace `suggested_tests`/`guideline_hits`.
//! The two human-editable fields (`note_summary`, `draft_prescription`) have public
//! setters.

use chrono::{DateTime, Utc};
use consult_types::PatientId;
use serde::{Deserialize, Serialize};

/// One guideline snippet returned by the retrieval collaborator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GuidelineHit {
    pub text: String,
    pub source: String,
    pub score: f32,
}

/// A side-effecting operation performed on behalf of the consultation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ExecutedAction {
    HumanReview {
        approved: bool,
        comments: String,
        reviewed_at: DateTime<Utc>,
    },
    UpdateEmr {
        record_id: String,
        approved_by_doctor: bool,
    },
    SendToPharmacy {
        order_id: String,
        emr_record_id: Option<String>,
    },
}

/// Position of a consultation in the human-review state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReviewStatus {
    PendingReview,
    Reviewed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsultationState {
    patient_id: PatientId,
    raw_transcript: String,
    note_summary: String,
    symptoms: Vec<String>,
    suggested_tests: Vec<String>,
    guideline_hits: Vec<GuidelineHit>,
    draft_prescription: String,
    safety_flags: Vec<String>,
    executed_actions: Vec<ExecutedAction>,
    audit_log: Vec<String>,
}

impl ConsultationState {
    /// Starts a consultation; the working note begins as a copy of the transcript.
    pub fn new(patient_id: PatientId, raw_transcript: impl Into<String>) -> Self {
        let raw_transcript = raw_transcript.into();
        Self {
            patient_id,
            note_summary: raw_transcript.clone(),
            raw_transcript,
            symptoms: Vec::new(),
            suggested_tests: Vec::new(),
            guideline_hits: Vec::new(),
            draft_prescription: String::new(),
            safety_flags: Vec::new(),
            executed_actions: Vec::new(),
            audit_log: Vec::new(),
        }
    }

    pub fn patient_id(&self) -> &PatientId {
        &self.patient_id
    }

    pub fn raw_transcript(&self) -> &str {
        &self.raw_transcript
    }

    pub fn note_summary(&self) -> &str {
        &self.note_summary
    }

    pub fn set_note_summary(&mut self, note: impl Into<String>) {
        self.note_summary = note.into();
    }

    /// Text the stages read: the note summary, falling back to the raw transcript when
    /// the note has been blanked.
    pub fn working_text(&self) -> &str {
        if self.note_summary.trim().is_empty() {
            &self.raw_transcript
        } else {
            &self.note_summary
        }
    }

    pub fn symptoms(&self) -> &[String] {
        &self.symptoms
    }

    pub fn suggested_tests(&self) -> &[String] {
        &self.suggested_tests
    }

    pub fn guideline_hits(&self) -> &[GuidelineHit] {
        &self.guideline_hits
    }

    pub fn draft_prescription(&self) -> &str {
        &self.draft_prescription
    }

    pub fn set_draft_prescription(&mut self, draft: impl Into<String>) {
        self.draft_prescription = draft.into();
    }

    pub fn safety_flags(&self) -> &[String] {
        &self.safety_flags
    }

    pub fn executed_actions(&self) -> &[ExecutedAction] {
        &self.executed_actions
    }

    pub fn audit_log(&self) -> &[String] {
        &self.audit_log
    }

    pub fn review_status(&self) -> ReviewStatus {
        if self.latest_review().is_some() {
            ReviewStatus::Reviewed
        } else {
            ReviewStatus::PendingReview
        }
    }

    /// The effective review decision: the most recent one recorded.
    pub fn latest_review(&self) -> Option<(bool, &str)> {
        self.executed_actions.iter().rev().find_map(|action| match action {
            ExecutedAction::HumanReview {
                approved, comments, ..
            } => Some((*approved, comments.as_str())),
            _ => None,
        })
    }

    /// Id of the most recent EMR record written for this consultation.
    pub fn latest_emr_record_id(&self) -> Option<&str> {
        self.executed_actions.iter().rev().find_map(|action| match action {
            ExecutedAction::UpdateEmr { record_id, .. } => Some(record_id.as_str()),
            _ => None,
        })
    }

    /// Unions `labels` into the symptom list, keeping existing order and dropping
    /// duplicates.
    pub(crate) fn merge_symptoms<I>(&mut self, labels: I)
    where
        I: IntoIterator<Item = String>,
    {
        for label in labels {
            if !self.symptoms.contains(&label) {
                self.symptoms.push(label);
            }
        }
    }

    pub(crate) fn replace_plan(&mut self, tests: Vec<String>, hits: Vec<GuidelineHit>) {
        self.suggested_tests = tests;
        self.guideline_hits = hits;
    }

    pub(crate) fn push_safety_flags<I>(&mut self, flags: I)
    where
        I: IntoIterator<Item = String>,
    {
        self.safety_flags.extend(flags);
    }

    pub(crate) fn push_action(&mut self, action: ExecutedAction) {
        self.executed_actions.push(action);
    }

    pub(crate) fn push_audit(&mut self, entry: String) {
        self.audit_log.push(entry);
    }
}
