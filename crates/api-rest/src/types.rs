//! Request and response bodies for the REST API.

use consult_core::{ConsultationState, EmrRecord, PharmacyOrder, ReviewStatus};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StartConsultationReq {
    pub patient_id: String,
    /// Consultation note or transcript text. May be empty.
    #[serde(default)]
    pub note_text: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AudioQuery {
    /// Patient the recording belongs to.
    pub patient_id: String,
}

/// Human edits applied between pipeline runs. Absent fields are left unchanged.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct EditConsultationReq {
    pub note_summary: Option<String>,
    pub draft_prescription: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReviewReq {
    pub approved: bool,
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TranscriptionRes {
    /// Recognized text, or a placeholder sentence naming why none is available.
    pub transcript: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConsultationRes {
    pub consultation_id: String,
    #[schema(value_type = String, example = "PENDING_REVIEW")]
    pub review_status: ReviewStatus,
    #[schema(value_type = Object)]
    pub state: ConsultationState,
}

impl ConsultationRes {
    pub fn new(consultation_id: impl ToString, state: ConsultationState) -> Self {
        Self {
            consultation_id: consultation_id.to_string(),
            review_status: state.review_status(),
            state,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmrCommitRes {
    #[schema(value_type = Object)]
    pub record: EmrRecord,
    pub consultation: ConsultationRes,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PharmacyOrderRes {
    #[schema(value_type = Object)]
    pub order: PharmacyOrder,
    pub consultation: ConsultationRes,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectPatientReq {
    pub patient_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyPresenceReq {
    pub patient_id: String,
    /// Camera frame, base64-encoded (standard alphabet, padded).
    pub image_base64: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyPresenceRes {
    pub patient_id: String,
    pub authorized: bool,
    /// `detected`, `not_detected` or `fallback`.
    pub outcome: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionStatusRes {
    pub patient_id: String,
    pub authorized: bool,
    pub active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmrHistoryRes {
    #[schema(value_type = Vec<Object>)]
    pub records: Vec<EmrRecord>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PharmacyHistoryRes {
    #[schema(value_type = Vec<Object>)]
    pub orders: Vec<PharmacyOrder>,
}
