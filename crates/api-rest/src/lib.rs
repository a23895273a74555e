//! # API REST
//!
//! REST API for the consultation pipeline.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, status codes, CORS)
//!
//! Consultations started through the API are kept in memory, keyed by a v4 UUID, so that
//! edits, reruns, review decisions and record writes all act on the state the pipeline
//! produced. Nothing in that registry survives a restart; the EMR and pharmacy stores do.

#![warn(rust_2018_idioms)]

pub mod types;

use axum::{
    body::Bytes,
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use consult_core::{
    transcribe_or_placeholder, ClinicalActions, ConsultError, ConsultationState, CoreConfig,
    GuidelineRetriever, Orchestrator, PatientId, PresenceDetector, PresenceOutcome, Session,
    Transcriber, UnavailableTranscriber,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use uuid::Uuid;

use types::{
    AudioQuery, ConsultationRes, EditConsultationReq, EmrCommitRes, EmrHistoryRes, HealthRes,
    PharmacyHistoryRes, PharmacyOrderRes, ReviewReq, SelectPatientReq, SessionStatusRes,
    StartConsultationReq, TranscriptionRes, VerifyPresenceReq, VerifyPresenceRes,
};

type ApiError = (StatusCode, String);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    session: Arc<Session>,
    orchestrator: Arc<Orchestrator>,
    actions: Arc<ClinicalActions>,
    transcriber: Arc<dyn Transcriber>,
    presence_detector: Option<Arc<dyn PresenceDetector>>,
    consultations: Arc<RwLock<HashMap<Uuid, ConsultationState>>>,
}

impl AppState {
    /// State with a fresh session, no speech-to-text engine and no presence detector.
    pub fn new(cfg: Arc<CoreConfig>, retriever: Arc<dyn GuidelineRetriever>) -> Self {
        let session = Arc::new(Session::new(cfg.presence_fallback()));
        Self {
            actions: Arc::new(ClinicalActions::new(&cfg, Arc::clone(&session))),
            orchestrator: Arc::new(Orchestrator::new(cfg, retriever)),
            session,
            transcriber: Arc::new(UnavailableTranscriber),
            presence_detector: None,
            consultations: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn with_transcriber(mut self, transcriber: Arc<dyn Transcriber>) -> Self {
        self.transcriber = transcriber;
        self
    }

    pub fn with_presence_detector(mut self, detector: Arc<dyn PresenceDetector>) -> Self {
        self.presence_detector = Some(detector);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn load(&self, id: &str) -> Result<(Uuid, ConsultationState), ApiError> {
        let id = parse_consultation_id(id)?;
        let consultations = self.consultations.read().map_err(|_| lock_error())?;
        consultations
            .get(&id)
            .cloned()
            .map(|state| (id, state))
            .ok_or_else(consultation_not_found)
    }

    fn insert(&self, state: ConsultationState) -> Result<ConsultationRes, ApiError> {
        let id = Uuid::new_v4();
        self.consultations
            .write()
            .map_err(|_| lock_error())?
            .insert(id, state.clone());
        Ok(ConsultationRes::new(id, state))
    }

    /// Applies `change` to a stored consultation under the registry write lock, so
    /// concurrent requests on the same consultation are serialized and none is lost.
    ///
    /// `change` works on a copy; if it fails the stored state is left as it was.
    fn update<R>(
        &self,
        id: &str,
        change: impl FnOnce(ConsultationState) -> Result<(ConsultationState, R), ApiError>,
    ) -> Result<(ConsultationRes, R), ApiError> {
        let id = parse_consultation_id(id)?;
        let mut consultations = self.consultations.write().map_err(|_| lock_error())?;
        let current = consultations
            .get(&id)
            .cloned()
            .ok_or_else(consultation_not_found)?;
        let (next, output) = change(current)?;
        consultations.insert(id, next.clone());
        Ok((ConsultationRes::new(id, next), output))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        start_consultation,
        start_consultation_from_audio,
        transcribe_audio,
        get_consultation,
        edit_consultation,
        rerun_consultation,
        review_consultation,
        commit_to_emr,
        send_to_pharmacy,
        select_patient,
        verify_presence,
        session_status,
        emr_history,
        pharmacy_history,
    ),
    components(schemas(
        HealthRes,
        StartConsultationReq,
        EditConsultationReq,
        ReviewReq,
        ConsultationRes,
        EmrCommitRes,
        PharmacyOrderRes,
        SelectPatientReq,
        VerifyPresenceReq,
        VerifyPresenceRes,
        SessionStatusRes,
        EmrHistoryRes,
        PharmacyHistoryRes,
        TranscriptionRes,
    ))
)]
pub struct ApiDoc;

/// Builds the router with every route, Swagger UI and a permissive CORS layer.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/consultations", post(start_consultation))
        .route("/consultations/audio", post(start_consultation_from_audio))
        .route("/transcriptions", post(transcribe_audio))
        .route(
            "/consultations/:id",
            get(get_consultation).patch(edit_consultation),
        )
        .route("/consultations/:id/rerun", post(rerun_consultation))
        .route("/consultations/:id/review", post(review_consultation))
        .route("/consultations/:id/emr", post(commit_to_emr))
        .route("/consultations/:id/pharmacy", post(send_to_pharmacy))
        .route("/session/select", post(select_patient))
        .route("/session/verify", post(verify_presence))
        .route("/session/:patient_id", get(session_status))
        .route("/patients/:patient_id/emr", get(emr_history))
        .route("/patients/:patient_id/pharmacy", get(pharmacy_history))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn consultation_not_found() -> ApiError {
    (StatusCode::NOT_FOUND, "Consultation not found".into())
}

fn parse_consultation_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| consultation_not_found())
}

fn lock_error() -> ApiError {
    tracing::error!("consultation registry lock poisoned");
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
}

fn parse_patient_id(raw: &str) -> Result<PatientId, ApiError> {
    PatientId::new(raw).map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid patient_id: {e}")))
}

/// Maps core errors onto status codes. Storage failures are logged and reported as a
/// generic 500.
fn consult_error(err: ConsultError) -> ApiError {
    match err {
        ConsultError::PermissionDenied { .. } => (StatusCode::FORBIDDEN, err.to_string()),
        ConsultError::InvalidInput(_) | ConsultError::Text(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        ConsultError::AlreadyReviewed | ConsultError::NotApproved => {
            (StatusCode::CONFLICT, err.to_string())
        }
        other => {
            tracing::error!("consultation action failed: {:?}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Liveness check.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Consultation REST API is alive".into(),
    })
}

#[utoipa::path(
    post,
    path = "/consultations",
    request_body = StartConsultationReq,
    responses(
        (status = 200, description = "Pipeline result", body = ConsultationRes),
        (status = 400, description = "Invalid patient id")
    )
)]
/// Start a consultation from note text and run the pipeline.
///
/// An empty note is accepted; every stage still runs and says so in the audit log.
#[axum::debug_handler]
async fn start_consultation(
    State(state): State<AppState>,
    Json(req): Json<StartConsultationReq>,
) -> ApiResult<ConsultationRes> {
    let patient_id = parse_patient_id(&req.patient_id)?;
    let consultation = state.orchestrator.start(patient_id, req.note_text);
    Ok(Json(state.insert(consultation)?))
}

#[utoipa::path(
    post,
    path = "/consultations/audio",
    params(AudioQuery),
    request_body(content = String, description = "Raw audio bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Pipeline result over the transcript", body = ConsultationRes),
        (status = 400, description = "Invalid patient id")
    )
)]
/// Transcribe an audio recording and run the pipeline on the transcript.
///
/// Speech-to-text problems never fail the request: the transcript becomes an explicit
/// placeholder sentence.
#[axum::debug_handler]
async fn start_consultation_from_audio(
    State(state): State<AppState>,
    Query(query): Query<AudioQuery>,
    audio: Bytes,
) -> ApiResult<ConsultationRes> {
    let patient_id = parse_patient_id(&query.patient_id)?;
    let consultation =
        state
            .orchestrator
            .run_from_audio(patient_id, &audio, state.transcriber.as_ref());
    Ok(Json(state.insert(consultation)?))
}

#[utoipa::path(
    post,
    path = "/transcriptions",
    request_body(content = String, description = "Raw audio bytes", content_type = "application/octet-stream"),
    responses(
        (status = 200, description = "Transcript or placeholder sentence", body = TranscriptionRes)
    )
)]
/// Transcribe an audio recording without starting a consultation.
#[axum::debug_handler]
async fn transcribe_audio(State(state): State<AppState>, audio: Bytes) -> Json<TranscriptionRes> {
    Json(TranscriptionRes {
        transcript: transcribe_or_placeholder(state.transcriber.as_ref(), &audio),
    })
}

#[utoipa::path(
    get,
    path = "/consultations/{id}",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Current consultation state", body = ConsultationRes),
        (status = 404, description = "Unknown consultation")
    )
)]
#[axum::debug_handler]
async fn get_consultation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<ConsultationRes> {
    let (id, consultation) = state.load(&id)?;
    Ok(Json(ConsultationRes::new(id, consultation)))
}

#[utoipa::path(
    patch,
    path = "/consultations/{id}",
    params(("id" = String, Path, description = "Consultation id")),
    request_body = EditConsultationReq,
    responses(
        (status = 200, description = "Edited consultation state", body = ConsultationRes),
        (status = 404, description = "Unknown consultation")
    )
)]
/// Apply human edits to the working note and/or the draft prescription.
///
/// Edits do not re-run the pipeline; call the rerun endpoint for that.
#[axum::debug_handler]
async fn edit_consultation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<EditConsultationReq>,
) -> ApiResult<ConsultationRes> {
    let (consultation, ()) = state.update(&id, |mut consultation| {
        if let Some(note) = req.note_summary {
            consultation.set_note_summary(note);
        }
        if let Some(draft) = req.draft_prescription {
            consultation.set_draft_prescription(draft);
        }
        Ok((consultation, ()))
    })?;
    Ok(Json(consultation))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/rerun",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "State after another full pipeline run", body = ConsultationRes),
        (status = 404, description = "Unknown consultation")
    )
)]
#[axum::debug_handler]
async fn rerun_consultation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<ConsultationRes> {
    let (consultation, ()) =
        state.update(&id, |consultation| Ok((state.orchestrator.run(consultation), ())))?;
    Ok(Json(consultation))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/review",
    params(("id" = String, Path, description = "Consultation id")),
    request_body = ReviewReq,
    responses(
        (status = 200, description = "Decision recorded", body = ConsultationRes),
        (status = 404, description = "Unknown consultation"),
        (status = 409, description = "Already reviewed and repeat decisions are rejected")
    )
)]
/// Record a clinician's review decision. Nothing is written to the record stores.
#[axum::debug_handler]
async fn review_consultation(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ReviewReq>,
) -> ApiResult<ConsultationRes> {
    let (consultation, ()) = state.update(&id, |consultation| {
        state
            .orchestrator
            .apply_review_decision(consultation, req.approved, &req.comments)
            .map(|reviewed| (reviewed, ()))
            .map_err(consult_error)
    })?;
    Ok(Json(consultation))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/emr",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "EMR record written", body = EmrCommitRes),
        (status = 403, description = "Patient not authorized in this session"),
        (status = 404, description = "Unknown consultation"),
        (status = 500, description = "Internal server error")
    )
)]
/// Write the consultation, with its latest review decision, to the EMR store.
#[axum::debug_handler]
async fn commit_to_emr(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<EmrCommitRes> {
    let (consultation, record) = state.update(&id, |mut consultation| {
        let record = state
            .actions
            .commit_to_emr(&mut consultation)
            .map_err(consult_error)?;
        Ok((consultation, record))
    })?;
    Ok(Json(EmrCommitRes {
        record,
        consultation,
    }))
}

#[utoipa::path(
    post,
    path = "/consultations/{id}/pharmacy",
    params(("id" = String, Path, description = "Consultation id")),
    responses(
        (status = 200, description = "Pharmacy order sent", body = PharmacyOrderRes),
        (status = 400, description = "No draft prescription"),
        (status = 403, description = "Patient not authorized in this session"),
        (status = 404, description = "Unknown consultation"),
        (status = 409, description = "Draft not approved by a clinician"),
        (status = 500, description = "Internal server error")
    )
)]
/// Send the approved draft prescription to the pharmacy, linked to the latest EMR record.
#[axum::debug_handler]
async fn send_to_pharmacy(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<PharmacyOrderRes> {
    let (consultation, order) = state.update(&id, |mut consultation| {
        let order = state
            .actions
            .send_to_pharmacy(&mut consultation)
            .map_err(consult_error)?;
        Ok((consultation, order))
    })?;
    Ok(Json(PharmacyOrderRes {
        order,
        consultation,
    }))
}

#[utoipa::path(
    post,
    path = "/session/select",
    request_body = SelectPatientReq,
    responses(
        (status = 200, description = "Active patient changed", body = SessionStatusRes),
        (status = 400, description = "Invalid patient id")
    )
)]
/// Make a patient the active identity. Switching patients clears the new patient's
/// verification, so a presence check is needed before their records can be written.
#[axum::debug_handler]
async fn select_patient(
    State(state): State<AppState>,
    Json(req): Json<SelectPatientReq>,
) -> ApiResult<SessionStatusRes> {
    let patient_id = parse_patient_id(&req.patient_id)?;
    state.session.select_patient(&patient_id);
    Ok(Json(session_status_for(&state.session, patient_id)))
}

#[utoipa::path(
    post,
    path = "/session/verify",
    request_body = VerifyPresenceReq,
    responses(
        (status = 200, description = "Presence check result", body = VerifyPresenceRes),
        (status = 400, description = "Invalid patient id or image encoding")
    )
)]
/// Run the presence check for a patient and update their session authorization.
#[axum::debug_handler]
async fn verify_presence(
    State(state): State<AppState>,
    Json(req): Json<VerifyPresenceReq>,
) -> ApiResult<VerifyPresenceRes> {
    let patient_id = parse_patient_id(&req.patient_id)?;
    let image = STANDARD
        .decode(req.image_base64.trim())
        .map_err(|e| (StatusCode::BAD_REQUEST, format!("Invalid image_base64: {e}")))?;

    let outcome =
        state
            .session
            .verify_presence(&patient_id, &image, state.presence_detector.as_deref());
    let label = match outcome {
        PresenceOutcome::Detected => "detected",
        PresenceOutcome::NotDetected => "not_detected",
        PresenceOutcome::Fallback { .. } => "fallback",
    };
    Ok(Json(VerifyPresenceRes {
        patient_id: patient_id.to_string(),
        authorized: outcome.authorized(),
        outcome: label.into(),
    }))
}

#[utoipa::path(
    get,
    path = "/session/{patient_id}",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Authorization status", body = SessionStatusRes),
        (status = 400, description = "Invalid patient id")
    )
)]
#[axum::debug_handler]
async fn session_status(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
) -> ApiResult<SessionStatusRes> {
    let patient_id = parse_patient_id(&patient_id)?;
    Ok(Json(session_status_for(&state.session, patient_id)))
}

fn session_status_for(session: &Session, patient_id: PatientId) -> SessionStatusRes {
    SessionStatusRes {
        authorized: session.is_authorized(&patient_id),
        active: session.active_patient().as_ref() == Some(&patient_id),
        patient_id: patient_id.to_string(),
    }
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/emr",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "EMR records, newest first", body = EmrHistoryRes),
        (status = 403, description = "Patient not authorized in this session")
    )
)]
#[axum::debug_handler]
async fn emr_history(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
) -> ApiResult<EmrHistoryRes> {
    let patient_id = parse_patient_id(&patient_id)?;
    let records = state
        .actions
        .emr_history(&patient_id)
        .map_err(consult_error)?;
    Ok(Json(EmrHistoryRes { records }))
}

#[utoipa::path(
    get,
    path = "/patients/{patient_id}/pharmacy",
    params(("patient_id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Pharmacy orders, newest first", body = PharmacyHistoryRes),
        (status = 403, description = "Patient not authorized in this session")
    )
)]
#[axum::debug_handler]
async fn pharmacy_history(
    State(state): State<AppState>,
    AxumPath(patient_id): AxumPath<String>,
) -> ApiResult<PharmacyHistoryRes> {
    let patient_id = parse_patient_id(&patient_id)?;
    let orders = state
        .actions
        .pharmacy_history(&patient_id)
        .map_err(consult_error)?;
    Ok(Json(PharmacyHistoryRes { orders }))
}
