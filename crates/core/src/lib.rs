//! # Consult Core
//!
//! Core logic for the consultation pipeline:
//! - [`ConsultationState`], the record threaded through one consultation
//! - the enrichment [`stages`] and the [`Orchestrator`] that runs them in order
//! - the human review gate and the per-patient [`Session`] authorization gate
//! - append-only JSON [`repositories`] for EMR records and pharmacy orders
//! - [`ClinicalActions`], which writes reviewed consultations to those stores
//!
//! **No API concerns**: HTTP routing and command-line handling belong in `api-rest` and
//! `consult-cli`. External collaborators (retrieval, speech-to-text, presence detection)
//! are consumed through the traits in [`collaborators`].

pub mod actions;
pub mod collaborators;
pub mod config;
pub mod constants;
pub mod error;
pub mod guidelines;
pub mod orchestrator;
pub mod repositories;
pub mod session;
pub mod stages;
pub mod state;

pub use actions::ClinicalActions;
pub use collaborators::{
    transcribe_or_placeholder, GuidelineRetriever, PresenceDetector, Transcriber,
    UnavailableTranscriber,
};
pub use config::{
    presence_fallback_from_env_value, retrieval_top_k_from_env_value,
    review_policy_from_env_value, CoreConfig, PresenceFallback, ReviewPolicy,
};
pub use error::{CollaboratorError, ConsultError, ConsultResult};
pub use guidelines::{Guideline, LexicalRetriever};
pub use orchestrator::Orchestrator;
pub use repositories::{
    EmrEntry, EmrRecord, EmrStore, OrderStatus, PharmacyEntry, PharmacyOrder, PharmacyStore,
    Record, RecordStore,
};
pub use session::{PresenceOutcome, Session};
pub use stages::{Stage, StageOutcome};
pub use state::{ConsultationState, ExecutedAction, GuidelineHit, ReviewStatus};

pub use consult_types::{NonEmptyText, PatientId, TextError};
