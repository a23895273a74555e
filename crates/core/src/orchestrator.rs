//! Pipeline orchestration.
//!
//! The [`Orchestrator`] runs every stage of [`Stage::PIPELINE`] in order and turns each
//! [`StageOutcome`] into one audit entry. Stage problems never escape: a degraded stage
//! is logged and noted in the audit trail, and the state moves on to the next stage.

use crate::collaborators::{transcribe_or_placeholder, GuidelineRetriever, Transcriber};
use crate::config::CoreConfig;
use crate::error::ConsultResult;
use crate::stages::{self, Stage, StageOutcome};
use crate::state::ConsultationState;
use consult_types::PatientId;
use std::sync::Arc;

#[derive(Clone)]
pub struct Orchestrator {
    retriever: Arc<dyn GuidelineRetriever>,
    cfg: Arc<CoreConfig>,
}

impl Orchestrator {
    pub fn new(cfg: Arc<CoreConfig>, retriever: Arc<dyn GuidelineRetriever>) -> Self {
        Self { retriever, cfg }
    }

    pub fn config(&self) -> &CoreConfig {
        &self.cfg
    }

    /// Runs the full pipeline over `state`.
    ///
    /// Appends exactly one audit entry per stage, so a run always grows the audit log by
    /// `Stage::PIPELINE.len()`. Running an already-processed state again is allowed:
    /// symptoms are unioned, the test plan is replaced, and the draft is regenerated.
    pub fn run(&self, state: ConsultationState) -> ConsultationState {
        let patient_id = state.patient_id().clone();
        let state = Stage::PIPELINE
            .into_iter()
            .fold(state, |state, stage| self.run_stage(stage, state));

        tracing::info!(
            %patient_id,
            symptoms = state.symptoms().len(),
            tests = state.suggested_tests().len(),
            flags = state.safety_flags().len(),
            "pipeline complete"
        );
        state
    }

    fn run_stage(&self, stage: Stage, state: ConsultationState) -> ConsultationState {
        let StageOutcome {
            mut state,
            summary,
            warning,
        } = match stage {
            Stage::SymptomExtraction => stages::symptoms::run(state),
            Stage::Planning => {
                stages::planning::run(state, self.retriever.as_ref(), self.cfg.retrieval_top_k())
            }
            Stage::PrescriptionDrafting => stages::prescription::run(state),
            Stage::SafetyCheck => stages::safety::run(state),
        };

        let entry = match &warning {
            Some(warning) => {
                tracing::warn!(
                    patient_id = %state.patient_id(),
                    %stage,
                    %warning,
                    "stage degraded"
                );
                format!("{stage}: {summary} (warning: {warning})")
            }
            None => {
                tracing::debug!(patient_id = %state.patient_id(), %stage, %summary, "stage done");
                format!("{stage}: {summary}")
            }
        };
        state.push_audit(entry);
        state
    }

    /// Starts a consultation for `patient_id` from `note_text` and runs the pipeline.
    pub fn start(&self, patient_id: PatientId, note_text: impl Into<String>) -> ConsultationState {
        self.run(ConsultationState::new(patient_id, note_text))
    }

    /// Transcribes `audio` and runs the pipeline on the result.
    ///
    /// Transcription problems do not fail the run: the transcript becomes a placeholder
    /// sentence, which the pipeline then processes like any other note.
    pub fn run_from_audio(
        &self,
        patient_id: PatientId,
        audio: &[u8],
        transcriber: &dyn Transcriber,
    ) -> ConsultationState {
        let transcript = transcribe_or_placeholder(transcriber, audio);
        self.start(patient_id, transcript)
    }

    /// Records a clinician's review decision without re-running any stage.
    ///
    /// # Errors
    ///
    /// See [`stages::review::apply_decision`].
    pub fn apply_review_decision(
        &self,
        state: ConsultationState,
        approved: bool,
        comments: &str,
    ) -> ConsultResult<ConsultationState> {
        stages::review::apply_decision(state, approved, comments, self.cfg.review_policy())
    }
}
