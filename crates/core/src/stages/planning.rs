//! Test planning via guideline retrieval.
//!
//! Builds a query from the symptoms and the working note, asks the retriever for the top
//! `k` guideline snippets and pulls known test names out of them. Every run replaces the
//! previous plan: suggested tests reflect the latest note, not the history of notes.

use super::{bracketed, matches_in_order_of_appearance, StageOutcome};
use crate::collaborators::GuidelineRetriever;
use crate::constants::{NO_SYMPTOMS_TEXT, UNSPECIFIED_SYMPTOMS};
use crate::state::{ConsultationState, GuidelineHit};

/// Lower-case token → canonical test name.
pub const TEST_VOCABULARY: &[(&str, &str)] = &[
    ("cbc", "CBC"),
    ("ecg", "ECG"),
    ("urine", "URINE"),
    ("lipid", "LIPID"),
    ("hba1c", "HBA1C"),
    ("troponin", "TROPONIN"),
    ("crp", "CRP"),
];

/// Retrieval query for the current state.
pub fn build_query(state: &ConsultationState) -> String {
    let symptoms = if state.symptoms().is_empty() {
        UNSPECIFIED_SYMPTOMS.to_string()
    } else {
        state.symptoms().join(", ")
    };
    let note = state.working_text().trim();
    let note = if note.is_empty() { NO_SYMPTOMS_TEXT } else { note };
    format!("Suggest initial basic tests for patient with: {symptoms}. Note: {note}")
}

/// Canonical test names mentioned in `hits`: hits in rank order, tests within a hit in
/// order of appearance, each test listed once.
pub fn tests_from_hits(hits: &[GuidelineHit]) -> Vec<String> {
    let mut tests: Vec<String> = Vec::new();
    for hit in hits {
        for test in matches_in_order_of_appearance(&hit.text.to_lowercase(), TEST_VOCABULARY) {
            if !tests.contains(&test) {
                tests.push(test);
            }
        }
    }
    tests
}

pub fn run(
    mut state: ConsultationState,
    retriever: &dyn GuidelineRetriever,
    top_k: usize,
) -> StageOutcome {
    let query = build_query(&state);
    tracing::debug!(%query, top_k, "planning query");

    match retriever.retrieve(&query, top_k) {
        Ok(mut hits) => {
            hits.truncate(top_k);
            let tests = tests_from_hits(&hits);
            let summary = format!(
                "suggested tests {} from {} guideline hit(s)",
                bracketed(&tests),
                hits.len()
            );
            state.replace_plan(tests, hits);
            StageOutcome::done(state, summary)
        }
        Err(err) => {
            state.replace_plan(Vec::new(), Vec::new());
            StageOutcome::degraded(
                state,
                "guideline retrieval unavailable; suggested tests []",
                err.to_string(),
            )
        }
    }
}
