//! Symptom extraction.
//!
//! Maps what a doctor or patient says onto a small set of canonical symptom labels that
//! the planning and safety stages understand. Matching is lower-case substring
//! containment against [`SYMPTOM_PHRASES`]; every entry is tested independently, so
//! overlapping phrases ("vomit", "vomiting") all fire and collapse onto one label.
//!
//! Labels come out in order of first appearance in the text. When two phrases start at
//! the same position, the earlier table entry wins.

use super::{bracketed, matches_in_order_of_appearance, StageOutcome};
use crate::state::ConsultationState;

/// Phrase → canonical label.
pub const SYMPTOM_PHRASES: &[(&str, &str)] = &[
    ("chest pain", "chest pain"),
    ("heaviness in chest", "chest pain"),
    ("tightness in chest", "chest pain"),
    ("pressure in chest", "chest pain"),
    ("shortness of breath", "shortness of breath"),
    ("breathlessness", "shortness of breath"),
    ("breathless", "shortness of breath"),
    ("difficulty breathing", "shortness of breath"),
    ("fever", "fever"),
    ("high temperature", "fever"),
    ("raised temperature", "fever"),
    ("cough", "cough"),
    ("coughing", "cough"),
    ("headache", "headache"),
    ("pain in head", "headache"),
    ("migraine", "headache"),
    ("vomiting", "vomiting"),
    ("vomit", "vomiting"),
    ("threw up", "vomiting"),
    ("nausea", "vomiting"),
    ("feeling like vomiting", "vomiting"),
    ("abdominal pain", "abdominal pain"),
    ("stomach pain", "abdominal pain"),
    ("pain in stomach", "abdominal pain"),
    ("tummy pain", "abdominal pain"),
    ("gastric pain", "abdominal pain"),
    ("diabetes", "diabetes"),
    ("type 2 diabetes", "diabetes"),
    ("type ii diabetes", "diabetes"),
    ("high blood sugar", "diabetes"),
    ("sugar patient", "diabetes"),
    ("hypertension", "hypertension"),
    ("high blood pressure", "hypertension"),
    ("bp is high", "hypertension"),
];

/// Canonical labels found in `text`, in order of first appearance.
pub fn extract_symptoms(text: &str) -> Vec<String> {
    matches_in_order_of_appearance(&text.to_lowercase(), SYMPTOM_PHRASES)
}

pub fn run(mut state: ConsultationState) -> StageOutcome {
    let text = state.working_text();
    if text.trim().is_empty() {
        let summary = format!(
            "no transcript text to analyse; symptoms {}",
            bracketed(state.symptoms())
        );
        return StageOutcome::degraded(state, summary, "empty transcript");
    }

    let found = extract_symptoms(text);
    let new_count = found
        .iter()
        .filter(|label| !state.symptoms().contains(*label))
        .count();
    state.merge_symptoms(found);

    let summary = if new_count == 0 {
        format!(
            "no new symptom phrases found; symptoms {}",
            bracketed(state.symptoms())
        )
    } else {
        format!("extracted symptoms {}", bracketed(state.symptoms()))
    };
    StageOutcome::done(state, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use consult_types::PatientId;

    fn state(text: &str) -> ConsultationState {
        ConsultationState::new(PatientId::new("P001").unwrap(), text)
    }

    #[test]
    fn extracts_in_order_of_first_appearance() {
        assert_eq!(
            extract_symptoms("Patient reports chest pain and fever for two days."),
            ["chest pain", "fever"]
        );
        assert_eq!(
            extract_symptoms("Fever since Monday, now some chest pain"),
            ["fever", "chest pain"]
        );
    }

    #[test]
    fn repeated_phrase_yields_label_once() {
        let found = extract_symptoms("chest pain, CHEST PAIN, tightness in chest, chest pain");
        assert_eq!(found, ["chest pain"]);
    }

    #[test]
    fn overlapping_phrases_collapse_onto_one_label() {
        assert_eq!(
            extract_symptoms("he was breathless and vomiting with nausea"),
            ["shortness of breath", "vomiting"]
        );
    }

    #[test]
    fn run_unions_with_existing_symptoms() {
        let first = run(state("cough for a week")).state;
        assert_eq!(first.symptoms(), ["cough"]);

        let mut edited = first;
        edited.set_note_summary("now also has a headache and cough");
        let second = run(edited);
        assert_eq!(second.state.symptoms(), ["cough", "headache"]);
        assert!(second.warning.is_none());
    }

    #[test]
    fn empty_text_is_a_degraded_no_op() {
        let outcome = run(state("   "));
        assert!(outcome.state.symptoms().is_empty());
        assert_eq!(outcome.warning.as_deref(), Some("empty transcript"));
        assert!(outcome.summary.contains("no transcript text"));
    }

    #[test]
    fn unknown_text_reports_no_new_symptoms() {
        let outcome = run(state("routine follow-up, feeling well"));
        assert!(outcome.state.symptoms().is_empty());
        assert!(outcome.warning.is_none());
        assert!(outcome.summary.starts_with("no new symptom phrases"));
    }
}
