//! Prescription drafting.
//!
//! Renders a deterministic draft from the symptom and test lists. The draft is a starting
//! point for the clinician, who may edit it before approval; it is never sent anywhere by
//! this stage.

use super::StageOutcome;
use crate::state::ConsultationState;

/// Symptom label → suggested medication line.
pub const MEDICATION_TABLE: &[(&str, &str)] = &[
    (
        "chest pain",
        "Aspirin 300 mg PO stat if acute coronary syndrome is suspected",
    ),
    (
        "shortness of breath",
        "Salbutamol 100 mcg inhaler, 2 puffs as needed",
    ),
    ("fever", "Paracetamol 500 mg PO every 6 hours as needed"),
    (
        "cough",
        "Dextromethorphan syrup 10 ml PO every 8 hours as needed",
    ),
    (
        "headache",
        "Ibuprofen 400 mg PO every 8 hours with food as needed",
    ),
    ("vomiting", "Ondansetron 4 mg PO every 8 hours as needed"),
    ("abdominal pain", "Omeprazole 20 mg PO once daily before breakfast"),
    ("diabetes", "Continue Metformin 500 mg PO twice daily"),
    ("hypertension", "Continue Amlodipine 5 mg PO once daily"),
];

fn medication_for(symptom: &str) -> Option<&'static str> {
    MEDICATION_TABLE
        .iter()
        .find(|(label, _)| *label == symptom)
        .map(|(_, line)| *line)
}

/// Renders the draft for `state`.
pub fn draft(state: &ConsultationState) -> String {
    let mut lines = vec![format!(
        "Provisional prescription for patient {}",
        state.patient_id()
    )];

    lines.push(if state.symptoms().is_empty() {
        "Presenting symptoms: none recorded".to_string()
    } else {
        format!("Presenting symptoms: {}", state.symptoms().join(", "))
    });

    lines.push(if state.suggested_tests().is_empty() {
        "Investigations: none suggested".to_string()
    } else {
        format!("Investigations: {}", state.suggested_tests().join(", "))
    });

    let medications: Vec<&str> = state
        .symptoms()
        .iter()
        .filter_map(|s| medication_for(s))
        .collect();
    if medications.is_empty() {
        lines.push("Medications: none; clinical assessment required before prescribing".into());
    } else {
        lines.push("Medications:".into());
        lines.extend(
            medications
                .iter()
                .enumerate()
                .map(|(i, line)| format!("  {}. {}", i + 1, line)),
        );
    }

    lines.push(
        "Advice: review with investigation results; return immediately if symptoms worsen".into(),
    );
    lines.push("Status: draft pending clinician review".into());
    lines.join("\n")
}

pub fn run(mut state: ConsultationState) -> StageOutcome {
    let text = draft(&state);
    let lines = text.lines().count();
    state.set_draft_prescription(text);

    let summary = if state.symptoms().is_empty() {
        format!("drafted template prescription with no findings ({lines} lines)")
    } else {
        format!(
            "drafted prescription for {} symptom(s) and {} test(s)",
            state.symptoms().len(),
            state.suggested_tests().len()
        )
    };
    StageOutcome::done(state, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use consult_types::PatientId;

    fn state_with(symptoms: &[&str], tests: &[&str]) -> ConsultationState {
        let mut state = ConsultationState::new(PatientId::new("P001").unwrap(), "");
        state.merge_symptoms(symptoms.iter().map(|s| s.to_string()));
        state.replace_plan(tests.iter().map(|t| t.to_string()).collect(), Vec::new());
        state
    }

    #[test]
    fn every_canonical_symptom_has_a_medication() {
        for (_, label) in crate::stages::symptoms::SYMPTOM_PHRASES {
            assert!(
                medication_for(label).is_some(),
                "missing medication line for {label}"
            );
        }
    }

    #[test]
    fn draft_lists_findings_and_medications() {
        let text = draft(&state_with(&["chest pain", "fever"], &["ECG", "CBC"]));
        assert!(text.contains("Presenting symptoms: chest pain, fever"));
        assert!(text.contains("Investigations: ECG, CBC"));
        assert!(text.contains("1. Aspirin"));
        assert!(text.contains("2. Paracetamol"));
    }

    #[test]
    fn draft_without_findings_is_still_produced() {
        let outcome = run(state_with(&[], &[]));
        let text = outcome.state.draft_prescription();
        assert!(!text.is_empty());
        assert!(text.contains("none recorded"));
        assert!(text.contains("none suggested"));
        assert!(outcome.summary.contains("no findings"));
    }

    #[test]
    fn draft_is_deterministic() {
        let s = state_with(&["cough"], &["CBC"]);
        assert_eq!(draft(&s), draft(&s));
    }

    #[test]
    fn draft_layout_is_one_section_per_line() {
        let text = draft(&state_with(&["fever"], &["CBC"]));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            [
                "Provisional prescription for patient P001",
                "Presenting symptoms: fever",
                "Investigations: CBC",
                "Medications:",
                "  1. Paracetamol 500 mg PO every 6 hours as needed",
                "Advice: review with investigation results; return immediately if symptoms worsen",
                "Status: draft pending clinician review",
            ]
        );
        assert!(!text.ends_with('\n'));
    }
}
