//! Safety check.
//!
//! A fixed set of pattern rules over the symptom list and the draft prescription text.
//! Flags are advisory: they are appended to the state for the reviewing clinician and
//! never stop the pipeline. A flag already present on the state is not raised twice.

use super::StageOutcome;
use crate::state::ConsultationState;
use regex::Regex;
use std::sync::LazyLock;

struct SafetyRule {
    /// Drug pattern the draft must match; `None` for symptom-only red flags.
    prescription: Option<Regex>,
    /// The rule needs at least one of these symptoms; empty means no symptom condition.
    any_symptom: &'static [&'static str],
    message: &'static str,
}

impl SafetyRule {
    fn fires(&self, symptoms: &[String], draft: &str) -> bool {
        let drug_ok = self
            .prescription
            .as_ref()
            .map_or(true, |re| re.is_match(draft));
        let symptom_ok = self.any_symptom.is_empty()
            || self
                .any_symptom
                .iter()
                .any(|wanted| symptoms.iter().any(|s| s == wanted));
        drug_ok && symptom_ok
    }
}

fn rule(
    pattern: Option<&str>,
    any_symptom: &'static [&'static str],
    message: &'static str,
) -> SafetyRule {
    SafetyRule {
        prescription: pattern.map(|p| Regex::new(p).expect("invalid safety rule pattern")),
        any_symptom,
        message,
    }
}

static SAFETY_RULES: LazyLock<Vec<SafetyRule>> = LazyLock::new(|| {
    vec![
        rule(
            Some(r"(?i)\b(aspirin|ibuprofen|naproxen|diclofenac)\b"),
            &["abdominal pain", "vomiting"],
            "Aspirin/NSAID with abdominal pain or vomiting: risk of gastrointestinal bleeding; consider gastroprotection or an alternative",
        ),
        rule(
            Some(r"(?i)\b(ibuprofen|naproxen|diclofenac)\b"),
            &["hypertension"],
            "NSAID in a hypertensive patient: may raise blood pressure; monitor BP or prefer paracetamol",
        ),
        rule(
            Some(r"(?i)\b(propranolol|atenolol|metoprolol|beta[- ]?blockers?)\b"),
            &["shortness of breath", "cough"],
            "Beta-blocker with respiratory symptoms: risk of bronchospasm in asthma/COPD; confirm airway history",
        ),
        rule(
            Some(r"(?i)\bmetformin\b"),
            &["vomiting"],
            "Metformin with vomiting: withhold if dehydrated (lactic acidosis risk)",
        ),
        rule(
            Some(r"(?i)\b(amoxicillin|ampicillin|penicillin)\b"),
            &[],
            "Penicillin-class antibiotic: confirm penicillin allergy status before dispensing",
        ),
        rule(
            None,
            &["chest pain"],
            "Red flag: chest pain requires exclusion of acute coronary syndrome before discharge",
        ),
    ]
});

/// Messages of every rule that fires for the given symptoms and draft, in rule order.
pub fn evaluate(symptoms: &[String], draft: &str) -> Vec<String> {
    SAFETY_RULES
        .iter()
        .filter(|r| r.fires(symptoms, draft))
        .map(|r| r.message.to_string())
        .collect()
}

pub fn run(mut state: ConsultationState) -> StageOutcome {
    let fired = evaluate(state.symptoms(), state.draft_prescription());
    let new_flags: Vec<String> = fired
        .into_iter()
        .filter(|flag| !state.safety_flags().contains(flag))
        .collect();

    let summary = match new_flags.len() {
        0 if state.safety_flags().is_empty() => "no flags".to_string(),
        0 => format!(
            "no new flags ({} raised previously)",
            state.safety_flags().len()
        ),
        n => format!("raised {n} flag(s): {}", new_flags.join("; ")),
    };
    state.push_safety_flags(new_flags);
    StageOutcome::done(state, summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use consult_types::PatientId;

    fn labels(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn nsaid_with_abdominal_pain_is_flagged() {
        let flags = evaluate(
            &labels(&["headache", "abdominal pain"]),
            "Ibuprofen 400 mg PO every 8 hours",
        );
        assert_eq!(flags.len(), 1);
        assert!(flags[0].contains("gastrointestinal bleeding"));
    }

    #[test]
    fn drug_rules_need_the_drug() {
        let flags = evaluate(&labels(&["hypertension"]), "Paracetamol 500 mg");
        assert!(flags.is_empty());
    }

    #[test]
    fn drug_only_rule_fires_without_symptoms() {
        let flags = evaluate(&[], "amoxicillin 500 mg TDS");
        assert_eq!(flags.len(), 1);
        assert!(flags[0].contains("penicillin allergy"));
    }

    #[test]
    fn beta_blocker_pattern_matches_spelling_variants() {
        for draft in ["start Beta-blocker", "beta blockers", "Propranolol 10 mg"] {
            let flags = evaluate(&labels(&["cough"]), draft);
            assert_eq!(flags.len(), 1, "expected a flag for {draft:?}");
        }
    }

    #[test]
    fn rerun_does_not_duplicate_flags() {
        let mut state = ConsultationState::new(PatientId::new("P001").unwrap(), "");
        state.merge_symptoms(labels(&["chest pain"]));

        let first = run(state);
        assert_eq!(first.state.safety_flags().len(), 1);
        assert!(first.summary.starts_with("raised 1 flag"));

        let second = run(first.state);
        assert_eq!(second.state.safety_flags().len(), 1);
        assert!(second.summary.starts_with("no new flags"));
    }

    #[test]
    fn clean_state_reports_no_flags() {
        let state = ConsultationState::new(PatientId::new("P001").unwrap(), "");
        let outcome = run(state);
        assert_eq!(outcome.summary, "no flags");
        assert!(outcome.state.safety_flags().is_empty());
    }
}
