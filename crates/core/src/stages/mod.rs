//! Pipeline stages.
//!
//! Each stage takes the state by value and hands it back inside a [`StageOutcome`] along
//! with a one-line summary and an optional warning. Stages never fail: a stage that has
//! nothing useful to do says so in its summary, and a degraded collaborator shows up as a
//! warning. The orchestrator turns each outcome into exactly one audit entry.

pub mod planning;
pub mod prescription;
pub mod review;
pub mod safety;
pub mod symptoms;

use crate::state::ConsultationState;

/// The enrichment stages, in pipeline order.
///
/// The declaration order is the execution order and the derived `Ord` follows it:
/// symptoms must exist before tests are planned, symptoms and tests before a prescription
/// is drafted, and a prescription before it is safety-checked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    SymptomExtraction,
    Planning,
    PrescriptionDrafting,
    SafetyCheck,
}

impl Stage {
    /// Every stage, in the only order the orchestrator runs them.
    pub const PIPELINE: [Stage; 4] = [
        Stage::SymptomExtraction,
        Stage::Planning,
        Stage::PrescriptionDrafting,
        Stage::SafetyCheck,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Stage::SymptomExtraction => "Symptom extraction",
            Stage::Planning => "Planning",
            Stage::PrescriptionDrafting => "Prescription drafting",
            Stage::SafetyCheck => "Safety check",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub struct StageOutcome {
    pub state: ConsultationState,
    pub summary: String,
    pub warning: Option<String>,
}

impl StageOutcome {
    pub fn done(state: ConsultationState, summary: impl Into<String>) -> Self {
        Self {
            state,
            summary: summary.into(),
            warning: None,
        }
    }

    pub fn degraded(
        state: ConsultationState,
        summary: impl Into<String>,
        warning: impl Into<String>,
    ) -> Self {
        Self {
            state,
            summary: summary.into(),
            warning: Some(warning.into()),
        }
    }
}

/// Renders a label list the way audit entries show it: `[a, b]`.
pub(crate) fn bracketed(items: &[String]) -> String {
    format!("[{}]", items.join(", "))
}

/// Finds every `(needle, canonical)` entry of `table` in `haystack` and returns the
/// canonical forms ordered by where they first occur, ties broken by table order, with
/// duplicates removed.
pub(crate) fn matches_in_order_of_appearance(
    haystack: &str,
    table: &[(&str, &str)],
) -> Vec<String> {
    let mut found: Vec<(usize, usize, &str)> = table
        .iter()
        .enumerate()
        .filter_map(|(idx, (needle, canonical))| {
            haystack.find(needle).map(|pos| (pos, idx, *canonical))
        })
        .collect();
    found.sort_unstable_by_key(|&(pos, idx, _)| (pos, idx));

    let mut ordered: Vec<String> = Vec::with_capacity(found.len());
    for (_, _, canonical) in found {
        if !ordered.iter().any(|c| c == canonical) {
            ordered.push(canonical.to_string());
        }
    }
    ordered
}
