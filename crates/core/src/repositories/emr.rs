//! EMR store: one record per committed consultation.

use super::store::{Record, RecordStore};
use crate::config::CoreConfig;
use crate::constants::EMR_ID_PREFIX;
use crate::state::ConsultationState;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmrEntry {
    pub symptoms: Vec<String>,
    pub suggested_tests: Vec<String>,
    pub draft_prescription: String,
    pub approved_by_doctor: bool,
    pub doctor_comments: String,
}

impl EmrEntry {
    /// Snapshot of `state` as it stands, carrying the effective review decision.
    /// A consultation that was never reviewed is recorded as not approved.
    pub fn from_state(state: &ConsultationState) -> Self {
        let (approved_by_doctor, doctor_comments) = state
            .latest_review()
            .map(|(approved, comments)| (approved, comments.to_string()))
            .unwrap_or_default();
        Self {
            symptoms: state.symptoms().to_vec(),
            suggested_tests: state.suggested_tests().to_vec(),
            draft_prescription: state.draft_prescription().to_string(),
            approved_by_doctor,
            doctor_comments,
        }
    }
}

pub type EmrRecord = Record<EmrEntry>;
pub type EmrStore = RecordStore<EmrEntry>;

impl RecordStore<EmrEntry> {
    pub fn emr(cfg: &CoreConfig) -> Self {
        Self::open(cfg.emr_store_path(), EMR_ID_PREFIX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReviewPolicy;
    use crate::stages::review::apply_decision;
    use consult_types::PatientId;

    #[test]
    fn entry_takes_the_latest_review() {
        let state = ConsultationState::new(PatientId::new("P001").unwrap(), "fever");
        let state = apply_decision(state, false, "no", ReviewPolicy::Amend).unwrap();
        let state = apply_decision(state, true, "fine now", ReviewPolicy::Amend).unwrap();

        let entry = EmrEntry::from_state(&state);
        assert!(entry.approved_by_doctor);
        assert_eq!(entry.doctor_comments, "fine now");
    }

    #[test]
    fn unreviewed_state_is_not_approved() {
        let state = ConsultationState::new(PatientId::new("P001").unwrap(), "fever");
        let entry = EmrEntry::from_state(&state);
        assert!(!entry.approved_by_doctor);
        assert!(entry.doctor_comments.is_empty());
    }

    #[test]
    fn emr_store_uses_emr_prefix_and_file() {
        let cfg = CoreConfig::with_data_dir("/tmp/consult-test".into());
        let store = EmrStore::emr(&cfg);
        assert_eq!(store.prefix(), "EMR");
        assert!(store.path().ends_with("emr_store.json"));
    }
}
