//! Side-effecting clinical actions on a reviewed consultation.
//!
//! [`ClinicalActions`] is the only place that writes to the record stores on behalf of a
//! consultation. Every write is checked against the [`Session`] by the store itself, and
//! every successful write is traced on the state as an executed action plus an audit
//! entry.

use crate::config::CoreConfig;
use crate::error::{ConsultError, ConsultResult};
use crate::repositories::{
    EmrEntry, EmrRecord, EmrStore, OrderStatus, PharmacyEntry, PharmacyOrder, PharmacyStore,
};
use crate::session::Session;
use crate::state::{ConsultationState, ExecutedAction};
use consult_types::PatientId;
use std::sync::Arc;

pub struct ClinicalActions {
    session: Arc<Session>,
    emr: EmrStore,
    pharmacy: PharmacyStore,
}

impl ClinicalActions {
    pub fn new(cfg: &CoreConfig, session: Arc<Session>) -> Self {
        Self {
            session,
            emr: EmrStore::emr(cfg),
            pharmacy: PharmacyStore::pharmacy(cfg),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn emr_store(&self) -> &EmrStore {
        &self.emr
    }

    pub fn pharmacy_store(&self) -> &PharmacyStore {
        &self.pharmacy
    }

    /// Writes the consultation to the EMR store and traces the write on `state`.
    ///
    /// `approved_by_doctor` reflects the latest review decision on the state.
    ///
    /// # Errors
    ///
    /// [`ConsultError::PermissionDenied`] if the patient is not authorized, or a storage
    /// error if the record cannot be persisted. `state` is left untouched on error.
    pub fn commit_to_emr(&self, state: &mut ConsultationState) -> ConsultResult<EmrRecord> {
        let entry = EmrEntry::from_state(state);
        let record = self.emr.append(&self.session, state.patient_id(), entry)?;

        state.push_action(ExecutedAction::UpdateEmr {
            record_id: record.record_id.clone(),
            approved_by_doctor: record.payload.approved_by_doctor,
        });
        state.push_audit(format!(
            "EMR update: wrote {} (approved_by_doctor: {})",
            record.record_id, record.payload.approved_by_doctor
        ));
        Ok(record)
    }

    /// Sends the current draft prescription to the pharmacy store, linked to the latest
    /// EMR record written for this consultation if there is one.
    ///
    /// Only a draft whose latest review decision is an approval can be sent.
    ///
    /// # Errors
    ///
    /// [`ConsultError::NotApproved`] if the consultation is unreviewed or its latest
    /// decision is a rejection, [`ConsultError::InvalidInput`] if there is no draft to
    /// send, otherwise as [`ClinicalActions::commit_to_emr`].
    pub fn send_to_pharmacy(&self, state: &mut ConsultationState) -> ConsultResult<PharmacyOrder> {
        if !matches!(state.latest_review(), Some((true, _))) {
            tracing::warn!(patient_id = %state.patient_id(), "pharmacy order refused: draft not approved");
            return Err(ConsultError::NotApproved);
        }

        let prescription = state.draft_prescription().trim();
        if prescription.is_empty() {
            return Err(ConsultError::InvalidInput(
                "no draft prescription to send".into(),
            ));
        }

        let entry = PharmacyEntry {
            prescription: prescription.to_string(),
            emr_record_id: state.latest_emr_record_id().map(str::to_string),
            status: OrderStatus::Sent,
        };
        let order = self.pharmacy.append(&self.session, state.patient_id(), entry)?;

        state.push_action(ExecutedAction::SendToPharmacy {
            order_id: order.record_id.clone(),
            emr_record_id: order.payload.emr_record_id.clone(),
        });
        let linked = order
            .payload
            .emr_record_id
            .as_deref()
            .map(|id| format!(" for {id}"))
            .unwrap_or_default();
        state.push_audit(format!("Pharmacy order: sent {}{linked}", order.record_id));
        Ok(order)
    }

    /// EMR history for an authorized patient, newest first.
    ///
    /// # Errors
    ///
    /// [`ConsultError::PermissionDenied`] if the patient is not authorized.
    pub fn emr_history(&self, patient_id: &PatientId) -> ConsultResult<Vec<EmrRecord>> {
        self.require_authorized(patient_id)?;
        Ok(self.emr.query(patient_id))
    }

    /// Pharmacy orders for an authorized patient, newest first.
    ///
    /// # Errors
    ///
    /// [`ConsultError::PermissionDenied`] if the patient is not authorized.
    pub fn pharmacy_history(&self, patient_id: &PatientId) -> ConsultResult<Vec<PharmacyOrder>> {
        self.require_authorized(patient_id)?;
        Ok(self.pharmacy.query(patient_id))
    }

    fn require_authorized(&self, patient_id: &PatientId) -> ConsultResult<()> {
        if self.session.is_authorized(patient_id) {
            Ok(())
        } else {
            Err(ConsultError::PermissionDenied {
                patient_id: patient_id.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReviewPolicy;
    use crate::stages::review::apply_decision;
    use tempfile::TempDir;

    fn test_cfg(dir: &TempDir) -> CoreConfig {
        CoreConfig::with_data_dir(dir.path().to_path_buf())
    }

    fn pid() -> PatientId {
        PatientId::new("P001").unwrap()
    }

    fn reviewed_state() -> ConsultationState {
        let mut state = ConsultationState::new(pid(), "fever");
        state.set_draft_prescription("Paracetamol 500 mg");
        apply_decision(state, true, "ok", ReviewPolicy::Amend).unwrap()
    }

    #[test]
    fn commit_requires_authorization_and_leaves_state_alone() {
        let dir = TempDir::new().unwrap();
        let actions = ClinicalActions::new(&test_cfg(&dir), Arc::new(Session::default()));
        let mut state = reviewed_state();
        let before = state.clone();

        let err = actions.commit_to_emr(&mut state).unwrap_err();
        assert!(matches!(err, ConsultError::PermissionDenied { .. }));
        assert_eq!(state, before);
    }

    #[test]
    fn failed_emr_write_leaves_state_alone() {
        let dir = TempDir::new().unwrap();
        let data_dir = dir.path().join("data");
        std::fs::write(&data_dir, "not a directory").unwrap();
        let session = Arc::new(Session::default());
        session.authorize(&pid());
        let actions = ClinicalActions::new(&CoreConfig::with_data_dir(data_dir), session);
        let mut state = reviewed_state();
        let before = state.clone();

        let err = actions.commit_to_emr(&mut state).unwrap_err();
        assert!(matches!(
            err,
            ConsultError::StorageDirCreation(_) | ConsultError::FileWrite { .. }
        ));
        assert_eq!(state, before);
        assert!(state.latest_emr_record_id().is_none());
    }

    #[test]
    fn commit_traces_the_write() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(Session::default());
        session.authorize(&pid());
        let actions = ClinicalActions::new(&test_cfg(&dir), session);
        let mut state = reviewed_state();

        let record = actions.commit_to_emr(&mut state).unwrap();
        assert!(record.payload.approved_by_doctor);
        assert_eq!(state.latest_emr_record_id(), Some(record.record_id.as_str()));
        assert!(state.audit_log().last().unwrap().contains(&record.record_id));
    }

    #[test]
    fn pharmacy_order_links_latest_emr_record() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(Session::default());
        session.authorize(&pid());
        let actions = ClinicalActions::new(&test_cfg(&dir), session);
        let mut state = reviewed_state();

        let emr = actions.commit_to_emr(&mut state).unwrap();
        let order = actions.send_to_pharmacy(&mut state).unwrap();
        assert_eq!(order.record_id, "RX-000001");
        assert_eq!(order.payload.emr_record_id.as_deref(), Some(emr.record_id.as_str()));
        assert_eq!(order.payload.prescription, "Paracetamol 500 mg");
        assert_eq!(state.executed_actions().len(), 3);
    }

    #[test]
    fn empty_draft_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(Session::default());
        session.authorize(&pid());
        let actions = ClinicalActions::new(&test_cfg(&dir), session);
        let state = ConsultationState::new(pid(), "fever");
        let mut state = apply_decision(state, true, "ok", ReviewPolicy::Amend).unwrap();

        let err = actions.send_to_pharmacy(&mut state).unwrap_err();
        assert!(matches!(err, ConsultError::InvalidInput(_)));
        assert!(actions.pharmacy_store().load().is_empty());
    }

    #[test]
    fn rejected_draft_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(Session::default());
        session.authorize(&pid());
        let actions = ClinicalActions::new(&test_cfg(&dir), session);
        let mut state = ConsultationState::new(pid(), "chest pain");
        state.set_draft_prescription("Aspirin 300 mg");
        let mut state =
            apply_decision(state, false, "do not dispense", ReviewPolicy::Amend).unwrap();
        let before = state.clone();

        let err = actions.send_to_pharmacy(&mut state).unwrap_err();
        assert!(matches!(err, ConsultError::NotApproved));
        assert_eq!(state, before);
        assert!(actions.pharmacy_store().load().is_empty());
    }

    #[test]
    fn unreviewed_draft_is_not_sent() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(Session::default());
        session.authorize(&pid());
        let actions = ClinicalActions::new(&test_cfg(&dir), session);
        let mut state = ConsultationState::new(pid(), "chest pain");
        state.set_draft_prescription("Aspirin 300 mg");

        let err = actions.send_to_pharmacy(&mut state).unwrap_err();
        assert!(matches!(err, ConsultError::NotApproved));
        assert!(actions.pharmacy_store().load().is_empty());
    }

    #[test]
    fn approval_after_rejection_allows_the_order() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(Session::default());
        session.authorize(&pid());
        let actions = ClinicalActions::new(&test_cfg(&dir), session);
        let mut state = ConsultationState::new(pid(), "fever");
        state.set_draft_prescription("Paracetamol 500 mg");
        let state = apply_decision(state, false, "wait for CBC", ReviewPolicy::Amend).unwrap();
        let mut state = apply_decision(state, true, "CBC normal", ReviewPolicy::Amend).unwrap();

        assert!(actions.send_to_pharmacy(&mut state).is_ok());
    }

    #[test]
    fn history_reads_are_gated() {
        let dir = TempDir::new().unwrap();
        let session = Arc::new(Session::default());
        let actions = ClinicalActions::new(&test_cfg(&dir), Arc::clone(&session));

        assert!(actions.emr_history(&pid()).is_err());
        session.authorize(&pid());
        let mut state = reviewed_state();
        actions.commit_to_emr(&mut state).unwrap();
        assert_eq!(actions.emr_history(&pid()).unwrap().len(), 1);
        assert!(actions.pharmacy_history(&pid()).unwrap().is_empty());

        session.select_patient(&pid());
        assert!(actions.emr_history(&pid()).is_err());
    }
}
