//! Session authorization gate.
//!
//! A `Session` is created once at process start and shared by handle. It maps patient
//! identities to a verified flag and is the single place record stores ask "may this
//! identity write?". Verification is identity-level and never expires; the flag is only
//! cleared when the operator switches the active patient to that identity.

use crate::collaborators::PresenceDetector;
use crate::config::PresenceFallback;
use consult_types::PatientId;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Outcome of a presence verification attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// The detector saw a face.
    Detected,
    /// The detector ran and saw no face.
    NotDetected,
    /// No working detector; the configured fallback decided.
    Fallback { authorized: bool },
}

impl PresenceOutcome {
    pub fn authorized(self) -> bool {
        match self {
            PresenceOutcome::Detected => true,
            PresenceOutcome::NotDetected => false,
            PresenceOutcome::Fallback { authorized } => authorized,
        }
    }
}

#[derive(Debug, Default)]
struct SessionInner {
    verified: HashMap<PatientId, bool>,
    active_patient: Option<PatientId>,
}

#[derive(Debug, Default)]
pub struct Session {
    inner: RwLock<SessionInner>,
    presence_fallback: PresenceFallback,
}

impl Session {
    pub fn new(presence_fallback: PresenceFallback) -> Self {
        Self {
            inner: RwLock::new(SessionInner::default()),
            presence_fallback,
        }
    }

    // The map only holds booleans, so a panic mid-update cannot leave it inconsistent;
    // recover the guard instead of failing every later check.
    fn read(&self) -> RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn presence_fallback(&self) -> PresenceFallback {
        self.presence_fallback
    }

    /// Marks `patient_id` as verified.
    pub fn authorize(&self, patient_id: &PatientId) {
        self.write().verified.insert(patient_id.clone(), true);
        tracing::info!(patient_id = %patient_id, "session authorized");
    }

    /// Clears the verified flag for `patient_id`, creating the entry if needed.
    pub fn revoke(&self, patient_id: &PatientId) {
        self.write().verified.insert(patient_id.clone(), false);
        tracing::info!(patient_id = %patient_id, "session authorization cleared");
    }

    /// Pure lookup; unknown identities are not authorized.
    pub fn is_authorized(&self, patient_id: &PatientId) -> bool {
        self.read()
            .verified
            .get(patient_id)
            .copied()
            .unwrap_or(false)
    }

    pub fn active_patient(&self) -> Option<PatientId> {
        self.read().active_patient.clone()
    }

    /// Makes `patient_id` the active identity.
    ///
    /// Switching to a different identity resets that identity's flag, so it must pass a
    /// presence check again before its records can be written. Re-selecting the current
    /// identity changes nothing.
    pub fn select_patient(&self, patient_id: &PatientId) {
        let mut inner = self.write();
        if inner.active_patient.as_ref() == Some(patient_id) {
            return;
        }
        inner.active_patient = Some(patient_id.clone());
        inner.verified.insert(patient_id.clone(), false);
        tracing::info!(patient_id = %patient_id, "active patient changed");
    }

    /// Runs the presence check for `patient_id` and updates the session flag.
    ///
    /// A detector that reports absence clears the flag. A missing detector, or one that
    /// fails to run, is resolved by the configured [`PresenceFallback`].
    pub fn verify_presence(
        &self,
        patient_id: &PatientId,
        image: &[u8],
        detector: Option<&dyn PresenceDetector>,
    ) -> PresenceOutcome {
        let outcome = match detector.map(|d| d.detect_presence(image)) {
            Some(Ok(true)) => PresenceOutcome::Detected,
            Some(Ok(false)) => PresenceOutcome::NotDetected,
            Some(Err(err)) => {
                tracing::warn!(patient_id = %patient_id, "presence detector failed: {}", err);
                self.fallback_outcome()
            }
            None => self.fallback_outcome(),
        };

        if outcome.authorized() {
            self.authorize(patient_id);
        } else {
            self.revoke(patient_id);
        }
        outcome
    }

    fn fallback_outcome(&self) -> PresenceOutcome {
        PresenceOutcome::Fallback {
            authorized: self.presence_fallback == PresenceFallback::FailOpen,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollaboratorError;

    struct FixedDetector(Result<bool, CollaboratorError>);

    impl PresenceDetector for FixedDetector {
        fn detect_presence(&self, _image: &[u8]) -> Result<bool, CollaboratorError> {
            self.0.clone()
        }
    }

    fn pid(s: &str) -> PatientId {
        PatientId::new(s).unwrap()
    }

    #[test]
    fn unknown_identity_is_not_authorized() {
        let session = Session::default();
        assert!(!session.is_authorized(&pid("nobody")));
    }

    #[test]
    fn authorize_then_revoke() {
        let session = Session::default();
        let p = pid("P001");
        session.authorize(&p);
        assert!(session.is_authorized(&p));
        assert!(!session.is_authorized(&pid("P002")), "flags are per identity");
        session.revoke(&p);
        assert!(!session.is_authorized(&p));
    }

    #[test]
    fn detected_face_authorizes_and_absent_face_clears() {
        let session = Session::default();
        let p = pid("P001");

        let outcome = session.verify_presence(&p, b"img", Some(&FixedDetector(Ok(true))));
        assert_eq!(outcome, PresenceOutcome::Detected);
        assert!(session.is_authorized(&p));

        let outcome = session.verify_presence(&p, b"img", Some(&FixedDetector(Ok(false))));
        assert_eq!(outcome, PresenceOutcome::NotDetected);
        assert!(!session.is_authorized(&p));
    }

    #[test]
    fn missing_detector_fails_closed_by_default() {
        let session = Session::new(PresenceFallback::FailClosed);
        let p = pid("P001");
        let outcome = session.verify_presence(&p, b"img", None);
        assert_eq!(outcome, PresenceOutcome::Fallback { authorized: false });
        assert!(!session.is_authorized(&p));
    }

    #[test]
    fn broken_detector_fails_open_when_configured() {
        let session = Session::new(PresenceFallback::FailOpen);
        let p = pid("P001");
        let detector = FixedDetector(Err(CollaboratorError::Unavailable("no camera".into())));
        let outcome = session.verify_presence(&p, b"img", Some(&detector));
        assert_eq!(outcome, PresenceOutcome::Fallback { authorized: true });
        assert!(session.is_authorized(&p));
    }

    #[test]
    fn switching_patient_resets_the_new_identity() {
        let session = Session::default();
        let a = pid("A");
        let b = pid("B");

        session.select_patient(&a);
        session.authorize(&a);
        session.authorize(&b);

        session.select_patient(&a);
        assert!(session.is_authorized(&a), "re-selecting keeps the flag");

        session.select_patient(&b);
        assert_eq!(session.active_patient(), Some(b.clone()));
        assert!(!session.is_authorized(&b), "switching resets the flag");
    }
}
