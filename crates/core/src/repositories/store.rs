//! Generic JSON-array record store.
//!
//! ## Write path
//!
//! `append` runs entirely under the store's write lock:
//!
//! 1. refuse unless the session authorizes the patient,
//! 2. read the persisted collection,
//! 3. assign `max(counter, highest persisted sequence) + 1`,
//! 4. stamp a UTC timestamp,
//! 5. write the whole collection to a sibling `.tmp` file and rename it over the store.
//!
//! The rename makes every replace atomic, so readers only ever see a complete collection.
//! Sequence numbers come from a counter owned by the handle, never from the collection
//! length, so removing lines from the file by hand cannot cause an identifier to be
//! issued twice by the same process.
//!
//! ## Read path
//!
//! `query` is lock-free and never fails: a missing, unreadable or corrupt file reads as
//! an empty store. `append` is stricter and refuses to replace a file it cannot parse.

use crate::constants::RECORD_SEQUENCE_WIDTH;
use crate::error::{ConsultError, ConsultResult};
use crate::session::Session;
use chrono::{DateTime, Utc};
use consult_types::PatientId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A persisted record: store-assigned identity plus the store-specific payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record<P> {
    pub record_id: String,
    pub patient_id: PatientId,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub payload: P,
}

pub struct RecordStore<P> {
    path: PathBuf,
    prefix: &'static str,
    /// Last sequence number issued by this handle. Held for the whole append.
    last_issued: Mutex<u64>,
    _payload: PhantomData<fn() -> P>,
}

impl<P> RecordStore<P>
where
    P: Serialize + DeserializeOwned + Clone,
{
    /// Creates a handle for the store at `path`. No I/O happens until first use.
    pub fn open(path: impl Into<PathBuf>, prefix: &'static str) -> Self {
        Self {
            path: path.into(),
            prefix,
            last_issued: Mutex::new(0),
            _payload: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn prefix(&self) -> &'static str {
        self.prefix
    }

    /// Appends a record for `patient_id`, returning it with its assigned id and timestamp.
    ///
    /// # Errors
    ///
    /// - [`ConsultError::PermissionDenied`] if `session` does not authorize the patient.
    /// - [`ConsultError::StoreUnreadable`] if the store file exists but cannot be parsed.
    /// - [`ConsultError::LockPoisoned`] if a previous writer panicked mid-append.
    /// - Storage errors if the collection cannot be written.
    pub fn append(
        &self,
        session: &Session,
        patient_id: &PatientId,
        payload: P,
    ) -> ConsultResult<Record<P>> {
        if !session.is_authorized(patient_id) {
            tracing::warn!(%patient_id, store = self.prefix, "append refused: not authorized");
            return Err(ConsultError::PermissionDenied {
                patient_id: patient_id.to_string(),
            });
        }

        let mut last_issued = self
            .last_issued
            .lock()
            .map_err(|_| ConsultError::LockPoisoned("record store"))?;

        let mut records = self.load_strict()?;
        let highest = records
            .iter()
            .filter_map(|r| self.sequence_of(&r.record_id))
            .max()
            .unwrap_or(0);
        let sequence = (*last_issued).max(highest) + 1;

        let record = Record {
            record_id: self.format_id(sequence),
            patient_id: patient_id.clone(),
            timestamp: Utc::now(),
            payload,
        };
        records.push(record.clone());
        self.persist(&records)?;
        *last_issued = sequence;

        tracing::info!(
            record_id = %record.record_id,
            %patient_id,
            total = records.len(),
            "record appended"
        );
        Ok(record)
    }

    /// Records for `patient_id`, newest first. Ties on timestamp go to the higher id.
    pub fn query(&self, patient_id: &PatientId) -> Vec<Record<P>> {
        let mut records: Vec<Record<P>> = self
            .load()
            .into_iter()
            .filter(|r| &r.patient_id == patient_id)
            .collect();
        records.sort_by(|a, b| {
            b.timestamp.cmp(&a.timestamp).then_with(|| {
                self.sequence_of(&b.record_id)
                    .cmp(&self.sequence_of(&a.record_id))
            })
        });
        records
    }

    /// Every persisted record, in file order. Unreadable stores read as empty.
    pub fn load(&self) -> Vec<Record<P>> {
        match self.load_strict() {
            Ok(records) => records,
            Err(err) => {
                tracing::warn!(path = %self.path.display(), error = %err, "treating record store as empty");
                Vec::new()
            }
        }
    }

    fn load_strict(&self) -> ConsultResult<Vec<Record<P>>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(data) => data,
            // A parent that is a regular file also means nothing has been stored yet;
            // the write path reports it.
            Err(e) if e.kind() == ErrorKind::NotFound || !self.path.exists() => {
                return Ok(Vec::new())
            }
            Err(e) => {
                return Err(ConsultError::StoreUnreadable {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };
        if data.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&data).map_err(|e| ConsultError::StoreUnreadable {
            path: self.path.clone(),
            reason: e.to_string(),
        })
    }

    fn persist(&self, records: &[Record<P>]) -> ConsultResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(ConsultError::StorageDirCreation)?;
            }
        }

        let data = serde_json::to_string_pretty(records).map_err(ConsultError::Serialization)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, data).map_err(|source| ConsultError::FileWrite {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &self.path).map_err(|source| ConsultError::FileWrite {
            path: self.path.clone(),
            source,
        })
    }

    fn format_id(&self, sequence: u64) -> String {
        format!(
            "{}-{:0width$}",
            self.prefix,
            sequence,
            width = RECORD_SEQUENCE_WIDTH
        )
    }

    /// Sequence number of an id issued by this store; `None` for foreign ids.
    fn sequence_of(&self, record_id: &str) -> Option<u64> {
        record_id
            .strip_prefix(self.prefix)?
            .strip_prefix('-')?
            .parse()
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PresenceFallback;
    use std::collections::HashSet;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    fn note(text: &str) -> Note {
        Note { text: text.into() }
    }

    fn pid(id: &str) -> PatientId {
        PatientId::new(id).unwrap()
    }

    fn authorized(ids: &[&str]) -> Session {
        let session = Session::new(PresenceFallback::FailClosed);
        for id in ids {
            session.authorize(&pid(id));
        }
        session
    }

    fn store(dir: &TempDir) -> RecordStore<Note> {
        RecordStore::open(dir.path().join("notes.json"), "NT")
    }

    #[test]
    fn unauthorized_append_is_refused_and_nothing_is_written() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let session = authorized(&[]);

        let err = store
            .append(&session, &pid("P001"), note("x"))
            .expect_err("append should be refused");
        assert!(matches!(err, ConsultError::PermissionDenied { .. }));
        assert!(!store.path().exists(), "refused append must not create the store");

        session.authorize(&pid("P001"));
        let record = store.append(&session, &pid("P001"), note("x")).unwrap();
        assert_eq!(record.record_id, "NT-000001");
    }

    #[test]
    fn ids_are_strictly_increasing_and_unique() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let session = authorized(&["P001", "P002"]);

        let mut seen = HashSet::new();
        let mut previous = 0;
        for i in 0..5 {
            let patient = if i % 2 == 0 { "P001" } else { "P002" };
            let record = store.append(&session, &pid(patient), note("x")).unwrap();
            let seq = store.sequence_of(&record.record_id).unwrap();
            assert!(seq > previous, "{} not after {previous}", record.record_id);
            assert!(seen.insert(record.record_id));
            previous = seq;
        }
    }

    #[test]
    fn ids_are_not_reused_after_the_file_shrinks() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let session = authorized(&["P001"]);

        store.append(&session, &pid("P001"), note("a")).unwrap();
        store.append(&session, &pid("P001"), note("b")).unwrap();
        fs::write(store.path(), "[]").unwrap();

        let record = store.append(&session, &pid("P001"), note("c")).unwrap();
        assert_eq!(record.record_id, "NT-000003");
    }

    #[test]
    fn new_handle_continues_from_persisted_ids() {
        let dir = TempDir::new().unwrap();
        let session = authorized(&["P001"]);
        store(&dir).append(&session, &pid("P001"), note("a")).unwrap();
        store(&dir).append(&session, &pid("P001"), note("b")).unwrap();

        let record = store(&dir).append(&session, &pid("P001"), note("c")).unwrap();
        assert_eq!(record.record_id, "NT-000003");
    }

    #[test]
    fn query_filters_by_patient_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let session = authorized(&["P001", "P002"]);

        store.append(&session, &pid("P001"), note("first")).unwrap();
        store.append(&session, &pid("P002"), note("other")).unwrap();
        store.append(&session, &pid("P001"), note("second")).unwrap();

        let records = store.query(&pid("P001"));
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.patient_id == pid("P001")));
        assert!(records.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert_eq!(records[0].payload, note("second"));
    }

    #[test]
    fn missing_or_corrupt_store_reads_as_empty() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.query(&pid("P001")).is_empty());

        fs::write(store.path(), "{not json").unwrap();
        assert!(store.query(&pid("P001")).is_empty());
    }

    #[test]
    fn append_refuses_to_overwrite_a_corrupt_store() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let session = authorized(&["P001"]);
        fs::write(store.path(), "{not json").unwrap();

        let err = store
            .append(&session, &pid("P001"), note("x"))
            .expect_err("append should refuse a corrupt store");
        assert!(matches!(err, ConsultError::StoreUnreadable { .. }));
        assert_eq!(fs::read_to_string(store.path()).unwrap(), "{not json");
    }

    #[test]
    fn write_failure_is_fatal_to_the_append_and_issues_no_id() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("data");
        fs::write(&blocker, "not a directory").unwrap();
        let store: RecordStore<Note> = RecordStore::open(blocker.join("notes.json"), "NT");
        let session = authorized(&["P001"]);

        let err = store
            .append(&session, &pid("P001"), note("x"))
            .expect_err("append into a regular file should fail");
        assert!(
            matches!(
                err,
                ConsultError::StorageDirCreation(_) | ConsultError::FileWrite { .. }
            ),
            "unexpected error: {err:?}"
        );

        fs::remove_file(&blocker).unwrap();
        let record = store.append(&session, &pid("P001"), note("x")).unwrap();
        assert_eq!(record.record_id, "NT-000001");
    }

    #[test]
    fn persisted_layout_is_a_flat_json_array() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let session = authorized(&["P001"]);
        store.append(&session, &pid("P001"), note("hello")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        let first = &raw.as_array().unwrap()[0];
        assert_eq!(first["record_id"], "NT-000001");
        assert_eq!(first["patient_id"], "P001");
        assert_eq!(first["text"], "hello");
        assert!(first["timestamp"].as_str().is_some());
        assert!(!dir.path().join("notes.tmp").exists());
    }

    #[test]
    fn concurrent_appends_get_distinct_ids() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(store(&dir));
        let session = Arc::new(authorized(&["P001"]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let session = Arc::clone(&session);
                std::thread::spawn(move || {
                    store
                        .append(&session, &pid("P001"), note("x"))
                        .unwrap()
                        .record_id
                })
            })
            .collect();

        let ids: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(ids.len(), 8);
        assert_eq!(store.load().len(), 8);
    }
}
