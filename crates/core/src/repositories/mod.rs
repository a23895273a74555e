//! Append-only record stores.
//!
//! Each store is one JSON array on disk, written by exactly one [`store::RecordStore`]
//! handle. Writes require the patient to be authorized in the current [`crate::Session`].

pub mod emr;
pub mod pharmacy;
pub mod store;

pub use emr::{EmrEntry, EmrRecord, EmrStore};
pub use pharmacy::{OrderStatus, PharmacyEntry, PharmacyOrder, PharmacyStore};
pub use store::{Record, RecordStore};
