//! Pharmacy store: prescription orders sent on behalf of a consultation.

use super::store::{Record, RecordStore};
use crate::config::CoreConfig;
use crate::constants::PHARMACY_ID_PREFIX;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Sent,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PharmacyEntry {
    pub prescription: String,
    /// EMR record this order was issued against, if the consultation was committed first.
    pub emr_record_id: Option<String>,
    pub status: OrderStatus,
}

pub type PharmacyOrder = Record<PharmacyEntry>;
pub type PharmacyStore = RecordStore<PharmacyEntry>;

impl RecordStore<PharmacyEntry> {
    pub fn pharmacy(cfg: &CoreConfig) -> Self {
        Self::open(cfg.pharmacy_store_path(), PHARMACY_ID_PREFIX)
    }
}
