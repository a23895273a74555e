//! Constants used throughout the consultation core.
//!
//! Store file names, identifier prefixes and runtime defaults live here so the stores,
//! the configuration layer and the binaries agree on them.

/// Default directory for persisted record stores when none is configured.
pub const DEFAULT_DATA_DIR: &str = "consult_data";

/// Filename of the EMR record store.
pub const EMR_STORE_FILENAME: &str = "emr_store.json";

/// Filename of the pharmacy order store.
pub const PHARMACY_STORE_FILENAME: &str = "pharmacy_store.json";

/// Identifier prefix for EMR records (`EMR-000001`).
pub const EMR_ID_PREFIX: &str = "EMR";

/// Identifier prefix for pharmacy orders (`RX-000001`).
pub const PHARMACY_ID_PREFIX: &str = "RX";

/// Width of the zero-padded sequence part of a record identifier.
pub const RECORD_SEQUENCE_WIDTH: usize = 6;

/// Number of guideline snippets requested by the planning stage.
pub const DEFAULT_RETRIEVAL_TOP_K: usize = 3;

/// Text substituted into the planning query when no symptoms were extracted.
pub const UNSPECIFIED_SYMPTOMS: &str = "unspecified symptoms";

/// Text substituted into the planning query when there is no note at all.
pub const NO_SYMPTOMS_TEXT: &str = "no symptoms text";

/// Placeholder transcript when no speech-to-text engine is configured.
pub const STT_UNAVAILABLE: &str = "STT is not available (speech-to-text engine not loaded).";

/// Placeholder transcript when the engine produced no text.
pub const STT_EMPTY: &str = "Transcription empty (no speech or decoding issue).";

/// Placeholder transcript when the engine failed.
pub const STT_FAILED: &str = "Transcription failed due to an internal error.";
