//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the core as an
//! `Arc<CoreConfig>`. Nothing in the core reads process-wide environment variables while
//! handling a request; binaries read the environment and hand the raw values to the
//! `*_from_env_value` helpers below.

use crate::constants::{
    DEFAULT_RETRIEVAL_TOP_K, EMR_STORE_FILENAME, PHARMACY_STORE_FILENAME,
};
use crate::{ConsultError, ConsultResult};
use std::path::{Path, PathBuf};

/// What the authorization gate does when no working presence detector is available.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PresenceFallback {
    /// Leave the identity unverified.
    #[default]
    FailClosed,
    /// Treat the missing detector as a pass. Demo leniency only.
    FailOpen,
}

/// How the human-review gate treats a decision on an already reviewed consultation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReviewPolicy {
    /// Append the new decision; the latest decision is the effective one.
    #[default]
    Amend,
    /// Reject any decision after the first.
    RejectRepeat,
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    retrieval_top_k: usize,
    presence_fallback: PresenceFallback,
    review_policy: ReviewPolicy,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`ConsultError::InvalidInput`] if `retrieval_top_k` is zero.
    pub fn new(
        data_dir: PathBuf,
        retrieval_top_k: usize,
        presence_fallback: PresenceFallback,
        review_policy: ReviewPolicy,
    ) -> ConsultResult<Self> {
        if retrieval_top_k == 0 {
            return Err(ConsultError::InvalidInput(
                "retrieval_top_k must be at least 1".into(),
            ));
        }

        Ok(Self {
            data_dir,
            retrieval_top_k,
            presence_fallback,
            review_policy,
        })
    }

    /// Configuration with every setting at its default, storing records under `data_dir`.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            retrieval_top_k: DEFAULT_RETRIEVAL_TOP_K,
            presence_fallback: PresenceFallback::default(),
            review_policy: ReviewPolicy::default(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn emr_store_path(&self) -> PathBuf {
        self.data_dir.join(EMR_STORE_FILENAME)
    }

    pub fn pharmacy_store_path(&self) -> PathBuf {
        self.data_dir.join(PHARMACY_STORE_FILENAME)
    }

    pub fn retrieval_top_k(&self) -> usize {
        self.retrieval_top_k
    }

    pub fn presence_fallback(&self) -> PresenceFallback {
        self.presence_fallback
    }

    pub fn review_policy(&self) -> ReviewPolicy {
        self.review_policy
    }
}

fn normalise(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_ascii_lowercase())
        .filter(|v| !v.is_empty())
}

/// Parse the presence fallback from an optional string value.
///
/// Accepts `fail-closed` or `fail-open` (case-insensitive). `None` or blank yields the
/// default, [`PresenceFallback::FailClosed`].
pub fn presence_fallback_from_env_value(value: Option<String>) -> ConsultResult<PresenceFallback> {
    match normalise(value).as_deref() {
        None | Some("fail-closed") => Ok(PresenceFallback::FailClosed),
        Some("fail-open") => Ok(PresenceFallback::FailOpen),
        Some(other) => Err(ConsultError::InvalidInput(format!(
            "unknown presence fallback '{other}' (expected fail-closed or fail-open)"
        ))),
    }
}

/// Parse the review policy from an optional string value (`amend` or `reject-repeat`).
pub fn review_policy_from_env_value(value: Option<String>) -> ConsultResult<ReviewPolicy> {
    match normalise(value).as_deref() {
        None | Some("amend") => Ok(ReviewPolicy::Amend),
        Some("reject-repeat") => Ok(ReviewPolicy::RejectRepeat),
        Some(other) => Err(ConsultError::InvalidInput(format!(
            "unknown review policy '{other}' (expected amend or reject-repeat)"
        ))),
    }
}

/// Parse the retrieval top-k from an optional string value, defaulting to
/// [`DEFAULT_RETRIEVAL_TOP_K`].
pub fn retrieval_top_k_from_env_value(value: Option<String>) -> ConsultResult<usize> {
    match normalise(value) {
        None => Ok(DEFAULT_RETRIEVAL_TOP_K),
        Some(v) => v.parse::<usize>().map_err(|_| {
            ConsultError::InvalidInput(format!("retrieval top-k must be a positive integer, got '{v}'"))
        }),
    }
}
