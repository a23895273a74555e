//! Human-review gate.
//!
//! Two states: `PENDING_REVIEW` until the first decision is recorded, `REVIEWED` after.
//! A decision is recorded on the state only; writing the outcome to a record store is a
//! separate, explicitly authorized action.

use crate::config::ReviewPolicy;
use crate::error::{ConsultError, ConsultResult};
use crate::state::{ConsultationState, ExecutedAction, ReviewStatus};
use chrono::Utc;

/// Records a clinician's decision on `state`.
///
/// Under [`ReviewPolicy::Amend`] every call appends a new decision and the latest one is
/// effective. Under [`ReviewPolicy::RejectRepeat`] a second decision is refused.
///
/// # Errors
///
/// Returns [`ConsultError::AlreadyReviewed`] if the policy is `RejectRepeat` and the
/// state has already been reviewed.
pub fn apply_decision(
    mut state: ConsultationState,
    approved: bool,
    comments: &str,
    policy: ReviewPolicy,
) -> ConsultResult<ConsultationState> {
    let previous = state.review_status();
    if previous == ReviewStatus::Reviewed && policy == ReviewPolicy::RejectRepeat {
        return Err(ConsultError::AlreadyReviewed);
    }

    let comments = comments.trim();
    state.push_action(ExecutedAction::HumanReview {
        approved,
        comments: comments.to_string(),
        reviewed_at: Utc::now(),
    });

    let verdict = if approved { "approved" } else { "rejected" };
    let amended = if previous == ReviewStatus::Reviewed {
        " (amends earlier decision)"
    } else {
        ""
    };
    let comments = if comments.is_empty() { "none" } else { comments };
    state.push_audit(format!(
        "Human review: {verdict} by clinician{amended}; comments: {comments}"
    ));
    Ok(state)
}
