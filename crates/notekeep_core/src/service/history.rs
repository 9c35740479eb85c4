//! History recorder.
//!
//! # Responsibility
//! - Turn a note's pre-mutation state into the `HistoryEntry` that records it.
//!
//! # Invariants
//! - Input is always the state *before* the mutation's new values exist.
//! - Pure: no store access, no side effects.

use crate::model::identity::UserIdentity;
use crate::model::note::{HistoryEntry, Note};

/// Captures `prior` as the entry superseded by `modifier`'s mutation.
pub fn capture_prior_state(prior: &Note, modifier: &UserIdentity) -> HistoryEntry {
    HistoryEntry {
        content: prior.content.clone(),
        timestamp: prior.timestamp,
        modifier_email: modifier.email.clone(),
    }
}

/// Returns `prior`'s history with the snapshot of `prior` appended.
pub fn history_after_mutation(prior: &Note, modifier: &UserIdentity) -> Vec<HistoryEntry> {
    let mut history = Vec::with_capacity(prior.history.len() + 1);
    history.extend_from_slice(&prior.history);
    history.push(capture_prior_state(prior, modifier));
    history
}
