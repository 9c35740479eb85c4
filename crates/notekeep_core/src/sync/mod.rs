//! Live views driven by store change notifications.
//!
//! # Responsibility
//! - Keep client-side projections of store collections current.
//! - Recover from notification failures by resubscribing.
//!
//! # Invariants
//! - Each view owns its subscription; none is shared across views.
//! - Projections are replaced wholesale per delivered batch.

pub mod category_view;
pub mod live_query;
pub mod note_view;
