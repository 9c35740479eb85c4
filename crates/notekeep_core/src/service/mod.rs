//! Core use-case services.
//!
//! # Responsibility
//! - Turn caller intents into validated store mutations.
//! - Keep clients decoupled from store details and error shapes.

pub mod category_service;
pub mod history;
pub mod note_service;
