//! Conversational context: what the session currently points at.
//!
//! Each turn's tokens are classified by the [`Vocabulary`]; the recognized
//! fields are merged into the [`SessionContext`]. A newly recognized zone or
//! namespace that differs from the stored one is a *scope change* and wipes
//! every field before the merge, so stale resource/name values never leak
//! into a new scope.

pub mod store;
pub mod vocabulary;

pub use store::{Recognized, SessionContext, recognize};
pub use vocabulary::{TokenClass, Vocabulary};
