//! # OpsClaw Core
//!
//! Domain types, traits, and error definitions for the OpsClaw operations
//! assistant. This crate has **zero framework dependencies**; it defines the
//! model that the resolver, dispatcher and CLI crates share.
//!
//! ## Layout
//!
//! - [`query`]: extractor candidates and the resolved queries built from them
//! - [`outcome`]: the terminal state of one dispatched worker task
//! - [`extractor`]: the natural-language extraction seam
//! - [`error`]: one error enum per bounded context

pub mod error;
pub mod extractor;
pub mod outcome;
pub mod query;

// Re-export key types at crate root for ergonomics
pub use error::{ExtractionError, FusionError, TaskError};
pub use extractor::{ExtractionRequest, Extractor};
pub use outcome::{Outcome, TaskReport};
pub use query::{Candidate, Intent, ResolvedQuery};
