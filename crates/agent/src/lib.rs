//! Conversational query resolution for OpsClaw.
//!
//! Each turn flows through the same stages:
//!
//! 1. **Normalize** the raw line (strip inline flags, tokenize)
//! 2. **Remember** zone, namespace, resource and name across turns
//! 3. **Extract** query candidates (keyword rules or an LLM)
//! 4. **Fuse** candidates with the remembered context
//! 5. **Dispatch** one worker per resolved query, then **aggregate**
//!
//! [`Session`] drives a turn end to end.

pub mod aggregate;
pub mod context;
pub mod fusion;
pub mod keyword;
pub mod normalizer;
pub mod session;

pub use aggregate::{Aggregator, BatchSummary};
pub use context::{Recognized, SessionContext, TokenClass, Vocabulary};
pub use fusion::{FusionOptions, fuse};
pub use keyword::KeywordExtractor;
pub use normalizer::{Command, NormalizedInput, normalize};
pub use session::{Session, TurnOutcome};
