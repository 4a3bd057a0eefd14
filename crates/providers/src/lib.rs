//! Extractor backends that call out to a language model.
//!
//! The offline keyword extractor lives in `opsclaw-agent`; this crate holds
//! the network-backed ones.

pub mod llm;

pub use llm::LlmExtractor;
