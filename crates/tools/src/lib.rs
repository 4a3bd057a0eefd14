//! Remote resource querying for OpsClaw.
//!
//! Each resolved query is answered by a fresh worker process speaking
//! line-delimited JSON over stdio. This crate owns the wire format, the
//! per-task state machine, the registry of live workers and the batch
//! dispatcher.

pub mod catalog;
pub mod dispatcher;
pub mod protocol;
pub mod registry;
pub mod worker;

pub use catalog::ToolCatalog;
pub use dispatcher::Dispatcher;
pub use protocol::{Frame, LineFramer, Skip, ToolCallRequest, decode_line};
pub use registry::{LiveWorker, Registration, ShutdownReport, WorkerRegistry};
pub use worker::{WorkerSpec, WorkerTask};
