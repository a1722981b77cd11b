//! Core library for driving a hosted test-execution service to completion.
//!
//! Everything here is pure or transport-agnostic: network calls are
//! injected as async closures, and the only suspension points are the
//! injected fetch and the poll sleep. The CLI crate supplies the HTTP
//! transport.

pub mod envelope;
pub mod poll;
pub mod report;
pub mod sse;
pub mod types;

pub use envelope::{unwrap_envelope, ApiError, Envelope};
pub use poll::{await_completion, PollError, PollOptions, StatusSnapshot};
pub use report::RunSummary;
pub use sse::{FrameDecoder, StreamError};
pub use types::*;
