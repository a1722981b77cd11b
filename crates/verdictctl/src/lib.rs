//! verdictctl - CLI client for the Verdict test-execution service.
//!
//! Library components for the CLI binary.

pub mod client;
pub mod github;
pub mod render;
