//! Bounded polling until a run reaches a terminal status.
//!
//! One sequential workflow per run: fetch status, sleep, repeat, with a
//! wall-clock deadline measured from a single start instant. The interval
//! is fixed on purpose — runs take minutes to hours, so detection staleness
//! is bounded by the interval and backoff would buy nothing. The deadline
//! exists only as a guard against a service that never terminates a run.
//!
//! Network fetchers are injected as async closures, and the whole loop runs
//! on `tokio::time`, so tests drive it under a paused clock instead of
//! sleeping for real.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::envelope::ApiError;
use crate::types::RunStatus;

/// Default delay between status fetches.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default wall-clock ceiling for one run: 24 hours.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Timing parameters for one poll loop.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_POLL_TIMEOUT,
        }
    }
}

/// One observation of a run's status.
///
/// Some endpoints return only a status and require a second fetch for the
/// result; others return the full payload with every status response. A
/// fetcher reports which kind it is by filling `payload` or not.
#[derive(Debug)]
pub struct StatusSnapshot<T> {
    pub status: RunStatus,
    pub payload: Option<T>,
}

#[derive(Debug, Error)]
pub enum PollError {
    #[error("polling timed out after {elapsed_ms}ms for run {run_id}")]
    Timeout { run_id: String, elapsed_ms: u64 },

    #[error("polling cancelled for run {run_id}")]
    Cancelled { run_id: String },

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Poll `fetch_status` on a fixed cadence until the run reaches a terminal
/// status, then return its result payload.
///
/// `fetch_result` is invoked at most once, and only when the terminal
/// snapshot did not already carry the payload. Elapsed time is always
/// measured from the first call, never from the previous iteration, so the
/// deadline cannot drift. The cancellation token is honored at every
/// suspension point: an in-flight fetch and the inter-poll sleep both abort
/// promptly when it trips.
///
/// A terminal status the caller did not hope for (say, CANCELLED) is still
/// a successful poll; deciding whether that outcome is a failure belongs to
/// the caller.
pub async fn await_completion<T, S, SFut, R, RFut>(
    run_id: &str,
    mut fetch_status: S,
    fetch_result: R,
    options: &PollOptions,
    cancel: &CancellationToken,
) -> Result<T, PollError>
where
    S: FnMut() -> SFut,
    SFut: Future<Output = Result<StatusSnapshot<T>, ApiError>>,
    R: FnOnce() -> RFut,
    RFut: Future<Output = Result<T, ApiError>>,
{
    let cancelled = || PollError::Cancelled {
        run_id: run_id.to_string(),
    };

    let started = Instant::now();
    let snapshot = loop {
        if cancel.is_cancelled() {
            return Err(cancelled());
        }

        let elapsed = started.elapsed();
        if elapsed > options.timeout {
            return Err(PollError::Timeout {
                run_id: run_id.to_string(),
                elapsed_ms: elapsed.as_millis() as u64,
            });
        }

        let snapshot = tokio::select! {
            () = cancel.cancelled() => return Err(cancelled()),
            fetched = fetch_status() => fetched?,
        };

        if snapshot.status.is_terminal() {
            break snapshot;
        }

        debug!(run_id, status = %snapshot.status, "run in progress, polling again");
        tokio::select! {
            () = cancel.cancelled() => return Err(cancelled()),
            () = sleep(options.interval) => {}
        }
    };

    debug!(run_id, status = %snapshot.status, "run reached terminal status");

    if let Some(payload) = snapshot.payload {
        return Ok(payload);
    }

    let result = tokio::select! {
        () = cancel.cancelled() => return Err(cancelled()),
        fetched = fetch_result() => fetched?,
    };
    Ok(result)
}
