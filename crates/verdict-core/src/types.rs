//! Data model for hosted test runs.
//!
//! Wire shapes follow the service API: camelCase field names and
//! SCREAMING_SNAKE_CASE status labels. Status enums keep unrecognized
//! labels instead of failing deserialization, so a service rolling out a
//! new sub-state cannot break a client mid-poll.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a run.
///
/// `Unknown` preserves the raw label of any value outside the known set.
/// Unknown statuses are treated as in-progress: the poller keeps waiting
/// rather than guessing that an unfamiliar label means the run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RunStatus {
    Queued,
    Running,
    Passed,
    Failed,
    TimedOut,
    Cancelled,
    Interrupted,
    Error,
    Unknown(String),
}

impl RunStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::TimedOut => "TIMEDOUT",
            Self::Cancelled => "CANCELLED",
            Self::Interrupted => "INTERRUPTED",
            Self::Error => "ERROR",
            Self::Unknown(label) => label,
        }
    }

    /// The run has not finished yet. Only the designated in-progress
    /// labels and unrecognized labels count; everything else ends polling.
    pub fn is_in_progress(&self) -> bool {
        matches!(self, Self::Queued | Self::Running | Self::Unknown(_))
    }

    /// The run has reached a final state and a result can be fetched.
    pub fn is_terminal(&self) -> bool {
        !self.is_in_progress()
    }
}

impl From<String> for RunStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "PASSED" => Self::Passed,
            "FAILED" => Self::Failed,
            "TIMEDOUT" => Self::TimedOut,
            "CANCELLED" => Self::Cancelled,
            "INTERRUPTED" => Self::Interrupted,
            "ERROR" => Self::Error,
            _ => Self::Unknown(label),
        }
    }
}

impl From<RunStatus> for String {
    fn from(status: RunStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status of a single test case within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TestCaseStatus {
    Passed,
    Failed,
    Running,
    Error,
    Flaky,
    Cancelled,
    Skipped,
    TimedOut,
    Interrupted,
    Unknown(String),
}

impl TestCaseStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Passed => "PASSED",
            Self::Failed => "FAILED",
            Self::Running => "RUNNING",
            Self::Error => "ERROR",
            Self::Flaky => "FLAKY",
            Self::Cancelled => "CANCELLED",
            Self::Skipped => "SKIPPED",
            Self::TimedOut => "TIMEDOUT",
            Self::Interrupted => "INTERRUPTED",
            Self::Unknown(label) => label,
        }
    }
}

impl From<String> for TestCaseStatus {
    fn from(label: String) -> Self {
        match label.as_str() {
            "PASSED" => Self::Passed,
            "FAILED" => Self::Failed,
            "RUNNING" => Self::Running,
            "ERROR" => Self::Error,
            "FLAKY" => Self::Flaky,
            "CANCELLED" => Self::Cancelled,
            "SKIPPED" => Self::Skipped,
            "TIMEDOUT" => Self::TimedOut,
            "INTERRUPTED" => Self::Interrupted,
            _ => Self::Unknown(label),
        }
    }
}

impl From<TestCaseStatus> for String {
    fn from(status: TestCaseStatus) -> Self {
        status.as_str().to_string()
    }
}

impl std::fmt::Display for TestCaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// --- Run handles (submit responses) ---

/// Handle returned when a suite run is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteRunHandle {
    pub project_id: String,
    pub test_suite_run_id: String,
    pub test_suite_name: String,
}

/// Handle returned when a project run is submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRunHandle {
    pub run_id: String,
}

// --- Result payloads ---

/// Status-only response from the suite run status endpoint.
///
/// The suite API never returns the result inline; a terminal status here
/// means a second fetch against the result endpoint is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteRunStatus {
    pub status: RunStatus,
}

/// Final outcome of a suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteRunResult {
    pub project_id: String,
    pub test_suite_run_id: String,
    pub test_suite_name: String,
    pub results: Vec<SuiteTestResult>,
}

/// One test's outcome within a suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteTestResult {
    pub run_id: String,
    pub test_id: String,
    pub test_name: String,
    /// Absent when the service could not attribute a status to the test.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TestCaseStatus>,
}

/// Snapshot of a project run. The project API returns this full payload
/// from its status endpoint, so a terminal response is already the result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRunResult {
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ProjectRunCases>,
}

/// Per-case results of a project run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRunCases {
    pub test_cases: Vec<TestCaseRecord>,
}

/// One test case's outcome within a project run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseRecord {
    pub title: String,
    pub status: TestCaseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}
