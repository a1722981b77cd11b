//! Result summarizing and comment rendering.
//!
//! Pure functions over the result payloads: the caller decides what to do
//! with a summary (exit code, terminal output, VCS comment), nothing here
//! performs I/O.

use serde::Serialize;

use crate::types::{ProjectRunResult, RunStatus, SuiteRunResult, TestCaseStatus};

/// Aggregate outcome of a run, in either mode.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Run-level status. Suite results carry no run-level status; the
    /// per-test counts are the whole story there.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_status: Option<RunStatus>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub succeeded: bool,
}

/// Summarize a suite run: success means zero FAILED tests. FLAKY counts as
/// a pass; ERROR tests count as neither.
pub fn summarize_suite(result: &SuiteRunResult) -> RunSummary {
    let failed = count_suite_status(result, &TestCaseStatus::Failed);
    let passed = count_suite_status(result, &TestCaseStatus::Passed)
        + count_suite_status(result, &TestCaseStatus::Flaky);

    RunSummary {
        run_status: None,
        total: result.results.len(),
        passed,
        failed,
        succeeded: failed == 0,
    }
}

/// Summarize a project run: success means zero FAILED cases AND the run
/// itself ended PASSED. A run can fail with no failed cases (for example
/// TIMEDOUT before any case ran), so both checks are required.
pub fn summarize_project(result: &ProjectRunResult) -> RunSummary {
    let cases = result
        .results
        .as_ref()
        .map(|r| r.test_cases.as_slice())
        .unwrap_or_default();
    let failed = cases
        .iter()
        .filter(|c| c.status == TestCaseStatus::Failed)
        .count();
    let passed = cases
        .iter()
        .filter(|c| c.status == TestCaseStatus::Passed)
        .count();

    RunSummary {
        run_status: Some(result.status.clone()),
        total: cases.len(),
        passed,
        failed,
        succeeded: failed == 0 && result.status == RunStatus::Passed,
    }
}

fn count_suite_status(result: &SuiteRunResult, status: &TestCaseStatus) -> usize {
    result
        .results
        .iter()
        .filter(|t| t.status.as_ref() == Some(status))
        .count()
}

// --- Dashboard links ---

pub fn suite_run_dashboard_url(base: &str, project_id: &str, suite_run_id: &str) -> String {
    format!(
        "{}/projects/{}/suite-runs/{}",
        base.trim_end_matches('/'),
        project_id,
        suite_run_id
    )
}

pub fn project_run_dashboard_url(base: &str, project_id: &str, run_id: &str) -> String {
    format!(
        "{}/projects/{}/runs/{}",
        base.trim_end_matches('/'),
        project_id,
        run_id
    )
}

// --- VCS comment rendering ---

/// Hidden marker identifying the comment for upsert. One comment per
/// suite/project id, updated in place across runs.
pub fn comment_marker(id: &str) -> String {
    format!("<!-- verdict_{id} -->")
}

/// Render the comment body for a suite run.
pub fn suite_comment_body(
    suite_id: &str,
    result: &SuiteRunResult,
    dashboard_base: &str,
) -> String {
    let summary = summarize_suite(result);
    let dashboard = suite_run_dashboard_url(dashboard_base, &result.project_id, &result.test_suite_run_id);

    let headline = if summary.succeeded {
        format!(
            "🟢 Success ({}/{} tests passed) [[dashboard]]({})",
            summary.passed, summary.total, dashboard
        )
    } else {
        format!(
            "🔴 Failure ({}/{} tests failed) [[dashboard]]({})",
            summary.failed, summary.total, dashboard
        )
    };

    let mut body = format!(
        "{marker}\n# Verdict — Test Suite '{name}'\n\nRun result: {headline}\n",
        marker = comment_marker(suite_id),
        name = result.test_suite_name,
    );

    let failed: Vec<_> = result
        .results
        .iter()
        .filter(|t| t.status == Some(TestCaseStatus::Failed))
        .collect();
    if !failed.is_empty() {
        body.push_str("\nFailed tests:\n");
        for test in failed {
            body.push_str(&format!("- {}\n", test.test_name));
        }
    }

    let errored: Vec<_> = result
        .results
        .iter()
        .filter(|t| t.status == Some(TestCaseStatus::Error))
        .collect();
    if !errored.is_empty() {
        body.push_str("\nUnable to run:\n");
        for test in errored {
            body.push_str(&format!("- {}\n", test.test_name));
        }
    }

    body.push_str("\n---\n_Posted by verdictctl_\n");
    body
}

/// Render the comment body for a project run.
pub fn project_comment_body(
    project_id: &str,
    run_id: &str,
    result: &ProjectRunResult,
    dashboard_base: &str,
) -> String {
    let summary = summarize_project(result);
    let dashboard = project_run_dashboard_url(dashboard_base, project_id, run_id);

    let headline = if summary.succeeded {
        format!(
            "🟢 Success ({}/{} tests passed) [[dashboard]]({})",
            summary.passed, summary.total, dashboard
        )
    } else {
        format!(
            "🔴 Failure ({}/{} tests failed, status: {}) [[dashboard]]({})",
            summary.failed,
            summary.total,
            result.status,
            dashboard
        )
    };

    // Keyed on the project id so later runs of the same project update the
    // one comment instead of stacking new ones.
    let mut body = format!(
        "{marker}\n# Verdict — Project Run\n\nRun result: {headline}\n",
        marker = comment_marker(project_id),
    );

    if let Some(cases) = &result.results {
        let failed: Vec<_> = cases
            .test_cases
            .iter()
            .filter(|c| c.status == TestCaseStatus::Failed)
            .collect();
        if !failed.is_empty() {
            body.push_str("\nFailed tests:\n");
            for case in failed {
                match case.duration_ms {
                    Some(ms) => body.push_str(&format!("- {} ({}ms)\n", case.title, ms)),
                    None => body.push_str(&format!("- {}\n", case.title)),
                }
            }
        }
    }

    body.push_str("\n---\n_Posted by verdictctl_\n");
    body
}
