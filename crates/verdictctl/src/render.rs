//! Output rendering for the verdictctl CLI.
//!
//! Formats run submissions and results for terminal display.

use verdict_core::types::{ProjectRunResult, SuiteRunHandle, SuiteRunResult, TestCaseStatus};
use verdict_core::RunSummary;

/// Print confirmation after submitting a suite run.
pub fn print_suite_submitted(handle: &SuiteRunHandle) {
    println!("Started suite run: {}", handle.test_suite_run_id);
    println!("  Suite:   {}", handle.test_suite_name);
    println!("  Project: {}", handle.project_id);
}

/// Print confirmation after submitting a project run.
pub fn print_project_submitted(run_id: &str) {
    println!("Started project run: {}", run_id);
}

/// Print a finished suite run with its per-test outcomes.
pub fn print_suite_result(result: &SuiteRunResult, summary: &RunSummary, dashboard: &str) {
    println!("Suite run: {}", result.test_suite_run_id);
    println!();
    println!("  Suite:   {}", result.test_suite_name);
    println!("  Outcome: {}", outcome_label(summary));
    println!("  Passed:  {}/{}", summary.passed, summary.total);

    if !result.results.is_empty() {
        println!();
        println!("  {:<40}  {:<12}", "TEST", "STATUS");
        println!("  {}", "-".repeat(54));
        for test in &result.results {
            println!(
                "  {:<40}  {:<12}",
                truncate(&test.test_name, 40),
                format_case_status(test.status.as_ref()),
            );
        }
    }

    println!();
    println!("  Dashboard: {}", dashboard);
}

/// Print a finished project run with its per-case outcomes.
pub fn print_project_result(run_id: &str, result: &ProjectRunResult, summary: &RunSummary, dashboard: &str) {
    println!("Project run: {}", run_id);
    println!();
    println!("  Status:   {}", result.status);
    println!("  Outcome:  {}", outcome_label(summary));
    println!("  Passed:   {}/{}", summary.passed, summary.total);
    println!("  Started:  {}", format_time(&result.started_at));
    if let Some(ref finished) = result.finished_at {
        println!("  Finished: {}", format_time(finished));
    }

    if let Some(ref cases) = result.results {
        if !cases.test_cases.is_empty() {
            println!();
            println!("  {:<40}  {:<12}  {:<10}", "TEST", "STATUS", "DURATION");
            println!("  {}", "-".repeat(66));
            for case in &cases.test_cases {
                let duration = case
                    .duration_ms
                    .map(format_duration)
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "  {:<40}  {:<12}  {:<10}",
                    truncate(&case.title, 40),
                    format_case_status(Some(&case.status)),
                    duration,
                );
            }
        }
    }

    println!();
    println!("  Dashboard: {}", dashboard);
}

/// Print a value as pretty JSON on stdout.
pub fn print_json<T: serde::Serialize>(value: &T) {
    if let Ok(rendered) = serde_json::to_string_pretty(value) {
        println!("{rendered}");
    }
}

fn outcome_label(summary: &RunSummary) -> &'static str {
    if summary.succeeded {
        "PASSED"
    } else {
        "FAILED"
    }
}

fn format_case_status(status: Option<&TestCaseStatus>) -> String {
    match status {
        Some(s) => s.as_str().to_string(),
        None => "-".to_string(),
    }
}

fn format_duration(ms: u64) -> String {
    if ms >= 1000 {
        format!("{:.1}s", ms as f64 / 1000.0)
    } else {
        format!("{}ms", ms)
    }
}

fn format_time(dt: &chrono::DateTime<chrono::Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        // Count chars, not bytes: slicing bytes can split a multi-byte
        // character and panic.
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_leaves_short_strings_alone() {
        assert_eq!(truncate("add to cart", 40), "add to cart");
    }

    #[test]
    fn truncate_shortens_long_strings_with_ellipsis() {
        let long = "a".repeat(50);
        let out = truncate(&long, 40);
        assert_eq!(out.chars().count(), 40);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn truncate_handles_multibyte_titles() {
        // 45 chars, 3 bytes each; byte slicing would land mid-character.
        let title = "注".repeat(45);
        let out = truncate(&title, 40);
        assert_eq!(out.chars().count(), 40);
        assert!(out.ends_with("..."));
        assert!(out.starts_with('注'));
    }

    #[test]
    fn project_result_renders_with_per_case_rows() {
        let result: ProjectRunResult = serde_json::from_value(serde_json::json!({
            "status": "PASSED",
            "startedAt": "2026-08-28T10:00:00Z",
            "finishedAt": "2026-08-28T10:05:00Z",
            "results": {
                "testCases": [
                    { "title": "login works", "status": "PASSED", "durationMs": 1500 },
                    { "title": "checkout", "status": "FAILED" },
                ],
            },
        }))
        .unwrap();
        let summary = verdict_core::report::summarize_project(&result);
        print_project_result("run-1", &result, &summary, "https://app.example.com/runs/run-1");
    }

    #[test]
    fn case_status_renders_dash_when_absent() {
        assert_eq!(format_case_status(None), "-");
        assert_eq!(
            format_case_status(Some(&TestCaseStatus::Failed)),
            "FAILED"
        );
    }
}
