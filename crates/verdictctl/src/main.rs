//! verdictctl - CLI client for the Verdict test-execution service.
//!
//! Submits suite and project runs, waits for their results over polling or
//! the streamed watch endpoint, and optionally posts a summary comment on
//! the pull request that triggered the run.

use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::collections::BTreeMap;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{fmt, EnvFilter};
use verdict_core::poll::PollOptions;
use verdict_core::report;
use verdictctl::client::{
    Client, ClientError, GitMetadata, ProjectRunRequest, RunMetadata, SuiteRunRequest,
    UrlReplacement,
};
use verdictctl::{github, render};

/// CLI client for the Verdict hosted test-execution service.
#[derive(Parser)]
#[command(name = "verdictctl")]
#[command(about = "Run Verdict test suites and wait for their results")]
#[command(version)]
struct Cli {
    /// Service API endpoint
    #[arg(
        long,
        global = true,
        env = "VERDICT_API_ENDPOINT",
        default_value = "https://api.verdict.dev"
    )]
    endpoint: String,

    /// API key for the service
    #[arg(long, global = true, env = "VERDICT_API_KEY")]
    api_key: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a test suite and wait for the result
    Suite {
        /// Test suite ID
        suite_id: String,

        /// Rewrite a base URL in the suite, as ORIGINAL=REPLACEMENT
        #[arg(long, value_parser = parse_url_replacement)]
        url_replacement: Option<UrlReplacement>,

        /// Named environment to run against
        #[arg(long)]
        environment: Option<String>,

        /// Override a suite variable, as KEY=VALUE (repeatable)
        #[arg(long = "var", value_parser = parse_key_value)]
        vars: Vec<(String, String)>,

        /// Free-form note attached to the run
        #[arg(long)]
        note: Option<String>,

        /// Git branch recorded with the run
        #[arg(long)]
        branch: Option<String>,

        #[command(flatten)]
        wait: WaitArgs,

        #[command(flatten)]
        comment: CommentArgs,
    },

    /// Run a project and wait for the result
    Project {
        /// Project ID
        project_id: String,

        /// Restrict the run to a named group (repeatable)
        #[arg(long = "group")]
        groups: Vec<String>,

        /// Override an environment variable, as KEY=VALUE (repeatable)
        #[arg(long = "env-override", value_parser = parse_key_value)]
        env_overrides: Vec<(String, String)>,

        /// Follow the streamed watch endpoint instead of polling
        #[arg(long)]
        stream: bool,

        #[command(flatten)]
        wait: WaitArgs,

        #[command(flatten)]
        comment: CommentArgs,
    },
}

#[derive(Args)]
struct WaitArgs {
    /// Submit the run and exit without waiting
    #[arg(long)]
    detach: bool,

    /// Seconds between status polls
    #[arg(long, default_value = "5")]
    poll_interval_secs: u64,

    /// Seconds to wait before giving up on the run
    #[arg(long, default_value = "86400")]
    poll_timeout_secs: u64,

    /// Print the result as JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl WaitArgs {
    fn poll_options(&self) -> PollOptions {
        PollOptions {
            interval: Duration::from_secs(self.poll_interval_secs),
            timeout: Duration::from_secs(self.poll_timeout_secs),
        }
    }
}

#[derive(Args)]
struct CommentArgs {
    /// Post or update a summary comment on the pull request
    #[arg(long)]
    comment: bool,

    /// GitHub token used for the comment
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,

    /// Repository as owner/repo
    #[arg(long, env = "GITHUB_REPOSITORY")]
    repo: Option<String>,

    /// Pull request number
    #[arg(long)]
    pr: Option<u64>,

    /// Dashboard base URL used in links
    #[arg(
        long,
        env = "VERDICT_DASHBOARD_URL",
        default_value = "https://app.verdict.dev"
    )]
    dashboard: String,
}

impl CommentArgs {
    fn target(&self) -> Option<github::CommentTarget> {
        if !self.comment {
            return None;
        }
        match (&self.github_token, &self.repo, self.pr) {
            (Some(token), Some(repo), Some(pr_number)) => Some(github::CommentTarget {
                repo: repo.clone(),
                pr_number,
                token: token.clone(),
            }),
            _ => {
                warn!("--comment requires --github-token, --repo and --pr; skipping comment");
                None
            }
        }
    }
}

fn parse_url_replacement(s: &str) -> Result<UrlReplacement, String> {
    let (original, replacement) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid url replacement '{}', expected ORIGINAL=REPLACEMENT", s))?;
    if original.is_empty() || replacement.is_empty() {
        return Err(format!(
            "invalid url replacement '{}', expected ORIGINAL=REPLACEMENT",
            s
        ));
    }
    Ok(UrlReplacement {
        original: original.to_string(),
        replacement: replacement.to_string(),
    })
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid variable '{}', expected KEY=VALUE", s))?;
    if key.is_empty() {
        return Err(format!("invalid variable '{}', expected KEY=VALUE", s));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let Some(api_key) = cli.api_key else {
        eprintln!("error: no API key (set VERDICT_API_KEY or pass --api-key)");
        std::process::exit(1);
    };
    let client = Client::new(&cli.endpoint, &api_key);

    // Ctrl-C cancels in-flight polls and streams instead of killing the
    // process mid-request.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let result = match cli.command {
        Command::Suite {
            suite_id,
            url_replacement,
            environment,
            vars,
            note,
            branch,
            wait,
            comment,
        } => {
            run_suite(
                &client,
                &suite_id,
                url_replacement,
                environment,
                vars,
                note,
                branch,
                &wait,
                &comment,
                &cancel,
            )
            .await
        }
        Command::Project {
            project_id,
            groups,
            env_overrides,
            stream,
            wait,
            comment,
        } => {
            run_project(
                &client,
                &project_id,
                groups,
                env_overrides,
                stream,
                &wait,
                &comment,
                &cancel,
            )
            .await
        }
    };

    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_suite(
    client: &Client,
    suite_id: &str,
    url_replacement: Option<UrlReplacement>,
    environment: Option<String>,
    vars: Vec<(String, String)>,
    note: Option<String>,
    branch: Option<String>,
    wait: &WaitArgs,
    comment: &CommentArgs,
    cancel: &CancellationToken,
) -> Result<bool, ClientError> {
    let metadata = if note.is_some() || branch.is_some() {
        Some(RunMetadata {
            git: branch.map(|branch| GitMetadata { branch }),
            note,
        })
    } else {
        None
    };
    let request = SuiteRunRequest {
        url_replacements: url_replacement.map(|r| vec![r]),
        environment,
        variable_overrides: if vars.is_empty() {
            None
        } else {
            Some(vars.into_iter().collect::<BTreeMap<_, _>>())
        },
        metadata,
    };

    let handle = client.start_suite_run(suite_id, &request).await?;
    render::print_suite_submitted(&handle);
    if wait.detach {
        return Ok(true);
    }

    let result = client
        .wait_for_suite_result(&handle.test_suite_run_id, &wait.poll_options(), cancel)
        .await?;
    let summary = report::summarize_suite(&result);

    if wait.json {
        render::print_json(&result);
    } else {
        let dashboard = report::suite_run_dashboard_url(
            &comment.dashboard,
            &result.project_id,
            &result.test_suite_run_id,
        );
        render::print_suite_result(&result, &summary, &dashboard);
    }

    if let Some(target) = comment.target() {
        let body = report::suite_comment_body(suite_id, &result, &comment.dashboard);
        post_comment(&target, &report::comment_marker(suite_id), &body).await;
    }

    Ok(summary.succeeded)
}

#[allow(clippy::too_many_arguments)]
async fn run_project(
    client: &Client,
    project_id: &str,
    groups: Vec<String>,
    env_overrides: Vec<(String, String)>,
    stream: bool,
    wait: &WaitArgs,
    comment: &CommentArgs,
    cancel: &CancellationToken,
) -> Result<bool, ClientError> {
    let request = ProjectRunRequest {
        run_group_names: if groups.is_empty() { None } else { Some(groups) },
        env_overrides: if env_overrides.is_empty() {
            None
        } else {
            Some(env_overrides.into_iter().collect::<BTreeMap<_, _>>())
        },
    };

    let handle = client.start_project_run(project_id, &request).await?;
    render::print_project_submitted(&handle.run_id);
    if wait.detach {
        return Ok(true);
    }

    let result = if stream {
        client
            .watch_project_run(project_id, &handle.run_id, cancel)
            .await?
    } else {
        client
            .wait_for_project_result(project_id, &handle.run_id, &wait.poll_options(), cancel)
            .await?
    };
    let summary = report::summarize_project(&result);

    if wait.json {
        render::print_json(&result);
    } else {
        let dashboard =
            report::project_run_dashboard_url(&comment.dashboard, project_id, &handle.run_id);
        render::print_project_result(&handle.run_id, &result, &summary, &dashboard);
    }

    if let Some(target) = comment.target() {
        let body =
            report::project_comment_body(project_id, &handle.run_id, &result, &comment.dashboard);
        post_comment(&target, &report::comment_marker(project_id), &body).await;
    }

    Ok(summary.succeeded)
}

/// Comment failures never fail the run; the result already printed.
async fn post_comment(target: &github::CommentTarget, marker: &str, body: &str) {
    if let Err(e) = github::upsert_pr_comment(target, marker, body).await {
        warn!("failed to post PR comment: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_replacement_splits_on_first_equals() {
        let parsed = parse_url_replacement("https://prod.example.com=https://staging.example.com")
            .unwrap();
        assert_eq!(parsed.original, "https://prod.example.com");
        assert_eq!(parsed.replacement, "https://staging.example.com");
    }

    #[test]
    fn url_replacement_rejects_missing_separator() {
        assert!(parse_url_replacement("https://prod.example.com").is_err());
    }

    #[test]
    fn key_value_allows_empty_value() {
        let parsed = parse_key_value("BASE_URL=").unwrap();
        assert_eq!(parsed, ("BASE_URL".to_string(), String::new()));
    }

    #[test]
    fn key_value_rejects_empty_key() {
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn cli_parses_suite_command() {
        let cli = Cli::parse_from([
            "verdictctl",
            "--api-key",
            "k",
            "suite",
            "suite-1",
            "--environment",
            "staging",
            "--var",
            "USER=alice",
            "--detach",
        ]);
        match cli.command {
            Command::Suite {
                suite_id,
                environment,
                vars,
                wait,
                ..
            } => {
                assert_eq!(suite_id, "suite-1");
                assert_eq!(environment.as_deref(), Some("staging"));
                assert_eq!(vars, vec![("USER".to_string(), "alice".to_string())]);
                assert!(wait.detach);
            }
            Command::Project { .. } => panic!("expected suite command"),
        }
    }

    #[test]
    fn cli_parses_project_stream_command() {
        let cli = Cli::parse_from([
            "verdictctl",
            "--api-key",
            "k",
            "project",
            "proj-1",
            "--group",
            "smoke",
            "--stream",
            "--json",
        ]);
        match cli.command {
            Command::Project {
                project_id,
                groups,
                stream,
                wait,
                ..
            } => {
                assert_eq!(project_id, "proj-1");
                assert_eq!(groups, vec!["smoke".to_string()]);
                assert!(stream);
                assert!(wait.json);
            }
            Command::Suite { .. } => panic!("expected project command"),
        }
    }

    #[test]
    fn default_poll_options_match_service_cadence() {
        let cli = Cli::parse_from(["verdictctl", "--api-key", "k", "suite", "suite-1"]);
        let Command::Suite { wait, .. } = cli.command else {
            panic!("expected suite command");
        };
        let options = wait.poll_options();
        assert_eq!(options.interval, Duration::from_secs(5));
        assert_eq!(options.timeout, Duration::from_secs(86_400));
    }
}
