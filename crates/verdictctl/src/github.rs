//! Pull-request comment upsert.
//!
//! One comment per suite/run, identified by a hidden marker in its body:
//! later runs update the existing comment instead of stacking new ones.
//! Comment failures never fail the run; the caller downgrades them to
//! warnings.

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

const GITHUB_API: &str = "https://api.github.com";

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("comment request failed: {0}")]
    Transport(String),

    #[error("comment API returned status {0}")]
    Status(u16),
}

/// Where the comment goes.
#[derive(Debug, Clone)]
pub struct CommentTarget {
    /// `owner/repo`.
    pub repo: String,
    pub pr_number: u64,
    pub token: String,
}

#[derive(Debug, Deserialize)]
struct IssueComment {
    id: u64,
    body: Option<String>,
}

/// Create or update the PR comment carrying `marker`.
pub async fn upsert_pr_comment(
    target: &CommentTarget,
    marker: &str,
    body: &str,
) -> Result<(), CommentError> {
    let http = reqwest::Client::new();
    let comments_url = format!(
        "{}/repos/{}/issues/{}/comments",
        GITHUB_API, target.repo, target.pr_number
    );

    let response = http
        .get(&comments_url)
        .headers(headers(&target.token))
        .query(&[("per_page", "100")])
        .send()
        .await
        .map_err(|e| CommentError::Transport(e.to_string()))?;
    if !response.status().is_success() {
        return Err(CommentError::Status(response.status().as_u16()));
    }
    let comments: Vec<IssueComment> = response
        .json()
        .await
        .map_err(|e| CommentError::Transport(e.to_string()))?;

    let payload = serde_json::json!({ "body": body });
    let request = match find_marked(&comments, marker) {
        Some(existing) => {
            debug!(comment_id = existing.id, "updating existing comment");
            http.patch(format!(
                "{}/repos/{}/issues/comments/{}",
                GITHUB_API, target.repo, existing.id
            ))
        }
        None => {
            debug!("creating new comment");
            http.post(&comments_url)
        }
    };

    let response = request
        .headers(headers(&target.token))
        .json(&payload)
        .send()
        .await
        .map_err(|e| CommentError::Transport(e.to_string()))?;
    if !response.status().is_success() {
        return Err(CommentError::Status(response.status().as_u16()));
    }
    Ok(())
}

fn find_marked<'a>(comments: &'a [IssueComment], marker: &str) -> Option<&'a IssueComment> {
    comments
        .iter()
        .find(|c| c.body.as_deref().is_some_and(|b| b.contains(marker)))
}

fn headers(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
    headers.insert(USER_AGENT, HeaderValue::from_static("verdictctl"));
    if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
        headers.insert(AUTHORIZATION, value);
    }
    headers
}
