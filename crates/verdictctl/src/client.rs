//! HTTP client for the hosted test-execution service.
//!
//! Thin transport over reqwest: every JSON endpoint is decoded into an
//! [`Envelope`] and unwrapped by the core, so error reporting stays uniform
//! across call sites. The high-level waiters wire the core poll loop and
//! stream decoder to the concrete endpoints.

use std::collections::BTreeMap;

use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use verdict_core::envelope::{unwrap_envelope, ApiError, Envelope};
use verdict_core::poll::{await_completion, PollError, PollOptions, StatusSnapshot};
use verdict_core::sse::{FrameDecoder, StreamError};
use verdict_core::types::{
    ProjectRunHandle, ProjectRunResult, SuiteRunHandle, SuiteRunResult, SuiteRunStatus,
};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Poll(#[from] PollError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("watch cancelled for run {run_id}")]
    Cancelled { run_id: String },
}

/// Request payload for submitting a suite run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteRunRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_replacements: Option<Vec<UrlReplacement>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variable_overrides: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<RunMetadata>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UrlReplacement {
    pub original: String,
    pub replacement: String,
}

/// CI context attached to a submitted run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git: Option<GitMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GitMetadata {
    pub branch: String,
}

/// Request payload for submitting a project run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectRunRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_group_names: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_overrides: Option<BTreeMap<String, String>>,
}

/// Client for the service API. One instance per process; holds the bearer
/// token and never inspects it beyond attaching it to requests.
#[derive(Debug)]
pub struct Client {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl Client {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http: reqwest::Client::new(),
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", self.api_key)) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    /// GET a JSON endpoint and unwrap its envelope.
    async fn get_json<T: DeserializeOwned>(&self, url: &str, api_name: &str) -> Result<T, ApiError> {
        let response = self
            .http
            .get(url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| transport(api_name, &e))?;
        unwrap_envelope(envelope_of(response).await, api_name)
    }

    /// POST a JSON body and unwrap the response envelope.
    async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        url: &str,
        body: &B,
        api_name: &str,
    ) -> Result<T, ApiError> {
        let response = self
            .http
            .post(url)
            .headers(self.headers())
            .json(body)
            .send()
            .await
            .map_err(|e| transport(api_name, &e))?;
        unwrap_envelope(envelope_of(response).await, api_name)
    }

    // --- Suite runs (status endpoint is status-only; result needs a second fetch) ---

    /// Submit a suite run.
    /// POST /v1/testSuites/{id}/runs
    pub async fn start_suite_run(
        &self,
        suite_id: &str,
        request: &SuiteRunRequest,
    ) -> Result<SuiteRunHandle, ApiError> {
        let url = format!("{}/v1/testSuites/{}/runs", self.base_url, suite_id);
        self.post_json(&url, request, "suiteRun").await
    }

    /// GET /v1/testSuiteRuns/{id}/status
    pub async fn suite_run_status(&self, run_id: &str) -> Result<SuiteRunStatus, ApiError> {
        let url = format!("{}/v1/testSuiteRuns/{}/status", self.base_url, run_id);
        self.get_json(&url, "suiteRunStatus").await
    }

    /// GET /v1/testSuiteRuns/{id}/result
    pub async fn suite_run_result(&self, run_id: &str) -> Result<SuiteRunResult, ApiError> {
        let url = format!("{}/v1/testSuiteRuns/{}/result", self.base_url, run_id);
        self.get_json(&url, "suiteRunResult").await
    }

    /// Poll a suite run to completion and fetch its result.
    pub async fn wait_for_suite_result(
        &self,
        run_id: &str,
        options: &PollOptions,
        cancel: &CancellationToken,
    ) -> Result<SuiteRunResult, ClientError> {
        debug!(run_id, "polling suite run");
        let result = await_completion(
            run_id,
            || async move {
                let status = self.suite_run_status(run_id).await?;
                Ok(StatusSnapshot {
                    status: status.status,
                    payload: None,
                })
            },
            || async move { self.suite_run_result(run_id).await },
            options,
            cancel,
        )
        .await?;
        Ok(result)
    }

    // --- Project runs (status endpoint returns the full payload) ---

    /// Submit a project run.
    /// POST /v1/projects/{id}/runs
    pub async fn start_project_run(
        &self,
        project_id: &str,
        request: &ProjectRunRequest,
    ) -> Result<ProjectRunHandle, ApiError> {
        let url = format!("{}/v1/projects/{}/runs", self.base_url, project_id);
        self.post_json(&url, request, "projectRun").await
    }

    /// GET /v1/projects/{pid}/runs/{rid}
    pub async fn project_run(
        &self,
        project_id: &str,
        run_id: &str,
    ) -> Result<ProjectRunResult, ApiError> {
        let url = format!("{}/v1/projects/{}/runs/{}", self.base_url, project_id, run_id);
        self.get_json(&url, "projectRunStatus").await
    }

    /// Poll a project run to completion. The terminal snapshot already
    /// carries the result, so no second fetch happens.
    pub async fn wait_for_project_result(
        &self,
        project_id: &str,
        run_id: &str,
        options: &PollOptions,
        cancel: &CancellationToken,
    ) -> Result<ProjectRunResult, ClientError> {
        debug!(run_id, "polling project run");
        let result = await_completion(
            run_id,
            || async move {
                let run = self.project_run(project_id, run_id).await?;
                Ok(StatusSnapshot {
                    status: run.status.clone(),
                    payload: Some(run),
                })
            },
            || async move {
                // Unreachable: every snapshot carries the payload.
                self.project_run(project_id, run_id).await
            },
            options,
            cancel,
        )
        .await?;
        Ok(result)
    }

    /// Watch a project run over the streamed endpoint and return the final
    /// result carried by the last data frame.
    /// POST /v1/projects/{pid}/runs/{rid}/watch
    pub async fn watch_project_run(
        &self,
        project_id: &str,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> Result<ProjectRunResult, ClientError> {
        let url = format!(
            "{}/v1/projects/{}/runs/{}/watch",
            self.base_url, project_id, run_id
        );

        let response = self
            .http
            .post(&url)
            .headers(self.headers())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| StreamError::Body(e.to_string()))?;

        // A bad status here is a protocol violation, not a transient
        // condition; fail before touching the body.
        let status = response.status();
        if !status.is_success() {
            return Err(StreamError::HttpStatus(status.as_u16()).into());
        }

        debug!(run_id, "watching project run stream");
        let mut stream = response.bytes_stream();
        let mut decoder = FrameDecoder::new();

        loop {
            let chunk = tokio::select! {
                () = cancel.cancelled() => {
                    return Err(ClientError::Cancelled {
                        run_id: run_id.to_string(),
                    });
                }
                chunk = stream.next() => chunk,
            };
            match chunk {
                Some(Ok(bytes)) => decoder.push(&String::from_utf8_lossy(&bytes)),
                Some(Err(e)) => return Err(StreamError::Body(e.to_string()).into()),
                None => break,
            }
        }

        Ok(decoder.finish()?)
    }
}

fn transport(api_name: &str, error: &reqwest::Error) -> ApiError {
    ApiError::Transport {
        api_name: api_name.to_string(),
        detail: error.to_string(),
    }
}

/// Decode a reqwest response into the envelope shape the core unwraps.
/// An undecodable body is reported as an absent body, which the unwrapper
/// turns into a typed HTTP error for the endpoint.
async fn envelope_of<T: DeserializeOwned>(response: reqwest::Response) -> Envelope<T> {
    let status_code = response.status().as_u16();
    let body = response.json::<T>().await.ok();
    Envelope { status_code, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_trims_trailing_slash() {
        let client = Client::new("https://api.verdict.dev/", "key");
        assert_eq!(client.base_url, "https://api.verdict.dev");
    }

    #[test]
    fn client_preserves_url_without_trailing_slash() {
        let client = Client::new("https://api.verdict.dev", "key");
        assert_eq!(client.base_url, "https://api.verdict.dev");
    }

    #[test]
    fn headers_carry_bearer_token_and_content_type() {
        let client = Client::new("https://api.verdict.dev", "secret-key");
        let headers = client.headers();
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer secret-key");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn suite_request_omits_unset_options() {
        let request = SuiteRunRequest::default();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn suite_request_serializes_camel_case() {
        let request = SuiteRunRequest {
            url_replacements: Some(vec![UrlReplacement {
                original: "https://prod.example.com".to_string(),
                replacement: "https://staging.example.com".to_string(),
            }]),
            environment: Some("staging".to_string()),
            variable_overrides: None,
            metadata: Some(RunMetadata {
                git: Some(GitMetadata {
                    branch: "main".to_string(),
                }),
                note: None,
            }),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json["urlReplacements"][0]["replacement"],
            "https://staging.example.com"
        );
        assert_eq!(json["metadata"]["git"]["branch"], "main");
        assert!(json.get("variableOverrides").is_none());
    }

    #[test]
    fn project_request_serializes_camel_case() {
        let request = ProjectRunRequest {
            run_group_names: Some(vec!["smoke".to_string()]),
            env_overrides: Some(BTreeMap::from([(
                "BASE_URL".to_string(),
                "http://localhost:3000".to_string(),
            )])),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["runGroupNames"][0], "smoke");
        assert_eq!(json["envOverrides"]["BASE_URL"], "http://localhost:3000");
    }

    #[tokio::test]
    async fn transport_failure_surfaces_endpoint_name() {
        // Nothing listens here; the connect error must carry the api name.
        let client = Client::new("http://127.0.0.1:19999", "key");
        let err = client.suite_run_status("run-1").await.unwrap_err();
        match err {
            ApiError::Transport { api_name, .. } => assert_eq!(api_name, "suiteRunStatus"),
            other => panic!("expected Transport, got {other:?}"),
        }
    }
}
