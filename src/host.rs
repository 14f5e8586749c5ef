//! Host collaborator boundary.
//!
//! Everything that talks to GitHub (or, for backtesting, a mock) sits
//! behind [`ProvenanceHost`], so the matching core and tests never
//! depend on network access.

use crate::retry::{rate_limit_wait, with_retry, AttemptOutcome, MAX_RATE_LIMIT_RESET_HORIZON};
use crate::sink::Sink;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors a [`ProvenanceHost`] call can fail with.
#[derive(Debug, Clone)]
pub enum HostError {
    /// The requested PR/commit does not exist (HTTP 404).
    NotFound(String),
    /// A network or 5xx failure; the caller may retry.
    Transient(String),
    /// Rate limited with a reset time too far in the future to wait for.
    RateLimited(String),
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostError::NotFound(msg) => write!(f, "not found: {msg}"),
            HostError::Transient(msg) => write!(f, "transient failure: {msg}"),
            HostError::RateLimited(msg) => write!(f, "rate limited: {msg}"),
        }
    }
}

impl std::error::Error for HostError {}

/// Metadata about a pull request, the subset `check`/`refresh` need.
#[derive(Debug, Clone, Deserialize)]
pub struct PrInfo {
    pub number: u64,
    pub state: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub changed_files: u64,
    pub base: ShaRef,
    pub head: ShaRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShaRef {
    pub sha: String,
}

/// Everything `check`/`refresh` need from a source-code host. Kept
/// trait-object-safe so `orchestrate`/`refresh` take `&dyn
/// ProvenanceHost` and tests can swap in [`MockHost`].
pub trait ProvenanceHost {
    fn fetch_pr_info(&self, owner: &str, repo: &str, pr_number: u64) -> Result<PrInfo, HostError>;
    fn fetch_pr_diff(&self, owner: &str, repo: &str, pr_number: u64) -> Result<String, HostError>;
    fn fetch_commit_diff(&self, owner: &str, repo: &str, sha: &str) -> Result<String, HostError>;
    /// One page of the PR list, newest first, plus whether pagination
    /// should stop (empty page, or every PR on the page already
    /// predates `since_created`).
    fn fetch_pr_list(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PrInfo>, HostError>;
}

/// The real GitHub-backed host, built on `reqwest::blocking`.
pub struct GithubHost<'a> {
    client: reqwest::blocking::Client,
    token: Option<String>,
    sink: &'a dyn Sink,
}

impl<'a> GithubHost<'a> {
    pub fn new(token: Option<String>, sink: &'a dyn Sink) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(crate::retry::REQUEST_TIMEOUT)
            .build()
            .expect("reqwest client builds with static configuration");
        GithubHost { client, token, sink }
    }

    fn authorized(&self, builder: reqwest::blocking::RequestBuilder) -> reqwest::blocking::RequestBuilder {
        let builder = builder.header("User-Agent", "provenance-guard");
        match &self.token {
            Some(token) => builder.header("Authorization", format!("Bearer {token}")),
            None => builder,
        }
    }

    fn get_with_retry(&self, url: &str, accept: &str) -> Result<String, HostError> {
        with_retry(self.sink, |_attempt| {
            let request = self.authorized(self.client.get(url).header("Accept", accept));
            match request.send() {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text() {
                            Ok(body) => AttemptOutcome::Success(body),
                            Err(e) => AttemptOutcome::Retryable(HostError::Transient(e.to_string())),
                        }
                    } else if status.as_u16() == 404 {
                        AttemptOutcome::Fatal(HostError::NotFound(url.to_owned()))
                    } else if status.as_u16() == 403 {
                        match reset_header(&response) {
                            Some(reset) => {
                                let now = SystemTime::now()
                                    .duration_since(UNIX_EPOCH)
                                    .map(|d| d.as_secs() as i64)
                                    .unwrap_or(0);
                                match rate_limit_wait(reset, now) {
                                    Some(retry_after) => AttemptOutcome::RateLimited { retry_after },
                                    None => AttemptOutcome::Fatal(HostError::RateLimited(format!(
                                        "reset time more than {MAX_RATE_LIMIT_RESET_HORIZON}s away"
                                    ))),
                                }
                            }
                            None => AttemptOutcome::Fatal(HostError::Transient(
                                "403 without rate-limit header".to_owned(),
                            )),
                        }
                    } else if status.is_server_error() {
                        AttemptOutcome::Retryable(HostError::Transient(status.to_string()))
                    } else {
                        AttemptOutcome::Fatal(HostError::Transient(status.to_string()))
                    }
                }
                Err(e) => AttemptOutcome::Retryable(HostError::Transient(e.to_string())),
            }
        })
    }
}

fn reset_header(response: &reqwest::blocking::Response) -> Option<i64> {
    response
        .headers()
        .get("X-RateLimit-Reset")?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

impl<'a> ProvenanceHost for GithubHost<'a> {
    fn fetch_pr_info(&self, owner: &str, repo: &str, pr_number: u64) -> Result<PrInfo, HostError> {
        let url = format!("https://api.github.com/repos/{owner}/{repo}/pulls/{pr_number}");
        let body = self.get_with_retry(&url, "application/vnd.github+json")?;
        serde_json::from_str(&body).map_err(|e| HostError::Transient(format!("malformed PR payload: {e}")))
    }

    fn fetch_pr_diff(&self, owner: &str, repo: &str, pr_number: u64) -> Result<String, HostError> {
        let info = self.fetch_pr_info(owner, repo, pr_number)?;
        let url = format!(
            "https://api.github.com/repos/{owner}/{repo}/compare/{}...{}",
            info.base.sha, info.head.sha
        );
        self.get_with_retry(&url, "application/vnd.github.v3.diff")
    }

    fn fetch_commit_diff(&self, owner: &str, repo: &str, sha: &str) -> Result<String, HostError> {
        let url = format!("https://api.github.com/repos/{owner}/{repo}/commits/{sha}");
        self.get_with_retry(&url, "application/vnd.github.v3.diff")
    }

    fn fetch_pr_list(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<PrInfo>, HostError> {
        let url = format!(
            "https://api.github.com/repos/{owner}/{repo}/pulls?state={state}&sort=created&direction=desc&per_page={per_page}&page={page}"
        );
        let body = self.get_with_retry(&url, "application/vnd.github+json")?;
        serde_json::from_str(&body).map_err(|e| HostError::Transient(format!("malformed PR list payload: {e}")))
    }
}

/// In-memory host for tests and backtesting against a fixed fixture set
/// (no network access).
#[derive(Debug, Default)]
pub struct MockHost {
    pub prs: BTreeMap<u64, PrInfo>,
    pub pr_diffs: BTreeMap<u64, String>,
    pub commit_diffs: BTreeMap<String, String>,
}

impl ProvenanceHost for MockHost {
    fn fetch_pr_info(&self, _owner: &str, _repo: &str, pr_number: u64) -> Result<PrInfo, HostError> {
        self.prs
            .get(&pr_number)
            .cloned()
            .ok_or_else(|| HostError::NotFound(pr_number.to_string()))
    }

    fn fetch_pr_diff(&self, _owner: &str, _repo: &str, pr_number: u64) -> Result<String, HostError> {
        self.pr_diffs
            .get(&pr_number)
            .cloned()
            .ok_or_else(|| HostError::NotFound(pr_number.to_string()))
    }

    fn fetch_commit_diff(&self, _owner: &str, _repo: &str, sha: &str) -> Result<String, HostError> {
        self.commit_diffs
            .get(sha)
            .cloned()
            .ok_or_else(|| HostError::NotFound(sha.to_owned()))
    }

    fn fetch_pr_list(
        &self,
        _owner: &str,
        _repo: &str,
        _state: &str,
        page: u32,
        _per_page: u32,
    ) -> Result<Vec<PrInfo>, HostError> {
        if page > 1 {
            return Ok(Vec::new());
        }
        Ok(self.prs.values().cloned().collect())
    }
}
