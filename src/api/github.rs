//! Implements the `Store` trait using the GitHub Contents API.
//!
//! - `GET /repos/{owner}/{repo}/contents/{path}` returns the base64 payload and its blob `sha`,
//!   which is the version tag.
//! - `PUT` on the same URL with `sha` set replaces the file only if `sha` is still current.

use crate::api::Store;
use crate::error::{Error, ErrorType, IntoResult};
use crate::model::{snapshot, Snapshot, Transaction, VersionTag};
use crate::{Config, Res, Result};
use anyhow::Context;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

const USER_AGENT: &str = concat!("cashflow-sync/", env!("CARGO_PKG_VERSION"));
const GITHUB_JSON: &str = "application/vnd.github+json";
const API_VERSION_HEADER: &str = "X-GitHub-Api-Version";
const API_VERSION: &str = "2022-11-28";

pub(crate) struct GitHubStore {
    client: reqwest::Client,
    url: Url,
    token: String,
    branch: Option<String>,
    commit_message: String,
    timeout: Duration,
}

impl GitHubStore {
    pub(crate) fn new(config: &Config, token: String) -> Result<Self> {
        let url = contents_url(config.api_url(), config.owner(), config.repo_name(), config.path())
            .pub_result(ErrorType::Config)?;
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout())
            .build()
            .context("Unable to create the HTTP client")
            .pub_result(ErrorType::Transport)?;
        Ok(Self {
            client,
            url,
            token,
            branch: config.branch().map(str::to_string),
            commit_message: config.commit_message().to_string(),
            timeout: config.timeout(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(AUTHORIZATION, format!("token {}", self.token))
            .header(ACCEPT, GITHUB_JSON)
            .header(API_VERSION_HEADER, API_VERSION)
    }

    /// Sends the request and returns the status and body text.
    async fn send(&self, request: RequestBuilder) -> Result<(StatusCode, String)> {
        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        trace!("{status}: {body}");
        Ok((status, body))
    }

    fn transport_error(&self, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::new(
                ErrorType::Transport,
                anyhow::Error::new(e).context(format!(
                    "The request to GitHub timed out after {}s",
                    self.timeout.as_secs()
                )),
            )
        } else {
            Error::new(
                ErrorType::Transport,
                anyhow::Error::new(e).context("The request to GitHub failed"),
            )
        }
    }
}

#[async_trait::async_trait]
impl Store for GitHubStore {
    async fn load(&mut self) -> Result<Snapshot> {
        debug!("GET {}", self.url);
        let mut request = self.authorized(self.client.get(self.url.clone()));
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch)]);
        }
        let (status, body) = self.send(request).await?;
        snapshot_from_response(status, &body)
    }

    async fn replace(
        &mut self,
        transactions: &[Transaction],
        expected: Option<&VersionTag>,
    ) -> Result<VersionTag> {
        let content = snapshot::encode(transactions).pub_result(ErrorType::Transport)?;
        let body = PutRequest {
            message: &self.commit_message,
            content,
            sha: expected.map(VersionTag::as_str),
            branch: self.branch.as_deref(),
        };
        debug!(
            "PUT {} with {} transactions, expecting version {}",
            self.url,
            transactions.len(),
            expected.map(VersionTag::as_str).unwrap_or("<none>")
        );
        let request = self.authorized(self.client.put(self.url.clone())).json(&body);
        let (status, text) = self.send(request).await?;
        version_from_put_response(status, &text, expected.is_none())
    }
}

/// Builds `{api_url}/repos/{owner}/{repo}/contents/{path}`, escaping each path segment.
fn contents_url(api_url: &str, owner: &str, repo: &str, path: &str) -> Res<Url> {
    let mut url =
        Url::parse(api_url).with_context(|| format!("Invalid GitHub API URL '{api_url}'"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("The GitHub API URL '{api_url}' cannot be a base"))?
        .pop_if_empty()
        .extend(["repos", owner, repo, "contents"])
        .extend(path.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

fn snapshot_from_response(status: StatusCode, body: &str) -> Result<Snapshot> {
    match status {
        StatusCode::OK => {
            let contents: ContentsResponse = serde_json::from_str(body)
                .context("Unable to parse the GitHub contents response")
                .pub_result(ErrorType::Transport)?;
            if let Some(encoding) = contents.encoding.as_deref() {
                if encoding != "base64" {
                    return Err(Error::msg(
                        ErrorType::Transport,
                        format!("GitHub returned the document with unsupported encoding '{encoding}'"),
                    ));
                }
            }
            let transactions =
                snapshot::decode(&contents.content).pub_result(ErrorType::Transport)?;
            debug!(
                "Loaded {} transactions at version {}",
                transactions.len(),
                contents.sha
            );
            Ok(Snapshot::new(transactions, Some(VersionTag::new(contents.sha))))
        }
        StatusCode::NOT_FOUND => {
            debug!("The document does not exist yet");
            Ok(Snapshot::new(Vec::new(), None))
        }
        StatusCode::UNAUTHORIZED => Err(auth_error(body)),
        _ => Err(status_error(status, body, "fetching")),
    }
}

fn version_from_put_response(status: StatusCode, body: &str, creating: bool) -> Result<VersionTag> {
    match status {
        StatusCode::OK | StatusCode::CREATED => {
            let response: PutResponse = serde_json::from_str(body)
                .context("Unable to parse the GitHub update response")
                .pub_result(ErrorType::Transport)?;
            debug!("Saved, new version {}", response.content.sha);
            Ok(VersionTag::new(response.content.sha))
        }
        StatusCode::UNAUTHORIZED => Err(auth_error(body)),
        StatusCode::CONFLICT => Err(conflict_error()),
        // GitHub answers 422 when no sha is sent for a file that exists, i.e. someone else
        // created it after we loaded.
        StatusCode::UNPROCESSABLE_ENTITY if creating => Err(conflict_error()),
        _ => Err(status_error(status, body, "saving")),
    }
}

fn auth_error(body: &str) -> Error {
    Error::msg(
        ErrorType::Auth,
        format!(
            "GitHub rejected the token, run 'cashflow auth --token <TOKEN>' with a valid \
            Personal Access Token: {}",
            github_message(body)
        ),
    )
}

fn conflict_error() -> Error {
    Error::msg(
        ErrorType::Conflict,
        "The transactions document was changed since it was loaded, reload and try again",
    )
}

fn status_error(status: StatusCode, body: &str, action: &str) -> Error {
    Error::msg(
        ErrorType::Transport,
        format!(
            "Error {action} the transactions document, GitHub returned {status}: {}",
            github_message(body)
        ),
    )
}

/// GitHub error bodies look like `{"message": "...", "documentation_url": "..."}`.
fn github_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Message {
        message: String,
    }
    match serde_json::from_str::<Message>(body) {
        Ok(m) => m.message,
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NewTransaction;

    fn contents_body(transactions: &[Transaction], sha: &str) -> String {
        // GitHub wraps the base64 payload every 60 characters.
        let payload = snapshot::encode(transactions).unwrap();
        let wrapped: String = payload
            .as_bytes()
            .chunks(60)
            .map(|c| format!("{}\n", std::str::from_utf8(c).unwrap()))
            .collect();
        serde_json::json!({
            "name": "transactions.json",
            "path": "data/transactions.json",
            "sha": sha,
            "content": wrapped,
            "encoding": "base64"
        })
        .to_string()
    }

    #[test]
    fn test_contents_url() {
        let url = contents_url(
            "https://api.github.com",
            "mykael25",
            "cashflow-tracker",
            "data/transactions.json",
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/mykael25/cashflow-tracker/contents/data/transactions.json"
        );
    }

    #[test]
    fn test_contents_url_enterprise_base_and_escaping() {
        let url = contents_url("https://ghe.example.com/api/v3/", "o", "r", "my data/t.json")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/repos/o/r/contents/my%20data/t.json"
        );
    }

    #[test]
    fn test_load_ok() {
        let data = vec![NewTransaction::new("100", "income")
            .note("salary, \"January\"")
            .date("2024-01-10")
            .validate()
            .unwrap()];
        let snapshot =
            snapshot_from_response(StatusCode::OK, &contents_body(&data, "abc123")).unwrap();
        assert_eq!(snapshot.transactions(), data.as_slice());
        assert_eq!(snapshot.version().unwrap().as_str(), "abc123");
    }

    #[test]
    fn test_load_not_found_is_empty() {
        let body = r#"{"message":"Not Found"}"#;
        let snapshot = snapshot_from_response(StatusCode::NOT_FOUND, body).unwrap();
        assert!(snapshot.is_empty());
        assert!(snapshot.version().is_none());
    }

    #[test]
    fn test_load_unauthorized() {
        let body = r#"{"message":"Bad credentials"}"#;
        let err = snapshot_from_response(StatusCode::UNAUTHORIZED, body).unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().contains("Bad credentials"));
    }

    #[test]
    fn test_load_other_status_is_transport() {
        let err = snapshot_from_response(StatusCode::FORBIDDEN, "rate limited").unwrap_err();
        assert!(err.is_transport());
        assert!(err.to_string().contains("403"));
    }

    #[test]
    fn test_load_corrupt_document_is_transport() {
        let body = serde_json::json!({"sha": "x", "content": "!!!!", "encoding": "base64"});
        let err = snapshot_from_response(StatusCode::OK, &body.to_string()).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_load_unsupported_encoding() {
        let body = serde_json::json!({"sha": "x", "content": "", "encoding": "none"});
        let err = snapshot_from_response(StatusCode::OK, &body.to_string()).unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_put_ok() {
        let body = r#"{"content":{"name":"transactions.json","sha":"new-sha"},"commit":{"sha":"c"}}"#;
        let tag = version_from_put_response(StatusCode::OK, body, false).unwrap();
        assert_eq!(tag.as_str(), "new-sha");
        let tag = version_from_put_response(StatusCode::CREATED, body, true).unwrap();
        assert_eq!(tag.as_str(), "new-sha");
    }

    #[test]
    fn test_put_conflict() {
        let body = r#"{"message":"is at abc but expected def"}"#;
        let err = version_from_put_response(StatusCode::CONFLICT, body, false).unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn test_put_unprocessable() {
        let body = r#"{"message":"\"sha\" wasn't supplied."}"#;
        let err = version_from_put_response(StatusCode::UNPROCESSABLE_ENTITY, body, true)
            .unwrap_err();
        assert!(err.is_conflict());
        let err = version_from_put_response(StatusCode::UNPROCESSABLE_ENTITY, body, false)
            .unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_put_unauthorized() {
        let err =
            version_from_put_response(StatusCode::UNAUTHORIZED, "{}", false).unwrap_err();
        assert!(err.is_auth());
    }

    #[test]
    fn test_put_request_omits_sha_on_create() {
        let body = PutRequest {
            message: "Update transactions.json",
            content: "W10=".to_string(),
            sha: None,
            branch: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert_eq!(
            json,
            r#"{"message":"Update transactions.json","content":"W10="}"#
        );
    }
}
