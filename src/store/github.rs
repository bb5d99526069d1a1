//! GitHub contents API backend: the blob is one file in a repository and the
//! version token is the file's git blob SHA.

use std::time::Duration;

use async_trait::async_trait;
use base64::prelude::*;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{BlobApi, RemoteBlob, VersionToken};
use crate::config::GithubSettings;
use crate::error::{StoreCommitError, StoreFetchError};

const ACCEPT: &str = "application/vnd.github.v3+json";

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Debug, Serialize)]
struct PutRequest<'a> {
    message: &'a str,
    content: String,
    sha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    branch: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct PutResponse {
    content: PutContent,
}

#[derive(Debug, Deserialize)]
struct PutContent {
    sha: String,
}

pub struct GithubContents {
    client: reqwest::Client,
    url: String,
    auth: String,
    branch: Option<String>,
}

impl GithubContents {
    pub fn new(settings: &GithubSettings, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let path = settings
            .csv_path
            .trim_matches('/')
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let url = format!(
            "{}/repos/{}/contents/{}",
            settings.api_base.trim_end_matches('/'),
            settings.repo,
            path
        );

        Ok(Self {
            client,
            url,
            auth: format!("token {}", settings.token),
            branch: settings.branch.clone(),
        })
    }
}

#[async_trait]
impl BlobApi for GithubContents {
    async fn get(&self) -> Result<Option<RemoteBlob>, StoreFetchError> {
        let mut request = self
            .client
            .get(&self.url)
            .header("Authorization", &self.auth)
            .header("Accept", ACCEPT);
        if let Some(branch) = &self.branch {
            request = request.query(&[("ref", branch)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(StoreFetchError::Status {
                status: status.as_u16(),
            });
        }

        let body: ContentsResponse = response.json().await?;
        let encoded = match (body.encoding.as_deref(), body.content) {
            (Some("none"), _) | (_, None) => {
                return Err(StoreFetchError::Malformed(
                    "file content not inlined (too large for the contents API?)".to_string(),
                ))
            }
            (_, Some(content)) => content,
        };
        // The API wraps base64 at 60 columns.
        let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
        let content = BASE64_STANDARD
            .decode(compact.as_bytes())
            .map_err(|e| StoreFetchError::Malformed(format!("invalid base64 content: {}", e)))?;

        debug!(bytes = content.len(), sha = %body.sha, "fetched comment table from github");
        Ok(Some(RemoteBlob {
            content,
            version: VersionToken::new(body.sha),
        }))
    }

    async fn put(
        &self,
        content: &[u8],
        expected: &VersionToken,
        message: &str,
    ) -> Result<Option<VersionToken>, StoreCommitError> {
        let payload = PutRequest {
            message,
            content: BASE64_STANDARD.encode(content),
            sha: expected.as_str(),
            branch: self.branch.as_deref(),
        };

        let response = self
            .client
            .put(&self.url)
            .header("Authorization", &self.auth)
            .header("Accept", ACCEPT)
            .json(&payload)
            .send()
            .await?;

        match response.status() {
            // The write has landed once the status says so; an unreadable body only
            // loses the new sha.
            StatusCode::OK | StatusCode::CREATED => match response.json::<PutResponse>().await {
                Ok(body) => Ok(Some(VersionToken::new(body.content.sha))),
                Err(e) => {
                    warn!(error = %e, "github accepted the commit but its response could not be read");
                    Ok(None)
                }
            },
            StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(StoreCommitError::Conflict),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(StoreCommitError::Rejected {
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}
