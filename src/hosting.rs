// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote repository hosting provider.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use serde::Serialize;

use crate::config::GitHubSettings;
use crate::error::HostingError;

const GITHUB_API: &str = "https://api.github.com";
const GITHUB_RAW: &str = "https://raw.githubusercontent.com";
const API_VERSION: &str = "2022-11-28";

/// Longest response body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// Operations the pipeline needs from the service hosting the published repository
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    async fn repository_exists(&self) -> Result<bool, HostingError>;

    async fn create_repository(&self, private: bool) -> Result<(), HostingError>;

    /// Contents of `path` on `branch`; [`HostingError::NotFound`] when absent
    async fn fetch_raw(&self, path: &str, branch: &str) -> Result<Bytes, HostingError>;

    async fn pages_enabled(&self) -> Result<bool, HostingError>;

    /// Serve `branch` as a static site; succeeds if already enabled
    async fn enable_pages(&self, branch: &str) -> Result<(), HostingError>;

    async fn delete_repository(&self) -> Result<(), HostingError>;
}

/// Public URL of a file in the repository, used for links in the archive
pub fn raw_file_url(owner: &str, repository: &str, branch: &str, path: &str) -> String {
    format!("{GITHUB_RAW}/{owner}/{repository}/{branch}/{path}")
}

#[derive(Serialize)]
struct CreateRepository<'a> {
    name: &'a str,
    private: bool,
    auto_init: bool,
}

#[derive(Serialize)]
struct PagesSource<'a> {
    branch: &'a str,
    path: &'a str,
}

#[derive(Serialize)]
struct EnablePages<'a> {
    source: PagesSource<'a>,
}

/// GitHub REST API client scoped to one repository
#[derive(Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    api_base: String,
    owner: String,
    repository: String,
    token: String,
}

impl GitHubClient {
    pub fn new(client: reqwest::Client, settings: &GitHubSettings) -> Self {
        Self {
            client,
            api_base: GITHUB_API.to_string(),
            owner: settings.owner.clone(),
            repository: settings.repository.clone(),
            token: settings.token.clone(),
        }
    }

    fn repo_url(&self) -> String {
        format!("{}/repos/{}/{}", self.api_base, self.owner, self.repository)
    }

    fn contents_url(&self, path: &str, branch: &str) -> String {
        format!("{}/contents/{}?ref={}", self.repo_url(), path, branch)
    }

    fn pages_url(&self) -> String {
        format!("{}/pages", self.repo_url())
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.request_accepting(method, url, "application/vnd.github+json")
    }

    fn request_accepting(
        &self,
        method: reqwest::Method,
        url: &str,
        accept: &str,
    ) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, accept)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &str,
    ) -> Result<reqwest::Response, HostingError> {
        request.send().await.map_err(|e| HostingError::RequestFailed {
            url: url.to_string(),
            source: e,
        })
    }

    /// Check the status of `response`, reading the body into the error on failure
    async fn expect_success(
        response: reqwest::Response,
        url: &str,
        resource: &str,
    ) -> Result<reqwest::Response, HostingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, url, resource, &body))
    }

    /// Map 200 to true and 404 to false
    async fn probe(&self, url: &str, resource: &str) -> Result<bool, HostingError> {
        let response = self
            .send(self.request(reqwest::Method::GET, url), url)
            .await?;

        match Self::expect_success(response, url, resource).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Build the error for an unsuccessful response
fn status_error(status: StatusCode, url: &str, resource: &str, body: &str) -> HostingError {
    if status == StatusCode::NOT_FOUND {
        return HostingError::NotFound {
            resource: resource.to_string(),
        };
    }

    let mut body = body.trim().to_string();
    if body.len() > MAX_ERROR_BODY {
        let mut end = MAX_ERROR_BODY;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body.truncate(end);
    }

    HostingError::UnexpectedStatus {
        url: url.to_string(),
        status: status.as_u16(),
        body,
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn repository_exists(&self) -> Result<bool, HostingError> {
        let url = self.repo_url();
        self.probe(&url, &format!("repository {}/{}", self.owner, self.repository))
            .await
    }

    async fn create_repository(&self, private: bool) -> Result<(), HostingError> {
        let url = format!("{}/user/repos", self.api_base);
        let body = CreateRepository {
            name: &self.repository,
            private,
            auto_init: false,
        };

        let response = self
            .send(self.request(reqwest::Method::POST, &url).json(&body), &url)
            .await?;
        Self::expect_success(response, &url, "repository creation endpoint").await?;

        tracing::info!(
            owner = %self.owner,
            repository = %self.repository,
            private,
            "created remote repository"
        );
        Ok(())
    }

    async fn fetch_raw(&self, path: &str, branch: &str) -> Result<Bytes, HostingError> {
        let url = self.contents_url(path, branch);
        let request =
            self.request_accepting(reqwest::Method::GET, &url, "application/vnd.github.raw+json");

        let response = self.send(request, &url).await?;
        let response =
            Self::expect_success(response, &url, &format!("{path} on branch {branch}")).await?;

        response
            .bytes()
            .await
            .map_err(|e| HostingError::RequestFailed { url, source: e })
    }

    async fn pages_enabled(&self) -> Result<bool, HostingError> {
        let url = self.pages_url();
        self.probe(&url, "pages site").await
    }

    async fn enable_pages(&self, branch: &str) -> Result<(), HostingError> {
        let url = self.pages_url();
        let body = EnablePages {
            source: PagesSource { branch, path: "/" },
        };

        let response = self
            .send(self.request(reqwest::Method::POST, &url).json(&body), &url)
            .await?;

        // 409 means a site already exists for this repository
        if response.status() == StatusCode::CONFLICT {
            return Ok(());
        }
        Self::expect_success(response, &url, "pages site").await?;
        Ok(())
    }

    async fn delete_repository(&self) -> Result<(), HostingError> {
        let url = self.repo_url();
        let response = self
            .send(self.request(reqwest::Method::DELETE, &url), &url)
            .await?;
        Self::expect_success(
            response,
            &url,
            &format!("repository {}/{}", self.owner, self.repository),
        )
        .await?;

        tracing::warn!(
            owner = %self.owner,
            repository = %self.repository,
            "deleted remote repository"
        );
        Ok(())
    }
}
