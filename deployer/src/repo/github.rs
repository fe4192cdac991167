//! GitHub repository host (REST v3 + Pages)

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use openapi_client::models::{
    ContentFile, CreateRepoRequest, GitHubRepo, PagesRequest, PagesSite, PagesSource,
    PutContentRequest, PutContentResponse,
};
use secrecy::SecretString;
use tracing::{debug, info, warn};

use crate::errors::DeployerError;
use crate::http::client::{ClientOptions, HttpClient};
use crate::repo::{EnsuredRepo, RepoError, RepoFile, RepoHandle, RepositoryHost};

/// GitHub host options
#[derive(Debug)]
pub struct GitHubOptions {
    pub api_url: String,
    pub token: SecretString,
    /// Account that owns the deployed repositories
    pub owner: String,
    /// Liveness probes after enabling Pages; 0 skips the wait
    pub pages_wait_attempts: u32,
    pub pages_wait_interval: Duration,
    pub timeout: Duration,
}

pub struct GitHubHost {
    http: HttpClient,
    owner: String,
    pages_wait_attempts: u32,
    pages_wait_interval: Duration,
}

impl GitHubHost {
    pub fn new(options: GitHubOptions) -> Result<Self, DeployerError> {
        let http = HttpClient::new(ClientOptions {
            base_url: options.api_url,
            bearer: Some(options.token),
            headers: vec![
                ("Accept", "application/vnd.github+json".to_string()),
                ("X-GitHub-Api-Version", "2022-11-28".to_string()),
            ],
            timeout: options.timeout,
        })?;
        Ok(Self {
            http,
            owner: options.owner,
            pages_wait_attempts: options.pages_wait_attempts,
            pages_wait_interval: options.pages_wait_interval,
        })
    }

    fn repo_path(&self, name: &str) -> String {
        format!("/repos/{}/{}", self.owner, name)
    }

    fn content_path(repo: &RepoHandle, path: &str) -> String {
        format!("/repos/{}/{}/contents/{}", repo.owner, repo.name, path)
    }

    async fn get_repo(&self, name: &str) -> Result<Option<GitHubRepo>, RepoError> {
        self.http
            .get_optional(&self.repo_path(name))
            .await
            .map_err(|e| RepoError::from_http("get repository", e))
    }

    async fn get_content(
        &self,
        repo: &RepoHandle,
        path: &str,
    ) -> Result<Option<ContentFile>, RepoError> {
        let url = format!("{}?ref={}", Self::content_path(repo, path), repo.default_branch);
        self.http
            .get_optional(&url)
            .await
            .map_err(|e| RepoError::from_http("get contents", e))
    }
}

/// Public Pages URL for a repository
pub fn public_url(owner: &str, name: &str) -> String {
    format!("https://{}.github.io/{}/", owner.to_lowercase(), name)
}

fn to_handle(repo: GitHubRepo) -> RepoHandle {
    RepoHandle {
        owner: repo.owner.login,
        name: repo.name,
        default_branch: repo.default_branch,
        html_url: repo.html_url,
    }
}

/// Decode a contents-API payload; GitHub wraps base64 at 60 columns
fn decode_content(file: &ContentFile) -> Result<String, RepoError> {
    let encoded: String = file
        .content
        .as_deref()
        .unwrap_or_default()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| RepoError::Invalid(format!("file content is not base64: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| RepoError::Invalid(format!("file is not UTF-8: {}", e)))
}

#[async_trait]
impl RepositoryHost for GitHubHost {
    async fn ensure_repository(&self, name: &str) -> Result<EnsuredRepo, RepoError> {
        if let Some(repo) = self.get_repo(name).await? {
            debug!("Repository {} already exists", repo.full_name);
            return Ok(EnsuredRepo {
                handle: to_handle(repo),
                created: false,
            });
        }

        let body = CreateRepoRequest {
            name,
            description: format!("Deployed app: {}", name),
            private: false,
            auto_init: true,
        };
        match self.http.post::<GitHubRepo, _>("/user/repos", &body).await {
            Ok(repo) => {
                info!("Created repository {}", repo.full_name);
                Ok(EnsuredRepo {
                    handle: to_handle(repo),
                    created: true,
                })
            }
            // Lost a creation race; the repository is there now
            Err(e) if e.status() == Some(422) => {
                warn!("Repository {} was created concurrently, re-reading", name);
                let repo = self.get_repo(name).await?.ok_or_else(|| {
                    RepoError::Invalid(format!("repository {} rejected but not found", name))
                })?;
                Ok(EnsuredRepo {
                    handle: to_handle(repo),
                    created: false,
                })
            }
            Err(e) => Err(RepoError::from_http("create repository", e)),
        }
    }

    async fn write_files(
        &self,
        repo: &RepoHandle,
        files: &[RepoFile],
        message: &str,
    ) -> Result<String, RepoError> {
        let mut last_sha = None;
        for file in files {
            let existing = self.get_content(repo, &file.path).await?.map(|f| f.sha);
            let body = PutContentRequest {
                message,
                content: STANDARD.encode(file.content.as_bytes()),
                branch: &repo.default_branch,
                sha: existing,
            };
            let response: PutContentResponse = self
                .http
                .put(&Self::content_path(repo, &file.path), &body)
                .await
                .map_err(|e| RepoError::from_http("write file", e))?;
            debug!("Wrote {} to {} at {}", file.path, repo.name, response.commit.sha);
            last_sha = Some(response.commit.sha);
        }
        last_sha.ok_or_else(|| RepoError::Invalid("no files to write".to_string()))
    }

    async fn enable_hosting(&self, repo: &RepoHandle) -> Result<String, RepoError> {
        let pages_path = format!("/repos/{}/{}/pages", repo.owner, repo.name);
        let wanted = PagesSource {
            branch: repo.default_branch.clone(),
            path: "/".to_string(),
        };

        let site: Option<PagesSite> = self
            .http
            .get_optional(&pages_path)
            .await
            .map_err(|e| RepoError::from_http("get pages", e))?;

        match site {
            None => {
                let body = PagesRequest { source: wanted };
                match self.http.post_unit(&pages_path, &body).await {
                    Ok(()) => info!("Enabled Pages for {}", repo.name),
                    Err(e) if e.status() == Some(409) => {
                        debug!("Pages already enabled for {}", repo.name)
                    }
                    Err(e) => return Err(RepoError::from_http("enable pages", e)),
                }
            }
            Some(site) if site.source.as_ref().map(|s| s.branch.as_str()) != Some(wanted.branch.as_str()) => {
                info!("Moving Pages for {} to branch {}", repo.name, wanted.branch);
                self.http
                    .put_unit(&pages_path, &PagesRequest { source: wanted })
                    .await
                    .map_err(|e| RepoError::from_http("update pages", e))?;
            }
            Some(_) => debug!("Pages already serving {}", repo.name),
        }

        Ok(public_url(&repo.owner, &repo.name))
    }

    async fn read_file(&self, repo: &RepoHandle, path: &str) -> Result<Option<String>, RepoError> {
        match self.get_content(repo, path).await? {
            Some(file) => decode_content(&file).map(Some),
            None => Ok(None),
        }
    }

    async fn await_live(&self, public_url: &str) -> bool {
        for attempt in 1..=self.pages_wait_attempts {
            match self.http.probe(public_url).await {
                Ok(200) => {
                    info!("{} is live after {} probe(s)", public_url, attempt);
                    return true;
                }
                Ok(status) => debug!("{} answered {} (probe {})", public_url, status, attempt),
                Err(e) => debug!("{} probe {} failed: {}", public_url, attempt, e),
            }
            if attempt < self.pages_wait_attempts {
                tokio::time::sleep(self.pages_wait_interval).await;
            }
        }
        if self.pages_wait_attempts > 0 {
            warn!("{} not live after {} probe(s)", public_url, self.pages_wait_attempts);
        }
        false
    }
}
