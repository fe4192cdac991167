//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, Method, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::DeployerError;

const USER_AGENT: &str = concat!("pagesmith-deployer/", env!("CARGO_PKG_VERSION"));

/// HTTP client options
#[derive(Debug)]
pub struct ClientOptions {
    /// Base URL that request paths are appended to
    pub base_url: String,

    /// Bearer token sent with every request
    pub bearer: Option<SecretString>,

    /// Extra headers sent with every request
    pub headers: Vec<(&'static str, String)>,

    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            bearer: None,
            headers: Vec::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// JSON HTTP client for a single upstream API
pub struct HttpClient {
    client: Client,
    base_url: String,
    bearer: Option<SecretString>,
    headers: Vec<(&'static str, String)>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(options: ClientOptions) -> Result<Self, DeployerError> {
        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            base_url: options.base_url.trim_end_matches('/').to_string(),
            bearer: options.bearer,
            headers: options.headers,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, DeployerError> {
        let response = self.send::<()>(Method::GET, path, None).await?;
        Ok(response.json().await?)
    }

    /// Make a GET request, mapping 404 to `None`
    pub async fn get_optional<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<Option<T>, DeployerError> {
        match self.send::<()>(Method::GET, path, None).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(DeployerError::Status { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DeployerError> {
        let response = self.send(Method::POST, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// Make a POST request and ignore the response body
    pub async fn post_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), DeployerError> {
        self.send(Method::POST, path, Some(body)).await?;
        Ok(())
    }

    /// Make a PUT request
    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, DeployerError> {
        let response = self.send(Method::PUT, path, Some(body)).await?;
        Ok(response.json().await?)
    }

    /// Make a PUT request and ignore the response body
    pub async fn put_unit<B: Serialize>(&self, path: &str, body: &B) -> Result<(), DeployerError> {
        self.send(Method::PUT, path, Some(body)).await?;
        Ok(())
    }

    /// GET an absolute URL without credentials and return the status code
    pub async fn probe(&self, url: &str) -> Result<u16, DeployerError> {
        let response = self.client.get(url).send().await?;
        Ok(response.status().as_u16())
    }

    async fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response, DeployerError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.client.request(method.clone(), &url);
        if let Some(token) = &self.bearer {
            request = request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            );
        }
        for (name, value) in &self.headers {
            request = request.header(*name, value);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            // 4xx is routine for existence checks and idempotent creates
            if status >= 500 {
                error!("HTTP {} {} failed: {} - {}", method, url, status, body);
            } else {
                debug!("HTTP {} {} returned {}", method, url, status);
            }
            return Err(DeployerError::Status { status, body });
        }

        Ok(response)
    }
}
