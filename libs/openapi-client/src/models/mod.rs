//! API models

use serde::{Deserialize, Serialize};

// ================================ EVALUATION ==================================== //

/// Payload POSTed to the caller's `evaluation_url` after every round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationNotification {
    pub email: String,
    pub task: String,
    pub round: u32,
    pub nonce: String,
    /// `success` or `failure`
    pub status: String,
    /// Public hosting URL of the deployed app
    #[serde(rename = "repositoryUrl", skip_serializing_if = "Option::is_none", default)]
    pub repository_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub repo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pages_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub commit_sha: Option<String>,
    #[serde(default)]
    pub pages_ready: bool,
    #[serde(default)]
    pub checks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<NotificationError>,
}

/// Failure description inside a notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationError {
    pub kind: String,
    pub message: String,
}

// ================================ LLM BACKEND =================================== //

/// OpenAI `responses` request
#[derive(Debug, Clone, Serialize)]
pub struct ResponsesRequest<'a> {
    pub model: &'a str,
    pub input: &'a str,
}

/// OpenAI `responses` response (subset)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesResponse {
    #[serde(default)]
    pub output: Vec<ResponsesOutput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesOutput {
    #[serde(default)]
    pub content: Vec<ResponsesContent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResponsesContent {
    #[serde(default)]
    pub text: Option<String>,
}

impl ResponsesResponse {
    /// First text block of the first output item
    pub fn first_text(&self) -> Option<&str> {
        self.output
            .first()
            .and_then(|o| o.content.first())
            .and_then(|c| c.text.as_deref())
    }
}

/// Chat completions request
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub model: String,
    pub messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage<'a> {
    pub role: &'a str,
    pub content: &'a str,
}

/// Chat completions response (subset)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Content of the first choice
    pub fn first_content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

// =================================== GITHUB ===================================== //

/// A GitHub repository (subset of fields we care about)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    #[serde(default = "default_branch")]
    pub default_branch: String,
    pub owner: GitHubOwner,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubOwner {
    pub login: String,
}

fn default_branch() -> String {
    "main".to_string()
}

/// `POST /user/repos`
#[derive(Debug, Clone, Serialize)]
pub struct CreateRepoRequest<'a> {
    pub name: &'a str,
    pub description: String,
    pub private: bool,
    pub auto_init: bool,
}

/// File entry from the contents API
#[derive(Debug, Clone, Deserialize)]
pub struct ContentFile {
    pub sha: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}

/// `PUT /repos/{owner}/{repo}/contents/{path}`
#[derive(Debug, Clone, Serialize)]
pub struct PutContentRequest<'a> {
    pub message: &'a str,
    /// Base64-encoded file content
    pub content: String,
    pub branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PutContentResponse {
    pub commit: CommitRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommitRef {
    pub sha: String,
}

/// GitHub Pages site
#[derive(Debug, Clone, Deserialize)]
pub struct PagesSite {
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub source: Option<PagesSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagesSource {
    pub branch: String,
    pub path: String,
}

/// Body for creating or updating a Pages site
#[derive(Debug, Clone, Serialize)]
pub struct PagesRequest {
    pub source: PagesSource,
}
