use std::path::PathBuf;

use anyhow::{anyhow, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
}

/// Reply to a chat message or an agent action. Older backend variants
/// answer with `reply` instead of `response`, so both are accepted.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatReply {
    #[serde(alias = "reply")]
    pub response: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One row of the task queue or task history.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskEntry {
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatusSnapshot {
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub current_task: String,
    #[serde(default = "default_live_status")]
    pub live_status: String,
    /// Recent activity lines the status endpoint carries itself; shown when
    /// the dedicated logs endpoint is unavailable.
    #[serde(default)]
    pub history: Vec<String>,
}

fn default_mode() -> String {
    "ajax".to_string()
}

fn default_live_status() -> String {
    "idle".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModeReply {
    #[serde(default = "default_mode")]
    pub mode: String,
}

/// The project list arrives either bare or wrapped in `{projects: [...]}`
/// depending on the backend variant.
#[derive(Deserialize)]
#[serde(untagged)]
enum ProjectsPayload {
    Wrapped { projects: Vec<String> },
    Bare(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectReply {
    #[serde(alias = "project")]
    pub name: String,
    #[serde(default)]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UploadReply {
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryMessage {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Deserialize)]
struct MemoryPayload {
    #[serde(default)]
    messages: Vec<MemoryMessage>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Credentials for a social platform. Token platforms (TikTok, Instagram,
/// Facebook) take a bare token; everything else a username/password pair.
#[derive(Debug, Clone)]
pub enum Credentials {
    Token(String),
    Login { username: String, password: String },
}

/// Thin wrapper over the backend REST surface. Each method is a single
/// round trip returning parsed JSON; no retries, no caching.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Option<(String, String)>,
}

impl ApiClient {
    pub fn new(base_url: &str, auth: Option<(String, String)>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.with_auth(self.client.get(format!("{}{}", self.base_url, path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.with_auth(self.client.post(format!("{}{}", self.base_url, path)))
    }

    fn with_auth(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.auth {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    /// Turn a non-OK response into an error, preferring the backend's own
    /// `{error}` message over the bare status code.
    async fn error_from(response: Response) -> anyhow::Error {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) if !body.error.is_empty() => anyhow!(body.error),
            _ => anyhow!("request failed with status {}", status),
        }
    }

    async fn expect_ok(response: Response) -> Result<Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(Self::error_from(response).await)
        }
    }

    pub async fn send_chat(&self, message: &str) -> Result<ChatReply> {
        let response = self
            .post("/api/chat")
            .json(&ChatRequest { message })
            .send()
            .await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_queue(&self) -> Result<Vec<TaskEntry>> {
        let response = self.get("/api/queue").send().await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_logs(&self) -> Result<Vec<TaskEntry>> {
        let response = self.get("/api/logs").send().await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_status(&self) -> Result<StatusSnapshot> {
        let response = self.get("/api/status").send().await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_projects(&self) -> Result<Vec<String>> {
        let response = self.get("/api/projects").send().await?;
        let response = Self::expect_ok(response).await?;
        let payload: ProjectsPayload = response.json().await?;
        Ok(match payload {
            ProjectsPayload::Wrapped { projects } => projects,
            ProjectsPayload::Bare(projects) => projects,
        })
    }

    pub async fn create_project(&self, name: &str, key: &str) -> Result<ProjectReply> {
        let response = self
            .post("/api/projects")
            .json(&serde_json::json!({ "name": name, "key": key }))
            .send()
            .await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    pub async fn fetch_memory(&self, project: &str) -> Result<Vec<MemoryMessage>> {
        let response = self
            .get(&format!("/api/memory/{}", project))
            .send()
            .await?;
        let response = Self::expect_ok(response).await?;
        let payload: MemoryPayload = response.json().await?;
        Ok(payload.messages)
    }

    pub async fn upload_files(&self, project: &str, paths: &[PathBuf]) -> Result<UploadReply> {
        let mut form = reqwest::multipart::Form::new().text("project", project.to_string());
        for path in paths {
            let bytes = tokio::fs::read(path).await?;
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("upload")
                .to_string();
            form = form.part("file", reqwest::multipart::Part::bytes(bytes).file_name(name));
        }
        let response = self
            .with_auth(
                self.client
                    .post(format!("{}{}", self.base_url, "/api/upload")),
            )
            .multipart(form)
            .send()
            .await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    pub async fn run_agent_action(
        &self,
        agent: &str,
        action: &str,
        input: Option<&str>,
    ) -> Result<ChatReply> {
        let mut body = serde_json::json!({ "agent": agent, "action": action });
        if let Some(input) = input {
            body["input"] = serde_json::Value::String(input.to_string());
        }
        let response = self.post("/api/agent/run").json(&body).send().await?;
        let response = Self::expect_ok(response).await?;
        Ok(response.json().await?)
    }

    pub async fn create_agent(&self, name: &str, role: &str, base_behavior: &str) -> Result<()> {
        let response = self
            .post("/agents/create")
            .json(&serde_json::json!({
                "name": name,
                "role": role,
                "base_behavior": base_behavior,
            }))
            .send()
            .await?;
        Self::expect_ok(response).await?;
        Ok(())
    }

    pub async fn connect_platform(
        &self,
        project: &str,
        platform: &str,
        credentials: &Credentials,
    ) -> Result<()> {
        let mut body = serde_json::json!({ "project": project, "platform": platform });
        match credentials {
            Credentials::Token(token) => {
                body["token"] = serde_json::Value::String(token.clone());
            }
            Credentials::Login { username, password } => {
                body["username"] = serde_json::Value::String(username.clone());
                body["password"] = serde_json::Value::String(password.clone());
            }
        }
        let response = self.post("/connect_platform").json(&body).send().await?;
        Self::expect_ok(response).await?;
        Ok(())
    }

    /// Flip the presence toggle. `present` means the user is at the keyboard
    /// and the agent should act as an assistant.
    pub async fn set_presence(&self, present: bool) -> Result<String> {
        let path = if present { "/api/loganin" } else { "/api/loganout" };
        let response = self.get(path).send().await?;
        let response = Self::expect_ok(response).await?;
        let reply: ModeReply = response.json().await?;
        Ok(reply.mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_reply_accepts_reply_alias() {
        let parsed: ChatReply = serde_json::from_str(r#"{"reply": "hi there"}"#).unwrap();
        assert_eq!(parsed.response, "hi there");
        assert!(parsed.timestamp.is_none());

        let parsed: ChatReply =
            serde_json::from_str(r#"{"response": "ok", "timestamp": "2024-01-01T00:00:00Z"}"#)
                .unwrap();
        assert_eq!(parsed.response, "ok");
        assert_eq!(parsed.timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));
    }

    #[test]
    fn task_entry_tolerates_missing_fields() {
        let parsed: TaskEntry = serde_json::from_str(r#"{"task": "post reel"}"#).unwrap();
        assert_eq!(parsed.task, "post reel");
        assert_eq!(parsed.timestamp, "");
        assert!(parsed.status.is_none());
    }

    #[test]
    fn status_snapshot_fills_defaults() {
        let parsed: StatusSnapshot = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.mode, "ajax");
        assert_eq!(parsed.live_status, "idle");
        assert!(parsed.current_task.is_empty());
        assert!(parsed.history.is_empty());
    }

    #[test]
    fn projects_payload_accepts_both_shapes() {
        let wrapped: ProjectsPayload =
            serde_json::from_str(r#"{"projects": ["remote100k", "app_304"]}"#).unwrap();
        let bare: ProjectsPayload = serde_json::from_str(r#"["remote100k"]"#).unwrap();
        match wrapped {
            ProjectsPayload::Wrapped { projects } => assert_eq!(projects.len(), 2),
            ProjectsPayload::Bare(_) => panic!("expected wrapped"),
        }
        match bare {
            ProjectsPayload::Bare(projects) => assert_eq!(projects, vec!["remote100k"]),
            ProjectsPayload::Wrapped { .. } => panic!("expected bare"),
        }
    }

    #[test]
    fn project_reply_accepts_project_alias() {
        let parsed: ProjectReply = serde_json::from_str(r#"{"project": "My Brand"}"#).unwrap();
        assert_eq!(parsed.name, "My Brand");
        assert!(parsed.key.is_none());
    }
}
