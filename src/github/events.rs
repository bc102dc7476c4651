use serde::Deserialize;

use crate::models::{Release, Repository};

/// GitHub App installation that sent an event
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Installation {
    pub id: u64,
}

/// Payload of a `push` webhook
#[derive(Debug, Clone, Deserialize)]
pub struct PushEvent {
    #[serde(rename = "ref")]
    pub git_ref: String,
    /// SHA of the new head
    pub after: String,
    pub repository: Repository,
    #[serde(default)]
    pub installation: Option<Installation>,
}

impl PushEvent {
    /// Pushed branch name without `refs/heads/`
    pub fn branch(&self) -> &str {
        self.git_ref
            .strip_prefix("refs/heads/")
            .unwrap_or(&self.git_ref)
    }
}

/// Payload of a `release` webhook
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseEvent {
    pub action: String,
    pub release: Release,
    pub repository: Repository,
    #[serde(default)]
    pub installation: Option<Installation>,
}

impl ReleaseEvent {
    pub fn is_published(&self) -> bool {
        self.action == "published"
    }
}

/// Webhook events the service understands
#[derive(Debug, Clone)]
pub enum WebhookEvent {
    Push(PushEvent),
    Release(ReleaseEvent),
    Ping,
    Unsupported(String),
}

impl WebhookEvent {
    /// Parse a payload according to its `X-GitHub-Event` kind
    pub fn parse(kind: &str, payload: &[u8]) -> Result<Self, serde_json::Error> {
        let event = match kind {
            "push" => WebhookEvent::Push(serde_json::from_slice(payload)?),
            "release" => WebhookEvent::Release(serde_json::from_slice(payload)?),
            "ping" => WebhookEvent::Ping,
            other => WebhookEvent::Unsupported(other.to_string()),
        };
        Ok(event)
    }

    pub fn installation(&self) -> Option<&Installation> {
        match self {
            WebhookEvent::Push(e) => e.installation.as_ref(),
            WebhookEvent::Release(e) => e.installation.as_ref(),
            _ => None,
        }
    }
}
