use std::{
    fs::OpenOptions,
    io::Write,
    path::PathBuf,
    sync::Arc,
};

use chrono::Utc;
use serde::Serialize;

use crate::{
    domain::{ChannelId, GuildId, UserId},
    gateway::ChatGateway,
    Result,
};

/// One audit record: a moderation action or a completed verification.
///
/// Rendered as a JSON line or a plain line depending on configuration.
#[derive(Clone, Debug, Serialize)]
pub struct AuditEntry {
    pub timestamp: String,
    pub action: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

impl AuditEntry {
    pub fn moderation(action: &str, actor: UserId, target: Option<UserId>, detail: Option<&str>) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            action: action.to_string(),
            actor: Some(actor.0),
            target: target.map(|t| t.0),
            detail: detail.map(|s| s.to_string()),
            count: None,
        }
    }

    pub fn clear(actor: UserId, channel: ChannelId, deleted: usize) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            action: "clear".to_string(),
            actor: Some(actor.0),
            target: None,
            detail: Some(format!("channel {}", channel.0)),
            count: Some(deleted),
        }
    }

    pub fn verified(user: UserId, year: &str, name: &str, room: &str, usn: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            action: "verified".to_string(),
            actor: None,
            target: Some(user.0),
            detail: Some(format!("year={year} name={name} room={room} usn={usn}")),
            count: None,
        }
    }

    fn render_line(&self) -> String {
        let mut line = format!("[{}] {}", self.timestamp, self.action.to_uppercase());
        if let Some(actor) = self.actor {
            line.push_str(&format!(" actor={actor}"));
        }
        if let Some(target) = self.target {
            line.push_str(&format!(" target={target}"));
        }
        if let Some(count) = self.count {
            line.push_str(&format!(" count={count}"));
        }
        if let Some(detail) = &self.detail {
            line.push_str(&format!(" {detail}"));
        }
        line
    }
}

/// Append-only local audit file.
///
/// Writes are fire-and-forget at call sites: a failed audit write never
/// blocks or fails the user-facing action.
#[derive(Clone, Debug)]
pub struct AuditLogger {
    path: PathBuf,
    json: bool,
}

impl AuditLogger {
    pub fn new(path: impl Into<PathBuf>, json: bool) -> Self {
        Self {
            path: path.into(),
            json,
        }
    }

    pub fn write(&self, entry: AuditEntry) -> Result<()> {
        let line = if self.json {
            serde_json::to_string(&entry)?
        } else {
            entry.render_line()
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

/// Posts audit lines to the guild's named log channels.
///
/// Failures are logged and dropped: log channels are an external
/// collaborator, not a dependency of the action being logged.
#[derive(Clone)]
pub struct ChannelLog {
    gateway: Arc<dyn ChatGateway>,
}

impl ChannelLog {
    pub fn new(gateway: Arc<dyn ChatGateway>) -> Self {
        Self { gateway }
    }

    pub async fn post(&self, guild: GuildId, channel_name: &str, text: &str) {
        match self.gateway.channel_named(guild, channel_name).await {
            Ok(Some(channel)) => {
                if let Err(e) = self.gateway.send_message(channel, text).await {
                    tracing::debug!("audit post to #{channel_name} failed: {e}");
                }
            }
            Ok(None) => tracing::debug!("audit channel #{channel_name} not found"),
            Err(e) => tracing::debug!("audit channel #{channel_name} lookup failed: {e}"),
        }
    }
}
