//! Operator notification channel
//!
//! Outbound: structured alerts rendered as plain text.
//! Inbound: messages posted after the last key alert, scanned for a new key.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;

pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    SessionStarted {
        summary: String,
    },
    KeyExhausted {
        matches_collected: u64,
        runtime: Duration,
        since_last_reduce: Option<Duration>,
    },
    KeyReplaced {
        masked_key: String,
    },
    CandidateRejected {
        masked_key: String,
        reason: String,
    },
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}

impl Notification {
    pub fn render(&self) -> String {
        match self {
            Notification::SessionStarted { summary } => {
                format!("🚀 **Harvester session started**\n{}", summary)
            }
            Notification::KeyExhausted {
                matches_collected,
                runtime,
                since_last_reduce,
            } => format!(
                "🔑 **API key expired or rejected**\n\
                 Matches collected: {}\n\
                 Runtime: {}\n\
                 Since last reduce: {}\n\
                 Reply in this channel with a new key to resume.",
                matches_collected,
                format_duration(*runtime),
                since_last_reduce.map_or("never".to_string(), format_duration)
            ),
            Notification::KeyReplaced { masked_key } => {
                format!("✅ **New key accepted** ({}), crawling resumed", masked_key)
            }
            Notification::CandidateRejected { masked_key, reason } => {
                format!("❌ Key {} not accepted: {}", masked_key, reason)
            }
        }
    }
}

#[derive(Debug)]
pub enum ChannelError {
    Http(String),
    Status(u16),
    Decode(String),
}

impl std::fmt::Display for ChannelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelError::Http(e) => write!(f, "Channel request failed: {}", e),
            ChannelError::Status(s) => write!(f, "Channel returned HTTP {}", s),
            ChannelError::Decode(e) => write!(f, "Channel response unreadable: {}", e),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChannelError::Decode(err.to_string())
        } else {
            ChannelError::Http(err.to_string())
        }
    }
}

#[async_trait]
pub trait OperatorChannel: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError>;

    /// Messages posted since the previous poll (or the last key alert), oldest first
    async fn poll_messages(&self) -> Result<Vec<String>, ChannelError>;
}

#[derive(Debug, Deserialize)]
struct DiscordAuthor {
    #[serde(default)]
    bot: bool,
}

#[derive(Debug, Deserialize)]
struct DiscordMessage {
    id: String,
    #[serde(default)]
    content: String,
    author: DiscordAuthor,
}

#[derive(Serialize)]
struct CreateMessage<'a> {
    content: &'a str,
}

/// Compare snowflakes numerically; they are decimal strings of varying length
fn snowflake(id: &str) -> u64 {
    id.parse().unwrap_or(0)
}

pub struct DiscordChannel {
    http: Client,
    token: String,
    channel_id: String,
    base_url: String,
    last_seen: Mutex<Option<String>>,
}

impl DiscordChannel {
    pub fn new(token: impl Into<String>, channel_id: impl Into<String>) -> Result<Self, ChannelError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| ChannelError::Http(e.to_string()))?;

        Ok(Self {
            http,
            token: token.into(),
            channel_id: channel_id.into(),
            base_url: DISCORD_API_BASE.to_string(),
            last_seen: Mutex::new(None),
        })
    }

    fn messages_url(&self) -> String {
        format!("{}/channels/{}/messages", self.base_url, self.channel_id)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }
}

#[async_trait]
impl OperatorChannel for DiscordChannel {
    async fn send(&self, notification: &Notification) -> Result<(), ChannelError> {
        let content = notification.render();
        let response = self
            .http
            .post(self.messages_url())
            .header("Authorization", self.auth())
            .json(&CreateMessage { content: &content })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ChannelError::Status(response.status().as_u16()));
        }

        // Replies are scanned from the latest key alert on; other posts,
        // rejection notices included, leave the poll cursor alone
        if matches!(notification, Notification::KeyExhausted { .. }) {
            let posted: DiscordMessage = response.json().await?;
            let mut last_seen = self.last_seen.lock().await;
            if last_seen.as_deref().map_or(true, |seen| snowflake(&posted.id) > snowflake(seen)) {
                *last_seen = Some(posted.id);
            }
        }
        Ok(())
    }

    async fn poll_messages(&self) -> Result<Vec<String>, ChannelError> {
        let mut last_seen = self.last_seen.lock().await;

        let mut request = self
            .http
            .get(self.messages_url())
            .header("Authorization", self.auth())
            .query(&[("limit", "50")]);
        if let Some(after) = last_seen.as_deref() {
            request = request.query(&[("after", after)]);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ChannelError::Status(response.status().as_u16()));
        }

        // Discord returns newest first
        let mut messages: Vec<DiscordMessage> = response.json().await?;
        messages.sort_by_key(|m| snowflake(&m.id));

        if let Some(newest) = messages.last() {
            *last_seen = Some(newest.id.clone());
        }

        Ok(messages
            .into_iter()
            .filter(|m| !m.author.bot)
            .map(|m| m.content)
            .collect())
    }
}
