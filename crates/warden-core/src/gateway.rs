use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{ChannelId, GuildId, MessageId, RoleId, UserId},
    Result,
};

/// Metadata for a fetched message, enough to decide deletability.
#[derive(Clone, Copy, Debug)]
pub struct MessageMeta {
    pub id: MessageId,
    pub sent_at: DateTime<Utc>,
}

/// Hexagonal port for the chat platform.
///
/// Discord is the first implementation; every call maps to one platform
/// request and is attempted exactly once. Call sites decide whether a
/// failure is propagated or deliberately swallowed.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    async fn send_message(&self, channel: ChannelId, text: &str) -> Result<MessageId>;

    /// Send a message carrying a single action button.
    async fn send_button_message(
        &self,
        channel: ChannelId,
        text: &str,
        label: &str,
        custom_id: &str,
    ) -> Result<MessageId>;

    async fn dm_user(&self, user: UserId, text: &str) -> Result<()>;

    /// Create a non-invitable private thread under `parent`.
    async fn create_private_thread(&self, parent: ChannelId, name: &str) -> Result<ChannelId>;
    async fn add_thread_member(&self, thread: ChannelId, user: UserId) -> Result<()>;
    async fn archive_thread(&self, thread: ChannelId) -> Result<()>;
    async fn delete_channel(&self, channel: ChannelId) -> Result<()>;

    async fn add_role(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<()>;
    async fn remove_role(&self, guild: GuildId, user: UserId, role: RoleId) -> Result<()>;

    /// `None` clears the nickname back to the account name.
    async fn set_nickname(&self, guild: GuildId, user: UserId, nick: Option<&str>) -> Result<()>;

    async fn timeout_member(
        &self,
        guild: GuildId,
        user: UserId,
        duration: Duration,
        reason: &str,
    ) -> Result<()>;
    async fn kick_member(&self, guild: GuildId, user: UserId, reason: &str) -> Result<()>;
    async fn ban_member(&self, guild: GuildId, user: UserId, reason: &str) -> Result<()>;

    async fn delete_message(&self, channel: ChannelId, message: MessageId) -> Result<()>;
    async fn bulk_delete(&self, channel: ChannelId, messages: &[MessageId]) -> Result<()>;

    /// Most recent messages in a channel, newest first, at most `limit`.
    async fn recent_messages(&self, channel: ChannelId, limit: u8) -> Result<Vec<MessageMeta>>;

    async fn role_named(&self, guild: GuildId, name: &str) -> Result<Option<RoleId>>;
    async fn channel_named(&self, guild: GuildId, name: &str) -> Result<Option<ChannelId>>;
    async fn member_nickname(&self, guild: GuildId, user: UserId) -> Result<Option<String>>;
}
