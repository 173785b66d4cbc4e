//! Discord adapter (serenity).
//!
//! This crate implements the `warden-core` ChatGateway over the Discord
//! HTTP API and feeds gateway events into the core dispatcher.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serenity::builder::{
    CreateActionRow, CreateButton, CreateMessage, CreateThread, EditMember, EditThread,
    GetMessages,
};
use serenity::http::Http;
use serenity::model::application::ButtonStyle;
use serenity::model::channel::{AutoArchiveDuration, ChannelType};
use serenity::model::id::{ChannelId, GuildId, MessageId, RoleId, UserId};
use serenity::model::Timestamp;

pub mod handlers;
pub mod router;

use warden_core::{
    domain,
    errors::Error,
    gateway::{ChatGateway, MessageMeta},
    Result,
};

pub struct DiscordGateway {
    http: Arc<Http>,
}

impl DiscordGateway {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }

    fn chat(channel: domain::ChannelId) -> ChannelId {
        ChannelId::new(channel.0)
    }

    fn guild(guild: domain::GuildId) -> GuildId {
        GuildId::new(guild.0)
    }

    fn user(user: domain::UserId) -> UserId {
        UserId::new(user.0)
    }

    fn map_err(e: serenity::Error) -> Error {
        Error::Gateway(format!("discord error: {e}"))
    }
}

#[async_trait]
impl ChatGateway for DiscordGateway {
    async fn send_message(&self, channel: domain::ChannelId, text: &str) -> Result<domain::MessageId> {
        let msg = Self::chat(channel)
            .send_message(&self.http, CreateMessage::new().content(text))
            .await
            .map_err(Self::map_err)?;
        Ok(domain::MessageId(msg.id.get()))
    }

    async fn send_button_message(
        &self,
        channel: domain::ChannelId,
        text: &str,
        label: &str,
        custom_id: &str,
    ) -> Result<domain::MessageId> {
        let button = CreateButton::new(custom_id)
            .label(label)
            .style(ButtonStyle::Primary);
        let msg = Self::chat(channel)
            .send_message(
                &self.http,
                CreateMessage::new()
                    .content(text)
                    .components(vec![CreateActionRow::Buttons(vec![button])]),
            )
            .await
            .map_err(Self::map_err)?;
        Ok(domain::MessageId(msg.id.get()))
    }

    async fn dm_user(&self, user: domain::UserId, text: &str) -> Result<()> {
        let dm = Self::user(user)
            .create_dm_channel(&self.http)
            .await
            .map_err(Self::map_err)?;
        dm.id
            .send_message(&self.http, CreateMessage::new().content(text))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn create_private_thread(
        &self,
        parent: domain::ChannelId,
        name: &str,
    ) -> Result<domain::ChannelId> {
        let thread = Self::chat(parent)
            .create_thread(
                &self.http,
                CreateThread::new(name)
                    .kind(ChannelType::PrivateThread)
                    .auto_archive_duration(AutoArchiveDuration::OneHour)
                    .invitable(false),
            )
            .await
            .map_err(Self::map_err)?;
        Ok(domain::ChannelId(thread.id.get()))
    }

    async fn add_thread_member(&self, thread: domain::ChannelId, user: domain::UserId) -> Result<()> {
        self.http
            .add_thread_channel_member(Self::chat(thread), Self::user(user))
            .await
            .map_err(Self::map_err)
    }

    async fn archive_thread(&self, thread: domain::ChannelId) -> Result<()> {
        Self::chat(thread)
            .edit_thread(&self.http, EditThread::new().archived(true))
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn delete_channel(&self, channel: domain::ChannelId) -> Result<()> {
        Self::chat(channel)
            .delete(&self.http)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn add_role(
        &self,
        guild: domain::GuildId,
        user: domain::UserId,
        role: domain::RoleId,
    ) -> Result<()> {
        self.http
            .add_member_role(Self::guild(guild), Self::user(user), RoleId::new(role.0), None)
            .await
            .map_err(Self::map_err)
    }

    async fn remove_role(
        &self,
        guild: domain::GuildId,
        user: domain::UserId,
        role: domain::RoleId,
    ) -> Result<()> {
        self.http
            .remove_member_role(Self::guild(guild), Self::user(user), RoleId::new(role.0), None)
            .await
            .map_err(Self::map_err)
    }

    async fn set_nickname(
        &self,
        guild: domain::GuildId,
        user: domain::UserId,
        nick: Option<&str>,
    ) -> Result<()> {
        // An empty nickname resets back to the account name.
        Self::guild(guild)
            .edit_member(
                &self.http,
                Self::user(user),
                EditMember::new().nickname(nick.unwrap_or_default()),
            )
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn timeout_member(
        &self,
        guild: domain::GuildId,
        user: domain::UserId,
        duration: std::time::Duration,
        reason: &str,
    ) -> Result<()> {
        let until = Utc::now().timestamp() + duration.as_secs() as i64;
        let until = Timestamp::from_unix_timestamp(until)
            .map_err(|e| Error::Gateway(format!("timeout timestamp: {e}")))?;
        Self::guild(guild)
            .edit_member(
                &self.http,
                Self::user(user),
                EditMember::new()
                    .disable_communication_until(until.to_string())
                    .audit_log_reason(reason),
            )
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn kick_member(&self, guild: domain::GuildId, user: domain::UserId, reason: &str) -> Result<()> {
        Self::guild(guild)
            .kick_with_reason(&self.http, Self::user(user), reason)
            .await
            .map_err(Self::map_err)
    }

    async fn ban_member(&self, guild: domain::GuildId, user: domain::UserId, reason: &str) -> Result<()> {
        Self::guild(guild)
            .ban_with_reason(&self.http, Self::user(user), 0, reason)
            .await
            .map_err(Self::map_err)
    }

    async fn delete_message(
        &self,
        channel: domain::ChannelId,
        message: domain::MessageId,
    ) -> Result<()> {
        Self::chat(channel)
            .delete_message(&self.http, MessageId::new(message.0))
            .await
            .map_err(Self::map_err)
    }

    async fn bulk_delete(&self, channel: domain::ChannelId, messages: &[domain::MessageId]) -> Result<()> {
        match messages.len() {
            0 => Ok(()),
            // The bulk endpoint rejects single-message batches.
            1 => self.delete_message(channel, messages[0]).await,
            _ => {
                let ids: Vec<MessageId> = messages.iter().map(|m| MessageId::new(m.0)).collect();
                Self::chat(channel)
                    .delete_messages(&self.http, ids)
                    .await
                    .map_err(Self::map_err)
            }
        }
    }

    async fn recent_messages(
        &self,
        channel: domain::ChannelId,
        limit: u8,
    ) -> Result<Vec<MessageMeta>> {
        let messages = Self::chat(channel)
            .messages(&self.http, GetMessages::new().limit(limit))
            .await
            .map_err(Self::map_err)?;
        Ok(messages
            .iter()
            .map(|m| MessageMeta {
                id: domain::MessageId(m.id.get()),
                sent_at: DateTime::<Utc>::from_timestamp(m.timestamp.unix_timestamp(), 0)
                    .unwrap_or(DateTime::<Utc>::MIN_UTC),
            })
            .collect())
    }

    async fn role_named(&self, guild: domain::GuildId, name: &str) -> Result<Option<domain::RoleId>> {
        let roles = Self::guild(guild)
            .roles(&self.http)
            .await
            .map_err(Self::map_err)?;
        Ok(roles
            .values()
            .find(|r| r.name == name)
            .map(|r| domain::RoleId(r.id.get())))
    }

    async fn channel_named(
        &self,
        guild: domain::GuildId,
        name: &str,
    ) -> Result<Option<domain::ChannelId>> {
        let channels = Self::guild(guild)
            .channels(&self.http)
            .await
            .map_err(Self::map_err)?;
        Ok(channels
            .values()
            .find(|c| c.name == name)
            .map(|c| domain::ChannelId(c.id.get())))
    }

    async fn member_nickname(
        &self,
        guild: domain::GuildId,
        user: domain::UserId,
    ) -> Result<Option<String>> {
        let member = Self::guild(guild)
            .member(&self.http, Self::user(user))
            .await
            .map_err(Self::map_err)?;
        Ok(member.nick)
    }
}
