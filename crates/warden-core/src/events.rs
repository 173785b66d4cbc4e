use crate::{
    domain::{ChannelId, GuildId, UserId},
    moderation::RoleTier,
};

/// Cross-platform incoming message model.
///
/// Discord-specific fields stay in the adapter; the dispatcher only sees
/// what it needs to classify the message.
#[derive(Clone, Debug)]
pub struct MessageEvent {
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub author: UserId,
    pub username: String,
    pub content: String,
    /// Mentioned users, in message order.
    pub mentions: Vec<UserId>,
    pub author_is_bot: bool,
    /// Highest moderation tier held by the author, if any. The adapter only
    /// resolves this for `!`-prefixed messages.
    pub tier: Option<RoleTier>,
    /// True when the message was sent in the configured verification
    /// channel (not one of its threads).
    pub in_verification_channel: bool,
}

/// A member joined the guild.
#[derive(Clone, Debug)]
pub struct MemberJoin {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub username: String,
}
