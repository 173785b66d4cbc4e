//! Moderation commands: parsing, authorization tiers, and execution.
//!
//! Handlers are stateless one-shots against the platform gateway. Every
//! external call is attempted once; failures of the action itself and of
//! its audit trail are swallowed independently.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use chrono::Utc;

use crate::{
    audit::{AuditEntry, AuditLogger, ChannelLog},
    config::Config,
    domain::{ChannelId, MessageId, UserId},
    events::MessageEvent,
    flow::VERIFY_BUTTON_ID,
    gateway::{ChatGateway, MessageMeta},
    session::SessionStore,
};

/// Discord rejects nicknames longer than 32 characters.
const NICK_MAX_CHARS: usize = 32;

/// Discord refuses to bulk-delete messages older than 14 days.
const BULK_DELETE_WINDOW_DAYS: i64 = 14;

/// Ordered authorization tiers. A higher tier includes every capability of
/// the tiers below it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RoleTier {
    Moderator,
    Manager,
    Admin,
}

impl RoleTier {
    pub fn from_role_name(name: &str) -> Option<Self> {
        match name {
            "Moderator" => Some(Self::Moderator),
            "Manager" => Some(Self::Manager),
            "Admin" => Some(Self::Admin),
            _ => None,
        }
    }

    /// Highest tier among a member's role names, if any.
    pub fn highest<'a>(names: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        names.into_iter().filter_map(Self::from_role_name).max()
    }

    pub fn allows(self, required: RoleTier) -> bool {
        self >= required
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearMode {
    All,
    Count(usize),
}

/// A fully parsed moderation command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModCommand {
    Ping,
    Status,
    Panel,
    Whois { target: UserId },
    NickSet { target: UserId, nickname: String },
    NickReset { target: UserId },
    Clear(ClearMode),
    Warn { target: UserId, reason: String },
    Timeout { target: UserId, duration: Duration, reason: String },
    Kick { target: UserId, reason: String },
    Ban { target: UserId, reason: String },
}

/// Result of matching a `!`-prefixed message against the command set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandLookup {
    /// Not one of ours; may still be verification-flow input.
    Unknown,
    /// Recognized command word. `parsed` is `None` when the arguments are
    /// unusable (missing target, bad duration, bad count): a silent no-op.
    Known {
        required: RoleTier,
        parsed: Option<ModCommand>,
    },
}

/// Match a message against the command set. `mentions` are the message's
/// user mentions in order; targets are always mention-based.
pub fn lookup_command(content: &str, mentions: &[UserId]) -> CommandLookup {
    use CommandLookup::{Known, Unknown};
    use RoleTier::{Admin, Manager, Moderator};

    let Some(rest) = content.trim().strip_prefix('!') else {
        return Unknown;
    };

    let mut tokens = rest.split_whitespace();
    let word = tokens.next().unwrap_or("");
    let args: Vec<&str> = tokens.collect();
    let target = mentions.first().copied();

    match word {
        "ping" => Known {
            required: Moderator,
            parsed: Some(ModCommand::Ping),
        },
        "status" => Known {
            required: Moderator,
            parsed: Some(ModCommand::Status),
        },
        "panel" => Known {
            required: Admin,
            parsed: Some(ModCommand::Panel),
        },
        "whois" => Known {
            required: Moderator,
            parsed: target.map(|target| ModCommand::Whois { target }),
        },
        "nick" => Known {
            required: Manager,
            parsed: parse_nick(&args, target),
        },
        "clear" => Known {
            required: Moderator,
            parsed: args
                .first()
                .and_then(|a| parse_clear_arg(a))
                .map(ModCommand::Clear),
        },
        "warn" => Known {
            required: Moderator,
            parsed: target.map(|target| ModCommand::Warn {
                target,
                reason: reason_from(&args, 1),
            }),
        },
        "timeout" => Known {
            required: Moderator,
            parsed: parse_timeout(&args, target),
        },
        "kick" => Known {
            required: Manager,
            parsed: target.map(|target| ModCommand::Kick {
                target,
                reason: reason_from(&args, 1),
            }),
        },
        "ban" => Known {
            required: Moderator,
            parsed: target.map(|target| ModCommand::Ban {
                target,
                reason: reason_from(&args, 1),
            }),
        },
        _ => Unknown,
    }
}

fn parse_nick(args: &[&str], target: Option<UserId>) -> Option<ModCommand> {
    if args.first() == Some(&"reset") {
        return target.map(|target| ModCommand::NickReset { target });
    }

    let target = target?;
    let nickname = args.get(1..).unwrap_or(&[]).join(" ");
    let len = nickname.chars().count();
    if len == 0 || len > NICK_MAX_CHARS {
        return None;
    }
    Some(ModCommand::NickSet { target, nickname })
}

fn parse_timeout(args: &[&str], target: Option<UserId>) -> Option<ModCommand> {
    let target = target?;
    let duration = parse_duration(args.get(1)?)?;
    Some(ModCommand::Timeout {
        target,
        duration,
        reason: reason_from(args, 2),
    })
}

/// Everything after the first `skip` argument tokens, or `No reason`.
fn reason_from(args: &[&str], skip: usize) -> String {
    let reason = args.get(skip..).unwrap_or(&[]).join(" ");
    if reason.is_empty() {
        "No reason".to_string()
    } else {
        reason
    }
}

/// `10m` / `2h` / `1d` style duration token. Zero and unknown units are
/// rejected; the caller treats `None` as a silent no-op.
pub fn parse_duration(token: &str) -> Option<Duration> {
    if !token.is_ascii() || token.len() < 2 {
        return None;
    }
    let (value, unit) = token.split_at(token.len() - 1);
    let value: u64 = value.parse().ok()?;
    if value == 0 {
        return None;
    }
    let unit_secs = match unit {
        "m" => 60,
        "h" => 3600,
        "d" => 86400,
        _ => return None,
    };
    Some(Duration::from_secs(value * unit_secs))
}

pub fn parse_clear_arg(arg: &str) -> Option<ClearMode> {
    if arg == "all" {
        return Some(ClearMode::All);
    }
    let n: usize = arg.parse().ok()?;
    (1..=100).contains(&n).then_some(ClearMode::Count(n))
}

fn format_uptime(secs: u64) -> String {
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    if hours > 0 {
        return format!("{hours}h {mins}m");
    }
    format!("{mins}m {}s", secs % 60)
}

fn format_timeout(d: Duration) -> String {
    let secs = d.as_secs();
    if secs % 86400 == 0 {
        return format!("{}d", secs / 86400);
    }
    if secs % 3600 == 0 {
        return format!("{}h", secs / 3600);
    }
    format!("{}m", secs / 60)
}

/// Executes authorized moderation commands against the gateway.
pub struct Moderation {
    cfg: Arc<Config>,
    gateway: Arc<dyn ChatGateway>,
    log: ChannelLog,
    audit: Arc<AuditLogger>,
    store: Arc<SessionStore>,
    started: Instant,
}

impl Moderation {
    pub fn new(
        cfg: Arc<Config>,
        gateway: Arc<dyn ChatGateway>,
        audit: Arc<AuditLogger>,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            cfg,
            log: ChannelLog::new(gateway.clone()),
            gateway,
            audit,
            store,
            started: Instant::now(),
        }
    }

    /// Run one command. `invoking` is the command message itself, deleted
    /// by the commands that hide their invocation.
    pub async fn execute(&self, ev: &MessageEvent, invoking: MessageId, cmd: ModCommand) {
        let Some(guild) = ev.guild_id else {
            return;
        };
        let actor = ev.author;
        let channel = ev.channel_id;

        match cmd {
            ModCommand::Ping => {
                let _ = self.gateway.send_message(channel, "🏓 Bot is online.").await;
            }
            ModCommand::Status => {
                let text = format!(
                    "📊 Bot status\nUptime: {}\nActive verifications: {}",
                    format_uptime(self.started.elapsed().as_secs()),
                    self.store.len().await,
                );
                let _ = self.gateway.send_message(channel, &text).await;
            }
            ModCommand::Panel => {
                let _ = self
                    .gateway
                    .send_button_message(
                        channel,
                        "Click below to start verification.",
                        "Verify",
                        VERIFY_BUTTON_ID,
                    )
                    .await;
            }
            ModCommand::Whois { target } => {
                let _ = self.gateway.delete_message(channel, invoking).await;
                let nickname = self
                    .gateway
                    .member_nickname(guild, target)
                    .await
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| "None".to_string());
                let text = format!(
                    "🔍 WHOIS\nUser: {}\nID: {}\nNickname: {}",
                    target.mention(),
                    target.0,
                    nickname,
                );
                self.log.post(guild, &self.cfg.mod_commands_channel, &text).await;
                self.write_audit(AuditEntry::moderation("whois", actor, Some(target), None));
            }
            ModCommand::NickSet { target, nickname } => {
                let _ = self.gateway.delete_message(channel, invoking).await;
                let _ = self
                    .gateway
                    .set_nickname(guild, target, Some(&nickname))
                    .await;
                let text = format!(
                    "✏️ NICK SET\nUser: {}\nNew: {}\nBy: {}",
                    target.mention(),
                    nickname,
                    actor.mention(),
                );
                self.log.post(guild, &self.cfg.mod_log_channel, &text).await;
                self.write_audit(AuditEntry::moderation(
                    "nick_set",
                    actor,
                    Some(target),
                    Some(&nickname),
                ));
            }
            ModCommand::NickReset { target } => {
                let _ = self.gateway.delete_message(channel, invoking).await;
                let _ = self.gateway.set_nickname(guild, target, None).await;
                let text = format!(
                    "✏️ NICK RESET\nUser: {}\nBy: {}",
                    target.mention(),
                    actor.mention(),
                );
                self.log.post(guild, &self.cfg.mod_log_channel, &text).await;
                self.write_audit(AuditEntry::moderation("nick_reset", actor, Some(target), None));
            }
            ModCommand::Clear(mode) => {
                let _ = self.gateway.delete_message(channel, invoking).await;
                let deleted = self.clear_messages(channel, mode).await;
                let text = format!(
                    "🧹 CLEAR\nChannel: {}\nBy: {}\nCount: {}",
                    channel.mention(),
                    actor.mention(),
                    deleted,
                );
                self.log.post(guild, &self.cfg.mod_log_channel, &text).await;
                self.write_audit(AuditEntry::clear(actor, channel, deleted));
            }
            ModCommand::Warn { target, reason } => {
                let _ = self.gateway.delete_message(channel, invoking).await;
                let _ = self
                    .gateway
                    .dm_user(target, &format!("⚠️ Warning: {reason}"))
                    .await;
                let text = format!(
                    "⚠️ WARN\nUser: {}\nBy: {}\nReason: {}",
                    target.mention(),
                    actor.mention(),
                    reason,
                );
                self.log.post(guild, &self.cfg.mod_log_channel, &text).await;
                self.write_audit(AuditEntry::moderation("warn", actor, Some(target), Some(&reason)));
            }
            ModCommand::Timeout {
                target,
                duration,
                reason,
            } => {
                let _ = self.gateway.delete_message(channel, invoking).await;
                let _ = self
                    .gateway
                    .timeout_member(guild, target, duration, &reason)
                    .await;
                let text = format!(
                    "⏳ TIMEOUT\nUser: {}\nBy: {}\nDuration: {}\nReason: {}",
                    target.mention(),
                    actor.mention(),
                    format_timeout(duration),
                    reason,
                );
                self.log.post(guild, &self.cfg.mod_log_channel, &text).await;
                self.write_audit(AuditEntry::moderation("timeout", actor, Some(target), Some(&reason)));
            }
            ModCommand::Kick { target, reason } => {
                let _ = self.gateway.delete_message(channel, invoking).await;
                let _ = self.gateway.kick_member(guild, target, &reason).await;
                let text = format!(
                    "👢 KICK\nUser: {}\nBy: {}\nReason: {}",
                    target.mention(),
                    actor.mention(),
                    reason,
                );
                self.log.post(guild, &self.cfg.mod_log_channel, &text).await;
                self.write_audit(AuditEntry::moderation("kick", actor, Some(target), Some(&reason)));
            }
            ModCommand::Ban { target, reason } => {
                let _ = self.gateway.delete_message(channel, invoking).await;
                let _ = self.gateway.ban_member(guild, target, &reason).await;
                let text = format!(
                    "🚫 BAN\nUser: {}\nBy: {}\nReason: {}",
                    target.mention(),
                    actor.mention(),
                    reason,
                );
                self.log.post(guild, &self.cfg.mod_log_channel, &text).await;
                self.write_audit(AuditEntry::moderation("ban", actor, Some(target), Some(&reason)));
            }
        }
    }

    /// Delete recent messages. Count mode removes at most `n`; `all` mode
    /// paginates in batches of 100 until fewer than 2 messages come back
    /// or nothing in the batch is young enough to delete.
    async fn clear_messages(&self, channel: ChannelId, mode: ClearMode) -> usize {
        match mode {
            ClearMode::Count(n) => {
                let Ok(fetched) = self.gateway.recent_messages(channel, n as u8).await else {
                    return 0;
                };
                let young = deletable(&fetched);
                let _ = self.gateway.bulk_delete(channel, &young).await;
                young.len()
            }
            ClearMode::All => {
                let mut deleted = 0usize;
                loop {
                    let Ok(fetched) = self.gateway.recent_messages(channel, 100).await else {
                        break;
                    };
                    let young = deletable(&fetched);
                    if young.is_empty() {
                        break;
                    }
                    let _ = self.gateway.bulk_delete(channel, &young).await;
                    deleted += young.len();
                    if fetched.len() < 2 {
                        break;
                    }
                }
                deleted
            }
        }
    }

    fn write_audit(&self, entry: AuditEntry) {
        if let Err(e) = self.audit.write(entry) {
            tracing::debug!("audit write failed: {e}");
        }
    }
}

fn deletable(fetched: &[MessageMeta]) -> Vec<MessageId> {
    let cutoff = Utc::now() - chrono::Duration::days(BULK_DELETE_WINDOW_DAYS);
    fetched
        .iter()
        .filter(|m| m.sent_at > cutoff)
        .map(|m| m.id)
        .collect()
}
