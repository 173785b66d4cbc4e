//! Discord event handlers.
//!
//! Each handler converts a serenity payload into the core event model,
//! runs it through the dispatcher, and hands the result to the owning
//! core component.

use std::sync::Arc;

use serenity::model::channel::Message;
use serenity::model::prelude::Interaction;
use serenity::prelude::*;

use warden_core::{
    dispatch::{self, Route},
    domain,
    events::MessageEvent,
    moderation::RoleTier,
};

use crate::router::AppState;

mod commands;
mod verify;

pub async fn handle_message(ctx: Context, msg: Message, state: Arc<AppState>) {
    let content = msg.content.trim();

    // Tier resolution costs a roles fetch; only command-shaped messages
    // need it. Same for the verification-channel check on opt-ins.
    let tier = if content.starts_with('!') {
        resolve_tier(&ctx, &msg).await
    } else {
        None
    };
    let in_verification_channel = if content.eq_ignore_ascii_case("verify") {
        in_verification_channel(&msg, &state).await
    } else {
        false
    };

    let ev = MessageEvent {
        guild_id: msg.guild_id.map(|g| domain::GuildId(g.get())),
        channel_id: domain::ChannelId(msg.channel_id.get()),
        author: domain::UserId(msg.author.id.get()),
        username: msg.author.name.clone(),
        content: msg.content.clone(),
        mentions: msg
            .mentions
            .iter()
            .map(|u| domain::UserId(u.id.get()))
            .collect(),
        author_is_bot: msg.author.bot,
        tier,
        in_verification_channel,
    };
    let invoking = domain::MessageId(msg.id.get());

    match dispatch::classify(&ev) {
        Route::Ignore => {}
        Route::Help => {
            let _ = state
                .gateway
                .send_message(ev.channel_id, dispatch::HELP_TEXT)
                .await;
        }
        Route::Command(cmd) => commands::run(&ev, invoking, cmd, &state).await,
        Route::OptIn => verify::opt_in(&ev, &state),
        Route::Flow => verify::flow_input(&ev, invoking, &state).await,
    }
}

pub async fn handle_interaction(ctx: Context, interaction: Interaction, state: Arc<AppState>) {
    let Interaction::Component(component) = interaction else {
        return;
    };
    verify::button_press(&ctx, &component, &state).await;
}

/// Highest moderation tier of the message author, from their role names.
async fn resolve_tier(ctx: &Context, msg: &Message) -> Option<RoleTier> {
    let guild_id = msg.guild_id?;
    let member = msg.member.as_ref()?;

    let all_roles = guild_id.roles(&ctx.http).await.ok()?;
    let names: Vec<&str> = member
        .roles
        .iter()
        .filter_map(|id| all_roles.get(id).map(|r| r.name.as_str()))
        .collect();
    RoleTier::highest(names)
}

async fn in_verification_channel(msg: &Message, state: &AppState) -> bool {
    let Some(guild_id) = msg.guild_id else {
        return false;
    };
    let lookup = state
        .gateway
        .channel_named(
            domain::GuildId(guild_id.get()),
            &state.cfg.verification_channel,
        )
        .await;
    matches!(lookup, Ok(Some(id)) if id.0 == msg.channel_id.get())
}
