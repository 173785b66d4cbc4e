use serenity::builder::CreateInteractionResponse;
use serenity::model::application::ComponentInteraction;
use serenity::prelude::*;

use warden_core::{domain, events::MessageEvent, flow::VERIFY_BUTTON_ID};

use crate::router::AppState;

/// `verify` typed in the verification channel: deferred session start.
pub fn opt_in(ev: &MessageEvent, state: &AppState) {
    let Some(guild) = ev.guild_id else {
        return;
    };
    state
        .flow
        .begin_deferred(guild, ev.author, ev.username.clone());
}

/// Possible flow input; the core resolves it against the session store.
pub async fn flow_input(ev: &MessageEvent, invoking: domain::MessageId, state: &AppState) {
    state.flow.handle_flow_input(ev, invoking).await;
}

/// Click on the opt-in panel button.
pub async fn button_press(ctx: &Context, component: &ComponentInteraction, state: &AppState) {
    if component.data.custom_id != VERIFY_BUTTON_ID {
        return;
    }

    // Acknowledge before the deferred start; the thread appears later.
    let _ = component
        .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
        .await;

    let Some(guild_id) = component.guild_id else {
        return;
    };
    state.flow.begin_deferred(
        domain::GuildId(guild_id.get()),
        domain::UserId(component.user.id.get()),
        component.user.name.clone(),
    );
}
