use std::sync::Arc;

use serenity::async_trait;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::model::guild::Member;
use serenity::model::prelude::Interaction;
use serenity::prelude::*;

use warden_core::{
    audit::AuditLogger,
    config::Config,
    domain,
    events::MemberJoin,
    flow::VerificationFlow,
    gateway::ChatGateway,
    moderation::Moderation,
    session::SessionStore,
};

use crate::handlers;
use crate::DiscordGateway;

pub struct AppState {
    pub cfg: Arc<Config>,
    pub gateway: Arc<dyn ChatGateway>,
    pub flow: Arc<VerificationFlow>,
    pub moderation: Arc<Moderation>,
}

struct Handler {
    state: Arc<AppState>,
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        tracing::info!("logged in as {}", ready.user.name);
    }

    async fn guild_member_addition(&self, _ctx: Context, member: Member) {
        self.state
            .flow
            .begin_on_join(&MemberJoin {
                guild_id: domain::GuildId(member.guild_id.get()),
                user_id: domain::UserId(member.user.id.get()),
                username: member.user.name.clone(),
            })
            .await;
    }

    async fn message(&self, ctx: Context, msg: Message) {
        handlers::handle_message(ctx, msg, self.state.clone()).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        handlers::handle_interaction(ctx, interaction, self.state.clone()).await;
    }
}

/// Connect to Discord and dispatch events until the process exits.
pub async fn run_gateway(cfg: Arc<Config>) -> anyhow::Result<()> {
    let http = Arc::new(Http::new(&cfg.discord_token));
    let gateway: Arc<dyn ChatGateway> = Arc::new(DiscordGateway::new(http));

    let store = Arc::new(SessionStore::default());
    let audit = Arc::new(AuditLogger::new(
        cfg.audit_log_path.clone(),
        cfg.audit_log_json,
    ));
    let flow = Arc::new(VerificationFlow::new(
        cfg.clone(),
        store.clone(),
        gateway.clone(),
        audit.clone(),
    ));
    let moderation = Arc::new(Moderation::new(
        cfg.clone(),
        gateway.clone(),
        audit,
        store,
    ));

    let state = Arc::new(AppState {
        cfg: cfg.clone(),
        gateway,
        flow,
        moderation,
    });

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MEMBERS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&cfg.discord_token, intents)
        .event_handler(Handler { state })
        .await?;
    client.start().await?;

    Ok(())
}
