//! Drives verification sessions: thread creation, step replies, and
//! finalization. All state lives in the [`SessionStore`]; all platform
//! effects go through the [`ChatGateway`] port.

use std::{sync::Arc, time::Instant};

use rand::Rng;

use crate::{
    audit::{AuditEntry, AuditLogger, ChannelLog},
    config::Config,
    domain::{ChannelId, GuildId, MessageId, UserId},
    events::{MemberJoin, MessageEvent},
    gateway::ChatGateway,
    machine::{self, Advance, CompletedVerification},
    session::{SessionStore, VerificationSession},
};

/// Custom id carried by the opt-in verification button.
pub const VERIFY_BUTTON_ID: &str = "verify-start";

#[derive(Clone)]
pub struct VerificationFlow {
    cfg: Arc<Config>,
    store: Arc<SessionStore>,
    gateway: Arc<dyn ChatGateway>,
    log: ChannelLog,
    audit: Arc<AuditLogger>,
}

fn welcome(user: UserId) -> String {
    format!(
        "👋 Welcome {}\n\nType:\n1 → 1st Year\n2 → 2nd Year\n3 → 3rd Year\n4 → 4th Year\n\nType **restart** anytime.",
        user.mention()
    )
}

impl VerificationFlow {
    pub fn new(
        cfg: Arc<Config>,
        store: Arc<SessionStore>,
        gateway: Arc<dyn ChatGateway>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        Self {
            cfg,
            store,
            log: ChannelLog::new(gateway.clone()),
            gateway,
            audit,
        }
    }

    /// Eager flow: gate a fresh member behind a verification thread.
    pub async fn begin_on_join(&self, join: &MemberJoin) {
        self.start_session(join.guild_id, join.user_id, &join.username)
            .await;
    }

    /// Deferred flow: opt-in via button or command. The thread is created
    /// after a short delay; the timer is never cancelled, a presence check
    /// at fire time is the only suppression.
    pub fn begin_deferred(&self, guild: GuildId, user: UserId, username: String) {
        let flow = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(flow.cfg.optin_start_delay).await;
            if flow.store.contains(user).await {
                return;
            }
            flow.start_session(guild, user, &username).await;
        });
    }

    /// Create the private thread and seed the session. Idempotent per user:
    /// an existing session means no new thread. Two events racing past the
    /// presence check can still both create a thread; `insert_new` then
    /// keeps only the first session, which is the accepted outcome.
    async fn start_session(&self, guild: GuildId, user: UserId, username: &str) {
        if self.store.contains(user).await {
            return;
        }

        let Ok(Some(unverified)) = self.gateway.role_named(guild, &self.cfg.unverified_role).await
        else {
            return;
        };
        let Ok(Some(parent)) = self
            .gateway
            .channel_named(guild, &self.cfg.verification_channel)
            .await
        else {
            return;
        };

        let _ = self.gateway.add_role(guild, user, unverified).await;

        let thread = match self
            .gateway
            .create_private_thread(parent, &format!("verify-{username}"))
            .await
        {
            Ok(thread) => thread,
            Err(e) => {
                tracing::warn!("verification thread for {username} failed: {e}");
                return;
            }
        };
        let _ = self.gateway.add_thread_member(thread, user).await;
        let _ = self.gateway.send_message(thread, &welcome(user)).await;

        let session = VerificationSession::new(user, guild, thread, Instant::now());
        if !self.store.insert_new(session).await {
            tracing::debug!("lost session-create race for user {}", user.0);
        }
    }

    /// Feed one message into the author's session, if any. Input from a
    /// user with no session, or outside the bound thread, is inert.
    pub async fn handle_flow_input(&self, ev: &MessageEvent, message_id: MessageId) {
        let Some(mut session) = self.store.get(ev.author).await else {
            return;
        };
        if session.thread_id != ev.channel_id {
            return;
        }
        let thread = session.thread_id;

        match machine::advance(
            &mut session,
            &ev.content,
            Instant::now(),
            self.cfg.verify_timeout,
        ) {
            Advance::TimedOut(reply) => {
                let _ = self.gateway.send_message(thread, &reply).await;
            }
            Advance::Restarted(reply) => {
                self.store.put(session).await;
                let _ = self.gateway.send_message(thread, &reply).await;
            }
            Advance::Reply(reply) => {
                let _ = self.gateway.delete_message(thread, message_id).await;
                self.store.put(session).await;
                let _ = self.gateway.send_message(thread, &reply).await;
            }
            Advance::Complete(done) => {
                let _ = self.gateway.delete_message(thread, message_id).await;
                self.finalize(done).await;
            }
        }
    }

    /// Runs exactly once per successful verification: roles, nickname,
    /// audit record, confirmation, session removal, thread cleanup.
    async fn finalize(&self, done: CompletedVerification) {
        let CompletedVerification {
            user_id,
            guild_id,
            thread_id,
            year,
            name,
            room,
            usn,
        } = done;

        if let Ok(Some(role)) = self.gateway.role_named(guild_id, &year).await {
            let _ = self.gateway.add_role(guild_id, user_id, role).await;
        }
        if let Ok(Some(role)) = self.gateway.role_named(guild_id, &self.cfg.verified_role).await {
            let _ = self.gateway.add_role(guild_id, user_id, role).await;
        }
        if let Ok(Some(role)) = self
            .gateway
            .role_named(guild_id, &self.cfg.unverified_role)
            .await
        {
            let _ = self.gateway.remove_role(guild_id, user_id, role).await;
        }

        let nickname = generated_nickname(&year);
        let _ = self
            .gateway
            .set_nickname(guild_id, user_id, Some(&nickname))
            .await;

        let record = format!(
            "📝 VERIFIED\nUser: {}\nYear: {}\nName: {}\nRoom: {}\nUSN: {}",
            user_id.mention(),
            year,
            name,
            room,
            usn,
        );
        self.log
            .post(guild_id, &self.cfg.verify_log_channel, &record)
            .await;
        if let Err(e) = self
            .audit
            .write(AuditEntry::verified(user_id, &year, &name, &room, &usn))
        {
            tracing::debug!("audit write failed: {e}");
        }

        let _ = self
            .gateway
            .send_message(thread_id, "✅ Verified. Closing this thread…")
            .await;
        self.store.remove(user_id).await;
        self.schedule_cleanup(thread_id);
    }

    /// Best-effort thread teardown after fixed delays; failures swallowed.
    fn schedule_cleanup(&self, thread: ChannelId) {
        let gateway = self.gateway.clone();
        let archive_delay = self.cfg.thread_archive_delay;
        let delete_delay = self.cfg.thread_delete_delay;
        tokio::spawn(async move {
            tokio::time::sleep(archive_delay).await;
            let _ = gateway.archive_thread(thread).await;
            tokio::time::sleep(delete_delay).await;
            let _ = gateway.delete_channel(thread).await;
        });
    }
}

/// `2nd Year` → `2Y-4817`: year digit plus a random four-digit suffix.
fn generated_nickname(year: &str) -> String {
    let digit = year.chars().next().unwrap_or('0');
    let suffix: u32 = rand::thread_rng().gen_range(1000..=9999);
    format!("{digit}Y-{suffix}")
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::domain::RoleId;
    use crate::gateway::testing::FakeGateway;
    use crate::machine::{PROMPT_NAME, PROMPT_TIMED_OUT};
    use crate::session::Step;

    const GUILD: GuildId = GuildId(1);
    const USER: UserId = UserId(7);

    fn test_config() -> Arc<Config> {
        Arc::new(Config {
            discord_token: "x".to_string(),
            http_port: 0,
            verify_timeout: Duration::from_secs(300),
            optin_start_delay: Duration::from_millis(0),
            thread_archive_delay: Duration::from_millis(0),
            thread_delete_delay: Duration::from_millis(0),
            verification_channel: "verification".to_string(),
            verified_role: "Verified".to_string(),
            unverified_role: "Unverified".to_string(),
            mod_log_channel: "moderation-logs".to_string(),
            verify_log_channel: "verification-logs".to_string(),
            mod_commands_channel: "mod-commands".to_string(),
            audit_log_path: std::env::temp_dir()
                .join(format!("warden-flow-audit-{}.log", std::process::id())),
            audit_log_json: false,
        })
    }

    fn seeded_gateway() -> Arc<FakeGateway> {
        let gateway = Arc::new(FakeGateway::new());
        gateway.seed_role("Unverified", RoleId(10));
        gateway.seed_role("Verified", RoleId(11));
        gateway.seed_role("1st Year", RoleId(21));
        gateway.seed_role("2nd Year", RoleId(22));
        gateway.seed_channel("verification", ChannelId(100));
        gateway.seed_channel("verification-logs", ChannelId(101));
        gateway
    }

    fn flow_with(gateway: Arc<FakeGateway>) -> Arc<VerificationFlow> {
        let cfg = test_config();
        let audit = Arc::new(AuditLogger::new(cfg.audit_log_path.clone(), false));
        Arc::new(VerificationFlow::new(
            cfg,
            Arc::new(SessionStore::default()),
            gateway,
            audit,
        ))
    }

    fn thread_message(content: &str, channel: ChannelId) -> MessageEvent {
        MessageEvent {
            guild_id: Some(GUILD),
            channel_id: channel,
            author: USER,
            username: "jane".to_string(),
            content: content.to_string(),
            mentions: vec![],
            author_is_bot: false,
            tier: None,
            in_verification_channel: false,
        }
    }

    fn join() -> MemberJoin {
        MemberJoin {
            guild_id: GUILD,
            user_id: USER,
            username: "jane".to_string(),
        }
    }

    #[tokio::test]
    async fn join_to_finalization_end_to_end() {
        let gateway = seeded_gateway();
        let flow = flow_with(gateway.clone());

        flow.begin_on_join(&join()).await;

        let session = flow.store.get(USER).await.expect("session created");
        assert_eq!(session.step, Step::Year);
        let thread = session.thread_id;
        assert_eq!(gateway.threads.lock().unwrap().len(), 1);
        assert_eq!(
            gateway.threads.lock().unwrap()[0],
            (ChannelId(100), "verify-jane".to_string())
        );
        assert!(gateway
            .roles_added
            .lock()
            .unwrap()
            .contains(&(USER, RoleId(10))));
        assert!(gateway
            .thread_members
            .lock()
            .unwrap()
            .contains(&(thread, USER)));

        for (input, expected_step) in [
            ("2", Step::Name),
            ("Jane Doe", Step::Room),
            ("B-204", Step::Usn),
        ] {
            flow.handle_flow_input(&thread_message(input, thread), MessageId(50))
                .await;
            assert_eq!(flow.store.get(USER).await.unwrap().step, expected_step);
        }

        flow.handle_flow_input(&thread_message("1rv20cs001", thread), MessageId(51))
            .await;

        // Session gone, roles swapped, nickname generated from the year.
        assert!(flow.store.get(USER).await.is_none());
        let roles_added = gateway.roles_added.lock().unwrap().clone();
        assert!(roles_added.contains(&(USER, RoleId(22))));
        assert!(roles_added.contains(&(USER, RoleId(11))));
        assert!(gateway
            .roles_removed
            .lock()
            .unwrap()
            .contains(&(USER, RoleId(10))));

        let nicknames = gateway.nicknames.lock().unwrap();
        let nick = nicknames[0].1.as_deref().unwrap();
        assert!(nick.starts_with("2Y-") && nick.len() == 7, "got {nick}");

        let log = gateway.sent_to(ChannelId(101));
        assert_eq!(log.len(), 1);
        assert!(log[0].contains("USN: 1rv20cs001"));
        assert!(log[0].contains("Year: 2nd Year"));

        // Cleanup fires with zero delays.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gateway.archived.lock().unwrap().as_slice(), &[thread]);
        assert_eq!(gateway.deleted_channels.lock().unwrap().as_slice(), &[thread]);

        // Subsequent input from this user is no-session noise.
        let sends_before = gateway.sent.lock().unwrap().len();
        flow.handle_flow_input(&thread_message("3", thread), MessageId(52))
            .await;
        assert_eq!(gateway.sent.lock().unwrap().len(), sends_before);
    }

    #[tokio::test]
    async fn input_outside_the_bound_thread_is_inert() {
        let gateway = seeded_gateway();
        let flow = flow_with(gateway.clone());
        flow.begin_on_join(&join()).await;

        let elsewhere = ChannelId(999);
        flow.handle_flow_input(&thread_message("2", elsewhere), MessageId(50))
            .await;

        let session = flow.store.get(USER).await.unwrap();
        assert_eq!(session.step, Step::Year);
        assert!(session.year.is_none());
    }

    #[tokio::test]
    async fn duplicate_trigger_creates_no_second_thread() {
        let gateway = seeded_gateway();
        let flow = flow_with(gateway.clone());

        flow.begin_on_join(&join()).await;
        let first = flow.store.get(USER).await.unwrap().thread_id;

        flow.begin_on_join(&join()).await;
        assert_eq!(gateway.threads.lock().unwrap().len(), 1);
        assert_eq!(flow.store.get(USER).await.unwrap().thread_id, first);
    }

    #[tokio::test]
    async fn deferred_start_is_suppressed_by_presence_check() {
        let gateway = seeded_gateway();
        let flow = flow_with(gateway.clone());
        flow.begin_on_join(&join()).await;
        assert_eq!(gateway.threads.lock().unwrap().len(), 1);

        flow.begin_deferred(GUILD, USER, "jane".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(gateway.threads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deferred_start_creates_session_when_absent() {
        let gateway = seeded_gateway();
        let flow = flow_with(gateway.clone());

        flow.begin_deferred(GUILD, USER, "jane".to_string());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(gateway.threads.lock().unwrap().len(), 1);
        assert!(flow.store.contains(USER).await);
    }

    #[tokio::test]
    async fn expired_session_gets_notice_and_stays_put() {
        let gateway = seeded_gateway();
        let flow = flow_with(gateway.clone());

        let mut session = VerificationSession::new(USER, GUILD, ChannelId(500), Instant::now());
        session.started_at = Instant::now() - Duration::from_secs(301);
        session.step = Step::Name;
        session.year = Some("2nd Year".to_string());
        flow.store.put(session).await;

        flow.handle_flow_input(&thread_message("Jane Doe", ChannelId(500)), MessageId(50))
            .await;

        let kept = flow.store.get(USER).await.unwrap();
        assert_eq!(kept.step, Step::Name);
        assert!(kept.name.is_none());
        // The input message is not deleted on the timeout path.
        assert!(gateway.deleted_messages.lock().unwrap().is_empty());
        let sent = gateway.sent_to(ChannelId(500));
        assert_eq!(sent, vec![PROMPT_TIMED_OUT.to_string()]);
    }

    #[tokio::test]
    async fn accepted_input_is_deleted_and_answered() {
        let gateway = seeded_gateway();
        let flow = flow_with(gateway.clone());
        flow.begin_on_join(&join()).await;
        let thread = flow.store.get(USER).await.unwrap().thread_id;

        flow.handle_flow_input(&thread_message("2", thread), MessageId(50))
            .await;

        assert!(gateway
            .deleted_messages
            .lock()
            .unwrap()
            .contains(&(thread, MessageId(50))));
        assert!(gateway.sent_to(thread).contains(&PROMPT_NAME.to_string()));
    }

    #[tokio::test]
    async fn missing_guild_fixtures_abort_the_start() {
        // No Unverified role, no verification channel.
        let gateway = Arc::new(FakeGateway::new());
        let flow = flow_with(gateway.clone());

        flow.begin_on_join(&join()).await;
        assert!(flow.store.get(USER).await.is_none());
        assert!(gateway.threads.lock().unwrap().is_empty());
    }
}
