use std::{collections::HashMap, time::Instant};

use tokio::sync::Mutex;

use crate::domain::{ChannelId, GuildId, UserId};

/// The kind of input the verification conversation expects next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Year,
    Name,
    Room,
    Usn,
}

/// One member's progress through the verification conversation.
///
/// Fields are bound progressively and are only ever cleared by a full
/// restart. A session is addressable exclusively through its bound thread.
#[derive(Clone, Debug)]
pub struct VerificationSession {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub thread_id: ChannelId,
    pub step: Step,
    /// Creation or last restart; the timeout window is absolute from here,
    /// not sliding.
    pub started_at: Instant,
    pub year: Option<String>,
    pub name: Option<String>,
    pub room: Option<String>,
    pub usn: Option<String>,
}

impl VerificationSession {
    pub fn new(user_id: UserId, guild_id: GuildId, thread_id: ChannelId, now: Instant) -> Self {
        Self {
            user_id,
            guild_id,
            thread_id,
            step: Step::Year,
            started_at: now,
            year: None,
            name: None,
            room: None,
            usn: None,
        }
    }

    /// Back to the first step with all collected fields cleared.
    pub fn restart(&mut self, now: Instant) {
        *self = Self::new(self.user_id, self.guild_id, self.thread_id, now);
    }
}

/// In-memory session store; sole owner of session lifecycle.
///
/// No iteration, no capacity bound, no persistence. There is deliberately
/// no atomic check-and-set: two events racing on the same user can both
/// observe "no session" before either write lands. Handlers keep that
/// window small and `insert_new` makes duplicate creation idempotent.
#[derive(Default)]
pub struct SessionStore {
    inner: Mutex<HashMap<UserId, VerificationSession>>,
}

impl SessionStore {
    pub async fn get(&self, user: UserId) -> Option<VerificationSession> {
        self.inner.lock().await.get(&user).cloned()
    }

    pub async fn contains(&self, user: UserId) -> bool {
        self.inner.lock().await.contains_key(&user)
    }

    /// Unconditional write; used to persist a transition.
    pub async fn put(&self, session: VerificationSession) {
        self.inner.lock().await.insert(session.user_id, session);
    }

    /// Presence-checked create. Returns `false` (store untouched) when the
    /// user already has a session.
    pub async fn insert_new(&self, session: VerificationSession) -> bool {
        let mut map = self.inner.lock().await;
        if map.contains_key(&session.user_id) {
            return false;
        }
        map.insert(session.user_id, session);
        true
    }

    pub async fn remove(&self, user: UserId) {
        self.inner.lock().await.remove(&user);
    }

    /// Number of live sessions (expired ones included; expiry is lazy).
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
