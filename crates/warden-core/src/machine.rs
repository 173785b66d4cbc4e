//! Step-transition logic for the verification conversation.
//!
//! `advance` is a pure function over (session, input, clock): every step
//! either binds exactly one field or no-ops, so a duplicate or out-of-order
//! delivery of the same message can never corrupt more than the current
//! field. `restart` is always available as an escape hatch.

use std::{
    sync::OnceLock,
    time::{Duration, Instant},
};

use regex::Regex;

use crate::{
    domain::{ChannelId, GuildId, UserId},
    session::{Step, VerificationSession},
};

/// Outcome of feeding one input to a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    /// Conversation continues (next prompt or a re-prompt); reply in-thread.
    Reply(String),
    /// Session was reset to the first step.
    Restarted(String),
    /// Absolute window exceeded; the session was left untouched.
    TimedOut(String),
    /// Terminal: every field bound, caller runs finalization.
    Complete(CompletedVerification),
}

/// Everything finalization needs, captured at the moment the last field
/// was accepted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedVerification {
    pub user_id: UserId,
    pub guild_id: GuildId,
    pub thread_id: ChannelId,
    pub year: String,
    pub name: String,
    pub room: String,
    pub usn: String,
}

/// Year tokens accepted at the first step.
pub fn year_label(token: &str) -> Option<&'static str> {
    match token {
        "1" => Some("1st Year"),
        "2" => Some("2nd Year"),
        "3" => Some("3rd Year"),
        "4" => Some("4th Year"),
        _ => None,
    }
}

fn usn_pattern() -> &'static Regex {
    static USN: OnceLock<Regex> = OnceLock::new();
    USN.get_or_init(|| Regex::new("^[a-zA-Z0-9]+$").expect("valid regex"))
}

pub const PROMPT_YEAR_INVALID: &str = "❌ Type 1–4.";
pub const PROMPT_NAME: &str = "✍️ Enter your REAL NAME.";
pub const PROMPT_ROOM: &str = "🏠 Enter your ROOM NUMBER.";
pub const PROMPT_USN: &str = "🆔 Enter your USN (letters and numbers only).";
pub const PROMPT_USN_INVALID: &str = "❌ Invalid USN. Letters and numbers only.";
pub const PROMPT_RESTARTED: &str = "🔁 Restarted. Type 1–4.";
pub const PROMPT_TIMED_OUT: &str = "⏰ Timed out. Type `restart` to begin again.";

/// Apply one input to a session.
///
/// Evaluated before the step table, in order: the absolute timeout (no
/// mutation), then the literal `restart` token (case-insensitive).
pub fn advance(
    session: &mut VerificationSession,
    input: &str,
    now: Instant,
    timeout: Duration,
) -> Advance {
    if now.saturating_duration_since(session.started_at) > timeout {
        return Advance::TimedOut(PROMPT_TIMED_OUT.to_string());
    }

    let input = input.trim();
    if input.eq_ignore_ascii_case("restart") {
        session.restart(now);
        return Advance::Restarted(PROMPT_RESTARTED.to_string());
    }

    match session.step {
        Step::Year => match year_label(input) {
            Some(label) => {
                session.year = Some(label.to_string());
                session.step = Step::Name;
                Advance::Reply(PROMPT_NAME.to_string())
            }
            None => Advance::Reply(PROMPT_YEAR_INVALID.to_string()),
        },
        Step::Name => {
            if input.is_empty() {
                return Advance::Reply(PROMPT_NAME.to_string());
            }
            session.name = Some(input.to_string());
            session.step = Step::Room;
            Advance::Reply(PROMPT_ROOM.to_string())
        }
        Step::Room => {
            if input.is_empty() {
                return Advance::Reply(PROMPT_ROOM.to_string());
            }
            session.room = Some(input.to_string());
            session.step = Step::Usn;
            Advance::Reply(PROMPT_USN.to_string())
        }
        Step::Usn => {
            if !usn_pattern().is_match(input) {
                return Advance::Reply(PROMPT_USN_INVALID.to_string());
            }
            session.usn = Some(input.to_string());
            Advance::Complete(CompletedVerification {
                user_id: session.user_id,
                guild_id: session.guild_id,
                thread_id: session.thread_id,
                year: session.year.clone().unwrap_or_default(),
                name: session.name.clone().unwrap_or_default(),
                room: session.room.clone().unwrap_or_default(),
                usn: input.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ChannelId, GuildId, UserId};

    const TIMEOUT: Duration = Duration::from_secs(300);

    fn fresh(now: Instant) -> VerificationSession {
        VerificationSession::new(UserId(7), GuildId(1), ChannelId(42), now)
    }

    #[test]
    fn year_mapping_is_exact() {
        assert_eq!(year_label("1"), Some("1st Year"));
        assert_eq!(year_label("2"), Some("2nd Year"));
        assert_eq!(year_label("3"), Some("3rd Year"));
        assert_eq!(year_label("4"), Some("4th Year"));
        assert_eq!(year_label("5"), None);
        assert_eq!(year_label("one"), None);
        assert_eq!(year_label(""), None);
    }

    #[test]
    fn invalid_year_reprompts_without_mutation() {
        let now = Instant::now();
        let mut s = fresh(now);

        let out = advance(&mut s, "seven", now, TIMEOUT);
        assert_eq!(out, Advance::Reply(PROMPT_YEAR_INVALID.to_string()));
        assert_eq!(s.step, Step::Year);
        assert!(s.year.is_none());
    }

    #[test]
    fn steps_only_move_forward() {
        let now = Instant::now();
        let mut s = fresh(now);

        advance(&mut s, "2", now, TIMEOUT);
        assert_eq!(s.step, Step::Name);
        assert_eq!(s.year.as_deref(), Some("2nd Year"));

        advance(&mut s, "Jane Doe", now, TIMEOUT);
        assert_eq!(s.step, Step::Room);
        assert_eq!(s.name.as_deref(), Some("Jane Doe"));

        advance(&mut s, "B-204", now, TIMEOUT);
        assert_eq!(s.step, Step::Usn);
        assert_eq!(s.room.as_deref(), Some("B-204"));

        let out = advance(&mut s, "1rv20cs001", now, TIMEOUT);
        let Advance::Complete(done) = out else {
            panic!("expected completion, got {out:?}");
        };
        assert_eq!(done.year, "2nd Year");
        assert_eq!(done.name, "Jane Doe");
        assert_eq!(done.room, "B-204");
        assert_eq!(done.usn, "1rv20cs001");
    }

    #[test]
    fn usn_acceptance_is_alphanumeric_only() {
        let now = Instant::now();

        for (input, accepted) in [
            ("abc123", true),
            ("abc 123", false),
            ("", false),
            ("abc-123", false),
        ] {
            let mut s = fresh(now);
            s.step = Step::Usn;
            s.year = Some("1st Year".to_string());
            s.name = Some("x".to_string());
            s.room = Some("x".to_string());

            let out = advance(&mut s, input, now, TIMEOUT);
            match (accepted, out) {
                (true, Advance::Complete(_)) => {}
                (false, Advance::Reply(msg)) => {
                    assert_eq!(msg, PROMPT_USN_INVALID);
                    assert_eq!(s.step, Step::Usn);
                    assert!(s.usn.is_none());
                }
                (expected, got) => panic!("usn {input:?}: expected accepted={expected}, got {got:?}"),
            }
        }
    }

    #[test]
    fn restart_is_idempotent_from_every_step() {
        let base = Instant::now();
        let mut s = fresh(base);
        advance(&mut s, "3", base, TIMEOUT);
        advance(&mut s, "Jane", base, TIMEOUT);

        let t1 = base + Duration::from_secs(10);
        let out = advance(&mut s, "ReStArT", t1, TIMEOUT);
        assert_eq!(out, Advance::Restarted(PROMPT_RESTARTED.to_string()));
        assert_eq!(s.step, Step::Year);
        assert!(s.year.is_none() && s.name.is_none());
        assert_eq!(s.started_at, t1);

        let t2 = base + Duration::from_secs(20);
        let out = advance(&mut s, "restart", t2, TIMEOUT);
        assert_eq!(out, Advance::Restarted(PROMPT_RESTARTED.to_string()));
        assert_eq!(s.step, Step::Year);
        assert_eq!(s.started_at, t2);
    }

    #[test]
    fn timeout_boundary_is_exact() {
        let base = Instant::now();

        // One second past the window: rejected, untouched.
        let mut expired = fresh(base);
        let late = base + TIMEOUT + Duration::from_secs(1);
        let out = advance(&mut expired, "2", late, TIMEOUT);
        assert_eq!(out, Advance::TimedOut(PROMPT_TIMED_OUT.to_string()));
        assert_eq!(expired.step, Step::Year);
        assert!(expired.year.is_none());

        // One second inside the window: processed normally.
        let mut live = fresh(base);
        let in_time = base + TIMEOUT - Duration::from_secs(1);
        let out = advance(&mut live, "2", in_time, TIMEOUT);
        assert_eq!(out, Advance::Reply(PROMPT_NAME.to_string()));
        assert_eq!(live.step, Step::Name);
    }

    #[test]
    fn timeout_check_precedes_restart() {
        let base = Instant::now();
        let mut s = fresh(base);
        let late = base + TIMEOUT + Duration::from_secs(1);

        // Every input on an expired session gets the timeout notice,
        // the restart token included: the timeout check runs first.
        assert!(matches!(advance(&mut s, "2", late, TIMEOUT), Advance::TimedOut(_)));
        assert!(matches!(
            advance(&mut s, "restart", late, TIMEOUT),
            Advance::TimedOut(_)
        ));
        assert_eq!(s.step, Step::Year);
    }
}
