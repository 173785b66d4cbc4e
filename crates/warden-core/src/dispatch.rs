//! Classifies each inbound message exactly once: moderation command,
//! verification opt-in, verification-flow input, or noise.

use crate::{
    events::MessageEvent,
    moderation::{lookup_command, CommandLookup, ModCommand},
};

pub const HELP_TEXT: &str =
    "📌 **Help**\n• Verification is automatic\n• Use `restart` if stuck\n• Contact moderators if needed";

/// Where one inbound message goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Route {
    Help,
    Command(ModCommand),
    /// Opt-in trigger for the deferred verification flow.
    OptIn,
    /// Possibly flow input; the flow layer resolves it against the store.
    Flow,
    Ignore,
}

/// Classify an inbound message.
///
/// Commands are checked before flow input: a moderator can be inside a
/// thread too. A recognized command from a sender below its tier is
/// dropped outright (no error, no audit) rather than falling through to
/// the flow; unknown `!`-text still falls through, since it may be a
/// legitimate answer inside a verification thread.
pub fn classify(ev: &MessageEvent) -> Route {
    if ev.author_is_bot {
        return Route::Ignore;
    }
    let content = ev.content.trim();

    if content == "help" {
        return Route::Help;
    }

    if let CommandLookup::Known { required, parsed } = lookup_command(content, &ev.mentions) {
        let authorized = ev.tier.map(|t| t.allows(required)).unwrap_or(false);
        if !authorized {
            return Route::Ignore;
        }
        return match parsed {
            Some(cmd) => Route::Command(cmd),
            None => Route::Ignore,
        };
    }

    if ev.in_verification_channel && content.eq_ignore_ascii_case("verify") {
        return Route::OptIn;
    }

    Route::Flow
}
