use warden_core::{domain::MessageId, events::MessageEvent, moderation::ModCommand};

use crate::router::AppState;

/// The dispatcher has already authorized the sender; execution is entirely
/// the core's business.
pub async fn run(ev: &MessageEvent, invoking: MessageId, cmd: ModCommand, state: &AppState) {
    state.moderation.execute(ev, invoking, cmd).await;
}
