//! Messaging transport used by the playback loop.
//!
//! Every send or edit here is best effort: failures are logged and never
//! reach the loop.

use poise::serenity_prelude as serenity;
use serenity::all::{CreateMessage, EditMessage, Http};
use serenity::async_trait;
use serenity::model::id::{ChannelId, MessageId};
use std::sync::Arc;
use tracing::{debug, warn};

use super::button_controls::{ControlState, create_music_control_buttons};
use super::embedded_messages;
use crate::commands::music::audio_sources::track::Track;

/// Status messages the loop posts on its own
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    /// The queue drained after `last` completed
    Finished { last: Track },
    /// A stream ended with an error after starting
    StreamFailed { title: String, reason: String },
    /// A stream could not be started; the track was dropped
    StreamStartFailed { title: String, reason: String },
    /// The voice connection was lost; `requeued` went back to the queue front
    Disconnected { requeued: Option<String> },
    /// Nothing played for the idle timeout; the bot is leaving
    IdleLeave,
    /// The loop failed unexpectedly and the guild is being reset
    LoopFailed,
}

#[async_trait]
pub trait PlayerChannel: Send + Sync {
    async fn notify(&self, channel_id: ChannelId, notice: Notice);

    /// Post a "now playing" card carrying a fresh control view.
    async fn post_controls(
        &self,
        channel_id: ChannelId,
        track: &Track,
        state: ControlState,
    ) -> Option<MessageId>;

    /// Re-render the buttons of an existing control message in place.
    async fn edit_controls(&self, channel_id: ChannelId, message_id: MessageId, state: ControlState);
}

/// [`PlayerChannel`] backed by the Discord HTTP API
pub struct SerenityChannel {
    http: Arc<Http>,
}

impl SerenityChannel {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl PlayerChannel for SerenityChannel {
    async fn notify(&self, channel_id: ChannelId, notice: Notice) {
        let message = CreateMessage::new().embed(embedded_messages::notice(&notice));
        if let Err(e) = channel_id.send_message(&self.http, message).await {
            warn!("Failed to post {:?} in channel {}: {}", notice, channel_id, e);
        }
    }

    async fn post_controls(
        &self,
        channel_id: ChannelId,
        track: &Track,
        state: ControlState,
    ) -> Option<MessageId> {
        let message = CreateMessage::new()
            .embed(embedded_messages::now_playing(track))
            .components(create_music_control_buttons(state));

        match channel_id.send_message(&self.http, message).await {
            Ok(message) => Some(message.id),
            Err(e) => {
                warn!(
                    "Failed to post now-playing card in channel {}: {}",
                    channel_id, e
                );
                None
            }
        }
    }

    async fn edit_controls(&self, channel_id: ChannelId, message_id: MessageId, state: ControlState) {
        let edit = EditMessage::new().components(create_music_control_buttons(state));
        match channel_id.edit_message(&self.http, message_id, edit).await {
            Ok(_) => debug!("Refreshed controls on message {}", message_id),
            Err(e) => warn!(
                "Failed to refresh controls on message {} in channel {}: {}",
                message_id, channel_id, e
            ),
        }
    }
}
