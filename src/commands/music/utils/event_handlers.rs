use poise::serenity_prelude as serenity;
use serenity::async_trait;
use songbird::tracks::PlayMode;
use songbird::{Event, EventContext};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use super::wake_signal::{CompletionHook, WakeSignal};

/// Event handler for when a song ends, whether it finished, failed or was stopped
pub struct SongEndNotifier {
    pub guild_id: serenity::GuildId,
    pub hook: CompletionHook,
}

#[async_trait]
impl songbird::EventHandler for SongEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            let error = tracks.iter().find_map(|(state, _)| match &state.playing {
                PlayMode::Errored(e) => Some(format!("{:?}", e)),
                _ => None,
            });
            info!(
                "Track '{}' ended for guild {} (error: {})",
                self.hook.title(),
                self.guild_id,
                error.is_some()
            );
            self.hook.complete(error);
        }
        None
    }
}

/// Tracks whether the voice driver currently holds a connection
pub struct DriverStateNotifier {
    pub guild_id: serenity::GuildId,
    pub connected: Arc<AtomicBool>,
    pub signal: Arc<WakeSignal>,
}

#[async_trait]
impl songbird::EventHandler for DriverStateNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        match ctx {
            EventContext::DriverDisconnect(data) => {
                warn!(
                    "Voice driver disconnected in guild {}: {:?}",
                    self.guild_id, data.reason
                );
                self.connected.store(false, Ordering::SeqCst);
                self.signal.set();
            }
            EventContext::DriverReconnect(_) => {
                info!("Voice driver reconnected in guild {}", self.guild_id);
                self.connected.store(true, Ordering::SeqCst);
            }
            _ => {}
        }
        None
    }
}
