//! The per-guild playback loop.
//!
//! One task per guild drains the queue: it dequeues a track, starts the
//! stream, posts the control card and sleeps on the wake signal until the
//! stream's completion hook (or new material, or a disconnect) wakes it.

use futures::FutureExt;
use poise::serenity_prelude as serenity;
use serenity::model::id::{ChannelId, MessageId};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::button_controls::ControlState;
use super::guild_player::{ActiveStream, GuildPlayer};
use super::player_channel::Notice;
use super::voice_link::{StreamError, VoiceLink};
use super::wake_signal::{CompletionHook, StreamFailure};
use crate::commands::music::audio_sources::track::Track;

/// Why the loop ended on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The voice connection dropped; whoever observes the voice state cleans up
    Disconnected,
    /// Nothing was queued for the idle timeout
    Idle,
}

/// Run the loop and turn idle exits and panics into a guild cleanup request.
pub async fn supervise(player: Arc<GuildPlayer>) {
    let guild_id = player.guild_id;
    let outcome = AssertUnwindSafe(run(&player)).catch_unwind().await;

    let notice = match outcome {
        Ok(LoopExit::Disconnected) => {
            info!("Playback loop for guild {} ended: disconnected", guild_id);
            return;
        }
        Ok(LoopExit::Idle) => {
            info!("Playback loop for guild {} ended: idle", guild_id);
            Notice::IdleLeave
        }
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            error!("Playback loop for guild {} failed: {}", guild_id, reason);
            Notice::LoopFailed
        }
    };

    let text_channel = player.state.lock().await.text_channel;
    if let Some(channel_id) = text_channel {
        player.services.channel.notify(channel_id, notice).await;
    }
    if player.services.teardown.send(guild_id).is_err() {
        warn!("Cleanup for guild {} requested after the registry closed", guild_id);
    }
}

pub(super) async fn run(player: &Arc<GuildPlayer>) -> LoopExit {
    let guild_id = player.guild_id;
    let (failures_tx, mut failures_rx) = mpsc::unbounded_channel::<StreamFailure>();
    let mut just_finished: Option<Track> = None;

    loop {
        player.signal.clear();

        while let Ok(failure) = failures_rx.try_recv() {
            let text_channel = player.state.lock().await.text_channel;
            if let Some(channel_id) = text_channel {
                player
                    .services
                    .channel
                    .notify(
                        channel_id,
                        Notice::StreamFailed {
                            title: failure.title,
                            reason: failure.reason,
                        },
                    )
                    .await;
            }
        }

        let link = {
            let state = player.state.lock().await;
            state.link.clone().filter(|link| link.is_connected())
        };
        let Some(link) = link else {
            return disconnected(player).await;
        };

        // A stream is still running (or paused): nothing to do until it ends.
        let streaming = {
            let mut state = player.state.lock().await;
            match state.stream.as_ref().map(|stream| stream.hook.has_fired()) {
                Some(false) => true,
                Some(true) => {
                    state.stream = None;
                    just_finished = state.current.take();
                    false
                }
                None => false,
            }
        };
        if streaming {
            player.signal.wait().await;
            continue;
        }

        let next = {
            let mut state = player.state.lock().await;
            match state.queue.pop_front() {
                Some(track) => {
                    state.current = Some(track.clone());
                    state.generation += 1;
                    Some((track, state.volume, state.generation, state.text_channel))
                }
                None => None,
            }
        };

        let Some((track, volume, generation, text_channel)) = next else {
            if let Some(last) = just_finished.take() {
                finish(player, last).await;
            }
            match player.services.idle_timeout {
                Some(timeout) => {
                    if !player.signal.wait_timeout(timeout).await && is_idle(player).await {
                        return LoopExit::Idle;
                    }
                }
                None => player.signal.wait().await,
            }
            continue;
        };
        just_finished = None;

        info!("Now playing '{}' in guild {}", track.title, guild_id);
        let hook = CompletionHook::new(track.title.clone(), player.signal.clone(), failures_tx.clone());

        match start(player, &link, &track, volume, generation, hook).await {
            Ok(true) => {}
            Ok(false) => continue,
            Err(StreamError::NotConnected) => {
                let mut state = player.state.lock().await;
                if state.generation == generation {
                    state.current = None;
                    state.queue.push_front(track);
                }
                drop(state);
                return disconnected(player).await;
            }
            Err(e) => {
                warn!(
                    "Dropping '{}' in guild {}: stream failed to start: {}",
                    track.title, guild_id, e
                );
                {
                    let mut state = player.state.lock().await;
                    if state.generation == generation {
                        state.current = None;
                    }
                }
                if let Some(channel_id) = text_channel {
                    player
                        .services
                        .channel
                        .notify(
                            channel_id,
                            Notice::StreamStartFailed {
                                title: track.title.clone(),
                                reason: e.to_string(),
                            },
                        )
                        .await;
                }
                continue;
            }
        }

        if let Some(channel_id) = text_channel {
            post_control_card(player, channel_id, &track, generation).await;
        }

        player.signal.wait().await;
    }
}

/// Start the stream and record it. `Ok(false)` means a stop raced the start
/// and the new stream was discarded.
async fn start(
    player: &GuildPlayer,
    link: &Arc<dyn VoiceLink>,
    track: &Track,
    volume: f32,
    generation: u64,
    hook: CompletionHook,
) -> Result<bool, StreamError> {
    let control = link.start_stream(track, volume, hook.clone()).await?;

    let mut state = player.state.lock().await;
    if state.generation != generation {
        debug!(
            "Discarding stream for '{}' in guild {}: playback was stopped",
            track.title, player.guild_id
        );
        let _ = control.stop();
        return Ok(false);
    }
    state.stream = Some(ActiveStream {
        control,
        hook,
        paused: false,
    });
    Ok(true)
}

/// Replace the control message: retire the old view, then post a fresh card.
async fn post_control_card(
    player: &Arc<GuildPlayer>,
    channel_id: ChannelId,
    track: &Track,
    generation: u64,
) {
    let (previous, posted_state) = {
        let mut state = player.state.lock().await;
        (state.control_message.take(), state.control_state())
    };
    if let Some((old_channel, old_message)) = previous {
        player
            .services
            .channel
            .edit_controls(old_channel, old_message, ControlState::disabled())
            .await;
    }

    let Some(message_id) = player
        .services
        .channel
        .post_controls(channel_id, track, posted_state)
        .await
    else {
        return;
    };

    let current_state = {
        let mut state = player.state.lock().await;
        // A stop while posting already retired this view.
        if state.generation == generation && state.stream.is_some() {
            state.control_message = Some((channel_id, message_id));
            Some(state.control_state())
        } else {
            None
        }
    };

    match current_state {
        None => {
            player
                .services
                .channel
                .edit_controls(channel_id, message_id, ControlState::disabled())
                .await;
        }
        Some(current_state) => {
            // Refreshes during the post had no message to edit.
            if current_state != posted_state {
                player
                    .services
                    .channel
                    .edit_controls(channel_id, message_id, current_state)
                    .await;
            }
            if let Some(lifetime) = player.services.control_timeout {
                expire_after(player, (channel_id, message_id), lifetime);
            }
        }
    }
}

/// Disable `view` once `lifetime` passes, unless it was replaced first.
fn expire_after(player: &Arc<GuildPlayer>, view: (ChannelId, MessageId), lifetime: Duration) {
    let player = Arc::downgrade(player);
    tokio::spawn(async move {
        tokio::time::sleep(lifetime).await;
        if let Some(player) = player.upgrade() {
            player.expire_control(view).await;
        }
    });
}

/// The queue drained after `last` completed.
async fn finish(player: &GuildPlayer, last: Track) {
    let (text_channel, control_message) = {
        let mut state = player.state.lock().await;
        (state.text_channel, state.control_message.take())
    };
    if let Some((channel_id, message_id)) = control_message {
        player
            .services
            .channel
            .edit_controls(channel_id, message_id, ControlState::disabled())
            .await;
    }
    if let Some(channel_id) = text_channel {
        player
            .services
            .channel
            .notify(channel_id, Notice::Finished { last })
            .await;
    }
    info!("Queue finished in guild {}", player.guild_id);
}

async fn is_idle(player: &GuildPlayer) -> bool {
    let state = player.state.lock().await;
    state.queue.is_empty() && state.current.is_none() && state.stream.is_none()
}

/// The connection is gone: requeue the interrupted track and retire the view.
async fn disconnected(player: &GuildPlayer) -> LoopExit {
    let (requeued, text_channel, control_message) = {
        let mut state = player.state.lock().await;
        if let Some(stream) = state.stream.take() {
            let _ = stream.control.stop();
        }
        let requeued = state.current.take().map(|track| {
            let title = track.title.clone();
            state.queue.push_front(track);
            title
        });
        state.auto_paused = false;
        (requeued, state.text_channel, state.control_message.take())
    };

    warn!(
        "Voice connection lost in guild {}; requeued: {:?}",
        player.guild_id, requeued
    );

    if let Some((channel_id, message_id)) = control_message {
        player
            .services
            .channel
            .edit_controls(channel_id, message_id, ControlState::disabled())
            .await;
    }
    if let Some(channel_id) = text_channel {
        player
            .services
            .channel
            .notify(channel_id, Notice::Disconnected { requeued })
            .await;
    }
    LoopExit::Disconnected
}
