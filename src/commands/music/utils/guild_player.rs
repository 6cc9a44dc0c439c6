//! Per-guild playback state and the operations commands and buttons run on it.
//!
//! The queue, the current track and the active stream live behind one tokio
//! mutex. The playback loop (see [`super::playback_loop`]) only takes it to
//! dequeue or to record a started stream, never while a stream plays.

use poise::serenity_prelude as serenity;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::button_controls::{ControlAction, ControlState};
use super::music_manager::{MusicError, MusicResult};
use super::player_channel::PlayerChannel;
use super::playback_loop;
use super::voice_link::{StreamControl, VoiceConnector, VoiceLink};
use super::wake_signal::{CompletionHook, WakeSignal};
use crate::commands::music::audio_sources::track::Track;

/// How long cleanup waits for the loop task to wind down
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Collaborators shared by every guild player
#[derive(Clone)]
pub struct PlayerServices {
    pub channel: Arc<dyn PlayerChannel>,
    pub connector: Arc<dyn VoiceConnector>,
    /// Receives guild ids whose loop asked for a full cleanup
    pub teardown: mpsc::UnboundedSender<GuildId>,
    pub idle_timeout: Option<Duration>,
    /// Disable a posted card's buttons after this long
    pub control_timeout: Option<Duration>,
}

pub(super) struct ActiveStream {
    pub(super) control: Arc<dyn StreamControl>,
    pub(super) hook: CompletionHook,
    pub(super) paused: bool,
}

pub(super) struct PlayerState {
    pub(super) queue: VecDeque<Track>,
    pub(super) current: Option<Track>,
    pub(super) stream: Option<ActiveStream>,
    pub(super) link: Option<Arc<dyn VoiceLink>>,
    pub(super) volume: f32,
    pub(super) text_channel: Option<ChannelId>,
    pub(super) control_message: Option<(ChannelId, MessageId)>,
    /// Bumped on every dequeue and every stop; a stream started under an older
    /// generation is stale
    pub(super) generation: u64,
    pub(super) auto_paused: bool,
}

impl PlayerState {
    pub(super) fn control_state(&self) -> ControlState {
        ControlState {
            active: self.stream.is_some(),
            paused: self.stream.as_ref().is_some_and(|s| s.paused),
            has_next: !self.queue.is_empty(),
            disabled: false,
        }
    }
}

/// A read-only copy of the player for display
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub current: Option<Track>,
    pub paused: bool,
    pub upcoming: Vec<Track>,
    pub volume: f32,
}

/// Where newly enqueued tracks landed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueReceipt {
    /// 1-based queue position of the first added track
    pub position: usize,
    pub added: usize,
    /// Nothing was playing or waiting, so the first track starts right away
    pub starts_now: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    Moved,
    AlreadyHere,
}

/// What a control button did
#[derive(Debug, Clone, PartialEq)]
pub enum ControlOutcome {
    Paused,
    Resumed,
    Skipped(String),
    Stopped,
    Queue(PlayerSnapshot),
}

/// Require the member to share the bot's voice channel.
pub fn ensure_same_channel(
    user_channel: Option<ChannelId>,
    bot_channel: Option<ChannelId>,
) -> MusicResult<ChannelId> {
    let bot_channel = bot_channel.ok_or(MusicError::NotConnected)?;
    match user_channel {
        None => Err(MusicError::UserNotInVoiceChannel),
        Some(channel) if channel != bot_channel => Err(MusicError::NotInBotChannel(bot_channel)),
        Some(channel) => Ok(channel),
    }
}

pub struct GuildPlayer {
    pub(super) guild_id: GuildId,
    pub(super) state: Mutex<PlayerState>,
    pub(super) signal: Arc<WakeSignal>,
    pub(super) services: PlayerServices,
    /// Serializes voice joins so concurrent requests open one connection
    joining: Mutex<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl GuildPlayer {
    pub fn new(guild_id: GuildId, services: PlayerServices, volume: f32) -> Arc<Self> {
        Arc::new(Self {
            guild_id,
            state: Mutex::new(PlayerState {
                queue: VecDeque::new(),
                current: None,
                stream: None,
                link: None,
                volume,
                text_channel: None,
                control_message: None,
                generation: 0,
                auto_paused: false,
            }),
            signal: Arc::new(WakeSignal::new()),
            services,
            joining: Mutex::new(()),
            task: Mutex::new(None),
        })
    }

    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    pub async fn is_connected(&self) -> bool {
        let state = self.state.lock().await;
        state.link.as_ref().is_some_and(|link| link.is_connected())
    }

    /// The voice channel the bot sits in, if connected.
    pub async fn bot_channel(&self) -> Option<ChannelId> {
        let link = {
            let state = self.state.lock().await;
            state.link.clone().filter(|link| link.is_connected())
        }?;
        link.channel_id().await
    }

    /// Connect to `channel_id`, moving there if connected elsewhere, and make
    /// sure the loop runs. The voice handshake runs without the state lock.
    pub async fn join(self: &Arc<Self>, channel_id: ChannelId) -> MusicResult<JoinOutcome> {
        let _joining = self.joining.lock().await;
        let existing = {
            let state = self.state.lock().await;
            state.link.clone().filter(|link| link.is_connected())
        };

        let outcome = match existing {
            Some(link) if link.channel_id().await == Some(channel_id) => JoinOutcome::AlreadyHere,
            Some(link) => {
                link.move_to(channel_id)
                    .await
                    .map_err(|e| MusicError::JoinError(e.to_string()))?;
                JoinOutcome::Moved
            }
            None => {
                let link = self
                    .services
                    .connector
                    .connect(self.guild_id, channel_id, self.signal.clone())
                    .await
                    .map_err(|e| MusicError::JoinError(e.to_string()))?;
                self.state.lock().await.link = Some(link);
                JoinOutcome::Joined
            }
        };

        info!("Voice join in guild {}: {:?}", self.guild_id, outcome);
        self.ensure_loop().await;
        Ok(outcome)
    }

    /// Append tracks in order and wake the loop.
    pub async fn enqueue(
        self: &Arc<Self>,
        tracks: Vec<Track>,
        text_channel: ChannelId,
    ) -> EnqueueReceipt {
        let receipt = {
            let mut state = self.state.lock().await;
            let starts_now = state.current.is_none() && state.queue.is_empty();
            let position = state.queue.len() + 1;
            let added = tracks.len();
            state.queue.extend(tracks);
            state.text_channel = Some(text_channel);
            debug!(
                "Enqueued {} track(s) in guild {}; queue length {}",
                added,
                self.guild_id,
                state.queue.len()
            );
            EnqueueReceipt {
                position,
                added,
                starts_now,
            }
        };

        self.ensure_loop().await;
        self.signal.set();
        self.refresh_control().await;
        receipt
    }

    /// Spawn the playback loop unless one is already running.
    pub async fn ensure_loop(self: &Arc<Self>) {
        let mut task = self.task.lock().await;
        if task.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return;
        }
        debug!("Starting playback loop for guild {}", self.guild_id);
        *task = Some(tokio::spawn(playback_loop::supervise(self.clone())));
    }

    pub async fn loop_running(&self) -> bool {
        let task = self.task.lock().await;
        task.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the active stream so the loop advances. Requires a queued follow-up.
    pub async fn skip(&self) -> MusicResult<String> {
        let skipped = {
            let state = self.state.lock().await;
            let stream = state.stream.as_ref().ok_or(MusicError::NothingPlaying)?;
            if state.queue.is_empty() {
                return Err(MusicError::NothingToSkip);
            }
            stream.control.stop()?;
            state
                .current
                .as_ref()
                .map(|track| track.title.clone())
                .unwrap_or_default()
        };
        info!("Skipped '{}' in guild {}", skipped, self.guild_id);
        Ok(skipped)
    }

    /// Clear the queue and the current track, stop the stream and retire the
    /// control view. Returns whether there was anything to stop.
    pub async fn stop(&self) -> bool {
        let (had_anything, control_message) = {
            let mut state = self.state.lock().await;
            let had_anything =
                state.current.is_some() || state.stream.is_some() || !state.queue.is_empty();
            state.queue.clear();
            state.current = None;
            state.generation += 1;
            state.auto_paused = false;
            if let Some(stream) = state.stream.take() {
                if let Err(e) = stream.control.stop() {
                    warn!("Failed to stop stream in guild {}: {}", self.guild_id, e);
                }
            }
            (had_anything, state.control_message.take())
        };

        if let Some((channel_id, message_id)) = control_message {
            self.services
                .channel
                .edit_controls(channel_id, message_id, ControlState::disabled())
                .await;
        }
        info!("Stopped playback in guild {}", self.guild_id);
        had_anything
    }

    pub async fn pause(&self) -> MusicResult<String> {
        let title = {
            let mut state = self.state.lock().await;
            let title = state.current.as_ref().map(|t| t.title.clone()).unwrap_or_default();
            let stream = state.stream.as_mut().ok_or(MusicError::NothingPlaying)?;
            if stream.paused {
                return Err(MusicError::AlreadyPaused);
            }
            stream.control.pause()?;
            stream.paused = true;
            state.auto_paused = false;
            title
        };
        self.refresh_control().await;
        Ok(title)
    }

    pub async fn resume(&self) -> MusicResult<String> {
        let title = {
            let mut state = self.state.lock().await;
            let title = state.current.as_ref().map(|t| t.title.clone()).unwrap_or_default();
            let stream = state.stream.as_mut().ok_or(MusicError::NothingPlaying)?;
            if !stream.paused {
                return Err(MusicError::NotPaused);
            }
            stream.control.resume()?;
            stream.paused = false;
            state.auto_paused = false;
            title
        };
        self.refresh_control().await;
        Ok(title)
    }

    /// Returns `true` when playback is paused afterwards.
    pub async fn toggle_pause(&self) -> MusicResult<bool> {
        let paused = {
            let state = self.state.lock().await;
            state
                .stream
                .as_ref()
                .ok_or(MusicError::NothingPlaying)?
                .paused
        };
        if paused {
            self.resume().await.map(|_| false)
        } else {
            self.pause().await.map(|_| true)
        }
    }

    /// Set the gain from a 0-100 percentage. Applies to the live stream and
    /// every later track.
    pub async fn set_volume(&self, percent: u32) -> MusicResult<()> {
        if percent > 100 {
            return Err(MusicError::InvalidVolume(percent));
        }
        let volume = percent as f32 / 100.0;
        let mut state = self.state.lock().await;
        state.volume = volume;
        if let Some(stream) = &state.stream {
            stream.control.set_volume(volume)?;
        }
        info!("Volume set to {}% in guild {}", percent, self.guild_id);
        Ok(())
    }

    /// Pause because the channel emptied. Returns `true` if it paused.
    pub async fn auto_pause(&self) -> bool {
        let paused = {
            let mut state = self.state.lock().await;
            let Some(stream) = state.stream.as_mut().filter(|s| !s.paused) else {
                return false;
            };
            if let Err(e) = stream.control.pause() {
                warn!("Auto-pause failed in guild {}: {}", self.guild_id, e);
                return false;
            }
            stream.paused = true;
            state.auto_paused = true;
            true
        };
        info!("Auto-paused playback in guild {}", self.guild_id);
        self.refresh_control().await;
        paused
    }

    /// Resume a stream that [`Self::auto_pause`] paused. Manual pauses stay.
    pub async fn auto_resume(&self) -> bool {
        let resumed = {
            let mut state = self.state.lock().await;
            if !state.auto_paused {
                return false;
            }
            state.auto_paused = false;
            let Some(stream) = state.stream.as_mut().filter(|s| s.paused) else {
                return false;
            };
            if let Err(e) = stream.control.resume() {
                warn!("Auto-resume failed in guild {}: {}", self.guild_id, e);
                return false;
            }
            stream.paused = false;
            true
        };
        info!("Auto-resumed playback in guild {}", self.guild_id);
        self.refresh_control().await;
        resumed
    }

    pub async fn control_state(&self) -> ControlState {
        self.state.lock().await.control_state()
    }

    /// Re-render the live control message from the current state.
    pub async fn refresh_control(&self) {
        let (message, control_state) = {
            let state = self.state.lock().await;
            (state.control_message, state.control_state())
        };
        if let Some((channel_id, message_id)) = message {
            self.services
                .channel
                .edit_controls(channel_id, message_id, control_state)
                .await;
        }
    }

    /// Disable `view` if it is still the live control message. Returns whether
    /// it was.
    pub async fn expire_control(&self, view: (ChannelId, MessageId)) -> bool {
        let expired = {
            let mut state = self.state.lock().await;
            if state.control_message == Some(view) {
                state.control_message = None;
                true
            } else {
                false
            }
        };
        if expired {
            debug!("Control view {} expired in guild {}", view.1, self.guild_id);
            self.services
                .channel
                .edit_controls(view.0, view.1, ControlState::disabled())
                .await;
        }
        expired
    }

    pub async fn control_message(&self) -> Option<(ChannelId, MessageId)> {
        self.state.lock().await.control_message
    }

    pub async fn snapshot(&self) -> PlayerSnapshot {
        let state = self.state.lock().await;
        PlayerSnapshot {
            current: state.current.clone(),
            paused: state.stream.as_ref().is_some_and(|s| s.paused),
            upcoming: state.queue.iter().cloned().collect(),
            volume: state.volume,
        }
    }

    /// Run a control button press for a member sitting in `user_channel`.
    /// Eligibility is checked before anything is touched.
    pub async fn apply_control(
        &self,
        action: ControlAction,
        user_channel: Option<ChannelId>,
    ) -> MusicResult<ControlOutcome> {
        ensure_same_channel(user_channel, self.bot_channel().await)?;

        match action {
            ControlAction::TogglePause => Ok(if self.toggle_pause().await? {
                ControlOutcome::Paused
            } else {
                ControlOutcome::Resumed
            }),
            ControlAction::Skip => self.skip().await.map(ControlOutcome::Skipped),
            ControlAction::Stop => {
                self.stop().await;
                Ok(ControlOutcome::Stopped)
            }
            ControlAction::ShowQueue => Ok(ControlOutcome::Queue(self.snapshot().await)),
        }
    }

    /// Cancel the loop, release the voice connection and drop all state.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!(
                    "Playback loop for guild {} did not stop within {:?}",
                    self.guild_id, SHUTDOWN_GRACE
                );
            }
        }

        let (link, control_message) = {
            let mut state = self.state.lock().await;
            state.queue.clear();
            state.current = None;
            state.generation += 1;
            state.auto_paused = false;
            if let Some(stream) = state.stream.take() {
                let _ = stream.control.stop();
            }
            (state.link.take(), state.control_message.take())
        };

        if let Some((channel_id, message_id)) = control_message {
            self.services
                .channel
                .edit_controls(channel_id, message_id, ControlState::disabled())
                .await;
        }
        if let Some(link) = link {
            link.disconnect().await;
        }
        info!("Cleaned up music state for guild {}", self.guild_id);
    }
}
