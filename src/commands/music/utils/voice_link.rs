//! The voice connection as seen by a guild player.
//!
//! [`VoiceConnector`], [`VoiceLink`] and [`StreamControl`] are the only way the
//! player touches the voice transport. The songbird-backed implementations live
//! here too; tests swap in in-memory fakes.

use poise::serenity_prelude as serenity;
use serenity::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::error::ControlError;
use songbird::input::HttpRequest;
use songbird::tracks::{Track as DriverTrack, TrackHandle};
use songbird::{Call, CoreEvent, Event, Songbird, TrackEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use url::Url;

use super::event_handlers::{DriverStateNotifier, SongEndNotifier};
use super::wake_signal::{CompletionHook, WakeSignal};
use crate::commands::music::audio_sources::track::Track;

/// Errors from starting or steering a stream
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Invalid stream URL: {0}")]
    InvalidUrl(String),

    #[error("Not connected to a voice channel")]
    NotConnected,

    #[error("Voice driver error: {0}")]
    Control(String),
}

/// Transport controls for one running stream
pub trait StreamControl: Send + Sync {
    fn pause(&self) -> Result<(), StreamError>;
    fn resume(&self) -> Result<(), StreamError>;
    /// Stopping an already finished stream is not an error.
    fn stop(&self) -> Result<(), StreamError>;
    fn set_volume(&self, volume: f32) -> Result<(), StreamError>;
}

/// A live voice connection owned by one guild
#[async_trait]
pub trait VoiceLink: Send + Sync {
    fn is_connected(&self) -> bool;

    async fn channel_id(&self) -> Option<ChannelId>;

    /// Start streaming `track`. `hook` must be completed exactly when the stream ends.
    async fn start_stream(
        &self,
        track: &Track,
        volume: f32,
        hook: CompletionHook,
    ) -> Result<Arc<dyn StreamControl>, StreamError>;

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), StreamError>;

    async fn disconnect(&self);
}

/// Opens voice connections
#[async_trait]
pub trait VoiceConnector: Send + Sync {
    /// `signal` is set whenever the connection state changes.
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        signal: Arc<WakeSignal>,
    ) -> Result<Arc<dyn VoiceLink>, StreamError>;
}

/// Songbird-backed [`VoiceConnector`]
pub struct SongbirdConnector {
    songbird: Arc<Songbird>,
    http_client: reqwest::Client,
}

impl SongbirdConnector {
    pub fn new(songbird: Arc<Songbird>, http_client: reqwest::Client) -> Self {
        Self {
            songbird,
            http_client,
        }
    }
}

#[async_trait]
impl VoiceConnector for SongbirdConnector {
    async fn connect(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        signal: Arc<WakeSignal>,
    ) -> Result<Arc<dyn VoiceLink>, StreamError> {
        info!("Joining voice channel {} in guild {}", channel_id, guild_id);
        let call = self
            .songbird
            .join(guild_id, channel_id)
            .await
            .map_err(|e| StreamError::Control(e.to_string()))?;

        let connected = Arc::new(AtomicBool::new(true));
        {
            let mut handler = call.lock().await;
            // A rejoin reuses the same `Call`; drop handlers bound to an old player.
            handler.remove_all_global_events();
            for event in [CoreEvent::DriverDisconnect, CoreEvent::DriverReconnect] {
                handler.add_global_event(
                    Event::Core(event),
                    DriverStateNotifier {
                        guild_id,
                        connected: connected.clone(),
                        signal: signal.clone(),
                    },
                );
            }
        }

        Ok(Arc::new(SongbirdLink {
            guild_id,
            songbird: self.songbird.clone(),
            call,
            http_client: self.http_client.clone(),
            connected,
        }))
    }
}

struct SongbirdLink {
    guild_id: GuildId,
    songbird: Arc<Songbird>,
    call: Arc<Mutex<Call>>,
    http_client: reqwest::Client,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl VoiceLink for SongbirdLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn channel_id(&self) -> Option<ChannelId> {
        let handler = self.call.lock().await;
        handler
            .current_channel()
            .map(|channel| ChannelId::new(channel.0.get()))
    }

    async fn start_stream(
        &self,
        track: &Track,
        volume: f32,
        hook: CompletionHook,
    ) -> Result<Arc<dyn StreamControl>, StreamError> {
        Url::parse(&track.stream_url)
            .map_err(|_| StreamError::InvalidUrl(track.stream_url.clone()))?;

        if !self.is_connected() {
            return Err(StreamError::NotConnected);
        }

        let input = HttpRequest::new(self.http_client.clone(), track.stream_url.clone());
        let mut handler = self.call.lock().await;
        if handler.current_connection().is_none() {
            return Err(StreamError::NotConnected);
        }

        let handle = handler.play(DriverTrack::from(input).volume(volume));
        drop(handler);

        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    SongEndNotifier {
                        guild_id: self.guild_id,
                        hook: hook.clone(),
                    },
                )
                .map_err(|e| StreamError::Control(e.to_string()))?;
        }

        debug!("Started stream '{}' in guild {}", track.title, self.guild_id);
        Ok(Arc::new(SongbirdStream(handle)))
    }

    async fn move_to(&self, channel_id: ChannelId) -> Result<(), StreamError> {
        self.songbird
            .join(self.guild_id, channel_id)
            .await
            .map(|_| ())
            .map_err(|e| StreamError::Control(e.to_string()))
    }

    async fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Err(e) = self.songbird.remove(self.guild_id).await {
            warn!("Failed to leave voice in guild {}: {}", self.guild_id, e);
        }
    }
}

struct SongbirdStream(TrackHandle);

fn control_error(error: ControlError) -> StreamError {
    StreamError::Control(error.to_string())
}

impl StreamControl for SongbirdStream {
    fn pause(&self) -> Result<(), StreamError> {
        self.0.pause().map_err(control_error)
    }

    fn resume(&self) -> Result<(), StreamError> {
        self.0.play().map_err(control_error)
    }

    fn stop(&self) -> Result<(), StreamError> {
        match self.0.stop() {
            Ok(()) | Err(ControlError::Finished) => Ok(()),
            Err(e) => Err(control_error(e)),
        }
    }

    fn set_volume(&self, volume: f32) -> Result<(), StreamError> {
        self.0.set_volume(volume).map_err(control_error)
    }
}
