use poise::serenity_prelude as serenity;
use serenity::client::Context;
use serenity::model::id::{ChannelId, GuildId};
use std::sync::{Arc, Weak};
use std::time::Duration;
use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::guild_player::{
    EnqueueReceipt, GuildPlayer, JoinOutcome, PlayerServices, PlayerSnapshot, ensure_same_channel,
};
use super::player_channel::PlayerChannel;
use super::voice_link::{StreamError, VoiceConnector};
use crate::commands::music::audio_sources::track::{Requester, Track};
use crate::commands::music::audio_sources::{ResolutionError, TrackResolver};

/// Errors that can occur during music operations. Display text is shown to users.
#[derive(Error, Debug)]
pub enum MusicError {
    #[error("This command only works in a server.")]
    NotInGuild,

    #[error("You need to be in a voice channel to do that.")]
    UserNotInVoiceChannel,

    #[error("You need to be in <#{0}> to do that.")]
    NotInBotChannel(ChannelId),

    #[error("I'm not connected to a voice channel.")]
    NotConnected,

    #[error("Nothing is playing right now.")]
    NothingPlaying,

    #[error("There's no song queued after this one to skip to.")]
    NothingToSkip,

    #[error("Playback is already paused.")]
    AlreadyPaused,

    #[error("Playback isn't paused.")]
    NotPaused,

    #[error("Volume must be between 0 and 100 (got {0}).")]
    InvalidVolume(u32),

    #[error("Tell me what to play: a URL or some search words.")]
    EmptyQuery,

    #[error("Failed to join voice channel: {0}")]
    JoinError(String),

    #[error("{}", .0.user_message())]
    Resolution(#[from] ResolutionError),

    #[error("Voice error: {0}")]
    Stream(#[from] StreamError),
}

/// Result type for music operations
pub type MusicResult<T> = Result<T, MusicError>;

/// Per-guild defaults applied to new players
#[derive(Debug, Clone, Copy)]
pub struct PlayerSettings {
    pub default_volume: f32,
    pub idle_timeout: Option<Duration>,
    pub control_timeout: Option<Duration>,
}

/// What `play` added
#[derive(Debug, Clone)]
pub struct PlayOutcome {
    pub collection_title: Option<String>,
    pub first: Track,
    pub receipt: EnqueueReceipt,
}

/// Registry of guild players. Owns every [`GuildPlayer`] and is the only way
/// to create or remove one.
pub struct MusicManager {
    players: DashMap<GuildId, Arc<GuildPlayer>>,
    services: PlayerServices,
    resolver: TrackResolver,
    settings: PlayerSettings,
}

impl MusicManager {
    /// Build the registry and spawn the task that serves loop cleanup requests.
    pub fn new(
        channel: Arc<dyn PlayerChannel>,
        connector: Arc<dyn VoiceConnector>,
        resolver: TrackResolver,
        settings: PlayerSettings,
    ) -> Arc<Self> {
        let (teardown, mut requests) = mpsc::unbounded_channel::<GuildId>();
        let manager = Arc::new(Self {
            players: DashMap::new(),
            services: PlayerServices {
                channel,
                connector,
                teardown,
                idle_timeout: settings.idle_timeout,
                control_timeout: settings.control_timeout,
            },
            resolver,
            settings,
        });

        let weak: Weak<Self> = Arc::downgrade(&manager);
        tokio::spawn(async move {
            while let Some(guild_id) = requests.recv().await {
                let Some(manager) = weak.upgrade() else {
                    break;
                };
                manager.cleanup(guild_id).await;
            }
            debug!("Music cleanup task stopped");
        });

        manager
    }

    pub fn get(&self, guild_id: GuildId) -> Option<Arc<GuildPlayer>> {
        self.players.get(&guild_id).map(|entry| entry.value().clone())
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> Arc<GuildPlayer> {
        self.players
            .entry(guild_id)
            .or_insert_with(|| {
                debug!("Creating music state for guild {}", guild_id);
                GuildPlayer::new(guild_id, self.services.clone(), self.settings.default_volume)
            })
            .value()
            .clone()
    }

    pub fn active_guilds(&self) -> usize {
        self.players.len()
    }

    /// Get the voice channel a member is in, from the cache
    pub fn get_user_voice_channel(
        ctx: &Context,
        guild_id: GuildId,
        user_id: serenity::UserId,
    ) -> Option<ChannelId> {
        let guild = ctx.cache.guild(guild_id)?;
        guild.voice_states.get(&user_id)?.channel_id
    }

    pub async fn join(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
    ) -> MusicResult<JoinOutcome> {
        let channel_id = user_channel.ok_or(MusicError::UserNotInVoiceChannel)?;
        self.get_or_create(guild_id).join(channel_id).await
    }

    /// Join if needed, resolve `query` and enqueue every resolved track.
    pub async fn play(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
        text_channel: ChannelId,
        query: &str,
        requester: &Requester,
    ) -> MusicResult<PlayOutcome> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::EmptyQuery);
        }
        let user_channel = user_channel.ok_or(MusicError::UserNotInVoiceChannel)?;

        let player = self.get_or_create(guild_id);
        match player.bot_channel().await {
            Some(bot_channel) => {
                ensure_same_channel(Some(user_channel), Some(bot_channel))?;
            }
            None => {
                player.join(user_channel).await?;
            }
        }

        let resolution = self
            .resolver
            .resolve(query, requester)
            .await
            .inspect_err(|e| info!("Resolution failed in guild {}: {}", guild_id, e))?;

        let first = resolution
            .tracks
            .first()
            .cloned()
            .ok_or(MusicError::Resolution(ResolutionError::Unavailable))?;
        let receipt = player.enqueue(resolution.tracks, text_channel).await;

        Ok(PlayOutcome {
            collection_title: resolution.collection_title,
            first,
            receipt,
        })
    }

    pub async fn leave(&self, guild_id: GuildId) -> MusicResult<()> {
        let player = self.get(guild_id).ok_or(MusicError::NotConnected)?;
        let connected = player.is_connected().await;
        // A stale entry is dropped either way.
        self.cleanup(guild_id).await;
        if connected {
            Ok(())
        } else {
            Err(MusicError::NotConnected)
        }
    }

    /// Look up a connected player whose channel the member shares.
    async fn transport(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
    ) -> MusicResult<Arc<GuildPlayer>> {
        let player = self.get(guild_id).ok_or(MusicError::NotConnected)?;
        ensure_same_channel(user_channel, player.bot_channel().await)?;
        Ok(player)
    }

    pub async fn skip(&self, guild_id: GuildId, user_channel: Option<ChannelId>) -> MusicResult<String> {
        self.transport(guild_id, user_channel).await?.skip().await
    }

    /// Returns whether anything was playing or queued.
    pub async fn stop(&self, guild_id: GuildId, user_channel: Option<ChannelId>) -> MusicResult<bool> {
        Ok(self.transport(guild_id, user_channel).await?.stop().await)
    }

    pub async fn pause(&self, guild_id: GuildId, user_channel: Option<ChannelId>) -> MusicResult<String> {
        self.transport(guild_id, user_channel).await?.pause().await
    }

    pub async fn resume(&self, guild_id: GuildId, user_channel: Option<ChannelId>) -> MusicResult<String> {
        self.transport(guild_id, user_channel).await?.resume().await
    }

    pub async fn volume(
        &self,
        guild_id: GuildId,
        user_channel: Option<ChannelId>,
        percent: u32,
    ) -> MusicResult<()> {
        self.transport(guild_id, user_channel)
            .await?
            .set_volume(percent)
            .await
    }

    pub async fn queue(&self, guild_id: GuildId) -> MusicResult<PlayerSnapshot> {
        let player = self.get(guild_id).ok_or(MusicError::NotConnected)?;
        Ok(player.snapshot().await)
    }

    /// Tear a guild down and forget it. Safe to call for unknown guilds.
    pub async fn cleanup(&self, guild_id: GuildId) {
        match self.players.remove(&guild_id) {
            Some((_, player)) => {
                info!("Cleaning up music state for guild {}", guild_id);
                player.shutdown().await;
            }
            None => debug!("No music state to clean up for guild {}", guild_id),
        }
    }

    /// Tear down every guild, used on shutdown.
    pub async fn cleanup_all(&self) {
        let guilds: Vec<GuildId> = self.players.iter().map(|entry| *entry.key()).collect();
        for guild_id in guilds {
            self.cleanup(guild_id).await;
        }
        if !self.players.is_empty() {
            error!("{} guild(s) still registered after cleanup", self.players.len());
        }
    }
}
