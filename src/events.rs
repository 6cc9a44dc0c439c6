use serenity::all::{ChannelId, ComponentInteraction, GuildId, Ready, UserId, VoiceState};
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::prelude::*;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::commands::music::utils::component_handlers;
use crate::commands::music::utils::music_manager::MusicManager;

/// What a listener moving in or out of the bot's channel means for playback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerChange {
    /// The last listener left
    Emptied,
    /// Someone joined the bot's channel
    Joined,
}

/// Classify a member's voice move relative to the bot's channel.
/// `listeners` counts the humans left in the bot's channel after the move.
pub fn listener_change(
    old_channel: Option<ChannelId>,
    new_channel: Option<ChannelId>,
    bot_channel: ChannelId,
    listeners: usize,
) -> Option<ListenerChange> {
    let was_here = old_channel == Some(bot_channel);
    let is_here = new_channel == Some(bot_channel);
    match (was_here, is_here) {
        (true, false) if listeners == 0 => Some(ListenerChange::Emptied),
        (false, true) if listeners > 0 => Some(ListenerChange::Joined),
        _ => None,
    }
}

pub struct Handler {
    pub music: Arc<MusicManager>,
}

#[async_trait]
impl serenity::prelude::EventHandler for Handler {
    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Component(component) = interaction {
            if component.data.custom_id.starts_with("music_") {
                music_component_interaction(&ctx, &component, &self.music).await;
            }
        }
    }

    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let bot_id = ctx.cache.current_user().id;
        let old_channel = old.as_ref().and_then(|state| state.channel_id);

        if new.user_id == bot_id {
            match new.channel_id {
                None => {
                    info!("Bot was disconnected from voice in guild {}", guild_id);
                    self.music.cleanup(guild_id).await;
                }
                Some(channel_id) if old_channel.is_some_and(|old| old != channel_id) => {
                    info!(
                        "Bot was moved to channel {} in guild {}",
                        channel_id, guild_id
                    );
                }
                Some(_) => {}
            }
            return;
        }

        if new.member.as_ref().is_some_and(|member| member.user.bot) {
            return;
        }

        let Some(player) = self.music.get(guild_id) else {
            return;
        };
        let Some(bot_channel) = player.bot_channel().await else {
            return;
        };

        let listeners = count_listeners(&ctx, guild_id, bot_channel, bot_id);
        match listener_change(old_channel, new.channel_id, bot_channel, listeners) {
            Some(ListenerChange::Emptied) => {
                debug!("Voice channel {} emptied in guild {}", bot_channel, guild_id);
                player.auto_pause().await;
            }
            Some(ListenerChange::Joined) => {
                debug!("Listener joined channel {} in guild {}", bot_channel, guild_id);
                player.auto_resume().await;
            }
            None => {}
        }
    }
}

/// Humans currently in `channel_id`, according to the cache
fn count_listeners(ctx: &Context, guild_id: GuildId, channel_id: ChannelId, bot_id: UserId) -> usize {
    let Some(guild) = ctx.cache.guild(guild_id) else {
        return 0;
    };
    guild
        .voice_states
        .values()
        .filter(|state| state.channel_id == Some(channel_id) && state.user_id != bot_id)
        .filter(|state| {
            let is_bot = state
                .member
                .as_ref()
                .map(|member| member.user.bot)
                .or_else(|| guild.members.get(&state.user_id).map(|m| m.user.bot))
                .unwrap_or(false);
            !is_bot
        })
        .count()
}

/// Handle component interactions for components with identities starting with "music_"
async fn music_component_interaction(
    ctx: &Context,
    component: &ComponentInteraction,
    music: &MusicManager,
) {
    if let Err(e) = component_handlers::handle_interaction(ctx, component, music).await {
        error!("Error handling component interaction: {}", e);
    }
}
