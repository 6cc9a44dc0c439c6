use ::serenity::all::{
    ComponentInteraction, CreateEmbed, CreateInteractionResponse,
    CreateInteractionResponseFollowup, CreateInteractionResponseMessage,
};
use poise::serenity_prelude::Context;
use tracing::{debug, error, info};

use super::button_controls::{ControlAction, create_music_control_buttons};
use super::embedded_messages;
use super::guild_player::ControlOutcome;
use super::music_manager::{MusicError, MusicManager};

type ButtonInteractionResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// Handle a press on one of the control buttons
pub async fn handle_interaction(
    ctx: &Context,
    interaction: &ComponentInteraction,
    manager: &MusicManager,
) -> ButtonInteractionResult {
    let Some(guild_id) = interaction.guild_id else {
        return private_reply(ctx, interaction, &MusicError::NotInGuild.to_string()).await;
    };

    let Some(action) = ControlAction::from_custom_id(&interaction.data.custom_id) else {
        error!("Unknown button ID: {}", interaction.data.custom_id);
        return private_reply(ctx, interaction, "Unknown button action.").await;
    };

    let Some(player) = manager.get(guild_id) else {
        return private_reply(ctx, interaction, &MusicError::NotConnected.to_string()).await;
    };

    let user_channel =
        MusicManager::get_user_voice_channel(ctx, guild_id, interaction.user.id);
    debug!(
        "Button {:?} pressed by {} in guild {}",
        action, interaction.user.name, guild_id
    );

    let outcome = match player.apply_control(action, user_channel).await {
        Ok(outcome) => outcome,
        Err(e) => {
            info!(
                "Rejected button {:?} from {} in guild {}: {}",
                action, interaction.user.name, guild_id, e
            );
            return private_reply(ctx, interaction, &e.to_string()).await;
        }
    };

    match outcome {
        ControlOutcome::Paused | ControlOutcome::Resumed => {
            let state = player.control_state().await;
            interaction
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::UpdateMessage(
                        CreateInteractionResponseMessage::new()
                            .components(create_music_control_buttons(state)),
                    ),
                )
                .await?;
            let ack = if outcome == ControlOutcome::Paused {
                "⏸️ Paused playback."
            } else {
                "▶️ Resumed playback."
            };
            interaction
                .create_followup(
                    &ctx.http,
                    CreateInteractionResponseFollowup::new()
                        .content(ack)
                        .ephemeral(true),
                )
                .await?;
        }
        ControlOutcome::Skipped(title) => {
            private_reply(ctx, interaction, &format!("⏭️ Skipped **{}**.", title)).await?;
        }
        ControlOutcome::Stopped => {
            private_reply(ctx, interaction, "⏹️ Stopped playback and cleared the queue.").await?;
        }
        ControlOutcome::Queue(snapshot) => {
            private_embed(ctx, interaction, embedded_messages::music_queue(&snapshot)).await?;
        }
    }

    Ok(())
}

async fn private_reply(
    ctx: &Context,
    interaction: &ComponentInteraction,
    content: &str,
) -> ButtonInteractionResult {
    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .content(content)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}

async fn private_embed(
    ctx: &Context,
    interaction: &ComponentInteraction,
    embed: CreateEmbed,
) -> ButtonInteractionResult {
    interaction
        .create_response(
            &ctx.http,
            CreateInteractionResponse::Message(
                CreateInteractionResponseMessage::new()
                    .embed(embed)
                    .ephemeral(true),
            ),
        )
        .await?;
    Ok(())
}
