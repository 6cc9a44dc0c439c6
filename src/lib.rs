//! Cadence: a chat and voice companion bot with a per-guild music player.

use std::sync::Arc;

use poise::serenity_prelude as serenity;

pub mod commands;
pub mod config;
pub mod events;
pub mod utils;

use commands::music::utils::music_manager::MusicManager;
use config::BotConfig;
use utils::database::Store;

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type CommandResult = Result<(), Error>;

/// User data, stored and accessible in all command invocations
pub struct Data {
    pub music: Arc<MusicManager>,
    pub store: Arc<Store>,
    pub config: Arc<BotConfig>,
}

#[poise::command(slash_command, prefix_command, category = "General")]
pub async fn help(
    ctx: Context<'_>,
    #[description = "Specific command to show help about"]
    #[autocomplete = "poise::builtins::autocomplete_command"]
    command: Option<String>,
) -> CommandResult {
    poise::builtins::help(
        ctx,
        command.as_deref(),
        poise::builtins::HelpConfiguration {
            show_context_menu_commands: true,
            ..Default::default()
        },
    )
    .await
    .map_err(|e| e.into())
}

#[poise::command(prefix_command, hide_in_help)]
pub async fn register(ctx: Context<'_>) -> CommandResult {
    poise::builtins::register_application_commands_buttons(ctx)
        .await
        .map_err(|e| e.into())
}

/// Allows the configured admin user, or any member holding the ADMINISTRATOR permission
pub async fn is_admin(ctx: Context<'_>) -> Result<bool, Error> {
    if ctx.data().config.admin_user_id == Some(ctx.author().id) {
        return Ok(true);
    }

    if let Some(guild_id) = ctx.guild_id() {
        for role in guild_id.member(ctx, ctx.author().id).await?.roles {
            if role.to_role_cached(ctx).is_some_and(|r| {
                r.has_permission(serenity::Permissions::ADMINISTRATOR)
            }) {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
