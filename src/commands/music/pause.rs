use super::*;

/// Pause the current track
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn pause(ctx: Context<'_>) -> CommandResult {
    let guild_id = match require_guild(ctx) {
        Ok(id) => id,
        Err(e) => return report(ctx, &e).await,
    };
    let user_channel = author_voice_channel(ctx, guild_id);

    match ctx.data().music.pause(guild_id, user_channel).await {
        Ok(title) => {
            acknowledge(
                ctx,
                "⏸️",
                embedded_messages::success("⏸️ Paused", format!("Paused **{}**", title)),
            )
            .await
        }
        Err(e) => report(ctx, &e).await,
    }
}
