use super::*;

/// Leave the voice channel and clear the queue
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    aliases("disconnect", "dc"),
    category = "Music"
)]
pub async fn leave(ctx: Context<'_>) -> CommandResult {
    let guild_id = match require_guild(ctx) {
        Ok(id) => id,
        Err(e) => return report(ctx, &e).await,
    };

    match ctx.data().music.leave(guild_id).await {
        Ok(()) => {
            acknowledge(
                ctx,
                "👋",
                embedded_messages::success(
                    "👋 Left Voice Channel",
                    "Disconnected and cleared the queue",
                ),
            )
            .await
        }
        Err(e) => report(ctx, &e).await,
    }
}
