use super::*;

/// Stop the music and clear the queue
#[poise::command(slash_command, prefix_command, guild_only, category = "Music")]
pub async fn stop(ctx: Context<'_>) -> CommandResult {
    let guild_id = match require_guild(ctx) {
        Ok(id) => id,
        Err(e) => return report(ctx, &e).await,
    };
    let user_channel = author_voice_channel(ctx, guild_id);

    match ctx.data().music.stop(guild_id, user_channel).await {
        Ok(_) => {
            acknowledge(
                ctx,
                "⏹️",
                embedded_messages::success("⏹️ Stopped", "Playback stopped and queue cleared"),
            )
            .await
        }
        Err(e) => report(ctx, &e).await,
    }
}
