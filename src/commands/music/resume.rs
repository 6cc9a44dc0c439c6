use super::*;

/// Resume the paused track
#[poise::command(slash_command, prefix_command, guild_only, aliases("unpause"), category = "Music")]
pub async fn resume(ctx: Context<'_>) -> CommandResult {
    let guild_id = match require_guild(ctx) {
        Ok(id) => id,
        Err(e) => return report(ctx, &e).await,
    };
    let user_channel = author_voice_channel(ctx, guild_id);

    match ctx.data().music.resume(guild_id, user_channel).await {
        Ok(title) => {
            acknowledge(
                ctx,
                "▶️",
                embedded_messages::success("▶️ Resumed", format!("Resumed **{}**", title)),
            )
            .await
        }
        Err(e) => report(ctx, &e).await,
    }
}
