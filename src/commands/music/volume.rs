use super::*;

/// Change the player volume (0-100)
#[poise::command(slash_command, prefix_command, guild_only, aliases("vol"), category = "Music")]
pub async fn volume(
    ctx: Context<'_>,
    #[description = "Volume percentage"] percent: u32,
) -> CommandResult {
    let guild_id = match require_guild(ctx) {
        Ok(id) => id,
        Err(e) => return report(ctx, &e).await,
    };
    let user_channel = author_voice_channel(ctx, guild_id);

    match ctx.data().music.volume(guild_id, user_channel, percent).await {
        Ok(()) => {
            ctx.send(embedded_messages::success(
                "🔊 Volume",
                format!("Volume set to **{}%**", percent),
            ))
            .await?;
            Ok(())
        }
        Err(e) => report(ctx, &e).await,
    }
}
