use super::*;

/// Show the current track and what's up next
#[poise::command(slash_command, prefix_command, guild_only, aliases("q"), category = "Music")]
pub async fn queue(ctx: Context<'_>) -> CommandResult {
    let guild_id = match require_guild(ctx) {
        Ok(id) => id,
        Err(e) => return report(ctx, &e).await,
    };

    let snapshot = match ctx.data().music.queue(guild_id).await {
        Ok(snapshot) => snapshot,
        Err(e) => return report(ctx, &e).await,
    };

    if snapshot.current.is_none() && snapshot.upcoming.is_empty() {
        ctx.say("The queue is empty and nothing is playing.").await?;
        return Ok(());
    }

    ctx.send(CreateReply::default().embed(embedded_messages::music_queue(&snapshot)))
        .await?;
    Ok(())
}
