use crate::{CommandResult, Context, is_admin};

/// Stop responding in this channel
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    check = "is_admin",
    category = "Admin"
)]
pub async fn mute(ctx: Context<'_>) -> CommandResult {
    let reply = if ctx.data().store.set_muted(ctx.channel_id(), true) {
        "🔇 I'll stay quiet in this channel until someone runs `unmute`."
    } else {
        "Failed to mute this channel."
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Respond in this channel again
#[poise::command(
    slash_command,
    prefix_command,
    guild_only,
    check = "is_admin",
    category = "Admin"
)]
pub async fn unmute(ctx: Context<'_>) -> CommandResult {
    let reply = if ctx.data().store.set_muted(ctx.channel_id(), false) {
        "🔊 I'm listening in this channel again."
    } else {
        "Failed to unmute this channel."
    };
    ctx.say(reply).await?;
    Ok(())
}
