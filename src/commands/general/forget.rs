use crate::{CommandResult, Context};
use tracing::error;

/// Forget our conversation in this channel
#[poise::command(slash_command, prefix_command, category = "General")]
pub async fn forget(ctx: Context<'_>) -> CommandResult {
    let reply = match ctx
        .data()
        .store
        .clear_history(ctx.channel_id(), ctx.author().id)
    {
        Ok(true) => "🧹 Done, I've forgotten our conversation here.",
        Ok(false) => "We don't have any conversation history here.",
        Err(e) => {
            error!("Failed to clear history for {}: {}", ctx.author().id, e);
            "Something went wrong while clearing your history."
        }
    };
    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}
