use super::*;
use crate::commands::music::audio_sources::track::Requester;
use tracing::info;

/// Play a song or playlist from a URL, or search YouTube
#[poise::command(slash_command, prefix_command, guild_only, aliases("p"), category = "Music")]
pub async fn play(
    ctx: Context<'_>,
    #[description = "URL or search query"]
    #[rest]
    query: String,
) -> CommandResult {
    info!("Received play command with query: {}", query);
    let guild_id = match require_guild(ctx) {
        Ok(id) => id,
        Err(e) => return report(ctx, &e).await,
    };
    let user_channel = author_voice_channel(ctx, guild_id);
    let requester = Requester {
        id: ctx.author().id,
        name: ctx.author().name.clone(),
    };

    // Extraction can take a while
    ctx.defer().await?;

    let outcome = match ctx
        .data()
        .music
        .play(guild_id, user_channel, ctx.channel_id(), &query, &requester)
        .await
    {
        Ok(outcome) => outcome,
        Err(e) => return report(ctx, &e).await,
    };

    let reply = match &outcome.collection_title {
        Some(title) => embedded_messages::added_playlist(title, &outcome.receipt),
        None => embedded_messages::added_to_queue(&outcome.first, &outcome.receipt),
    };
    ctx.send(reply).await?;
    Ok(())
}
