use poise::{CreateReply, serenity_prelude as serenity};
use serenity::all::CreateEmbed;
use std::time::Duration;

use super::format_duration;
use super::guild_player::{EnqueueReceipt, PlayerSnapshot};
use super::music_manager::MusicError;
use super::player_channel::Notice;
use crate::commands::music::audio_sources::track::Track;

/// Upcoming entries listed before "...and N more"
const QUEUE_DISPLAY_LIMIT: usize = 10;

const GREEN: u32 = 0x00ff00;
const RED: u32 = 0xff0000;
const BLURPLE: u32 = 0x5865f2;

fn track_link(track: &Track) -> String {
    format!("[{}]({})", track.title, track.page_url)
}

fn footer_for(track: &Track) -> serenity::CreateEmbedFooter {
    serenity::CreateEmbedFooter::new(format!("Requested by {}", track.requester.name))
}

/// Create an embed for when a song is now playing
pub fn now_playing(track: &Track) -> CreateEmbed {
    CreateEmbed::new()
        .title("🎵 Now Playing")
        .description(track_link(track))
        .field("Duration", format!("`{}`", track.display_duration()), true)
        .footer(footer_for(track))
        .color(GREEN)
}

/// Create an embed for a single track added by `play`
pub fn added_to_queue(track: &Track, receipt: &EnqueueReceipt) -> CreateReply {
    let mut embed = CreateEmbed::new()
        .title(if receipt.starts_now {
            "🎵 Now Playing"
        } else {
            "🎵 Added to Queue"
        })
        .description(track_link(track))
        .field("Duration", format!("`{}`", track.display_duration()), true);

    if !receipt.starts_now {
        embed = embed.field("Position", format!("`#{}`", receipt.position), true);
    }

    CreateReply::default().embed(embed.footer(footer_for(track)).color(GREEN))
}

/// Create an embed for a playlist added by `play`
pub fn added_playlist(title: &str, receipt: &EnqueueReceipt) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title("🎶 Playlist Queued")
            .description(format!(
                "Added {} song{} from **{}**",
                receipt.added,
                if receipt.added == 1 { "" } else { "s" },
                title
            ))
            .color(GREEN),
    )
}

/// Body of the queue view: the current track, then up to ten upcoming ones
pub fn queue_description(snapshot: &PlayerSnapshot) -> (String, String, String) {
    let now_playing = match &snapshot.current {
        Some(track) => format!(
            "{}: **{}** `[{}]` - Req by {}",
            if snapshot.paused { "⏸️ Paused" } else { "▶️ Playing" },
            track_link(track),
            track.display_duration(),
            track.requester.name
        ),
        None => "Nothing currently playing.".to_string(),
    };

    let upcoming = &snapshot.upcoming;
    if upcoming.is_empty() {
        return (now_playing, "Up Next".to_string(), "No songs in queue.".to_string());
    }

    let mut lines: Vec<String> = upcoming
        .iter()
        .take(QUEUE_DISPLAY_LIMIT)
        .enumerate()
        .map(|(index, track)| {
            format!(
                "`{}.` {} `[{}]` - Req by {}",
                index + 1,
                track_link(track),
                track.display_duration(),
                track.requester.name
            )
        })
        .collect();
    if upcoming.len() > QUEUE_DISPLAY_LIMIT {
        lines.push(format!("\n...and {} more.", upcoming.len() - QUEUE_DISPLAY_LIMIT));
    }

    let total: Duration = upcoming.iter().filter_map(|track| track.duration).sum();
    let total = if total.is_zero() {
        "N/A".to_string()
    } else {
        format_duration(total)
    };

    let heading = format!(
        "Up Next ({} song{}, Total: {})",
        upcoming.len(),
        if upcoming.len() == 1 { "" } else { "s" },
        total
    );
    (now_playing, heading, lines.join("\n"))
}

/// Create an embed for the music queue
pub fn music_queue(snapshot: &PlayerSnapshot) -> CreateEmbed {
    let (now_playing, heading, upcoming) = queue_description(snapshot);
    let total_songs = snapshot.upcoming.len() + usize::from(snapshot.current.is_some());

    CreateEmbed::new()
        .title("🎵 Music Queue")
        .field("Now Playing", now_playing, false)
        .field(heading, upcoming, false)
        .footer(serenity::CreateEmbedFooter::new(format!(
            "Total songs: {} | Volume: {}%",
            total_songs,
            (snapshot.volume * 100.0).round() as u32
        )))
        .color(BLURPLE)
}

/// Create an embed for a status message the playback loop posts on its own
pub fn notice(notice: &Notice) -> CreateEmbed {
    match notice {
        Notice::Finished { last } => CreateEmbed::new()
            .title("✅ Finished Playing")
            .description(format!("Played {}. The queue is now empty.", track_link(last)))
            .color(GREEN),
        Notice::StreamFailed { title, .. } => CreateEmbed::new()
            .title("⚠️ Playback Error")
            .description(format!("Something went wrong while playing **{}**. Moving on.", title))
            .color(RED),
        Notice::StreamStartFailed { title, .. } => CreateEmbed::new()
            .title("⚠️ Playback Error")
            .description(format!("Couldn't start **{}**, so it was skipped.", title))
            .color(RED),
        Notice::Disconnected { requeued } => CreateEmbed::new()
            .title("🔌 Disconnected")
            .description(match requeued {
                Some(title) => format!(
                    "Lost the voice connection. **{}** was put back at the front of the queue.",
                    title
                ),
                None => "Lost the voice connection.".to_string(),
            })
            .color(RED),
        Notice::IdleLeave => CreateEmbed::new()
            .title("💤 Leaving")
            .description("Nothing has played for a while, so I left the voice channel.")
            .color(BLURPLE),
        Notice::LoopFailed => CreateEmbed::new()
            .title("❌ Player Error")
            .description("The music player hit an unexpected error and was reset.")
            .color(RED),
    }
}

/// Create an embed for a failed music operation
pub fn music_error(err: &MusicError) -> CreateReply {
    CreateReply::default()
        .embed(
            CreateEmbed::new()
                .title("❌ Error")
                .description(err.to_string())
                .color(RED),
        )
        .ephemeral(true)
}

/// Create an embed for a successful music operation
pub fn success(title: &str, description: impl Into<String>) -> CreateReply {
    CreateReply::default().embed(
        CreateEmbed::new()
            .title(title)
            .description(description)
            .color(GREEN),
    )
}
