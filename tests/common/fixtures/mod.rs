//! Ids, requesters and extractor payloads shared by the integration tests.

use cadence::commands::music::audio_sources::track::Requester;
use cadence::commands::music::audio_sources::youtube::ExtractedInfo;
use poise::serenity_prelude::{ChannelId, GuildId, UserId};

pub const GUILD: GuildId = GuildId::new(1);
pub const VOICE: ChannelId = ChannelId::new(10);
pub const OTHER_VOICE: ChannelId = ChannelId::new(11);
pub const TEXT: ChannelId = ChannelId::new(20);

pub fn requester() -> Requester {
    Requester {
        id: UserId::new(100),
        name: "listener".to_string(),
    }
}

/// Page URL the fake extractor answers for `title`
pub fn page_url(title: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", title)
}

/// Media URL a resolved `title` streams from
pub fn stream_url(title: &str) -> String {
    format!("https://media.example/{}.webm", title)
}

/// A single playable video
pub fn video(title: &str) -> ExtractedInfo {
    ExtractedInfo {
        title: Some(title.to_string()),
        webpage_url: Some(page_url(title)),
        duration: Some(180.0),
        url: Some(stream_url(title)),
        acodec: Some("opus".to_string()),
        vcodec: Some("none".to_string()),
        ..Default::default()
    }
}

/// A video whose extraction produced no usable stream
pub fn video_without_stream(title: &str) -> ExtractedInfo {
    ExtractedInfo {
        title: Some(title.to_string()),
        webpage_url: Some(page_url(title)),
        ..Default::default()
    }
}

/// A playlist; `None` entries are the ones the extractor skipped.
pub fn playlist(title: &str, entries: Vec<Option<ExtractedInfo>>) -> ExtractedInfo {
    ExtractedInfo {
        kind: Some("playlist".to_string()),
        title: Some(title.to_string()),
        entries: Some(entries),
        ..Default::default()
    }
}
