//! Defines `Track`, the immutable description of one playable audio item.

use poise::serenity_prelude::UserId;
use std::time::Duration;

use crate::commands::music::utils::format_duration;

/// The member who asked for a track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub id: UserId,
    pub name: String,
}

/// One playable item. Equality is structural; the same song may be queued twice.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    /// Direct media URL handed to the voice driver.
    pub stream_url: String,
    pub title: String,
    /// The page the track was found on (e.g. the YouTube watch page).
    pub page_url: String,
    pub duration: Option<Duration>,
    pub requester: Requester,
}

impl Track {
    pub fn display_duration(&self) -> String {
        self.duration
            .map(format_duration)
            .unwrap_or_else(|| "N/A".to_string())
    }
}
