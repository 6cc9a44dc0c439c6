//! Turns a user query into playable [`Track`]s.
//!
//! The heavy lifting is delegated to a [`MetadataExtractor`] (normally
//! [`youtube::YtDlp`]); this module only decides what to ask it for and how
//! to read the answer.

use serenity::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub mod track;
pub mod youtube;

use track::{Requester, Track};
use youtube::{ExtractedInfo, select_stream_url};

/// Why a query produced nothing playable
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Unsupported source")]
    Unsupported,

    #[error("Content unavailable")]
    Unavailable,

    #[error("Content is private")]
    Private,

    #[error("Content is age-restricted")]
    AgeRestricted,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Extraction failed: {0}")]
    Extraction(String),
}

impl ResolutionError {
    /// The message shown in chat. Never includes extractor output.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Unsupported => "Sorry, I don't support that URL or service.",
            Self::Unavailable => "That video is unavailable (maybe private or deleted).",
            Self::Private => "That video is private, so I can't play it.",
            Self::AgeRestricted => "Sorry, I can't play age-restricted content.",
            Self::Network(_) => "There was an error trying to access the song data.",
            Self::Extraction(_) => "An unknown error occurred while fetching the song.",
        }
    }
}

/// Source of raw metadata for a URL or a search expression
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, target: &str) -> Result<ExtractedInfo, ResolutionError>;
}

/// Result of a successful resolution
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// Set when the query named a playlist
    pub collection_title: Option<String>,
    pub tracks: Vec<Track>,
}

/// Resolves queries through a shared extractor; safe to use from any guild.
#[derive(Clone)]
pub struct TrackResolver {
    extractor: Arc<dyn MetadataExtractor>,
}

impl TrackResolver {
    pub fn new(extractor: Arc<dyn MetadataExtractor>) -> Self {
        Self { extractor }
    }

    pub async fn resolve(
        &self,
        query: &str,
        requester: &Requester,
    ) -> Result<Resolution, ResolutionError> {
        let query = query.trim();
        let is_url = Url::parse(query).is_ok_and(|url| matches!(url.scheme(), "http" | "https"));

        let target = if is_url {
            query.to_string()
        } else {
            format!("ytsearch1:{}", query)
        };
        debug!("Resolving query {:?} as {}", query, target);

        let info = self.extractor.extract(&target).await?;

        if !info.is_collection() {
            return entry_to_track(&info, query, requester)
                .ok_or_else(|| ResolutionError::Extraction("no playable audio stream".to_string()))
                .map(|track| Resolution {
                    collection_title: None,
                    tracks: vec![track],
                });
        }

        // A search is a one-entry collection; the user asked for one song.
        if !is_url {
            let first = info
                .entries
                .unwrap_or_default()
                .into_iter()
                .flatten()
                .next()
                .ok_or(ResolutionError::Unavailable)?;
            return entry_to_track(&first, query, requester)
                .ok_or_else(|| ResolutionError::Extraction("no playable audio stream".to_string()))
                .map(|track| Resolution {
                    collection_title: None,
                    tracks: vec![track],
                });
        }

        let entries = info.entries.unwrap_or_default();
        let total = entries.len();
        let tracks: Vec<Track> = entries
            .iter()
            .flatten()
            .filter_map(|entry| {
                let track = entry_to_track(entry, query, requester);
                if track.is_none() {
                    warn!(
                        "Dropping playlist entry without a playable stream: {:?}",
                        entry.title
                    );
                }
                track
            })
            .collect();

        if tracks.is_empty() {
            return Err(ResolutionError::Unavailable);
        }

        info!(
            "Resolved playlist {:?}: {} of {} entries playable",
            info.title,
            tracks.len(),
            total
        );

        Ok(Resolution {
            collection_title: Some(info.title.unwrap_or_else(|| "Playlist".to_string())),
            tracks,
        })
    }
}

fn entry_to_track(info: &ExtractedInfo, query: &str, requester: &Requester) -> Option<Track> {
    let stream_url = select_stream_url(info)?;
    let page_url = info
        .webpage_url
        .clone()
        .or_else(|| info.original_url.clone())
        .unwrap_or_else(|| query.to_string());

    Some(Track {
        stream_url,
        title: info
            .title
            .clone()
            .unwrap_or_else(|| "Unknown title".to_string()),
        page_url,
        duration: info
            .duration
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64),
        requester: requester.clone(),
    })
}
