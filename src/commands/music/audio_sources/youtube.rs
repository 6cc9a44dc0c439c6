//! Metadata extraction through the `yt-dlp` command-line tool.
//!
//! `yt-dlp` is run as a child process through `tokio::process`, so a slow
//! extraction never blocks the scheduler. Its `--dump-single-json` output is
//! parsed into [`ExtractedInfo`], and [`select_stream_url`] picks the audio
//! stream a track will be played from.

use regex::Regex;
use serde::Deserialize;
use serenity::async_trait;
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{MetadataExtractor, ResolutionError};

/// Audio codecs tried in order when no stream was pre-selected.
const PREFERRED_CODECS: [&str; 3] = ["opus", "vorbis", "aac"];

/// Protocols the voice driver can read directly over HTTP.
const DIRECT_PROTOCOLS: [&str; 2] = ["https", "http"];

/// Ordered failure patterns; the first match decides the classification.
static FAILURE_PATTERNS: LazyLock<Vec<FailureRule>> =
    LazyLock::new(|| {
        vec![
            rule(r"(?i)unsupported url", |_| ResolutionError::Unsupported),
            rule(r"(?i)private video|video is private|granted access", |_| {
                ResolutionError::Private
            }),
            rule(
                r"(?i)confirm your age|age[- ]restricted|inappropriate for some users",
                |_| ResolutionError::AgeRestricted,
            ),
            rule(
                r"(?i)video unavailable|not available|has been removed|no video results",
                |_| ResolutionError::Unavailable,
            ),
            rule(
                r"(?i)unable to download|timed out|connection (reset|refused)|network is unreachable|name resolution|http error 5\d\d",
                ResolutionError::Network,
            ),
        ]
    });

type FailureRule = (Regex, fn(String) -> ResolutionError);

fn rule(pattern: &str, build: fn(String) -> ResolutionError) -> FailureRule {
    (Regex::new(pattern).expect("failure pattern is valid"), build)
}

/// One format entry of an extraction result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MediaFormat {
    pub format_id: Option<String>,
    pub format_note: Option<String>,
    pub url: Option<String>,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    pub protocol: Option<String>,
}

impl MediaFormat {
    fn has_audio(&self) -> bool {
        self.acodec.as_deref().is_some_and(|codec| codec != "none")
    }

    fn is_audio_only(&self) -> bool {
        self.has_audio() && self.vcodec.as_deref() == Some("none")
    }

    fn is_tagged_best_audio(&self) -> bool {
        [&self.format_id, &self.format_note]
            .into_iter()
            .flatten()
            .any(|tag| tag.to_lowercase().contains("bestaudio"))
    }
}

/// The subset of `yt-dlp` JSON this bot reads. Playlists carry `entries`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractedInfo {
    #[serde(rename = "_type")]
    pub kind: Option<String>,
    pub title: Option<String>,
    pub webpage_url: Option<String>,
    pub original_url: Option<String>,
    pub duration: Option<f64>,
    /// Stream chosen by `--format`, when it resolved to a single format.
    pub url: Option<String>,
    pub acodec: Option<String>,
    pub vcodec: Option<String>,
    pub protocol: Option<String>,
    #[serde(default)]
    pub formats: Vec<MediaFormat>,
    #[serde(default)]
    pub requested_formats: Vec<MediaFormat>,
    /// Failed playlist entries come back as `null` when errors are ignored.
    pub entries: Option<Vec<Option<ExtractedInfo>>>,
}

impl ExtractedInfo {
    pub fn is_collection(&self) -> bool {
        self.entries.is_some() || self.kind.as_deref() == Some("playlist")
    }

    /// The pre-selected stream viewed as a format, so the same predicates apply.
    fn selected_format(&self) -> MediaFormat {
        MediaFormat {
            format_id: None,
            format_note: None,
            url: self.url.clone(),
            acodec: self.acodec.clone(),
            vcodec: self.vcodec.clone(),
            protocol: self.protocol.clone(),
        }
    }
}

/// Pick the best audio stream URL of an entry.
///
/// Preference order: the pre-selected stream when it is directly readable and
/// carries audio, then audio-only formats by codec preference, then anything
/// tagged "bestaudio", then any audio-only format, then any format with audio.
pub fn select_stream_url(info: &ExtractedInfo) -> Option<String> {
    let usable = |format: &MediaFormat| format.url.as_ref().filter(|url| !url.is_empty()).cloned();

    let selected = info.selected_format();
    let selected_is_direct = selected
        .protocol
        .as_deref()
        .is_none_or(|protocol| DIRECT_PROTOCOLS.contains(&protocol));
    // Without codec information the selection is trusted as-is.
    let selected_has_audio = selected.acodec.is_none() || selected.has_audio();
    if selected_is_direct && selected_has_audio {
        if let Some(url) = usable(&selected) {
            return Some(url);
        }
    }

    let formats = || info.formats.iter().chain(info.requested_formats.iter());

    PREFERRED_CODECS
        .iter()
        .find_map(|codec| {
            formats()
                .filter(|f| f.is_audio_only() && f.acodec.as_deref() == Some(*codec))
                .find_map(usable)
        })
        .or_else(|| formats().filter(|f| f.is_tagged_best_audio()).find_map(usable))
        .or_else(|| formats().filter(|f| f.is_audio_only()).find_map(usable))
        .or_else(|| formats().filter(|f| f.has_audio()).find_map(usable))
}

/// Map an extractor error message onto a resolution failure.
pub fn classify_failure(message: &str) -> ResolutionError {
    let message = message.trim();
    FAILURE_PATTERNS
        .iter()
        .find(|(pattern, _)| pattern.is_match(message))
        .map(|(_, build)| build(message.to_string()))
        .unwrap_or_else(|| {
            let detail = message
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("no output from extractor");
            ResolutionError::Extraction(detail.to_string())
        })
}

/// Runs `yt-dlp` to extract metadata and stream URLs.
pub struct YtDlp {
    program: String,
    max_playlist_entries: usize,
}

impl YtDlp {
    pub fn new(program: impl Into<String>, max_playlist_entries: usize) -> Self {
        Self {
            program: program.into(),
            max_playlist_entries,
        }
    }
}

#[async_trait]
impl MetadataExtractor for YtDlp {
    async fn extract(&self, target: &str) -> Result<ExtractedInfo, ResolutionError> {
        debug!("Running {} for target: {}", self.program, target);

        let output = Command::new(&self.program)
            .args([
                "--dump-single-json",
                "--no-warnings",
                "--ignore-errors",
                "--yes-playlist",
                "--format",
                "bestaudio/best",
                "--playlist-end",
                &self.max_playlist_entries.to_string(),
                target,
            ])
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ResolutionError::Extraction(format!("Failed to run extractor: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() || stdout == "null" {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("Extractor returned no data for {}: {}", target, stderr.trim());
            return Err(classify_failure(&stderr));
        }

        serde_json::from_str(stdout).map_err(|e| {
            ResolutionError::Extraction(format!("Failed to parse extractor output: {}", e))
        })
    }
}
