//! Common test utilities, fixtures, and mocks
//! This module contains the harness the integration tests drive the player through

pub mod fixtures;

use cadence::commands::music::audio_sources::TrackResolver;
use cadence::commands::music::audio_sources::track::Track;
use cadence::commands::music::utils::guild_player::GuildPlayer;
use cadence::commands::music::utils::music_manager::{
    MusicManager, MusicResult, PlayOutcome, PlayerSettings,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use fixtures::{GUILD, TEXT, VOICE, page_url, requester, video};
use mocks::{FakeConnector, FakeExtractor, FakeLink, FakeStream, RecordingChannel};

/// Upper bound for anything the playback loop does in the background
const SETTLE: Duration = Duration::from_secs(2);

/// A registry wired to in-memory fakes
pub struct Harness {
    pub manager: Arc<MusicManager>,
    pub connector: Arc<FakeConnector>,
    pub channel: Arc<RecordingChannel>,
    pub extractor: Arc<FakeExtractor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(FakeExtractor::default(), None)
    }

    pub fn with_settings(extractor: FakeExtractor, idle_timeout: Option<Duration>) -> Self {
        Self::with_timeouts(extractor, idle_timeout, None)
    }

    pub fn with_timeouts(
        extractor: FakeExtractor,
        idle_timeout: Option<Duration>,
        control_timeout: Option<Duration>,
    ) -> Self {
        let connector = Arc::new(FakeConnector::default());
        let channel = Arc::new(RecordingChannel::default());
        let extractor = Arc::new(extractor);
        let manager = MusicManager::new(
            channel.clone(),
            connector.clone(),
            TrackResolver::new(extractor.clone()),
            PlayerSettings {
                default_volume: 0.5,
                idle_timeout,
                control_timeout,
            },
        );
        Self {
            manager,
            connector,
            channel,
            extractor,
        }
    }

    /// Teach the extractor a set of single videos, addressed by page URL.
    pub fn knows(&self, titles: &[&str]) {
        for title in titles {
            self.extractor.answer(&page_url(title), Ok(video(title)));
        }
    }

    /// `play` a known video from the bot's channel.
    pub async fn play(&self, title: &str) -> MusicResult<PlayOutcome> {
        self.manager
            .play(GUILD, Some(VOICE), TEXT, &page_url(title), &requester())
            .await
    }

    pub fn player(&self) -> Arc<GuildPlayer> {
        self.manager.get(GUILD).expect("guild player exists")
    }

    pub fn link(&self) -> Arc<FakeLink> {
        self.connector.link().expect("voice link was opened")
    }

    /// Wait until the link has started `count` streams and return the last one.
    pub async fn nth_stream(&self, count: usize) -> Arc<FakeStream> {
        let link = self.link();
        eventually(|| {
            let link = link.clone();
            async move { link.started_titles().len() >= count }
        })
        .await;
        link.stream(count - 1).expect("stream started")
    }

    /// Wait until `count` control cards were posted.
    pub async fn cards(&self, count: usize) -> Vec<String> {
        let channel = self.channel.clone();
        eventually(|| {
            let channel = channel.clone();
            async move { channel.posted_titles().len() >= count }
        })
        .await;
        self.channel.posted_titles()
    }

    pub async fn current_title(&self) -> Option<String> {
        self.player().snapshot().await.current.map(|t| t.title)
    }

    pub async fn upcoming_titles(&self) -> Vec<String> {
        titles(&self.player().snapshot().await.upcoming)
    }
}

pub fn titles(tracks: &[Track]) -> Vec<String> {
    tracks.iter().map(|t| t.title.clone()).collect()
}

/// Poll `condition` until it holds, panicking after a generous deadline.
pub async fn eventually<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + SETTLE;
    while !condition().await {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached within {:?}",
            SETTLE
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Give background tasks a chance to run without waiting for anything specific.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
