use std::sync::atomic::Ordering;
use std::time::Duration;

use assert_matches::assert_matches;
use cadence::commands::music::audio_sources::ResolutionError;
use cadence::commands::music::utils::guild_player::JoinOutcome;
use cadence::commands::music::utils::music_manager::MusicError;
use poise::serenity_prelude::{ChannelId, GuildId};
use pretty_assertions::assert_eq;
use test_case::test_case;

use crate::common::fixtures::{GUILD, OTHER_VOICE, TEXT, VOICE, page_url, playlist, requester, video};
use crate::common::mocks::FakeExtractor;
use crate::common::{Harness, eventually, titles};
use crate::test_utils;

#[tokio::test]
async fn concurrent_requests_are_both_queued() {
    test_utils::init();
    let harness = Harness::with_settings(FakeExtractor::with_latency(Duration::from_millis(20)), None);
    harness.knows(&["a", "b"]);
    harness.manager.join(GUILD, Some(VOICE)).await.unwrap();

    let (first, second) = tokio::join!(harness.play("a"), harness.play("b"));
    first.unwrap();
    second.unwrap();

    harness.nth_stream(1).await;
    let snapshot = harness.player().snapshot().await;
    let mut all = titles(&snapshot.upcoming);
    all.extend(snapshot.current.map(|t| t.title));
    all.sort();
    assert_eq!(all, vec!["a", "b"]);
    assert_eq!(harness.connector.links.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn voice_handshake_does_not_block_the_player() {
    test_utils::init();
    let harness = Harness::new();
    harness.connector.slow_connect(Duration::from_millis(300));
    let player = harness.manager.get_or_create(GUILD);

    let joining = tokio::spawn({
        let player = player.clone();
        async move { player.join(VOICE).await }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let channel = tokio::time::timeout(Duration::from_millis(100), player.bot_channel()).await;
    assert_eq!(channel, Ok(None));
    let snapshot = tokio::time::timeout(Duration::from_millis(100), player.snapshot()).await;
    assert!(snapshot.is_ok());

    assert_eq!(joining.await.unwrap().unwrap(), JoinOutcome::Joined);
    assert_eq!(player.bot_channel().await, Some(VOICE));
}

#[tokio::test]
async fn concurrent_joins_open_one_connection() {
    test_utils::init();
    let harness = Harness::new();
    harness.connector.slow_connect(Duration::from_millis(50));

    let (first, second) = tokio::join!(
        harness.manager.join(GUILD, Some(VOICE)),
        harness.manager.join(GUILD, Some(VOICE))
    );

    let mut outcomes = vec![first.unwrap(), second.unwrap()];
    outcomes.sort_by_key(|outcome| *outcome == JoinOutcome::AlreadyHere);
    assert_eq!(outcomes, vec![JoinOutcome::Joined, JoinOutcome::AlreadyHere]);
    assert_eq!(harness.connector.links.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn join_reports_where_the_bot_ended_up() {
    test_utils::init();
    let harness = Harness::new();

    assert_eq!(
        harness.manager.join(GUILD, Some(VOICE)).await.unwrap(),
        JoinOutcome::Joined
    );
    assert_eq!(
        harness.manager.join(GUILD, Some(VOICE)).await.unwrap(),
        JoinOutcome::AlreadyHere
    );
    assert_eq!(
        harness.manager.join(GUILD, Some(OTHER_VOICE)).await.unwrap(),
        JoinOutcome::Moved
    );
    assert_eq!(harness.player().bot_channel().await, Some(OTHER_VOICE));
    assert_matches!(
        harness.manager.join(GUILD, None).await,
        Err(MusicError::UserNotInVoiceChannel)
    );
}

#[tokio::test]
async fn play_from_another_channel_is_refused_while_connected() {
    test_utils::init();
    let harness = Harness::new();
    harness.knows(&["a", "b"]);
    harness.play("a").await.unwrap();

    let result = harness
        .manager
        .play(GUILD, Some(OTHER_VOICE), TEXT, &page_url("b"), &requester())
        .await;

    assert_matches!(result, Err(MusicError::NotInBotChannel(channel)) if channel == VOICE);
    assert!(!harness.upcoming_titles().await.contains(&"b".to_string()));
}

#[test_case(ResolutionError::Unsupported ; "unsupported")]
#[test_case(ResolutionError::Private ; "private")]
#[test_case(ResolutionError::AgeRestricted ; "age restricted")]
#[test_case(ResolutionError::Network("timed out".to_string()) ; "network")]
#[tokio::test]
async fn resolution_failures_reach_the_caller(error: ResolutionError) {
    test_utils::init();
    let harness = Harness::new();
    harness.extractor.answer(&page_url("x"), Err(error.clone()));

    let result = harness.play("x").await;

    assert_matches!(result, Err(MusicError::Resolution(e)) if e == error);
    assert!(harness.upcoming_titles().await.is_empty());
    assert_eq!(harness.current_title().await, None);
}

#[tokio::test]
async fn playlist_without_playable_entries_is_unavailable() {
    test_utils::init();
    let harness = Harness::new();
    let url = "https://www.youtube.com/playlist?list=gone";
    harness.extractor.answer(url, Ok(playlist("Gone", vec![None, None])));

    let result = harness
        .manager
        .play(GUILD, Some(VOICE), TEXT, url, &requester())
        .await;

    assert_matches!(result, Err(MusicError::Resolution(ResolutionError::Unavailable)));
}

#[test_case("", Some(VOICE) ; "empty query")]
#[test_case("   ", Some(VOICE) ; "blank query")]
#[test_case("song", None ; "caller not in voice")]
#[tokio::test]
async fn play_checks_its_inputs_before_joining(query: &str, user_channel: Option<ChannelId>) {
    test_utils::init();
    let harness = Harness::new();

    let result = harness
        .manager
        .play(GUILD, user_channel, TEXT, query, &requester())
        .await;

    assert!(result.is_err());
    assert!(harness.connector.link().is_none());
}

#[tokio::test]
async fn leave_tears_the_guild_down() {
    test_utils::init();
    let harness = Harness::new();
    harness.knows(&["a", "b"]);
    harness.play("a").await.unwrap();
    harness.play("b").await.unwrap();
    let stream = harness.nth_stream(1).await;

    harness.manager.leave(GUILD).await.unwrap();

    assert!(stream.is_stopped());
    assert!(harness.manager.get(GUILD).is_none());
    assert_eq!(harness.link().disconnects.load(Ordering::SeqCst), 1);
    assert_matches!(harness.manager.leave(GUILD).await, Err(MusicError::NotConnected));
    assert_matches!(harness.manager.queue(GUILD).await, Err(MusicError::NotConnected));
}

#[tokio::test]
async fn guilds_are_independent() {
    test_utils::init();
    let harness = Harness::new();
    harness.knows(&["a", "b"]);
    let other_guild = GuildId::new(2);

    harness.play("a").await.unwrap();
    harness
        .manager
        .play(other_guild, Some(OTHER_VOICE), TEXT, &page_url("b"), &requester())
        .await
        .unwrap();
    assert_eq!(harness.manager.active_guilds(), 2);

    harness.manager.cleanup(GUILD).await;

    assert_eq!(harness.manager.active_guilds(), 1);
    let other = harness.manager.get(other_guild).unwrap();
    eventually(|| {
        let other = other.clone();
        async move { other.snapshot().await.current.is_some() }
    })
    .await;
    assert!(other.is_connected().await);
}

#[tokio::test]
async fn playing_again_after_a_disconnect_restarts_the_loop() {
    test_utils::init();
    let harness = Harness::new();
    harness.knows(&["a", "b"]);
    harness.play("a").await.unwrap();
    harness.nth_stream(1).await;

    harness.link().drop_connection();
    let player = harness.player();
    eventually(|| {
        let player = player.clone();
        async move { !player.loop_running().await }
    })
    .await;

    harness.play("b").await.unwrap();

    let fresh = harness.link();
    eventually(|| {
        let fresh = fresh.clone();
        async move { !fresh.started_titles().is_empty() }
    })
    .await;
    assert_eq!(harness.connector.links.lock().unwrap().len(), 2);
    assert_eq!(fresh.started_titles(), vec!["a"]);
    assert_eq!(harness.upcoming_titles().await, vec!["b"]);
}

#[tokio::test]
async fn cleanup_all_forgets_every_guild() {
    test_utils::init();
    let harness = Harness::new();
    harness.extractor.answer(&page_url("a"), Ok(video("a")));
    harness.play("a").await.unwrap();
    harness
        .manager
        .join(GuildId::new(3), Some(OTHER_VOICE))
        .await
        .unwrap();

    harness.manager.cleanup_all().await;

    assert_eq!(harness.manager.active_guilds(), 0);
}
