use std::time::Duration;

use assert_matches::assert_matches;
use cadence::commands::music::utils::button_controls::{ControlAction, ControlState};
use cadence::commands::music::utils::guild_player::ControlOutcome;
use cadence::commands::music::utils::music_manager::MusicError;
use poise::serenity_prelude::MessageId;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::fixtures::{GUILD, OTHER_VOICE, VOICE};
use crate::common::mocks::{ChannelEvent, FakeExtractor};
use crate::common::{Harness, eventually, settle, titles};
use crate::test_utils;

/// A harness with `titles` queued and the first one streaming
async fn playing(titles: &[&str]) -> Harness {
    start_playing(Harness::new(), titles).await
}

async fn start_playing(harness: Harness, titles: &[&str]) -> Harness {
    harness.knows(titles);
    for title in titles {
        harness.play(title).await.unwrap();
    }
    harness.nth_stream(1).await;
    harness.cards(1).await;
    let player = harness.player();
    eventually(|| {
        let player = player.clone();
        async move { player.control_message().await.is_some() }
    })
    .await;
    harness
}

#[tokio::test]
async fn skip_needs_something_queued_after_the_current_track() {
    test_utils::init();
    let harness = playing(&["a"]).await;

    let result = harness.manager.skip(GUILD, Some(VOICE)).await;

    assert_matches!(result, Err(MusicError::NothingToSkip));
    let stream = harness.link().last_stream().unwrap();
    assert!(!stream.is_stopped());
    assert_eq!(harness.current_title().await.as_deref(), Some("a"));
}

#[tokio::test]
async fn skip_advances_to_the_next_track() {
    test_utils::init();
    let harness = playing(&["a", "b"]).await;

    let skipped = harness.manager.skip(GUILD, Some(VOICE)).await.unwrap();

    assert_eq!(skipped, "a");
    harness.nth_stream(2).await;
    assert_eq!(harness.current_title().await.as_deref(), Some("b"));
    assert_eq!(harness.cards(2).await, vec!["a", "b"]);
    settle().await;
    // Skipping is not the end of the queue.
    assert!(harness.channel.notices().is_empty());
}

#[tokio::test]
async fn stop_clears_everything_and_is_idempotent() {
    test_utils::init();
    let harness = playing(&["a", "b", "c"]).await;
    let (_, card) = harness.player().control_message().await.unwrap();

    assert!(harness.manager.stop(GUILD, Some(VOICE)).await.unwrap());
    settle().await;

    let snapshot = harness.player().snapshot().await;
    assert_eq!(snapshot.current, None);
    assert!(snapshot.upcoming.is_empty());
    assert_eq!(harness.link().started_titles(), vec!["a"]);
    assert_eq!(harness.channel.latest_state(card), Some(ControlState::disabled()));
    assert_eq!(harness.player().control_message().await, None);

    assert!(!harness.manager.stop(GUILD, Some(VOICE)).await.unwrap());
    assert!(harness.player().is_connected().await);
}

#[tokio::test]
async fn pause_and_resume_rerender_the_card() {
    test_utils::init();
    let harness = playing(&["a", "b"]).await;
    let player = harness.player();
    let (_, card) = player.control_message().await.unwrap();
    let stream = harness.link().last_stream().unwrap();

    assert_eq!(harness.manager.pause(GUILD, Some(VOICE)).await.unwrap(), "a");
    assert!(stream.is_paused());
    assert_eq!(
        harness.channel.latest_state(card),
        Some(ControlState {
            active: true,
            paused: true,
            has_next: true,
            disabled: false,
        })
    );
    assert_eq!(harness.channel.latest_state(card).unwrap().pause_label(), "Resume");
    assert_matches!(
        harness.manager.pause(GUILD, Some(VOICE)).await,
        Err(MusicError::AlreadyPaused)
    );

    harness.manager.resume(GUILD, Some(VOICE)).await.unwrap();
    assert!(!stream.is_paused());
    assert_eq!(
        harness.channel.latest_state(card).map(|state| state.paused),
        Some(false)
    );
    assert_matches!(
        harness.manager.resume(GUILD, Some(VOICE)).await,
        Err(MusicError::NotPaused)
    );
}

#[tokio::test]
async fn enqueue_enables_skip_on_the_live_card() {
    test_utils::init();
    let harness = playing(&["a"]).await;
    let (_, card) = harness.player().control_message().await.unwrap();
    assert_eq!(harness.channel.latest_state(card).map(|s| s.has_next), Some(false));

    harness.knows(&["b"]);
    harness.play("b").await.unwrap();

    let state = harness.channel.latest_state(card).unwrap();
    assert!(state.has_next);
    assert!(state.skip_enabled());
}

#[tokio::test]
async fn card_catches_up_with_changes_made_while_it_was_posting() {
    test_utils::init();
    let harness = Harness::new();
    harness.knows(&["a", "b"]);
    harness.channel.slow_posts(Duration::from_millis(300));

    harness.play("a").await.unwrap();
    let player = harness.player();
    eventually(|| {
        let player = player.clone();
        async move { player.control_state().await.active }
    })
    .await;
    settle().await;
    assert!(harness.channel.posted_titles().is_empty());

    harness.play("b").await.unwrap();
    player.pause().await.unwrap();
    let expected = ControlState {
        active: true,
        paused: true,
        has_next: true,
        disabled: false,
    };
    assert_eq!(player.control_state().await, expected);

    let channel = harness.channel.clone();
    eventually(|| {
        let player = player.clone();
        let channel = channel.clone();
        async move {
            player
                .control_message()
                .await
                .is_some_and(|(_, card)| channel.latest_state(card) == Some(expected))
        }
    })
    .await;
}

#[tokio::test]
async fn card_buttons_expire_without_touching_playback() {
    test_utils::init();
    let harness = Harness::with_timeouts(
        FakeExtractor::default(),
        None,
        Some(Duration::from_millis(100)),
    );
    let harness = start_playing(harness, &["a", "b"]).await;
    let player = harness.player();
    let view = player.control_message().await.unwrap();

    eventually(|| {
        let player = player.clone();
        async move { player.control_message().await.is_none() }
    })
    .await;

    assert_eq!(harness.channel.latest_state(view.1), Some(ControlState::disabled()));
    assert_eq!(harness.current_title().await.as_deref(), Some("a"));
    assert!(!harness.link().last_stream().unwrap().is_stopped());

    // Later changes leave the expired card alone.
    player.pause().await.unwrap();
    assert_eq!(harness.channel.latest_state(view.1), Some(ControlState::disabled()));
    assert!(!player.expire_control(view).await);
}

#[tokio::test]
async fn replaced_card_is_not_expired_again() {
    test_utils::init();
    let harness = Harness::with_timeouts(
        FakeExtractor::default(),
        None,
        Some(Duration::from_millis(150)),
    );
    let harness = start_playing(harness, &["a", "b"]).await;
    let player = harness.player();
    let first = player.control_message().await.unwrap();

    harness.link().last_stream().unwrap().finish();
    eventually(|| {
        let player = player.clone();
        async move { player.control_message().await.is_some_and(|view| view != first) }
    })
    .await;

    let disables = |card: MessageId| {
        harness
            .channel
            .events()
            .into_iter()
            .filter(|event| {
                matches!(event, ChannelEvent::Edited { message_id, state }
                    if *message_id == card && *state == ControlState::disabled())
            })
            .count()
    };
    assert_eq!(disables(first.1), 1);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(disables(first.1), 1);
}

#[tokio::test]
async fn previous_card_is_retired_when_the_next_track_starts() {
    test_utils::init();
    let harness = playing(&["a", "b"]).await;
    let (_, first_card) = harness.player().control_message().await.unwrap();

    harness.link().last_stream().unwrap().finish();
    harness.cards(2).await;

    let player = harness.player();
    eventually(|| {
        let player = player.clone();
        async move { player.control_message().await.is_some_and(|(_, id)| id != first_card) }
    })
    .await;
    assert_eq!(
        harness.channel.latest_state(first_card),
        Some(ControlState::disabled())
    );
}

#[rstest]
#[case::pause(ControlAction::TogglePause)]
#[case::skip(ControlAction::Skip)]
#[case::stop(ControlAction::Stop)]
#[case::queue(ControlAction::ShowQueue)]
#[tokio::test]
async fn clicks_from_outside_the_channel_change_nothing(#[case] action: ControlAction) {
    test_utils::init();
    let harness = playing(&["a", "b"]).await;
    let player = harness.player();
    let before = player.snapshot().await;
    let events_before = harness.channel.events().len();

    let result = player.apply_control(action, Some(OTHER_VOICE)).await;
    assert_matches!(result, Err(MusicError::NotInBotChannel(channel)) if channel == VOICE);

    let result = player.apply_control(action, None).await;
    assert_matches!(result, Err(MusicError::UserNotInVoiceChannel));

    assert_eq!(player.snapshot().await, before);
    assert_eq!(harness.channel.events().len(), events_before);
    assert!(!harness.link().last_stream().unwrap().is_paused());
}

#[tokio::test]
async fn buttons_drive_the_player() {
    test_utils::init();
    let harness = playing(&["a", "b", "c"]).await;
    let player = harness.player();

    assert_eq!(
        player.apply_control(ControlAction::TogglePause, Some(VOICE)).await.unwrap(),
        ControlOutcome::Paused
    );
    assert_eq!(
        player.apply_control(ControlAction::TogglePause, Some(VOICE)).await.unwrap(),
        ControlOutcome::Resumed
    );

    let queue = player.apply_control(ControlAction::ShowQueue, Some(VOICE)).await.unwrap();
    assert_matches!(queue, ControlOutcome::Queue(snapshot) => {
        assert_eq!(snapshot.current.map(|t| t.title).as_deref(), Some("a"));
        assert_eq!(titles(&snapshot.upcoming), vec!["b", "c"]);
    });

    assert_eq!(
        player.apply_control(ControlAction::Skip, Some(VOICE)).await.unwrap(),
        ControlOutcome::Skipped("a".to_string())
    );
    harness.nth_stream(2).await;

    assert_eq!(
        player.apply_control(ControlAction::Stop, Some(VOICE)).await.unwrap(),
        ControlOutcome::Stopped
    );
    assert_eq!(player.control_state().await, ControlState::default());
    assert!(!player.control_state().await.pause_enabled());
}

#[tokio::test]
async fn commands_from_another_channel_are_rejected() {
    test_utils::init();
    let harness = playing(&["a", "b"]).await;

    assert_matches!(
        harness.manager.skip(GUILD, Some(OTHER_VOICE)).await,
        Err(MusicError::NotInBotChannel(_))
    );
    assert_matches!(
        harness.manager.volume(GUILD, None, 30).await,
        Err(MusicError::UserNotInVoiceChannel)
    );
    assert_matches!(
        harness.manager.volume(GUILD, Some(VOICE), 101).await,
        Err(MusicError::InvalidVolume(101))
    );
    assert_eq!(harness.upcoming_titles().await, vec!["b"]);
}

#[tokio::test]
async fn emptied_channel_pauses_until_someone_returns() {
    test_utils::init();
    let harness = playing(&["a", "b"]).await;
    let player = harness.player();
    let stream = harness.link().last_stream().unwrap();

    assert!(player.auto_pause().await);
    assert!(stream.is_paused());
    assert!(player.snapshot().await.paused);
    assert_eq!(harness.upcoming_titles().await, vec!["b"]);

    assert!(player.auto_resume().await);
    assert!(!stream.is_paused());
    assert!(!player.auto_resume().await);
}

#[tokio::test]
async fn manual_pause_survives_a_listener_returning() {
    test_utils::init();
    let harness = playing(&["a"]).await;
    let player = harness.player();

    player.pause().await.unwrap();
    assert!(!player.auto_pause().await);
    assert!(!player.auto_resume().await);
    assert!(harness.link().last_stream().unwrap().is_paused());

    let paused_edits = harness
        .channel
        .events()
        .into_iter()
        .filter(|event| matches!(event, ChannelEvent::Edited { state, .. } if state.paused))
        .count();
    assert_eq!(paused_edits, 1);
}
