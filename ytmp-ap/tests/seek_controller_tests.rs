//! Seek gesture tests: waveform clicks and slider drags

mod helpers;

use helpers::{TestPlayer, WAIT};
use std::time::Duration;
use ytmp_ap::playback::{SeekController, SliderBounds};
use ytmp_common::TrackId;

const BOUNDS: SliderBounds = SliderBounds { left: 100.0, width: 200.0 };

async fn playing_player() -> (TestPlayer, SeekController) {
    let player = TestPlayer::new(&[("a", 180.0, None)]).await;
    player.coordinator.select_track(TrackId::new("a")).await.unwrap();
    let seek = SeekController::new(player.coordinator.clone());
    (player, seek)
}

async fn label(player: &TestPlayer) -> String {
    player.state.ui_snapshot().await.time_progress_label
}

/// **Given:** a playing track with the poller running
/// **When:** the user drags the slider
/// **Then:** only the label follows the pointer; the graph is rebuilt once on release
#[tokio::test]
async fn test_drag_updates_label_and_seeks_on_release() {
    let (player, seek) = playing_player().await;

    assert_eq!(seek.drag_start(100.0, BOUNDS).await, 0.0);
    assert!(player.state.is_dragging());

    // Playback keeps moving but the poller must not overwrite the drag label
    player.latest().set_elapsed(60.0);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(label(&player).await, "0:00 / 3:00");

    assert_eq!(seek.drag_move(150.0, BOUNDS).await, 0.25);
    assert_eq!(label(&player).await, "0:45 / 3:00");
    assert_eq!(seek.drag_move(200.0, BOUNDS).await, 0.5);
    assert_eq!(label(&player).await, "1:30 / 3:00");
    assert_eq!(player.backend.opened(), 1);

    seek.drag_end(200.0, BOUNDS).await.unwrap();

    assert!(!player.state.is_dragging());
    assert_eq!(player.backend.opened(), 2);
    assert_eq!(player.latest().start_offset_seconds, 90.0);
    assert_eq!(player.backend.live_graphs(), 1);
}

#[tokio::test]
async fn test_release_right_of_slider_clamps_below_duration() {
    let (player, seek) = playing_player().await;

    seek.drag_start(250.0, BOUNDS).await;
    seek.drag_end(10_000.0, BOUNDS).await.unwrap();

    let start = player.latest().start_offset_seconds;
    assert!(start < 180.0 && start > 179.9, "start {}", start);
}

#[tokio::test]
async fn test_release_left_of_slider_seeks_to_start() {
    let (player, seek) = playing_player().await;
    player.coordinator.seek(0.5).await.unwrap();

    seek.drag_start(150.0, BOUNDS).await;
    seek.drag_end(-10_000.0, BOUNDS).await.unwrap();

    assert_eq!(player.latest().start_offset_seconds, 0.0);
}

#[tokio::test]
async fn test_drag_end_without_session_is_noop() {
    let player = TestPlayer::new(&[("a", 180.0, None)]).await;
    let seek = SeekController::new(player.coordinator.clone());

    seek.drag_start(150.0, BOUNDS).await;
    // No duration to format against
    assert_eq!(label(&player).await, "0:00 / 0:00");

    seek.drag_end(150.0, BOUNDS).await.unwrap();
    assert!(!player.state.is_dragging());
    assert_eq!(player.backend.opened(), 0);
}

#[tokio::test]
async fn test_move_without_drag_leaves_label() {
    let (player, seek) = playing_player().await;

    assert_eq!(seek.drag_move(200.0, BOUNDS).await, 0.5);
    assert_eq!(label(&player).await, "0:00 / 3:00");
}

#[tokio::test]
async fn test_click_seeks_immediately() {
    let (player, seek) = playing_player().await;

    seek.click(250.0, BOUNDS).await.unwrap();

    assert_eq!(player.latest().start_offset_seconds, 135.0);
    let offset = player.coordinator.current_offset_seconds().await.unwrap();
    assert!((offset - 135.0).abs() < 0.02);
}

#[tokio::test]
async fn test_poller_resumes_after_drag() {
    let (player, seek) = playing_player().await;

    seek.drag_start(150.0, BOUNDS).await;
    seek.drag_end(150.0, BOUNDS).await.unwrap();
    player.latest().set_elapsed(15.0);

    let state = player.state.clone();
    assert!(helpers::wait_until(WAIT, || {
        let state = state.clone();
        async move { state.ui_snapshot().await.time_progress_label == "1:00 / 3:00" }
    })
    .await);
}
