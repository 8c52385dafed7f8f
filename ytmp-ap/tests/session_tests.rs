//! PlaybackSession lifecycle tests
//!
//! Drives a single session directly against the mock backend.

mod helpers;

use helpers::{sine_wav_bytes, MemoryByteSource, MockBackend, TEST_SAMPLE_RATE};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use ytmp_ap::playback::{
    PlaybackSession, SessionDeps, SessionSettings, SessionSignal, SessionState, StartAt,
};
use ytmp_ap::source::InMemoryCatalog;
use ytmp_ap::Error;
use ytmp_common::{Track, TrackId};

struct Fixture {
    deps: SessionDeps,
    backend: Arc<MockBackend>,
    bytes: Arc<MemoryByteSource>,
    signals: UnboundedReceiver<SessionSignal>,
}

fn fixture() -> Fixture {
    let backend = Arc::new(MockBackend::new());
    let bytes = Arc::new(MemoryByteSource::new());
    bytes.insert("a", sine_wav_bytes(200, TEST_SAMPLE_RATE, 2, 440.0, 0.5));
    bytes.insert("garbage", b"definitely not audio".repeat(32));

    let catalog = Arc::new(InMemoryCatalog::from_tracks([
        Track::new("a", 180.0, Some(-20.0)),
        Track::new("garbage", 10.0, None),
        Track::new("missing-bytes", 10.0, None),
    ]));

    let (tx, rx) = unbounded_channel();
    Fixture {
        deps: SessionDeps {
            backend: backend.clone(),
            bytes: bytes.clone(),
            catalog,
            signals: tx,
            latest_generation: Arc::new(AtomicU64::new(0)),
        },
        backend,
        bytes,
        signals: rx,
    }
}

fn settings() -> SessionSettings {
    SessionSettings {
        target_lufs: -14.0,
        user_volume: 1.0,
        loop_single: false,
    }
}

async fn create(f: &Fixture, id: &str, start: StartAt) -> ytmp_ap::Result<PlaybackSession> {
    PlaybackSession::create(&f.deps, 1, &TrackId::new(id), start, settings()).await
}

/// **Given:** a track at -20 LUFS and a -14 LUFS target
/// **When:** a session is created
/// **Then:** it runs with gain ≈ 1.995 on exactly one graph
#[tokio::test]
async fn test_create_runs_with_normalised_gain() {
    let f = fixture();
    let session = create(&f, "a", StartAt::BEGINNING).await.unwrap();

    assert_eq!(session.state(), SessionState::Running);
    assert!((session.gain() - 1.9953).abs() < 1e-3);
    assert_eq!(session.duration_seconds(), 180.0);
    assert_eq!(session.start_offset_seconds(), 0.0);
    assert_eq!(f.backend.live_graphs(), 1);

    let probe = f.backend.latest().unwrap();
    assert!((probe.gain() - 1.9953).abs() < 1e-3);
    assert!(!probe.is_looping());
}

#[tokio::test]
async fn test_close_is_idempotent_and_releases_once() {
    let f = fixture();
    let mut session = create(&f, "a", StartAt::BEGINNING).await.unwrap();
    let probe = f.backend.latest().unwrap();

    session.close();
    session.close();
    drop(session);

    assert_eq!(probe.close_count(), 1);
    assert_eq!(f.backend.live_graphs(), 0);
}

#[tokio::test]
async fn test_drop_releases_graph() {
    let f = fixture();
    let session = create(&f, "a", StartAt::BEGINNING).await.unwrap();
    drop(session);

    assert_eq!(f.backend.live_graphs(), 0);
}

#[tokio::test]
async fn test_toggle_play_pause_and_closed_session() {
    let f = fixture();
    let mut session = create(&f, "a", StartAt::BEGINNING).await.unwrap();
    let probe = f.backend.latest().unwrap();

    assert_eq!(session.toggle_play_pause().unwrap(), SessionState::Suspended);
    assert!(probe.is_suspended());
    assert_eq!(session.current_offset_seconds(), Some(0.0));

    assert_eq!(session.toggle_play_pause().unwrap(), SessionState::Running);
    assert!(!probe.is_suspended());

    session.close();
    assert!(matches!(session.toggle_play_pause(), Err(Error::SessionClosed)));
    assert_eq!(session.current_offset_seconds(), None);
}

#[tokio::test]
async fn test_ended_session_cannot_resume() {
    let f = fixture();
    let mut session = create(&f, "a", StartAt::BEGINNING).await.unwrap();

    session.mark_ended();
    assert_eq!(session.state(), SessionState::Ended);
    assert!(matches!(session.toggle_play_pause(), Err(Error::SessionClosed)));
}

/// **Given:** a running session on a 180s track
/// **When:** seek(0.5)
/// **Then:** the old graph is closed and a new one starts at 90s
#[tokio::test]
async fn test_seek_rebuilds_at_offset() {
    let f = fixture();
    let mut session = create(&f, "a", StartAt::BEGINNING).await.unwrap();
    let old = f.backend.latest().unwrap();

    let replacement = session.seek(0.5, &f.deps, 2).await.unwrap();

    assert_eq!(old.close_count(), 1);
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(replacement.state(), SessionState::Running);
    assert_eq!(replacement.generation(), 2);
    assert_eq!(replacement.start_offset_seconds(), 90.0);
    assert_eq!(f.backend.latest().unwrap().start_offset_seconds, 90.0);
    assert_eq!(f.backend.live_graphs(), 1);

    let offset = replacement.current_offset_seconds().unwrap();
    assert!((offset - 90.0).abs() < 0.02, "offset {}", offset);
}

#[tokio::test]
async fn test_seek_to_end_stays_inside_track() {
    let f = fixture();
    let mut session = create(&f, "a", StartAt::BEGINNING).await.unwrap();

    let replacement = session.seek(1.0, &f.deps, 2).await.unwrap();
    let start = replacement.start_offset_seconds();
    assert!(start < 180.0 && start > 179.9, "start {}", start);

    assert!(matches!(
        session.seek(f64::NAN, &f.deps, 3).await,
        Err(Error::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_current_offset_wraps_at_duration() {
    let f = fixture();
    let session = create(&f, "a", StartAt::Seconds(170.0)).await.unwrap();

    f.backend.latest().unwrap().set_elapsed(30.0);
    let offset = session.current_offset_seconds().unwrap();
    assert!((offset - 20.0).abs() < 1e-9, "offset {}", offset);
}

#[tokio::test]
async fn test_volume_change_reapplies_gain_without_rebuild() {
    let f = fixture();
    let mut session = create(&f, "a", StartAt::BEGINNING).await.unwrap();

    session.set_user_volume(0.5);

    assert!((session.gain() - 0.9976).abs() < 1e-3);
    assert!((f.backend.latest().unwrap().gain() - 0.9976).abs() < 1e-3);
    assert_eq!(f.backend.opened(), 1);
}

#[tokio::test]
async fn test_loop_single_suppresses_end_of_stream() {
    let mut f = fixture();
    let mut session = create(&f, "a", StartAt::BEGINNING).await.unwrap();
    let probe = f.backend.latest().unwrap();

    session.set_loop_single(true);
    assert!(probe.is_looping());
    assert!(!probe.play_to_end());
    assert!(f.signals.try_recv().is_err());

    session.set_loop_single(false);
    assert!(probe.play_to_end());
    assert!(matches!(
        f.signals.try_recv(),
        Ok(SessionSignal::EndOfStream { generation: 1 })
    ));
}

#[tokio::test]
async fn test_decode_failure_allocates_nothing() {
    let f = fixture();
    let err = create(&f, "garbage", StartAt::BEGINNING).await.unwrap_err();

    assert!(matches!(err, Error::Decode { .. }));
    assert!(!err.is_retryable());
    assert_eq!(f.backend.opened(), 0);
}

#[tokio::test]
async fn test_fetch_failures() {
    let f = fixture();

    let err = create(&f, "missing-bytes", StartAt::BEGINNING).await.unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
    assert!(err.is_retryable());

    // Unknown to the catalog: bytes are never requested
    let before = f.bytes.fetch_count();
    let err = create(&f, "nobody", StartAt::BEGINNING).await.unwrap_err();
    assert!(matches!(err, Error::Fetch { .. }));
    assert_eq!(f.bytes.fetch_count(), before);
}

#[tokio::test]
async fn test_resource_exhausted_leaves_nothing_alive() {
    let f = fixture();
    f.backend.fail_next_open();

    let err = create(&f, "a", StartAt::BEGINNING).await.unwrap_err();
    assert!(matches!(err, Error::ResourceExhausted(_)));
    assert_eq!(f.backend.live_graphs(), 0);
}

#[tokio::test]
async fn test_create_for_stale_generation_opens_nothing() {
    let f = fixture();
    f.deps.latest_generation.store(2, Ordering::SeqCst);

    let err = create(&f, "a", StartAt::BEGINNING).await.unwrap_err();

    assert!(matches!(err, Error::Superseded(1)));
    assert_eq!(f.bytes.fetch_count(), 0);
    assert_eq!(f.backend.opened(), 0);
}

/// **Given:** a create waiting on a slow fetch
/// **When:** a newer request takes a generation while it waits
/// **Then:** the create stops after the fetch without opening a graph
#[tokio::test]
async fn test_create_replaced_during_fetch_opens_nothing() {
    let f = fixture();
    f.bytes.set_delay("a", Duration::from_millis(30));

    let latest = Arc::clone(&f.deps.latest_generation);
    let (result, _) = tokio::join!(create(&f, "a", StartAt::BEGINNING), async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        latest.store(2, Ordering::SeqCst);
    });

    assert!(matches!(result, Err(Error::Superseded(1))));
    assert_eq!(f.bytes.fetch_count(), 1);
    assert_eq!(f.backend.opened(), 0);
}
