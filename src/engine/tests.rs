// SPDX-License-Identifier: MPL-2.0

//! Engine lifecycle tests against in-memory hosts and players.

use std::{
    cell::RefCell,
    path::{Path, PathBuf},
    rc::Rc,
    time::{Duration, Instant},
};

use image::RgbaImage;
use neumowall_config::{MediaKind, Preferences};

use super::*;
use crate::{
    animated::{PlayerId, PlayerMessage, StreamEvent, VideoFrame, sequence::tests::write_gif},
    surface::PixelFormat,
};

#[derive(Default)]
struct MockSurface {
    size: (u32, u32),
    unavailable: bool,
    format: PixelFormat,
    acquired: usize,
    presented: usize,
    last: Option<RgbaImage>,
}

impl MockSurface {
    fn sized(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            ..Self::default()
        }
    }
}

impl DrawSurface for MockSurface {
    fn set_format(&mut self, format: PixelFormat) {
        self.format = format;
    }

    fn acquire_buffer(&mut self) -> Option<RgbaImage> {
        if self.unavailable {
            return None;
        }
        self.acquired += 1;
        Some(RgbaImage::new(self.size.0, self.size.1))
    }

    fn present(&mut self, buffer: RgbaImage) {
        self.presented += 1;
        self.last = Some(buffer);
    }
}

#[derive(Default)]
struct MockTicker {
    pending: Option<Duration>,
    scheduled: usize,
    cancelled: usize,
}

impl TickScheduler for MockTicker {
    fn schedule(&mut self, delay: Duration) {
        self.pending = Some(delay);
        self.scheduled += 1;
    }

    fn cancel(&mut self) {
        self.pending = None;
        self.cancelled += 1;
    }
}

#[derive(Default)]
struct PlayerLog {
    prepared: Vec<PlayerId>,
    starts: usize,
    pauses: usize,
    seeks: usize,
    releases: usize,
    playing: bool,
    /// Set by tests to mimic the pipeline reaching end-of-stream.
    ended: bool,
}

#[derive(Default, Clone)]
struct MockBackend {
    log: Rc<RefCell<PlayerLog>>,
    fail: bool,
}

struct MockPlayer {
    log: Rc<RefCell<PlayerLog>>,
}

impl StreamBackend for MockBackend {
    type Player = MockPlayer;

    fn prepare(&mut self, _path: &Path, id: PlayerId) -> eyre::Result<MockPlayer> {
        if self.fail {
            eyre::bail!("no decoder");
        }
        self.log.borrow_mut().prepared.push(id);
        Ok(MockPlayer {
            log: Rc::clone(&self.log),
        })
    }
}

impl StreamPlayer for MockPlayer {
    fn start(&mut self) -> eyre::Result<()> {
        let mut log = self.log.borrow_mut();
        log.starts += 1;
        log.playing = true;
        Ok(())
    }

    fn pause(&mut self) -> eyre::Result<()> {
        let mut log = self.log.borrow_mut();
        log.pauses += 1;
        log.playing = false;
        Ok(())
    }

    fn seek_to_start(&mut self) -> eyre::Result<()> {
        let mut log = self.log.borrow_mut();
        log.seeks += 1;
        log.ended = false;
        Ok(())
    }

    fn is_playing(&self) -> bool {
        let log = self.log.borrow();
        log.playing && !log.ended
    }

    fn has_ended(&self) -> bool {
        self.log.borrow().ended
    }
}

impl Drop for MockPlayer {
    fn drop(&mut self) {
        let mut log = self.log.borrow_mut();
        log.releases += 1;
        log.playing = false;
    }
}

fn message(id: PlayerId, event: StreamEvent) -> PlayerMessage {
    PlayerMessage { id, event }
}

fn frame() -> StreamEvent {
    StreamEvent::Frame(VideoFrame {
        image: RgbaImage::from_pixel(4, 2, image::Rgba([10, 20, 30, 255])),
        pts: None,
    })
}

fn stream_engine(backend: &MockBackend) -> StreamEngine<MockBackend> {
    StreamEngine::new(PathBuf::from("/media/clip.mp4"), backend.clone())
}

/// A prepared, visible, playing stream engine.
fn playing_stream(backend: &MockBackend, surface: &mut MockSurface) -> StreamEngine<MockBackend> {
    let mut engine = stream_engine(backend);
    engine.on_surface_ready(surface);
    engine.on_visibility_changed(true);
    engine.on_player_message(message(1, StreamEvent::Prepared), surface);
    engine
}

fn gif_engine(dir: &Path) -> LoopEngine {
    let path = dir.join("loop.gif");
    write_gif(
        &path,
        &[([255, 0, 0, 255], 100), ([0, 255, 0, 255], 100), ([0, 0, 255, 255], 100)],
    );
    LoopEngine::new(path)
}

// Selection

#[test]
fn selector_picks_engine_from_kind_and_existence() {
    assert_eq!(engine_kind(None, true), EngineKind::Null);
    assert_eq!(engine_kind(None, false), EngineKind::Null);
    assert_eq!(engine_kind(Some("video"), false), EngineKind::Null);
    assert_eq!(engine_kind(Some("gif"), false), EngineKind::Null);
    assert_eq!(engine_kind(Some("video"), true), EngineKind::Stream);
    assert_eq!(engine_kind(Some("gif"), true), EngineKind::Loop);
    assert_eq!(engine_kind(Some("slideshow"), true), EngineKind::Null);
}

#[test]
fn select_checks_the_file_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let clip = dir.path().join("clip.mp4");
    std::fs::write(&clip, b"not really a video").unwrap();

    let mut prefs = Preferences::default();
    assert_eq!(select(&prefs, MockBackend::default()).kind(), EngineKind::Null);

    prefs.set_media_path(&clip);
    prefs.set_media_type(MediaKind::Video);
    assert_eq!(select(&prefs, MockBackend::default()).kind(), EngineKind::Stream);

    prefs.set_media_type(MediaKind::Gif);
    assert_eq!(select(&prefs, MockBackend::default()).kind(), EngineKind::Loop);

    prefs.set_media_path(dir.path().join("gone.mp4"));
    assert_eq!(select(&prefs, MockBackend::default()).kind(), EngineKind::Null);

    // A directory is not a playable file.
    prefs.set_media_path(dir.path());
    assert_eq!(select(&prefs, MockBackend::default()).kind(), EngineKind::Null);
}

#[test]
fn null_engine_ignores_everything() {
    let mut engine: WallpaperEngine<MockBackend> = WallpaperEngine::Null;
    let mut surface = MockSurface::sized(4, 4);
    let mut ticker = MockTicker::default();
    let now = Instant::now();

    engine.on_surface_ready(&mut surface, now, &mut ticker);
    engine.on_visibility_changed(true, now, &mut ticker);
    assert_eq!(engine.on_tick(&mut surface, now), TickOutcome::Stop);
    engine.on_player_message(message(1, frame()), &mut surface);
    engine.on_surface_destroyed(&mut ticker);
    engine.on_engine_destroyed(&mut ticker);

    assert_eq!(surface.acquired, 0);
    assert_eq!(ticker.scheduled, 0);
}

// Stream engine

#[test]
fn surface_ready_requests_rgba_and_acquires_player() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = stream_engine(&backend);

    engine.on_surface_ready(&mut surface);

    assert_eq!(surface.format, PixelFormat::Rgba8888);
    assert!(engine.has_player());
    assert_eq!(backend.log.borrow().prepared, vec![1]);
    // Nothing starts before preparation completes.
    assert_eq!(backend.log.borrow().starts, 0);
}

#[test]
fn prepared_while_visible_starts_playback() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let engine = playing_stream(&backend, &mut surface);

    assert!(engine.was_playing());
    assert!(engine.is_playing());
    assert_eq!(backend.log.borrow().starts, 1);
}

#[test]
fn prepared_while_hidden_waits_for_show() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = stream_engine(&backend);

    engine.on_surface_ready(&mut surface);
    engine.on_player_message(message(1, StreamEvent::Prepared), &mut surface);
    assert_eq!(backend.log.borrow().starts, 0);
    assert!(!engine.was_playing());

    engine.on_visibility_changed(true);
    assert!(engine.is_playing());
    assert!(engine.was_playing());
}

#[test]
fn show_before_prepared_does_not_start() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = stream_engine(&backend);

    engine.on_surface_ready(&mut surface);
    engine.on_visibility_changed(true);

    assert_eq!(backend.log.borrow().starts, 0);
    assert!(!engine.was_playing());
}

#[test]
fn hide_then_show_resumes_playback() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = playing_stream(&backend, &mut surface);

    engine.on_visibility_changed(false);
    assert!(!engine.is_playing());
    assert!(!engine.was_playing());
    assert_eq!(backend.log.borrow().pauses, 1);

    engine.on_visibility_changed(true);
    assert!(engine.is_playing());
    assert!(engine.was_playing());
    assert_eq!(backend.log.borrow().starts, 2);
}

#[test]
fn repeated_hide_show_cycles_keep_playing() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = playing_stream(&backend, &mut surface);

    for _ in 0..3 {
        engine.on_visibility_changed(false);
        assert!(!engine.is_playing());
        engine.on_visibility_changed(true);
        assert!(engine.is_playing());
    }

    assert_eq!(backend.log.borrow().pauses, 3);
    assert_eq!(backend.log.borrow().starts, 4);
}

#[test]
fn show_after_end_of_stream_while_hidden_rewinds() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = playing_stream(&backend, &mut surface);

    // The pipeline ends, but its end-of-stream message is still queued
    // when the wallpaper is hidden.
    backend.log.borrow_mut().ended = true;
    engine.on_visibility_changed(false);
    assert_eq!(backend.log.borrow().pauses, 0);
    engine.on_player_message(message(1, StreamEvent::EndOfStream), &mut surface);
    assert_eq!(backend.log.borrow().seeks, 0);

    engine.on_visibility_changed(true);
    assert_eq!(backend.log.borrow().seeks, 1);
    assert!(engine.is_playing());
}

#[test]
fn hide_before_prepared_keeps_player_paused() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = stream_engine(&backend);

    engine.on_surface_ready(&mut surface);
    engine.on_visibility_changed(true);
    engine.on_visibility_changed(false);
    engine.on_player_message(message(1, StreamEvent::Prepared), &mut surface);

    assert_eq!(backend.log.borrow().starts, 0);
    assert!(!engine.is_playing());

    engine.on_visibility_changed(true);
    assert_eq!(backend.log.borrow().starts, 1);
    assert!(engine.is_playing());
}

#[test]
fn hide_when_not_playing_does_not_pause() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = stream_engine(&backend);

    engine.on_surface_ready(&mut surface);
    engine.on_player_message(message(1, StreamEvent::Prepared), &mut surface);
    engine.on_visibility_changed(false);

    assert_eq!(backend.log.borrow().pauses, 0);
}

#[test]
fn end_of_stream_loops_while_visible() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = playing_stream(&backend, &mut surface);

    engine.on_player_message(message(1, StreamEvent::EndOfStream), &mut surface);
    assert_eq!(backend.log.borrow().seeks, 1);
    assert_eq!(backend.log.borrow().starts, 2);

    engine.on_visibility_changed(false);
    engine.on_player_message(message(1, StreamEvent::EndOfStream), &mut surface);
    assert_eq!(backend.log.borrow().seeks, 1);
}

#[test]
fn acquire_failure_leaves_engine_idle() {
    let backend = MockBackend {
        fail: true,
        ..MockBackend::default()
    };
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = stream_engine(&backend);

    engine.on_surface_ready(&mut surface);
    engine.on_visibility_changed(true);
    engine.on_player_message(message(1, frame()), &mut surface);

    assert!(!engine.has_player());
    assert_eq!(surface.acquired, 0);
}

#[test]
fn prepare_failed_message_releases_player() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = stream_engine(&backend);

    engine.on_surface_ready(&mut surface);
    engine.on_visibility_changed(true);
    engine.on_player_message(
        message(1, StreamEvent::PrepareFailed("unsupported codec".into())),
        &mut surface,
    );

    assert!(!engine.has_player());
    assert_eq!(backend.log.borrow().releases, 1);
    assert_eq!(backend.log.borrow().starts, 0);
}

#[test]
fn playback_errors_are_swallowed() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = playing_stream(&backend, &mut surface);

    engine.on_player_message(
        message(1, StreamEvent::Error("decoder hiccup".into())),
        &mut surface,
    );

    assert!(engine.has_player());
    assert!(engine.is_playing());
}

#[test]
fn frames_paint_while_visible() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 4);
    let mut engine = playing_stream(&backend, &mut surface);

    engine.on_player_message(message(1, frame()), &mut surface);

    assert_eq!(surface.acquired, 1);
    assert_eq!(surface.presented, 1);
    let painted = surface.last.as_ref().unwrap();
    let [r, g, b, a] = painted.get_pixel(4, 2).0;
    assert!(r.abs_diff(10) <= 1 && g.abs_diff(20) <= 1 && b.abs_diff(30) <= 1);
    assert_eq!(a, 255);
}

#[test]
fn no_frames_painted_while_hidden() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 4);
    let mut engine = playing_stream(&backend, &mut surface);

    engine.on_visibility_changed(false);
    engine.on_player_message(message(1, frame()), &mut surface);

    assert_eq!(surface.acquired, 0);
}

#[test]
fn stale_player_messages_are_ignored() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut engine = stream_engine(&backend);

    engine.on_surface_ready(&mut surface);
    engine.on_visibility_changed(true);
    // A second surface replaces the first player.
    engine.on_surface_ready(&mut surface);
    assert_eq!(backend.log.borrow().releases, 1);

    engine.on_player_message(message(1, StreamEvent::Prepared), &mut surface);
    engine.on_player_message(message(1, frame()), &mut surface);
    assert_eq!(backend.log.borrow().starts, 0);
    assert_eq!(surface.acquired, 0);

    engine.on_player_message(message(2, StreamEvent::Prepared), &mut surface);
    assert_eq!(backend.log.borrow().starts, 1);
}

#[test]
fn stream_teardown_is_idempotent() {
    let backend = MockBackend::default();
    let mut surface = MockSurface::sized(8, 8);
    let mut ticker = MockTicker::default();
    let mut engine = WallpaperEngine::Stream(playing_stream(&backend, &mut surface));

    engine.on_surface_destroyed(&mut ticker);
    engine.on_surface_destroyed(&mut ticker);
    engine.on_engine_destroyed(&mut ticker);

    assert_eq!(backend.log.borrow().releases, 1);
    let WallpaperEngine::Stream(stream) = &engine else {
        panic!("engine changed kind");
    };
    assert!(!stream.has_player());
    assert!(!stream.was_playing());

    // Messages that were already queued are dropped.
    engine.on_player_message(message(1, frame()), &mut surface);
    assert_eq!(surface.acquired, 0);
}

// Loop engine

#[test]
fn loop_position_wraps_without_drift() {
    let epoch = Instant::now();
    let loop_duration = Duration::from_millis(300);

    let samples = [0u64, 1, 99, 299, 300, 301, 1_234, 59_999, 86_400_017];
    for t1 in samples {
        for t2 in samples {
            if t2 < t1 {
                continue;
            }
            let p1 = loop_position(epoch, epoch + Duration::from_millis(t1), loop_duration);
            let p2 = loop_position(epoch, epoch + Duration::from_millis(t2), loop_duration);

            let advanced = (p2.as_millis() + 300 - p1.as_millis()) % 300;
            assert_eq!(advanced, u128::from(t2 - t1) % 300, "t1={t1} t2={t2}");
        }
    }
}

#[test]
fn zero_length_loop_stays_at_start() {
    let epoch = Instant::now();
    let later = epoch + Duration::from_secs(7);
    assert_eq!(loop_position(epoch, later, Duration::ZERO), Duration::ZERO);
}

#[test]
fn loop_position_before_epoch_is_start() {
    let now = Instant::now();
    let epoch = now + Duration::from_millis(50);
    assert_eq!(
        loop_position(epoch, now, Duration::from_millis(300)),
        Duration::ZERO
    );
}

#[test]
fn show_schedules_tick_and_hide_cancels_it() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = gif_engine(dir.path());
    let mut ticker = MockTicker::default();
    let now = Instant::now();

    engine.on_surface_ready(now, &mut ticker);
    assert!(engine.is_loaded());

    engine.on_visibility_changed(true, now, &mut ticker);
    assert_eq!(ticker.pending, Some(Duration::ZERO));

    engine.on_visibility_changed(false, now, &mut ticker);
    assert_eq!(ticker.pending, None);
    assert_eq!(ticker.cancelled, 1);
    // Hiding keeps the decoded frames.
    assert!(engine.is_loaded());
}

#[test]
fn surface_ready_after_show_arms_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = gif_engine(dir.path());
    let mut ticker = MockTicker::default();
    let mut surface = MockSurface::sized(8, 4);
    let now = Instant::now();

    engine.on_visibility_changed(true, now, &mut ticker);
    assert_eq!(engine.tick(&mut surface, now), TickOutcome::Stop);
    // The host drops a timer whose tick stopped.
    ticker.pending = None;

    engine.on_surface_ready(now, &mut ticker);
    assert_eq!(ticker.pending, Some(Duration::ZERO));
    assert_eq!(engine.tick(&mut surface, now), TickOutcome::Continue);
    assert_eq!(surface.presented, 1);
}

#[test]
fn show_resets_epoch() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = gif_engine(dir.path());
    let mut ticker = MockTicker::default();
    let start = Instant::now();

    engine.on_surface_ready(start, &mut ticker);
    engine.on_visibility_changed(true, start, &mut ticker);
    let hidden_at = start + Duration::from_millis(150);
    engine.on_visibility_changed(false, hidden_at, &mut ticker);

    let shown_at = hidden_at + Duration::from_millis(5_123);
    engine.on_visibility_changed(true, shown_at, &mut ticker);

    assert_eq!(engine.position(shown_at), Some(Duration::ZERO));
    assert_eq!(
        engine.position(shown_at + Duration::from_millis(120)),
        Some(Duration::from_millis(120))
    );
}

#[test]
fn tick_paints_frame_for_elapsed_time() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = gif_engine(dir.path());
    let mut ticker = MockTicker::default();
    let mut surface = MockSurface::sized(8, 4);
    let start = Instant::now();

    engine.on_surface_ready(start, &mut ticker);
    engine.on_visibility_changed(true, start, &mut ticker);

    // 1050 ms into a 300 ms loop is 150 ms: the green frame.
    let outcome = engine.tick(&mut surface, start + Duration::from_millis(1_050));
    assert_eq!(outcome, TickOutcome::Continue);
    assert_eq!(surface.presented, 1);

    let [r, g, b, _] = surface.last.as_ref().unwrap().get_pixel(4, 2).0;
    assert!(g > 200 && r < 50 && b < 50, "{:?}", [r, g, b]);
}

#[test]
fn tick_while_hidden_never_paints() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = gif_engine(dir.path());
    let mut ticker = MockTicker::default();
    let mut surface = MockSurface::sized(8, 4);
    let now = Instant::now();

    engine.on_surface_ready(now, &mut ticker);
    assert_eq!(engine.tick(&mut surface, now), TickOutcome::Stop);

    engine.on_visibility_changed(true, now, &mut ticker);
    engine.on_visibility_changed(false, now, &mut ticker);
    assert_eq!(engine.tick(&mut surface, now), TickOutcome::Stop);

    assert_eq!(surface.acquired, 0);
}

#[test]
fn tick_without_frames_stops() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.gif");
    std::fs::write(&path, b"GIF89a but not really").unwrap();

    let mut engine = LoopEngine::new(path);
    let mut ticker = MockTicker::default();
    let mut surface = MockSurface::sized(8, 4);
    let now = Instant::now();

    engine.on_surface_ready(now, &mut ticker);
    assert!(!engine.is_loaded());
    engine.on_visibility_changed(true, now, &mut ticker);

    assert_eq!(engine.tick(&mut surface, now), TickOutcome::Stop);
    assert_eq!(surface.acquired, 0);
}

#[test]
fn unavailable_buffer_skips_paint_but_keeps_ticking() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = gif_engine(dir.path());
    let mut ticker = MockTicker::default();
    let mut surface = MockSurface {
        unavailable: true,
        ..MockSurface::sized(8, 4)
    };
    let now = Instant::now();

    engine.on_surface_ready(now, &mut ticker);
    engine.on_visibility_changed(true, now, &mut ticker);

    assert_eq!(engine.tick(&mut surface, now), TickOutcome::Continue);
    assert_eq!(surface.presented, 0);
}

#[test]
fn buffer_is_presented_once_even_when_painting_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = gif_engine(dir.path());
    let mut ticker = MockTicker::default();
    let mut surface = MockSurface::sized(0, 0);
    let now = Instant::now();

    engine.on_surface_ready(now, &mut ticker);
    engine.on_visibility_changed(true, now, &mut ticker);

    assert_eq!(engine.tick(&mut surface, now), TickOutcome::Continue);
    assert_eq!(surface.acquired, 1);
    assert_eq!(surface.presented, 1);
}

#[test]
fn loop_teardown_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut engine = WallpaperEngine::<MockBackend>::Loop(gif_engine(dir.path()));
    let mut ticker = MockTicker::default();
    let mut surface = MockSurface::sized(8, 4);
    let now = Instant::now();

    engine.on_surface_ready(&mut surface, now, &mut ticker);
    engine.on_visibility_changed(true, now, &mut ticker);

    engine.on_surface_destroyed(&mut ticker);
    engine.on_engine_destroyed(&mut ticker);

    assert_eq!(ticker.pending, None);
    assert_eq!(engine.on_tick(&mut surface, now), TickOutcome::Stop);
    assert_eq!(surface.acquired, 0);
}
