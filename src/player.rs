//! Player orchestrator: wires physics, gestures, speed mapping and the two
//! transport engines into one per-track session.
//!
//! The host drives the session cooperatively: `frame(now)` once per display
//! refresh, pointer handlers synchronously in between. All timestamps are
//! durations since session start.

use std::time::Duration;

use crate::{
    gesture::{RotationController, ShakeDetector},
    glass::Chamber,
    grain::Grain,
    host::{AudioHandle, SurfaceInfo},
    output::{default_graph, AudioGraph},
    physics::{GrainEngine, StaticFill},
    reverse::{ReverseEngine, MAX_PLAYBACK_RATE, MIN_PLAYBACK_RATE},
    speed::playback_speed,
    transport::{TransportClock, TransportMode},
};

// -------------------------------------------------------------------------------------------------

/// Mapped speeds below this magnitude pause the transport.
pub const SPEED_EPSILON: f64 = 0.01;
/// Radius of the click-to-toggle dead zone, as a fraction of the smaller
/// surface dimension.
pub const DEAD_ZONE_FRACTION: f32 = 0.12;
/// Width of the vertical seek strip on the right edge, as a fraction of the
/// surface width.
pub const SCRUB_REGION_FRACTION: f32 = 0.15;
/// How long the session waits for metadata and playback before surfacing the
/// retry affordance.
pub const STALL_TIMEOUT: Duration = Duration::from_secs(4);

// -------------------------------------------------------------------------------------------------

/// Create a new player session for the given audio element and mount surface.
///
/// Returns `None` when either argument is unusable: a degenerate surface, or
/// a handle reporting a negative duration. An unknown (`NaN`) duration is
/// fine; the stall watchdog covers the case where it never resolves.
pub fn create_player(
    audio: Box<dyn AudioHandle>,
    surface: SurfaceInfo,
) -> Option<PlayerSession> {
    PlayerSession::with_graph(audio, surface, default_graph())
}

// -------------------------------------------------------------------------------------------------

/// What the active pointer is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PointerGesture {
    None,
    /// Rotating the glass.
    Rotate,
    /// Vertical seek drag on the scrub strip.
    Scrub,
    /// Went down inside the dead zone; becomes a play toggle on release.
    PendingClick,
}

// -------------------------------------------------------------------------------------------------

/// One mounted hourglass widget: a single audio track, its grain set, its
/// rotation and shake state, and its reverse engine. Sessions share nothing.
pub struct PlayerSession {
    audio: Box<dyn AudioHandle>,
    surface: SurfaceInfo,
    physics: GrainEngine,
    rotation: RotationController,
    shake: ShakeDetector,
    reverse: ReverseEngine,
    clock: TransportClock,
    gesture: PointerGesture,
    speed: f64,
    manual_pause: bool,
    /// Reverse playback ran out at the track start; holds until the speed
    /// turns positive or a seek moves the clock.
    reverse_exhausted: bool,
    grains_initialized: bool,
    started_playing: bool,
    watchdog_deadline: Duration,
    needs_retry: bool,
    last_frame: Option<Duration>,
    disposed: bool,
}

impl PlayerSession {
    /// Like [`create_player`], with an explicit audio graph backend for the
    /// reverse engine. Useful for headless hosts and tests.
    pub fn with_graph(
        audio: Box<dyn AudioHandle>,
        surface: SurfaceInfo,
        graph: Box<dyn AudioGraph>,
    ) -> Option<Self> {
        if !surface.is_usable() {
            log::warn!("cannot mount hourglass player on a degenerate surface");
            return None;
        }
        let duration = audio.duration();
        if duration < 0.0 {
            log::warn!("audio handle reports an invalid duration: {duration}");
            return None;
        }
        let physics = GrainEngine::new(duration);
        let mut session = Self {
            audio,
            surface,
            physics,
            rotation: RotationController::new(),
            shake: ShakeDetector::new(),
            reverse: ReverseEngine::new(graph),
            clock: TransportClock::new(),
            gesture: PointerGesture::None,
            speed: 0.0,
            manual_pause: false,
            reverse_exhausted: false,
            grains_initialized: duration.is_finite(),
            started_playing: false,
            watchdog_deadline: STALL_TIMEOUT,
            needs_retry: false,
            last_frame: None,
            disposed: false,
        };
        session.try_play();
        Some(session)
    }

    // ---------------------------------------------------------------------------------------------
    // frame loop

    /// One cooperative frame: applies pending background results, recomputes
    /// the mapped speed, drives the transport and steps the physics.
    pub fn frame(&mut self, now: Duration) {
        if self.disposed {
            return;
        }
        self.reverse.poll();

        // metadata may resolve after mounting; grains init from it lazily
        if !self.grains_initialized && self.audio.duration().is_finite() {
            self.physics = GrainEngine::new(self.audio.duration());
            self.grains_initialized = true;
        }
        self.run_watchdog(now);

        let angle = self.rotation.current_angle(now);
        if self.gesture != PointerGesture::Scrub {
            self.speed = playback_speed(angle, self.shake.is_boosted(now)) as f64;
            self.drive_transport();
        }

        let time = self.clock.current_time(self.audio.as_ref(), &self.reverse);
        // reverse playback ran out at the track start: hand a paused
        // transport back to the forward element
        if self.clock.mode() == TransportMode::Reverse && time <= 0.0 {
            self.reverse.stop();
            self.audio.set_current_time(0.0);
            self.clock.set_mode(TransportMode::Forward);
            self.reverse_exhausted = true;
        }

        let dt = now
            .saturating_sub(self.last_frame.unwrap_or(now))
            .as_secs_f32();
        self.last_frame = Some(now);
        self.physics.update(dt, time, angle);
    }

    /// Apply the current mapped speed to the two transport engines.
    fn drive_transport(&mut self) {
        if self.manual_pause {
            self.pause_engines();
            return;
        }
        if self.speed.abs() < SPEED_EPSILON {
            self.pause_engines();
        } else if self.speed > 0.0 {
            self.reverse_exhausted = false;
            if self.clock.mode() == TransportMode::Reverse {
                self.commit_reverse_position();
            }
            self.audio.set_rate(clamp_rate(self.speed));
            if self.audio.paused() {
                self.try_play();
            }
        } else {
            if !self.audio.paused() {
                self.audio.pause();
            }
            if self.reverse_exhausted {
                // already at the track start, nothing left to play backwards
                return;
            }
            if self.clock.mode() == TransportMode::Reverse && self.reverse.is_active() {
                self.reverse.set_speed(self.speed);
            } else {
                // lazily kick off buffer preparation on first reverse demand
                self.reverse.prepare(self.audio.media_path());
                if self.reverse.is_ready() {
                    match self.reverse.start(self.audio.current_time(), self.speed) {
                        Ok(()) => {
                            self.clock.set_mode(TransportMode::Reverse);
                            self.started_playing = true;
                        }
                        Err(err) => log::debug!("could not start reverse playback: {err}"),
                    }
                }
                // not ready yet: forward stays paused until the buffer lands
            }
        }
    }

    /// Pause whichever engine is active. Reverse positions are committed back
    /// to the forward element so the paused state has one canonical clock.
    fn pause_engines(&mut self) {
        if self.clock.mode() == TransportMode::Reverse {
            self.commit_reverse_position();
        }
        if !self.audio.paused() {
            self.audio.pause();
        }
    }

    /// Stop the reverse node and seek the forward element to its last
    /// position.
    fn commit_reverse_position(&mut self) {
        let time = self
            .reverse
            .forward_time()
            .unwrap_or_else(|| self.audio.current_time());
        self.reverse.stop();
        self.audio.set_current_time(time);
        self.clock.set_mode(TransportMode::Forward);
    }

    fn try_play(&mut self) {
        match self.audio.play() {
            Ok(()) => self.started_playing = true,
            Err(err) => {
                // playback policy refusals are expected before a user gesture
                log::info!("forward playback refused by host: {err}");
                self.manual_pause = true;
            }
        }
    }

    /// Surface the retry affordance when grains or playback never came up.
    fn run_watchdog(&mut self, now: Duration) {
        if self.needs_retry || now < self.watchdog_deadline {
            return;
        }
        let stalled =
            !self.grains_initialized || (!self.started_playing && !self.manual_pause);
        if stalled {
            log::warn!("player stalled: metadata or playback never arrived");
            self.needs_retry = true;
        }
    }

    // ---------------------------------------------------------------------------------------------
    // pointer wiring

    pub fn pointer_down(&mut self, x: f32, y: f32, now: Duration) {
        if self.disposed {
            return;
        }
        if self.in_scrub_region(x) {
            self.gesture = PointerGesture::Scrub;
            self.scrub_to(y);
        } else if self.in_dead_zone(x, y) {
            self.gesture = PointerGesture::PendingClick;
        } else {
            self.gesture = PointerGesture::Rotate;
            self.rotation.start_drag(self.pointer_angle(x, y), now);
        }
    }

    pub fn pointer_move(&mut self, x: f32, y: f32, now: Duration) {
        if self.disposed {
            return;
        }
        match self.gesture {
            PointerGesture::Rotate => {
                let delta = self.rotation.drag_to(self.pointer_angle(x, y));
                self.shake.track_delta(delta, now);
            }
            PointerGesture::Scrub => self.scrub_to(y),
            PointerGesture::PendingClick => {
                // leaving the dead zone promotes the click into a rotation
                if !self.in_dead_zone(x, y) {
                    self.gesture = PointerGesture::Rotate;
                    self.rotation.start_drag(self.pointer_angle(x, y), now);
                }
            }
            PointerGesture::None => (),
        }
    }

    pub fn pointer_up(&mut self, x: f32, y: f32, now: Duration) {
        if self.disposed {
            return;
        }
        match self.gesture {
            PointerGesture::Rotate => {
                self.rotation.end_drag(now);
                self.shake.reset_direction();
            }
            PointerGesture::PendingClick => {
                if self.in_dead_zone(x, y) {
                    self.toggle_play();
                }
            }
            PointerGesture::Scrub | PointerGesture::None => (),
        }
        self.gesture = PointerGesture::None;
    }

    pub fn pointer_cancel(&mut self, now: Duration) {
        if self.disposed {
            return;
        }
        if self.gesture == PointerGesture::Rotate {
            self.rotation.end_drag(now);
            self.shake.reset_direction();
        }
        self.gesture = PointerGesture::None;
    }

    /// Map a vertical scrub position directly to a forward time and reshape
    /// the grain piles to match, bypassing the speed-based transport.
    fn scrub_to(&mut self, y: f32) {
        let duration = self.audio.duration();
        if !duration.is_finite() || duration <= 0.0 {
            return;
        }
        if self.clock.mode() == TransportMode::Reverse {
            self.reverse.stop();
            self.clock.set_mode(TransportMode::Forward);
        }
        let fraction = (y / self.surface.height).clamp(0.0, 1.0) as f64;
        let time = fraction * duration;
        self.audio.set_current_time(time);
        self.physics.redistribute(time);
        self.reverse_exhausted = false;
    }

    fn pointer_angle(&self, x: f32, y: f32) -> f32 {
        let (cx, cy) = self.surface.center();
        (y - cy).atan2(x - cx).to_degrees()
    }

    fn in_dead_zone(&self, x: f32, y: f32) -> bool {
        let (cx, cy) = self.surface.center();
        let radius = self.surface.width.min(self.surface.height) * DEAD_ZONE_FRACTION;
        let (dx, dy) = (x - cx, y - cy);
        dx * dx + dy * dy < radius * radius
    }

    fn in_scrub_region(&self, x: f32) -> bool {
        x >= self.surface.width * (1.0 - SCRUB_REGION_FRACTION)
    }

    // ---------------------------------------------------------------------------------------------
    // public control surface

    /// Toggle between manual pause and speed-driven playback.
    pub fn toggle_play(&mut self) {
        if self.disposed {
            return;
        }
        if self.manual_pause {
            self.manual_pause = false;
            if self.speed > SPEED_EPSILON && self.audio.paused() {
                self.try_play();
            }
        } else {
            self.manual_pause = true;
            self.pause_engines();
        }
    }

    /// True while either engine is actively producing sound.
    pub fn playing(&self) -> bool {
        if self.disposed || self.manual_pause {
            return false;
        }
        match self.clock.mode() {
            TransportMode::Forward => !self.audio.paused(),
            TransportMode::Reverse => self.reverse.is_active(),
        }
    }

    /// Current signed speed multiplier; 0 while manually paused.
    pub fn speed(&self) -> f64 {
        if self.disposed || self.manual_pause {
            0.0
        } else {
            self.speed
        }
    }

    /// Stop reverse mode, rewind to the track start, reset the grains and
    /// resume forward playback.
    pub fn restart(&mut self) {
        if self.disposed {
            return;
        }
        self.reverse.stop();
        self.clock.set_mode(TransportMode::Forward);
        self.audio.set_current_time(0.0);
        self.audio.set_rate(1.0);
        self.physics.redistribute(0.0);
        self.manual_pause = false;
        self.reverse_exhausted = false;
        self.try_play();
    }

    /// Full teardown: stops both engines, releases the audio graph and
    /// drops any pending background work. Idempotent; nothing owned by the
    /// session runs after this returns.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.gesture = PointerGesture::None;
        self.audio.pause();
        self.reverse.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // ---------------------------------------------------------------------------------------------
    // render readout

    /// Grain snapshot for the host's raster layer.
    pub fn grains(&self) -> &[Grain] {
        self.physics.grains()
    }

    /// Current display rotation of the glass in degrees.
    pub fn rotation_angle(&mut self, now: Duration) -> f32 {
        self.rotation.current_angle(now)
    }

    /// Static fill levels for reduced-motion rendering.
    pub fn static_fill(&self) -> StaticFill {
        let duration = self.audio.duration();
        let progress = if duration.is_finite() && duration > 0.0 {
            (self.audio.current_time() / duration) as f32
        } else {
            0.0
        };
        GrainEngine::static_fill(progress)
    }

    /// True when initialization stalled and the host should show a retry
    /// control.
    pub fn needs_retry(&self) -> bool {
        self.needs_retry
    }

    /// Re-attempt initialization and playback after a stall.
    pub fn retry(&mut self, now: Duration) {
        if self.disposed {
            return;
        }
        self.needs_retry = false;
        self.watchdog_deadline = now + STALL_TIMEOUT;
        let duration = self.audio.duration();
        if duration.is_finite() {
            self.physics = GrainEngine::new(duration);
            self.grains_initialized = true;
        }
        self.manual_pause = false;
        self.try_play();
    }

    /// Grains resting in the bottom chamber; exposed for the page's progress
    /// readouts.
    pub fn fallen_count(&self) -> usize {
        self.physics
            .grains()
            .iter()
            .filter(|g| g.chamber == Chamber::Bottom)
            .count()
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn clamp_rate(speed: f64) -> f64 {
    speed.abs().clamp(MIN_PLAYBACK_RATE, MAX_PLAYBACK_RATE)
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{
        path::PathBuf,
        sync::{Arc, Mutex},
    };

    use super::*;
    use crate::{error::Error, output::SilentGraph, reverse::ReverseBuffer};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[derive(Debug)]
    struct FakeAudioState {
        duration: f64,
        time: f64,
        paused: bool,
        rate: f64,
        reject_play: bool,
        media: Option<PathBuf>,
    }

    #[derive(Clone)]
    struct FakeAudio(Arc<Mutex<FakeAudioState>>);

    impl FakeAudio {
        fn with_duration(duration: f64) -> Self {
            Self(Arc::new(Mutex::new(FakeAudioState {
                duration,
                time: 0.0,
                paused: true,
                rate: 1.0,
                reject_play: false,
                media: None,
            })))
        }

        fn state(&self) -> std::sync::MutexGuard<'_, FakeAudioState> {
            self.0.lock().unwrap()
        }
    }

    impl AudioHandle for FakeAudio {
        fn duration(&self) -> f64 {
            self.state().duration
        }
        fn current_time(&self) -> f64 {
            self.state().time
        }
        fn set_current_time(&mut self, time: f64) {
            self.state().time = time;
        }
        fn play(&mut self) -> Result<(), Error> {
            if self.state().reject_play {
                return Err(Error::PlaybackPolicyError);
            }
            self.state().paused = false;
            Ok(())
        }
        fn pause(&mut self) {
            self.state().paused = true;
        }
        fn paused(&self) -> bool {
            self.state().paused
        }
        fn set_rate(&mut self, rate: f64) {
            self.state().rate = rate;
        }
        fn media_path(&self) -> Option<PathBuf> {
            self.state().media.clone()
        }
    }

    /// Graph that counts how often a node is scheduled.
    struct CountingGraph {
        starts: Arc<Mutex<u32>>,
        epoch: std::time::Instant,
    }

    impl AudioGraph for CountingGraph {
        fn now(&self) -> f64 {
            self.epoch.elapsed().as_secs_f64()
        }
        fn start(
            &mut self,
            _buffer: std::sync::Arc<ReverseBuffer>,
            _offset: f64,
            _rate: f32,
        ) -> Result<(), Error> {
            *self.starts.lock().unwrap() += 1;
            Ok(())
        }
        fn set_rate(&mut self, _rate: f32) {}
        fn stop(&mut self) {}
        fn close(&mut self) {}
    }

    fn session_with(audio: &FakeAudio) -> PlayerSession {
        PlayerSession::with_graph(
            Box::new(audio.clone()),
            SurfaceInfo::new(200.0, 200.0),
            Box::new(SilentGraph::new()),
        )
        .expect("session should mount")
    }

    fn ready_reverse_buffer(seconds: u32) -> ReverseBuffer {
        let frames = (seconds * 100) as usize;
        let forward: Vec<f32> = (0..frames).map(|i| i as f32).collect();
        ReverseBuffer::from_forward_samples(&forward, 100, 1)
    }

    /// Drag from 0° to the given angle in quarter-turn steps around the
    /// surface center, then release.
    fn rotate_to(session: &mut PlayerSession, target: f32, now: Duration) {
        session.pointer_down(150.0, 100.0, now);
        let steps = (target / 45.0).abs().ceil() as i32;
        for step in 1..=steps {
            let angle = (target * step as f32 / steps as f32).to_radians();
            let x = 100.0 + 50.0 * angle.cos();
            let y = 100.0 + 50.0 * angle.sin();
            session.pointer_move(x, y, now);
        }
        session.pointer_up(0.0, 0.0, now);
    }

    #[test]
    fn rejects_unusable_arguments() {
        let audio = FakeAudio::with_duration(120.0);
        assert!(PlayerSession::with_graph(
            Box::new(audio.clone()),
            SurfaceInfo::new(0.0, 100.0),
            Box::new(SilentGraph::new()),
        )
        .is_none());

        let invalid = FakeAudio::with_duration(-1.0);
        assert!(PlayerSession::with_graph(
            Box::new(invalid),
            SurfaceInfo::new(200.0, 200.0),
            Box::new(SilentGraph::new()),
        )
        .is_none());
    }

    #[test]
    fn grain_count_comes_from_duration() {
        let audio = FakeAudio::with_duration(180.7);
        let session = session_with(&audio);
        assert_eq!(session.grains().len(), 180);
    }

    #[test]
    fn mounts_and_plays_forward_at_full_speed() {
        let audio = FakeAudio::with_duration(60.0);
        let mut session = session_with(&audio);
        session.frame(ms(16));
        assert!(session.playing());
        assert_eq!(session.speed(), 1.0);
        assert_eq!(audio.state().rate, 1.0);
    }

    #[test]
    fn policy_rejection_leaves_the_player_paused() {
        let audio = FakeAudio::with_duration(60.0);
        audio.state().reject_play = true;
        let mut session = session_with(&audio);
        session.frame(ms(16));
        assert!(!session.playing());
        assert_eq!(session.speed(), 0.0);
        // a policy refusal is not a stall
        session.frame(STALL_TIMEOUT + ms(100));
        assert!(!session.needs_retry());
    }

    #[test]
    fn click_in_dead_zone_toggles_play() {
        let audio = FakeAudio::with_duration(60.0);
        let mut session = session_with(&audio);
        session.frame(ms(16));
        assert!(session.playing());
        session.pointer_down(100.0, 100.0, ms(20));
        session.pointer_up(100.0, 100.0, ms(30));
        session.frame(ms(32));
        assert!(!session.playing());
        session.pointer_down(102.0, 98.0, ms(40));
        session.pointer_up(102.0, 98.0, ms(50));
        session.frame(ms(48));
        assert!(session.playing());
    }

    #[test]
    fn quarter_turn_stops_playback() {
        let audio = FakeAudio::with_duration(60.0);
        let mut session = session_with(&audio);
        session.frame(ms(16));
        rotate_to(&mut session, 90.0, ms(20));
        // let the snap animation land on the detent
        session.frame(ms(20) + crate::gesture::SNAP_DURATION + ms(50));
        assert!((session.speed()).abs() < SPEED_EPSILON);
        assert!(audio.state().paused);
    }

    #[test]
    fn reverse_without_buffer_stays_paused_forward() {
        let audio = FakeAudio::with_duration(60.0);
        audio.state().time = 30.0;
        let mut session = session_with(&audio);
        session.frame(ms(16));
        rotate_to(&mut session, 180.0, ms(20));
        session.frame(ms(20) + crate::gesture::SNAP_DURATION + ms(50));
        assert!((session.speed() + 1.0).abs() < 1e-3);
        assert!(audio.state().paused);
        assert!(!session.playing());
    }

    #[test]
    fn reverse_round_trip_resumes_near_the_same_time() {
        let audio = FakeAudio::with_duration(60.0);
        audio.state().time = 30.0;
        let mut session = session_with(&audio);
        session.reverse.install_buffer(ready_reverse_buffer(60));
        session.frame(ms(16));

        rotate_to(&mut session, 180.0, ms(20));
        let after_snap = ms(20) + crate::gesture::SNAP_DURATION + ms(50);
        session.frame(after_snap);
        assert!(session.playing());

        rotate_to(&mut session, -180.0, after_snap + ms(10));
        let done = after_snap + crate::gesture::SNAP_DURATION + ms(100);
        session.frame(done);
        assert!(!audio.state().paused);
        // the silent graph clock barely advanced between frames
        assert!((audio.state().time - 30.0).abs() < 0.5);
    }

    #[test]
    fn exhausted_reverse_does_not_restart_every_frame() {
        let audio = FakeAudio::with_duration(60.0);
        let starts = Arc::new(Mutex::new(0u32));
        let graph = CountingGraph {
            starts: Arc::clone(&starts),
            epoch: std::time::Instant::now(),
        };
        let mut session = PlayerSession::with_graph(
            Box::new(audio.clone()),
            SurfaceInfo::new(200.0, 200.0),
            Box::new(graph),
        )
        .expect("session should mount");
        session.reverse.install_buffer(ready_reverse_buffer(60));
        session.frame(ms(16));

        // invert the glass while the track sits at its very start
        rotate_to(&mut session, 180.0, ms(20));
        let after_snap = ms(20) + crate::gesture::SNAP_DURATION + ms(50);
        for i in 0..20 {
            session.frame(after_snap + ms(16 * i));
        }
        // the reverse engine starts once, runs out and stays stopped
        assert_eq!(*starts.lock().unwrap(), 1);
        assert!(audio.state().paused);
        assert_eq!(audio.state().time, 0.0);
        assert!(!session.playing());

        // turning back upright resumes the forward transport
        rotate_to(&mut session, -180.0, after_snap + ms(400));
        session.frame(after_snap + ms(400) + crate::gesture::SNAP_DURATION + ms(50));
        assert!(session.playing());
    }

    #[test]
    fn scrub_drag_seeks_and_redistributes() {
        let audio = FakeAudio::with_duration(100.0);
        let mut session = session_with(&audio);
        session.frame(ms(16));
        // the right edge strip is the seek region; 3/4 down the surface
        session.pointer_down(190.0, 150.0, ms(20));
        assert!((audio.state().time - 75.0).abs() < 1e-6);
        assert_eq!(session.fallen_count(), 75);
        session.pointer_move(190.0, 0.0, ms(30));
        session.pointer_up(190.0, 0.0, ms(40));
        assert_eq!(audio.state().time, 0.0);
        assert_eq!(session.fallen_count(), 0);
    }

    #[test]
    fn restart_rewinds_everything() {
        let audio = FakeAudio::with_duration(100.0);
        let mut session = session_with(&audio);
        session.frame(ms(16));
        session.pointer_down(190.0, 100.0, ms(20));
        session.pointer_up(190.0, 100.0, ms(30));
        assert_eq!(session.fallen_count(), 50);
        session.restart();
        assert_eq!(audio.state().time, 0.0);
        assert_eq!(session.fallen_count(), 0);
        assert!(session.playing());
    }

    #[test]
    fn watchdog_surfaces_retry_and_recovers() {
        let audio = FakeAudio::with_duration(f64::NAN);
        let mut session = session_with(&audio);
        session.frame(ms(16));
        assert!(!session.needs_retry());
        assert!(session.grains().is_empty());

        session.frame(STALL_TIMEOUT + ms(100));
        assert!(session.needs_retry());

        // metadata arrived meanwhile, retry recovers
        audio.state().duration = 90.0;
        session.retry(STALL_TIMEOUT + ms(200));
        assert!(!session.needs_retry());
        session.frame(STALL_TIMEOUT + ms(300));
        assert_eq!(session.grains().len(), 90);
        assert!(session.playing());
    }

    #[test]
    fn dispose_is_idempotent_and_final() {
        let audio = FakeAudio::with_duration(60.0);
        let mut session = session_with(&audio);
        session.frame(ms(16));
        session.dispose();
        assert!(session.is_disposed());
        assert!(!session.playing());
        assert_eq!(session.speed(), 0.0);
        assert!(audio.state().paused);

        // everything after dispose is inert
        session.dispose();
        session.frame(ms(100));
        session.pointer_down(150.0, 100.0, ms(110));
        session.pointer_move(100.0, 150.0, ms(120));
        session.pointer_up(100.0, 150.0, ms(130));
        session.restart();
        assert!(audio.state().paused);
        assert_eq!(session.speed(), 0.0);
    }

    #[test]
    fn static_fill_follows_progress() {
        let audio = FakeAudio::with_duration(100.0);
        audio.state().time = 25.0;
        let session = session_with(&audio);
        let fill = session.static_fill();
        assert!((fill.bottom - 0.25).abs() < 1e-6);
        assert!((fill.top - 0.75).abs() < 1e-6);
    }
}
