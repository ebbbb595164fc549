use std::time::{Duration, Instant};

/// Snapshot of the time state supplied to the shader uniforms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeSample {
    /// Elapsed animation time in seconds.
    pub seconds: f32,
    /// Monotonic frame counter for the running session.
    pub frame_index: u64,
}

impl TimeSample {
    pub fn new(seconds: f32, frame_index: u64) -> Self {
        Self {
            seconds,
            frame_index,
        }
    }
}

/// The animation clock and playback state machine.
///
/// The clock starts in the playing state. It is the single time source for
/// both the live preview and the exporter: live rendering ticks it against
/// wall-clock instants, while the exporter pauses it and drives the uniforms
/// with synthetic samples instead. All methods take `now` explicitly so the
/// state machine is testable without sleeping.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    playing: bool,
    elapsed: Duration,
    last_tick: Instant,
    frame: u64,
}

impl PlaybackClock {
    pub fn new(now: Instant) -> Self {
        Self {
            playing: true,
            elapsed: Duration::ZERO,
            last_tick: now,
            frame: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn elapsed_seconds(&self) -> f32 {
        self.elapsed.as_secs_f32()
    }

    /// Flips between playing and paused.
    ///
    /// Entering the playing state resumes accumulation from where it left
    /// off; the paused interval itself never counts toward elapsed time.
    pub fn toggle(&mut self, now: Instant) {
        if self.playing {
            self.pause(now);
        } else {
            self.resume(now);
        }
    }

    pub fn pause(&mut self, now: Instant) {
        if self.playing {
            self.elapsed += now.saturating_duration_since(self.last_tick);
            self.playing = false;
        }
        self.last_tick = now;
    }

    pub fn resume(&mut self, now: Instant) {
        self.playing = true;
        self.last_tick = now;
    }

    /// Zeroes elapsed time without touching the playing/paused state.
    pub fn reset(&mut self, now: Instant) {
        self.elapsed = Duration::ZERO;
        self.last_tick = now;
        self.frame = 0;
    }

    /// Advances the clock for one frame and returns the sample to render at.
    ///
    /// Elapsed time only accumulates while playing; a paused clock keeps
    /// yielding the frozen timestamp.
    pub fn tick(&mut self, now: Instant) -> TimeSample {
        if self.playing {
            self.elapsed += now.saturating_duration_since(self.last_tick);
        }
        self.last_tick = now;
        let sample = TimeSample::new(self.elapsed.as_secs_f32(), self.frame);
        self.frame = self.frame.saturating_add(1);
        sample
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Instant {
        Instant::now()
    }

    #[test]
    fn starts_playing_at_zero() {
        let clock = PlaybackClock::new(base());
        assert!(clock.is_playing());
        assert_eq!(clock.elapsed_seconds(), 0.0);
    }

    #[test]
    fn tick_accumulates_while_playing() {
        let start = base();
        let mut clock = PlaybackClock::new(start);
        let sample = clock.tick(start + Duration::from_millis(500));
        assert!((sample.seconds - 0.5).abs() < 1e-3);
        assert_eq!(sample.frame_index, 0);
        let sample = clock.tick(start + Duration::from_millis(750));
        assert!((sample.seconds - 0.75).abs() < 1e-3);
        assert_eq!(sample.frame_index, 1);
    }

    #[test]
    fn paused_clock_freezes_elapsed_time() {
        let start = base();
        let mut clock = PlaybackClock::new(start);
        clock.tick(start + Duration::from_secs(1));
        clock.pause(start + Duration::from_secs(1));
        let sample = clock.tick(start + Duration::from_secs(5));
        assert!((sample.seconds - 1.0).abs() < 1e-3);
    }

    #[test]
    fn toggle_twice_preserves_state_and_elapsed_time() {
        let start = base();
        let mut clock = PlaybackClock::new(start);
        clock.tick(start + Duration::from_secs(2));

        let was_playing = clock.is_playing();
        let before = clock.elapsed_seconds();
        clock.toggle(start + Duration::from_secs(2));
        clock.toggle(start + Duration::from_secs(9));
        assert_eq!(clock.is_playing(), was_playing);
        // The toggles themselves must not move the clock; only wall time
        // spent playing does.
        assert!((clock.elapsed_seconds() - before).abs() < 1e-3);
    }

    #[test]
    fn resume_skips_the_paused_interval() {
        let start = base();
        let mut clock = PlaybackClock::new(start);
        clock.tick(start + Duration::from_secs(1));
        clock.pause(start + Duration::from_secs(1));
        clock.resume(start + Duration::from_secs(4));
        let sample = clock.tick(start + Duration::from_secs(5));
        assert!((sample.seconds - 2.0).abs() < 1e-3);
    }

    #[test]
    fn reset_zeroes_time_but_keeps_playback_state() {
        let start = base();
        let mut clock = PlaybackClock::new(start);
        clock.tick(start + Duration::from_secs(3));
        clock.pause(start + Duration::from_secs(3));
        clock.reset(start + Duration::from_secs(3));
        assert!(!clock.is_playing());
        assert_eq!(clock.elapsed_seconds(), 0.0);

        clock.resume(start + Duration::from_secs(4));
        clock.reset(start + Duration::from_secs(4));
        assert!(clock.is_playing());
        assert_eq!(clock.elapsed_seconds(), 0.0);
    }

    #[test]
    fn reset_restarts_the_frame_counter() {
        let start = base();
        let mut clock = PlaybackClock::new(start);
        clock.tick(start + Duration::from_millis(16));
        clock.tick(start + Duration::from_millis(32));
        clock.reset(start + Duration::from_millis(32));
        let sample = clock.tick(start + Duration::from_millis(48));
        assert_eq!(sample.frame_index, 0);
    }
}
