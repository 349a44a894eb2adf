/// Play state of the clock.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayState {
    Stopped,
    Paused,
    /// Time is derived from wall-clock time elapsed since the anchor.
    Playing { anchor_wall_ms: f64, anchor_time_ms: f64 },
}

/// What a tick changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Idle,
    Advanced,
    Wrapped,
    /// Reached the end without looping and stopped.
    Ended,
}

/// The single authoritative time cursor of a scene.
///
/// While playing, time is `anchor_time + (now - anchor_wall)`, so irregular
/// callback spacing never accumulates drift.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackClock {
    state: PlayState,
    time_ms: f64,
    looping: bool,
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self {
            state: PlayState::Stopped,
            time_ms: 0.0,
            looping: false,
        }
    }
}

impl PlaybackClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.state, PlayState::Playing { .. })
    }

    pub fn current_time(&self) -> f64 {
        self.time_ms
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn set_looping(&mut self, looping: bool, now_ms: f64) {
        self.looping = looping;
        self.reanchor(now_ms);
    }

    /// Starts playing from the current time; from the very end it restarts at 0.
    pub fn play(&mut self, now_ms: f64, total_ms: f64) {
        if self.is_playing() {
            return;
        }
        if self.time_ms >= total_ms {
            self.time_ms = 0.0;
        }
        self.state = PlayState::Playing {
            anchor_wall_ms: now_ms,
            anchor_time_ms: self.time_ms,
        };
    }

    pub fn pause(&mut self, now_ms: f64, total_ms: f64) {
        if self.is_playing() {
            self.tick(now_ms, total_ms);
            if self.is_playing() {
                self.state = PlayState::Paused;
            }
        }
    }

    pub fn toggle(&mut self, now_ms: f64, total_ms: f64) {
        if self.is_playing() {
            self.pause(now_ms, total_ms);
        } else {
            self.play(now_ms, total_ms);
        }
    }

    /// Back to zero; the loop setting survives.
    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.time_ms = 0.0;
    }

    /// Jumps to `t`. Playback, if running, continues from there.
    pub fn scrub(&mut self, t: f64, total_ms: f64, now_ms: f64) {
        self.time_ms = t.clamp(0.0, total_ms.max(0.0));
        self.reanchor(now_ms);
    }

    /// Advances a playing clock to wall time `now_ms`.
    pub fn tick(&mut self, now_ms: f64, total_ms: f64) -> TickOutcome {
        let PlayState::Playing { anchor_wall_ms, anchor_time_ms } = self.state else {
            return TickOutcome::Idle;
        };
        let t = anchor_time_ms + (now_ms - anchor_wall_ms).max(0.0);
        if t < total_ms {
            self.time_ms = t;
            return TickOutcome::Advanced;
        }
        if self.looping && total_ms > 0.0 {
            self.time_ms = t % total_ms;
            TickOutcome::Wrapped
        } else {
            self.time_ms = total_ms.max(0.0);
            self.state = PlayState::Stopped;
            TickOutcome::Ended
        }
    }

    fn reanchor(&mut self, now_ms: f64) {
        if let PlayState::Playing { .. } = self.state {
            self.state = PlayState::Playing {
                anchor_wall_ms: now_ms,
                anchor_time_ms: self.time_ms,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_follows_wall_clock_regardless_of_tick_spacing() {
        let mut a = PlaybackClock::new();
        let mut b = PlaybackClock::new();
        a.play(1000.0, 5000.0);
        b.play(1000.0, 5000.0);
        a.tick(2500.0, 5000.0);
        for now in [1016.0, 1100.0, 1730.0, 2011.0, 2500.0] {
            b.tick(now, 5000.0);
        }
        assert_eq!(a.current_time(), 1500.0);
        assert_eq!(a.current_time(), b.current_time());
    }

    #[test]
    fn test_end_without_loop_stops_at_total() {
        let mut clock = PlaybackClock::new();
        clock.play(0.0, 3000.0);
        assert_eq!(clock.tick(3500.0, 3000.0), TickOutcome::Ended);
        assert_eq!(clock.current_time(), 3000.0);
        assert!(!clock.is_playing());
        clock.play(4000.0, 3000.0);
        assert_eq!(clock.current_time(), 0.0);
    }

    #[test]
    fn test_loop_wraps() {
        let mut clock = PlaybackClock::new();
        clock.set_looping(true, 0.0);
        clock.play(0.0, 3000.0);
        assert_eq!(clock.tick(3500.0, 3000.0), TickOutcome::Wrapped);
        assert_eq!(clock.current_time(), 500.0);
        assert!(clock.is_playing());
    }

    #[test]
    fn test_pause_freezes_time() {
        let mut clock = PlaybackClock::new();
        clock.play(0.0, 3000.0);
        clock.pause(1200.0, 3000.0);
        assert_eq!(clock.state(), PlayState::Paused);
        assert_eq!(clock.tick(2900.0, 3000.0), TickOutcome::Idle);
        assert_eq!(clock.current_time(), 1200.0);
    }

    #[test]
    fn test_scrub_while_playing_reanchors() {
        let mut clock = PlaybackClock::new();
        clock.play(0.0, 10_000.0);
        clock.scrub(4000.0, 10_000.0, 500.0);
        clock.tick(1500.0, 10_000.0);
        assert_eq!(clock.current_time(), 5000.0);
    }
}
