use std::time::{Duration, Instant};

/// Frames run at most per [`FrameTimer::advance`]; a longer stall drops the backlog.
pub const MAX_CATCH_UP: u32 = 4;

/// Paces `retro_run` against the core's reported frame rate.
#[derive(Debug, Clone)]
pub struct FrameTimer {
    frame: Duration,
    accumulator: Duration,
    last_tick: Option<Instant>,
    last_frame: Option<Instant>,
}

impl FrameTimer {
    pub fn new(fps: f64) -> Self {
        Self {
            frame: frame_duration(fps),
            accumulator: Duration::ZERO,
            last_tick: None,
            last_frame: None,
        }
    }

    pub fn set_fps(&mut self, fps: f64) {
        self.frame = frame_duration(fps);
    }

    pub fn frame_duration(&self) -> Duration {
        self.frame
    }

    /// Forget accumulated time, e.g. after loading a state or resuming.
    pub fn reset(&mut self) {
        self.accumulator = Duration::ZERO;
        self.last_tick = None;
        self.last_frame = None;
    }

    /// Add the time since the previous call and return how many frames are due.
    pub fn advance(&mut self, now: Instant) -> u32 {
        let Some(last) = self.last_tick.replace(now) else {
            return 1;
        };
        self.accumulator += now.saturating_duration_since(last);

        let mut due = 0;
        while self.accumulator >= self.frame && due < MAX_CATCH_UP {
            self.accumulator -= self.frame;
            due += 1;
        }
        if due == MAX_CATCH_UP && self.accumulator >= self.frame {
            tracing::debug!(dropped = ?self.accumulator, "frame timer fell behind");
            self.accumulator = Duration::ZERO;
        }
        due
    }

    /// Microseconds to report to a `SET_FRAME_TIME_CALLBACK` core for the frame about to
    /// run. The core's `reference` is used for the first frame after a reset and while
    /// fast-forwarding.
    pub fn frame_delta(&mut self, now: Instant, reference: i64, fast_forward: bool) -> i64 {
        let previous = self.last_frame.replace(now);
        match previous {
            Some(previous) if !fast_forward => {
                i64::try_from(now.saturating_duration_since(previous).as_micros()).unwrap_or(i64::MAX)
            }
            _ => reference,
        }
    }
}

fn frame_duration(fps: f64) -> Duration {
    if fps.is_finite() && fps > 0.0 {
        Duration::from_secs_f64(1.0 / fps)
    } else {
        Duration::from_secs_f64(1.0 / 60.0)
    }
}
