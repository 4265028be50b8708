use std::time::Instant;

use crate::host::FrameRequest;

/// Whether a next-repaint callback is outstanding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
}

/// What the mount must do with the host after a speed or visibility change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopCommand {
    /// Request a frame and hand it back through [`RenderLoop::mark_scheduled`].
    Schedule,
    Cancel(FrameRequest),
    Idle,
}

/// Animation clock plus the run/stop state machine.
///
/// The clock accumulates `wall delta × effective speed` in milliseconds. The
/// effective speed follows the requested speed except while the document is
/// hidden, when it is forced to zero.
#[derive(Debug)]
pub(crate) struct RenderLoop {
    requested_speed: f32,
    effective_speed: f32,
    hidden: bool,
    clock_ms: f64,
    last_tick: Instant,
    scheduled: Option<FrameRequest>,
}

impl RenderLoop {
    pub fn new(frame: f64, now: Instant) -> Self {
        Self {
            requested_speed: 0.0,
            effective_speed: 0.0,
            hidden: false,
            clock_ms: frame,
            last_tick: now,
            scheduled: None,
        }
    }

    pub fn requested_speed(&self) -> f32 {
        self.requested_speed
    }

    pub fn effective_speed(&self) -> f32 {
        self.effective_speed
    }

    pub fn clock(&self) -> f64 {
        self.clock_ms
    }

    pub fn state(&self) -> LoopState {
        if self.scheduled.is_some() {
            LoopState::Running
        } else {
            LoopState::Stopped
        }
    }

    pub fn set_speed(&mut self, speed: f32, now: Instant) -> LoopCommand {
        self.requested_speed = speed;
        self.apply_effective_speed(now)
    }

    pub fn set_hidden(&mut self, hidden: bool, now: Instant) -> LoopCommand {
        self.hidden = hidden;
        self.apply_effective_speed(now)
    }

    fn apply_effective_speed(&mut self, now: Instant) -> LoopCommand {
        self.effective_speed = if self.hidden {
            0.0
        } else {
            self.requested_speed
        };

        if self.effective_speed == 0.0 {
            return match self.scheduled.take() {
                Some(request) => LoopCommand::Cancel(request),
                None => LoopCommand::Idle,
            };
        }
        if self.scheduled.is_none() {
            // Time spent stopped must not show up as one huge delta.
            self.last_tick = now;
            return LoopCommand::Schedule;
        }
        LoopCommand::Idle
    }

    pub fn mark_scheduled(&mut self, request: FrameRequest) {
        self.scheduled = Some(request);
    }

    /// Consumes the outstanding request if `request` is it. Stale or cancelled
    /// callbacks return false.
    pub fn take_due(&mut self, request: FrameRequest) -> bool {
        if self.scheduled == Some(request) {
            self.scheduled = None;
            true
        } else {
            false
        }
    }

    /// True when the frame just rendered should be followed by another.
    pub fn wants_next_frame(&self) -> bool {
        self.effective_speed != 0.0 && self.scheduled.is_none()
    }

    /// Drops any outstanding request, returning it for cancellation.
    pub fn stop(&mut self) -> Option<FrameRequest> {
        self.scheduled.take()
    }

    /// Advances the clock by the wall time since the previous tick and returns
    /// the new clock value.
    pub fn advance(&mut self, now: Instant) -> f64 {
        let delta_ms = now.saturating_duration_since(self.last_tick).as_secs_f64() * 1000.0;
        self.last_tick = now;
        if self.effective_speed != 0.0 {
            self.clock_ms += delta_ms * f64::from(self.effective_speed);
        }
        tracing::trace!(delta_ms, clock_ms = self.clock_ms, "advanced animation clock");
        self.clock_ms
    }

    /// Forces the clock to `frame` and restarts delta measurement at `now`.
    pub fn set_frame(&mut self, frame: f64, now: Instant) {
        self.clock_ms = frame;
        self.last_tick = now;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn starting_schedules_once() {
        let start = Instant::now();
        let mut render_loop = RenderLoop::new(0.0, start);
        assert_eq!(render_loop.set_speed(1.0, start), LoopCommand::Schedule);
        render_loop.mark_scheduled(FrameRequest(1));
        assert_eq!(render_loop.set_speed(2.0, start), LoopCommand::Idle);
        assert_eq!(render_loop.state(), LoopState::Running);
    }

    #[test]
    fn stopping_cancels_outstanding_request() {
        let start = Instant::now();
        let mut render_loop = RenderLoop::new(0.0, start);
        render_loop.set_speed(1.0, start);
        render_loop.mark_scheduled(FrameRequest(7));
        assert_eq!(
            render_loop.set_speed(0.0, start),
            LoopCommand::Cancel(FrameRequest(7))
        );
        assert_eq!(render_loop.state(), LoopState::Stopped);
        assert!(!render_loop.take_due(FrameRequest(7)));
    }

    #[test]
    fn hidden_document_forces_zero_speed() {
        let start = Instant::now();
        let mut render_loop = RenderLoop::new(0.0, start);
        assert_eq!(render_loop.set_hidden(true, start), LoopCommand::Idle);
        assert_eq!(render_loop.set_speed(1.5, start), LoopCommand::Idle);
        assert_eq!(render_loop.effective_speed(), 0.0);
        assert_eq!(render_loop.requested_speed(), 1.5);
        assert_eq!(render_loop.set_hidden(false, start), LoopCommand::Schedule);
        assert_eq!(render_loop.effective_speed(), 1.5);
    }

    #[test]
    fn clock_scales_wall_time_by_speed() {
        let start = Instant::now();
        let mut render_loop = RenderLoop::new(100.0, start);
        render_loop.set_speed(-0.5, start);
        let clock = render_loop.advance(start + Duration::from_millis(40));
        assert!((clock - 80.0).abs() < 1e-6);
    }

    #[test]
    fn resuming_ignores_time_spent_stopped() {
        let start = Instant::now();
        let mut render_loop = RenderLoop::new(0.0, start);
        let later = start + Duration::from_secs(30);
        render_loop.set_speed(1.0, later);
        let clock = render_loop.advance(later + Duration::from_millis(16));
        assert!((clock - 16.0).abs() < 1e-6);
    }

    #[test]
    fn set_frame_resets_delta_reference() {
        let start = Instant::now();
        let mut render_loop = RenderLoop::new(0.0, start);
        render_loop.set_speed(1.0, start);
        let now = start + Duration::from_secs(5);
        render_loop.set_frame(1234.5, now);
        assert_eq!(render_loop.advance(now), 1234.5);
    }
}
