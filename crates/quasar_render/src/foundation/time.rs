//! Frame timing

use std::time::{Duration, Instant};

const FPS_REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Frame timer producing per-frame delta time and a once-per-second FPS sample
pub struct FrameTimer {
    last_frame: Instant,
    delta_time: f32,
    total_time: f32,
    frame_count: u64,
    window_elapsed: Duration,
    window_frames: u32,
    last_fps: f32,
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameTimer {
    /// Create a new timer starting now
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta_time: 0.0,
            total_time: 0.0,
            frame_count: 0,
            window_elapsed: Duration::ZERO,
            window_frames: 0,
            last_fps: 0.0,
        }
    }

    /// Advance to the next frame using the wall clock.
    ///
    /// Returns the measured FPS when a full reporting interval has elapsed.
    pub fn tick(&mut self) -> Option<f32> {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_frame);
        self.last_frame = now;
        self.advance(elapsed)
    }

    /// Advance by an explicit frame duration
    pub fn advance(&mut self, elapsed: Duration) -> Option<f32> {
        self.delta_time = elapsed.as_secs_f32();
        self.total_time += self.delta_time;
        self.frame_count += 1;

        self.window_elapsed += elapsed;
        self.window_frames += 1;
        if self.window_elapsed < FPS_REPORT_INTERVAL {
            return None;
        }

        #[allow(clippy::cast_precision_loss)]
        let fps = self.window_frames as f32 / self.window_elapsed.as_secs_f32();
        self.window_elapsed = Duration::ZERO;
        self.window_frames = 0;
        self.last_fps = fps;
        Some(fps)
    }

    /// Forget the time spent while not rendering (e.g. while suspended)
    pub fn reset_clock(&mut self) {
        self.last_frame = Instant::now();
        self.window_elapsed = Duration::ZERO;
        self.window_frames = 0;
    }

    /// Time since the previous frame in seconds
    pub const fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Total time accumulated across frames in seconds
    pub const fn total_time(&self) -> f32 {
        self.total_time
    }

    /// Number of frames measured
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Most recent FPS sample
    pub const fn last_fps(&self) -> f32 {
        self.last_fps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_reports_once_per_second() {
        let mut timer = FrameTimer::new();
        let frame = Duration::from_millis(10);

        let reports: Vec<f32> = (0..250).filter_map(|_| timer.advance(frame)).collect();

        assert_eq!(reports.len(), 2);
        assert_relative_eq!(reports[0], 100.0, epsilon = 0.01);
        assert_eq!(timer.frame_count(), 250);
        assert_relative_eq!(timer.total_time(), 2.5, epsilon = 1e-3);
    }

    #[test]
    fn test_delta_time_tracks_last_frame() {
        let mut timer = FrameTimer::new();
        timer.advance(Duration::from_millis(16));
        assert_relative_eq!(timer.delta_time(), 0.016, epsilon = 1e-6);
    }

    #[test]
    fn test_reset_clock_discards_partial_window() {
        let mut timer = FrameTimer::new();
        timer.advance(Duration::from_millis(900));
        timer.reset_clock();
        assert!(timer.advance(Duration::from_millis(200)).is_none());
    }
}
