//! Tick pacing and step timing statistics.
//!
//! [`TickClock`] turns wall-clock time into a whole number of fixed-length
//! simulation ticks, so the flock advances at the same rate whatever the host
//! frame rate is. [`StepTimings`] keeps a rolling window of how long each
//! `step` took.
//!
//! ```ignore
//! let mut clock = TickClock::default();
//! loop {
//!     for _ in 0..clock.advance(frame_time) {
//!         sim.step(clock.fixed_delta())?;
//!     }
//! }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

/// Default simulation rate in ticks per second.
pub const DEFAULT_TICK_RATE: f32 = 60.0;

/// Number of samples kept by [`StepTimings`].
pub const TIMING_WINDOW: usize = 300;

/// Upper bound on ticks returned by one [`TickClock::advance`] call.
///
/// Stops a long stall from being paid back as a burst of catch-up ticks.
const MAX_CATCH_UP_TICKS: u32 = 5;

/// Fixed-rate tick accumulator.
#[derive(Clone, Debug)]
pub struct TickClock {
    tick_rate: f32,
    accumulator: f32,
    time_scale: f32,
    paused: bool,
    frame: u64,
    elapsed: f64,
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_RATE)
    }
}

impl TickClock {
    /// Clock producing `tick_rate` ticks per second. Non-positive rates fall
    /// back to [`DEFAULT_TICK_RATE`].
    pub fn new(tick_rate: f32) -> Self {
        let tick_rate = if tick_rate.is_finite() && tick_rate > 0.0 {
            tick_rate
        } else {
            DEFAULT_TICK_RATE
        };
        Self {
            tick_rate,
            accumulator: 0.0,
            time_scale: 1.0,
            paused: false,
            frame: 0,
            elapsed: 0.0,
        }
    }

    /// Seconds of simulated time per tick.
    pub fn fixed_delta(&self) -> f32 {
        1.0 / self.tick_rate
    }

    pub fn tick_rate(&self) -> f32 {
        self.tick_rate
    }

    /// Feed `real` wall-clock time; returns how many ticks are due.
    pub fn advance(&mut self, real: Duration) -> u32 {
        if self.paused {
            return 0;
        }
        let dt = self.fixed_delta();
        self.accumulator += real.as_secs_f32() * self.time_scale;

        let mut ticks = 0;
        while self.accumulator >= dt && ticks < MAX_CATCH_UP_TICKS {
            self.accumulator -= dt;
            ticks += 1;
        }
        if ticks == MAX_CATCH_UP_TICKS {
            self.accumulator = self.accumulator.min(dt);
        }

        self.frame += ticks as u64;
        self.elapsed += ticks as f64 * dt as f64;
        ticks
    }

    /// Ticks emitted so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Simulated seconds emitted so far.
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause(&mut self) {
        self.paused = true;
    }

    pub fn resume(&mut self) {
        self.paused = false;
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Speed up or slow down simulated time. Negative or non-finite values
    /// are treated as 0.
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = if scale.is_finite() { scale.max(0.0) } else { 0.0 };
    }

    /// Back to tick 0, keeping rate, scale and pause state.
    pub fn reset(&mut self) {
        self.accumulator = 0.0;
        self.frame = 0;
        self.elapsed = 0.0;
    }
}

/// Rolling window of step durations.
#[derive(Clone, Debug, Default)]
pub struct StepTimings {
    samples: VecDeque<Duration>,
}

impl StepTimings {
    pub fn new() -> Self {
        Self {
            samples: VecDeque::with_capacity(TIMING_WINDOW),
        }
    }

    pub fn record(&mut self, sample: Duration) {
        if self.samples.len() == TIMING_WINDOW {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<Duration> {
        self.samples.back().copied()
    }

    pub fn average(&self) -> Option<Duration> {
        if self.samples.is_empty() {
            return None;
        }
        let total: Duration = self.samples.iter().sum();
        Some(total / self.samples.len() as u32)
    }

    pub fn min(&self) -> Option<Duration> {
        self.samples.iter().min().copied()
    }

    pub fn max(&self) -> Option<Duration> {
        self.samples.iter().max().copied()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_fixed_ticks() {
        let mut clock = TickClock::new(50.0);
        assert_eq!(clock.advance(Duration::from_millis(10)), 0);
        assert_eq!(clock.advance(Duration::from_millis(15)), 1);
        assert_eq!(clock.advance(Duration::from_millis(40)), 2);
        assert_eq!(clock.frame(), 3);
        assert!((clock.elapsed() - 0.06).abs() < 1e-6);
    }

    #[test]
    fn test_clock_pause() {
        let mut clock = TickClock::default();
        clock.pause();
        assert_eq!(clock.advance(Duration::from_secs(1)), 0);
        clock.toggle_pause();
        assert!(!clock.is_paused());
        assert_eq!(clock.advance(Duration::from_millis(34)), 2);
    }

    #[test]
    fn test_clock_catch_up_capped() {
        let mut clock = TickClock::default();
        assert_eq!(clock.advance(Duration::from_secs(10)), 5);
        assert!(clock.advance(Duration::ZERO) <= 1);
    }

    #[test]
    fn test_clock_time_scale() {
        let mut clock = TickClock::new(10.0);
        clock.set_time_scale(2.0);
        assert_eq!(clock.advance(Duration::from_millis(100)), 2);
        clock.set_time_scale(-1.0);
        assert_eq!(clock.time_scale(), 0.0);
        assert_eq!(TickClock::new(0.0).tick_rate(), DEFAULT_TICK_RATE);
        clock.reset();
        assert_eq!(clock.frame(), 0);
    }

    #[test]
    fn test_timings_window() {
        let mut timings = StepTimings::new();
        assert!(timings.average().is_none());
        for ms in 1..=(TIMING_WINDOW as u64 + 10) {
            timings.record(Duration::from_millis(ms));
        }
        assert_eq!(timings.len(), TIMING_WINDOW);
        assert_eq!(timings.min(), Some(Duration::from_millis(11)));
        assert_eq!(timings.max(), Some(Duration::from_millis(310)));
        assert_eq!(timings.last(), Some(Duration::from_millis(310)));
        assert_eq!(timings.average(), Some(Duration::from_micros(160_500)));
    }
}
