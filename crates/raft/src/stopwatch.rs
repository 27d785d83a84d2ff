//! Monotonic stopwatches for recovery timing.

use std::fmt;
use std::time::{Duration, Instant};

/// A monotonic elapsed-time counter that accumulates across start/stop
/// cycles.
///
/// Recovery uses two: a total timer started lazily on the first substantive
/// event and stopped at completion, and a restartable interval timer that
/// gates mid-recovery snapshots.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    accumulated: Duration,
    started_at: Option<Instant>,
}

impl Stopwatch {
    /// Creates a stopped stopwatch at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a running stopwatch.
    pub fn started() -> Self {
        Self { accumulated: Duration::ZERO, started_at: Some(Instant::now()) }
    }

    /// Starts the stopwatch. No-op when already running.
    pub fn start(&mut self) {
        if self.started_at.is_none() {
            self.started_at = Some(Instant::now());
        }
    }

    /// Stops the stopwatch, folding the running segment into the total.
    /// Returns the accumulated elapsed time.
    pub fn stop(&mut self) -> Duration {
        if let Some(started_at) = self.started_at.take() {
            self.accumulated += started_at.elapsed();
        }
        self.accumulated
    }

    /// Zeroes the stopwatch and leaves it stopped.
    pub fn reset(&mut self) {
        self.accumulated = Duration::ZERO;
        self.started_at = None;
    }

    /// Zeroes the stopwatch and starts it again, so the next interval is
    /// measured from now.
    pub fn restart(&mut self) {
        self.accumulated = Duration::ZERO;
        self.started_at = Some(Instant::now());
    }

    /// Total elapsed time, including the currently running segment.
    pub fn elapsed(&self) -> Duration {
        match self.started_at {
            Some(started_at) => self.accumulated + started_at.elapsed(),
            None => self.accumulated,
        }
    }

    /// True while the stopwatch is running.
    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }
}

impl fmt::Display for Stopwatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.elapsed())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::thread::sleep;

    use super::*;

    #[test]
    fn new_is_stopped_at_zero() {
        let watch = Stopwatch::new();
        assert!(!watch.is_running());
        assert_eq!(watch.elapsed(), Duration::ZERO);
    }

    #[test]
    fn started_accumulates() {
        let mut watch = Stopwatch::started();
        assert!(watch.is_running());
        sleep(Duration::from_millis(20));
        let total = watch.stop();
        assert!(total >= Duration::from_millis(20));
        assert!(!watch.is_running());
        // Stopped elapsed stays put.
        assert_eq!(watch.elapsed(), total);
    }

    #[test]
    fn accumulates_across_cycles() {
        let mut watch = Stopwatch::new();
        watch.start();
        sleep(Duration::from_millis(10));
        let first = watch.stop();
        watch.start();
        sleep(Duration::from_millis(10));
        let second = watch.stop();
        assert!(second > first);
        assert!(second >= Duration::from_millis(20));
    }

    #[test]
    fn start_while_running_is_noop() {
        let mut watch = Stopwatch::started();
        sleep(Duration::from_millis(10));
        watch.start();
        assert!(watch.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn restart_measures_from_now() {
        let mut watch = Stopwatch::started();
        sleep(Duration::from_millis(20));
        watch.restart();
        assert!(watch.is_running());
        assert!(watch.elapsed() < Duration::from_millis(20));
    }

    #[test]
    fn reset_zeroes_and_stops() {
        let mut watch = Stopwatch::started();
        sleep(Duration::from_millis(5));
        watch.reset();
        assert!(!watch.is_running());
        assert_eq!(watch.elapsed(), Duration::ZERO);
    }
}
