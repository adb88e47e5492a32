// src/timing.rs

//! Computation and communication timing for one run.

use std::fmt;
use std::time::{Duration, Instant};

/// Wall-clock split of one partitioning run.
///
/// `computation` spans the whole coordinator run, from before partitioning
/// until the last slice is merged. `communication` is the part of it spent
/// inside channel sends and receives.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Timings {
    pub computation: Duration,
    pub communication: Duration,
}

impl Timings {
    pub fn computation_secs(&self) -> f64 {
        self.computation.as_secs_f64()
    }

    pub fn communication_secs(&self) -> f64 {
        self.communication.as_secs_f64()
    }

    /// Communication time over computation time; zero when nothing was
    /// computed.
    pub fn ratio(&self) -> f64 {
        let computation = self.computation_secs();
        if computation == 0.0 {
            0.0
        } else {
            self.communication_secs() / computation
        }
    }
}

impl fmt::Display for Timings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Total Computation Time: {} seconds", self.computation_secs())?;
        writeln!(f, "Total Communication Time: {} seconds", self.communication_secs())?;
        write!(f, "C-to-C Ratio: {}", self.ratio())
    }
}

/// Accumulates time spent in the transport.
#[derive(Debug, Default)]
pub(crate) struct CommClock {
    total: Duration,
}

impl CommClock {
    pub(crate) fn measure<T>(&mut self, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.total += start.elapsed();
        out
    }

    pub(crate) fn total(&self) -> Duration {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_log::test]
    fn ratio_divides_communication_by_computation() {
        let timings = Timings {
            computation: Duration::from_millis(400),
            communication: Duration::from_millis(100),
        };
        assert!((timings.ratio() - 0.25).abs() < 1e-12);
        assert_eq!(Timings::default().ratio(), 0.0);
    }

    #[test_log::test]
    fn report_lines_come_in_fixed_order() {
        let timings = Timings {
            computation: Duration::from_secs(2),
            communication: Duration::from_secs(1),
        };
        let text = timings.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Total Computation Time: 2"));
        assert!(lines[1].starts_with("Total Communication Time: 1"));
        assert_eq!(lines[2], "C-to-C Ratio: 0.5");
    }

    #[test_log::test]
    fn comm_clock_accumulates_across_calls() {
        let mut clock = CommClock::default();
        let value = clock.measure(|| {
            std::thread::sleep(Duration::from_millis(2));
            7
        });
        clock.measure(|| std::thread::sleep(Duration::from_millis(2)));
        assert_eq!(value, 7);
        assert!(clock.total() >= Duration::from_millis(4));
    }
}
