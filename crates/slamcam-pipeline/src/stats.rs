use std::fmt;
use std::time::Duration;

/// Running sums over tracked frames. Never reset during a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStatistics {
    total_tracking_time: Duration,
    frame_count: u64,
    last_timestamp: Option<f64>,
}

/// End-of-run report.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Summary {
    NoFrames,
    Measured {
        frames: u64,
        /// Seconds.
        mean_track_time: f64,
        mean_frame_rate: f64,
    },
}

impl RunStatistics {
    pub fn record(&mut self, tracking_time: Duration, timestamp: f64) {
        self.total_tracking_time += tracking_time;
        self.frame_count += 1;
        self.last_timestamp = Some(timestamp);
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn total_tracking_time(&self) -> Duration {
        self.total_tracking_time
    }

    /// Timestamp of the most recent tracked frame.
    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }

    /// Mean latency and mean rate over the run budget. Rate is reported as
    /// zero for a zero budget.
    pub fn summarize(&self, run_budget: f64) -> Summary {
        if self.frame_count == 0 {
            return Summary::NoFrames;
        }
        let n = self.frame_count as f64;
        Summary::Measured {
            frames: self.frame_count,
            mean_track_time: self.total_tracking_time.as_secs_f64() / n,
            mean_frame_rate: if run_budget > 0.0 { n / run_budget } else { 0.0 },
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Summary::NoFrames => write!(f, "no frames tracked"),
            Summary::Measured { frames, mean_track_time, mean_frame_rate } => write!(
                f,
                "mean track time: {:.4}s, mean fps: {:.2} ({} frames)",
                mean_track_time, mean_frame_rate, frames
            ),
        }
    }
}
