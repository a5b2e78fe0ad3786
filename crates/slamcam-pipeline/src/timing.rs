use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Slots in the rolling window.
pub const WINDOW: usize = 10;

/// Source of "now" for the loop.
pub trait Clock {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to. Clones share the same time, so a
/// test camera and a test engine can both advance it.
#[derive(Debug, Clone)]
pub struct ManualClock {
    base: Instant,
    offset: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { base: Instant::now(), offset: Rc::new(Cell::new(Duration::ZERO)) }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn advance_secs(&self, secs: f64) {
        self.advance(Duration::from_secs_f64(secs));
    }

    /// Time advanced since construction.
    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.base + self.offset.get()
    }
}

/// Fixed ring of the last [`WINDOW`] frame timestamps.
///
/// Pushing returns the span between the new timestamp and the one it
/// overwrites, i.e. the time taken by the last `WINDOW` frames once the ring
/// is full. Slots start at zero, so the first `WINDOW` spans are measured
/// from pipeline start.
#[derive(Debug, Clone, PartialEq)]
pub struct RollingIntervalBuffer {
    slots: [f64; WINDOW],
    cursor: usize,
    writes: u64,
}

impl Default for RollingIntervalBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingIntervalBuffer {
    pub fn new() -> Self {
        Self { slots: [0.0; WINDOW], cursor: 0, writes: 0 }
    }

    pub fn push(&mut self, timestamp: f64) -> f64 {
        let span = timestamp - self.slots[self.cursor];
        self.slots[self.cursor] = timestamp;
        self.cursor = (self.cursor + 1) % WINDOW;
        self.writes += 1;
        span
    }

    /// Frames per second over a span returned by [`push`](Self::push).
    pub fn rate(span: f64) -> Option<f64> {
        (span > 0.0).then(|| WINDOW as f64 / span)
    }

    pub fn slots(&self) -> &[f64; WINDOW] {
        &self.slots
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn writes(&self) -> u64 {
        self.writes
    }
}
