use std::time::{Duration, Instant};

use enrelay::Note;

/// Default flush triggers: ten queued receipts or half a second of
/// quiet after the last arrival.
pub const FLUSH_SIZE: usize = 10;
pub const FLUSH_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Empty,
    Collecting { deadline: Instant },
}

/// Coalesces bursts of live receipt events before they are decoded and
/// merged, bounding both update churn and redundant profile fetches.
///
/// The clock is passed in by the caller, so flush behavior is
/// deterministic under test. Each enqueue restarts the delay timer;
/// hitting the size threshold flushes immediately.
#[derive(Debug)]
pub struct ReceiptBatcher {
    queue: Vec<Note>,
    flush_size: usize,
    delay: Duration,
    state: State,
}

impl Default for ReceiptBatcher {
    fn default() -> Self {
        Self::new(FLUSH_SIZE, FLUSH_DELAY)
    }
}

impl ReceiptBatcher {
    pub fn new(flush_size: usize, delay: Duration) -> Self {
        Self {
            queue: Vec::new(),
            flush_size: flush_size.max(1),
            delay,
            state: State::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// When the pending timer fires, if one is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.state {
            State::Empty => None,
            State::Collecting { deadline } => Some(deadline),
        }
    }

    /// Queue a receipt event. Returns the drained batch when the size
    /// threshold is reached, otherwise restarts the delay timer.
    pub fn enqueue(&mut self, note: Note, now: Instant) -> Option<Vec<Note>> {
        self.queue.push(note);

        if self.queue.len() >= self.flush_size {
            return Some(self.flush());
        }

        self.state = State::Collecting {
            deadline: now + self.delay,
        };
        None
    }

    /// Drain the queue if the timer has fired.
    pub fn poll(&mut self, now: Instant) -> Option<Vec<Note>> {
        match self.state {
            State::Collecting { deadline } if now >= deadline => Some(self.flush()),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.state = State::Empty;
    }

    fn flush(&mut self) -> Vec<Note> {
        self.state = State::Empty;
        std::mem::take(&mut self.queue)
    }
}
