//! Submission busy indicator
//!
//! `Idle --submit--> Busy --(delay)--> Idle`. The delay is a fixed debounce,
//! not a measure of when the backend actually answered.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default time the busy indicator stays up after a submission
pub const DEFAULT_BUSY_DELAY: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Busy,
}

/// A reset scheduled by one submission
#[derive(Debug, Clone, Copy)]
struct PendingReset {
    token: u64,
    deadline: Instant,
}

/// Tracks the Busy/Idle state across submissions.
///
/// Every submission schedules its own reset, but only the reset belonging to
/// the most recent submission may clear `Busy`. An earlier reset firing
/// during a later submission's window is ignored.
#[derive(Debug)]
pub struct SubmissionController {
    state: SubmissionState,
    delay: Duration,
    /// Token of the latest submission
    latest: u64,
    /// Scheduled resets, in deadline order
    resets: VecDeque<PendingReset>,
}

impl Default for SubmissionController {
    fn default() -> Self {
        Self::new(DEFAULT_BUSY_DELAY)
    }
}

impl SubmissionController {
    pub fn new(delay: Duration) -> Self {
        Self {
            state: SubmissionState::Idle,
            delay,
            latest: 0,
            resets: VecDeque::new(),
        }
    }

    /// Mark a submission at `now`; returns its token
    pub fn submit(&mut self, now: Instant) -> u64 {
        self.latest += 1;
        self.state = SubmissionState::Busy;
        // Delay is fixed, so deadlines arrive already sorted
        self.resets.push_back(PendingReset {
            token: self.latest,
            deadline: now + self.delay,
        });
        self.latest
    }

    /// Fire every reset due at `now`. Returns true if the state changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let before = self.state;
        while let Some(reset) = self.resets.front().copied() {
            if reset.deadline > now {
                break;
            }
            self.resets.pop_front();
            if reset.token == self.latest {
                self.state = SubmissionState::Idle;
            }
        }
        before != self.state
    }

    /// Earliest scheduled reset, if any
    pub fn next_deadline(&self) -> Option<Instant> {
        self.resets.front().map(|r| r.deadline)
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == SubmissionState::Busy
    }

    #[allow(dead_code)]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}
