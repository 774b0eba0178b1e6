//! Trailing-window log of dispatch starts
use std::collections::VecDeque;
use std::time::Duration;

use tokio::time::Instant;

use crate::settings::DispatchSettings;

/// Outcome of an admission check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// A dispatch may start now
    Ready,
    /// The window is saturated; check again after this long
    Wait(Duration),
}

/// Timestamps of recent dispatch starts, oldest first.
///
/// Entries are pruned lazily, immediately before each admission check,
/// so the log only ever holds starts that are inside the trailing window
/// at the moment it is inspected.
#[derive(Clone, Debug)]
pub struct RequestWindow {
    timestamps: VecDeque<Instant>,
    window: Duration,
    max_per_window: usize,
    safety_margin: Duration,
}

impl RequestWindow {
    pub fn new(settings: &DispatchSettings) -> Self {
        Self {
            timestamps: VecDeque::with_capacity(settings.max_per_window),
            window: settings.window,
            max_per_window: settings.max_per_window,
            safety_margin: settings.safety_margin,
        }
    }

    pub fn max_per_window(&self) -> usize {
        self.max_per_window
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn in_window(&self, stamp: Instant, now: Instant) -> bool {
        now.saturating_duration_since(stamp) < self.window
    }

    /// Discard every start that is a full window or more before `now`
    pub fn prune(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if self.in_window(oldest, now) {
                break;
            }
            self.timestamps.pop_front();
        }
    }

    /// Prune, then decide whether a dispatch may start at `now`.
    ///
    /// When saturated the wait is measured from the oldest surviving start:
    /// `window - (now - oldest) + safety_margin`.
    pub fn admit(&mut self, now: Instant) -> Admission {
        self.prune(now);
        if self.timestamps.len() < self.max_per_window {
            return Admission::Ready;
        }
        match self.timestamps.front() {
            Some(&oldest) => {
                let elapsed = now.saturating_duration_since(oldest);
                Admission::Wait(
                    self.window
                        .saturating_sub(elapsed)
                        .saturating_add(self.safety_margin),
                )
            }
            None => Admission::Ready,
        }
    }

    pub fn record(&mut self, now: Instant) {
        self.timestamps.push_back(now);
    }

    /// Starts inside the trailing window at `now`, without pruning
    pub fn recent_count(&self, now: Instant) -> usize {
        self.timestamps
            .iter()
            .filter(|&&stamp| self.in_window(stamp, now))
            .count()
    }
}
