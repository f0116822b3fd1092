//! Locating a record in another category and keeping it highlighted.

use std::time::{Duration, Instant};

use crate::record::{Category, Record};
use crate::viewport::ViewportWindow;

/// A record found in a target category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub position: usize,
    pub stable_index: i64,
}

pub fn find_exact(records: &[Record], stable_index: i64) -> Option<Match> {
    records
        .iter()
        .position(|r| r.stable_index == Some(stable_index))
        .map(|position| Match {
            position,
            stable_index,
        })
}

/// Record whose stable index is closest to `stable_index`. Ties go to the
/// smaller index; records without one are skipped.
pub fn find_nearest(records: &[Record], stable_index: i64) -> Option<Match> {
    let mut best: Option<(u64, Match)> = None;

    for (position, record) in records.iter().enumerate() {
        let Some(idx) = record.stable_index else {
            continue;
        };
        let diff = idx.abs_diff(stable_index);
        let better = match best {
            None => true,
            Some((best_diff, m)) => diff < best_diff || (diff == best_diff && idx < m.stable_index),
        };
        if better {
            best = Some((
                diff,
                Match {
                    position,
                    stable_index: idx,
                },
            ));
        }
    }

    best.map(|(_, m)| m)
}

/// The last double-clicked record, used to sync the next tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mark {
    pub stable_index: i64,
    pub source: Category,
    pub marked_at: Instant,
}

impl Mark {
    pub fn is_fresh(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.marked_at) < window
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HighlightTarget {
    pub category: Category,
    pub position: usize,
    pub stable_index: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HighlightState {
    #[default]
    Idle,
    AwaitingRender {
        target: HighlightTarget,
        requested_at: Instant,
    },
    Highlighted {
        target: HighlightTarget,
        deadline: Instant,
    },
    Expired,
}

/// Keeps one row highlighted across re-renders until its deadline passes.
#[derive(Debug, Clone)]
pub struct Highlighter {
    state: HighlightState,
    window: Duration,
}

impl Highlighter {
    pub fn new(window: Duration) -> Self {
        Self {
            state: HighlightState::Idle,
            window,
        }
    }

    pub fn state(&self) -> HighlightState {
        self.state
    }

    /// Replaces any running session with one for `target`.
    pub fn request(&mut self, target: HighlightTarget, now: Instant) {
        log::debug!(
            "highlight requested for {} in {} at row {}",
            target.stable_index,
            target.category.id(),
            target.position
        );
        self.state = HighlightState::AwaitingRender {
            target,
            requested_at: now,
        };
    }

    pub fn clear(&mut self) {
        self.state = HighlightState::Idle;
    }

    /// Target of a pending or shown highlight.
    pub fn target(&self) -> Option<HighlightTarget> {
        match self.state {
            HighlightState::AwaitingRender { target, .. }
            | HighlightState::Highlighted { target, .. } => Some(target),
            _ => None,
        }
    }

    /// Moves the target to `position` after its rows shifted, keeping the
    /// deadline. `None` means the record is gone and the highlight ends.
    pub fn relocate(&mut self, position: Option<usize>) {
        let Some(position) = position else {
            if self.target().is_some() {
                self.state = HighlightState::Idle;
            }
            return;
        };
        match &mut self.state {
            HighlightState::AwaitingRender { target, .. }
            | HighlightState::Highlighted { target, .. } => target.position = position,
            _ => {}
        }
    }

    /// Called after `category` materialized `window`.
    pub fn on_rendered(&mut self, category: Category, window: &ViewportWindow, now: Instant) {
        self.tick(now);
        if let HighlightState::AwaitingRender { target, .. } = self.state {
            if target.category == category && window.contains(target.position) {
                self.state = HighlightState::Highlighted {
                    target,
                    deadline: now + self.window,
                };
            }
        }
    }

    pub fn tick(&mut self, now: Instant) {
        match self.state {
            HighlightState::AwaitingRender { requested_at, .. }
                if now.saturating_duration_since(requested_at) >= self.window =>
            {
                self.state = HighlightState::Expired;
            }
            HighlightState::Highlighted { deadline, .. } if now >= deadline => {
                log::debug!("highlight expired");
                self.state = HighlightState::Expired;
            }
            _ => {}
        }
    }

    pub fn is_highlighted(&self, category: Category, position: usize, now: Instant) -> bool {
        match self.state {
            HighlightState::Highlighted { target, deadline } => {
                now < deadline && target.category == category && target.position == position
            }
            _ => false,
        }
    }

    /// Time left before the highlight clears, for scheduling a repaint.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        match self.state {
            HighlightState::Highlighted { deadline, .. } => {
                Some(deadline.saturating_duration_since(now))
            }
            _ => None,
        }
    }
}
