//! Bookkeeping shared by the pool and its creation tasks

use std::collections::{HashMap, HashSet};
use std::ops::RangeInclusive;
use ahash::RandomState;

use crate::session::SessionState;

pub(crate) enum Slot<H> {
    Initializing { attempt: u64, autoplay: bool },
    Ready { handle: H, playing: bool },
}

pub(crate) struct PoolState<H> {
    pub(crate) focus: Option<i64>,
    pub(crate) slots: HashMap<i64, Slot<H>, RandomState>,
    pub(crate) failed: HashSet<i64, RandomState>,
    /// position → attempt whose creation is still running, whether or not
    /// the position still holds a slot; released only by the attempt's guard
    pub(crate) initializing: HashMap<i64, u64, RandomState>,
    pub(crate) generation: u64,
    next_attempt: u64,
}

impl<H> PoolState<H> {
    pub(crate) fn new() -> Self {
        Self {
            focus: None,
            slots: HashMap::default(),
            failed: HashSet::default(),
            initializing: HashMap::default(),
            generation: 0,
            next_attempt: 0,
        }
    }

    pub(crate) fn next_attempt(&mut self) -> u64 {
        self.next_attempt += 1;
        self.next_attempt
    }

    pub(crate) fn window(&self, radius: u32) -> Option<RangeInclusive<i64>> {
        self.focus.map(|focus| window_around(focus, radius))
    }

    pub(crate) fn state_of(&self, position: i64) -> SessionState {
        if self.failed.contains(&position) {
            return SessionState::Failed;
        }
        match self.slots.get(&position) {
            Some(Slot::Initializing { .. }) => SessionState::Initializing,
            Some(Slot::Ready { playing, .. }) => SessionState::Ready { playing: *playing },
            None => SessionState::Uninitialized,
        }
    }

    /// Whether `attempt` still owns the slot at `position`
    pub(crate) fn owns(&self, position: i64, attempt: u64) -> bool {
        matches!(
            self.slots.get(&position),
            Some(Slot::Initializing { attempt: current, .. }) if *current == attempt
        )
    }

    /// Ready sessions
    pub(crate) fn ready_count(&self) -> usize {
        self.slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { .. }))
            .count()
    }

    /// Sessions holding resources: Ready ones plus every running creation,
    /// including creations whose position has left the window
    pub(crate) fn live_count(&self) -> usize {
        self.ready_count() + self.initializing.len()
    }
}

pub(crate) fn window_around(focus: i64, radius: u32) -> RangeInclusive<i64> {
    let radius = i64::from(radius);
    focus.saturating_sub(radius)..=focus.saturating_add(radius)
}
