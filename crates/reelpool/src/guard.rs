//! Scoped ownership of an in-flight creation
//!
//! The `initializing` entry for a position is inserted under the pool lock
//! before the first suspension point, and released only by dropping this
//! guard. Success, failure, panic and task cancellation all end in `Drop`,
//! so a position can never stay stuck initializing.

use std::sync::Arc;
use parking_lot::Mutex;
use tracing::debug;

use crate::state::{PoolState, Slot};

/// Releases one creation attempt's claim on a position when dropped
pub(crate) struct InitGuard<H> {
    state: Arc<Mutex<PoolState<H>>>,
    position: i64,
    attempt: u64,
}

impl<H> InitGuard<H> {
    /// Claim `position` for `attempt`; the caller holds the pool lock and
    /// passes the locked state in
    pub(crate) fn claim(
        shared: &Arc<Mutex<PoolState<H>>>,
        state: &mut PoolState<H>,
        position: i64,
        attempt: u64,
    ) -> Self {
        state.initializing.insert(position, attempt);
        Self {
            state: Arc::clone(shared),
            position,
            attempt,
        }
    }
}

impl<H> Drop for InitGuard<H> {
    fn drop(&mut self) {
        let mut state = self.state.lock();

        if state.initializing.get(&self.position) == Some(&self.attempt) {
            state.initializing.remove(&self.position);
        }

        // A slot still Initializing under this attempt was never resolved.
        let orphaned = matches!(
            state.slots.get(&self.position),
            Some(Slot::Initializing { attempt, .. }) if *attempt == self.attempt
        );
        if orphaned {
            state.slots.remove(&self.position);
            debug!(position = self.position, attempt = self.attempt, "removed orphaned initializing slot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared() -> Arc<Mutex<PoolState<()>>> {
        Arc::new(Mutex::new(PoolState::new()))
    }

    #[test]
    fn test_drop_releases_claim_and_orphan() {
        let shared = shared();
        let guard = {
            let mut state = shared.lock();
            let attempt = state.next_attempt();
            state.slots.insert(4, Slot::Initializing { attempt, autoplay: true });
            InitGuard::claim(&shared, &mut state, 4, attempt)
        };
        assert!(shared.lock().initializing.contains_key(&4));

        drop(guard);

        let state = shared.lock();
        assert!(state.initializing.is_empty());
        assert!(state.slots.is_empty());
    }

    #[test]
    fn test_drop_keeps_resolved_slot() {
        let shared = shared();
        let guard = {
            let mut state = shared.lock();
            let attempt = state.next_attempt();
            state.slots.insert(4, Slot::Initializing { attempt, autoplay: false });
            InitGuard::claim(&shared, &mut state, 4, attempt)
        };
        shared.lock().slots.insert(4, Slot::Ready { handle: (), playing: false });

        drop(guard);

        let state = shared.lock();
        assert!(state.initializing.is_empty());
        assert!(state.slots.contains_key(&4));
    }

    #[test]
    fn test_drop_leaves_newer_attempt_alone() {
        let shared = shared();
        let stale = {
            let mut state = shared.lock();
            let attempt = state.next_attempt();
            InitGuard::claim(&shared, &mut state, 4, attempt)
        };
        {
            let mut state = shared.lock();
            let attempt = state.next_attempt();
            state.initializing.insert(4, attempt);
            state.slots.insert(4, Slot::Initializing { attempt, autoplay: false });
        }

        drop(stale);

        let state = shared.lock();
        assert!(state.initializing.contains_key(&4));
        assert!(state.slots.contains_key(&4));
    }
}
