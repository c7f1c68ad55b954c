//! ResourcePool: windowed playback sessions keyed by feed position
//!
//! ## Guarantees
//! - Only positions inside `focus ± radius` hold a session once
//!   [`set_focus`](ResourcePool::set_focus) returns
//! - At most `max_concurrent` sessions are Ready or being created, counting
//!   creations abandoned by a focus move until they finish
//! - At most one creation per position is in flight
//! - At most one session is playing
//! - A failed position is never created again until
//!   [`teardown_all`](ResourcePool::teardown_all)
//!
//! Creation runs in a spawned task holding an [`InitGuard`], so dropping the
//! caller's future neither leaks a half-created handle nor leaves the
//! position stuck initializing.

use std::ops::RangeInclusive;
use std::sync::Arc;
use parking_lot::Mutex;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{debug, error, info, warn};

use crate::config::PoolConfig;
use crate::error::{CreationError, PoolError};
use crate::guard::InitGuard;
use crate::session::{Outcome, SessionFactory, SessionState, SkipReason};
use crate::state::{window_around, PoolState, Slot};
use crate::stats::{PoolCounters, PoolStats};

/// Bounded pool of playback sessions.
///
/// Cheap to clone; clones share the same sessions.
pub struct ResourcePool<F: SessionFactory> {
    inner: Arc<Inner<F>>,
}

struct Inner<F: SessionFactory> {
    factory: F,
    config: PoolConfig,
    state: Arc<Mutex<PoolState<F::Handle>>>,
    counters: PoolCounters,
}

impl<F: SessionFactory> Clone for ResourcePool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: SessionFactory> ResourcePool<F> {
    /// Create an empty pool with no focus
    pub fn new(factory: F, config: PoolConfig) -> Result<Self, PoolError> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(Inner {
                factory,
                config,
                state: Arc::new(Mutex::new(PoolState::new())),
                counters: PoolCounters::default(),
            }),
        })
    }

    /// The session factory
    pub fn factory(&self) -> &F {
        &self.inner.factory
    }

    /// Active configuration
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Move the focus and tear down every session outside the new window.
    ///
    /// Sessions leave the map first, then are paused and destroyed; all of
    /// it completes before this returns. In-flight creations outside the
    /// window lose their slot but keep their claim: they still count against
    /// `max_concurrent`, and destroy their handle on completion unless the
    /// position is requested again first.
    pub async fn set_focus(&self, position: i64) {
        let window = window_around(position, self.inner.config.window_radius);

        let released = {
            let mut state = self.inner.state.lock();
            let previous = state.focus.replace(position);

            let outside: Vec<i64> = state
                .slots
                .keys()
                .copied()
                .filter(|p| !window.contains(p))
                .collect();

            let mut released = Vec::with_capacity(outside.len());
            for pos in outside {
                match state.slots.remove(&pos) {
                    Some(Slot::Ready { handle, playing }) => released.push((pos, handle, playing)),
                    Some(Slot::Initializing { attempt, .. }) => {
                        debug!(position = pos, attempt, "abandoned creation outside window");
                    }
                    None => {}
                }
            }

            debug!(?previous, focus = position, released = released.len(), "focus moved");
            released
        };

        for (pos, handle, playing) in released {
            self.inner.release(pos, handle, playing).await;
        }
    }

    /// Make `position` the playing session, creating it if needed.
    ///
    /// Failed positions are a no-op. A Ready session is played after pausing
    /// every other one. An Initializing one is marked to play on completion.
    pub async fn activate(&self, position: i64, source: &str) -> Outcome {
        self.request(position, source, true).await
    }

    /// Create the session for `position` without playing it
    pub async fn preload(&self, position: i64, source: &str) -> Outcome {
        self.request(position, source, false).await
    }

    /// Pause every playing session; never fails
    pub fn pause_all(&self) {
        let mut state = self.inner.state.lock();
        pause_others(&self.inner.factory, &mut state, None);
    }

    /// Pause every playing session except `position`; never fails
    pub fn pause_all_except(&self, position: i64) {
        let mut state = self.inner.state.lock();
        pause_others(&self.inner.factory, &mut state, Some(position));
    }

    /// Pause and destroy every session and forget failures.
    ///
    /// In-flight creations lose their slot; unless their position is
    /// requested again first, they are discarded on completion and their
    /// failures are not recorded.
    pub async fn teardown_all(&self) {
        let released: Vec<_> = {
            let mut state = self.inner.state.lock();
            state.generation += 1;
            state.failed.clear();

            std::mem::take(&mut state.slots)
                .into_iter()
                .filter_map(|(pos, slot)| match slot {
                    Slot::Ready { handle, playing } => Some((pos, handle, playing)),
                    Slot::Initializing { .. } => None,
                })
                .collect()
        };

        info!(sessions = released.len(), "tearing down all sessions");
        for (pos, handle, playing) in released {
            self.inner.release(pos, handle, playing).await;
        }
    }

    /// Lifecycle state of `position`
    pub fn state(&self, position: i64) -> SessionState {
        self.inner.state.lock().state_of(position)
    }

    /// Whether `position` failed to initialize
    pub fn is_failed(&self, position: i64) -> bool {
        self.inner.state.lock().failed.contains(&position)
    }

    /// Current focus, if any
    pub fn focus(&self) -> Option<i64> {
        self.inner.state.lock().focus
    }

    /// Current keep window, if a focus is set
    pub fn window(&self) -> Option<RangeInclusive<i64>> {
        self.inner.state.lock().window(self.inner.config.window_radius)
    }

    /// Positions holding an Initializing or Ready session, ascending
    pub fn live_positions(&self) -> Vec<i64> {
        let mut positions: Vec<i64> = self.inner.state.lock().slots.keys().copied().collect();
        positions.sort_unstable();
        positions
    }

    /// Position of the playing session
    pub fn playing_position(&self) -> Option<i64> {
        self.inner
            .state
            .lock()
            .slots
            .iter()
            .find(|(_, slot)| matches!(slot, Slot::Ready { playing: true, .. }))
            .map(|(pos, _)| *pos)
    }

    /// Occupancy and lifetime counters
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();

        PoolStats {
            live: state.live_count(),
            initializing: state.initializing.len(),
            ready: state.ready_count(),
            failed: state.failed.len(),
            max_concurrent: self.inner.config.max_concurrent,
            generation: state.generation,
            ..PoolStats::default()
        }
        .with_counters(&self.inner.counters)
    }

    async fn request(&self, position: i64, source: &str, autoplay: bool) -> Outcome {
        let inner = &self.inner;

        let (guard, attempt, generation) = {
            let mut state = inner.state.lock();

            match state.state_of(position) {
                SessionState::Failed => return Outcome::Failed,
                SessionState::Ready { playing } => {
                    return if autoplay {
                        play_exclusive(&inner.factory, &mut state, position)
                    } else if playing {
                        Outcome::Playing
                    } else {
                        Outcome::Ready
                    };
                }
                SessionState::Initializing => {
                    if let Some(Slot::Initializing { autoplay: pending, .. }) = state.slots.get_mut(&position) {
                        *pending |= autoplay;
                    }
                    return Outcome::Pending;
                }
                SessionState::Uninitialized => {}
            }

            let Some(window) = state.window(inner.config.window_radius) else {
                return Outcome::Skipped(SkipReason::NoFocus);
            };
            if position < 0 || !window.contains(&position) {
                return Outcome::Skipped(SkipReason::OutsideWindow);
            }
            if let Some(&attempt) = state.initializing.get(&position) {
                // Back in the window before its abandoned creation finished.
                state.slots.insert(position, Slot::Initializing { attempt, autoplay });
                debug!(position, attempt, "re-attached to running creation");
                return Outcome::Pending;
            }
            let live = state.live_count();
            if live >= inner.config.max_concurrent {
                debug!(position, live, "pool at capacity");
                return Outcome::Skipped(SkipReason::AtCapacity);
            }

            let attempt = state.next_attempt();
            state.slots.insert(position, Slot::Initializing { attempt, autoplay });
            let guard = InitGuard::claim(&inner.state, &mut state, position, attempt);
            (guard, attempt, state.generation)
        };

        debug!(position, attempt, autoplay, "creating session");
        let task = tokio::spawn(Arc::clone(inner).create_session(
            position,
            source.to_string(),
            attempt,
            generation,
            guard,
        ));

        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(position, error = %e, "session creation task died");
                let mut state = inner.state.lock();
                if state.generation == generation {
                    state.failed.insert(position);
                }
                Outcome::Failed
            }
        }
    }
}

impl<F: SessionFactory> Inner<F> {
    async fn create_session(
        self: Arc<Self>,
        position: i64,
        source: String,
        attempt: u64,
        generation: u64,
        _guard: InitGuard<F::Handle>,
    ) -> Outcome {
        // One deadline for create and init together.
        let deadline = Instant::now() + self.config.init_timeout;

        let created = match timeout_at(deadline, self.factory.create(&source)).await {
            Ok(Ok(handle)) => Ok(handle),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(CreationError::Timeout),
        };

        let ready = match created {
            Ok(mut handle) => {
                let initialized = timeout_at(deadline, self.factory.init(&mut handle)).await;
                match initialized {
                    Ok(Ok(())) => Ok(handle),
                    Ok(Err(e)) => {
                        self.factory.destroy(handle).await;
                        Err(e)
                    }
                    Err(_) => {
                        self.factory.destroy(handle).await;
                        Err(CreationError::Timeout)
                    }
                }
            }
            Err(e) => Err(e),
        };

        match ready {
            Ok(handle) => {
                if !self.config.first_frame_wait.is_zero() {
                    sleep(self.config.first_frame_wait).await;
                }
                self.install(position, handle, attempt).await
            }
            Err(e) => self.fail(position, attempt, generation, e),
        }
    }

    async fn install(&self, position: i64, handle: F::Handle, attempt: u64) -> Outcome {
        let leftover = {
            let mut state = self.state.lock();
            if state.owns(position, attempt) {
                let autoplay = matches!(
                    state.slots.get(&position),
                    Some(Slot::Initializing { autoplay: true, .. })
                );
                state.slots.insert(position, Slot::Ready { handle, playing: false });
                self.counters.record_created();
                info!(position, attempt, "session ready");

                return if autoplay && state.focus == Some(position) {
                    play_exclusive(&self.factory, &mut state, position)
                } else {
                    Outcome::Ready
                };
            }
            handle
        };

        debug!(position, attempt, "discarding session for a torn-down position");
        self.factory.destroy(leftover).await;
        self.counters.record_discarded();
        Outcome::Skipped(SkipReason::Superseded)
    }

    fn fail(&self, position: i64, attempt: u64, generation: u64, error: CreationError) -> Outcome {
        self.counters.record_failure(error == CreationError::Timeout);

        let mut state = self.state.lock();
        let owned = state.owns(position, attempt);
        if owned {
            state.slots.remove(&position);
        }
        if owned || state.generation == generation {
            state.failed.insert(position);
        }
        warn!(position, attempt, error = %error, "session creation failed, position marked failed");
        Outcome::Failed
    }

    /// Pause (if playing) then destroy; both steps always run
    async fn release(&self, position: i64, handle: F::Handle, playing: bool) {
        if playing {
            if let Err(e) = self.factory.pause(&handle) {
                warn!(position, error = %e, "pause failed during teardown");
            }
        }
        self.factory.destroy(handle).await;
        self.counters.record_destroyed();
        debug!(position, "session destroyed");
    }
}

fn pause_others<F: SessionFactory>(factory: &F, state: &mut PoolState<F::Handle>, keep: Option<i64>) {
    for (pos, slot) in state.slots.iter_mut() {
        if Some(*pos) == keep {
            continue;
        }
        if let Slot::Ready { handle, playing } = slot {
            if *playing {
                if let Err(e) = factory.pause(handle) {
                    warn!(position = *pos, error = %e, "pause failed");
                }
                *playing = false;
            }
        }
    }
}

fn play_exclusive<F: SessionFactory>(factory: &F, state: &mut PoolState<F::Handle>, position: i64) -> Outcome {
    pause_others(factory, state, Some(position));

    match state.slots.get_mut(&position) {
        Some(Slot::Ready { handle, playing }) => {
            if *playing {
                return Outcome::Playing;
            }
            match factory.play(handle) {
                Ok(()) => {
                    *playing = true;
                    debug!(position, "session playing");
                    Outcome::Playing
                }
                Err(e) => {
                    warn!(position, error = %e, "play failed");
                    Outcome::Ready
                }
            }
        }
        Some(Slot::Initializing { .. }) => Outcome::Pending,
        None => Outcome::Skipped(SkipReason::Superseded),
    }
}
