//! Engine lock: process-wide reentrant mutex guarding the shared engine instance.
//!
//! The lock is tracked per owning OS thread with an explicit depth counter. A thread that
//! already holds the lock re-acquires it without blocking. [`EngineLock::temporary_release`]
//! hands the lock to other threads for a scope and restores the exact prior depth afterwards.
//!
//! Once any thread has acquired the lock, the discipline is `active` for the life of the
//! instance. There is no way to turn it off again.

use crate::error::LockError;
use parking_lot::{Condvar, Mutex};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, ThreadId};
use tracing::{debug, error, trace};

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ThreadId>,
    depth: usize,
}

#[derive(Debug, Default)]
pub struct EngineLock {
    state: Mutex<LockState>,
    available: Condvar,
    active: AtomicBool,
}

impl EngineLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any thread has engaged the lock discipline on this instance.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Engage the discipline without taking the lock.
    pub fn activate(&self) {
        if !self.active.swap(true, Ordering::AcqRel) {
            debug!("engine lock discipline activated");
        }
    }

    /// Whether the calling thread holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner == Some(thread::current().id())
    }

    /// Reentrancy depth held by the calling thread (0 if it does not hold the lock).
    pub fn depth(&self) -> usize {
        let state = self.state.lock();
        if state.owner == Some(thread::current().id()) {
            state.depth
        } else {
            0
        }
    }

    /// Block until the calling thread holds the lock. Returns the new depth.
    pub fn acquire(&self) -> usize {
        self.activate();
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            state.depth += 1;
            trace!(depth = state.depth, "engine lock re-entered");
            return state.depth;
        }
        while state.owner.is_some() {
            self.available.wait(&mut state);
        }
        state.owner = Some(me);
        state.depth = 1;
        trace!(depth = 1, "engine lock acquired");
        1
    }

    /// Drop one level of the calling thread's hold. Returns the remaining depth; at zero the
    /// lock is handed to one waiting thread.
    pub fn release(&self) -> Result<usize, LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        match state.owner {
            Some(owner) if owner == me => {}
            Some(_) => {
                error!("engine lock released by a thread that does not hold it");
                return Err(LockError::NotHeld);
            }
            None => {
                error!("engine lock released with depth already zero");
                return Err(LockError::ReleaseWithoutAcquire);
            }
        }
        state.depth -= 1;
        let depth = state.depth;
        if depth == 0 {
            state.owner = None;
            drop(state);
            self.available.notify_one();
            trace!("engine lock released");
        } else {
            trace!(depth, "engine lock depth decremented");
        }
        Ok(depth)
    }

    /// Acquire for the lifetime of the returned guard.
    pub fn lock(&self) -> EngineLockGuard<'_> {
        self.acquire();
        EngineLockGuard {
            lock: self,
            _not_send: PhantomData,
        }
    }

    /// Give the lock up entirely until the returned scope is restored or dropped.
    ///
    /// The calling thread must hold the lock.
    pub fn temporary_release(&self) -> Result<UnlockedScope<'_>, LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner != Some(me) {
            error!("temporary release requested without holding the engine lock");
            return Err(LockError::NotHeld);
        }
        let saved_depth = state.depth;
        state.owner = None;
        state.depth = 0;
        drop(state);
        self.available.notify_one();
        debug!(saved_depth, "engine lock temporarily released");
        Ok(UnlockedScope {
            lock: self,
            saved_depth,
            restored: false,
            _not_send: PhantomData,
        })
    }

    fn restore_depth(&self, saved_depth: usize) -> Result<(), LockError> {
        let me = thread::current().id();
        let mut state = self.state.lock();
        if state.owner == Some(me) {
            // Re-acquired inside the unlocked scope and never released.
            let leaked = state.depth;
            state.depth = saved_depth;
            error!(leaked, saved_depth, "unbalanced acquire during temporary release");
            return Err(LockError::UnbalancedRestore { depth: leaked });
        }
        while state.owner.is_some() {
            self.available.wait(&mut state);
        }
        state.owner = Some(me);
        state.depth = saved_depth;
        debug!(depth = saved_depth, "engine lock restored");
        Ok(())
    }
}

/// Holds one level of the engine lock; released on drop.
#[must_use = "the engine lock is released as soon as the guard is dropped"]
pub struct EngineLockGuard<'a> {
    lock: &'a EngineLock,
    _not_send: PhantomData<*const ()>,
}

impl EngineLockGuard<'_> {
    pub fn depth(&self) -> usize {
        self.lock.depth()
    }

    /// See [`EngineLock::temporary_release`].
    pub fn unlocked(&self) -> Result<UnlockedScope<'_>, LockError> {
        self.lock.temporary_release()
    }
}

impl Drop for EngineLockGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.lock.release() {
            error!(error = %err, "engine lock guard could not release");
            if !thread::panicking() {
                panic!("engine lock guard dropped in an invalid state: {err}");
            }
        }
    }
}

/// Scope during which the calling thread has given up the engine lock.
#[must_use = "the engine lock is re-acquired as soon as the scope is dropped"]
pub struct UnlockedScope<'a> {
    lock: &'a EngineLock,
    saved_depth: usize,
    restored: bool,
    _not_send: PhantomData<*const ()>,
}

impl UnlockedScope<'_> {
    pub fn saved_depth(&self) -> usize {
        self.saved_depth
    }

    /// Re-acquire the lock at the depth held before the release. Blocks until available.
    pub fn restore(mut self) -> Result<(), LockError> {
        self.restored = true;
        self.lock.restore_depth(self.saved_depth)
    }
}

impl Drop for UnlockedScope<'_> {
    fn drop(&mut self) {
        if self.restored {
            return;
        }
        if let Err(err) = self.lock.restore_depth(self.saved_depth) {
            if !thread::panicking() {
                panic!("engine lock restore failed: {err}");
            }
        }
    }
}
