//! Counting semaphore bounding how many jobs execute at once
//!
//! Holders are admitted until `capacity` are inside the gate, further callers of [`AdmissionGate::acquire`] block until a [`Permit`] is dropped. Permits release on drop, which includes unwinding, so a failing or panicking job can't shrink the capacity.

use std::{fmt, num::NonZeroUsize, sync::Arc};

use parking_lot::{Condvar, Mutex};

#[derive(Clone)]
pub struct AdmissionGate {
    shared: Arc<GateShared>,
}

struct GateShared {
    capacity: NonZeroUsize,
    state: Mutex<GateState>,
    released: Condvar,
}

#[derive(Debug, Default)]
struct GateState {
    admitted: usize,
    peak: usize,
}

impl AdmissionGate {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            shared: Arc::new(GateShared {
                capacity,
                state: Mutex::new(GateState::default()),
                released: Condvar::new(),
            }),
        }
    }

    /// Block until there is a free slot, then take it. Admission order between waiters is unspecified
    pub fn acquire(&self) -> Permit {
        let mut state = self.shared.state.lock();
        while state.admitted >= self.shared.capacity.get() {
            self.shared.released.wait(&mut state);
        }
        self.admit(&mut state)
    }

    /// Take a slot if one is free right now
    pub fn try_acquire(&self) -> Option<Permit> {
        let mut state = self.shared.state.lock();
        if state.admitted < self.shared.capacity.get() {
            Some(self.admit(&mut state))
        } else {
            None
        }
    }

    fn admit(&self, state: &mut GateState) -> Permit {
        state.admitted += 1;
        state.peak = state.peak.max(state.admitted);
        debug_assert!(state.admitted <= self.shared.capacity.get());
        Permit {
            shared: self.shared.clone(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity.get()
    }

    /// Number of permits currently held
    pub fn admitted(&self) -> usize {
        self.shared.state.lock().admitted
    }

    /// Highest number of permits that were ever held at the same time
    pub fn peak(&self) -> usize {
        self.shared.state.lock().peak
    }
}

impl fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("AdmissionGate")
            .field("capacity", &self.shared.capacity)
            .field("admitted", &state.admitted)
            .field("peak", &state.peak)
            .finish()
    }
}

/// One admitted slot of an [`AdmissionGate`], the slot is given back when this is dropped
#[must_use = "the slot is released as soon as the permit is dropped"]
pub struct Permit {
    shared: Arc<GateShared>,
}

impl Permit {
    /// Give the slot back, same as dropping the permit
    pub fn release(self) {}
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut state = self.shared.state.lock();
        state.admitted -= 1;
        drop(state);
        self.shared.released.notify_one();
    }
}

impl fmt::Debug for Permit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Permit").finish_non_exhaustive()
    }
}
