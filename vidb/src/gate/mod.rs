use parking_lot::{Mutex, MutexGuard};

/// Exclusive access to the guarded value; the gate is released on drop.
pub type GateGuard<'a, T> = MutexGuard<'a, T>;

/// Whole-store mutual exclusion.
///
/// Exactly one owner at a time and no reentrancy: acquiring twice from the
/// same thread deadlocks. Waiters block on the mutex instead of spinning.
#[derive(Debug, Default)]
pub struct LockGate<T> {
    inner: Mutex<T>,
}

impl<T> LockGate<T> {
    pub fn new(value: T) -> Self {
        LockGate {
            inner: Mutex::new(value),
        }
    }

    /// Block until the gate is free, then own it.
    pub fn acquire(&self) -> GateGuard<'_, T> {
        self.inner.lock()
    }

    /// Own the gate if it is free right now.
    pub fn try_acquire(&self) -> Option<GateGuard<'_, T>> {
        self.inner.try_lock()
    }

    /// Free the gate. Equivalent to dropping the guard.
    pub fn release(guard: GateGuard<'_, T>) {
        drop(guard);
    }

    pub fn is_busy(&self) -> bool {
        self.inner.is_locked()
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}
