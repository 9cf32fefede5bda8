#[cfg(test)]
pub(crate) mod rng;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Locks a mutex, ignoring poisoning.
///
/// Payloads never run while a clock lock is held, so a poisoned lock can only
/// result from a panic in the clock itself and the protected state is still
/// consistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
