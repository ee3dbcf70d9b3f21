//! Mutex - pode bloquear thread
//!
//! No alvo hosted o Mutex que dorme é o do sistema hospedeiro. Os helpers
//! abaixo recuperam o guard de um lock envenenado: todo invariante protegido
//! por estes locks é restabelecido antes de qualquer código que possa dar
//! panic, então os dados continuam consistentes.

use std::sync::PoisonError;
use std::time::Duration;

pub use std::sync::{Condvar as CondVar, Mutex, MutexGuard};

/// Adquire o lock (pode bloquear)
pub fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Dorme na condição, liberando o lock atomicamente.
pub fn wait<'a, T>(cv: &CondVar, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
    cv.wait(guard).unwrap_or_else(PoisonError::into_inner)
}

/// Dorme na condição por no máximo `timeout`.
///
/// Retorna o guard e `true` se o tempo esgotou.
pub fn wait_timeout<'a, T>(
    cv: &CondVar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
) -> (MutexGuard<'a, T>, bool) {
    match cv.wait_timeout(guard, timeout) {
        Ok((guard, result)) => (guard, result.timed_out()),
        Err(poisoned) => {
            let (guard, result) = poisoned.into_inner();
            (guard, result.timed_out())
        }
    }
}

/// Dorme enquanto `condition` for verdadeira, por no máximo `timeout`.
///
/// Retorna o guard e `true` se o tempo esgotou com a condição ainda válida.
pub fn wait_timeout_while<'a, T, F>(
    cv: &CondVar,
    guard: MutexGuard<'a, T>,
    timeout: Duration,
    condition: F,
) -> (MutexGuard<'a, T>, bool)
where
    F: FnMut(&mut T) -> bool,
{
    match cv.wait_timeout_while(guard, timeout, condition) {
        Ok((guard, result)) => (guard, result.timed_out()),
        Err(poisoned) => {
            let (guard, result) = poisoned.into_inner();
            (guard, result.timed_out())
        }
    }
}
