//! SleepLock - lock que dorme, com aquisição de espera limitada
//!
//! Modela o lock de um arquivo (vnode) de backing. O laundry NUNCA espera
//! indefinidamente por ele: um `read()` pode estar parado em `vm_wait`
//! segurando o mesmo arquivo, e só o pageout pode liberar a memória que ele
//! espera. Por isso a aquisição do lado do pageout é `try_lock_for`.

use std::time::{Duration, Instant};

use super::mutex::{self, CondVar, Mutex};

/// Lock exclusivo que pode dormir, com timeout.
#[derive(Debug, Default)]
pub struct SleepLock {
    held: Mutex<bool>,
    cv: CondVar,
}

impl SleepLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adquire o lock (pode bloquear indefinidamente)
    pub fn lock(&self) -> SleepLockGuard<'_> {
        let mut held = mutex::lock(&self.held);
        while *held {
            held = mutex::wait(&self.cv, held);
        }
        *held = true;
        SleepLockGuard { lock: self }
    }

    /// Espera pelo lock por no máximo `timeout`.
    pub fn try_lock_for(&self, timeout: Duration) -> Option<SleepLockGuard<'_>> {
        let deadline = Instant::now() + timeout;
        let mut held = mutex::lock(&self.held);
        while *held {
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = mutex::wait_timeout(&self.cv, held, deadline - now);
            held = guard;
        }
        *held = true;
        Some(SleepLockGuard { lock: self })
    }

    pub fn is_locked(&self) -> bool {
        *mutex::lock(&self.held)
    }

    fn unlock(&self) {
        *mutex::lock(&self.held) = false;
        self.cv.notify_one();
    }
}

/// Guard de um `SleepLock`
#[derive(Debug)]
pub struct SleepLockGuard<'a> {
    lock: &'a SleepLock,
}

impl Drop for SleepLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn timed_acquire_gives_up_while_held() {
        let lock = SleepLock::new();
        let _held = lock.lock();
        let start = Instant::now();
        assert!(lock.try_lock_for(Duration::from_millis(20)).is_none());
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn timed_acquire_succeeds_after_release() {
        let lock = Arc::new(SleepLock::new());
        let guard = lock.lock();
        let waiter = {
            let lock = Arc::clone(&lock);
            thread::spawn(move || lock.try_lock_for(Duration::from_secs(5)).is_some())
        };
        thread::sleep(Duration::from_millis(10));
        drop(guard);
        assert!(waiter.join().unwrap());
        assert!(!lock.is_locked());
    }
}
