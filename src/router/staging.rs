use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Single-flight gate for page builds.
///
/// At most one page can be staging. A second load waits until the current one
/// releases the gate, or gives up after the timeout.
#[derive(Debug, Default)]
pub struct StagingGate {
    staging: Mutex<bool>,
    released: Condvar,
}

impl StagingGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims the gate, waiting up to `timeout` for the in-flight page. Returns `false`
    /// when the wait timed out; the gate is left untouched in that case.
    pub fn acquire(&self, timeout: Duration) -> bool {
        let staging = self.staging.lock().unwrap_or_else(|e| e.into_inner());
        let (mut staging, result) = self
            .released
            .wait_timeout_while(staging, timeout, |staging| *staging)
            .unwrap_or_else(|e| e.into_inner());

        if result.timed_out() && *staging {
            return false;
        }
        *staging = true;
        true
    }

    /// Releases the gate and wakes one waiter.
    pub fn release(&self) {
        *self.staging.lock().unwrap_or_else(|e| e.into_inner()) = false;
        self.released.notify_one();
    }

    pub fn is_staging(&self) -> bool {
        *self.staging.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn second_acquire_times_out_while_staging() {
        let gate = StagingGate::new();
        assert!(gate.acquire(Duration::from_millis(10)));
        assert!(gate.is_staging());

        let start = Instant::now();
        assert!(!gate.acquire(Duration::from_millis(30)));
        assert!(start.elapsed() >= Duration::from_millis(30));
        assert!(gate.is_staging());
    }

    #[test]
    fn waiter_proceeds_after_release() {
        let gate = Arc::new(StagingGate::new());
        assert!(gate.acquire(Duration::ZERO));

        let g = gate.clone();
        let waiter = std::thread::spawn(move || g.acquire(Duration::from_secs(5)));

        std::thread::sleep(Duration::from_millis(20));
        gate.release();

        assert!(waiter.join().unwrap());
        assert!(gate.is_staging());
    }
}
