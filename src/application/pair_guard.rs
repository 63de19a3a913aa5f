//! Per-pair exclusivity for lifecycles.
//!
//! When enabled, a pair with a lifecycle in flight refuses new trades until
//! that lifecycle ends (completed, failed or panicked).

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Default)]
pub struct PairGuard {
    active: Arc<Mutex<HashSet<String>>>,
}

/// Held by a running lifecycle; releases the pair on drop
#[derive(Debug)]
pub struct PairLease {
    pair: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl PairGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim `pair`, or `None` if another lifecycle holds it
    pub fn try_acquire(&self, pair: &str) -> Option<PairLease> {
        if !self.lock().insert(pair.to_string()) {
            return None;
        }
        Some(PairLease {
            pair: pair.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_busy(&self, pair: &str) -> bool {
        self.lock().contains(pair)
    }
}

impl Drop for PairLease {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.pair);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_holder_per_pair() {
        let guard = PairGuard::new();
        let lease = guard.try_acquire("DOGEUSDT").unwrap();
        assert!(guard.try_acquire("DOGEUSDT").is_none());
        assert!(guard.try_acquire("BTCUSDT").is_some());
        drop(lease);
        assert!(!guard.is_busy("DOGEUSDT"));
        assert!(guard.try_acquire("DOGEUSDT").is_some());
    }

    #[tokio::test]
    async fn test_released_when_task_panics() {
        let guard = PairGuard::new();
        let lease = guard.try_acquire("DOGEUSDT").unwrap();
        let handle = tokio::spawn(async move {
            let _lease = lease;
            panic!("boom");
        });
        assert!(handle.await.is_err());
        assert!(!guard.is_busy("DOGEUSDT"));
    }
}
