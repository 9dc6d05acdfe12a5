//! Readiness signals for late-arriving collaborators.
//!
//! A collaborator announces a named signal once its own setup completes;
//! dependents await the signal inside `initialize`. Waits are bounded by
//! `interval × attempts` from [`RuntimeConfig`] and fail with
//! [`Error::DependencyUnavailable`], which keeps a failed dependency from
//! leaving a half-mounted component behind.
//!
//! [`wait_for`] is the polling form, for collaborators that cannot announce.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use crate::config::RuntimeConfig;
use crate::error::{Error, Result};

/// Well-known signal names
pub mod signals {
    /// The host document has its containers in place
    pub const DOCUMENT: &str = "document";
    /// `ComponentRegistry::init` completed
    pub const REGISTRY: &str = "registry";
    /// The settings collaborator is usable
    pub const SETTINGS: &str = "settings";
}

/// Named one-shot readiness flags
pub struct ReadinessBoard {
    signals: Mutex<HashMap<String, Arc<watch::Sender<bool>>>>,
    interval: Duration,
    attempts: u32,
}

impl fmt::Debug for ReadinessBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadinessBoard")
            .field("ready", &self.ready())
            .field("deadline", &(self.interval * self.attempts))
            .finish()
    }
}

impl Default for ReadinessBoard {
    fn default() -> Self {
        Self::new(&RuntimeConfig::default())
    }
}

impl ReadinessBoard {
    /// Create a board using the config's wait bounds
    pub fn new(config: &RuntimeConfig) -> Self {
        Self {
            signals: Mutex::new(HashMap::new()),
            interval: config.dependency_poll_interval,
            attempts: config.dependency_max_attempts,
        }
    }

    /// Mark `name` ready; later calls are no-ops
    pub fn announce(&self, name: &str) {
        if !self.signal(name).send_replace(true) {
            tracing::info!(signal = name, "ready");
        }
    }

    /// Check a signal without waiting
    pub fn is_ready(&self, name: &str) -> bool {
        self.lock()
            .get(name)
            .is_some_and(|tx| *tx.borrow())
    }

    /// Names of every announced signal, sorted
    pub fn ready(&self) -> Vec<String> {
        let mut names: Vec<_> = self
            .lock()
            .iter()
            .filter(|(_, tx)| *tx.borrow())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Wait for `name` within the configured deadline
    pub async fn wait(&self, name: &str) -> Result<()> {
        let deadline = self.interval * self.attempts;
        let mut rx = self.signal(name).subscribe();
        match tokio::time::timeout(deadline, rx.wait_for(|ready| *ready)).await {
            Ok(Ok(_)) => Ok(()),
            _ => {
                tracing::warn!(signal = name, waited = ?deadline, "dependency never became ready");
                Err(Error::DependencyUnavailable {
                    dependency: name.to_string(),
                    attempts: self.attempts,
                    waited: deadline,
                })
            }
        }
    }

    fn signal(&self, name: &str) -> Arc<watch::Sender<bool>> {
        self.lock()
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(watch::Sender::new(false)))
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<watch::Sender<bool>>>> {
        self.signals.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Call `lookup` every `interval`, at most `attempts` times
///
/// Returns the first value the lookup yields. When every attempt misses, the
/// error is returned after `attempts × interval` has elapsed, never sooner.
pub async fn wait_for<T, F>(
    dependency: &str,
    interval: Duration,
    attempts: u32,
    mut lookup: F,
) -> Result<T>
where
    F: FnMut() -> Option<T>,
{
    for attempt in 1..=attempts {
        if let Some(found) = lookup() {
            tracing::debug!(dependency, attempt, "dependency available");
            return Ok(found);
        }
        tokio::time::sleep(interval).await;
    }

    tracing::warn!(dependency, attempts, "dependency wait exhausted");
    Err(Error::DependencyUnavailable {
        dependency: dependency.to_string(),
        attempts,
        waited: interval * attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn board(interval_ms: u64, attempts: u32) -> Arc<ReadinessBoard> {
        let config = RuntimeConfig::new()
            .with_dependency_wait(Duration::from_millis(interval_ms), attempts);
        Arc::new(ReadinessBoard::new(&config))
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_exhausts_after_full_budget() {
        let start = Instant::now();
        let err = wait_for::<(), _>("rules", Duration::from_millis(100), 50, || None)
            .await
            .unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_secs(5));
        assert!(matches!(err, Error::DependencyUnavailable { attempts: 50, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_returns_late_value() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let found = wait_for("rules", Duration::from_millis(100), 50, || {
            (calls.fetch_add(1, Ordering::SeqCst) == 3).then_some("loaded")
        })
        .await
        .unwrap();

        assert_eq!(found, "loaded");
        assert_eq!(start.elapsed(), Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_resolves_on_announce() {
        let board = board(100, 50);
        let announcer = board.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(250)).await;
            announcer.announce("rules");
        });

        let start = Instant::now();
        board.wait("rules").await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_millis(250));
        assert!(board.is_ready("rules"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_at_deadline() {
        let board = board(10, 5);
        let start = Instant::now();

        let err = board.wait("never").await.unwrap_err();

        assert_eq!(start.elapsed(), Duration::from_millis(50));
        assert!(matches!(err, Error::DependencyUnavailable { dependency, .. } if dependency == "never"));
    }

    #[tokio::test]
    async fn test_announce_before_wait() {
        let board = board(10, 1);
        board.announce(signals::DOCUMENT);
        board.announce(signals::DOCUMENT);

        board.wait(signals::DOCUMENT).await.unwrap();
        assert_eq!(board.ready(), vec!["document".to_string()]);
        assert!(!board.is_ready(signals::REGISTRY));
    }
}
