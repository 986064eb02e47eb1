//! Task supervision
//!
//! Long-running loops are spawned through [`spawn_supervised`], which restarts
//! them with capped exponential backoff when they panic or return. A loop that
//! stays up long enough has its backoff reset, so a transient crash storm does
//! not permanently slow recovery.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Uptime after which a restarted task is considered stable again.
const STABLE_AFTER: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Backoff before the first restart
    pub base_backoff: Duration,
    /// Upper bound on the restart backoff
    pub max_backoff: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl SupervisorConfig {
    fn backoff_for(&self, consecutive_failures: u32) -> Duration {
        let shift = consecutive_failures.saturating_sub(1).min(16);
        let multiplied = self.base_backoff.saturating_mul(1u32 << shift);
        multiplied.min(self.max_backoff)
    }
}

/// Run `factory`'s future forever, restarting it after exits and panics.
///
/// Each restart goes through a fresh future from `factory`, so the closure
/// must capture everything the loop needs by `Arc` or clone.
pub fn spawn_supervised<F, Fut>(
    name: &'static str,
    config: SupervisorConfig,
    factory: F,
) -> JoinHandle<()>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let mut consecutive_failures: u32 = 0;
        loop {
            info!("Starting supervised task: {}", name);
            let started = tokio::time::Instant::now();

            // Inner spawn so a panic is contained to this task
            let handle = tokio::spawn(factory());
            match handle.await {
                Ok(()) => warn!("Supervised task {} exited, restarting", name),
                Err(e) if e.is_panic() => {
                    error!("Supervised task {} panicked, restarting", name);
                }
                Err(_) => {
                    info!("Supervised task {} cancelled, supervisor stopping", name);
                    return;
                }
            }

            if started.elapsed() >= STABLE_AFTER {
                consecutive_failures = 1;
            } else {
                consecutive_failures = consecutive_failures.saturating_add(1);
            }

            let backoff = config.backoff_for(consecutive_failures);
            warn!(
                "Restarting {} in {:?} (consecutive failures: {})",
                name, backoff, consecutive_failures
            );
            tokio::time::sleep(backoff).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            base_backoff: Duration::from_millis(5),
            max_backoff: Duration::from_millis(20),
        }
    }

    #[test]
    fn test_backoff_grows_and_caps() {
        let cfg = SupervisorConfig {
            base_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        };
        assert_eq!(cfg.backoff_for(1), Duration::from_secs(1));
        assert_eq!(cfg.backoff_for(2), Duration::from_secs(2));
        assert_eq!(cfg.backoff_for(3), Duration::from_secs(4));
        assert_eq!(cfg.backoff_for(4), Duration::from_secs(8));
        assert_eq!(cfg.backoff_for(10), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_restarts_after_exit() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);

        let handle = spawn_supervised("exits", fast_config(), move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();
        assert!(runs.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn test_restarts_after_panic() {
        let runs = Arc::new(AtomicU32::new(0));
        let counter = Arc::clone(&runs);

        let handle = spawn_supervised("panics", fast_config(), move || {
            let counter = Arc::clone(&counter);
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    panic!("boom");
                }
                // Third run settles down
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
        });

        tokio::time::sleep(Duration::from_millis(200)).await;
        handle.abort();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
