use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-spacing limiter. Callers await `pace()` before each upstream
/// request; it returns once at least `min_interval` has passed since the
/// previous paced call. The lock is held across the sleep so concurrent
/// callers line up single file instead of stampeding the provider.
#[derive(Clone)]
pub struct Pacer {
    min_interval: Duration,
    last: Arc<Mutex<Option<Instant>>>,
}

impl Pacer {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last: Arc::new(Mutex::new(None)),
        }
    }

    /// Read the spacing in milliseconds from `var`, falling back to
    /// `default_ms` when unset or unparseable.
    pub fn from_env(var: &str, default_ms: u64) -> Self {
        let ms = std::env::var(var)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default_ms);
        Self::new(Duration::from_millis(ms))
    }

    pub async fn pace(&self) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait = self.min_interval - elapsed;
                tracing::debug!("Pacing upstream call: waiting {:.2}s", wait.as_secs_f64());
                tokio::time::sleep(wait).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_pace_does_not_wait() {
        let pacer = Pacer::new(Duration::from_secs(5));
        let started = std::time::Instant::now();
        pacer.pace().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn consecutive_paces_are_spaced_apart() {
        let pacer = Pacer::new(Duration::from_millis(50));
        let started = std::time::Instant::now();
        pacer.pace().await;
        pacer.pace().await;
        pacer.pace().await;
        assert!(started.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn concurrent_paces_serialize() {
        let pacer = Pacer::new(Duration::from_millis(40));
        let started = std::time::Instant::now();
        tokio::join!(pacer.pace(), pacer.pace(), pacer.pace());
        assert!(started.elapsed() >= Duration::from_millis(80));
    }
}
