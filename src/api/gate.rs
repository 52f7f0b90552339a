use std::future::Future;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default pause after each request before the next one may start.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_millis(300);

/// Admission control for outbound API calls: one request in flight at a
/// time, and a fixed quiet period after each completes before the permit
/// is handed to the next caller.
#[derive(Debug)]
pub struct RequestGate {
    permits: Semaphore,
    cooldown: Duration,
}

impl RequestGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            permits: Semaphore::new(1),
            cooldown,
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Run `fut` while holding the only permit. The permit is released once
    /// the cooldown has elapsed, whether `fut` succeeded or not.
    pub async fn run<F, T>(&self, fut: F) -> anyhow::Result<T>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| anyhow::anyhow!("request gate closed: {}", e))?;
        let out = fut.await;
        if !self.cooldown.is_zero() {
            tokio::time::sleep(self.cooldown).await;
        }
        out
    }
}

impl Default for RequestGate {
    fn default() -> Self {
        Self::new(DEFAULT_COOLDOWN)
    }
}
