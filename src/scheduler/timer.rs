use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep_until, Instant, Sleep};

/// Re-armable one-shot wake. Arming replaces any pending deadline.
pub struct WakeTimer {
    sleep: Pin<Box<Sleep>>,
    deadline: Option<Instant>,
}

impl WakeTimer {
    pub fn new() -> Self {
        Self {
            sleep: Box::pin(sleep_until(Instant::now())),
            deadline: None,
        }
    }

    pub fn arm(&mut self, after: Duration) {
        let deadline = Instant::now() + after;
        self.sleep.as_mut().reset(deadline);
        self.deadline = Some(deadline);
    }

    pub fn disarm(&mut self) {
        self.deadline = None;
    }

    #[cfg(test)]
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    #[cfg(test)]
    pub fn is_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Resolve when the armed deadline passes. Never resolves while disarmed.
    pub async fn expired(&mut self) {
        if self.deadline.is_none() {
            pending::<()>().await;
        }
        self.sleep.as_mut().await;
        self.deadline = None;
    }
}

impl Default for WakeTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let mut timer = WakeTimer::new();
        let start = Instant::now();
        timer.arm(Duration::from_secs(90));
        assert!(timer.is_armed());

        timer.expired().await;
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(90));
        assert!(elapsed < Duration::from_secs(91));
        assert!(!timer.is_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn rearm_replaces_deadline() {
        let mut timer = WakeTimer::new();
        let start = Instant::now();
        timer.arm(Duration::from_secs(3600));
        timer.arm(Duration::from_secs(10));

        timer.expired().await;
        assert!(start.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_never_fires() {
        let mut timer = WakeTimer::new();
        timer.arm(Duration::from_secs(5));
        timer.disarm();
        assert!(timer.deadline().is_none());

        let waited = timeout(Duration::from_secs(24 * 3600), timer.expired()).await;
        assert!(waited.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn new_timer_is_disarmed() {
        let mut timer = WakeTimer::default();
        assert!(!timer.is_armed());
        assert!(timeout(Duration::from_secs(60), timer.expired())
            .await
            .is_err());
    }
}
