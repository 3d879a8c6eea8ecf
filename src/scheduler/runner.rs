use std::future::Future;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::{sleep, Instant};

use super::error::SchedulingError;
use super::state::Scheduler;
use super::timer::WakeTimer;

const WAKE_QUEUE: usize = 4;

/// Requests an out-of-schedule cycle.
#[derive(Clone)]
pub struct WakeHandle {
    tx: mpsc::Sender<()>,
}

impl WakeHandle {
    /// Returns false when the request was dropped.
    pub fn wake(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::warn!("Wake request dropped, queue full");
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }
}

/// Drives the scheduler from a single task: startup, then one cycle per
/// timer expiry or wake request.
pub struct Runner {
    scheduler: Scheduler,
    timer: WakeTimer,
    wake_tx: mpsc::Sender<()>,
    wake_rx: mpsc::Receiver<()>,
}

impl Runner {
    pub fn new(scheduler: Scheduler) -> Self {
        let (wake_tx, wake_rx) = mpsc::channel(WAKE_QUEUE);
        Self {
            scheduler,
            timer: WakeTimer::new(),
            wake_tx,
            wake_rx,
        }
    }

    pub fn handle(&self) -> WakeHandle {
        WakeHandle {
            tx: self.wake_tx.clone(),
        }
    }

    /// Run until Ctrl-C or until the cadence stops.
    pub async fn run(self) -> Result<(), SchedulingError> {
        self.run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                log::error!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await
    }

    /// Run until `shutdown` resolves (checked between cycles) or until the
    /// cadence stops.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), SchedulingError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        if let Err(e) = self.scheduler.configure_modem() {
            log::error!("Modem configuration failed: {}", e);
        }

        let plan = self.scheduler.startup()?;
        let planned = Instant::now();
        if let Some(hex) = plan.frame {
            self.send_with_retries(&hex).await;
        }
        // The first wake counts from the plan, not from the last retry.
        self.timer.arm(plan.first_wake.saturating_sub(planned.elapsed()));

        loop {
            let external = tokio::select! {
                _ = self.timer.expired() => false,
                Some(()) = self.wake_rx.recv() => true,
                _ = &mut shutdown => {
                    log::info!("Shutting down");
                    self.timer.disarm();
                    return Ok(());
                }
            };
            if external {
                log::info!("Cycle requested");
            }

            let next = self.scheduler.run_cycle();
            self.drop_pending_wakes();

            match next {
                Ok(after) => self.timer.arm(after),
                Err(e) => {
                    self.timer.disarm();
                    return Err(e);
                }
            }
        }
    }

    async fn send_with_retries(&mut self, hex: &str) {
        let attempts = self.scheduler.settings().startup_attempts;
        let delay = self.scheduler.settings().retry_delay;

        for attempt in 1..=attempts {
            if self.scheduler.transmit(hex) {
                return;
            }
            log::warn!("Startup transmission attempt {}/{} failed", attempt, attempts);
            if attempt < attempts {
                sleep(delay).await;
            }
        }
    }

    fn drop_pending_wakes(&mut self) {
        let mut dropped = 0;
        while self.wake_rx.try_recv().is_ok() {
            dropped += 1;
        }
        if dropped > 0 {
            log::warn!("Dropped {} wake request(s) received during a cycle", dropped);
        }
    }
}
