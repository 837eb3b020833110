//! Periodic sampler tasks.
//!
//! A [`PeriodicTask`] runs an async tick function on a fixed period until it
//! is stopped. The tick future is awaited inside the task loop, so ticks of
//! one task never overlap; a tick that overruns its period swallows the
//! missed ticks instead of bursting to catch up.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::debug;

/// Handle to a spawned periodic task.
///
/// Dropping the handle stops the task.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    shutdown_notify: Arc<Notify>,
    is_running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawns `tick` every `period`, first firing one period from now.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Parameters
    /// - `name`: Label used in logs
    /// - `period`: Delay between tick starts; zero is raised to one millisecond
    /// - `tick`: Produces the future for one tick
    pub fn spawn<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let period = period.max(Duration::from_millis(1));
        let shutdown_notify = Arc::new(Notify::new());
        let is_running = Arc::new(AtomicBool::new(true));

        let worker_shutdown = shutdown_notify.clone();
        let worker_running = is_running.clone();
        let handle = tokio::spawn(async move {
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = worker_shutdown.notified() => break,
                    _ = timer.tick() => {
                        if !worker_running.load(Ordering::Acquire) {
                            break;
                        }
                        tick().await;
                    }
                }
            }
            debug!(task = name, "periodic task stopped");
        });

        debug!(task = name, ?period, "periodic task started");
        Self {
            name,
            shutdown_notify,
            is_running,
            handle: Some(handle),
        }
    }

    /// Signals the task to stop. A tick already in flight completes first.
    pub fn stop(&self) {
        if self.is_running.swap(false, Ordering::AcqRel) {
            self.shutdown_notify.notify_one();
        }
    }

    /// Stops the task and waits for it to exit.
    pub async fn shutdown(&mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_running(&self) -> bool {
        self.is_running.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
