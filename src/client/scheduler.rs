use futures_channel::oneshot;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Drives the heartbeat on a fixed interval.
///
/// Each tick is awaited to completion before the next one is considered, and ticks that
/// would have fired meanwhile are skipped, so a slow exchange never overlaps the next one.
/// The loop runs as a detached tokio task: it does not keep a runtime alive on its own and
/// ends when cancelled or when the scheduler is dropped.
pub struct HeartbeatScheduler {
    interval: Duration,
    cancel: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl HeartbeatScheduler {
    pub fn new(interval: Duration) -> HeartbeatScheduler {
        HeartbeatScheduler {
            interval,
            cancel: None,
            task: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Starts calling `tick` once per interval, the first call one interval from now.
    /// A running schedule is cancelled first.
    pub fn start<F, Fut>(&mut self, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();

        let (cancel_tx, mut cancel_rx) = oneshot::channel::<()>();
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = &mut cancel_rx => {
                        log::debug!("Heartbeat schedule cancelled");
                        break;
                    }
                    _ = ticker.tick() => tick().await,
                }
            }
        });

        self.cancel = Some(cancel_tx);
        self.task = Some(task);
    }

    /// Stops future ticks. A tick already running is left to finish.
    pub fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            let _ = cancel.send(());
        }
        self.task = None;
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        self.cancel();
    }
}
