//! Background task that triggers passes on reconnect and on a timer.

use crate::conflict::MergePayload;
use crate::executor::Executor;
use crate::orchestrator::SyncOrchestrator;
use crate::resolver::ConflictResolver;
use std::sync::Arc;
use syncq_core::Payload;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Handle to a running auto-sync task.
///
/// Dropping the handle aborts the task; [`shutdown`](Self::shutdown) stops it
/// gracefully, letting a running pass finish.
#[derive(Debug)]
pub struct AutoSyncHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AutoSyncHandle {
    /// Stops the task and waits for it to exit.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::warn!("auto-sync task ended abnormally: {}", e);
            }
        }
    }

    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for AutoSyncHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Trigger {
    Reconnect,
    Interval,
}

impl<T, E, R> SyncOrchestrator<T, E, R>
where
    T: Payload + MergePayload,
    E: Executor<T> + 'static,
    R: ConflictResolver<T> + 'static,
{
    /// Spawns the auto-sync task on the current tokio runtime.
    ///
    /// The task mirrors `connectivity` into [`set_online`](Self::set_online).
    /// With `auto_sync` enabled it also runs a pass when the signal goes from
    /// offline to online with pending work, and on every `sync_interval` tick
    /// while online, unpaused and idle. If the connectivity sender is dropped
    /// the last value stays in effect and the timer keeps running.
    pub fn spawn_auto_sync(self: &Arc<Self>, mut connectivity: watch::Receiver<bool>) -> AutoSyncHandle {
        let orchestrator = Arc::clone(self);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(async move {
            orchestrator.set_online(*connectivity.borrow_and_update());

            let period = orchestrator.config().tick_period();
            if period != orchestrator.config().sync_interval {
                tracing::warn!(
                    "sync interval {:?} too short, ticking every {:?}",
                    orchestrator.config().sync_interval,
                    period
                );
            }
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            ticker.tick().await;

            let mut signal_open = true;
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    changed = connectivity.changed(), if signal_open => match changed {
                        Ok(()) => {
                            let online = *connectivity.borrow_and_update();
                            orchestrator.set_online(online);
                        }
                        Err(_) => {
                            tracing::debug!("connectivity signal closed");
                            signal_open = false;
                        }
                    },
                    () = orchestrator.wake().notified() => orchestrator.auto_pass(Trigger::Reconnect).await,
                    _ = ticker.tick() => orchestrator.auto_pass(Trigger::Interval).await,
                }
            }
            tracing::debug!("auto-sync task stopped");
        });

        AutoSyncHandle {
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    async fn auto_pass(&self, trigger: Trigger) {
        if !self.config().auto_sync {
            return;
        }
        if !self.is_online() || self.is_paused() || self.is_syncing() || self.pending_count() == 0 {
            return;
        }
        tracing::debug!("auto-sync triggered by {:?}", trigger);
        if let Err(e) = self.sync_now().await {
            tracing::warn!("auto-sync pass failed: {}", e);
        }
    }
}
