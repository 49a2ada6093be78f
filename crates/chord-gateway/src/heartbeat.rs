//! Heartbeat scheduler
//!
//! Sends a heartbeat frame carrying the latest sequence number on the interval announced by the
//! server's hello. At most one heartbeat task exists per scheduler; a running task must be
//! stopped before a new one is started.
//!
//! Missing heartbeat acknowledgements are not treated as a failure.

use std::time::Duration;

use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

use crate::protocol::GatewayFrame;

/// Heartbeat scheduler errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeartbeatError {
    #[error("Heartbeat task already running")]
    AlreadyRunning,

    #[error("Heartbeat interval must be greater than zero")]
    ZeroInterval,
}

struct HeartbeatTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Owner of the (single) heartbeat task
#[derive(Default)]
pub struct HeartbeatScheduler {
    task: Option<HeartbeatTask>,
}

impl HeartbeatScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start heartbeating every `interval`
    ///
    /// The first heartbeat is sent immediately. Each tick reads the most recent value from
    /// `sequence`. The task ends on [`stop`](Self::stop) or once `outbound` is closed.
    pub fn start(
        &mut self,
        interval: Duration,
        sequence: watch::Receiver<Option<u64>>,
        outbound: mpsc::Sender<GatewayFrame>,
    ) -> Result<(), HeartbeatError> {
        if interval.is_zero() {
            return Err(HeartbeatError::ZeroInterval);
        }
        if self.is_running() {
            return Err(HeartbeatError::AlreadyRunning);
        }

        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(run(interval, sequence, outbound, stop_rx));

        debug!(interval_ms = interval.as_millis(), "Heartbeat started");
        self.task = Some(HeartbeatTask { stop, handle });
        Ok(())
    }

    /// Stop the task and wait until it has exited
    ///
    /// No heartbeat is sent after this returns. Calling it with no task is a no-op.
    pub async fn stop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };

        let _ = task.stop.send(());
        if let Err(e) = task.handle.await {
            if e.is_panic() {
                tracing::error!(error = %e, "Heartbeat task panicked");
            }
        }
        debug!("Heartbeat stopped");
    }

    /// Check whether a heartbeat task is alive
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }
}

impl Drop for HeartbeatScheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.handle.abort();
        }
    }
}

async fn run(
    interval: Duration,
    sequence: watch::Receiver<Option<u64>>,
    outbound: mpsc::Sender<GatewayFrame>,
    mut stop: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {
                let seq = *sequence.borrow();
                if outbound.send(GatewayFrame::heartbeat(seq)).await.is_err() {
                    debug!("Outbound channel closed, heartbeat task exiting");
                    break;
                }
                trace!(sequence = ?seq, "Heartbeat sent");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::OpCode;

    #[tokio::test(start_paused = true)]
    async fn test_ticks_immediately_then_on_interval() {
        let (_seq_tx, seq_rx) = watch::channel(None);
        let (tx, mut rx) = mpsc::channel(8);
        let mut scheduler = HeartbeatScheduler::new();

        scheduler
            .start(Duration::from_millis(1000), seq_rx, tx)
            .unwrap();

        let started = tokio::time::Instant::now();
        let first = rx.recv().await.unwrap();
        assert_eq!(first.op, OpCode::Heartbeat);
        assert_eq!(first.d, None);
        assert!(started.elapsed() < Duration::from_millis(1000));

        rx.recv().await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(1000));

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_echoes_latest_sequence() {
        let (seq_tx, seq_rx) = watch::channel(None);
        let (tx, mut rx) = mpsc::channel(8);
        let mut scheduler = HeartbeatScheduler::new();

        scheduler.start(Duration::from_secs(5), seq_rx, tx).unwrap();
        rx.recv().await.unwrap();

        seq_tx.send_replace(Some(41));
        seq_tx.send_replace(Some(42));

        let beat = rx.recv().await.unwrap();
        assert_eq!(beat, GatewayFrame::heartbeat(Some(42)));

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_rejected() {
        let (_seq_tx, seq_rx) = watch::channel(None);
        let (tx, mut rx) = mpsc::channel(8);
        let mut scheduler = HeartbeatScheduler::new();

        scheduler
            .start(Duration::from_secs(1), seq_rx.clone(), tx.clone())
            .unwrap();
        assert!(scheduler.is_running());

        assert_eq!(
            scheduler.start(Duration::from_secs(2), seq_rx.clone(), tx.clone()),
            Err(HeartbeatError::AlreadyRunning)
        );

        // the first task keeps its own cadence
        rx.recv().await.unwrap();
        let after_first = tokio::time::Instant::now();
        rx.recv().await.unwrap();
        assert_eq!(after_first.elapsed(), Duration::from_secs(1));

        scheduler.stop().await;
        assert!(!scheduler.is_running());

        scheduler.start(Duration::from_secs(2), seq_rx, tx).unwrap();
        rx.recv().await.unwrap();
        let restarted = tokio::time::Instant::now();
        rx.recv().await.unwrap();
        assert_eq!(restarted.elapsed(), Duration::from_secs(2));
        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_heartbeat_after_stop() {
        let (_seq_tx, seq_rx) = watch::channel(Some(1));
        let (tx, mut rx) = mpsc::channel(8);
        let mut scheduler = HeartbeatScheduler::new();

        scheduler.start(Duration::from_secs(1), seq_rx, tx).unwrap();
        rx.recv().await.unwrap();

        scheduler.stop().await;
        scheduler.stop().await;

        // The task held the last sender; once it has exited the channel reports closed.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_task_exits_when_outbound_closed() {
        let (_seq_tx, seq_rx) = watch::channel(None);
        let (tx, rx) = mpsc::channel(8);
        let mut scheduler = HeartbeatScheduler::new();
        drop(rx);

        scheduler.start(Duration::from_secs(1), seq_rx, tx).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!scheduler.is_running());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let (_seq_tx, seq_rx) = watch::channel(None);
        let (tx, _rx) = mpsc::channel(1);
        let mut scheduler = HeartbeatScheduler::new();

        assert_eq!(
            scheduler.start(Duration::ZERO, seq_rx, tx),
            Err(HeartbeatError::ZeroInterval)
        );
    }
}
