//! Poll scheduler: one independent periodic task per channel.
//!
//! Ticks that fire while a cycle is still running are skipped rather than
//! queued. `stop` is cooperative: it never interrupts a cycle, it waits for
//! every task to return to `Idle` and exit.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use walletpush_common::config::AppConfig;
use walletpush_common::types::{Channel, PollState};
use walletpush_notifier::dispatcher::NotificationDispatcher;

use crate::explorer::{ExplorerClient, TrackedContract};
use crate::poller::{ChannelPoller, ChannelSnapshot};
use crate::progress::ProgressStore;

/// A channel poller together with its cadence.
struct ScheduledChannel {
    poller: Arc<ChannelPoller>,
    interval: Duration,
}

struct Running {
    stop_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

pub struct PollScheduler {
    channels: Vec<ScheduledChannel>,
    running: Mutex<Option<Running>>,
}

impl PollScheduler {
    pub fn new() -> Self {
        Self {
            channels: Vec::new(),
            running: Mutex::new(None),
        }
    }

    /// Add a channel polled every `interval`.
    pub fn with_channel(mut self, poller: ChannelPoller, interval: Duration) -> Self {
        self.channels.push(ScheduledChannel {
            poller: Arc::new(poller),
            interval,
        });
        self
    }

    /// Build a scheduler for every channel that has tracked contracts configured.
    ///
    /// Payments and requests share the standard cadence; invites use the slower one.
    pub fn from_config(
        config: &AppConfig,
        explorer: Arc<dyn ExplorerClient>,
        store: Arc<dyn ProgressStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        let mut scheduler = Self::new();

        for channel in Channel::ALL {
            let contracts = TrackedContract::from_config(config, channel);
            if contracts.is_empty() {
                tracing::info!(channel = %channel, "No tracked contracts, channel not scheduled");
                continue;
            }

            let interval_ms = match channel {
                Channel::InviteRedeemed => config.invites_polling_interval_ms,
                Channel::PaymentReceived | Channel::PaymentRequested => config.polling_interval_ms,
            };
            let poller = ChannelPoller::new(
                channel,
                contracts,
                explorer.clone(),
                store.clone(),
                dispatcher.clone(),
            );
            scheduler = scheduler.with_channel(poller, Duration::from_millis(interval_ms));
        }

        scheduler
    }

    /// Spawn one polling task per channel. No-op if already running.
    pub async fn run(&self) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            tracing::debug!("Poll scheduler already running");
            return;
        }

        for scheduled in &self.channels {
            scheduled.poller.load_progress().await;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handles = self
            .channels
            .iter()
            .map(|scheduled| {
                tracing::info!(
                    channel = %scheduled.poller.channel(),
                    interval_ms = scheduled.interval.as_millis() as u64,
                    "Starting channel poller"
                );
                tokio::spawn(poll_loop(
                    scheduled.poller.clone(),
                    scheduled.interval,
                    stop_rx.clone(),
                ))
            })
            .collect();

        *running = Some(Running { stop_tx, handles });
    }

    /// Stop all channel tasks and wait for in-flight cycles to finish.
    ///
    /// Safe to call repeatedly; once it returns no further ticks fire.
    pub async fn stop(&self) {
        let Some(Running { stop_tx, handles }) = self.running.lock().await.take() else {
            return;
        };

        stop_tx.send_replace(true);
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Channel poller task failed");
            }
        }
        tracing::info!("Poll scheduler stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.channels.iter().map(|c| c.poller.channel()).collect()
    }

    /// Current state of every scheduled channel.
    pub async fn snapshots(&self) -> Vec<ChannelSnapshot> {
        let mut out = Vec::with_capacity(self.channels.len());
        for scheduled in &self.channels {
            out.push(scheduled.poller.status().snapshot().await);
        }
        out
    }
}

impl Default for PollScheduler {
    fn default() -> Self {
        Self::new()
    }
}

async fn poll_loop(
    poller: Arc<ChannelPoller>,
    interval: Duration,
    mut stop_rx: watch::Receiver<bool>,
) {
    let status = poller.status();
    status.set_state(PollState::Idle).await;

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.changed() => break,
            _ = ticker.tick() => {}
        }
        if *stop_rx.borrow() {
            break;
        }

        // Not raced against the stop signal: a cycle always runs to commit or abort.
        poller.run_cycle().await;
    }

    status.set_state(PollState::Stopped).await;
    tracing::info!(channel = %poller.channel(), "Channel poller stopped");
}
