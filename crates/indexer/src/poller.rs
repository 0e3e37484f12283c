use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use walletpush_common::error::PollError;
use walletpush_common::types::{Channel, DeliveryOutcome, PollState, ProgressCursor};
use walletpush_notifier::dispatcher::NotificationDispatcher;

use crate::dedup;
use crate::explorer::{ExplorerClient, TrackedContract};
use crate::progress::ProgressStore;

/// How a poll cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No cursor existed; the chain head was recorded without dispatching.
    Initialized { height: u64 },
    /// Nothing new since the last commit.
    NoChange { height: u64 },
    /// New cursor persisted.
    Committed {
        from_height: u64,
        to_height: u64,
        notified: usize,
        delivered: usize,
    },
}

/// Point-in-time view of one channel, served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSnapshot {
    pub channel: Channel,
    pub state: PollState,
    pub last_block_notified: Option<u64>,
    pub last_cycle_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub cycles: u64,
}

/// Shared, observable state of one channel's poller.
pub struct ChannelStatus {
    inner: RwLock<ChannelSnapshot>,
}

impl ChannelStatus {
    pub fn new(channel: Channel) -> Self {
        Self {
            inner: RwLock::new(ChannelSnapshot {
                channel,
                state: PollState::Idle,
                last_block_notified: None,
                last_cycle_at: None,
                last_error: None,
                cycles: 0,
            }),
        }
    }

    pub async fn snapshot(&self) -> ChannelSnapshot {
        self.inner.read().await.clone()
    }

    pub async fn set_state(&self, state: PollState) {
        self.inner.write().await.state = state;
    }

    async fn set_last_block(&self, height: u64) {
        self.inner.write().await.last_block_notified = Some(height);
    }

    async fn record(&self, result: &Result<CycleOutcome, PollError>, cursor_height: Option<u64>) {
        let mut inner = self.inner.write().await;
        inner.state = PollState::Idle;
        inner.cycles += 1;
        inner.last_cycle_at = Some(Utc::now());
        if cursor_height.is_some() {
            inner.last_block_notified = cursor_height;
        }
        inner.last_error = result.as_ref().err().map(ToString::to_string);
    }
}

/// Runs poll cycles for a single channel: fetch → filter → dispatch → commit.
pub struct ChannelPoller {
    channel: Channel,
    contracts: Vec<TrackedContract>,
    explorer: Arc<dyn ExplorerClient>,
    store: Arc<dyn ProgressStore>,
    dispatcher: Arc<NotificationDispatcher>,
    status: Arc<ChannelStatus>,
}

impl ChannelPoller {
    pub fn new(
        channel: Channel,
        contracts: Vec<TrackedContract>,
        explorer: Arc<dyn ExplorerClient>,
        store: Arc<dyn ProgressStore>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            channel,
            contracts,
            explorer,
            store,
            dispatcher,
            status: Arc::new(ChannelStatus::new(channel)),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn status(&self) -> Arc<ChannelStatus> {
        self.status.clone()
    }

    /// Publish the stored cursor height before the first cycle runs.
    pub async fn load_progress(&self) {
        match self.store.get(self.channel).await {
            Ok(Some(cursor)) => {
                self.status.set_last_block(cursor.last_notified_height).await;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(channel = %self.channel, error = %e, "Failed to load stored cursor");
            }
        }
    }

    /// Run one cycle, log its outcome and return to `Idle`. Never fails.
    pub async fn run_cycle(&self) -> Option<CycleOutcome> {
        let result = self.poll_once().await;

        let cursor_height = match &result {
            Ok(CycleOutcome::Initialized { height } | CycleOutcome::NoChange { height }) => {
                Some(*height)
            }
            Ok(CycleOutcome::Committed { to_height, .. }) => Some(*to_height),
            _ => None,
        };
        self.status.record(&result, cursor_height).await;

        match result {
            Ok(outcome) => {
                if let CycleOutcome::Committed {
                    from_height,
                    to_height,
                    notified,
                    delivered,
                } = &outcome
                {
                    tracing::info!(
                        channel = %self.channel,
                        from_height,
                        to_height,
                        notified,
                        delivered,
                        "Poll cycle committed"
                    );
                }
                Some(outcome)
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(channel = %self.channel, error = %e, "Poll cycle deferred");
                None
            }
            Err(e) => {
                tracing::error!(channel = %self.channel, error = %e, "Poll cycle aborted");
                None
            }
        }
    }

    /// One fetch → filter → dispatch → commit pass.
    ///
    /// Any error leaves the stored cursor untouched so the next cycle retries
    /// the identical transaction set.
    pub async fn poll_once(&self) -> Result<CycleOutcome, PollError> {
        self.status.set_state(PollState::Fetching).await;

        let Some(cursor) = self.store.get(self.channel).await? else {
            return self.initialize().await;
        };

        let txs = self
            .explorer
            .fetch_since(self.channel, &self.contracts, cursor.last_notified_height)
            .await?;

        self.status.set_state(PollState::Filtering).await;
        let selection = dedup::select(self.channel, &cursor, &txs);
        if selection.cursor == cursor {
            return Ok(CycleOutcome::NoChange {
                height: cursor.last_notified_height,
            });
        }

        self.status.set_state(PollState::Dispatching).await;
        let picked = &selection.picked;
        let report = self.dispatcher.dispatch_batch(self.channel, picked).await;
        if !report.commit_allowed() {
            return Err(PollError::TransientUpstream(format!(
                "push backend unavailable for {} of {} notifications",
                report.count(DeliveryOutcome::BackendUnavailable),
                picked.len()
            )));
        }

        self.status.set_state(PollState::Committing).await;
        self.store.set(self.channel, &selection.cursor).await?;

        Ok(CycleOutcome::Committed {
            from_height: cursor.last_notified_height,
            to_height: selection.cursor.last_notified_height,
            notified: picked.len(),
            delivered: report.count(DeliveryOutcome::Delivered),
        })
    }

    /// First run: start from the current head instead of backfilling history.
    async fn initialize(&self) -> Result<CycleOutcome, PollError> {
        let head = self.explorer.latest_height().await?;

        self.status.set_state(PollState::Committing).await;
        self.store
            .set(self.channel, &ProgressCursor::new(self.channel, head))
            .await?;

        tracing::info!(
            channel = %self.channel,
            height = head,
            "No stored cursor, starting from chain head"
        );
        Ok(CycleOutcome::Initialized { height: head })
    }
}
