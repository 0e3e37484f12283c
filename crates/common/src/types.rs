use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Notification category. Each channel has its own progress cursor and polling cadence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    PaymentReceived,
    PaymentRequested,
    InviteRedeemed,
}

impl Channel {
    pub const ALL: [Channel; 3] = [
        Channel::PaymentReceived,
        Channel::PaymentRequested,
        Channel::InviteRedeemed,
    ];

    /// Storage key used for the channel's progress row.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::PaymentReceived => "payment_received",
            Channel::PaymentRequested => "payment_requested",
            Channel::InviteRedeemed => "invite_redeemed",
        }
    }

    /// Notification type carried in push payload data.
    pub fn notification_type(&self) -> &'static str {
        match self {
            Channel::PaymentReceived => "PAYMENT_RECEIVED",
            Channel::PaymentRequested => "PAYMENT_REQUESTED",
            Channel::InviteRedeemed => "INVITE_REDEEMED",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "payment_received" => Ok(Channel::PaymentReceived),
            "payment_requested" => Ok(Channel::PaymentRequested),
            "invite_redeemed" => Ok(Channel::InviteRedeemed),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

/// A normalized on-chain transaction as reported by the explorer.
///
/// One chain transaction may produce several of these when it carries more
/// than one qualifying log; `log_index` tells them apart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub hash: String,
    pub log_index: Option<u64>,
    pub block_height: u64,
    pub from: String,
    pub to: String,
    /// Amount in the token's base units, as a decimal string.
    pub value: String,
    /// Token symbol (e.g. "cUSD").
    pub currency: String,
    pub timestamp: DateTime<Utc>,
    pub channel_hints: Vec<Channel>,
}

impl Transaction {
    /// Identifier stored in a cursor's boundary set.
    pub fn dedup_key(&self) -> String {
        match self.log_index {
            Some(index) => format!("{}:{}", self.hash, index),
            None => self.hash.clone(),
        }
    }

    pub fn has_hint(&self, channel: Channel) -> bool {
        self.channel_hints.contains(&channel)
    }

    /// The address to notify.
    ///
    /// Decoders normalize every event so the notified party is `to`: the payee
    /// of a transfer, the payer of a request, the inviter of a redeemed invite.
    pub fn recipient(&self) -> &str {
        &self.to
    }

    /// The counterparty shown in the notification text.
    pub fn counterparty(&self) -> &str {
        &self.from
    }
}

/// Persisted high-water mark for one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressCursor {
    pub channel: Channel,
    pub last_notified_height: u64,
    /// Dedup keys already notified at `last_notified_height`.
    pub last_notified_tx_hashes: BTreeSet<String>,
}

impl ProgressCursor {
    pub fn new(channel: Channel, height: u64) -> Self {
        Self {
            channel,
            last_notified_height: height,
            last_notified_tx_hashes: BTreeSet::new(),
        }
    }

    pub fn with_hashes<I, S>(channel: Channel, height: u64, hashes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            channel,
            last_notified_height: height,
            last_notified_tx_hashes: hashes.into_iter().map(Into::into).collect(),
        }
    }
}

/// Rendered push content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    /// Deep-link data; push backends only accept string values here.
    pub data: BTreeMap<String, String>,
}

/// One (transaction, recipient) pair awaiting delivery. Never persisted.
#[derive(Debug, Clone)]
pub struct NotificationJob {
    pub recipient_address: String,
    pub channel: Channel,
    pub transaction: Transaction,
    pub payload: NotificationPayload,
}

/// Result of attempting to deliver one notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    /// Recipient has no device registered. Not an error.
    NoRegisteredDevice,
    /// Push backend unreachable or overloaded; the cycle must not commit.
    BackendUnavailable,
    /// Backend refused the message permanently (bad payload, bad token format).
    Rejected,
    /// Transaction older than the notification TTL.
    Expired,
    /// Sending is turned off for this environment.
    Disabled,
}

impl DeliveryOutcome {
    /// Whether this outcome defers the cycle's progress commit.
    pub fn blocks_commit(&self) -> bool {
        matches!(self, DeliveryOutcome::BackendUnavailable)
    }
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeliveryOutcome::Delivered => write!(f, "delivered"),
            DeliveryOutcome::NoRegisteredDevice => write!(f, "recipient_has_no_registered_device"),
            DeliveryOutcome::BackendUnavailable => write!(f, "backend_unavailable"),
            DeliveryOutcome::Rejected => write!(f, "rejected"),
            DeliveryOutcome::Expired => write!(f, "expired"),
            DeliveryOutcome::Disabled => write!(f, "disabled"),
        }
    }
}

/// A wallet's registered push device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct DeviceRegistration {
    pub address: String,
    pub push_token: String,
    pub language: Option<String>,
}

/// Per-channel poll state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Fetching,
    Filtering,
    Dispatching,
    Committing,
    Stopped,
}

impl std::fmt::Display for PollState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PollState::Idle => write!(f, "idle"),
            PollState::Fetching => write!(f, "fetching"),
            PollState::Filtering => write!(f, "filtering"),
            PollState::Dispatching => write!(f, "dispatching"),
            PollState::Committing => write!(f, "committing"),
            PollState::Stopped => write!(f, "stopped"),
        }
    }
}
