pub mod invite;
pub mod request;
pub mod transfer;

#[cfg(test)]
mod decoder_tests;

use alloy::primitives::{Address, B256, Log, U256};
use chrono::{DateTime, Utc};
use walletpush_common::types::{Channel, Transaction};

/// Explorer-side context for a log that the log itself does not carry.
#[derive(Debug, Clone)]
pub struct LogMeta {
    pub tx_hash: String,
    pub log_index: Option<u64>,
    pub block_height: u64,
    pub timestamp: DateTime<Utc>,
    /// Currency symbol of the contract the log was fetched from.
    pub currency: String,
}

/// Trait that all event decoders must implement.
pub trait LogDecoder: Send + Sync {
    /// Topic0 of the event this decoder handles.
    fn event_signature(&self) -> B256;

    /// Channel this decoder's events feed.
    fn channel(&self) -> Channel;

    /// Decode a raw log into a normalized transaction.
    ///
    /// Returns `None` when the log does not match this decoder's layout. A
    /// matching log that does not warrant a notification is returned with an
    /// empty `channel_hints` so it still counts toward cursor progress.
    fn decode(&self, log: &Log, meta: &LogMeta) -> Option<Transaction>;

    /// Human-readable name for this decoder.
    fn name(&self) -> &'static str;
}

/// Registry of decoders, used by the explorer client to classify logs.
pub struct DecoderRegistry {
    decoders: Vec<Box<dyn LogDecoder>>,
}

impl DecoderRegistry {
    pub fn new() -> Self {
        Self {
            decoders: vec![
                Box::new(transfer::TransferDecoder::new()),
                Box::new(request::PaymentRequestDecoder::new()),
                Box::new(invite::InviteDecoder::new()),
            ],
        }
    }

    /// Event signature polled for a channel.
    pub fn signature_for(&self, channel: Channel) -> Option<B256> {
        self.decoders
            .iter()
            .find(|d| d.channel() == channel)
            .map(|d| d.event_signature())
    }

    /// Try to decode a log using the decoder registered for its topic0.
    pub fn decode(&self, log: &Log, meta: &LogMeta) -> Option<Transaction> {
        let topic0 = log.topics().first()?;
        let decoder = self
            .decoders
            .iter()
            .find(|d| d.event_signature() == *topic0)?;

        let tx = decoder.decode(log, meta);
        if let Some(tx) = &tx {
            tracing::debug!(
                decoder = decoder.name(),
                tx_hash = %tx.hash,
                hints = ?tx.channel_hints,
                "Decoded log"
            );
        }
        tx
    }
}

impl Default for DecoderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read an indexed address out of a 32-byte topic.
pub(crate) fn address_from_topic(topic: &B256) -> Address {
    Address::from_slice(&topic.as_slice()[12..32])
}

/// Read a `uint256` word from ABI-encoded log data.
pub(crate) fn u256_from_data(data: &[u8], offset: usize) -> Option<U256> {
    let bytes: [u8; 32] = data.get(offset..offset + 32)?.try_into().ok()?;
    Some(U256::from_be_bytes(bytes))
}

/// Shared decoding for the three-field `(address indexed, address indexed, uint256)`
/// events every decoder handles.
pub(crate) struct TwoPartyEvent {
    pub first: Address,
    pub second: Address,
    pub amount: U256,
}

impl TwoPartyEvent {
    pub(crate) fn parse(log: &Log) -> Option<Self> {
        let topics = log.topics();
        if topics.len() < 3 {
            return None;
        }
        Some(Self {
            first: address_from_topic(&topics[1]),
            second: address_from_topic(&topics[2]),
            amount: u256_from_data(log.data.data.as_ref(), 0)?,
        })
    }
}

pub(crate) fn build_transaction(
    meta: &LogMeta,
    from: Address,
    to: Address,
    amount: U256,
    hints: Vec<Channel>,
) -> Transaction {
    Transaction {
        hash: meta.tx_hash.clone(),
        log_index: meta.log_index,
        block_height: meta.block_height,
        from: format!("{from:#x}"),
        to: format!("{to:#x}"),
        value: amount.to_string(),
        currency: meta.currency.clone(),
        timestamp: meta.timestamp,
        channel_hints: hints,
    }
}
