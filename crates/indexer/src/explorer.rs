//! Blockscout explorer client.
//!
//! Fetches channel event logs for a set of tracked contracts and normalizes
//! them into `Transaction`s through the decoder registry. Upstream failures
//! are classified as transient (retry next tick) or malformed (skip cycle);
//! neither ever moves a cursor.

use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::{Address, B256, Bytes, Log, LogData};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use walletpush_common::config::AppConfig;
use walletpush_common::error::{AppError, PollError};
use walletpush_common::types::{Channel, Transaction};
use walletpush_decoders::{DecoderRegistry, LogMeta};

/// Currency assumed for request and invite contracts, which do not carry a token.
pub const DEFAULT_CURRENCY: &str = "cUSD";

/// Blockscout caps `getLogs` responses at this many entries.
const PAGE_LIMIT: usize = 1000;

/// Upper bound on pages read while draining a single block.
const MAX_BLOCK_PAGES: u32 = 100;

/// A contract whose logs feed a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedContract {
    pub address: String,
    pub currency: String,
}

impl TrackedContract {
    pub fn new(address: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            currency: currency.into(),
        }
    }

    /// Tracked contracts per channel, as configured.
    pub fn from_config(config: &AppConfig, channel: Channel) -> Vec<Self> {
        match channel {
            Channel::PaymentReceived => config
                .payment_tokens
                .iter()
                .map(|t| Self::new(&t.address, &t.symbol))
                .collect(),
            Channel::PaymentRequested => config
                .payment_request_address
                .iter()
                .map(|a| Self::new(a, DEFAULT_CURRENCY))
                .collect(),
            Channel::InviteRedeemed => config
                .invite_escrow_address
                .iter()
                .map(|a| Self::new(a, DEFAULT_CURRENCY))
                .collect(),
        }
    }
}

/// Explorer API collaborator.
#[async_trait]
pub trait ExplorerClient: Send + Sync {
    /// Current chain head height.
    async fn latest_height(&self) -> Result<u64, PollError>;

    /// Transactions for `channel` emitted by `contracts` at or above `after_height`,
    /// ordered by height, then log index, then hash.
    ///
    /// The boundary block is included so the dedup filter can resolve ties.
    async fn fetch_since(
        &self,
        channel: Channel,
        contracts: &[TrackedContract],
        after_height: u64,
    ) -> Result<Vec<Transaction>, PollError>;
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LogsResponse {
    status: Option<String>,
    message: Option<String>,
    #[serde(default)]
    result: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLog {
    address: String,
    topics: Vec<Option<String>>,
    data: String,
    block_number: String,
    time_stamp: String,
    transaction_hash: String,
    #[serde(default)]
    log_index: Option<String>,
}

/// Logs fetched for one contract.
struct ContractLogs {
    txs: Vec<Transaction>,
    /// Set when the range was cut short: every block up to and including
    /// this height was seen in full, later ones were not.
    complete_through: Option<u64>,
}

/// Explorer client for Blockscout's Etherscan-compatible API.
pub struct BlockscoutClient {
    http_client: Client,
    base_url: String,
    decoders: DecoderRegistry,
}

impl BlockscoutClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, AppError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Http(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url,
            decoders: DecoderRegistry::new(),
        })
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        query: &[(&str, String)],
    ) -> Result<T, PollError> {
        let response = self
            .http_client
            .get(&self.base_url)
            .query(query)
            .send()
            .await
            .map_err(|e| PollError::TransientUpstream(format!("explorer request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(PollError::TransientUpstream(format!(
                "explorer returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(PollError::MalformedData(format!(
                "explorer returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PollError::TransientUpstream(format!("explorer body read failed: {e}")))?;
        serde_json::from_str(&body)
            .map_err(|e| PollError::MalformedData(format!("explorer response is not valid: {e}")))
    }

    /// All logs of one contract from `after_height`, as far as whole blocks allow.
    ///
    /// A full page may end partway through its last block. That block is then
    /// read on its own until exhausted and the range stops there, recorded in
    /// `complete_through`. A page holding a single block is drained the same
    /// way and the scan moves on to the next height.
    async fn fetch_contract(
        &self,
        contract: &TrackedContract,
        topic0: B256,
        after_height: u64,
    ) -> Result<ContractLogs, PollError> {
        let mut txs = Vec::new();
        let mut from = after_height;

        loop {
            let (page, raw_len) = self.fetch_page(contract, topic0, from, None, 1).await?;
            let last = page.iter().map(|t| t.block_height).max();
            let Some(last) = last.filter(|_| raw_len >= PAGE_LIMIT) else {
                txs.extend(page);
                return Ok(ContractLogs {
                    txs,
                    complete_through: None,
                });
            };
            if last < from {
                return Err(PollError::MalformedData(format!(
                    "explorer returned block {last} below requested {from}"
                )));
            }

            txs.extend(page.into_iter().filter(|t| t.block_height < last));
            txs.extend(self.fetch_block(contract, topic0, last).await?);

            if last > from {
                tracing::debug!(
                    address = %contract.address,
                    from,
                    height = last,
                    "Explorer page truncated, range ends at last whole block"
                );
                return Ok(ContractLogs {
                    txs,
                    complete_through: Some(last),
                });
            }
            from = last + 1;
        }
    }

    /// Every log of one contract in block `height`, page by page.
    async fn fetch_block(
        &self,
        contract: &TrackedContract,
        topic0: B256,
        height: u64,
    ) -> Result<Vec<Transaction>, PollError> {
        let mut txs = Vec::new();
        for page in 1..=MAX_BLOCK_PAGES {
            let (batch, raw_len) = self
                .fetch_page(contract, topic0, height, Some(height), page)
                .await?;
            txs.extend(batch);
            if raw_len < PAGE_LIMIT {
                return Ok(txs);
            }
        }
        Err(PollError::MalformedData(format!(
            "block {height} of {} exceeds {MAX_BLOCK_PAGES} pages of logs",
            contract.address
        )))
    }

    /// One `getLogs` page, decoded. Also returns the raw entry count so callers
    /// can tell a full page from a final one.
    async fn fetch_page(
        &self,
        contract: &TrackedContract,
        topic0: B256,
        from_block: u64,
        to_block: Option<u64>,
        page: u32,
    ) -> Result<(Vec<Transaction>, usize), PollError> {
        let response: LogsResponse = self
            .get_json(&[
                ("module", "logs".to_string()),
                ("action", "getLogs".to_string()),
                ("fromBlock", from_block.to_string()),
                (
                    "toBlock",
                    to_block.map_or_else(|| "latest".to_string(), |h| h.to_string()),
                ),
                ("address", contract.address.clone()),
                ("topic0", format!("{topic0:#x}")),
                ("page", page.to_string()),
                ("offset", PAGE_LIMIT.to_string()),
            ])
            .await?;

        if response.status.as_deref() == Some("0") {
            let message = response.message.unwrap_or_default();
            if message.to_lowercase().contains("no logs found") {
                return Ok((Vec::new(), 0));
            }
            return Err(PollError::MalformedData(format!(
                "explorer error for {}: {message}",
                contract.address
            )));
        }

        let raw: Vec<RawLog> = serde_json::from_value(response.result)
            .map_err(|e| PollError::MalformedData(format!("unexpected log list: {e}")))?;

        let mut txs = Vec::with_capacity(raw.len());
        for entry in &raw {
            let (log, meta) = normalize(entry, &contract.currency)?;
            let tx = self.decoders.decode(&log, &meta).ok_or_else(|| {
                PollError::MalformedData(format!(
                    "undecodable log in transaction {}",
                    entry.transaction_hash
                ))
            })?;
            txs.push(tx);
        }

        Ok((txs, raw.len()))
    }
}

#[async_trait]
impl ExplorerClient for BlockscoutClient {
    async fn latest_height(&self) -> Result<u64, PollError> {
        let response: RpcResponse = self
            .get_json(&[
                ("module", "block".to_string()),
                ("action", "eth_block_number".to_string()),
            ])
            .await?;

        let hex = response
            .result
            .ok_or_else(|| PollError::MalformedData("missing block number".to_string()))?;
        parse_quantity(&hex)
    }

    async fn fetch_since(
        &self,
        channel: Channel,
        contracts: &[TrackedContract],
        after_height: u64,
    ) -> Result<Vec<Transaction>, PollError> {
        let topic0 = self.decoders.signature_for(channel).ok_or_else(|| {
            PollError::MalformedData(format!("no decoder registered for {channel}"))
        })?;

        // Contracts share one cursor: the merged result may only reach as far
        // as the least complete contract.
        let mut txs = Vec::new();
        let mut horizon: Option<u64> = None;
        for contract in contracts {
            let logs = self.fetch_contract(contract, topic0, after_height).await?;
            if let Some(height) = logs.complete_through {
                horizon = Some(horizon.map_or(height, |h| h.min(height)));
            }
            txs.extend(logs.txs);
        }
        if let Some(horizon) = horizon {
            txs.retain(|t| t.block_height <= horizon);
        }

        sort_transactions(&mut txs);
        txs.dedup_by(|a, b| a.dedup_key() == b.dedup_key());

        tracing::debug!(
            channel = %channel,
            after_height,
            count = txs.len(),
            "Fetched transactions from explorer"
        );
        Ok(txs)
    }
}

/// Order by height, then log index, then hash.
pub fn sort_transactions(txs: &mut [Transaction]) {
    txs.sort_by(|a, b| {
        (a.block_height, a.log_index, &a.hash).cmp(&(b.block_height, b.log_index, &b.hash))
    });
}

fn normalize(entry: &RawLog, currency: &str) -> Result<(Log, LogMeta), PollError> {
    let malformed = |what: &str| {
        PollError::MalformedData(format!("{what} in transaction {}", entry.transaction_hash))
    };

    let address = Address::from_str(&entry.address).map_err(|_| malformed("bad address"))?;
    let topics = entry
        .topics
        .iter()
        .flatten()
        .map(|t| B256::from_str(t))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| malformed("bad topic"))?;
    let data = alloy::hex::decode(&entry.data).map_err(|_| malformed("bad data"))?;
    let data = LogData::new(topics, Bytes::from(data)).ok_or_else(|| malformed("too many topics"))?;

    let block_height = parse_quantity(&entry.block_number)?;
    let timestamp = parse_timestamp(&entry.time_stamp)?;
    let log_index = match entry.log_index.as_deref() {
        None | Some("") => None,
        Some(index) => Some(parse_quantity(index)?),
    };
    if B256::from_str(&entry.transaction_hash).is_err() {
        return Err(malformed("bad transaction hash"));
    }

    let meta = LogMeta {
        tx_hash: entry.transaction_hash.to_lowercase(),
        log_index,
        block_height,
        timestamp,
        currency: currency.to_string(),
    };
    Ok((Log { address, data }, meta))
}

/// Parse a hex (`0x`-prefixed) or decimal quantity.
fn parse_quantity(raw: &str) -> Result<u64, PollError> {
    let parsed = match raw.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => raw.parse(),
    };
    parsed.map_err(|_| PollError::MalformedData(format!("bad quantity `{raw}`")))
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, PollError> {
    let secs = parse_quantity(raw)?;
    Utc.timestamp_opt(secs as i64, 0)
        .single()
        .ok_or_else(|| PollError::MalformedData(format!("bad timestamp `{raw}`")))
}
