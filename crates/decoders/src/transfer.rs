use alloy::primitives::{Address, B256, Log, keccak256};
use walletpush_common::types::{Channel, Transaction};

use crate::{LogDecoder, LogMeta, TwoPartyEvent, build_transaction};

/// ERC-20 `Transfer(address,address,uint256)` decoder.
///
/// A transfer is a received payment for `to`. Zero-value transfers and burns
/// decode with no channel hint.
pub struct TransferDecoder {
    transfer: B256,
}

impl TransferDecoder {
    pub fn new() -> Self {
        Self {
            transfer: keccak256("Transfer(address,address,uint256)"),
        }
    }
}

impl Default for TransferDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogDecoder for TransferDecoder {
    fn event_signature(&self) -> B256 {
        self.transfer
    }

    fn channel(&self) -> Channel {
        Channel::PaymentReceived
    }

    fn decode(&self, log: &Log, meta: &LogMeta) -> Option<Transaction> {
        if log.topics().first()? != &self.transfer {
            return None;
        }
        let event = TwoPartyEvent::parse(log)?;

        let notify = !event.amount.is_zero() && event.second != Address::ZERO;
        let hints = if notify {
            vec![Channel::PaymentReceived]
        } else {
            Vec::new()
        };

        Some(build_transaction(
            meta,
            event.first,
            event.second,
            event.amount,
            hints,
        ))
    }

    fn name(&self) -> &'static str {
        "ERC-20 Transfer"
    }
}
