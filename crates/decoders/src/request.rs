use alloy::primitives::{Address, B256, Log, keccak256};
use walletpush_common::types::{Channel, Transaction};

use crate::{LogDecoder, LogMeta, TwoPartyEvent, build_transaction};

/// `PaymentRequested(address requester, address payer, uint256 amount)` decoder.
///
/// The payer is the one notified, so it lands in `to`.
pub struct PaymentRequestDecoder {
    payment_requested: B256,
}

impl PaymentRequestDecoder {
    pub fn new() -> Self {
        Self {
            payment_requested: keccak256("PaymentRequested(address,address,uint256)"),
        }
    }
}

impl Default for PaymentRequestDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogDecoder for PaymentRequestDecoder {
    fn event_signature(&self) -> B256 {
        self.payment_requested
    }

    fn channel(&self) -> Channel {
        Channel::PaymentRequested
    }

    fn decode(&self, log: &Log, meta: &LogMeta) -> Option<Transaction> {
        if log.topics().first()? != &self.payment_requested {
            return None;
        }
        let TwoPartyEvent {
            first: requester,
            second: payer,
            amount,
        } = TwoPartyEvent::parse(log)?;

        let hints = if payer != Address::ZERO && payer != requester {
            vec![Channel::PaymentRequested]
        } else {
            Vec::new()
        };

        Some(build_transaction(meta, requester, payer, amount, hints))
    }

    fn name(&self) -> &'static str {
        "Payment request"
    }
}
