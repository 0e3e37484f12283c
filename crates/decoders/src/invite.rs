use alloy::primitives::{Address, B256, Log, keccak256};
use walletpush_common::types::{Channel, Transaction};

use crate::{LogDecoder, LogMeta, TwoPartyEvent, build_transaction};

/// Invite escrow `InviteRedeemed(address inviter, address invitee, uint256 amount)` decoder.
///
/// The inviter is notified, so the invitee becomes `from` and the inviter `to`.
pub struct InviteDecoder {
    invite_redeemed: B256,
}

impl InviteDecoder {
    pub fn new() -> Self {
        Self {
            invite_redeemed: keccak256("InviteRedeemed(address,address,uint256)"),
        }
    }
}

impl Default for InviteDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl LogDecoder for InviteDecoder {
    fn event_signature(&self) -> B256 {
        self.invite_redeemed
    }

    fn channel(&self) -> Channel {
        Channel::InviteRedeemed
    }

    fn decode(&self, log: &Log, meta: &LogMeta) -> Option<Transaction> {
        if log.topics().first()? != &self.invite_redeemed {
            return None;
        }
        let TwoPartyEvent {
            first: inviter,
            second: invitee,
            amount,
        } = TwoPartyEvent::parse(log)?;

        let hints = if inviter != Address::ZERO {
            vec![Channel::InviteRedeemed]
        } else {
            Vec::new()
        };

        Some(build_transaction(meta, invitee, inviter, amount, hints))
    }

    fn name(&self) -> &'static str {
        "Invite escrow"
    }
}
