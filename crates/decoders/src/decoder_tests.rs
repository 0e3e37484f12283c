//! Tests for the channel decoders and `DecoderRegistry` routing.
//!
//! Logs are built with the same layout the explorer returns: indexed
//! addresses in topics, the amount ABI-encoded in data.

use alloy::primitives::{Address, B256, Bytes, Log, LogData, U256, address, keccak256};
use chrono::Utc;

use walletpush_common::types::Channel;

use crate::invite::InviteDecoder;
use crate::request::PaymentRequestDecoder;
use crate::transfer::TransferDecoder;
use crate::{DecoderRegistry, LogDecoder, LogMeta};

// ───────────────────────────── helpers ──────────────────────────────

fn build_log(topics: Vec<B256>, data: Vec<u8>) -> Log {
    Log {
        address: address!("765de816845861e75a25fca122bb6898b8b1282a"),
        data: LogData::new(topics, Bytes::from(data)).expect("valid log data"),
    }
}

fn encode_u256(val: u64) -> Vec<u8> {
    U256::from(val).to_be_bytes::<32>().to_vec()
}

fn address_to_topic(addr: Address) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[12..32].copy_from_slice(addr.as_slice());
    B256::from(bytes)
}

fn meta() -> LogMeta {
    LogMeta {
        tx_hash: "0xabc".to_string(),
        log_index: Some(2),
        block_height: 4_200,
        timestamp: Utc::now(),
        currency: "cUSD".to_string(),
    }
}

const ALICE: Address = address!("1111111111111111111111111111111111111111");
const BOB: Address = address!("2222222222222222222222222222222222222222");

fn two_party_log(signature: &str, first: Address, second: Address, amount: u64) -> Log {
    build_log(
        vec![
            keccak256(signature),
            address_to_topic(first),
            address_to_topic(second),
        ],
        encode_u256(amount),
    )
}

// ═══════════════════════════════════════════════════════════════════
//  Transfer
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_transfer_is_payment_received_for_recipient() {
    let log = two_party_log("Transfer(address,address,uint256)", ALICE, BOB, 1_500);
    let tx = TransferDecoder::new().decode(&log, &meta()).unwrap();

    assert_eq!(tx.from, format!("{ALICE:#x}"));
    assert_eq!(tx.to, format!("{BOB:#x}"));
    assert_eq!(tx.recipient(), format!("{BOB:#x}"));
    assert_eq!(tx.value, "1500");
    assert_eq!(tx.block_height, 4_200);
    assert_eq!(tx.log_index, Some(2));
    assert_eq!(tx.currency, "cUSD");
    assert_eq!(tx.channel_hints, vec![Channel::PaymentReceived]);
}

#[test]
fn test_zero_value_transfer_has_no_hint() {
    let log = two_party_log("Transfer(address,address,uint256)", ALICE, BOB, 0);
    let tx = TransferDecoder::new().decode(&log, &meta()).unwrap();
    assert!(tx.channel_hints.is_empty());
}

#[test]
fn test_burn_has_no_hint() {
    let log = two_party_log("Transfer(address,address,uint256)", ALICE, Address::ZERO, 10);
    let tx = TransferDecoder::new().decode(&log, &meta()).unwrap();
    assert!(tx.channel_hints.is_empty());
}

#[test]
fn test_transfer_with_short_data_is_rejected() {
    let log = build_log(
        vec![
            keccak256("Transfer(address,address,uint256)"),
            address_to_topic(ALICE),
            address_to_topic(BOB),
        ],
        vec![0u8; 4],
    );
    assert!(TransferDecoder::new().decode(&log, &meta()).is_none());
}

// ═══════════════════════════════════════════════════════════════════
//  Payment request
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_payment_request_notifies_payer() {
    let log = two_party_log("PaymentRequested(address,address,uint256)", ALICE, BOB, 42);
    let tx = PaymentRequestDecoder::new().decode(&log, &meta()).unwrap();

    assert_eq!(tx.counterparty(), format!("{ALICE:#x}"));
    assert_eq!(tx.recipient(), format!("{BOB:#x}"));
    assert_eq!(tx.channel_hints, vec![Channel::PaymentRequested]);
}

#[test]
fn test_self_request_has_no_hint() {
    let log = two_party_log("PaymentRequested(address,address,uint256)", ALICE, ALICE, 42);
    let tx = PaymentRequestDecoder::new().decode(&log, &meta()).unwrap();
    assert!(tx.channel_hints.is_empty());
}

// ═══════════════════════════════════════════════════════════════════
//  Invite
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_invite_redeemed_notifies_inviter() {
    let log = two_party_log("InviteRedeemed(address,address,uint256)", ALICE, BOB, 5);
    let tx = InviteDecoder::new().decode(&log, &meta()).unwrap();

    assert_eq!(tx.recipient(), format!("{ALICE:#x}"));
    assert_eq!(tx.counterparty(), format!("{BOB:#x}"));
    assert_eq!(tx.channel_hints, vec![Channel::InviteRedeemed]);
}

// ═══════════════════════════════════════════════════════════════════
//  Registry
// ═══════════════════════════════════════════════════════════════════

#[test]
fn test_registry_routes_by_topic0() {
    let registry = DecoderRegistry::new();

    let transfer = two_party_log("Transfer(address,address,uint256)", ALICE, BOB, 1);
    let request = two_party_log("PaymentRequested(address,address,uint256)", ALICE, BOB, 1);
    let invite = two_party_log("InviteRedeemed(address,address,uint256)", ALICE, BOB, 1);

    assert!(registry.decode(&transfer, &meta()).unwrap().has_hint(Channel::PaymentReceived));
    assert!(registry.decode(&request, &meta()).unwrap().has_hint(Channel::PaymentRequested));
    assert!(registry.decode(&invite, &meta()).unwrap().has_hint(Channel::InviteRedeemed));
}

#[test]
fn test_registry_ignores_unknown_topic() {
    let registry = DecoderRegistry::new();
    let log = two_party_log("Approval(address,address,uint256)", ALICE, BOB, 1);
    assert!(registry.decode(&log, &meta()).is_none());
}

#[test]
fn test_registry_signature_per_channel() {
    let registry = DecoderRegistry::new();
    assert_eq!(
        registry.signature_for(Channel::PaymentReceived),
        Some(keccak256("Transfer(address,address,uint256)"))
    );
    assert_eq!(
        registry.signature_for(Channel::InviteRedeemed),
        Some(keccak256("InviteRedeemed(address,address,uint256)"))
    );
}
