//! Push notification delivery for on-chain wallet events.
//!
//! Resolves each transaction's recipient to a registered device, renders a
//! localized payload and hands it to the push backend.

pub mod dispatcher;
pub mod i18n;
pub mod push;
pub mod registry;
