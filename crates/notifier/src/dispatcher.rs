//! Notification dispatcher.
//!
//! Turns qualifying transactions into per-recipient push notifications:
//! 1. Drop transactions older than the notification TTL
//! 2. Resolve the recipient's device and locale through the registry
//! 3. Render a localized payload with deep-link data
//! 4. Deliver through the push backend
//!
//! Recipients are served concurrently. Notifications for one recipient go out
//! oldest first, and stop at the first backend-unavailable outcome so the
//! retry on the next cycle keeps device-side order intact.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;

use walletpush_common::types::{
    Channel, DeliveryOutcome, NotificationJob, NotificationPayload, Transaction,
};

use crate::i18n::Translator;
use crate::push::PushBackend;
use crate::registry::DeviceRegistry;

/// Decimals used by the tracked stable tokens and the native token.
const TOKEN_DECIMALS: usize = 18;

/// Dispatcher settings taken from the application config.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub notification_ttl: Duration,
    pub default_locale: String,
    pub notifications_disabled: bool,
}

/// Outcome of one (transaction, recipient) delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub tx_key: String,
    pub recipient: String,
    pub outcome: DeliveryOutcome,
}

/// Outcomes for a whole batch.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub deliveries: Vec<Delivery>,
}

impl DispatchReport {
    /// Whether the cycle may persist its new cursor.
    pub fn commit_allowed(&self) -> bool {
        !self.deliveries.iter().any(|d| d.outcome.blocks_commit())
    }

    pub fn count(&self, outcome: DeliveryOutcome) -> usize {
        self.deliveries
            .iter()
            .filter(|d| d.outcome == outcome)
            .count()
    }
}

pub struct NotificationDispatcher {
    registry: Arc<dyn DeviceRegistry>,
    push: Arc<dyn PushBackend>,
    translator: Arc<dyn Translator>,
    config: DispatcherConfig,
}

impl NotificationDispatcher {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        push: Arc<dyn PushBackend>,
        translator: Arc<dyn Translator>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            registry,
            push,
            translator,
            config,
        }
    }

    /// Dispatch a batch of transactions already ordered oldest first.
    pub async fn dispatch_batch(&self, channel: Channel, txs: &[Transaction]) -> DispatchReport {
        let mut index: HashMap<&str, usize> = HashMap::new();
        let mut groups: Vec<Vec<&Transaction>> = Vec::new();
        for tx in txs {
            let slot = *index.entry(tx.recipient()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(tx);
        }

        let per_recipient = groups
            .into_iter()
            .map(|group| self.dispatch_in_order(channel, group));
        let deliveries = join_all(per_recipient).await.into_iter().flatten().collect();

        DispatchReport { deliveries }
    }

    async fn dispatch_in_order(&self, channel: Channel, txs: Vec<&Transaction>) -> Vec<Delivery> {
        let mut out = Vec::with_capacity(txs.len());
        let mut deferred = false;

        for tx in txs {
            let delivery = if deferred {
                Delivery {
                    tx_key: tx.dedup_key(),
                    recipient: tx.recipient().to_string(),
                    outcome: DeliveryOutcome::BackendUnavailable,
                }
            } else {
                self.dispatch(tx, channel).await
            };
            deferred |= delivery.outcome.blocks_commit();
            out.push(delivery);
        }
        out
    }

    /// Deliver one transaction's notification to its recipient on `channel`.
    pub async fn dispatch(&self, tx: &Transaction, channel: Channel) -> Delivery {
        let recipient = tx.recipient().to_string();
        let outcome = self.deliver(tx, channel, &recipient).await;

        tracing::info!(
            channel = %channel,
            tx_hash = %tx.hash,
            height = tx.block_height,
            recipient = %recipient,
            outcome = %outcome,
            "Notification dispatched"
        );

        Delivery {
            tx_key: tx.dedup_key(),
            recipient,
            outcome,
        }
    }

    async fn deliver(&self, tx: &Transaction, channel: Channel, recipient: &str) -> DeliveryOutcome {
        let age = (Utc::now() - tx.timestamp).to_std().unwrap_or(Duration::ZERO);
        if age > self.config.notification_ttl {
            return DeliveryOutcome::Expired;
        }
        let remaining_ttl = self.config.notification_ttl - age;

        let registration = match self.registry.lookup(recipient).await {
            Ok(Some(registration)) => registration,
            Ok(None) => return DeliveryOutcome::NoRegisteredDevice,
            Err(e) => {
                tracing::warn!(recipient, error = %e, "Device registry unavailable");
                return DeliveryOutcome::BackendUnavailable;
            }
        };

        let locale = registration
            .language
            .as_deref()
            .unwrap_or(&self.config.default_locale);
        let job = NotificationJob {
            recipient_address: recipient.to_string(),
            channel,
            transaction: tx.clone(),
            payload: self.render(tx, channel, locale),
        };

        if self.config.notifications_disabled {
            tracing::debug!(
                recipient = %job.recipient_address,
                title = %job.payload.title,
                "Notifications disabled, not sending"
            );
            return DeliveryOutcome::Disabled;
        }

        self.push
            .send(&registration.push_token, &job.payload, remaining_ttl)
            .await
    }

    /// Render the localized payload for a transaction.
    pub fn render(&self, tx: &Transaction, channel: Channel, locale: &str) -> NotificationPayload {
        let amount = format_amount(&tx.value);
        let sender = short_address(tx.counterparty());
        let params = [
            ("amount", amount.as_str()),
            ("currency", tx.currency.as_str()),
            ("sender", sender.as_str()),
        ];

        let (title_key, body_key, deep_link) = match channel {
            Channel::PaymentReceived => (
                "paymentReceivedTitle",
                "paymentReceivedBody",
                format!("celo://wallet/tx/{}", tx.hash),
            ),
            Channel::PaymentRequested => (
                "paymentRequestedTitle",
                "paymentRequestedBody",
                format!(
                    "celo://wallet/pay?address={}&amount={}&currency={}",
                    tx.counterparty(),
                    amount,
                    tx.currency
                ),
            ),
            Channel::InviteRedeemed => (
                "inviteRedeemedTitle",
                "inviteRedeemedBody",
                format!("celo://wallet/tx/{}", tx.hash),
            ),
        };

        let data = BTreeMap::from([
            ("type".to_string(), channel.notification_type().to_string()),
            ("channel".to_string(), channel.to_string()),
            ("txHash".to_string(), tx.hash.clone()),
            ("sender".to_string(), tx.counterparty().to_string()),
            ("amount".to_string(), amount.clone()),
            ("currency".to_string(), tx.currency.clone()),
            ("timestamp".to_string(), tx.timestamp.timestamp_millis().to_string()),
            ("deepLink".to_string(), deep_link),
        ]);

        NotificationPayload {
            title: self.translator.translate(title_key, locale, &params),
            body: self.translator.translate(body_key, locale, &params),
            data,
        }
    }
}

/// Format an 18-decimal base-unit amount with two decimals, rounding down.
pub fn format_amount(base_units: &str) -> String {
    if base_units.is_empty() || !base_units.bytes().all(|b| b.is_ascii_digit()) {
        return base_units.to_string();
    }
    let digits = base_units.trim_start_matches('0');
    let padded = format!("{:0>width$}", digits, width = TOKEN_DECIMALS + 1);
    let split = padded.len() - TOKEN_DECIMALS;
    format!("{}.{}", &padded[..split], &padded[split..split + 2])
}

/// `0x1234...abcd` form used in notification text.
pub fn short_address(address: &str) -> String {
    if address.len() <= 12 {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::DateTime;

    use super::*;
    use crate::i18n::Catalog;
    use crate::registry::InMemoryDeviceRegistry;
    use walletpush_common::error::AppError;
    use walletpush_common::types::DeviceRegistration;

    /// Push backend that records calls and returns scripted outcomes per token.
    #[derive(Default)]
    struct RecordingPush {
        sent: Mutex<Vec<(String, String)>>,
        outcomes: HashMap<String, DeliveryOutcome>,
    }

    #[async_trait]
    impl PushBackend for RecordingPush {
        async fn send(
            &self,
            token: &str,
            payload: &NotificationPayload,
            _ttl: Duration,
        ) -> DeliveryOutcome {
            self.sent
                .lock()
                .unwrap()
                .push((token.to_string(), payload.data["txHash"].clone()));
            self.outcomes
                .get(token)
                .copied()
                .unwrap_or(DeliveryOutcome::Delivered)
        }
    }

    struct BrokenRegistry;

    #[async_trait]
    impl DeviceRegistry for BrokenRegistry {
        async fn lookup(&self, _address: &str) -> Result<Option<DeviceRegistration>, AppError> {
            Err(AppError::Database(sqlx::Error::PoolTimedOut))
        }
    }

    fn config() -> DispatcherConfig {
        DispatcherConfig {
            notification_ttl: Duration::from_secs(3600),
            default_locale: "en".to_string(),
            notifications_disabled: false,
        }
    }

    fn tx(hash: &str, to: &str, timestamp: DateTime<Utc>) -> Transaction {
        Transaction {
            hash: hash.to_string(),
            log_index: None,
            block_height: 10,
            from: "0x1111111111111111111111111111111111111111".to_string(),
            to: to.to_string(),
            value: "1500000000000000000".to_string(),
            currency: "cUSD".to_string(),
            timestamp,
            channel_hints: vec![Channel::PaymentReceived],
        }
    }

    async fn dispatcher_with(
        push: Arc<RecordingPush>,
        config: DispatcherConfig,
    ) -> NotificationDispatcher {
        let registry = InMemoryDeviceRegistry::new();
        registry.register("0xalice", "alice-token", Some("es")).await;
        registry.register("0xbob", "bob-token", None).await;
        NotificationDispatcher::new(
            Arc::new(registry),
            push,
            Arc::new(Catalog::bundled("en").unwrap()),
            config,
        )
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount("1500000000000000000"), "1.50");
        assert_eq!(format_amount("123456000000000000000"), "123.45");
        assert_eq!(format_amount("1500"), "0.00");
        assert_eq!(format_amount("0"), "0.00");
        assert_eq!(format_amount("not-a-number"), "not-a-number");
    }

    #[test]
    fn test_short_address() {
        assert_eq!(
            short_address("0x1111111111111111111111111111111111112222"),
            "0x1111...2222"
        );
        assert_eq!(short_address("0xabc"), "0xabc");
    }

    #[tokio::test]
    async fn test_renders_localized_payload_with_deep_link() {
        let dispatcher = dispatcher_with(Arc::new(RecordingPush::default()), config()).await;
        let t = tx("0xabc", "0xalice", Utc::now());

        let payload = dispatcher.render(&t, Channel::PaymentReceived, "es");
        assert_eq!(payload.title, "cUSD recibido");
        assert_eq!(payload.body, "Recibiste 1.50 cUSD de 0x1111...1111");
        assert_eq!(payload.data["type"], "PAYMENT_RECEIVED");
        assert_eq!(payload.data["deepLink"], "celo://wallet/tx/0xabc");

        let request = dispatcher.render(&t, Channel::PaymentRequested, "en");
        assert!(request.data["deepLink"].starts_with("celo://wallet/pay?address=0x1111"));
    }

    #[tokio::test]
    async fn test_unregistered_recipient_is_skipped_without_blocking() {
        let push = Arc::new(RecordingPush::default());
        let dispatcher = dispatcher_with(push.clone(), config()).await;

        let report = dispatcher
            .dispatch_batch(Channel::PaymentReceived, &[tx("0x1", "0xnobody", Utc::now())])
            .await;

        assert_eq!(report.count(DeliveryOutcome::NoRegisteredDevice), 1);
        assert!(report.commit_allowed());
        assert!(push.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expired_transaction_is_dropped() {
        let push = Arc::new(RecordingPush::default());
        let dispatcher = dispatcher_with(push.clone(), config()).await;
        let old = Utc::now() - chrono::Duration::hours(2);

        let delivery = dispatcher
            .dispatch(&tx("0x1", "0xalice", old), Channel::PaymentReceived)
            .await;

        assert_eq!(delivery.outcome, DeliveryOutcome::Expired);
        assert!(push.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_notifications_are_not_sent() {
        let push = Arc::new(RecordingPush::default());
        let mut cfg = config();
        cfg.notifications_disabled = true;
        let dispatcher = dispatcher_with(push.clone(), cfg).await;

        let report = dispatcher
            .dispatch_batch(Channel::PaymentReceived, &[tx("0x1", "0xalice", Utc::now())])
            .await;

        assert_eq!(report.count(DeliveryOutcome::Disabled), 1);
        assert!(report.commit_allowed());
        assert!(push.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_per_recipient_order_is_preserved() {
        let push = Arc::new(RecordingPush::default());
        let dispatcher = dispatcher_with(push.clone(), config()).await;
        let now = Utc::now();
        let batch = vec![
            tx("0x1", "0xalice", now),
            tx("0x2", "0xbob", now),
            tx("0x3", "0xalice", now),
        ];

        let report = dispatcher.dispatch_batch(Channel::PaymentReceived, &batch).await;
        assert_eq!(report.count(DeliveryOutcome::Delivered), 3);

        let sent = push.sent.lock().unwrap();
        let alice: Vec<&str> = sent
            .iter()
            .filter(|(token, _)| token == "alice-token")
            .map(|(_, hash)| hash.as_str())
            .collect();
        assert_eq!(alice, vec!["0x1", "0x3"]);
    }

    #[tokio::test]
    async fn test_backend_unavailable_defers_rest_of_recipient_queue() {
        let push = Arc::new(RecordingPush {
            outcomes: HashMap::from([(
                "alice-token".to_string(),
                DeliveryOutcome::BackendUnavailable,
            )]),
            ..Default::default()
        });
        let dispatcher = dispatcher_with(push.clone(), config()).await;
        let now = Utc::now();
        let batch = vec![tx("0x1", "0xalice", now), tx("0x2", "0xalice", now)];

        let report = dispatcher.dispatch_batch(Channel::PaymentReceived, &batch).await;

        assert!(!report.commit_allowed());
        assert_eq!(report.count(DeliveryOutcome::BackendUnavailable), 2);
        assert_eq!(push.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_registry_failure_blocks_commit() {
        let dispatcher = NotificationDispatcher::new(
            Arc::new(BrokenRegistry),
            Arc::new(RecordingPush::default()),
            Arc::new(Catalog::bundled("en").unwrap()),
            config(),
        );

        let report = dispatcher
            .dispatch_batch(Channel::PaymentReceived, &[tx("0x1", "0xalice", Utc::now())])
            .await;
        assert!(!report.commit_allowed());
    }
}
