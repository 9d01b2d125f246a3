//! Per-intent transaction monitoring
//!
//! One cancellable polling task per in-flight payment intent. A task polls
//! its chain for the submitted hash's receipt on a fixed interval, and on
//! the first receipt removes itself from the registry, validates, writes
//! the terminal status, and triggers webhook delivery. Receipt-fetch
//! failures are steady state while a transaction is unmined and are simply
//! retried on the next tick; only a mined, invalid receipt fails a payment.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chains::ChainClientPool;
use crate::config::MonitorConfig;
use crate::database::payment_intent_repository::PaymentIntentRepository;
use crate::services::receipt_validator::{parse_amount, validate_payment, ExpectedPayment};
use crate::services::webhook_dispatcher::{WebhookDispatcher, WebhookEventKind};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors reported synchronously to callers requesting monitoring
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// No chain client is registered for the requested chain id.
    #[error("unsupported chain id: {chain_id}")]
    UnsupportedChain { chain_id: u64 },
}

// ---------------------------------------------------------------------------
// Task registry
// ---------------------------------------------------------------------------

struct ActiveTask {
    /// Identifies one spawned task generation; a replacement task for the
    /// same intent carries a different token, so a cancelled predecessor
    /// can never remove its successor's entry.
    token: Uuid,
    handle: Option<JoinHandle<()>>,
}

/// Concurrency-safe registry of active monitoring tasks.
///
/// At most one entry exists per payment intent id. The lock is only ever
/// held for map operations, never across an await.
#[derive(Default)]
pub struct MonitorRegistry {
    tasks: Mutex<HashMap<Uuid, ActiveTask>>,
}

impl MonitorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the slot for a new task generation, cancelling any previous
    /// task for the same intent.
    fn begin(&self, intent_id: Uuid, token: Uuid) {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        if let Some(previous) = tasks.insert(
            intent_id,
            ActiveTask {
                token,
                handle: None,
            },
        ) {
            if let Some(handle) = previous.handle {
                handle.abort();
            }
        }
    }

    /// Attach the spawned handle to its reserved slot. If the slot has
    /// already been claimed or replaced, the handle belongs to a task that
    /// is finished or superseded and is dropped.
    fn attach(&self, intent_id: Uuid, token: Uuid, handle: JoinHandle<()>) {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        match tasks.get_mut(&intent_id) {
            Some(task) if task.token == token => task.handle = Some(handle),
            _ => drop(handle),
        }
    }

    /// Remove the entry for a task generation, returning true when this
    /// call was the one that removed it. Run by a task the moment it sees
    /// a receipt, before validation, so a duplicate tick or a stale
    /// predecessor can never resolve the same intent twice.
    fn claim(&self, intent_id: Uuid, token: Uuid) -> bool {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        match tasks.get(&intent_id) {
            Some(task) if task.token == token => {
                tasks.remove(&intent_id);
                true
            }
            _ => false,
        }
    }

    /// Cancel and remove the task for an intent; no-op when none exists.
    pub fn cancel(&self, intent_id: Uuid) -> bool {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        match tasks.remove(&intent_id) {
            Some(task) => {
                if let Some(handle) = task.handle {
                    handle.abort();
                }
                true
            }
            None => false,
        }
    }

    /// Cancel every outstanding task, returning how many were cancelled
    pub fn cancel_all(&self) -> usize {
        let mut tasks = self.tasks.lock().expect("registry lock poisoned");
        let count = tasks.len();
        for (_, task) in tasks.drain() {
            if let Some(handle) = task.handle {
                handle.abort();
            }
        }
        count
    }

    pub fn contains(&self, intent_id: Uuid) -> bool {
        self.tasks
            .lock()
            .expect("registry lock poisoned")
            .contains_key(&intent_id)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Drives payment intents from `processing` to a terminal state.
///
/// Cloning is cheap (all shared pieces sit behind `Arc`); the spawned
/// polling tasks each hold their own clone.
#[derive(Clone)]
pub struct TransactionMonitor {
    chains: Arc<ChainClientPool>,
    intents: Arc<PaymentIntentRepository>,
    dispatcher: Arc<WebhookDispatcher>,
    registry: Arc<MonitorRegistry>,
    config: MonitorConfig,
}

impl TransactionMonitor {
    pub fn new(
        chains: Arc<ChainClientPool>,
        intents: Arc<PaymentIntentRepository>,
        dispatcher: Arc<WebhookDispatcher>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            chains,
            intents,
            dispatcher,
            registry: Arc::new(MonitorRegistry::new()),
            config,
        }
    }

    /// Register a monitoring task for an intent's submitted hash.
    ///
    /// An existing task for the same intent is cancelled and replaced, so
    /// at most one watcher runs per intent. Polling never gives up on its
    /// own; it runs until a receipt appears or the task is cancelled.
    pub fn start_monitoring(
        &self,
        intent_id: Uuid,
        tx_hash: String,
        chain_id: u64,
    ) -> Result<(), MonitorError> {
        let client = self
            .chains
            .get(chain_id)
            .ok_or(MonitorError::UnsupportedChain { chain_id })?;

        let token = Uuid::new_v4();
        self.registry.begin(intent_id, token);

        info!(
            payment_intent_id = %intent_id,
            tx_hash = %tx_hash,
            chain = %client.chain_name(),
            chain_id = chain_id,
            "monitoring started"
        );

        let monitor = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(monitor.config.initial_probe_delay).await;

            loop {
                match client.get_payment_receipt(&tx_hash).await {
                    Ok(Some(receipt)) => {
                        // Remove the task before validating: from here on,
                        // no duplicate tick or replacement can resolve this
                        // intent a second time.
                        if !monitor.registry.claim(intent_id, token) {
                            debug!(
                                payment_intent_id = %intent_id,
                                "task superseded before resolution, dropping receipt"
                            );
                            return;
                        }
                        monitor.resolve(intent_id, receipt).await;
                        return;
                    }
                    Ok(None) => {
                        debug!(
                            payment_intent_id = %intent_id,
                            tx_hash = %tx_hash,
                            "receipt not yet available"
                        );
                    }
                    Err(e) => {
                        // Transient by definition; the next tick retries.
                        debug!(
                            payment_intent_id = %intent_id,
                            tx_hash = %tx_hash,
                            error = %e,
                            "receipt lookup failed, will retry"
                        );
                    }
                }

                tokio::time::sleep(monitor.config.poll_interval).await;
            }
        });

        self.registry.attach(intent_id, token, handle);
        Ok(())
    }

    /// Validate a mined receipt and write the terminal outcome.
    ///
    /// Runs exactly once per intent (the caller has already claimed the
    /// registry entry). Webhook delivery fires only when this call is the
    /// one that performed the terminal write.
    async fn resolve(&self, intent_id: Uuid, receipt: crate::chains::PaymentReceipt) {
        let intent = match self.intents.find_by_id(intent_id).await {
            Ok(Some(intent)) => intent,
            Ok(None) => {
                warn!(payment_intent_id = %intent_id, "intent vanished before resolution");
                return;
            }
            Err(e) => {
                error!(
                    payment_intent_id = %intent_id,
                    error = %e,
                    "failed to load intent for resolution"
                );
                return;
            }
        };

        if intent.is_terminal() {
            debug!(
                payment_intent_id = %intent_id,
                status = %intent.status,
                "intent already terminal, skipping resolution"
            );
            return;
        }

        let valid = match parse_amount(&intent.amount) {
            Some(amount) => validate_payment(
                &receipt,
                &ExpectedPayment {
                    recipient: &intent.merchant_address,
                    amount,
                    token_address: intent.token_address.as_deref(),
                },
            ),
            None => {
                error!(
                    payment_intent_id = %intent_id,
                    amount = %intent.amount,
                    "unparseable expected amount, treating payment as invalid"
                );
                false
            }
        };

        let (written, kind) = if valid {
            (self.intents.mark_confirmed(intent_id).await, WebhookEventKind::PaymentConfirmed)
        } else {
            (self.intents.mark_failed(intent_id).await, WebhookEventKind::PaymentFailed)
        };

        let updated = match written {
            Ok(Some(updated)) => updated,
            Ok(None) => {
                // Lost the race to another terminal writer; their webhook
                // already fired.
                debug!(
                    payment_intent_id = %intent_id,
                    "terminal status already written elsewhere"
                );
                return;
            }
            Err(e) => {
                error!(
                    payment_intent_id = %intent_id,
                    error = %e,
                    "failed to write terminal status"
                );
                return;
            }
        };

        info!(
            payment_intent_id = %intent_id,
            tx_hash = %receipt.transaction_hash,
            status = %updated.status,
            "payment resolved"
        );

        let delivered = self.dispatcher.dispatch(&updated, kind).await;
        if !delivered {
            warn!(
                payment_intent_id = %intent_id,
                event = %kind,
                "webhook delivery unsuccessful, terminal status stands"
            );
        }
    }

    /// Cancel monitoring for an intent; cancelling a missing task is a
    /// no-op.
    pub fn stop_monitoring(&self, intent_id: Uuid) -> bool {
        let cancelled = self.registry.cancel(intent_id);
        if cancelled {
            info!(payment_intent_id = %intent_id, "monitoring stopped");
        }
        cancelled
    }

    /// Cancel every outstanding task; run at process shutdown so no
    /// post-shutdown write reaches the store.
    pub fn stop_all(&self) -> usize {
        let cancelled = self.registry.cancel_all();
        if cancelled > 0 {
            info!(cancelled = cancelled, "all monitoring tasks stopped");
        }
        cancelled
    }

    pub fn is_monitoring(&self, intent_id: Uuid) -> bool {
        self.registry.contains(intent_id)
    }

    pub fn active_tasks(&self) -> usize {
        self.registry.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn registry_holds_one_entry_per_intent() {
        let registry = MonitorRegistry::new();
        let intent_id = Uuid::new_v4();

        let first = Uuid::new_v4();
        registry.begin(intent_id, first);
        registry.attach(intent_id, first, tokio::spawn(async {}));
        assert!(registry.contains(intent_id));
        assert_eq!(registry.len(), 1);

        // A second generation replaces the first
        let second = Uuid::new_v4();
        registry.begin(intent_id, second);
        registry.attach(intent_id, second, tokio::spawn(async {}));
        assert_eq!(registry.len(), 1);

        // The replaced generation can no longer claim the slot
        assert!(!registry.claim(intent_id, first));
        assert!(registry.contains(intent_id));

        // The current generation can, exactly once
        assert!(registry.claim(intent_id, second));
        assert!(!registry.claim(intent_id, second));
        assert!(!registry.contains(intent_id));
    }

    #[tokio::test]
    async fn cancel_missing_task_is_noop() {
        let registry = MonitorRegistry::new();
        assert!(!registry.cancel(Uuid::new_v4()));
        assert_eq!(registry.cancel_all(), 0);
    }

    #[tokio::test]
    async fn cancel_all_drains_registry() {
        let registry = MonitorRegistry::new();

        for _ in 0..3 {
            let intent_id = Uuid::new_v4();
            let token = Uuid::new_v4();
            registry.begin(intent_id, token);
            registry.attach(
                intent_id,
                token,
                tokio::spawn(async {
                    tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                }),
            );
        }

        assert_eq!(registry.len(), 3);
        assert_eq!(registry.cancel_all(), 3);
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn attach_after_claim_drops_the_handle() {
        let registry = MonitorRegistry::new();
        let intent_id = Uuid::new_v4();
        let token = Uuid::new_v4();

        registry.begin(intent_id, token);
        assert!(registry.claim(intent_id, token));

        // The task finished and claimed its slot before the spawner could
        // attach the handle; attaching must not resurrect the entry.
        registry.attach(intent_id, token, tokio::spawn(async {}));
        assert!(!registry.contains(intent_id));
    }

    #[test]
    fn unsupported_chain_error_names_the_chain() {
        let err = MonitorError::UnsupportedChain { chain_id: 56 };
        assert!(err.to_string().contains("56"));
    }
}
