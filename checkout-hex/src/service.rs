//! Checkout Application Service
//!
//! Orchestrates the order lifecycle through the repository and payment
//! gateway ports. Contains NO infrastructure logic - pure business
//! orchestration.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};

use checkout_types::{
    AppError, CheckoutRepository, CreateOrderRequest, CreateProductRequest, GatewayData,
    GatewayError, GatewayEvent, GatewayStatus, Money, Order, PaymentGateway, PaymentMethod,
    PaymentRequest, PaymentResponse, Product, ProductId, RepoError, Transaction, TransactionId,
    TransactionStatus, WebhookAckStatus,
};

use crate::security::verify_event_checksum;

/// Default upper bound for a single gateway call.
pub const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_secs(10);

/// What the webhook handler did with a delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The transaction was reconciled with the gateway.
    Processed(Transaction),
    /// Nothing to do: malformed, unsigned, duplicate or not actionable.
    Ignored,
    /// The reference does not match any transaction.
    NotFound,
}

impl WebhookOutcome {
    pub fn ack_status(&self) -> WebhookAckStatus {
        match self {
            WebhookOutcome::Processed(_) => WebhookAckStatus::Processed,
            WebhookOutcome::Ignored => WebhookAckStatus::Ignored,
            WebhookOutcome::NotFound => WebhookAckStatus::NotFound,
        }
    }
}

/// Application service for checkout operations.
///
/// Generic over the repository and the gateway so tests can inject
/// in-memory doubles for both.
pub struct CheckoutService<R: CheckoutRepository, G: PaymentGateway> {
    repo: R,
    gateway: G,
    gateway_timeout: Duration,
    events_secret: Option<String>,
    /// One async mutex per transaction currently being worked on.
    locks: DashMap<TransactionId, Arc<Mutex<()>>>,
}

impl<R: CheckoutRepository, G: PaymentGateway> CheckoutService<R, G> {
    /// Creates a new checkout service with the given adapters.
    pub fn new(repo: R, gateway: G) -> Self {
        Self {
            repo,
            gateway,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            events_secret: None,
            locks: DashMap::new(),
        }
    }

    /// Bounds every gateway call by `timeout`.
    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Requires a valid event checksum on every webhook delivery.
    pub fn with_events_secret(mut self, secret: impl Into<String>) -> Self {
        self.events_secret = Some(secret.into());
        self
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Catalog
    // ─────────────────────────────────────────────────────────────────────────────

    /// Adds a product to the catalog.
    #[tracing::instrument(skip(self, req), fields(name = %req.name, stock = req.stock))]
    pub async fn create_product(&self, req: CreateProductRequest) -> Result<Product, AppError> {
        let price = Money::new(req.price, req.currency)?;
        let product = Product::new(
            req.name,
            price,
            req.stock,
            req.category,
            req.description,
            req.image_url,
        )?;

        let saved = self.repo.save_product(&product).await?;
        tracing::info!(product_id = %saved.id(), "product created");
        Ok(saved)
    }

    /// Gets a product by ID.
    pub async fn get_product(&self, id: ProductId) -> Result<Product, AppError> {
        self.repo
            .find_product(id)
            .await?
            .ok_or(AppError::ProductNotFound(id))
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Orders
    // ─────────────────────────────────────────────────────────────────────────────

    /// Places an order and reserves its stock.
    ///
    /// The reservation is a conditional decrement in storage, so two
    /// checkouts racing for the last units cannot both win. If the order
    /// cannot be saved the reservation is handed back.
    #[tracing::instrument(skip(self, req), fields(product_id = %req.product_id, quantity = req.quantity))]
    pub async fn create_order(&self, req: CreateOrderRequest) -> Result<Order, AppError> {
        let product = self.get_product(req.product_id).await?;

        if !product.has_stock(req.quantity) {
            return Err(AppError::InsufficientStock {
                product_id: product.id(),
                requested: req.quantity,
                available: product.stock(),
            });
        }

        let total_price = product.calculate_total_price(req.quantity)?;
        let order = Transaction::new_order(
            product.id(),
            req.quantity,
            total_price,
            req.customer_email,
            req.shipping_address,
        )?;

        self.repo
            .reserve_stock(product.id(), order.quantity())
            .await
            .map_err(|e| match e {
                RepoError::NotFound => AppError::ProductNotFound(product.id()),
                other => other.into(),
            })?;

        match self.repo.save(&order).await {
            Ok(saved) => {
                tracing::info!(order_id = %saved.id(), total = %saved.amount(), "order created");
                Ok(saved)
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to save order, releasing reservation");
                if let Err(release) = self
                    .repo
                    .release_stock(product.id(), order.quantity())
                    .await
                {
                    tracing::error!(error = %release, "failed to release reservation");
                }
                Err(e.into())
            }
        }
    }

    /// Gets an order by ID.
    pub async fn get_order(&self, id: TransactionId) -> Result<Order, AppError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(AppError::TransactionNotFound(id))
    }

    /// Lists orders in a given status, oldest first.
    pub async fn list_orders_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Order>, AppError> {
        Ok(self.repo.find_by_status(status).await?)
    }

    /// Cancels an unpaid order and returns its stock.
    ///
    /// Voiding an already voided order returns it unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn void_order(
        &self,
        id: TransactionId,
        reason: Option<String>,
    ) -> Result<Order, AppError> {
        let _lock = self.lock_transaction(id).await;
        self.void_order_locked(id, reason).await
    }

    async fn void_order_locked(
        &self,
        id: TransactionId,
        reason: Option<String>,
    ) -> Result<Order, AppError> {
        let mut order = self.get_order(id).await?;
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| "Voided by merchant".to_string());

        if !order.void(reason)? {
            return Ok(order);
        }

        let stored = self.persist(&order).await?;
        self.release_reservation(&stored).await;
        tracing::info!(order_id = %id, "order voided");
        Ok(stored)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────────

    /// Charges an order through the gateway and records the outcome.
    ///
    /// Only PENDING or ERROR orders are charged; anything else is rejected
    /// before the gateway is contacted. A gateway failure or timeout leaves
    /// the order in ERROR, which can be retried.
    #[tracing::instrument(skip(self, payment_method), fields(method = %payment_method.method_type))]
    pub async fn process_payment(
        &self,
        id: TransactionId,
        payment_method: PaymentMethod,
    ) -> Result<Order, AppError> {
        let _lock = self.lock_transaction(id).await;
        self.process_payment_locked(id, payment_method).await
    }

    async fn process_payment_locked(
        &self,
        id: TransactionId,
        payment_method: PaymentMethod,
    ) -> Result<Order, AppError> {
        let mut tx = self.get_order(id).await?;

        if !tx.is_settleable() {
            return Err(AppError::InvalidTransactionState {
                current_state: tx.status(),
                attempted_action: "process payment for".to_string(),
            });
        }

        let request = PaymentRequest {
            amount_in_cents: tx.amount().to_minor_units()?,
            currency: tx.amount().currency(),
            customer_email: tx.customer_email().to_string(),
            reference: tx.reference(),
            payment_method,
        };

        let outcome = match tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.process_payment(request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        };

        match outcome {
            Ok(response) => self.apply_gateway_response(tx, &response).await,
            Err(err) => {
                tracing::error!(transaction_id = %id, error = %err, "gateway call failed");
                if tx.mark_as_error(err.to_string())? {
                    self.persist(&tx).await?;
                }
                Err(err.into())
            }
        }
    }

    /// Pulls the gateway's current view of a charge and applies it.
    ///
    /// Final orders are returned unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn sync_payment_status(&self, id: TransactionId) -> Result<Order, AppError> {
        let _lock = self.lock_transaction(id).await;
        self.sync_payment_status_locked(id).await
    }

    async fn sync_payment_status_locked(&self, id: TransactionId) -> Result<Order, AppError> {
        let tx = self.get_order(id).await?;
        if !tx.is_settleable() {
            return Ok(tx);
        }

        let gateway_id = tx.gateway_transaction_id().map(str::to_string).ok_or_else(|| {
            AppError::BadRequest(format!(
                "Transaction {id} has not been submitted to the gateway"
            ))
        })?;
        self.reconcile(tx, &gateway_id).await
    }

    async fn reconcile(&self, tx: Transaction, gateway_id: &str) -> Result<Order, AppError> {
        let response = match tokio::time::timeout(
            self.gateway_timeout,
            self.gateway.get_transaction_status(gateway_id),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(GatewayError::Timeout),
        }
        .map_err(|err| {
            tracing::error!(gateway_id, error = %err, "gateway status lookup failed");
            AppError::from(err)
        })?;

        if response.reference != tx.reference() {
            return Err(AppError::PaymentProcessing {
                message: format!(
                    "Gateway transaction {gateway_id} belongs to reference {}",
                    response.reference
                ),
                gateway_error: None,
            });
        }

        self.apply_gateway_response(tx, &response).await
    }

    /// Maps a gateway answer onto the state machine and persists it.
    async fn apply_gateway_response(
        &self,
        mut tx: Transaction,
        response: &PaymentResponse,
    ) -> Result<Order, AppError> {
        let data = GatewayData {
            transaction_id: Some(response.id.clone()),
            reference: Some(response.reference.clone()),
            payment_method: response.payment_method_type.clone(),
            error_message: None,
        };

        let changed = match response.status.settles_to() {
            Some(status) => {
                let data = GatewayData {
                    error_message: failure_message(response),
                    ..data
                };
                tx.update_status(status, data)?
            }
            None => tx.attach_gateway_data(data),
        };

        if !changed {
            return Ok(tx);
        }

        let stored = self.persist(&tx).await?;
        tracing::info!(
            transaction_id = %stored.id(),
            gateway_id = %response.id,
            status = %stored.status(),
            "payment status recorded"
        );

        if matches!(
            stored.status(),
            TransactionStatus::Declined | TransactionStatus::Voided
        ) {
            self.release_reservation(&stored).await;
        }
        Ok(stored)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Webhooks
    // ─────────────────────────────────────────────────────────────────────────────

    /// Reconciles a gateway event.
    ///
    /// Never fails: the gateway gets an acknowledgement whatever happens, so
    /// problems are logged and reported as [`WebhookOutcome::Ignored`].
    /// Deliveries may repeat; once the order has settled, repeats are ignored
    /// without calling the gateway. ERROR orders are only confirmed by
    /// looking up a known gateway transaction, never by a fresh charge.
    #[tracing::instrument(skip(self, payload))]
    pub async fn handle_gateway_webhook(&self, payload: &Value) -> WebhookOutcome {
        if let Some(secret) = &self.events_secret {
            if !verify_event_checksum(payload, secret) {
                tracing::warn!("webhook checksum mismatch, ignoring");
                return WebhookOutcome::Ignored;
            }
        }

        let Some(event) = GatewayEvent::from_payload(payload) else {
            tracing::warn!("malformed webhook payload, ignoring");
            return WebhookOutcome::Ignored;
        };

        if !event.is_transaction_update() {
            tracing::debug!(event = %event.event, "unhandled webhook event");
            return WebhookOutcome::Ignored;
        }

        let Ok(id) = event.reference.parse::<TransactionId>() else {
            tracing::warn!(reference = %event.reference, "webhook reference is not ours");
            return WebhookOutcome::NotFound;
        };

        let _lock = self.lock_transaction(id).await;
        self.handle_event_locked(id, event).await
    }

    async fn handle_event_locked(&self, id: TransactionId, event: GatewayEvent) -> WebhookOutcome {
        let tx = match self.repo.find_by_id(id).await {
            Ok(Some(tx)) => tx,
            Ok(None) => {
                tracing::warn!(transaction_id = %id, "webhook for unknown transaction");
                return WebhookOutcome::NotFound;
            }
            Err(e) => {
                tracing::error!(transaction_id = %id, error = %e, "failed to load transaction");
                return WebhookOutcome::Ignored;
            }
        };

        if !tx.is_settleable() || !event.reports_success() {
            tracing::info!(
                transaction_id = %id,
                current = %tx.status(),
                incoming = %event.status,
                "webhook not actionable, ignoring"
            );
            return WebhookOutcome::Ignored;
        }

        let gateway_id = event
            .gateway_transaction_id
            .clone()
            .or_else(|| tx.gateway_transaction_id().map(str::to_string));

        let result = match (gateway_id, event.payment_token) {
            (Some(gateway_id), _) => self.reconcile(tx, &gateway_id).await,
            // An ERROR record may already have been charged by a call that
            // timed out, so only a PENDING one is charged from an event token.
            (None, Some(token)) if tx.is_pending() => {
                self.process_payment_locked(id, PaymentMethod::card(token))
                    .await
            }
            (None, _) => {
                tracing::warn!(
                    transaction_id = %id,
                    current = %tx.status(),
                    "webhook carries nothing to confirm with"
                );
                return WebhookOutcome::Ignored;
            }
        };

        match result {
            Ok(tx) => WebhookOutcome::Processed(tx),
            Err(e) => {
                tracing::warn!(transaction_id = %id, error = %e, "webhook reconciliation failed");
                WebhookOutcome::Ignored
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────────

    async fn persist(&self, tx: &Transaction) -> Result<Transaction, AppError> {
        self.repo.update(tx).await.map_err(|e| {
            if matches!(e, RepoError::Conflict(_)) {
                tracing::warn!(transaction_id = %tx.id(), error = %e, "concurrent update lost");
            }
            e.into()
        })
    }

    /// Returns the order's units to stock. The order is already final by
    /// now, so a failure is logged for manual follow-up instead of failing
    /// the request that settled it.
    async fn release_reservation(&self, tx: &Transaction) {
        match self
            .repo
            .release_stock(tx.product_id(), tx.quantity())
            .await
        {
            Ok(_) => {
                tracing::debug!(product_id = %tx.product_id(), quantity = tx.quantity(), "stock released");
            }
            Err(e) => {
                tracing::error!(
                    transaction_id = %tx.id(),
                    product_id = %tx.product_id(),
                    quantity = tx.quantity(),
                    error = %e,
                    "failed to release stock"
                );
            }
        }
    }

    async fn lock_transaction(&self, id: TransactionId) -> TransactionLock<'_> {
        let lock = self.locks.entry(id).or_default().clone();
        let guard = lock.lock_owned().await;
        TransactionLock {
            locks: &self.locks,
            id,
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    pub(crate) fn held_locks(&self) -> usize {
        self.locks.len()
    }
}

/// Holds a transaction's mutex; dropping it (also when the request future is
/// cancelled) releases the mutex and prunes the map entry once unused.
struct TransactionLock<'a> {
    locks: &'a DashMap<TransactionId, Arc<Mutex<()>>>,
    id: TransactionId,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for TransactionLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map holds the mutex once nobody is waiting on it.
        self.locks
            .remove_if(&self.id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

fn failure_message(response: &PaymentResponse) -> Option<String> {
    match response.status {
        GatewayStatus::Approved | GatewayStatus::Pending => None,
        GatewayStatus::Declined => Some(
            response
                .status_message
                .clone()
                .unwrap_or_else(|| "Declined by gateway".to_string()),
        ),
        GatewayStatus::Voided => Some(
            response
                .status_message
                .clone()
                .unwrap_or_else(|| "Voided by gateway".to_string()),
        ),
        GatewayStatus::Error => Some(
            response
                .status_message
                .clone()
                .unwrap_or_else(|| "Gateway reported an error".to_string()),
        ),
    }
}
