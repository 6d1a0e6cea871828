//! CheckoutService unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::{Value, json};

    use checkout_types::{
        AppError, CreateOrderRequest, CreateProductRequest, Currency, GatewayError, GatewayStatus,
        Money, PaymentGateway, PaymentMethod, PaymentRequest, PaymentResponse, Product, ProductId,
        ProductRepository, RepoError, ShippingAddress, Transaction, TransactionId,
        TransactionRepository, TransactionStatus,
    };

    use crate::{CheckoutService, WebhookOutcome};

    /// Simple in-memory repository for testing the service layer.
    pub struct MockRepo {
        products: Mutex<HashMap<ProductId, Product>>,
        transactions: Mutex<HashMap<TransactionId, Transaction>>,
        fail_release: AtomicBool,
    }

    impl MockRepo {
        pub fn new() -> Self {
            Self {
                products: Mutex::new(HashMap::new()),
                transactions: Mutex::new(HashMap::new()),
                fail_release: AtomicBool::new(false),
            }
        }

        pub fn set_fail_release(&self, fail: bool) {
            self.fail_release.store(fail, Ordering::SeqCst);
        }

        fn stock_of(&self, id: ProductId) -> u32 {
            self.products.lock().unwrap()[&id].stock()
        }
    }

    #[async_trait]
    impl ProductRepository for MockRepo {
        async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepoError> {
            Ok(self.products.lock().unwrap().get(&id).cloned())
        }

        async fn save_product(&self, product: &Product) -> Result<Product, RepoError> {
            self.products
                .lock()
                .unwrap()
                .insert(product.id(), product.clone());
            Ok(product.clone())
        }

        async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError> {
            let mut products = self.products.lock().unwrap();
            let product = products.get_mut(&id).ok_or(RepoError::NotFound)?;
            product.decrease_stock(quantity)?;
            Ok(product.clone())
        }

        async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError> {
            if self.fail_release.load(Ordering::SeqCst) {
                return Err(RepoError::Database("disk I/O error".into()));
            }
            let mut products = self.products.lock().unwrap();
            let product = products.get_mut(&id).ok_or(RepoError::NotFound)?;
            product.increase_stock(quantity)?;
            Ok(product.clone())
        }
    }

    #[async_trait]
    impl TransactionRepository for MockRepo {
        async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
            Ok(self.transactions.lock().unwrap().get(&id).cloned())
        }

        async fn find_by_status(
            &self,
            status: TransactionStatus,
        ) -> Result<Vec<Transaction>, RepoError> {
            let mut found: Vec<Transaction> = self
                .transactions
                .lock()
                .unwrap()
                .values()
                .filter(|t| t.status() == status)
                .cloned()
                .collect();
            found.sort_by_key(|t| t.created_at());
            Ok(found)
        }

        async fn save(&self, transaction: &Transaction) -> Result<Transaction, RepoError> {
            self.transactions
                .lock()
                .unwrap()
                .insert(transaction.id(), transaction.clone());
            Ok(transaction.clone())
        }

        async fn update(&self, transaction: &Transaction) -> Result<Transaction, RepoError> {
            let mut transactions = self.transactions.lock().unwrap();
            let stored = transactions
                .get_mut(&transaction.id())
                .ok_or(RepoError::NotFound)?;
            if stored.version() != transaction.version() {
                return Err(RepoError::Conflict("stale version".into()));
            }
            let mut next = transaction.clone();
            next.bump_version();
            *stored = next.clone();
            Ok(next)
        }
    }

    /// Scripted gateway that counts the calls it receives.
    #[derive(Clone)]
    pub struct MockGateway {
        state: Arc<MockGatewayState>,
    }

    pub struct MockGatewayState {
        charge_status: Mutex<GatewayStatus>,
        lookup_status: Mutex<GatewayStatus>,
        fail: AtomicBool,
        delay: Mutex<Option<Duration>>,
        charges: AtomicUsize,
        lookups: AtomicUsize,
        last_request: Mutex<Option<PaymentRequest>>,
    }

    impl MockGateway {
        pub fn new(charge_status: GatewayStatus) -> Self {
            Self {
                state: Arc::new(MockGatewayState {
                    charge_status: Mutex::new(charge_status),
                    lookup_status: Mutex::new(GatewayStatus::Approved),
                    fail: AtomicBool::new(false),
                    delay: Mutex::new(None),
                    charges: AtomicUsize::new(0),
                    lookups: AtomicUsize::new(0),
                    last_request: Mutex::new(None),
                }),
            }
        }

        pub fn set_charge_status(&self, status: GatewayStatus) {
            *self.state.charge_status.lock().unwrap() = status;
        }

        pub fn set_lookup_status(&self, status: GatewayStatus) {
            *self.state.lookup_status.lock().unwrap() = status;
        }

        pub fn set_fail(&self, fail: bool) {
            self.state.fail.store(fail, Ordering::SeqCst);
        }

        pub fn set_delay(&self, delay: Duration) {
            *self.state.delay.lock().unwrap() = Some(delay);
        }

        pub fn charges(&self) -> usize {
            self.state.charges.load(Ordering::SeqCst)
        }

        pub fn lookups(&self) -> usize {
            self.state.lookups.load(Ordering::SeqCst)
        }

        pub fn last_request(&self) -> Option<PaymentRequest> {
            self.state.last_request.lock().unwrap().clone()
        }

        fn response(&self, id: String, status: GatewayStatus, reference: String) -> PaymentResponse {
            PaymentResponse {
                id,
                status,
                status_message: match status {
                    GatewayStatus::Declined => Some("Insufficient funds".into()),
                    _ => None,
                },
                reference,
                amount_in_cents: 0,
                currency: "COP".into(),
                payment_method_type: Some("CARD".into()),
                created_at: Utc::now(),
                finalized_at: None,
            }
        }
    }

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn process_payment(
            &self,
            request: PaymentRequest,
        ) -> Result<PaymentResponse, GatewayError> {
            let n = self.state.charges.fetch_add(1, Ordering::SeqCst) + 1;
            *self.state.last_request.lock().unwrap() = Some(request.clone());

            let delay = *self.state.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            if self.state.fail.load(Ordering::SeqCst) {
                return Err(GatewayError::Rejected {
                    status: 422,
                    body: Some(json!({"error": {"type": "INPUT_VALIDATION_ERROR"}})),
                });
            }

            let status = *self.state.charge_status.lock().unwrap();
            let mut response = self.response(format!("wp-{n}"), status, request.reference);
            response.amount_in_cents = request.amount_in_cents;
            Ok(response)
        }

        async fn get_transaction_status(
            &self,
            gateway_transaction_id: &str,
        ) -> Result<PaymentResponse, GatewayError> {
            self.state.lookups.fetch_add(1, Ordering::SeqCst);
            if self.state.fail.load(Ordering::SeqCst) {
                return Err(GatewayError::Http("connection refused".into()));
            }
            // The id encodes the reference so the lookup can echo it back.
            let reference = gateway_transaction_id
                .split_once(':')
                .map(|(_, r)| r.to_string())
                .unwrap_or_default();
            let status = *self.state.lookup_status.lock().unwrap();
            Ok(self.response(gateway_transaction_id.to_string(), status, reference))
        }
    }

    type TestService = CheckoutService<MockRepo, MockGateway>;

    fn service_with(gateway: &MockGateway) -> TestService {
        CheckoutService::new(MockRepo::new(), gateway.clone())
    }

    fn shipping() -> ShippingAddress {
        ShippingAddress {
            recipient_name: "Ana Gomez".to_string(),
            address_line: "Calle 10 # 5-20".to_string(),
            city: "Bogota".to_string(),
            region: None,
            postal_code: None,
            country: "CO".to_string(),
            phone: None,
        }
    }

    async fn seed_product(service: &TestService, stock: u32) -> Product {
        service
            .create_product(CreateProductRequest {
                name: "Colombian coffee 500g".to_string(),
                price: dec!(50000),
                currency: Currency::COP,
                stock,
                category: None,
                description: None,
                image_url: None,
            })
            .await
            .unwrap()
    }

    fn order_request(product_id: ProductId, quantity: u32) -> CreateOrderRequest {
        CreateOrderRequest {
            product_id,
            quantity,
            shipping_address: shipping(),
            customer_email: "buyer@example.com".to_string(),
        }
    }

    async fn seed_order(service: &TestService, stock: u32, quantity: u32) -> (Product, Transaction) {
        let product = seed_product(service, stock).await;
        let order = service
            .create_order(order_request(product.id(), quantity))
            .await
            .unwrap();
        (product, order)
    }

    fn webhook(reference: &str, status: &str, transaction_extra: Value) -> Value {
        let mut transaction = json!({ "reference": reference, "status": status });
        if let (Some(target), Some(extra)) = (transaction.as_object_mut(), transaction_extra.as_object()) {
            for (k, v) in extra {
                target.insert(k.clone(), v.clone());
            }
        }
        json!({
            "event": "transaction.updated",
            "data": { "transaction": transaction },
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Catalog and orders
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_create_and_get_product() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);

        let product = seed_product(&service, 5).await;
        let fetched = service.get_product(product.id()).await.unwrap();

        assert_eq!(fetched.stock(), 5);
        assert_eq!(fetched.price(), Money::cop(dec!(50000)).unwrap());
    }

    #[tokio::test]
    async fn test_create_product_rejects_negative_price() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);

        let result = service
            .create_product(CreateProductRequest {
                name: "Mug".into(),
                price: dec!(-1),
                currency: Currency::COP,
                stock: 1,
                category: None,
                description: None,
                image_url: None,
            })
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_get_product_not_found() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);

        let result = service.get_product(ProductId::new()).await;

        assert!(matches!(result, Err(AppError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_order_reserves_stock() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);

        let (product, order) = seed_order(&service, 5, 2).await;

        assert_eq!(order.amount(), Money::cop(dec!(100000)).unwrap());
        assert_eq!(order.status(), TransactionStatus::Pending);
        assert_eq!(order.shipping(), Some(&shipping()));
        assert_eq!(service.repo().stock_of(product.id()), 3);
    }

    #[tokio::test]
    async fn test_create_order_insufficient_stock() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let product = seed_product(&service, 1).await;

        let result = service.create_order(order_request(product.id(), 2)).await;

        assert!(matches!(
            result,
            Err(AppError::InsufficientStock {
                requested: 2,
                available: 1,
                ..
            })
        ));
        assert_eq!(service.repo().stock_of(product.id()), 1);
    }

    #[tokio::test]
    async fn test_create_order_unknown_product() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);

        let result = service.create_order(order_request(ProductId::new(), 1)).await;

        assert!(matches!(result, Err(AppError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_create_order_rejects_invalid_input() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let product = seed_product(&service, 5).await;

        let mut bad_email = order_request(product.id(), 1);
        bad_email.customer_email = "not-an-email".into();
        let zero_quantity = order_request(product.id(), 0);

        assert!(matches!(
            service.create_order(bad_email).await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service.create_order(zero_quantity).await,
            Err(AppError::BadRequest(_))
        ));
        assert_eq!(service.repo().stock_of(product.id()), 5);
    }

    #[tokio::test]
    async fn test_get_order_not_found() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);

        let result = service.get_order(TransactionId::new()).await;

        assert!(matches!(result, Err(AppError::TransactionNotFound(_))));
    }

    #[tokio::test]
    async fn test_list_orders_by_status() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (product, first) = seed_order(&service, 10, 1).await;
        let second = service
            .create_order(order_request(product.id(), 1))
            .await
            .unwrap();

        service
            .process_payment(second.id(), PaymentMethod::card("tok_1"))
            .await
            .unwrap();

        let pending = service
            .list_orders_by_status(TransactionStatus::Pending)
            .await
            .unwrap();
        let approved = service
            .list_orders_by_status(TransactionStatus::Approved)
            .await
            .unwrap();

        assert_eq!(pending, vec![first]);
        assert_eq!(approved.len(), 1);
        assert_eq!(approved[0].id(), second.id());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Payments
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_happy_path_payment_is_approved() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 2).await;

        let paid = service
            .process_payment(order.id(), PaymentMethod::card("tok_test_1"))
            .await
            .unwrap();

        assert_eq!(paid.status(), TransactionStatus::Approved);
        assert_eq!(paid.gateway_transaction_id(), Some("wp-1"));
        assert_eq!(paid.payment_method(), Some("CARD"));
        assert_eq!(paid.version(), 1);

        let request = gateway.last_request().unwrap();
        assert_eq!(request.amount_in_cents, 10_000_000);
        assert_eq!(request.currency, Currency::COP);
        assert_eq!(request.reference, order.id().to_string());
        assert_eq!(request.payment_method.token, "tok_test_1");
    }

    #[tokio::test]
    async fn test_declined_payment_releases_stock() {
        let gateway = MockGateway::new(GatewayStatus::Declined);
        let service = service_with(&gateway);
        let (product, order) = seed_order(&service, 5, 2).await;
        assert_eq!(service.repo().stock_of(product.id()), 3);

        let declined = service
            .process_payment(order.id(), PaymentMethod::card("tok_test_1"))
            .await
            .unwrap();

        assert_eq!(declined.status(), TransactionStatus::Declined);
        assert_eq!(declined.error_message(), Some("Insufficient funds"));
        assert_eq!(service.repo().stock_of(product.id()), 5);
    }

    #[tokio::test]
    async fn test_gateway_voided_releases_stock() {
        let gateway = MockGateway::new(GatewayStatus::Voided);
        let service = service_with(&gateway);
        let (product, order) = seed_order(&service, 5, 2).await;

        let voided = service
            .process_payment(order.id(), PaymentMethod::card("tok_test_1"))
            .await
            .unwrap();

        assert_eq!(voided.status(), TransactionStatus::Voided);
        assert_eq!(service.repo().stock_of(product.id()), 5);
    }

    #[tokio::test]
    async fn test_pending_gateway_answer_keeps_order_pending() {
        let gateway = MockGateway::new(GatewayStatus::Pending);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;

        let pending = service
            .process_payment(order.id(), PaymentMethod::card("tok_test_1"))
            .await
            .unwrap();

        assert!(pending.is_pending());
        assert_eq!(pending.gateway_transaction_id(), Some("wp-1"));
        assert_eq!(pending.updated_at(), order.updated_at());
    }

    #[tokio::test]
    async fn test_gateway_failure_marks_error_then_retry_succeeds() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        gateway.set_fail(true);
        let service = service_with(&gateway);
        let (product, order) = seed_order(&service, 5, 1).await;

        let result = service
            .process_payment(order.id(), PaymentMethod::card("tok_test_1"))
            .await;

        match result {
            Err(AppError::PaymentProcessing { gateway_error, .. }) => {
                assert!(gateway_error.is_some());
            }
            other => panic!("expected payment processing error, got {other:?}"),
        }
        let errored = service.get_order(order.id()).await.unwrap();
        assert_eq!(errored.status(), TransactionStatus::Error);
        assert!(errored.error_message().is_some());
        assert_eq!(service.repo().stock_of(product.id()), 4);

        gateway.set_fail(false);
        let retried = service
            .process_payment(order.id(), PaymentMethod::card("tok_test_1"))
            .await
            .unwrap();

        assert_eq!(retried.status(), TransactionStatus::Approved);
        assert_eq!(gateway.charges(), 2);
    }

    #[tokio::test]
    async fn test_gateway_timeout_marks_error() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        gateway.set_delay(Duration::from_millis(500));
        let service = service_with(&gateway).with_gateway_timeout(Duration::from_millis(20));
        let (_, order) = seed_order(&service, 5, 1).await;

        let result = service
            .process_payment(order.id(), PaymentMethod::card("tok_test_1"))
            .await;

        assert!(matches!(result, Err(AppError::PaymentProcessing { .. })));
        let errored = service.get_order(order.id()).await.unwrap();
        assert_eq!(errored.status(), TransactionStatus::Error);
        assert_eq!(errored.error_message(), Some("Gateway call timed out"));
    }

    #[tokio::test]
    async fn test_settled_order_is_rejected_before_gateway_call() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;

        service
            .process_payment(order.id(), PaymentMethod::card("tok_test_1"))
            .await
            .unwrap();
        let result = service
            .process_payment(order.id(), PaymentMethod::card("tok_test_1"))
            .await;

        assert!(matches!(
            result,
            Err(AppError::InvalidTransactionState {
                current_state: TransactionStatus::Approved,
                ..
            })
        ));
        assert_eq!(gateway.charges(), 1);
    }

    #[tokio::test]
    async fn test_process_payment_unknown_order() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);

        let result = service
            .process_payment(TransactionId::new(), PaymentMethod::card("tok_test_1"))
            .await;

        assert!(matches!(result, Err(AppError::TransactionNotFound(_))));
        assert_eq!(gateway.charges(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_payments_charge_once() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        gateway.set_delay(Duration::from_millis(50));
        let service = Arc::new(service_with(&gateway));
        let (_, order) = seed_order(&service, 5, 1).await;
        let order_id = order.id();

        let first = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .process_payment(order_id, PaymentMethod::card("tok_a"))
                    .await
            })
        };
        let second = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .process_payment(order_id, PaymentMethod::card("tok_b"))
                    .await
            })
        };

        let results = [first.await.unwrap(), second.await.unwrap()];
        let approved = results.iter().filter(|r| r.is_ok()).count();
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(AppError::InvalidTransactionState { .. })))
            .count();

        assert_eq!(approved, 1);
        assert_eq!(rejected, 1);
        assert_eq!(gateway.charges(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Sync and void
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_sync_without_gateway_id_is_bad_request() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;

        let result = service.sync_payment_status(order.id()).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(gateway.lookups(), 0);
    }

    #[tokio::test]
    async fn test_sync_settles_pending_charge() {
        let gateway = MockGateway::new(GatewayStatus::Pending);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;

        // Record a gateway id that lets the mock echo our reference back.
        let mut tx = service.get_order(order.id()).await.unwrap();
        tx.attach_gateway_data(checkout_types::GatewayData {
            transaction_id: Some(format!("wp-9:{}", order.id())),
            ..Default::default()
        });
        service.repo().update(&tx).await.unwrap();

        gateway.set_lookup_status(GatewayStatus::Approved);
        let synced = service.sync_payment_status(order.id()).await.unwrap();

        assert_eq!(synced.status(), TransactionStatus::Approved);
        assert_eq!(gateway.lookups(), 1);
        assert_eq!(gateway.charges(), 0);
    }

    #[tokio::test]
    async fn test_sync_final_order_is_a_no_op() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;
        service
            .process_payment(order.id(), PaymentMethod::card("tok_1"))
            .await
            .unwrap();

        let synced = service.sync_payment_status(order.id()).await.unwrap();

        assert_eq!(synced.status(), TransactionStatus::Approved);
        assert_eq!(gateway.lookups(), 0);
    }

    #[tokio::test]
    async fn test_void_order_releases_stock_once() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (product, order) = seed_order(&service, 5, 2).await;

        let voided = service
            .void_order(order.id(), Some("Customer changed their mind".into()))
            .await
            .unwrap();
        assert_eq!(voided.status(), TransactionStatus::Voided);
        assert_eq!(voided.error_message(), Some("Customer changed their mind"));
        assert_eq!(service.repo().stock_of(product.id()), 5);

        let again = service.void_order(order.id(), None).await.unwrap();
        assert_eq!(again.status(), TransactionStatus::Voided);
        assert_eq!(service.repo().stock_of(product.id()), 5);
    }

    #[tokio::test]
    async fn test_void_approved_order_fails() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (product, order) = seed_order(&service, 5, 2).await;
        service
            .process_payment(order.id(), PaymentMethod::card("tok_1"))
            .await
            .unwrap();

        let result = service.void_order(order.id(), None).await;

        assert!(matches!(
            result,
            Err(AppError::InvalidTransactionState { .. })
        ));
        assert_eq!(service.repo().stock_of(product.id()), 3);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Webhooks
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_webhook_double_delivery_charges_once() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;
        let payload = webhook(
            &order.id().to_string(),
            "APPROVED",
            json!({ "payment_method": { "type": "CARD", "token": "tok_test_1" } }),
        );

        let first = service.handle_gateway_webhook(&payload).await;
        match &first {
            WebhookOutcome::Processed(tx) => assert!(tx.status().is_approved()),
            other => panic!("expected processed, got {other:?}"),
        }

        let second = service.handle_gateway_webhook(&payload).await;
        assert_eq!(second, WebhookOutcome::Ignored);
        assert_eq!(gateway.charges(), 1);
    }

    #[tokio::test]
    async fn test_webhook_with_gateway_id_confirms_by_lookup() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;
        let payload = webhook(
            &order.id().to_string(),
            "APPROVED",
            json!({ "id": format!("wp-77:{}", order.id()) }),
        );

        let outcome = service.handle_gateway_webhook(&payload).await;

        assert!(matches!(outcome, WebhookOutcome::Processed(_)));
        assert_eq!(gateway.lookups(), 1);
        assert_eq!(gateway.charges(), 0);
        let stored = service.get_order(order.id()).await.unwrap();
        assert!(stored.status().is_approved());
    }

    #[tokio::test]
    async fn test_webhook_lookup_for_other_reference_is_ignored() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;
        let payload = webhook(
            &order.id().to_string(),
            "APPROVED",
            json!({ "id": format!("wp-77:{}", TransactionId::new()) }),
        );

        let outcome = service.handle_gateway_webhook(&payload).await;

        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert!(service.get_order(order.id()).await.unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_webhook_unknown_reference() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);

        let unknown = webhook(&TransactionId::new().to_string(), "APPROVED", json!({}));
        let foreign = webhook("order-123", "APPROVED", json!({}));

        assert_eq!(
            service.handle_gateway_webhook(&unknown).await,
            WebhookOutcome::NotFound
        );
        assert_eq!(
            service.handle_gateway_webhook(&foreign).await,
            WebhookOutcome::NotFound
        );
    }

    #[tokio::test]
    async fn test_webhook_ignores_malformed_and_unactionable_events() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;
        let reference = order.id().to_string();

        let malformed = json!({ "event": "transaction.updated", "data": {} });
        let other_event = json!({
            "event": "nequi_token.updated",
            "data": { "transaction": { "reference": reference, "status": "APPROVED" } }
        });
        let declined = webhook(
            &reference,
            "DECLINED",
            json!({ "payment_method": { "token": "tok_1" } }),
        );
        let no_handle = webhook(&reference, "APPROVED", json!({}));

        for payload in [malformed, other_event, declined, no_handle, Value::Null] {
            assert_eq!(
                service.handle_gateway_webhook(&payload).await,
                WebhookOutcome::Ignored
            );
        }
        assert_eq!(gateway.charges(), 0);
        assert_eq!(gateway.lookups(), 0);
        assert!(service.get_order(order.id()).await.unwrap().is_pending());
    }

    #[tokio::test]
    async fn test_webhook_gateway_failure_is_ignored() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        gateway.set_fail(true);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;
        let payload = webhook(
            &order.id().to_string(),
            "APPROVED",
            json!({ "payment_method": { "token": "tok_1" } }),
        );

        let outcome = service.handle_gateway_webhook(&payload).await;

        assert_eq!(outcome, WebhookOutcome::Ignored);
        let stored = service.get_order(order.id()).await.unwrap();
        assert_eq!(stored.status(), TransactionStatus::Error);
    }

    #[tokio::test]
    async fn test_webhook_requires_checksum_when_secret_configured() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        let service = service_with(&gateway).with_events_secret("events_secret");
        let (_, order) = seed_order(&service, 5, 1).await;
        let payload = webhook(
            &order.id().to_string(),
            "APPROVED",
            json!({ "payment_method": { "token": "tok_1" } }),
        );

        let outcome = service.handle_gateway_webhook(&payload).await;

        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert_eq!(gateway.charges(), 0);
    }

    #[tokio::test]
    async fn test_webhook_token_does_not_recharge_errored_order() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        gateway.set_fail(true);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;
        let failed = service
            .process_payment(order.id(), PaymentMethod::card("tok_1"))
            .await;
        assert!(failed.is_err());
        assert_eq!(gateway.charges(), 1);

        gateway.set_fail(false);
        let payload = webhook(
            &order.id().to_string(),
            "APPROVED",
            json!({ "payment_method": { "token": "tok_1" } }),
        );
        let outcome = service.handle_gateway_webhook(&payload).await;

        assert_eq!(outcome, WebhookOutcome::Ignored);
        assert_eq!(gateway.charges(), 1);
        let stored = service.get_order(order.id()).await.unwrap();
        assert_eq!(stored.status(), TransactionStatus::Error);
    }

    #[tokio::test]
    async fn test_webhook_lookup_settles_errored_order() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        gateway.set_fail(true);
        let service = service_with(&gateway);
        let (_, order) = seed_order(&service, 5, 1).await;
        let _ = service
            .process_payment(order.id(), PaymentMethod::card("tok_1"))
            .await;

        gateway.set_fail(false);
        let payload = webhook(
            &order.id().to_string(),
            "APPROVED",
            json!({ "id": format!("wp-1:{}", order.id()) }),
        );
        let outcome = service.handle_gateway_webhook(&payload).await;

        assert!(matches!(outcome, WebhookOutcome::Processed(_)));
        assert_eq!(gateway.charges(), 1);
        assert_eq!(gateway.lookups(), 1);
        let stored = service.get_order(order.id()).await.unwrap();
        assert!(stored.status().is_approved());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Locks and stock release
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cancelled_request_releases_transaction_lock() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        gateway.set_delay(Duration::from_millis(500));
        let service = Arc::new(service_with(&gateway));
        let (_, order) = seed_order(&service, 5, 1).await;
        let order_id = order.id();

        let in_flight = {
            let service = service.clone();
            tokio::spawn(async move {
                service
                    .process_payment(order_id, PaymentMethod::card("tok_a"))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(service.held_locks(), 1);

        in_flight.abort();
        assert!(in_flight.await.unwrap_err().is_cancelled());
        assert_eq!(service.held_locks(), 0);

        gateway.set_delay(Duration::ZERO);
        let paid = service
            .process_payment(order_id, PaymentMethod::card("tok_b"))
            .await
            .unwrap();
        assert!(paid.status().is_approved());
        assert_eq!(service.held_locks(), 0);
    }

    #[tokio::test]
    async fn test_failed_stock_release_keeps_settled_outcome() {
        let gateway = MockGateway::new(GatewayStatus::Approved);
        gateway.set_charge_status(GatewayStatus::Declined);
        let service = service_with(&gateway);
        let (product, order) = seed_order(&service, 5, 2).await;
        service.repo().set_fail_release(true);

        let declined = service
            .process_payment(order.id(), PaymentMethod::card("tok_1"))
            .await
            .unwrap();

        assert_eq!(declined.status(), TransactionStatus::Declined);
        assert_eq!(service.repo().stock_of(product.id()), 3);

        let other = service
            .create_order(order_request(product.id(), 1))
            .await
            .unwrap();
        let voided = service.void_order(other.id(), None).await.unwrap();
        assert_eq!(voided.status(), TransactionStatus::Voided);
    }
}
