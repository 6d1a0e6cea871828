//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use checkout_types::domain::{
    Currency, Money, ProductId, ShippingAddress, TransactionId, TransactionStatus,
};
use checkout_types::dto::{
    CreateOrderRequest, CreateProductRequest, OrderResponse, ProcessPaymentRequest,
    ProductResponse, VoidOrderRequest, WebhookAck, WebhookAckStatus,
};
use checkout_types::ports::{PaymentMethod, PaymentMethodType};
use utoipa::OpenApi;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Add a product to the catalog
#[utoipa::path(
    post,
    path = "/api/products",
    tag = "products",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ProductResponse),
        (status = 400, description = "Invalid product")
    )
)]
async fn create_product() {}

/// Get product by ID
#[utoipa::path(
    get,
    path = "/api/products/{id}",
    tag = "products",
    params(
        ("id" = ProductId, Path, description = "Product ID (UUID)")
    ),
    responses(
        (status = 200, description = "Product details", body = ProductResponse),
        (status = 404, description = "Product not found")
    )
)]
async fn get_product() {}

/// Place an order and reserve its stock
#[utoipa::path(
    post,
    path = "/api/orders",
    tag = "orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created in PENDING", body = OrderResponse),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Product not found"),
        (status = 409, description = "Insufficient stock")
    )
)]
async fn create_order() {}

/// List orders by status
#[utoipa::path(
    get,
    path = "/api/orders",
    tag = "orders",
    params(
        ("status" = Option<TransactionStatus>, Query, description = "Status filter, PENDING when omitted")
    ),
    responses(
        (status = 200, description = "Orders, oldest first", body = Vec<OrderResponse>),
        (status = 400, description = "Unknown status")
    )
)]
async fn list_orders() {}

/// Get order by ID
#[utoipa::path(
    get,
    path = "/api/orders/{id}",
    tag = "orders",
    params(
        ("id" = TransactionId, Path, description = "Order ID (UUID)")
    ),
    responses(
        (status = 200, description = "Order details", body = OrderResponse),
        (status = 404, description = "Order not found")
    )
)]
async fn get_order() {}

/// Pay an order through the gateway
#[utoipa::path(
    post,
    path = "/api/orders/{id}/payment",
    tag = "payments",
    request_body = ProcessPaymentRequest,
    params(
        ("id" = TransactionId, Path, description = "Order ID (UUID)")
    ),
    responses(
        (status = 200, description = "Gateway outcome recorded", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already settled"),
        (status = 502, description = "Gateway failure; the order is left in ERROR")
    )
)]
async fn process_payment() {}

/// Void an unpaid order
#[utoipa::path(
    post,
    path = "/api/orders/{id}/void",
    tag = "orders",
    request_body(content = VoidOrderRequest, description = "Optional; the body may be empty"),
    params(
        ("id" = TransactionId, Path, description = "Order ID (UUID)")
    ),
    responses(
        (status = 200, description = "Order voided and stock released", body = OrderResponse),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order already settled")
    )
)]
async fn void_order() {}

/// Refresh an order's payment status from the gateway
#[utoipa::path(
    post,
    path = "/api/orders/{id}/sync",
    tag = "payments",
    params(
        ("id" = TransactionId, Path, description = "Order ID (UUID)")
    ),
    responses(
        (status = 200, description = "Current order state", body = OrderResponse),
        (status = 400, description = "Order was never submitted to the gateway"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Gateway lookup failed")
    )
)]
async fn sync_order() {}

/// Gateway event receiver
#[utoipa::path(
    post,
    path = "/api/webhooks/gateway",
    tag = "webhooks",
    request_body = inline(serde_json::Value),
    responses(
        (status = 200, description = "Delivery acknowledged", body = WebhookAck)
    )
)]
async fn gateway_webhook() {}

/// OpenAPI documentation for the Checkout API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Checkout Service API",
        version = "1.0.0",
        description = "Product stock, order lifecycle and payment gateway reconciliation.\n\nOrders start PENDING, reserve stock on creation and settle to APPROVED, DECLINED or VOIDED. Declined and voided orders return their stock.",
        license(name = "MIT"),
    ),
    paths(
        health,
        create_product,
        get_product,
        create_order,
        list_orders,
        get_order,
        process_payment,
        void_order,
        sync_order,
        gateway_webhook,
    ),
    components(
        schemas(
            CreateProductRequest,
            ProductResponse,
            CreateOrderRequest,
            OrderResponse,
            ProcessPaymentRequest,
            VoidOrderRequest,
            WebhookAck,
            WebhookAckStatus,
            PaymentMethod,
            PaymentMethodType,
            ShippingAddress,
            Money,
            Currency,
            TransactionStatus,
            ProductId,
            TransactionId,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "products", description = "Catalog seeding and lookup"),
        (name = "orders", description = "Order creation, lookup and cancellation"),
        (name = "payments", description = "Gateway charges and status sync"),
        (name = "webhooks", description = "Gateway event delivery"),
    )
)]
pub struct ApiDoc;
