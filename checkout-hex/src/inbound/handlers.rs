//! HTTP request handlers.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use utoipa::OpenApi;

use checkout_types::{
    AppError, CheckoutRepository, CreateOrderRequest, CreateProductRequest, OrderResponse,
    PaymentGateway, ProcessPaymentRequest, ProductId, ProductResponse, TransactionId,
    TransactionStatus, VoidOrderRequest, WebhookAck,
};

use crate::CheckoutService;
use crate::openapi::ApiDoc;

/// Application state shared across handlers.
pub struct AppState<R: CheckoutRepository, G: PaymentGateway> {
    pub service: CheckoutService<R, G>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::ProductNotFound(_) | AppError::TransactionNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            AppError::InsufficientStock { .. } => StatusCode::CONFLICT,
            AppError::InvalidTransactionState { .. } => StatusCode::CONFLICT,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::PaymentProcessing { .. } => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }

        let mut body = serde_json::json!({
            "error": self.0.to_string(),
            "code": status.as_u16()
        });
        if let AppError::PaymentProcessing {
            gateway_error: Some(details),
            ..
        } = &self.0
        {
            body["gateway_error"] = details.clone();
        }

        (status, Json(body)).into_response()
    }
}

fn parse_product_id(id: &str) -> Result<ProductId, AppError> {
    id.parse()
        .map_err(|_| AppError::BadRequest("Invalid product ID".into()))
}

fn parse_order_id(id: &str) -> Result<TransactionId, AppError> {
    id.parse()
        .map_err(|_| AppError::BadRequest("Invalid order ID".into()))
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

/// OpenAPI document.
pub async fn openapi_json() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}

// ─────────────────────────────────────────────────────────────────────────────
// Products
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(name = %req.name))]
pub async fn create_product<R: CheckoutRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Json(req): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.service.create_product(req).await?;
    Ok((StatusCode::CREATED, Json(ProductResponse::from(&product))))
}

/// Get product by ID.
#[tracing::instrument(skip(state), fields(product_id = %id))]
pub async fn get_product<R: CheckoutRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.service.get_product(parse_product_id(&id)?).await?;
    Ok(Json(ProductResponse::from(&product)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Orders
// ─────────────────────────────────────────────────────────────────────────────

#[tracing::instrument(skip(state, req), fields(product_id = %req.product_id, quantity = req.quantity))]
pub async fn create_order<R: CheckoutRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Json(req): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.service.create_order(req).await?;
    Ok((StatusCode::CREATED, Json(OrderResponse::from(&order))))
}

/// Get order by ID.
#[tracing::instrument(skip(state), fields(order_id = %id))]
pub async fn get_order<R: CheckoutRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.service.get_order(parse_order_id(&id)?).await?;
    Ok(Json(OrderResponse::from(&order)))
}

#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    pub status: Option<String>,
}

/// List orders in a status (PENDING when omitted).
#[tracing::instrument(skip(state))]
pub async fn list_orders<R: CheckoutRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Query(query): Query<ListOrdersQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let status = match query.status.as_deref() {
        None => TransactionStatus::Pending,
        Some(raw) => raw
            .to_ascii_uppercase()
            .parse::<TransactionStatus>()
            .map_err(|e| AppError::BadRequest(e.to_string()))?,
    };

    let orders = state.service.list_orders_by_status(status).await?;
    let response: Vec<OrderResponse> = orders.iter().map(OrderResponse::from).collect();
    Ok(Json(response))
}

/// Pay an order.
#[tracing::instrument(skip(state, req), fields(order_id = %id))]
pub async fn process_payment<R: CheckoutRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Path(id): Path<String>,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .service
        .process_payment(parse_order_id(&id)?, req.payment_method)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// Void an unpaid order.
#[tracing::instrument(skip(state, body), fields(order_id = %id))]
pub async fn void_order<R: CheckoutRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Path(id): Path<String>,
    body: axum::body::Bytes,
) -> Result<impl IntoResponse, ApiError> {
    // The body is optional; an empty one means "no reason given".
    let reason = if body.is_empty() {
        None
    } else {
        serde_json::from_slice::<VoidOrderRequest>(&body)
            .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?
            .reason
    };
    let order = state
        .service
        .void_order(parse_order_id(&id)?, reason)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// Pull the latest payment status from the gateway.
#[tracing::instrument(skip(state), fields(order_id = %id))]
pub async fn sync_order<R: CheckoutRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state
        .service
        .sync_payment_status(parse_order_id(&id)?)
        .await?;
    Ok(Json(OrderResponse::from(&order)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway webhooks
// ─────────────────────────────────────────────────────────────────────────────

/// Gateway event receiver. Always answers 200 so the gateway does not retry
/// deliveries that cannot be acted on.
#[tracing::instrument(skip(state, body))]
pub async fn gateway_webhook<R: CheckoutRepository, G: PaymentGateway>(
    State(state): State<Arc<AppState<R, G>>>,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let payload = serde_json::from_slice::<serde_json::Value>(&body)
        .unwrap_or(serde_json::Value::Null);
    let outcome = state.service.handle_gateway_webhook(&payload).await;
    (
        StatusCode::OK,
        Json(WebhookAck {
            status: outcome.ack_status(),
        }),
    )
}
