//! # Checkout Client SDK
//!
//! A typed Rust client for the Checkout API.

use checkout_types::{
    CreateOrderRequest, CreateProductRequest, OrderResponse, PaymentMethod,
    ProcessPaymentRequest, ProductId, ProductResponse, TransactionId, TransactionStatus,
    VoidOrderRequest,
};
use reqwest::Client;
use serde::de::DeserializeOwned;

/// Header the server uses to bucket rate limits per caller.
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Checkout API client.
pub struct CheckoutClient {
    base_url: String,
    client_id: Option<String>,
    http: Client,
}

impl CheckoutClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client_id: None,
            http: Client::new(),
        }
    }

    /// Identifies this caller for rate limiting.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    /// Adds a product to the catalog.
    pub async fn create_product(
        &self,
        req: &CreateProductRequest,
    ) -> Result<ProductResponse, ClientError> {
        self.post("/api/products", req).await
    }

    /// Gets a product by ID.
    pub async fn get_product(&self, id: ProductId) -> Result<ProductResponse, ClientError> {
        self.get(&format!("/api/products/{}", id)).await
    }

    /// Places an order, reserving its stock.
    pub async fn create_order(
        &self,
        req: &CreateOrderRequest,
    ) -> Result<OrderResponse, ClientError> {
        self.post("/api/orders", req).await
    }

    /// Gets an order by ID.
    pub async fn get_order(&self, id: TransactionId) -> Result<OrderResponse, ClientError> {
        self.get(&format!("/api/orders/{}", id)).await
    }

    /// Lists orders in the given status, oldest first.
    pub async fn list_orders(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<OrderResponse>, ClientError> {
        self.get(&format!("/api/orders?status={}", status)).await
    }

    /// Pays an order with a tokenized payment method.
    pub async fn pay(
        &self,
        id: TransactionId,
        payment_method: PaymentMethod,
    ) -> Result<OrderResponse, ClientError> {
        let req = ProcessPaymentRequest { payment_method };
        self.post(&format!("/api/orders/{}/payment", id), &req)
            .await
    }

    /// Voids an unpaid order.
    pub async fn void_order(
        &self,
        id: TransactionId,
        reason: Option<String>,
    ) -> Result<OrderResponse, ClientError> {
        let req = VoidOrderRequest { reason };
        self.post(&format!("/api/orders/{}/void", id), &req).await
    }

    /// Asks the server to refresh an order's status from the gateway.
    pub async fn sync_order(&self, id: TransactionId) -> Result<OrderResponse, ClientError> {
        self.post(&format!("/api/orders/{}/sync", id), &serde_json::json!({}))
            .await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let mut req = self.http.get(format!("{}{}", self.base_url, path));
        if let Some(id) = &self.client_id {
            req = req.header(CLIENT_ID_HEADER, id);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let mut req = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body);
        if let Some(id) = &self.client_id {
            req = req.header(CLIENT_ID_HEADER, id);
        }
        let resp = req.send().await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ClientError::Api {
                status: status.as_u16(),
                message: error_message(body),
            })
        }
    }
}

/// Pulls `error` out of an API error body, falling back to the raw text.
fn error_message(body: String) -> String {
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
        .unwrap_or(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = CheckoutClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = CheckoutClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_client_id() {
        let client = CheckoutClient::new("http://localhost:3000").with_client_id("storefront");
        assert_eq!(client.client_id, Some("storefront".to_string()));
    }

    #[test]
    fn test_error_message_extraction() {
        let json = r#"{"error":"Product not found: 1","code":404}"#.to_string();
        assert_eq!(error_message(json), "Product not found: 1");
        assert_eq!(error_message("Bad Gateway".to_string()), "Bad Gateway");
    }
}
