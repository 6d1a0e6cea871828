//! # Checkout Hex
//!
//! Application service layer plus the adapters around it.
//!
//! ## Architecture
//!
//! - `service/` - Application service (order lifecycle and payment reconciliation)
//! - `inbound/` - HTTP adapter (Axum server)
//! - `outbound/` - Payment gateway HTTP client
//! - `security/` - Gateway signatures
//!
//! The service is generic over `R: CheckoutRepository` and `G: PaymentGateway`,
//! allowing different adapters to be injected.

pub mod inbound;
pub mod openapi;
pub mod outbound;
pub mod security;
pub mod service;

#[cfg(test)]
mod service_tests;

pub use service::{CheckoutService, WebhookOutcome};
