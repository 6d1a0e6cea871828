//! Outbound adapters: clients for the systems the service calls.

mod gateway;

pub use gateway::{GatewayConfig, HttpPaymentGateway};
