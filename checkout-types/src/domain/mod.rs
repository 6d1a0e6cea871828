//! Domain models for the checkout service.

pub mod money;
pub mod product;
pub mod status;
pub mod transaction;
pub mod webhook;

pub use money::{Currency, Money};
pub use product::{Product, ProductId};
pub use status::TransactionStatus;
pub use transaction::{
    GatewayData, Order, ShippingAddress, Transaction, TransactionId, TransactionParts,
};
pub use webhook::GatewayEvent;
