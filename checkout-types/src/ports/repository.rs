//! Repository port traits.
//!
//! Adapters (SQLite, in-memory) implement these traits. Every operation is
//! fallible and returns a `Result`; nothing panics across the port.

use crate::domain::{Product, ProductId, Transaction, TransactionId, TransactionStatus};
use crate::error::RepoError;

/// Storage for catalog products and their stock.
#[async_trait::async_trait]
pub trait ProductRepository: Send + Sync + 'static {
    /// Gets a product by ID.
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepoError>;

    /// Inserts a new product.
    async fn save_product(&self, product: &Product) -> Result<Product, RepoError>;

    /// Atomically takes `quantity` units out of stock.
    ///
    /// Equivalent to `UPDATE .. SET stock = stock - qty WHERE stock >= qty`:
    /// two checkouts racing for the last units cannot both succeed. Fails
    /// with `DomainError::InsufficientStock` (wrapped) when the stock is too
    /// low and with `RepoError::NotFound` when the product does not exist.
    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError>;

    /// Atomically puts `quantity` units back into stock.
    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError>;
}

/// Storage for transactions/orders.
#[async_trait::async_trait]
pub trait TransactionRepository: Send + Sync + 'static {
    /// Gets a transaction by ID.
    async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError>;

    /// Lists transactions in a given status, oldest first.
    async fn find_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, RepoError>;

    /// Inserts a new transaction.
    async fn save(&self, transaction: &Transaction) -> Result<Transaction, RepoError>;

    /// Writes a modified transaction back (compare-and-swap).
    ///
    /// The write only happens if the stored version still equals
    /// `transaction.version()`; the returned entity carries the next version.
    /// A stale copy fails with `RepoError::Conflict` and leaves the stored
    /// record untouched, so two racing deliveries cannot both win.
    async fn update(&self, transaction: &Transaction) -> Result<Transaction, RepoError>;
}

/// Everything the checkout service needs from storage.
pub trait CheckoutRepository: ProductRepository + TransactionRepository {}

impl<T: ProductRepository + TransactionRepository> CheckoutRepository for T {}
