//! In-memory repository adapter.
//!
//! Backed by `DashMap`. Every mutation happens while holding the entry's
//! shard lock, which gives the same atomicity the SQL adapter gets from
//! conditional updates.

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use checkout_types::{
    Product, ProductId, ProductRepository, RepoError, Transaction, TransactionId,
    TransactionRepository, TransactionStatus,
};

/// Repository that keeps everything in process memory.
#[derive(Default)]
pub struct InMemoryRepo {
    products: DashMap<ProductId, Product>,
    transactions: DashMap<TransactionId, Transaction>,
}

impl InMemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductRepository for InMemoryRepo {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepoError> {
        Ok(self.products.get(&id).map(|p| p.clone()))
    }

    async fn save_product(&self, product: &Product) -> Result<Product, RepoError> {
        match self.products.entry(product.id()) {
            Entry::Occupied(_) => Err(RepoError::Conflict(format!(
                "Product {} already exists",
                product.id()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(product.clone());
                Ok(product.clone())
            }
        }
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError> {
        let mut product = self.products.get_mut(&id).ok_or(RepoError::NotFound)?;
        product.decrease_stock(quantity)?;
        Ok(product.clone())
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError> {
        let mut product = self.products.get_mut(&id).ok_or(RepoError::NotFound)?;
        product.increase_stock(quantity)?;
        Ok(product.clone())
    }
}

#[async_trait]
impl TransactionRepository for InMemoryRepo {
    async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        Ok(self.transactions.get(&id).map(|t| t.clone()))
    }

    async fn find_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, RepoError> {
        let mut found: Vec<Transaction> = self
            .transactions
            .iter()
            .filter(|t| t.status() == status)
            .map(|t| t.clone())
            .collect();
        found.sort_by_key(|t| t.created_at());
        Ok(found)
    }

    async fn save(&self, transaction: &Transaction) -> Result<Transaction, RepoError> {
        match self.transactions.entry(transaction.id()) {
            Entry::Occupied(_) => Err(RepoError::Conflict(format!(
                "Transaction {} already exists",
                transaction.id()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(transaction.clone());
                Ok(transaction.clone())
            }
        }
    }

    async fn update(&self, transaction: &Transaction) -> Result<Transaction, RepoError> {
        let mut stored = self
            .transactions
            .get_mut(&transaction.id())
            .ok_or(RepoError::NotFound)?;

        if stored.version() != transaction.version() {
            return Err(RepoError::Conflict(format!(
                "Transaction {} was modified concurrently (expected version {}, found {})",
                transaction.id(),
                transaction.version(),
                stored.version()
            )));
        }

        let mut next = transaction.clone();
        next.bump_version();
        *stored = next.clone();
        Ok(next)
    }
}
