//! # Checkout Repository
//!
//! Concrete repository implementations (adapters) for the checkout service.
//! This crate provides storage adapters that implement the `ProductRepository`
//! and `TransactionRepository` ports.

use async_trait::async_trait;
use checkout_types::{
    Product, ProductId, ProductRepository, RepoError, Transaction, TransactionId,
    TransactionRepository, TransactionStatus,
};

pub mod memory;
#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "sqlite")]
mod types;


pub use memory::InMemoryRepo;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteRepo;

/// URL that selects the in-memory adapter.
pub const MEMORY_URL: &str = "memory";

/// Unified repository wrapper over the available storage adapters.
pub enum Repo {
    #[cfg(feature = "sqlite")]
    Sqlite(SqliteRepo),
    Memory(InMemoryRepo),
}

/// Build and initialize a repository from a database URL.
///
/// `memory` selects the in-memory adapter. Anything starting with `sqlite:`
/// connects to SQLite and creates the schema.
///
/// # Examples
///
/// ```ignore
/// let repo = build_repo("sqlite://checkout.db?mode=rwc").await?;
/// let repo = build_repo("memory").await?;
/// ```
pub async fn build_repo(database_url: &str) -> anyhow::Result<Repo> {
    Repo::new(database_url).await
}

impl Repo {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        if database_url == MEMORY_URL {
            tracing::info!("using in-memory repository");
            return Ok(Repo::Memory(InMemoryRepo::new()));
        }

        #[cfg(feature = "sqlite")]
        if database_url.starts_with("sqlite:") {
            tracing::info!("using sqlite repository");
            return Ok(Repo::Sqlite(SqliteRepo::new(database_url).await?));
        }

        anyhow::bail!("Unsupported DATABASE_URL: {database_url}")
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Implement the repository ports for Repo (delegation)
// ─────────────────────────────────────────────────────────────────────────────

macro_rules! delegate {
    ($self:ident, $repo:ident => $call:expr) => {
        match $self {
            #[cfg(feature = "sqlite")]
            Repo::Sqlite($repo) => $call,
            Repo::Memory($repo) => $call,
        }
    };
}

#[async_trait]
impl ProductRepository for Repo {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepoError> {
        delegate!(self, repo => repo.find_product(id).await)
    }

    async fn save_product(&self, product: &Product) -> Result<Product, RepoError> {
        delegate!(self, repo => repo.save_product(product).await)
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError> {
        delegate!(self, repo => repo.reserve_stock(id, quantity).await)
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError> {
        delegate!(self, repo => repo.release_stock(id, quantity).await)
    }
}

#[async_trait]
impl TransactionRepository for Repo {
    async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        delegate!(self, repo => repo.find_by_id(id).await)
    }

    async fn find_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, RepoError> {
        delegate!(self, repo => repo.find_by_status(status).await)
    }

    async fn save(&self, transaction: &Transaction) -> Result<Transaction, RepoError> {
        delegate!(self, repo => repo.save(transaction).await)
    }

    async fn update(&self, transaction: &Transaction) -> Result<Transaction, RepoError> {
        delegate!(self, repo => repo.update(transaction).await)
    }
}
