//! SQLite repository adapter.
#![allow(clippy::collapsible_if)]

use async_trait::async_trait;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;

use checkout_types::{
    DomainError, Product, ProductId, ProductRepository, RepoError, Transaction, TransactionId,
    TransactionRepository, TransactionStatus,
};

use crate::types::{DbProduct, DbTransaction};

const PRODUCT_COLUMNS: &str =
    "id, name, price, currency, stock, category, description, image_url, created_at";

const TRANSACTION_COLUMNS: &str = "id, product_id, quantity, amount, currency, status, \
     customer_email, shipping_address, gateway_transaction_id, gateway_reference, \
     payment_method, error_message, created_at, updated_at, version";

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                let p = std::path::Path::new(path);
                if let Some(parent) = p.parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);

        // Every connection to `:memory:` opens its own database, so keep one
        // connection alive for the lifetime of the pool.
        let pool = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new().connect_with(options).await?
        };

        let repo = Self { pool };
        repo.create_schema().await?;
        tracing::debug!(database_url, "sqlite repository ready");
        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema.
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        let ddl = include_str!("../migrations/0001_create_tables.sql");
        sqlx::raw_sql(ddl)
            .execute(&self.pool)
            .await
            .map_err(|e| RepoError::Database(e.to_string()))?;
        Ok(())
    }

    /// Distinguishes a missing product from insufficient stock after a
    /// conditional update matched no row.
    async fn stock_failure(&self, id: ProductId, requested: u32) -> RepoError {
        match self.find_product(id).await {
            Ok(Some(product)) => RepoError::Domain(DomainError::InsufficientStock {
                product_id: id,
                requested,
                available: product.stock(),
            }),
            Ok(None) => RepoError::NotFound,
            Err(e) => e,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Product repository
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl ProductRepository for SqliteRepo {
    async fn find_product(&self, id: ProductId) -> Result<Option<Product>, RepoError> {
        let row: Option<DbProduct> = sqlx::query_as(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbProduct::into_domain).transpose()
    }

    async fn save_product(&self, product: &Product) -> Result<Product, RepoError> {
        sqlx::query(
            r#"INSERT INTO products (id, name, price, currency, stock, category, description, image_url, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(product.id().to_string())
        .bind(product.name())
        .bind(product.price().amount().to_string())
        .bind(product.price().currency().code())
        .bind(i64::from(product.stock()))
        .bind(product.category())
        .bind(product.description())
        .bind(product.image_url())
        .bind(product.created_at().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Conflict(format!("Product {} already exists", product.id()))
            }
            other => RepoError::Database(other.to_string()),
        })?;

        Ok(product.clone())
    }

    async fn reserve_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError> {
        let row: Option<DbProduct> = sqlx::query_as(&format!(
            "UPDATE products SET stock = stock - ? WHERE id = ? AND stock >= ? RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(i64::from(quantity))
        .bind(id.to_string())
        .bind(i64::from(quantity))
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        match row {
            Some(row) => row.into_domain(),
            None => Err(self.stock_failure(id, quantity).await),
        }
    }

    async fn release_stock(&self, id: ProductId, quantity: u32) -> Result<Product, RepoError> {
        if quantity == 0 {
            return Err(RepoError::Domain(DomainError::InvalidArgument(
                "Quantity to restock must be positive".into(),
            )));
        }

        let row: Option<DbProduct> = sqlx::query_as(&format!(
            "UPDATE products SET stock = stock + ? WHERE id = ? RETURNING {PRODUCT_COLUMNS}"
        ))
        .bind(i64::from(quantity))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.ok_or(RepoError::NotFound)?.into_domain()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transaction repository
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl TransactionRepository for SqliteRepo {
    async fn find_by_id(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        let row: Option<DbTransaction> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE id = ?"
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        row.map(DbTransaction::into_domain).transpose()
    }

    async fn find_by_status(
        &self,
        status: TransactionStatus,
    ) -> Result<Vec<Transaction>, RepoError> {
        let rows: Vec<DbTransaction> = sqlx::query_as(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE status = ? ORDER BY created_at ASC"
        ))
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        rows.into_iter().map(DbTransaction::into_domain).collect()
    }

    async fn save(&self, transaction: &Transaction) -> Result<Transaction, RepoError> {
        let shipping = transaction
            .shipping()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| RepoError::Database(e.to_string()))?;

        sqlx::query(
            r#"INSERT INTO transactions (id, product_id, quantity, amount, currency, status, customer_email,
                   shipping_address, gateway_transaction_id, gateway_reference, payment_method, error_message,
                   created_at, updated_at, version)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(transaction.id().to_string())
        .bind(transaction.product_id().to_string())
        .bind(i64::from(transaction.quantity()))
        .bind(transaction.amount().amount().to_string())
        .bind(transaction.amount().currency().code())
        .bind(transaction.status().as_str())
        .bind(transaction.customer_email())
        .bind(shipping)
        .bind(transaction.gateway_transaction_id())
        .bind(transaction.gateway_reference())
        .bind(transaction.payment_method())
        .bind(transaction.error_message())
        .bind(transaction.created_at().to_rfc3339())
        .bind(transaction.updated_at().to_rfc3339())
        .bind(transaction.version())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                RepoError::Conflict(format!("Transaction {} already exists", transaction.id()))
            }
            other => RepoError::Database(other.to_string()),
        })?;

        Ok(transaction.clone())
    }

    async fn update(&self, transaction: &Transaction) -> Result<Transaction, RepoError> {
        let result = sqlx::query(
            r#"UPDATE transactions
               SET status = ?, gateway_transaction_id = ?, gateway_reference = ?, payment_method = ?,
                   error_message = ?, updated_at = ?, version = version + 1
               WHERE id = ? AND version = ?"#,
        )
        .bind(transaction.status().as_str())
        .bind(transaction.gateway_transaction_id())
        .bind(transaction.gateway_reference())
        .bind(transaction.payment_method())
        .bind(transaction.error_message())
        .bind(transaction.updated_at().to_rfc3339())
        .bind(transaction.id().to_string())
        .bind(transaction.version())
        .execute(&self.pool)
        .await
        .map_err(|e| RepoError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            return match self.find_by_id(transaction.id()).await? {
                None => Err(RepoError::NotFound),
                Some(current) => Err(RepoError::Conflict(format!(
                    "Transaction {} was modified concurrently (expected version {}, found {})",
                    transaction.id(),
                    transaction.version(),
                    current.version()
                ))),
            };
        }

        let mut stored = transaction.clone();
        stored.bump_version();
        Ok(stored)
    }
}
