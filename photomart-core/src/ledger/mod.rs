//! Durable record of orders, purchases and webhook deliveries.
//!
//! Both write paths (client verification and gateway webhooks) go through
//! [`Ledger::record`], so a payment fulfilled twice lands on the same
//! purchase id and converges to the same content.

#[cfg(any(test, feature = "testing"))]
mod memory;

#[cfg(any(test, feature = "testing"))]
pub use memory::MemoryLedger;

use crate::entities::{
    GetOrderById, GetPurchaseById, InsertWebhookEvent, OrderRecord, PurchaseRecord, UpsertOrder,
    UpsertPurchase,
};
use crate::framework::DatabaseProcessor;
use async_trait::async_trait;
use kanau::processor::Processor;
use sqlx::PgPool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn find_order(&self, order_id: &str) -> Result<Option<OrderRecord>, LedgerError>;

    async fn find_purchase(&self, purchase_id: &str)
    -> Result<Option<PurchaseRecord>, LedgerError>;

    async fn upsert_order(&self, order: UpsertOrder) -> Result<(), LedgerError>;

    async fn upsert_purchase(&self, purchase: UpsertPurchase) -> Result<(), LedgerError>;

    /// Append a delivery to the webhook log and return its row id.
    async fn append_webhook(&self, event: InsertWebhookEvent) -> Result<i64, LedgerError>;

    /// Write the order, then the purchase.
    ///
    /// The two writes are not atomic. A failure after the order write leaves
    /// a paid order without a purchase; a retry fills it in.
    async fn record(&self, order: UpsertOrder, purchase: UpsertPurchase) -> Result<(), LedgerError> {
        self.upsert_order(order).await?;
        self.upsert_purchase(purchase).await
    }
}

/// Postgres-backed ledger.
#[derive(Clone)]
pub struct PgLedger {
    processor: DatabaseProcessor,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            processor: DatabaseProcessor { pool },
        }
    }
}

#[async_trait]
impl Ledger for PgLedger {
    async fn find_order(&self, order_id: &str) -> Result<Option<OrderRecord>, LedgerError> {
        Ok(self
            .processor
            .process(GetOrderById {
                order_id: order_id.to_owned(),
            })
            .await?)
    }

    async fn find_purchase(
        &self,
        purchase_id: &str,
    ) -> Result<Option<PurchaseRecord>, LedgerError> {
        Ok(self
            .processor
            .process(GetPurchaseById {
                purchase_id: purchase_id.to_owned(),
            })
            .await?)
    }

    async fn upsert_order(&self, order: UpsertOrder) -> Result<(), LedgerError> {
        Ok(self.processor.process(order).await?)
    }

    async fn upsert_purchase(&self, purchase: UpsertPurchase) -> Result<(), LedgerError> {
        Ok(self.processor.process(purchase).await?)
    }

    async fn append_webhook(&self, event: InsertWebhookEvent) -> Result<i64, LedgerError> {
        Ok(self.processor.process(event).await?)
    }
}
