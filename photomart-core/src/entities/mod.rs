//! Persisted records and the queries that read and write them.
//!
//! Writes are merge-upserts: a `None` field in a write model leaves the
//! stored column untouched, a `Some` overwrites it.

pub mod orders;
pub mod purchases;
pub mod webhook_events;

pub use orders::{GetOrderById, OrderRecord, OrderStatus, UpsertOrder};
pub use purchases::{GetPurchaseById, PurchaseRecord, UpsertPurchase, purchase_id};
pub use webhook_events::{InsertWebhookEvent, WebhookEventRecord};
