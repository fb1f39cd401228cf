use super::{Ledger, LedgerError};
use crate::entities::{
    InsertWebhookEvent, OrderRecord, OrderStatus, PurchaseRecord, UpsertOrder, UpsertPurchase,
    WebhookEventRecord,
};
use async_trait::async_trait;
use sqlx::types::Json;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use time::OffsetDateTime;

#[derive(Default)]
struct Tables {
    orders: HashMap<String, OrderRecord>,
    purchases: HashMap<String, PurchaseRecord>,
    webhooks: Vec<WebhookEventRecord>,
}

/// Ledger kept in process memory, with the same merge rules as the
/// Postgres queries.
#[derive(Default)]
pub struct MemoryLedger {
    tables: Mutex<Tables>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn order(&self, order_id: &str) -> Option<OrderRecord> {
        self.tables().orders.get(order_id).cloned()
    }

    pub fn purchases(&self) -> Vec<PurchaseRecord> {
        self.tables().purchases.values().cloned().collect()
    }

    pub fn webhooks(&self) -> Vec<WebhookEventRecord> {
        self.tables().webhooks.clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn find_order(&self, order_id: &str) -> Result<Option<OrderRecord>, LedgerError> {
        Ok(self.order(order_id))
    }

    async fn find_purchase(
        &self,
        purchase_id: &str,
    ) -> Result<Option<PurchaseRecord>, LedgerError> {
        Ok(self.tables().purchases.get(purchase_id).cloned())
    }

    async fn upsert_order(&self, order: UpsertOrder) -> Result<(), LedgerError> {
        let now = OffsetDateTime::now_utc();
        let mut guard = self.tables();
        let tables = &mut *guard;
        match tables.orders.get_mut(&order.order_id) {
            Some(existing) => {
                if existing.status != OrderStatus::Paid {
                    if let Some(status) = order.status {
                        existing.status = status;
                    }
                }
                merge(&mut existing.buyer_uid, order.buyer_uid);
                merge(&mut existing.buyer_email, order.buyer_email);
                merge(&mut existing.payment_id, order.payment_id);
                merge(&mut existing.signature, order.signature);
                merge(&mut existing.amount, order.amount);
                merge(&mut existing.currency, order.currency);
                merge(&mut existing.payment, order.payment.map(Json));
                merge(&mut existing.photo, order.photo.map(Json));
                if existing.paid_at.is_none() {
                    existing.paid_at = order.paid_at;
                }
                existing.updated_at = now;
            }
            None => {
                let record = OrderRecord {
                    order_id: order.order_id.clone(),
                    status: order.status.unwrap_or(OrderStatus::Created),
                    buyer_uid: order.buyer_uid,
                    buyer_email: order.buyer_email,
                    payment_id: order.payment_id,
                    signature: order.signature,
                    amount: order.amount,
                    currency: order.currency,
                    payment: order.payment.map(Json),
                    photo: order.photo.map(Json),
                    paid_at: order.paid_at,
                    created_at: now,
                    updated_at: now,
                };
                tables.orders.insert(order.order_id, record);
            }
        }
        Ok(())
    }

    async fn upsert_purchase(&self, purchase: UpsertPurchase) -> Result<(), LedgerError> {
        let now = OffsetDateTime::now_utc();
        let mut tables = self.tables();
        let previous = tables.purchases.get(&purchase.purchase_id).cloned();
        let record = PurchaseRecord {
            purchase_id: purchase.purchase_id.clone(),
            order_id: purchase.order_id,
            payment_id: purchase.payment_id,
            buyer_uid: previous
                .as_ref()
                .map_or(purchase.buyer_uid, |p| p.buyer_uid.clone()),
            buyer_email: purchase
                .buyer_email
                .or_else(|| previous.as_ref().and_then(|p| p.buyer_email.clone())),
            photo_id: previous
                .as_ref()
                .map_or(purchase.photo_id, |p| p.photo_id.clone()),
            price: purchase.price.or(previous.as_ref().and_then(|p| p.price)),
            amount: purchase.amount,
            currency: purchase.currency,
            file_name: purchase
                .file_name
                .or_else(|| previous.as_ref().and_then(|p| p.file_name.clone())),
            display_name: purchase
                .display_name
                .or_else(|| previous.as_ref().and_then(|p| p.display_name.clone())),
            storage_path: previous
                .as_ref()
                .map_or(purchase.storage_path, |p| p.storage_path.clone()),
            download_url: purchase.download_url,
            gateway: purchase.gateway,
            created_at: previous.as_ref().map_or(now, |p| p.created_at),
            updated_at: now,
        };
        tables.purchases.insert(purchase.purchase_id, record);
        Ok(())
    }

    async fn append_webhook(&self, event: InsertWebhookEvent) -> Result<i64, LedgerError> {
        let mut tables = self.tables();
        let id = tables.webhooks.len() as i64 + 1;
        tables.webhooks.push(WebhookEventRecord {
            id,
            event_type: event.event_type,
            event_id: event.event_id,
            payload: event.payload,
            created_at: OffsetDateTime::now_utc(),
        });
        Ok(id)
    }
}

fn merge<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}
