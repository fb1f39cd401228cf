use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// The idempotency key of a purchase: `"{order_id}_{payment_id}"`.
///
/// Every fulfillment attempt for the same pair writes to this id, so client
/// retries and webhook replays converge on one record.
pub fn purchase_id(order_id: &str, payment_id: &str) -> String {
    format!("{order_id}_{payment_id}")
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PurchaseRecord {
    pub purchase_id: String,
    pub order_id: String,
    pub payment_id: String,
    pub buyer_uid: String,
    pub buyer_email: Option<String>,
    pub photo_id: String,
    /// Price declared by the storefront, major units.
    pub price: Option<f64>,
    /// Amount the gateway charged, minor units.
    pub amount: i64,
    pub currency: String,
    pub file_name: Option<String>,
    pub display_name: Option<String>,
    pub storage_path: String,
    pub download_url: String,
    pub gateway: String,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

#[derive(Debug, Clone)]
/// Fetch a purchase by its composite id.
pub struct GetPurchaseById {
    pub purchase_id: String,
}

impl Processor<GetPurchaseById> for DatabaseProcessor {
    type Output = Option<PurchaseRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetPurchaseById")]
    async fn process(&self, query: GetPurchaseById) -> Result<Option<PurchaseRecord>, sqlx::Error> {
        let record = sqlx::query_as::<_, PurchaseRecord>(
            r#"
            SELECT
                purchase_id, order_id, payment_id, buyer_uid, buyer_email, photo_id,
                price, amount, currency, file_name, display_name, storage_path,
                download_url, gateway, created_at, updated_at
            FROM purchases
            WHERE purchase_id = $1
            "#,
        )
        .bind(query.purchase_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

#[derive(Debug, Clone, PartialEq)]
/// Insert a purchase or overwrite the existing one in place.
///
/// Optional fields that are `None` keep their stored value. The buyer, the
/// photo id, the storage path and `created_at` are fixed by the first write.
pub struct UpsertPurchase {
    pub purchase_id: String,
    pub order_id: String,
    pub payment_id: String,
    pub buyer_uid: String,
    pub buyer_email: Option<String>,
    pub photo_id: String,
    pub price: Option<f64>,
    pub amount: i64,
    pub currency: String,
    pub file_name: Option<String>,
    pub display_name: Option<String>,
    pub storage_path: String,
    pub download_url: String,
    pub gateway: String,
}

impl Processor<UpsertPurchase> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertPurchase")]
    async fn process(&self, upsert: UpsertPurchase) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO purchases (
                purchase_id, order_id, payment_id, buyer_uid, buyer_email, photo_id,
                price, amount, currency, file_name, display_name, storage_path,
                download_url, gateway
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            ON CONFLICT (purchase_id) DO UPDATE SET
                buyer_email = COALESCE(EXCLUDED.buyer_email, purchases.buyer_email),
                price = COALESCE(EXCLUDED.price, purchases.price),
                amount = EXCLUDED.amount,
                currency = EXCLUDED.currency,
                file_name = COALESCE(EXCLUDED.file_name, purchases.file_name),
                display_name = COALESCE(EXCLUDED.display_name, purchases.display_name),
                download_url = EXCLUDED.download_url,
                gateway = EXCLUDED.gateway,
                updated_at = now()
            "#,
        )
        .bind(upsert.purchase_id)
        .bind(upsert.order_id)
        .bind(upsert.payment_id)
        .bind(upsert.buyer_uid)
        .bind(upsert.buyer_email)
        .bind(upsert.photo_id)
        .bind(upsert.price)
        .bind(upsert.amount)
        .bind(upsert.currency)
        .bind(upsert.file_name)
        .bind(upsert.display_name)
        .bind(upsert.storage_path)
        .bind(upsert.download_url)
        .bind(upsert.gateway)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
