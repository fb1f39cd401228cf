use crate::framework::DatabaseProcessor;
use crate::gateway::VerifiedPayment;
use kanau::processor::Processor;
use photomart_sdk::objects::PhotoRef;
use sqlx::types::Json;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct OrderRecord {
    pub order_id: String,
    pub status: OrderStatus,
    pub buyer_uid: Option<String>,
    pub buyer_email: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub payment: Option<Json<VerifiedPayment>>,
    pub photo: Option<Json<PhotoRef>>,
    pub paid_at: Option<time::OffsetDateTime>,
    pub created_at: time::OffsetDateTime,
    pub updated_at: time::OffsetDateTime,
}

/// Order status. Only moves forward: a paid order never returns to created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(rename_all = "lowercase", type_name = "order_status")]
pub enum OrderStatus {
    Created,
    Paid,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Created => write!(f, "created"),
            OrderStatus::Paid => write!(f, "paid"),
        }
    }
}

#[derive(Debug, Clone)]
/// Fetch an order by its gateway id.
pub struct GetOrderById {
    pub order_id: String,
}

impl Processor<GetOrderById> for DatabaseProcessor {
    type Output = Option<OrderRecord>;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:GetOrderById")]
    async fn process(&self, query: GetOrderById) -> Result<Option<OrderRecord>, sqlx::Error> {
        let record = sqlx::query_as::<_, OrderRecord>(
            r#"
            SELECT
                order_id, status, buyer_uid, buyer_email, payment_id, signature,
                amount, currency, payment, photo, paid_at, created_at, updated_at
            FROM orders
            WHERE order_id = $1
            "#,
        )
        .bind(query.order_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
/// Insert an order or merge fields into an existing one.
///
/// `None` fields keep the stored value. `paid_at` is only ever set once, and
/// a paid order keeps its status.
pub struct UpsertOrder {
    pub order_id: String,
    pub status: Option<OrderStatus>,
    pub buyer_uid: Option<String>,
    pub buyer_email: Option<String>,
    pub payment_id: Option<String>,
    pub signature: Option<String>,
    pub amount: Option<i64>,
    pub currency: Option<String>,
    pub payment: Option<VerifiedPayment>,
    pub photo: Option<PhotoRef>,
    pub paid_at: Option<time::OffsetDateTime>,
}

impl Processor<UpsertOrder> for DatabaseProcessor {
    type Output = ();
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:UpsertOrder")]
    async fn process(&self, upsert: UpsertOrder) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                order_id, status, buyer_uid, buyer_email, payment_id, signature,
                amount, currency, payment, photo, paid_at
            )
            VALUES ($1, COALESCE($2, 'created'::order_status), $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (order_id) DO UPDATE SET
                status = CASE
                    WHEN orders.status = 'paid' THEN orders.status
                    ELSE COALESCE($2, orders.status)
                END,
                buyer_uid = COALESCE($3, orders.buyer_uid),
                buyer_email = COALESCE($4, orders.buyer_email),
                payment_id = COALESCE($5, orders.payment_id),
                signature = COALESCE($6, orders.signature),
                amount = COALESCE($7, orders.amount),
                currency = COALESCE($8, orders.currency),
                payment = COALESCE($9, orders.payment),
                photo = COALESCE($10, orders.photo),
                paid_at = COALESCE(orders.paid_at, $11),
                updated_at = now()
            "#,
        )
        .bind(upsert.order_id)
        .bind(upsert.status)
        .bind(upsert.buyer_uid)
        .bind(upsert.buyer_email)
        .bind(upsert.payment_id)
        .bind(upsert.signature)
        .bind(upsert.amount)
        .bind(upsert.currency)
        .bind(upsert.payment.map(Json))
        .bind(upsert.photo.map(Json))
        .bind(upsert.paid_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
