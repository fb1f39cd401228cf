use crate::framework::DatabaseProcessor;
use kanau::processor::Processor;

/// A logged webhook delivery. Never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct WebhookEventRecord {
    pub id: i64,
    pub event_type: String,
    pub event_id: Option<String>,
    /// The request body exactly as received.
    pub payload: String,
    pub created_at: time::OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Append a delivery to the webhook log. Returns the new row id.
pub struct InsertWebhookEvent {
    pub event_type: String,
    pub event_id: Option<String>,
    pub payload: String,
}

impl Processor<InsertWebhookEvent> for DatabaseProcessor {
    type Output = i64;
    type Error = sqlx::Error;
    #[tracing::instrument(skip_all, err, name = "SQL:InsertWebhookEvent")]
    async fn process(&self, insert: InsertWebhookEvent) -> Result<i64, sqlx::Error> {
        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO webhooks (event_type, event_id, payload)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(insert.event_type)
        .bind(insert.event_id)
        .bind(insert.payload)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }
}
