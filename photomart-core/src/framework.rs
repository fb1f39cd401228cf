use sqlx::PgPool;

/// Executes the database queries of [`crate::entities`].
///
/// Each query is a plain struct; running it is a
/// `kanau::processor::Processor` implementation on this type.
#[derive(Clone)]
pub struct DatabaseProcessor {
    pub pool: PgPool,
}
