use sqlx::postgres::{PgPool, PgRow};
use sqlx::FromRow;

use crate::models::*;

/// A source table that can be snapshotted in full.
pub trait SourceTable: for<'r> FromRow<'r, PgRow> + Send + Unpin + Sized {
    const TABLE: &'static str;
}

impl SourceTable for User {
    const TABLE: &'static str = "user";
}

impl SourceTable for Artist {
    const TABLE: &'static str = "artist";
}

impl SourceTable for Album {
    const TABLE: &'static str = "album";
}

impl SourceTable for Track {
    const TABLE: &'static str = "track";
}

impl SourceTable for SubscriptionPlan {
    const TABLE: &'static str = "subscriptionplan";
}

impl SourceTable for Payment {
    const TABLE: &'static str = "payment";
}

/// Reads every row of the named source table. Extraction is always a full
/// snapshot; there is no incremental path.
pub async fn extract<T: SourceTable>(pool: &PgPool) -> sqlx::Result<Vec<T>> {
    let query = format!("SELECT * FROM \"{}\"", T::TABLE);
    let rows = sqlx::query_as::<_, T>(&query).fetch_all(pool).await?;
    tracing::info!("extracted {} records from {}", rows.len(), T::TABLE);
    Ok(rows)
}
