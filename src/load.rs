use sqlx::postgres::{PgPool, PgRow};
use sqlx::{FromRow, PgConnection};
use std::collections::HashSet;
use thiserror::Error;

use crate::models::*;

/// Loading never conflates "the destination read failed" with "the
/// destination is empty": a failed read aborts the table's load instead of
/// re-inserting everything.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read existing rows from {table}: {source}")]
    ReadExisting {
        table: &'static str,
        source: sqlx::Error,
    },
    #[error("failed to append rows to {table}: {source}")]
    Insert {
        table: &'static str,
        source: sqlx::Error,
    },
}

/// A warehouse row that can be diffed against the destination table on a
/// declared key-column tuple and appended when absent.
pub trait Loadable: for<'r> FromRow<'r, PgRow> + Send + Unpin + Sized {
    const TABLE: &'static str;
    const KEY_COLUMNS: &'static [&'static str];

    /// Canonical text encoding of this row's key tuple, in `KEY_COLUMNS`
    /// order. Two rows with equal encodings are the same destination row.
    fn key(&self) -> Vec<String>;

    fn insert(
        &self,
        conn: &mut PgConnection,
    ) -> impl std::future::Future<Output = sqlx::Result<()>> + Send;
}

fn opt_key<T: std::fmt::Display>(value: &Option<T>) -> String {
    match value {
        Some(v) => v.to_string(),
        None => "\\N".to_string(),
    }
}

/// Left-anti-join of `rows` against `existing` key tuples. Also drops
/// duplicate keys within the batch itself, keeping the first occurrence, so
/// key uniqueness holds in the destination after the append.
pub fn missing_rows<R: Loadable>(rows: Vec<R>, existing: &HashSet<Vec<String>>) -> Vec<R> {
    let mut seen = existing.clone();
    rows.into_iter().filter(|row| seen.insert(row.key())).collect()
}

#[derive(Debug, Clone, Copy)]
pub struct LoadOutcome {
    pub prepared: usize,
    pub inserted: usize,
    pub skipped: usize,
}

/// Appends the rows of `new_rows` whose key tuple is not already present in
/// the destination table. Rows already present are left untouched; non-key
/// columns are never reconciled.
pub async fn load<R: Loadable>(pool: &PgPool, new_rows: Vec<R>) -> Result<LoadOutcome, LoadError> {
    let prepared = new_rows.len();

    let existing = fetch_existing::<R>(pool)
        .await
        .map_err(|source| LoadError::ReadExisting {
            table: R::TABLE,
            source,
        })?;
    let existing_keys: HashSet<Vec<String>> = existing.iter().map(Loadable::key).collect();

    let fresh = missing_rows(new_rows, &existing_keys);
    let outcome = LoadOutcome {
        prepared,
        inserted: fresh.len(),
        skipped: prepared - fresh.len(),
    };

    if fresh.is_empty() {
        tracing::info!("no new rows for {}", R::TABLE);
        return Ok(outcome);
    }

    let mut tx = pool.begin().await.map_err(|source| LoadError::Insert {
        table: R::TABLE,
        source,
    })?;
    for row in &fresh {
        row.insert(&mut *tx)
            .await
            .map_err(|source| LoadError::Insert {
                table: R::TABLE,
                source,
            })?;
    }
    tx.commit().await.map_err(|source| LoadError::Insert {
        table: R::TABLE,
        source,
    })?;

    tracing::info!(
        "loaded {} new rows into {} ({} already present)",
        outcome.inserted,
        R::TABLE,
        outcome.skipped
    );
    Ok(outcome)
}

async fn fetch_existing<R: Loadable>(pool: &PgPool) -> sqlx::Result<Vec<R>> {
    let query = format!("SELECT * FROM {}", R::TABLE);
    sqlx::query_as::<_, R>(&query).fetch_all(pool).await
}

impl Loadable for DimUser {
    const TABLE: &'static str = "dim_user";
    const KEY_COLUMNS: &'static [&'static str] = &["user_id", "start_date"];

    fn key(&self) -> Vec<String> {
        vec![self.user_id.to_string(), opt_key(&self.start_date)]
    }

    async fn insert(&self, conn: &mut PgConnection) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dim_user (user_id, username, email, start_date, end_date, is_current)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(self.user_id)
        .bind(&self.username)
        .bind(&self.email)
        .bind(self.start_date)
        .bind(self.end_date)
        .bind(self.is_current)
        .execute(conn)
        .await?;
        Ok(())
    }
}

impl Loadable for DimArtist {
    const TABLE: &'static str = "dim_artist";
    const KEY_COLUMNS: &'static [&'static str] = &["artist_id"];

    fn key(&self) -> Vec<String> {
        vec![self.artist_id.to_string()]
    }

    async fn insert(&self, conn: &mut PgConnection) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO dim_artist (artist_id, name, genre) VALUES ($1, $2, $3)")
            .bind(self.artist_id)
            .bind(&self.name)
            .bind(&self.genre)
            .execute(conn)
            .await?;
        Ok(())
    }
}

impl Loadable for DimAlbum {
    const TABLE: &'static str = "dim_album";
    const KEY_COLUMNS: &'static [&'static str] = &["album_id"];

    fn key(&self) -> Vec<String> {
        vec![self.album_id.to_string()]
    }

    async fn insert(&self, conn: &mut PgConnection) -> sqlx::Result<()> {
        sqlx::query("INSERT INTO dim_album (album_id, title, release_date) VALUES ($1, $2, $3)")
            .bind(self.album_id)
            .bind(&self.title)
            .bind(self.release_date)
            .execute(conn)
            .await?;
        Ok(())
    }
}

impl Loadable for DimTrack {
    const TABLE: &'static str = "dim_track";
    const KEY_COLUMNS: &'static [&'static str] = &["track_id"];

    fn key(&self) -> Vec<String> {
        vec![self.track_id.to_string()]
    }

    async fn insert(&self, conn: &mut PgConnection) -> sqlx::Result<()> {
        sqlx::query(
            "INSERT INTO dim_track (track_id, title, play_count, duration) VALUES ($1, $2, $3, $4)",
        )
        .bind(self.track_id)
        .bind(&self.title)
        .bind(self.play_count)
        .bind(&self.duration)
        .execute(conn)
        .await?;
        Ok(())
    }
}

impl Loadable for DimTime {
    const TABLE: &'static str = "dim_time";
    const KEY_COLUMNS: &'static [&'static str] = &["date_id"];

    fn key(&self) -> Vec<String> {
        vec![self.date_id.to_string()]
    }

    async fn insert(&self, conn: &mut PgConnection) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO dim_time (date_id, date, month, quarter, year, day)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(self.date_id)
        .bind(self.date)
        .bind(self.month)
        .bind(self.quarter)
        .bind(self.year)
        .bind(self.day)
        .execute(conn)
        .await?;
        Ok(())
    }
}

impl Loadable for FactStreaming {
    const TABLE: &'static str = "fact_streaming";
    const KEY_COLUMNS: &'static [&'static str] = &["track_id", "date_id"];

    fn key(&self) -> Vec<String> {
        vec![self.track_id.to_string(), opt_key(&self.date_id)]
    }

    async fn insert(&self, conn: &mut PgConnection) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fact_streaming (snapshot_date, track_id, date_id, play_count, listening_time)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(self.snapshot_date)
        .bind(self.track_id)
        .bind(self.date_id)
        .bind(self.play_count)
        .bind(self.listening_time)
        .execute(conn)
        .await?;
        Ok(())
    }
}

impl Loadable for FactSubscription {
    const TABLE: &'static str = "fact_subscription";
    const KEY_COLUMNS: &'static [&'static str] = &["user_id", "date_id", "plan_id"];

    fn key(&self) -> Vec<String> {
        vec![
            self.user_id.to_string(),
            opt_key(&self.date_id),
            self.plan_id.to_string(),
        ]
    }

    async fn insert(&self, conn: &mut PgConnection) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fact_subscription (user_id, start_date, end_date, date_id, plan_id, monthly_fee)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(self.user_id)
        .bind(self.start_date)
        .bind(self.end_date)
        .bind(self.date_id)
        .bind(self.plan_id)
        .bind(self.monthly_fee)
        .execute(conn)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn streaming_fact(track_id: i32, date_id: Option<i32>) -> FactStreaming {
        FactStreaming {
            snapshot_date: date(2024, 6, 1),
            track_id,
            date_id,
            play_count: 10,
            listening_time: 1800.0,
        }
    }

    #[test]
    fn anti_join_excludes_rows_whose_key_already_exists() {
        // Destination already has track 7 for date 3.
        let existing: HashSet<Vec<String>> =
            [streaming_fact(7, Some(3)).key()].into_iter().collect();

        let new_rows = vec![streaming_fact(7, Some(3)), streaming_fact(8, Some(3))];
        let fresh = missing_rows(new_rows, &existing);

        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].track_id, 8);
    }

    #[test]
    fn second_identical_batch_inserts_nothing() {
        let batch = || vec![streaming_fact(1, Some(1)), streaming_fact(2, Some(2))];

        let first = missing_rows(batch(), &HashSet::new());
        assert_eq!(first.len(), 2);

        let after_first: HashSet<Vec<String>> = first.iter().map(Loadable::key).collect();
        let second = missing_rows(batch(), &after_first);
        assert!(second.is_empty());
    }

    #[test]
    fn matching_key_with_different_measures_is_still_skipped() {
        // Non-key columns are never reconciled.
        let mut stale = streaming_fact(5, Some(9));
        stale.listening_time = 1.0;
        let existing: HashSet<Vec<String>> = [stale.key()].into_iter().collect();

        let fresh = missing_rows(vec![streaming_fact(5, Some(9))], &existing);
        assert!(fresh.is_empty());
    }

    #[test]
    fn duplicate_keys_within_a_batch_keep_first_occurrence() {
        let mut second = streaming_fact(4, None);
        second.play_count = 99;
        let fresh = missing_rows(vec![streaming_fact(4, None), second], &HashSet::new());

        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].play_count, 10);
    }

    #[test]
    fn absent_date_id_and_real_date_id_are_distinct_keys() {
        let existing: HashSet<Vec<String>> = [streaming_fact(4, None).key()].into_iter().collect();
        let fresh = missing_rows(vec![streaming_fact(4, Some(1))], &existing);
        assert_eq!(fresh.len(), 1);
    }

    #[test]
    fn dim_user_key_includes_start_date() {
        let row = DimUser {
            user_id: 1,
            username: "a".into(),
            email: "a@example.com".into(),
            start_date: Some(date(2024, 1, 1)),
            end_date: None,
            is_current: false,
        };
        assert_eq!(row.key(), vec!["1".to_string(), "2024-01-01".to_string()]);

        let mut no_payments = row.clone();
        no_payments.start_date = None;
        assert_ne!(row.key(), no_payments.key());
    }

    #[test]
    fn key_columns_match_key_arity() {
        let streaming = streaming_fact(1, Some(1));
        assert_eq!(streaming.key().len(), FactStreaming::KEY_COLUMNS.len());

        let sub = FactSubscription {
            user_id: 1,
            start_date: date(2024, 1, 1),
            end_date: None,
            date_id: Some(2),
            plan_id: 3,
            monthly_fee: 9.99,
        };
        assert_eq!(sub.key().len(), FactSubscription::KEY_COLUMNS.len());
        assert_eq!(sub.key(), vec!["1".to_string(), "2".to_string(), "3".to_string()]);
    }
}
