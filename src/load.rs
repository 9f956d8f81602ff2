//! Transactional bulk inserts into the `comments` table.
use async_trait::async_trait;
use log::{debug, warn};
use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};

use crate::comment::{Comment, COLUMNS};
use crate::error::{Result, SyncError};
use crate::sync::BatchSink;

/// Postgres refuses statements with more bind parameters than this.
pub const BIND_LIMIT: usize = u16::MAX as usize;

/// Largest batch that still fits in a single insert.
pub const MAX_BATCH: usize = BIND_LIMIT / COLUMNS.len();

/// Build the single multi-row insert for a batch, one placeholder per value.
pub fn insert_query(offset: u64, comments: &[Comment]) -> Result<QueryBuilder<'_, Postgres>> {
    if comments.is_empty() {
        return Err(SyncError::Build {
            offset,
            reason: "no values to insert".into(),
        });
    }
    if comments.len() > MAX_BATCH {
        return Err(SyncError::Build {
            offset,
            reason: format!(
                "{} comments need {} parameters, at most {} allowed",
                comments.len(),
                comments.len() * COLUMNS.len(),
                BIND_LIMIT
            ),
        });
    }

    let mut query = QueryBuilder::new(format!("INSERT INTO comments ({}) ", COLUMNS.join(", ")));
    query.push_values(comments, |mut row, comment| {
        row.push_bind(comment.post_id)
            .push_bind(comment.id)
            .push_bind(&comment.name)
            .push_bind(&comment.email)
            .push_bind(&comment.body);
    });
    Ok(query)
}

/// Writes each batch in its own transaction.
pub struct Loader {
    pool: PgPool,
}

impl Loader {
    pub fn new(pool: PgPool) -> Self {
        Loader { pool }
    }

    /// Insert `comments` atomically. On failure the transaction is rolled
    /// back and none of the rows are visible. An empty batch touches nothing.
    pub async fn load_batch(&self, offset: u64, comments: &[Comment]) -> Result<u64> {
        if comments.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|source| SyncError::Begin { offset, source })?;

        let mut query = match insert_query(offset, comments) {
            Ok(query) => query,
            Err(e) => return Err(rollback(tx, offset, e).await),
        };

        debug!("inserting {} comments at offset {}", comments.len(), offset);
        let executed = query.build().execute(&mut *tx).await;
        let done = match executed {
            Ok(done) => done,
            Err(source) => {
                return Err(rollback(tx, offset, SyncError::Execute { offset, source }).await)
            }
        };

        tx.commit()
            .await
            .map_err(|source| SyncError::Commit { offset, source })?;

        Ok(done.rows_affected())
    }
}

/// Best-effort rollback. A failing rollback is logged, the original error
/// is what gets reported.
async fn rollback(tx: Transaction<'_, Postgres>, offset: u64, err: SyncError) -> SyncError {
    if let Err(e) = tx.rollback().await {
        warn!("rollback of batch at offset {} failed: {}", offset, e);
    }
    err
}

#[async_trait]
impl BatchSink for Loader {
    async fn load(&mut self, offset: u64, batch: &[Comment]) -> Result<u64> {
        self.load_batch(offset, batch).await
    }
}

#[cfg(test)]
mod tests {
    use super::{insert_query, Loader, MAX_BATCH};
    use crate::comment::Comment;
    use crate::config::Config;
    use crate::db::init_pool;
    use crate::error::SyncError;

    fn comment(id: i32) -> Comment {
        Comment {
            post_id: 1,
            id,
            name: "name".into(),
            email: "a@b.com".into(),
            body: "body".into(),
        }
    }

    #[test]
    fn one_statement_per_batch() {
        let comments = vec![comment(1), comment(2)];
        let query = insert_query(0, &comments).unwrap();

        assert_eq!(
            query.sql(),
            "INSERT INTO comments (post_id, id, name, email, body) \
             VALUES ($1, $2, $3, $4, $5), ($6, $7, $8, $9, $10)"
        );
    }

    #[test]
    fn one_placeholder_per_value() {
        let comments: Vec<Comment> = (1..=50).map(comment).collect();
        let query = insert_query(0, &comments).unwrap();
        let sql = query.sql();

        assert_eq!(sql.matches('$').count(), 250);
        assert_eq!(sql.matches("), (").count(), 49);
        assert!(sql.ends_with("$246, $247, $248, $249, $250)"));
    }

    #[test]
    fn empty_batch_cannot_be_built() {
        let err = insert_query(150, &[]).err().unwrap();
        assert!(matches!(err, SyncError::Build { offset: 150, .. }));
    }

    #[test]
    fn oversized_batch_cannot_be_built() {
        let comments = vec![comment(1); MAX_BATCH + 1];
        let err = insert_query(0, &comments).err().unwrap();
        assert!(matches!(err, SyncError::Build { .. }));

        assert!(insert_query(0, &comments[..MAX_BATCH]).is_ok());
    }

    /// Needs a local postgres reachable with the `PG_*` variables.
    #[tokio::test]
    #[ignore]
    async fn failed_batch_leaves_no_rows() {
        let config = Config::from_env().expect("no config");
        let pool = init_pool(&config).await.expect("no pool");
        // Single connection pool, so the temp table shadows `comments` for
        // every statement below.
        sqlx::query(
            "CREATE TEMP TABLE comments (
                post_id integer not null,
                id integer primary key,
                name text not null,
                email text not null,
                body text not null
            )",
        )
        .execute(&pool)
        .await
        .unwrap();
        let loader = Loader::new(pool.clone());

        let duplicate = vec![comment(1), comment(2), comment(1)];
        let err = loader.load_batch(0, &duplicate).await.unwrap_err();
        assert!(matches!(err, SyncError::Execute { offset: 0, .. }));

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM comments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);

        let good = vec![comment(1), comment(2)];
        assert_eq!(loader.load_batch(50, &good).await.unwrap(), 2);
        assert_eq!(loader.load_batch(100, &[]).await.unwrap(), 0);

        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM comments")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 2);

        pool.close().await;
    }
}
