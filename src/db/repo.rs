//! Repository layer for the event store.

use crate::domain::{Address, Amount, Delegator, EventRecord, PoolEvent, TimeMs};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

fn decode_err<E>(err: E) -> sqlx::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    sqlx::Error::Decode(Box::new(err))
}

fn amount_column(row: &SqliteRow, column: &str) -> Result<Amount, sqlx::Error> {
    let raw: String = row.try_get(column)?;
    raw.parse::<Amount>().map_err(decode_err)
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    // =========================================================================
    // Event operations
    // =========================================================================

    /// Insert events in a single transaction.
    ///
    /// Returns the number of newly inserted events (excludes duplicates by `event_key`).
    ///
    /// # Errors
    /// Returns an error if the transaction fails.
    pub async fn insert_events_batch(&self, records: &[EventRecord]) -> Result<usize, sqlx::Error> {
        if records.is_empty() {
            return Ok(0);
        }

        let created_at = chrono::Utc::now().timestamp_millis();
        let mut total_inserted = 0usize;
        let mut tx = self.pool.begin().await?;

        for record in records {
            let payload = serde_json::to_string(&record.event).map_err(decode_err)?;
            let result = sqlx::query(
                r#"
                INSERT INTO pool_events (
                    seq, time_ms, kind, account, value, payload, event_key, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(event_key) DO NOTHING
                "#,
            )
            .bind(record.seq as i64)
            .bind(record.time_ms.as_ms())
            .bind(record.event.kind())
            .bind(record.event.account().as_str())
            .bind(record.event.value().map(|v| v.to_string()))
            .bind(payload)
            .bind(record.event_key.as_str())
            .bind(created_at)
            .execute(&mut *tx)
            .await?;

            if result.rows_affected() > 0 {
                total_inserted += 1;
            }
        }

        tx.commit().await?;
        Ok(total_inserted)
    }

    /// Stored events in sequence order, optionally only those acted by `account`.
    ///
    /// # Errors
    /// Returns an error if the query fails or a stored payload no longer decodes.
    pub async fn query_events(
        &self,
        account: Option<&Address>,
    ) -> Result<Vec<EventRecord>, sqlx::Error> {
        let rows = match account {
            Some(account) => {
                sqlx::query(
                    r#"
                    SELECT seq, time_ms, payload, event_key
                    FROM pool_events
                    WHERE account = ?
                    ORDER BY seq ASC
                    "#,
                )
                .bind(account.as_str())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    r#"
                    SELECT seq, time_ms, payload, event_key
                    FROM pool_events
                    ORDER BY seq ASC
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.iter()
            .map(|row| {
                let payload: String = row.try_get("payload")?;
                let event: PoolEvent = serde_json::from_str(&payload).map_err(decode_err)?;
                let seq: i64 = row.try_get("seq")?;
                Ok(EventRecord {
                    seq: seq as u64,
                    time_ms: TimeMs::new(row.try_get("time_ms")?),
                    event_key: row.try_get("event_key")?,
                    event,
                })
            })
            .collect()
    }

    /// Highest stored sequence number, 0 for an empty log.
    pub async fn last_seq(&self) -> Result<u64, sqlx::Error> {
        let row = sqlx::query("SELECT COALESCE(MAX(seq), 0) AS last FROM pool_events")
            .fetch_one(&self.pool)
            .await?;
        let last: i64 = row.try_get("last")?;
        Ok(last.max(0) as u64)
    }

    pub async fn count_events(&self) -> Result<i64, sqlx::Error> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM pool_events")
            .fetch_one(&self.pool)
            .await?;
        row.try_get("n")
    }

    // =========================================================================
    // Delegator snapshots
    // =========================================================================

    /// Store the latest snapshot of an account's record, replacing any earlier one.
    ///
    /// # Errors
    /// Returns an error if the upsert fails.
    pub async fn upsert_delegator(
        &self,
        account: &Address,
        delegator: &Delegator,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO delegators (
                account, deposited_tokens, withdrawn_reward, withdrawn_eth,
                deposited_eth_work_lock, refunded_eth_work_lock,
                claimed_work_lock_tokens, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account) DO UPDATE SET
                deposited_tokens = excluded.deposited_tokens,
                withdrawn_reward = excluded.withdrawn_reward,
                withdrawn_eth = excluded.withdrawn_eth,
                deposited_eth_work_lock = excluded.deposited_eth_work_lock,
                refunded_eth_work_lock = excluded.refunded_eth_work_lock,
                claimed_work_lock_tokens = excluded.claimed_work_lock_tokens,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(account.as_str())
        .bind(delegator.deposited_tokens.to_string())
        .bind(delegator.withdrawn_reward.to_string())
        .bind(delegator.withdrawn_eth.to_string())
        .bind(delegator.deposited_eth_work_lock.to_string())
        .bind(delegator.refunded_eth_work_lock.to_string())
        .bind(delegator.claimed_work_lock_tokens)
        .bind(chrono::Utc::now().timestamp_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Last stored snapshot for `account`, if any.
    pub async fn get_delegator(&self, account: &Address) -> Result<Option<Delegator>, sqlx::Error> {
        let row = sqlx::query(
            r#"
            SELECT deposited_tokens, withdrawn_reward, withdrawn_eth,
                   deposited_eth_work_lock, refunded_eth_work_lock,
                   claimed_work_lock_tokens
            FROM delegators
            WHERE account = ?
            "#,
        )
        .bind(account.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(Delegator {
                deposited_tokens: amount_column(&r, "deposited_tokens")?,
                withdrawn_reward: amount_column(&r, "withdrawn_reward")?,
                withdrawn_eth: amount_column(&r, "withdrawn_eth")?,
                deposited_eth_work_lock: amount_column(&r, "deposited_eth_work_lock")?,
                refunded_eth_work_lock: amount_column(&r, "refunded_eth_work_lock")?,
                claimed_work_lock_tokens: r.try_get("claimed_work_lock_tokens")?,
            })
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_db;
    use tempfile::TempDir;

    async fn setup_test_db() -> (Repository, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (Repository::new(pool), temp_dir)
    }

    fn addr(b: u8) -> Address {
        Address::from_bytes([b; 20])
    }

    fn records() -> Vec<EventRecord> {
        vec![
            EventRecord::new(
                1,
                TimeMs::new(1000),
                PoolEvent::TokensDeposited {
                    account: addr(10),
                    value: 100,
                    deposited_tokens: 100,
                },
            ),
            EventRecord::new(
                2,
                TimeMs::new(2000),
                PoolEvent::Bid {
                    account: addr(11),
                    value: u128::MAX,
                },
            ),
            EventRecord::new(
                3,
                TimeMs::new(3000),
                PoolEvent::DepositSet {
                    account: addr(2),
                    enabled: false,
                },
            ),
        ]
    }

    #[tokio::test]
    async fn test_insert_and_query_events() {
        let (repo, _temp) = setup_test_db().await;
        let records = records();

        assert_eq!(repo.insert_events_batch(&records).await.unwrap(), 3);

        let stored = repo.query_events(None).await.unwrap();
        assert_eq!(stored, records);
    }

    #[tokio::test]
    async fn test_insert_events_batch_idempotent() {
        let (repo, _temp) = setup_test_db().await;
        let records = records();

        repo.insert_events_batch(&records[..2]).await.unwrap();
        let inserted = repo.insert_events_batch(&records).await.unwrap();
        assert_eq!(inserted, 1, "Only the new event should be inserted");
        assert_eq!(repo.count_events().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_last_seq() {
        let (repo, _temp) = setup_test_db().await;
        assert_eq!(repo.last_seq().await.unwrap(), 0);
        let records = records();
        repo.insert_events_batch(&records).await.unwrap();
        assert_eq!(repo.last_seq().await.unwrap(), records.last().unwrap().seq);
    }

    #[tokio::test]
    async fn test_insert_events_batch_empty() {
        let (repo, _temp) = setup_test_db().await;
        assert_eq!(repo.insert_events_batch(&[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_events_by_account() {
        let (repo, _temp) = setup_test_db().await;
        repo.insert_events_batch(&records()).await.unwrap();

        let stored = repo.query_events(Some(&addr(11))).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].event.value(), Some(u128::MAX));
        assert!(repo.query_events(Some(&addr(99))).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delegator_snapshot_upsert() {
        let (repo, _temp) = setup_test_db().await;
        assert_eq!(repo.get_delegator(&addr(10)).await.unwrap(), None);

        let mut d = Delegator::new();
        d.deposited_tokens = 100;
        d.deposited_eth_work_lock = u128::MAX;
        repo.upsert_delegator(&addr(10), &d).await.unwrap();
        assert_eq!(repo.get_delegator(&addr(10)).await.unwrap(), Some(d));

        d.withdrawn_reward = 9;
        d.claimed_work_lock_tokens = true;
        repo.upsert_delegator(&addr(10), &d).await.unwrap();
        assert_eq!(repo.get_delegator(&addr(10)).await.unwrap(), Some(d));
    }
}
