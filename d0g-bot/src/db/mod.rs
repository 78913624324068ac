//! Embedded transactional key-value store.
//!
//! A single SQLite file used purely as a byte store: `kv` holds
//! `(bucket, key) -> value` rows and `kv_sequences` holds one monotonically
//! increasing counter per bucket. All access goes through [`Store::update`]
//! (exclusive) or [`Store::view`] (shared) transactions.

pub mod keys;
pub mod tables;

use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{OptionalExtension, TransactionBehavior};

use crate::error::BotResult;

pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Connections kept open for a file-backed store
const FILE_POOL_SIZE: u32 = 8;

/// How long a command transaction waits for a connection and for the write lock
const TRANSACTION_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Store {
    pool: Pool<SqliteConnectionManager>,
}

impl Store {
    /// Open (creating if missing) the store at `path`.
    ///
    /// `timeout` bounds only the open itself: if the file cannot be opened and
    /// its tables created within it, opening fails. Later transactions wait up
    /// to `TRANSACTION_TIMEOUT` instead.
    pub fn open(path: &str, timeout: Duration) -> BotResult<Self> {
        if path == ":memory:" {
            // Every in-memory connection is its own database, so keep exactly one
            return Self::build(SqliteConnectionManager::memory(), 1, timeout);
        }
        Self::build(SqliteConnectionManager::file(path), FILE_POOL_SIZE, timeout)
    }

    fn build(manager: SqliteConnectionManager, size: u32, timeout: Duration) -> BotResult<Self> {
        let manager = manager.with_init(|conn| {
            conn.busy_timeout(TRANSACTION_TIMEOUT)?;
            conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
        });

        // Connections are opened on first use and never recycled, since
        // dropping the only in-memory connection would drop its data
        let pool = Pool::builder()
            .max_size(size)
            .min_idle(Some(0))
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_timeout(TRANSACTION_TIMEOUT)
            .build(manager)?;

        let store = Self { pool };
        store.create_tables(timeout)?;
        Ok(store)
    }

    fn create_tables(&self, timeout: Duration) -> BotResult<()> {
        let conn = self.pool.get_timeout(timeout)?;
        conn.busy_timeout(timeout)?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                bucket BLOB NOT NULL,
                key BLOB NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (bucket, key)
            ) WITHOUT ROWID;
            CREATE TABLE IF NOT EXISTS kv_sequences (
                bucket BLOB PRIMARY KEY,
                seq INTEGER NOT NULL
            ) WITHOUT ROWID;",
        )?;
        conn.busy_timeout(TRANSACTION_TIMEOUT)?;
        log::info!("Store: tables ready");
        Ok(())
    }

    pub fn conn(&self) -> BotResult<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run `f` inside an exclusive read-write transaction.
    ///
    /// The transaction commits only if `f` returns `Ok`; any error rolls back
    /// every write made inside it.
    pub fn update<T>(&self, f: impl FnOnce(&Tx<'_>) -> BotResult<T>) -> BotResult<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let result = f(&Tx { inner: &tx })?;
        tx.commit()?;
        Ok(result)
    }

    /// Run `f` inside a read-only transaction. Readers never block each other
    /// and see the last committed state.
    pub fn view<T>(&self, f: impl FnOnce(&Tx<'_>) -> BotResult<T>) -> BotResult<T> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        f(&Tx { inner: &tx })
    }

    /// Flush the WAL and release every pooled connection.
    pub fn close(self) -> BotResult<()> {
        {
            let conn = self.conn()?;
            conn.query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |_| Ok(()))
                .optional()?;
        }
        drop(self.pool);
        log::info!("Store: closed");
        Ok(())
    }
}

/// Bucket operations available inside a transaction. Every read returns an
/// owned copy of the stored bytes.
pub struct Tx<'a> {
    inner: &'a rusqlite::Transaction<'a>,
}

impl Tx<'_> {
    pub fn get(&self, bucket: &[u8], key: &[u8]) -> BotResult<Option<Vec<u8>>> {
        let value = self
            .inner
            .query_row(
                "SELECT value FROM kv WHERE bucket = ?1 AND key = ?2",
                rusqlite::params![bucket, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn put(&self, bucket: &[u8], key: &[u8], value: &[u8]) -> BotResult<()> {
        self.inner.execute(
            "INSERT INTO kv (bucket, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (bucket, key) DO UPDATE SET value = excluded.value",
            rusqlite::params![bucket, key, value],
        )?;
        Ok(())
    }

    /// Returns whether a row was removed. Deleting a missing key is not an error.
    pub fn delete(&self, bucket: &[u8], key: &[u8]) -> BotResult<bool> {
        let removed = self.inner.execute(
            "DELETE FROM kv WHERE bucket = ?1 AND key = ?2",
            rusqlite::params![bucket, key],
        )?;
        Ok(removed > 0)
    }

    /// All pairs in `bucket`, ascending by key bytes. An absent bucket is empty.
    pub fn scan(&self, bucket: &[u8]) -> BotResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let mut stmt = self
            .inner
            .prepare("SELECT key, value FROM kv WHERE bucket = ?1 ORDER BY key ASC")?;
        let pairs = stmt
            .query_map([bucket], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(pairs)
    }

    /// Allocate the next sequence number for `bucket`, starting at 1.
    /// Counters only grow, so ids are never handed out twice.
    pub fn next_sequence(&self, bucket: &[u8]) -> BotResult<u64> {
        let seq: i64 = self.inner.query_row(
            "INSERT INTO kv_sequences (bucket, seq) VALUES (?1, 1)
             ON CONFLICT (bucket) DO UPDATE SET seq = seq + 1
             RETURNING seq",
            [bucket],
            |row| row.get(0),
        )?;
        Ok(seq as u64)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// File-backed store in a temp dir; keep the dir alive for the test's duration.
    pub fn temp_store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        let store = Store::open(path.to_str().unwrap(), Duration::from_secs(5)).unwrap();
        (dir, store)
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::temp_store;
    use super::*;
    use crate::error::BotError;
    use std::sync::{Arc, mpsc};
    use std::thread;

    #[test]
    fn test_put_get_delete() {
        let store = Store::open(":memory:", Duration::from_secs(1)).unwrap();

        store.update(|tx| tx.put(b"b", b"k", b"v1")).unwrap();
        store.update(|tx| tx.put(b"b", b"k", b"v2")).unwrap();
        let value = store.view(|tx| tx.get(b"b", b"k")).unwrap();
        assert_eq!(value, Some(b"v2".to_vec()));

        assert!(store.update(|tx| tx.delete(b"b", b"k")).unwrap());
        assert!(!store.update(|tx| tx.delete(b"b", b"k")).unwrap());
        assert_eq!(store.view(|tx| tx.get(b"b", b"k")).unwrap(), None);
    }

    #[test]
    fn test_scan_absent_bucket_is_empty() {
        let store = Store::open(":memory:", Duration::from_secs(1)).unwrap();
        assert!(store.view(|tx| tx.scan(b"nothing-here")).unwrap().is_empty());
    }

    #[test]
    fn test_failed_update_rolls_back() {
        let store = Store::open(":memory:", Duration::from_secs(1)).unwrap();

        let result: BotResult<()> = store.update(|tx| {
            tx.put(b"b", b"k", b"partial")?;
            Err(BotError::storage("boom"))
        });
        assert!(result.is_err());
        assert_eq!(store.view(|tx| tx.get(b"b", b"k")).unwrap(), None);
    }

    #[test]
    fn test_sequences_are_per_bucket_and_never_reused() {
        let (_dir, store) = temp_store();

        assert_eq!(store.update(|tx| tx.next_sequence(b"a")).unwrap(), 1);
        assert_eq!(store.update(|tx| tx.next_sequence(b"a")).unwrap(), 2);
        assert_eq!(store.update(|tx| tx.next_sequence(b"b")).unwrap(), 1);

        // A rolled back allocation does not advance the counter
        let _ = store.update(|tx| -> BotResult<()> {
            tx.next_sequence(b"a")?;
            Err(BotError::storage("abort"))
        });
        assert_eq!(store.update(|tx| tx.next_sequence(b"a")).unwrap(), 3);
    }

    #[test]
    fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reopen.db");
        let path = path.to_str().unwrap();

        let store = Store::open(path, Duration::from_secs(1)).unwrap();
        store.update(|tx| tx.put(b"b", b"k", b"kept")).unwrap();
        store.close().unwrap();

        let store = Store::open(path, Duration::from_secs(1)).unwrap();
        assert_eq!(store.view(|tx| tx.get(b"b", b"k")).unwrap(), Some(b"kept".to_vec()));
    }

    #[test]
    fn test_open_timeout_does_not_bound_transactions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("slow.db");
        let store = Arc::new(Store::open(path.to_str().unwrap(), Duration::from_millis(100)).unwrap());

        let (locked_tx, locked_rx) = mpsc::channel();
        let holder = {
            let store = store.clone();
            thread::spawn(move || {
                store
                    .update(|tx| {
                        tx.put(b"b", b"first", b"1")?;
                        locked_tx.send(()).unwrap();
                        thread::sleep(Duration::from_millis(600));
                        Ok(())
                    })
                    .unwrap();
            })
        };

        // Waits behind the writer for longer than the open timeout
        locked_rx.recv().unwrap();
        store.update(|tx| tx.put(b"b", b"second", b"2")).unwrap();
        holder.join().unwrap();

        let rows = store.view(|tx| tx.scan(b"b")).unwrap();
        assert_eq!(rows.len(), 2);
    }
}
