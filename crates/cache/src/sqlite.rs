use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};
use tokio::sync::broadcast;

use quizsync_core::{EntityKey, EntityKind, RecordId, Snapshot};

use crate::error::CacheError;
use crate::traits::{CacheEvent, EntityCache, Notifier};

/// Snapshot cache persisted to SQLite, so a client restarts with the last
/// state it saw. Payloads are msgpack-encoded snapshots.
pub struct SqliteCache {
    conn: Mutex<Connection>,
    notifier: Notifier,
}

impl SqliteCache {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::with_connection(conn))
    }

    pub fn open_in_memory() -> Result<Self, CacheError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            notifier: Notifier::new(),
        }
    }

    fn conn(&self, operation: &'static str) -> Result<MutexGuard<'_, Connection>, CacheError> {
        self.conn
            .lock()
            .map_err(|_| CacheError::LockPoisoned(operation))
    }

    /// Stored content hash for `key`, without decoding the payload.
    pub fn fingerprint(&self, key: &EntityKey) -> Result<Option<[u8; 32]>, CacheError> {
        let conn = self.conn("fingerprint")?;
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT fingerprint FROM snapshots WHERE kind = ?1 AND record_id = ?2",
                rusqlite::params![key.kind.as_str(), key.id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        bytes.map(to_hash).transpose()
    }

    /// Drops every snapshot still keyed by a temporary id. Creates that never
    /// reconciled before the process exited have no server counterpart.
    pub fn purge_local(&self) -> Result<usize, CacheError> {
        let keys: Vec<EntityKey> = [
            EntityKind::Quiz,
            EntityKind::Question,
            EntityKind::Project,
            EntityKind::Document,
        ]
        .into_iter()
        .map(|kind| self.keys(kind))
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .flatten()
        .filter(|key| key.id.is_local())
        .collect();

        for key in &keys {
            self.remove(key)?;
        }
        if !keys.is_empty() {
            log::debug!("purged {} unreconciled snapshots", keys.len());
        }
        Ok(keys.len())
    }
}

fn to_hash(bytes: Vec<u8>) -> Result<[u8; 32], CacheError> {
    bytes
        .try_into()
        .map_err(|_| CacheError::Serialization("invalid fingerprint length".into()))
}

fn write_snapshot(conn: &Connection, snapshot: &Snapshot) -> Result<(), CacheError> {
    let key = snapshot.key();
    let payload = snapshot.to_msgpack()?;
    let fingerprint = snapshot.fingerprint()?;
    conn.execute(
        "INSERT INTO snapshots (kind, record_id, payload, fingerprint) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (kind, record_id) DO UPDATE SET
            payload = excluded.payload,
            fingerprint = excluded.fingerprint,
            stored_at = excluded.stored_at",
        rusqlite::params![
            key.kind.as_str(),
            key.id.to_string(),
            payload,
            fingerprint.as_bytes().as_slice(),
        ],
    )?;
    Ok(())
}

fn delete_snapshot(conn: &Connection, key: &EntityKey) -> Result<usize, CacheError> {
    Ok(conn.execute(
        "DELETE FROM snapshots WHERE kind = ?1 AND record_id = ?2",
        rusqlite::params![key.kind.as_str(), key.id.to_string()],
    )?)
}

fn read_snapshot(conn: &Connection, key: &EntityKey) -> Result<Option<Snapshot>, CacheError> {
    let payload: Option<Vec<u8>> = conn
        .query_row(
            "SELECT payload FROM snapshots WHERE kind = ?1 AND record_id = ?2",
            rusqlite::params![key.kind.as_str(), key.id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(payload
        .map(|bytes| Snapshot::from_msgpack(&bytes))
        .transpose()?)
}

impl EntityCache for SqliteCache {
    fn get(&self, key: &EntityKey) -> Result<Option<Snapshot>, CacheError> {
        let conn = self.conn("get")?;
        read_snapshot(&conn, key)
    }

    fn put(&self, snapshot: Snapshot) -> Result<(), CacheError> {
        let key = snapshot.key();
        {
            let conn = self.conn("put")?;
            write_snapshot(&conn, &snapshot)?;
        }
        self.notifier.emit(CacheEvent::Put(key));
        Ok(())
    }

    fn remove(&self, key: &EntityKey) -> Result<Option<Snapshot>, CacheError> {
        let removed = {
            let conn = self.conn("remove")?;
            let existing = read_snapshot(&conn, key)?;
            delete_snapshot(&conn, key)?;
            existing
        };
        if removed.is_some() {
            self.notifier.emit(CacheEvent::Removed(*key));
        }
        Ok(removed)
    }

    fn swap(&self, old: &EntityKey, snapshot: Snapshot) -> Result<(), CacheError> {
        let key = snapshot.key();
        {
            let mut conn = self.conn("swap")?;
            let tx = conn.transaction()?;
            delete_snapshot(&tx, old)?;
            write_snapshot(&tx, &snapshot)?;
            tx.commit()?;
        }
        if *old == key {
            self.notifier.emit(CacheEvent::Put(key));
        } else {
            self.notifier.emit(CacheEvent::Rekeyed { from: *old, to: key });
        }
        Ok(())
    }

    fn keys(&self, kind: EntityKind) -> Result<Vec<EntityKey>, CacheError> {
        let conn = self.conn("keys")?;
        let mut stmt = conn.prepare("SELECT record_id FROM snapshots WHERE kind = ?1")?;
        let rows = stmt.query_map([kind.as_str()], |row| row.get::<_, String>(0))?;
        let mut keys = Vec::new();
        for row in rows {
            keys.push(EntityKey::new(kind, RecordId::parse(&row?)?));
        }
        keys.sort();
        Ok(keys)
    }

    fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.notifier.subscribe()
    }
}
