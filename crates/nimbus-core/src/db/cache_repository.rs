//! Snapshot cache repository implementation

use crate::error::Result;
use crate::models::{CacheClass, CachedEntity};
use rusqlite::types::Type;
use rusqlite::{params, Connection};

/// Trait for cached snapshot storage
pub trait CacheRepository {
    /// Insert or replace the entry for `(key, class)`
    fn upsert(&self, entity: &CachedEntity) -> Result<()>;

    /// Get the entry for `(key, class)`
    fn get(&self, key: &str, class: CacheClass) -> Result<Option<CachedEntity>>;

    /// List entries of a class, most recently fetched first
    fn list(&self, class: CacheClass) -> Result<Vec<CachedEntity>>;

    /// Delete entries of `class` fetched strictly before `cutoff`
    fn delete_older_than(&self, cutoff: i64, class: CacheClass) -> Result<usize>;
}

/// `SQLite` implementation of `CacheRepository`
pub struct SqliteCacheRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCacheRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn parse_entity(row: &rusqlite::Row<'_>) -> rusqlite::Result<CachedEntity> {
        let class: String = row.get(1)?;
        let class: CacheClass = class
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
        Ok(CachedEntity {
            key: row.get(0)?,
            class,
            payload: row.get(2)?,
            fetched_at: row.get(3)?,
        })
    }
}

impl CacheRepository for SqliteCacheRepository<'_> {
    fn upsert(&self, entity: &CachedEntity) -> Result<()> {
        self.conn.execute(
            "INSERT INTO cache_entries (key, class, payload, fetched_at) VALUES (?, ?, ?, ?)
             ON CONFLICT(key, class) DO UPDATE SET
                 payload = excluded.payload,
                 fetched_at = excluded.fetched_at",
            params![
                entity.key,
                entity.class.as_str(),
                entity.payload,
                entity.fetched_at
            ],
        )?;
        Ok(())
    }

    fn get(&self, key: &str, class: CacheClass) -> Result<Option<CachedEntity>> {
        let result = self.conn.query_row(
            "SELECT key, class, payload, fetched_at FROM cache_entries WHERE key = ? AND class = ?",
            params![key, class.as_str()],
            Self::parse_entity,
        );

        match result {
            Ok(entity) => Ok(Some(entity)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list(&self, class: CacheClass) -> Result<Vec<CachedEntity>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, class, payload, fetched_at FROM cache_entries
             WHERE class = ?
             ORDER BY fetched_at DESC",
        )?;

        let entities = stmt
            .query_map(params![class.as_str()], Self::parse_entity)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entities)
    }

    fn delete_older_than(&self, cutoff: i64, class: CacheClass) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM cache_entries WHERE class = ? AND fetched_at < ?",
            params![class.as_str(), cutoff],
        )?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn entity(key: &str, class: CacheClass, fetched_at: i64) -> CachedEntity {
        CachedEntity {
            key: key.to_string(),
            class,
            payload: format!("{{\"key\":\"{key}\"}}"),
            fetched_at,
        }
    }

    #[test]
    fn test_upsert_replaces_existing_row() {
        let db = setup();
        let repo = SqliteCacheRepository::new(db.connection());

        repo.upsert(&entity("home", CacheClass::Weather, 1_000)).unwrap();
        let mut newer = entity("home", CacheClass::Weather, 2_000);
        newer.payload = "{\"fresh\":true}".to_string();
        repo.upsert(&newer).unwrap();

        let rows = repo.list(CacheClass::Weather).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0], newer);
    }

    #[test]
    fn test_same_key_different_class_coexist() {
        let db = setup();
        let repo = SqliteCacheRepository::new(db.connection());

        repo.upsert(&entity("home", CacheClass::Weather, 1_000)).unwrap();
        repo.upsert(&entity("home", CacheClass::HourlyForecast, 1_000))
            .unwrap();

        assert!(repo.get("home", CacheClass::Weather).unwrap().is_some());
        assert!(repo.get("home", CacheClass::HourlyForecast).unwrap().is_some());
        assert!(repo.get("home", CacheClass::Notification).unwrap().is_none());
    }

    #[test]
    fn test_delete_older_than_only_touches_class() {
        let db = setup();
        let repo = SqliteCacheRepository::new(db.connection());

        repo.upsert(&entity("old", CacheClass::Weather, 1_000)).unwrap();
        repo.upsert(&entity("new", CacheClass::Weather, 5_000)).unwrap();
        repo.upsert(&entity("old", CacheClass::Notification, 1_000))
            .unwrap();

        assert_eq!(repo.delete_older_than(2_000, CacheClass::Weather).unwrap(), 1);
        assert!(repo.get("old", CacheClass::Weather).unwrap().is_none());
        assert!(repo.get("new", CacheClass::Weather).unwrap().is_some());
        assert!(repo.get("old", CacheClass::Notification).unwrap().is_some());
    }

    #[test]
    fn test_delete_older_than_is_strict() {
        let db = setup();
        let repo = SqliteCacheRepository::new(db.connection());

        repo.upsert(&entity("edge", CacheClass::Weather, 2_000)).unwrap();
        assert_eq!(repo.delete_older_than(2_000, CacheClass::Weather).unwrap(), 0);
    }
}
