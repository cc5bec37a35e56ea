//! Mutation queue repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT

use crate::error::{Error, Result};
use crate::models::{MutationId, PendingMutation, ReportPayload, SyncState};
use rusqlite::types::Type;
use rusqlite::{params, Connection};
use serde::Serialize;

const SELECT_COLUMNS: &str =
    "SELECT id, payload, state, last_error, attempts, synced_at FROM mutations";

/// Row counts per sync state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StateCounts {
    pub pending: usize,
    pub synced: usize,
    pub failed: usize,
}

/// Trait for the durable mutation queue
pub trait MutationRepository {
    /// Validate and durably queue a report
    fn enqueue(&self, payload: ReportPayload, now: i64) -> Result<PendingMutation>;

    /// Get a mutation by ID, in any state
    fn get(&self, id: &MutationId) -> Result<Option<PendingMutation>>;

    /// List pending mutations, oldest first
    fn list_pending(&self) -> Result<Vec<PendingMutation>>;

    /// List mutations in any state, newest first
    fn list(&self, limit: usize) -> Result<Vec<PendingMutation>>;

    /// IDs starting with `prefix`, at most `limit`
    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<MutationId>>;

    /// Mark a mutation as confirmed by the remote store
    fn mark_synced(&self, id: &MutationId, now: i64) -> Result<()>;

    /// Record a failed push; the row moves to `Failed` once `max_attempts` is reached
    fn mark_failed(
        &self,
        id: &MutationId,
        message: &str,
        max_attempts: Option<u32>,
        now: i64,
    ) -> Result<PendingMutation>;

    /// Delete synced rows confirmed before `cutoff`
    fn delete_synced_older_than(&self, cutoff: i64) -> Result<usize>;

    /// Drop a mutation that has not been synced yet
    fn discard(&self, id: &MutationId) -> Result<()>;

    /// Move abandoned rows back to the pending queue with a fresh attempt count
    fn requeue_failed(&self, now: i64) -> Result<usize>;

    /// Count rows per state
    fn count_by_state(&self) -> Result<StateCounts>;
}

/// `SQLite` implementation of `MutationRepository`
pub struct SqliteMutationRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteMutationRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse a mutation from a database row
    fn parse_mutation(row: &rusqlite::Row<'_>) -> rusqlite::Result<PendingMutation> {
        let id: String = row.get(0)?;
        let id: MutationId = id
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;

        let payload: String = row.get(1)?;
        let payload: ReportPayload = serde_json::from_str(&payload)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;

        let state: String = row.get(2)?;
        let state: SyncState = state
            .parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?;

        Ok(PendingMutation {
            id,
            payload,
            state,
            last_error: row.get(3)?,
            attempts: row.get(4)?,
            synced_at: row.get(5)?,
        })
    }

    fn query(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<PendingMutation>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mutations = stmt
            .query_map(params, Self::parse_mutation)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(mutations)
    }
}

impl MutationRepository for SqliteMutationRepository<'_> {
    fn enqueue(&self, mut payload: ReportPayload, now: i64) -> Result<PendingMutation> {
        payload.validate()?;

        let mutation = PendingMutation {
            id: MutationId::new(),
            payload,
            state: SyncState::Pending,
            last_error: None,
            attempts: 0,
            synced_at: None,
        };

        self.conn.execute(
            "INSERT INTO mutations (id, payload, state, attempts, created_at, updated_at)
             VALUES (?, ?, ?, 0, ?, ?)",
            params![
                mutation.id.as_str(),
                serde_json::to_string(&mutation.payload)?,
                mutation.state.as_str(),
                mutation.created_at(),
                now
            ],
        )?;

        Ok(mutation)
    }

    fn get(&self, id: &MutationId) -> Result<Option<PendingMutation>> {
        let result = self.conn.query_row(
            &format!("{SELECT_COLUMNS} WHERE id = ?"),
            params![id.as_str()],
            Self::parse_mutation,
        );

        match result {
            Ok(mutation) => Ok(Some(mutation)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn list_pending(&self) -> Result<Vec<PendingMutation>> {
        self.query(
            &format!("{SELECT_COLUMNS} WHERE state = 'pending' ORDER BY created_at ASC, id ASC"),
            [],
        )
    }

    fn list(&self, limit: usize) -> Result<Vec<PendingMutation>> {
        self.query(
            &format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC LIMIT ?"),
            params![limit as i64],
        )
    }

    fn list_ids_by_prefix(&self, prefix: &str, limit: usize) -> Result<Vec<MutationId>> {
        let mut stmt = self.conn.prepare(
            "SELECT id FROM mutations WHERE substr(id, 1, length(?1)) = ?1 ORDER BY id LIMIT ?2",
        )?;
        let ids = stmt
            .query_map(params![prefix.to_ascii_lowercase(), limit as i64], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        ids.iter()
            .map(|id| {
                id.parse::<MutationId>()
                    .map_err(|e| Error::InvalidInput(format!("stored id {id} is invalid: {e}")))
            })
            .collect()
    }

    fn mark_synced(&self, id: &MutationId, now: i64) -> Result<()> {
        let rows = self.conn.execute(
            "UPDATE mutations
             SET state = 'synced', last_error = NULL, synced_at = COALESCE(synced_at, ?1), updated_at = ?1
             WHERE id = ?2",
            params![now, id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    fn mark_failed(
        &self,
        id: &MutationId,
        message: &str,
        max_attempts: Option<u32>,
        now: i64,
    ) -> Result<PendingMutation> {
        let ceiling = max_attempts.unwrap_or(0);
        let rows = self.conn.execute(
            "UPDATE mutations
             SET attempts = attempts + 1,
                 last_error = ?1,
                 updated_at = ?2,
                 state = CASE WHEN ?3 > 0 AND attempts + 1 >= ?3 THEN 'failed' ELSE 'pending' END
             WHERE id = ?4 AND state = 'pending'",
            params![message, now, ceiling, id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("pending mutation {id}")));
        }

        self.get(id)?.ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn delete_synced_older_than(&self, cutoff: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "DELETE FROM mutations WHERE state = 'synced' AND synced_at < ?",
            params![cutoff],
        )?;
        Ok(rows)
    }

    fn discard(&self, id: &MutationId) -> Result<()> {
        let rows = self.conn.execute(
            "DELETE FROM mutations WHERE id = ? AND state != 'synced'",
            params![id.as_str()],
        )?;

        if rows == 0 {
            return Err(Error::NotFound(format!("unsynced mutation {id}")));
        }
        Ok(())
    }

    fn requeue_failed(&self, now: i64) -> Result<usize> {
        let rows = self.conn.execute(
            "UPDATE mutations SET state = 'pending', attempts = 0, updated_at = ?
             WHERE state = 'failed'",
            params![now],
        )?;
        Ok(rows)
    }

    fn count_by_state(&self) -> Result<StateCounts> {
        let mut stmt = self
            .conn
            .prepare("SELECT state, COUNT(*) FROM mutations GROUP BY state")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, usize>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let mut counts = StateCounts::default();
        for (state, count) in rows {
            match state.parse::<SyncState>()? {
                SyncState::Pending => counts.pending = count,
                SyncState::Synced => counts.synced = count,
                SyncState::Failed => counts.failed = count,
            }
        }
        Ok(counts)
    }
}
