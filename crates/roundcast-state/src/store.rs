//! StateStore — redb-backed round persistence.
//!
//! Rounds are JSON-serialized into redb's `&[u8]` value columns. A second
//! table keeps the newest round id per tenant so that the scheduler's
//! duplicate check is a point lookup rather than a scan. The store supports
//! both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe round store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent round store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "round store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory round store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory round store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(ROUNDS).map_err(map_err!(Table))?;
        txn.open_table(LATEST_ROUNDS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Writes ─────────────────────────────────────────────────────

    /// Persist a newly started round and return the stored record.
    ///
    /// The tenant's latest pointer moves to the new round in the same
    /// transaction unless an existing round starts later.
    pub fn insert_round(&self, new: &NewRound, created_at: u64) -> StateResult<RoundRecord> {
        let record = RoundRecord {
            id: RoundId::generate(),
            tenant_id: new.tenant_id,
            name: new.name.clone(),
            created_by: new.created_by,
            start_at: new.start_at,
            end_at: new.end_at,
            outcome_values: None,
            created_at,
        };
        let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut rounds = txn.open_table(ROUNDS).map_err(map_err!(Table))?;
            let mut latest = txn.open_table(LATEST_ROUNDS).map_err(map_err!(Table))?;

            let current: Option<String> = latest
                .get(record.tenant_id)
                .map_err(map_err!(Read))?
                .map(|guard| guard.value().to_string());
            let supersedes = match current {
                Some(current_id) => match rounds.get(current_id.as_str()).map_err(map_err!(Read))? {
                    Some(guard) => {
                        let existing: RoundRecord = serde_json::from_slice(guard.value())
                            .map_err(map_err!(Deserialize))?;
                        existing.start_at <= record.start_at
                    }
                    None => true,
                },
                None => true,
            };

            rounds
                .insert(record.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
            if supersedes {
                latest
                    .insert(record.tenant_id, record.id.as_str())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(round_id = %record.id, tenant_id = record.tenant_id, "round stored");
        Ok(record)
    }

    /// Overwrite the outcome column of an existing round.
    ///
    /// `Some(vec![])` is the cancellation sentinel.
    pub fn set_outcome(&self, id: &RoundId, outcome: Vec<u8>) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut rounds = txn.open_table(ROUNDS).map_err(map_err!(Table))?;
            let mut record: RoundRecord = match rounds.get(id.as_str()).map_err(map_err!(Read))? {
                Some(guard) => {
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?
                }
                None => return Err(StateError::NotFound(id.to_string())),
            };
            record.outcome_values = Some(outcome);
            let value = serde_json::to_vec(&record).map_err(map_err!(Serialize))?;
            rounds
                .insert(id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(round_id = %id, "round outcome stored");
        Ok(())
    }

    // ── Reads ──────────────────────────────────────────────────────

    /// The round with the greatest start time for a tenant.
    pub fn latest_round(&self, tenant_id: TenantId) -> StateResult<Option<RoundRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let latest = txn.open_table(LATEST_ROUNDS).map_err(map_err!(Table))?;
        let Some(id) = latest
            .get(tenant_id)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string())
        else {
            return Ok(None);
        };

        let rounds = txn.open_table(ROUNDS).map_err(map_err!(Table))?;
        match rounds.get(id.as_str()).map_err(map_err!(Read))? {
            Some(guard) => {
                let record: RoundRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(record))
            }
            None => Err(StateError::NotFound(id)),
        }
    }

    /// Every tenant with at least one stored round.
    pub fn list_tenants(&self) -> StateResult<Vec<TenantId>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(LATEST_ROUNDS).map_err(map_err!(Table))?;
        let mut tenants = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            tenants.push(key.value());
        }
        Ok(tenants)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_round(tenant_id: TenantId, start_at: u64) -> NewRound {
        NewRound {
            tenant_id,
            name: Some("Friday final".to_string()),
            created_by: 99,
            start_at,
            end_at: start_at + 25_000,
        }
    }

    // ── Insert / get ───────────────────────────────────────────────

    #[test]
    fn insert_and_read_back_round() {
        let store = StateStore::open_in_memory().unwrap();
        let record = store.insert_round(&new_round(1, 10_000), 8_500).unwrap();

        assert_eq!(record.tenant_id, 1);
        assert_eq!(record.created_at, 8_500);
        assert!(record.outcome_values.is_none());

        let retrieved = store.latest_round(1).unwrap();
        assert_eq!(retrieved, Some(record));
    }

    #[test]
    fn insert_assigns_distinct_ids() {
        let store = StateStore::open_in_memory().unwrap();
        let a = store.insert_round(&new_round(1, 10_000), 0).unwrap();
        let b = store.insert_round(&new_round(1, 40_000), 0).unwrap();
        assert_ne!(a.id, b.id);
    }

    // ── Latest pointer ─────────────────────────────────────────────

    #[test]
    fn latest_round_tracks_newest_start() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.latest_round(1).unwrap().is_none());

        store.insert_round(&new_round(1, 10_000), 0).unwrap();
        let newer = store.insert_round(&new_round(1, 60_000), 0).unwrap();

        assert_eq!(store.latest_round(1).unwrap().unwrap().id, newer.id);
    }

    #[test]
    fn latest_round_ignores_backdated_insert() {
        let store = StateStore::open_in_memory().unwrap();
        let newer = store.insert_round(&new_round(1, 60_000), 0).unwrap();
        store.insert_round(&new_round(1, 10_000), 0).unwrap();

        assert_eq!(store.latest_round(1).unwrap().unwrap().id, newer.id);
    }

    #[test]
    fn latest_round_is_per_tenant() {
        let store = StateStore::open_in_memory().unwrap();
        let a = store.insert_round(&new_round(1, 10_000), 0).unwrap();
        let b = store.insert_round(&new_round(2, 5_000), 0).unwrap();

        assert_eq!(store.latest_round(1).unwrap().unwrap().id, a.id);
        assert_eq!(store.latest_round(2).unwrap().unwrap().id, b.id);
        assert!(store.latest_round(3).unwrap().is_none());

        let mut tenants = store.list_tenants().unwrap();
        tenants.sort();
        assert_eq!(tenants, vec![1, 2]);
    }

    // ── Outcome updates ────────────────────────────────────────────

    #[test]
    fn set_outcome_finalizes_and_cancels() {
        let store = StateStore::open_in_memory().unwrap();
        let revealed = store.insert_round(&new_round(1, 10_000), 0).unwrap();
        let cancelled = store.insert_round(&new_round(2, 50_000), 0).unwrap();

        store.set_outcome(&revealed.id, vec![1, 2, 3, 4, 5, 6]).unwrap();
        store.set_outcome(&cancelled.id, vec![]).unwrap();

        let revealed = store.latest_round(1).unwrap().unwrap();
        assert_eq!(revealed.status(), RoundStatus::Revealed);
        assert_eq!(revealed.outcome_values, Some(vec![1, 2, 3, 4, 5, 6]));

        let cancelled = store.latest_round(2).unwrap().unwrap();
        assert_eq!(cancelled.status(), RoundStatus::Cancelled);
    }

    #[test]
    fn set_outcome_on_unknown_round_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store.set_outcome(&RoundId::new("ghost"), vec![]).unwrap_err();
        assert!(err.is_not_found());
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("rounds.redb");

        let id = {
            let store = StateStore::open(&db_path).unwrap();
            store.insert_round(&new_round(42, 10_000), 0).unwrap().id
        };

        let store = StateStore::open(&db_path).unwrap();
        let latest = store.latest_round(42).unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.name.as_deref(), Some("Friday final"));
    }

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.list_tenants().unwrap().is_empty());
        assert!(store.latest_round(1).unwrap().is_none());
    }
}
