//! Snapshot cache
//!
//! Authoritative on every read path. Two key shapes share one cache:
//!
//! - `flag:{project}:{flag_key}:{env_key}` -> one self-contained snapshot
//! - `flags:{project}:{env_key}` -> the bootstrap list of active snapshots
//!
//! Entries live for a soft TTL (60 s by default); explicit invalidation is
//! best-effort and the TTL is the safety net. Concurrent missers may both
//! load and both write — snapshots are idempotent, so no single-flight is
//! needed for correctness.

use std::sync::Arc;
use std::time::Duration;

use banner_core::FlagSnapshot;
use moka::sync::Cache;
use sea_orm::DatabaseConnection;
use tracing::debug;
use uuid::Uuid;

use banner_persistence::service::snapshot;

#[derive(Clone)]
enum CacheEntry {
    Flag(Arc<FlagSnapshot>),
    Bootstrap(Arc<Vec<FlagSnapshot>>),
}

pub struct SnapshotCache {
    entries: Cache<String, CacheEntry>,
}

impl SnapshotCache {
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    fn flag_cache_key(project_id: Uuid, flag_key: &str, environment_key: &str) -> String {
        format!("flag:{}:{}:{}", project_id.simple(), flag_key, environment_key)
    }

    fn bootstrap_cache_key(project_id: Uuid, environment_key: &str) -> String {
        format!("flags:{}:{}", project_id.simple(), environment_key)
    }

    /// Resolve one flag snapshot, loading from the store on miss.
    ///
    /// `Ok(None)` when the flag or environment does not exist; misses on
    /// nonexistent flags are not negatively cached.
    pub async fn flag_snapshot(
        &self,
        db: &DatabaseConnection,
        project_id: Uuid,
        flag_key: &str,
        environment_key: &str,
    ) -> anyhow::Result<Option<Arc<FlagSnapshot>>> {
        let cache_key = Self::flag_cache_key(project_id, flag_key, environment_key);

        if let Some(CacheEntry::Flag(snapshot)) = self.entries.get(&cache_key) {
            return Ok(Some(snapshot));
        }

        let Some(loaded) =
            snapshot::load_flag_snapshot(db, project_id, flag_key, environment_key).await?
        else {
            return Ok(None);
        };

        let snapshot = Arc::new(loaded);
        self.entries
            .insert(cache_key, CacheEntry::Flag(snapshot.clone()));
        Ok(Some(snapshot))
    }

    /// Resolve the bootstrap snapshot list for a project-environment,
    /// loading from the store on miss. `Ok(None)` when the environment
    /// does not exist.
    pub async fn environment_snapshots(
        &self,
        db: &DatabaseConnection,
        project_id: Uuid,
        environment_key: &str,
    ) -> anyhow::Result<Option<Arc<Vec<FlagSnapshot>>>> {
        let cache_key = Self::bootstrap_cache_key(project_id, environment_key);

        if let Some(CacheEntry::Bootstrap(snapshots)) = self.entries.get(&cache_key) {
            return Ok(Some(snapshots));
        }

        let Some(loaded) =
            snapshot::load_environment_snapshots(db, project_id, environment_key).await?
        else {
            return Ok(None);
        };

        let snapshots = Arc::new(loaded);
        self.entries
            .insert(cache_key, CacheEntry::Bootstrap(snapshots.clone()));
        Ok(Some(snapshots))
    }

    /// Drop the snapshot of one (project, flag, env) and the project-env
    /// bootstrap list it appears in.
    pub fn invalidate(&self, project_id: Uuid, flag_key: &str, environment_key: &str) {
        debug!(%project_id, flag_key, environment_key, "invalidating snapshot");
        self.entries
            .invalidate(&Self::flag_cache_key(project_id, flag_key, environment_key));
        self.entries
            .invalidate(&Self::bootstrap_cache_key(project_id, environment_key));
    }

    /// Number of live entries; sync-flushed first so tests observe writes.
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }
}
