//! Process-shared cache for the list-membership snapshot.
//!
//! List metadata changes rarely but is read on every membership export and
//! access-control check, so the snapshot is kept in a small embedded
//! database. Invalidation is synchronous: every list create/update/delete
//! removes the entry before the mutation reports success, so no reader can
//! observe stale membership data.

use std::path::Path;

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::models::ListInfo;

const LIST_INFO_KEY: &[u8] = b"list_info";

#[derive(Serialize, Deserialize)]
struct CacheEntry {
    lists: Vec<ListInfo>,
    cached_at: NaiveDateTime,
}

/// Persistent cache holding the list-info snapshot
pub struct ListInfoCache {
    db: sled::Db,
}

impl ListInfoCache {
    /// Open (or create) the cache under the given directory
    pub fn open(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)?;
        let db = sled::open(cache_dir)?;
        Ok(Self { db })
    }

    /// The cached snapshot, if present
    pub fn get(&self) -> Result<Option<Vec<ListInfo>>> {
        if let Some(data) = self.db.get(LIST_INFO_KEY)? {
            let entry: CacheEntry = bincode::deserialize(&data)?;
            Ok(Some(entry.lists))
        } else {
            Ok(None)
        }
    }

    /// Store a fresh snapshot
    pub fn put(&self, lists: &[ListInfo]) -> Result<()> {
        let entry = CacheEntry {
            lists: lists.to_vec(),
            cached_at: Utc::now().naive_utc(),
        };
        let data = bincode::serialize(&entry)?;
        self.db.insert(LIST_INFO_KEY, data)?;
        self.db.flush()?;
        Ok(())
    }

    /// Drop the cached snapshot. Flushes before returning so the
    /// invalidation is durable when the caller reports success.
    pub fn invalidate(&self) -> Result<()> {
        self.db.remove(LIST_INFO_KEY)?;
        self.db.flush()?;
        debug!("list info cache invalidated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_cache_roundtrip_and_invalidation() {
        let dir = TempDir::new().expect("temp dir");
        let cache = ListInfoCache::open(dir.path()).expect("open cache");

        assert!(cache.get().expect("get").is_none());

        let lists = vec![ListInfo {
            name: "eng".to_string(),
            members: vec!["alice".to_string()],
        }];
        cache.put(&lists).expect("put");
        assert_eq!(cache.get().expect("get"), Some(lists));

        cache.invalidate().expect("invalidate");
        assert!(cache.get().expect("get").is_none());
    }
}
