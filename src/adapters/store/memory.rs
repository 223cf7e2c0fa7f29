use super::{CreateOutcome, RecordStore, StoreResult};
use crate::domain::share::{ShareCode, ShareRecord};
use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use time::OffsetDateTime;

/// Process-local store. Only coherent within a single server process.
#[derive(Debug, Clone, Default)]
pub struct MemoryShareStore {
    records: Arc<DashMap<ShareCode, ShareRecord>>,
}

impl MemoryShareStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryShareStore {
    async fn create_if_absent(&self, record: &ShareRecord) -> StoreResult<CreateOutcome> {
        match self.records.entry(record.code.clone()) {
            Entry::Occupied(_) => Ok(CreateOutcome::Conflict),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(CreateOutcome::Created)
            }
        }
    }

    async fn get(&self, code: &ShareCode) -> StoreResult<Option<ShareRecord>> {
        Ok(self.records.get(code).map(|r| r.value().clone()))
    }

    async fn exists(&self, code: &ShareCode) -> StoreResult<bool> {
        Ok(self.records.contains_key(code))
    }

    async fn set_expiration(
        &self,
        code: &ShareCode,
        expires_at: OffsetDateTime,
        now: OffsetDateTime,
    ) -> StoreResult<bool> {
        // The shard lock is held from the liveness check through the write.
        let Some(mut stored) = self.records.get_mut(code) else {
            return Ok(false);
        };
        if !stored.is_live_at(now) {
            return Ok(false);
        }
        stored.expires_at = expires_at;
        Ok(true)
    }

    async fn delete(&self, code: &ShareCode) -> StoreResult<()> {
        self.records.remove(code);
        Ok(())
    }

    async fn purge_expired(&self, cutoff: OffsetDateTime, limit: usize) -> StoreResult<u64> {
        let doomed: Vec<ShareCode> = self
            .records
            .iter()
            .filter(|r| r.expires_at < cutoff)
            .take(limit)
            .map(|r| r.key().clone())
            .collect();

        let mut removed = 0;
        for code in doomed {
            // Re-check: the record may have been extended since the scan.
            if self.records.remove_if(&code, |_, r| r.expires_at < cutoff).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn record(code: &str, expires_at: OffsetDateTime) -> ShareRecord {
        ShareRecord {
            code: ShareCode::parse(code).unwrap(),
            filename: format!("{code}.bin"),
            file_url: format!("https://files.example/{code}"),
            created_at: OffsetDateTime::UNIX_EPOCH,
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_create_if_absent_rejects_duplicates() {
        let store = MemoryShareStore::new();
        let first = record("AAAAA", OffsetDateTime::UNIX_EPOCH + Duration::hours(1));
        let mut second = first.clone();
        second.filename = "other.bin".into();

        assert_eq!(store.create_if_absent(&first).await.unwrap(), CreateOutcome::Created);
        assert_eq!(store.create_if_absent(&second).await.unwrap(), CreateOutcome::Conflict);

        let stored = store.get(&first.code).await.unwrap().unwrap();
        assert_eq!(stored.filename, "AAAAA.bin");
    }

    #[tokio::test]
    async fn test_set_expiration_rewrites_only_expiry() {
        let store = MemoryShareStore::new();
        let original = record("BBBBB", OffsetDateTime::UNIX_EPOCH + Duration::hours(1));
        store.create_if_absent(&original).await.unwrap();

        let extended = OffsetDateTime::UNIX_EPOCH + Duration::days(7);
        assert!(store.set_expiration(&original.code, extended, OffsetDateTime::UNIX_EPOCH).await.unwrap());

        let stored = store.get(&original.code).await.unwrap().unwrap();
        assert_eq!(stored.filename, original.filename);
        assert_eq!(stored.created_at, original.created_at);
        assert_eq!(stored.expires_at, extended);
    }

    #[tokio::test]
    async fn test_set_expiration_skips_absent_and_expired_records() {
        let store = MemoryShareStore::new();
        let base = OffsetDateTime::UNIX_EPOCH;
        let extended = base + Duration::days(7);

        let absent = ShareCode::parse("GONE1").unwrap();
        assert!(!store.set_expiration(&absent, extended, base).await.unwrap());
        assert!(store.is_empty());

        let stale = record("STALE", base + Duration::hours(1));
        store.create_if_absent(&stale).await.unwrap();
        let later = base + Duration::hours(2);
        assert!(!store.set_expiration(&stale.code, extended, later).await.unwrap());
        assert_eq!(store.get(&stale.code).await.unwrap().unwrap().expires_at, stale.expires_at);
    }

    #[tokio::test]
    async fn test_purge_expired_respects_cutoff_and_limit() {
        let store = MemoryShareStore::new();
        let base = OffsetDateTime::UNIX_EPOCH;
        for code in ["OLD01", "OLD02", "OLD03"] {
            store.create_if_absent(&record(code, base + Duration::hours(1))).await.unwrap();
        }
        store.create_if_absent(&record("NEW01", base + Duration::days(2))).await.unwrap();

        let cutoff = base + Duration::days(1);
        assert_eq!(store.purge_expired(cutoff, 2).await.unwrap(), 2);
        assert_eq!(store.purge_expired(cutoff, 10).await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert!(store.exists(&ShareCode::parse("NEW01").unwrap()).await.unwrap());
    }
}
