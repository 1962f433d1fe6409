use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use jiff::Timestamp;
use portal_core::repository::{ReadRepository, Repository, Result};
use portal_core::{ShortCode, ShortLink, StorageError};
use tracing::trace;

/// In-memory implementation of the repository traits using DashMap.
///
/// DashMap provides better concurrency than RwLock<HashMap> because it
/// uses sharded locks, allowing concurrent reads and writes to different
/// buckets without blocking. Inserts go through the entry API so the
/// uniqueness check and the write happen under the same shard lock.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    storage: DashMap<ShortCode, ShortLink>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: DashMap::with_capacity(capacity),
        }
    }

    /// Number of stored links, soft-deleted ones included.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn find(&self, code: &ShortCode) -> Result<Option<ShortLink>> {
        Ok(self.storage.get(code).map(|entry| entry.value().clone()))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.contains_key(code))
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn insert(&self, link: &ShortLink) -> Result<()> {
        match self.storage.entry(link.code.clone()) {
            Entry::Occupied(_) => Err(StorageError::Conflict(link.code.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(link.clone());
                trace!(code = %link.code, "inserted link");
                Ok(())
            }
        }
    }

    async fn mark_deleted(&self, code: &ShortCode, at: Timestamp) -> Result<bool> {
        let Some(mut entry) = self.storage.get_mut(code) else {
            return Ok(false);
        };

        if entry.deleted_at.is_some() {
            return Ok(false);
        }

        entry.deleted_at = Some(at);
        Ok(true)
    }

    async fn increment_hits(&self, code: &ShortCode, by: u64) -> Result<()> {
        if let Some(mut entry) = self.storage.get_mut(code) {
            entry.hit_count = entry.hit_count.saturating_add(by);
        }
        Ok(())
    }

    async fn sweep_expired(&self, now: Timestamp, limit: usize) -> Result<Vec<ShortCode>> {
        let mut swept = Vec::new();

        for mut entry in self.storage.iter_mut() {
            if swept.len() >= limit {
                break;
            }
            if entry.deleted_at.is_none() && entry.is_expired(now) {
                entry.deleted_at = Some(now);
                swept.push(entry.key().clone());
            }
        }

        Ok(swept)
    }

    async fn purge_deleted(&self, before: Timestamp) -> Result<u64> {
        let size_before = self.storage.len();
        self.storage
            .retain(|_, link| link.deleted_at.is_none_or(|deleted_at| deleted_at >= before));
        Ok((size_before - self.storage.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::SignedDuration;
    use std::sync::Arc;

    fn code(s: &str) -> ShortCode {
        ShortCode::new_unchecked(s)
    }

    fn link(c: &str, url: &str, expires_at: Option<Timestamp>) -> ShortLink {
        let created_at = Timestamp::now() - SignedDuration::from_hours(1);
        ShortLink::new(code(c), url, created_at, expires_at).unwrap()
    }

    #[tokio::test]
    async fn insert_and_find() {
        let repo = InMemoryRepository::new();

        repo.insert(&link("abc123", "https://example.com", None))
            .await
            .unwrap();

        let result = repo.find(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(result.long_url, "https://example.com");
        assert_eq!(result.expires_at, None);
        assert_eq!(result.hit_count, 0);
    }

    #[tokio::test]
    async fn find_nonexistent() {
        let repo = InMemoryRepository::new();
        assert!(repo.find(&code("nope00")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn insert_conflict() {
        let repo = InMemoryRepository::new();

        repo.insert(&link("abc123", "https://example.com", None))
            .await
            .unwrap();

        let err = repo
            .insert(&link("abc123", "https://other.com", None))
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Conflict(_)));
        let kept = repo.find(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(kept.long_url, "https://example.com");
    }

    #[tokio::test]
    async fn soft_deleted_codes_are_never_reissued() {
        let repo = InMemoryRepository::new();
        repo.insert(&link("abc123", "https://old.com", None))
            .await
            .unwrap();

        assert!(repo
            .mark_deleted(&code("abc123"), Timestamp::now())
            .await
            .unwrap());
        assert!(repo.exists(&code("abc123")).await.unwrap());

        let err = repo
            .insert(&link("abc123", "https://new.com", None))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict(_)));

        let found = repo.find(&code("abc123")).await.unwrap().unwrap();
        assert!(found.is_deleted());
    }

    #[tokio::test]
    async fn mark_deleted_only_once() {
        let repo = InMemoryRepository::new();
        repo.insert(&link("abc123", "https://example.com", None))
            .await
            .unwrap();

        let now = Timestamp::now();
        assert!(repo.mark_deleted(&code("abc123"), now).await.unwrap());
        assert!(!repo.mark_deleted(&code("abc123"), now).await.unwrap());
        assert!(!repo.mark_deleted(&code("zzz999"), now).await.unwrap());
    }

    #[tokio::test]
    async fn increment_hits_accumulates() {
        let repo = InMemoryRepository::new();
        repo.insert(&link("abc123", "https://example.com", None))
            .await
            .unwrap();

        repo.increment_hits(&code("abc123"), 2).await.unwrap();
        repo.increment_hits(&code("abc123"), 3).await.unwrap();
        repo.increment_hits(&code("nope00"), 3).await.unwrap();

        let found = repo.find(&code("abc123")).await.unwrap().unwrap();
        assert_eq!(found.hit_count, 5);
    }

    #[tokio::test]
    async fn sweep_marks_only_due_links() {
        let repo = InMemoryRepository::new();
        let now = Timestamp::now();
        let past = now - SignedDuration::from_secs(5);
        let future = now + SignedDuration::from_hours(1);

        repo.insert(&link("due001", "https://a.com", Some(past)))
            .await
            .unwrap();
        repo.insert(&link("due002", "https://b.com", Some(past)))
            .await
            .unwrap();
        repo.insert(&link("live01", "https://c.com", Some(future)))
            .await
            .unwrap();
        repo.insert(&link("never1", "https://d.com", None))
            .await
            .unwrap();

        let mut swept = repo.sweep_expired(now, 10).await.unwrap();
        swept.sort();
        assert_eq!(swept, vec![code("due001"), code("due002")]);

        // Already swept links are not reported twice.
        assert!(repo.sweep_expired(now, 10).await.unwrap().is_empty());
        assert!(!repo.find(&code("live01")).await.unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn sweep_honours_limit() {
        let repo = InMemoryRepository::new();
        let now = Timestamp::now();
        let past = now - SignedDuration::from_secs(5);

        for i in 0..5 {
            repo.insert(&link(&format!("due00{i}"), "https://a.com", Some(past)))
                .await
                .unwrap();
        }

        assert_eq!(repo.sweep_expired(now, 2).await.unwrap().len(), 2);
        assert_eq!(repo.sweep_expired(now, 10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn purge_removes_old_deleted_rows() {
        let repo = InMemoryRepository::new();
        let now = Timestamp::now();

        repo.insert(&link("old001", "https://a.com", None))
            .await
            .unwrap();
        repo.insert(&link("new001", "https://b.com", None))
            .await
            .unwrap();
        repo.insert(&link("live01", "https://c.com", None))
            .await
            .unwrap();

        repo.mark_deleted(&code("old001"), now - SignedDuration::from_hours(48))
            .await
            .unwrap();
        repo.mark_deleted(&code("new001"), now).await.unwrap();

        let purged = repo
            .purge_deleted(now - SignedDuration::from_hours(24))
            .await
            .unwrap();

        assert_eq!(purged, 1);
        assert!(!repo.exists(&code("old001")).await.unwrap());
        assert!(repo.exists(&code("new001")).await.unwrap());
        assert!(repo.exists(&code("live01")).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_inserts_of_same_code_have_one_winner() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..16 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.insert(&link("race01", &format!("https://example{i}.com"), None))
                    .await
            }));
        }

        let mut wins = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(()) => wins += 1,
                Err(StorageError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!(wins, 1);
        assert_eq!(repo.len(), 1);
    }
}
