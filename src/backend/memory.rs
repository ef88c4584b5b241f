//! In-memory object store
//!
//! Behaves like an S3 bucket for the purposes of this crate: ordered keys,
//! store-assigned modification times, delimiter grouping and paginated
//! listings. Used by tests and for running without a bucket.

use super::{BackendError, BackendResult, ListPage, ObjectMeta, ObjectStore, Operation};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Bytes,
    last_modified: DateTime<Utc>,
}

/// In-memory store
pub struct MemStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    failing: Mutex<HashSet<Operation>>,
    page_size: usize,
}

impl MemStore {
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Store returning at most `page_size` entries per listing page
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            failing: Mutex::new(HashSet::new()),
            page_size: page_size.max(1),
        }
    }

    /// Overwrite the store-assigned modification time of an object.
    /// Returns false if the object does not exist.
    pub fn set_last_modified(&self, key: &str, at: DateTime<Utc>) -> bool {
        match self.objects().get_mut(key) {
            Some(obj) => {
                obj.last_modified = at;
                true
            }
            None => false,
        }
    }

    /// Make every subsequent `op` fail with a service error
    pub fn fail_operation(&self, op: Operation) {
        self.failing().insert(op);
    }

    /// Undo [`MemStore::fail_operation`]
    pub fn restore_operation(&self, op: Operation) {
        self.failing().remove(&op);
    }

    /// Raw stored bytes, bypassing any codec
    pub fn raw(&self, key: &str) -> Option<Bytes> {
        self.objects().get(key).map(|obj| obj.body.clone())
    }

    pub fn len(&self) -> usize {
        self.objects().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects().is_empty()
    }

    fn objects(&self) -> MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failing(&self) -> MutexGuard<'_, HashSet<Operation>> {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, op: Operation, key: &str) -> BackendResult<()> {
        if self.failing().contains(&op) {
            return Err(BackendError::service(op, key, "injected failure"));
        }
        Ok(())
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemStore {
    async fn put(&self, key: &str, body: Bytes, content_length: u64) -> BackendResult<()> {
        self.check(Operation::Put, key)?;
        if body.len() as u64 != content_length {
            return Err(BackendError::service(
                Operation::Put,
                key,
                format!(
                    "declared length {} does not match body length {}",
                    content_length,
                    body.len()
                ),
            ));
        }
        self.objects().insert(
            key.to_string(),
            StoredObject {
                body,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> BackendResult<Bytes> {
        self.check(Operation::Get, key)?;
        self.objects()
            .get(key)
            .map(|obj| obj.body.clone())
            .ok_or_else(|| BackendError::not_found(key))
    }

    async fn head(&self, key: &str) -> BackendResult<ObjectMeta> {
        self.check(Operation::Head, key)?;
        self.objects()
            .get(key)
            .map(|obj| ObjectMeta {
                key: key.to_string(),
                size: obj.body.len() as u64,
                last_modified: Some(obj.last_modified),
            })
            .ok_or_else(|| BackendError::not_found(key))
    }

    async fn delete(&self, key: &str) -> BackendResult<()> {
        self.check(Operation::Delete, key)?;
        self.objects()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BackendError::not_found(key))
    }

    async fn list_page(
        &self,
        prefix: &str,
        delimiter: Option<&str>,
        token: Option<String>,
    ) -> BackendResult<ListPage> {
        self.check(Operation::List, prefix)?;

        // Objects and grouped prefixes share one ordered sequence, like S3.
        let mut entries: Vec<(String, bool)> = Vec::new();
        for key in self.objects().keys().filter(|k| k.starts_with(prefix)) {
            let grouped = delimiter.and_then(|d| {
                key[prefix.len()..]
                    .find(d)
                    .map(|pos| key[..prefix.len() + pos + d.len()].to_string())
            });
            match grouped {
                Some(group) => {
                    if entries.last().map(|(e, _)| e != &group).unwrap_or(true) {
                        entries.push((group, true));
                    }
                }
                None => entries.push((key.clone(), false)),
            }
        }
        entries.sort();
        entries.dedup();

        let remaining: Vec<(String, bool)> = match token {
            Some(after) => entries.into_iter().filter(|(e, _)| *e > after).collect(),
            None => entries,
        };

        let mut page = ListPage::default();
        for (entry, grouped) in remaining.iter().take(self.page_size) {
            if *grouped {
                page.common_prefixes.push(entry.clone());
            } else {
                page.objects.push(entry.clone());
            }
        }
        if remaining.len() > self.page_size {
            page.next_token = remaining
                .get(self.page_size - 1)
                .map(|(entry, _)| entry.clone());
        }
        Ok(page)
    }

    fn describe(&self, key: &str) -> String {
        format!("mem://{}", key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed(store: &MemStore, keys: &[&str]) {
        for key in keys {
            let body = Bytes::from(key.to_string());
            let len = body.len() as u64;
            store.put(key, body, len).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_memstore_put_get_delete() {
        let store = MemStore::new();
        store.put("k", Bytes::from_static(b"v"), 1).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Bytes::from_static(b"v"));

        let meta = store.head("k").await.unwrap();
        assert_eq!(meta.size, 1);
        assert!(meta.last_modified.is_some());

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap_err().is_not_found());
        assert!(store.head("k").await.unwrap_err().is_not_found());
        assert!(store.delete("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_memstore_rejects_length_mismatch() {
        let store = MemStore::new();
        let err = store.put("k", Bytes::from_static(b"abc"), 2).await.unwrap_err();
        assert!(!err.is_not_found());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_memstore_delimiter_grouping() {
        let store = MemStore::new();
        seed(&store, &["p/a/x", "p/a/y", "p/a/b/z", "p/a/b/w", "p/c"]).await;

        let page = store.list_page("p/a/", Some("/"), None).await.unwrap();
        assert_eq!(page.objects, vec!["p/a/x", "p/a/y"]);
        assert_eq!(page.common_prefixes, vec!["p/a/b/"]);
        assert!(page.next_token.is_none());

        let page = store.list_page("p/a/", None, None).await.unwrap();
        assert_eq!(page.objects, vec!["p/a/b/w", "p/a/b/z", "p/a/x", "p/a/y"]);
        assert!(page.common_prefixes.is_empty());
    }

    #[tokio::test]
    async fn test_memstore_pagination() {
        let store = MemStore::with_page_size(2);
        seed(&store, &["a", "b", "c", "d", "e"]).await;

        let mut seen = Vec::new();
        let mut token = None;
        let mut pages = 0;
        loop {
            let page = store.list_page("", None, token).await.unwrap();
            pages += 1;
            seen.extend(page.objects);
            token = page.next_token;
            if token.is_none() {
                break;
            }
        }
        assert_eq!(seen, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(pages, 3);
    }

    #[tokio::test]
    async fn test_memstore_fault_injection() {
        let store = MemStore::new();
        store.fail_operation(Operation::Put);
        let err = store.put("k", Bytes::new(), 0).await.unwrap_err();
        assert!(matches!(err, BackendError::Service { op: Operation::Put, .. }));

        store.restore_operation(Operation::Put);
        store.put("k", Bytes::new(), 0).await.unwrap();
    }

    #[tokio::test]
    async fn test_memstore_backdate() {
        let store = MemStore::new();
        seed(&store, &["k"]).await;
        let past = Utc::now() - chrono::Duration::hours(1);
        assert!(store.set_last_modified("k", past));
        assert_eq!(store.head("k").await.unwrap().last_modified, Some(past));
        assert!(!store.set_last_modified("missing", past));
    }
}
