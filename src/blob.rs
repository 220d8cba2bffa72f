//! In-memory blob store handing out `blob:` URLs.
//!
//! A [`BlobHandle`] owns its URL: dropping the handle revokes it, so a
//! preview that is closed (or replaced, or torn down with its component)
//! releases the generated document.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};

pub const PDF_MIME: &str = "application/pdf";

/// Binary content with its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Arc<[u8]>,
    pub mime: String,
}

impl Blob {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime: &str) -> Self {
        Self {
            bytes: bytes.into(),
            mime: mime.to_string(),
        }
    }

    pub fn pdf(bytes: Vec<u8>) -> Self {
        Self::new(bytes, PDF_MIME)
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl fmt::Debug for Blob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blob")
            .field("mime", &self.mime)
            .field("len", &self.bytes.len())
            .finish()
    }
}

#[derive(Default)]
struct Inner {
    next_id: AtomicU64,
    blobs: Mutex<HashMap<String, Blob>>,
}

/// Shared registry of live blob URLs. Cloning shares the registry.
#[derive(Clone, Default)]
pub struct BlobStore {
    inner: Arc<Inner>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn blobs(&self) -> MutexGuard<'_, HashMap<String, Blob>> {
        self.inner
            .blobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register `blob` and return a handle owning its URL.
    pub fn create(&self, blob: Blob) -> BlobHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let url = format!("blob:pdf-pager/{id}");
        self.blobs().insert(url.clone(), blob);
        log::debug!("created {url}");
        BlobHandle {
            url,
            store: self.clone(),
        }
    }

    /// Read a blob back by URL.
    pub fn fetch(&self, url: &str) -> Result<Blob> {
        self.blobs()
            .get(url)
            .cloned()
            .ok_or_else(|| Error::BlobNotFound(url.to_string()))
    }

    /// Release a URL. Unknown URLs are ignored.
    pub fn revoke(&self, url: &str) -> bool {
        let removed = self.blobs().remove(url).is_some();
        if removed {
            log::debug!("revoked {url}");
        }
        removed
    }

    /// Number of URLs currently alive.
    pub fn live_count(&self) -> usize {
        self.blobs().len()
    }
}

impl fmt::Debug for BlobStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlobStore")
            .field("live", &self.live_count())
            .finish()
    }
}

/// Owning reference to a `blob:` URL; revokes it on drop.
pub struct BlobHandle {
    url: String,
    store: BlobStore,
}

impl BlobHandle {
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn fetch(&self) -> Result<Blob> {
        self.store.fetch(&self.url)
    }
}

impl Drop for BlobHandle {
    fn drop(&mut self) {
        self.store.revoke(&self.url);
    }
}

impl fmt::Debug for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BlobHandle").field(&self.url).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_drop_revokes_url() {
        let store = BlobStore::new();
        let handle = store.create(Blob::pdf(b"%PDF-1.7".to_vec()));
        let url = handle.url().to_string();
        assert_eq!(store.fetch(&url).expect("live").len(), 8);
        drop(handle);
        assert!(matches!(store.fetch(&url), Err(Error::BlobNotFound(_))));
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn urls_are_unique() {
        let store = BlobStore::new();
        let a = store.create(Blob::pdf(vec![1]));
        let b = store.create(Blob::pdf(vec![2]));
        assert_ne!(a.url(), b.url());
        assert_eq!(b.fetch().expect("b").bytes.as_ref(), &[2]);
    }

    #[test]
    fn revoking_unknown_url_is_harmless() {
        assert!(!BlobStore::new().revoke("blob:pdf-pager/404"));
    }
}
