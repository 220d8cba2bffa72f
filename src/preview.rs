//! Preview overlay state: hidden, or visible with the generated document.

use crate::blob::BlobHandle;

#[derive(Debug, Default)]
pub enum Preview {
    #[default]
    Hidden,
    Visible(BlobHandle),
}

impl Preview {
    pub fn is_visible(&self) -> bool {
        matches!(self, Preview::Visible(_))
    }

    /// URL shown in the embedded frame, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Preview::Visible(handle) => Some(handle.url()),
            Preview::Hidden => None,
        }
    }

    /// Show a new document; a previously shown one is released.
    pub fn show(&mut self, handle: BlobHandle) {
        *self = Preview::Visible(handle);
    }

    /// Hide the overlay and release its document. Returns whether it was
    /// visible.
    pub fn close(&mut self) -> bool {
        let was_visible = self.is_visible();
        *self = Preview::Hidden;
        was_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob::{Blob, BlobStore};

    #[test]
    fn show_then_close_releases_the_blob() {
        let store = BlobStore::new();
        let mut preview = Preview::default();
        assert!(!preview.is_visible());

        preview.show(store.create(Blob::pdf(vec![1, 2, 3])));
        assert!(preview.is_visible());
        assert_eq!(store.live_count(), 1);

        assert!(preview.close());
        assert_eq!(preview.url(), None);
        assert_eq!(store.live_count(), 0);
        assert!(!preview.close());
    }

    #[test]
    fn replacing_releases_the_previous_document() {
        let store = BlobStore::new();
        let mut preview = Preview::default();
        preview.show(store.create(Blob::pdf(vec![1])));
        let first = preview.url().map(str::to_string);
        preview.show(store.create(Blob::pdf(vec![2])));
        assert_eq!(store.live_count(), 1);
        assert_ne!(preview.url().map(str::to_string), first);
    }
}
