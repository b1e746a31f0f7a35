use std::sync::Arc;

use crate::relay::RelayStrategy;
use crate::BlobResult;

/// Caller-owned handle to a browser-resident blob.
///
/// Immutable after creation. The handle keeps a plain association to the
/// relay strategy that created it, used only to route `save_as_file` and
/// `dispose` calls; the strategy does not own handles.
///
/// Disposal is not double-dispose guarded: a second `dispose` issues a
/// second delete, which the boundary endpoint treats as a no-op for an
/// unknown reference.
pub struct Blob {
    url: String,
    media_type: String,
    relay: Arc<RelayStrategy>,
}

impl Blob {
    pub(crate) fn new(url: String, media_type: String, relay: Arc<RelayStrategy>) -> Self {
        Self {
            url,
            media_type,
            relay,
        }
    }

    /// Dereferenceable object URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// MIME type supplied at creation
    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    /// Trigger a user-visible download of this blob under `filename`
    pub async fn save_as_file(&self, filename: &str) -> BlobResult<()> {
        self.relay.save_as_file(&self.url, filename).await
    }

    /// Release the boundary-side blob and invalidate the URL
    pub async fn dispose(&self) -> BlobResult<()> {
        self.relay.delete_blob(&self.url).await
    }
}

impl std::fmt::Debug for Blob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Blob")
            .field("url", &self.url)
            .field("media_type", &self.media_type)
            .finish()
    }
}
