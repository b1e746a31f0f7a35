use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use bytes::{Bytes, BytesMut};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

use crate::{BlobError, BlobResult, BufferId};

/// Boundary-side relay endpoint.
///
/// This is the contract of the code running inside the browser execution
/// context, reached over an opaque asynchronous request/response channel.
/// Slices appended under a buffer id are concatenated, in append order, into
/// one blob when the buffer is materialized; no length field crosses the
/// boundary.
///
/// Endpoints must treat deletion of an unknown blob reference as a no-op:
/// handle disposal is not double-dispose guarded on the caller side.
#[async_trait]
pub trait BlobEndpoint: Send + Sync {
    /// Liveness check; must return promptly
    async fn ping(&self) -> BlobResult<bool>;

    /// Allocate an empty slice list keyed by `id`
    async fn create_buffer(&self, id: BufferId) -> BlobResult<()>;

    /// Append `slice[..len]` to the buffer keyed by `id`.
    ///
    /// Implementations must tolerate `slice.len() != len` by truncating.
    async fn add_to_buffer(&self, id: BufferId, slice: &[u8], len: usize) -> BlobResult<()>;

    /// Decode a base64 slice, then behave as [`add_to_buffer`].
    ///
    /// Compatibility path for channels that cannot carry raw binary.
    ///
    /// [`add_to_buffer`]: BlobEndpoint::add_to_buffer
    async fn add_to_buffer_b64(&self, id: BufferId, slice_b64: &str, len: usize)
        -> BlobResult<()>;

    /// Discard the slice list keyed by `id`
    async fn delete_buffer(&self, id: BufferId) -> BlobResult<()>;

    /// Concatenate the buffer's slices into one blob of the given MIME type
    /// and return a dereferenceable object URL
    async fn create_blob(&self, id: BufferId, media_type: &str) -> BlobResult<String>;

    /// Release the blob behind `url` and invalidate the locator.
    ///
    /// Unknown references are a no-op.
    async fn delete_blob(&self, url: &str) -> BlobResult<()>;

    /// Trigger a user-visible download of `url` under `filename`
    async fn save_as_file(&self, url: &str, filename: &str) -> BlobResult<()>;

    /// Toggle verbose endpoint-side logging
    async fn set_verbose_logs(&self, enabled: bool) -> BlobResult<()>;
}

/// A blob held by [`MemoryBlobEndpoint`]
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub media_type: String,
    pub content: Bytes,
}

/// A download request recorded by [`MemoryBlobEndpoint`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedFile {
    pub url: String,
    pub filename: String,
}

/// In-process reference implementation of the boundary contract.
///
/// Stands in for the browser-side module when the bridge is co-located, and
/// doubles as the recording endpoint in tests: buffers, materialized blobs,
/// download requests, and blob deletions are all inspectable.
pub struct MemoryBlobEndpoint {
    buffers: RwLock<HashMap<BufferId, Vec<Bytes>>>,
    blobs: RwLock<HashMap<String, StoredBlob>>,
    downloads: Mutex<Vec<SavedFile>>,
    deletions: Mutex<Vec<String>>,
    verbose: Mutex<bool>,
}

impl MemoryBlobEndpoint {
    pub fn new() -> Self {
        Self {
            buffers: RwLock::new(HashMap::new()),
            blobs: RwLock::new(HashMap::new()),
            downloads: Mutex::new(Vec::new()),
            deletions: Mutex::new(Vec::new()),
            verbose: Mutex::new(false),
        }
    }

    /// Sizes of the slices currently held for `id`, in append order
    pub fn slice_sizes(&self, id: BufferId) -> Option<Vec<usize>> {
        self.buffers
            .read()
            .get(&id)
            .map(|slices| slices.iter().map(|s| s.len()).collect())
    }

    /// Number of live (not yet deleted) buffers
    pub fn buffer_count(&self) -> usize {
        self.buffers.read().len()
    }

    /// Look up a materialized blob by its object URL
    pub fn blob(&self, url: &str) -> Option<StoredBlob> {
        self.blobs.read().get(url).cloned()
    }

    /// Download requests recorded by `save_as_file`, in call order
    pub fn saved_files(&self) -> Vec<SavedFile> {
        self.downloads.lock().clone()
    }

    /// Every URL `delete_blob` has been called with, in call order
    pub fn deleted_blobs(&self) -> Vec<String> {
        self.deletions.lock().clone()
    }

    fn log(&self, message: &str) {
        if *self.verbose.lock() {
            debug!(target: "blob_relay::endpoint", "{message}");
        }
    }
}

impl Default for MemoryBlobEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobEndpoint for MemoryBlobEndpoint {
    async fn ping(&self) -> BlobResult<bool> {
        self.log("ping");
        Ok(true)
    }

    async fn create_buffer(&self, id: BufferId) -> BlobResult<()> {
        self.log(&format!("create buffer: {id}"));
        self.buffers.write().insert(id, Vec::new());
        Ok(())
    }

    async fn add_to_buffer(&self, id: BufferId, slice: &[u8], len: usize) -> BlobResult<()> {
        self.log(&format!("add slice to buffer: {} {}", slice.len(), len));

        let mut buffers = self.buffers.write();
        let slices = buffers
            .get_mut(&id)
            .ok_or_else(|| BlobError::buffer_not_found(id))?;

        let len = len.min(slice.len());
        slices.push(Bytes::copy_from_slice(&slice[..len]));
        Ok(())
    }

    async fn add_to_buffer_b64(
        &self,
        id: BufferId,
        slice_b64: &str,
        len: usize,
    ) -> BlobResult<()> {
        let decoded = general_purpose::STANDARD
            .decode(slice_b64)
            .map_err(|e| BlobError::invalid(format!("invalid base64 slice: {e}")))?;

        self.add_to_buffer(id, &decoded, len).await
    }

    async fn delete_buffer(&self, id: BufferId) -> BlobResult<()> {
        self.log(&format!("delete buffer: {id}"));
        self.buffers.write().remove(&id);
        Ok(())
    }

    async fn create_blob(&self, id: BufferId, media_type: &str) -> BlobResult<String> {
        self.log(&format!("create blob from buffer id: {id}"));

        let buffers = self.buffers.read();
        let slices = buffers
            .get(&id)
            .ok_or_else(|| BlobError::buffer_not_found(id))?;

        let mut content = BytesMut::with_capacity(slices.iter().map(Bytes::len).sum());
        for slice in slices {
            content.extend_from_slice(slice);
        }
        drop(buffers);

        let url = format!("blob:{}", Uuid::new_v4());
        self.blobs.write().insert(
            url.clone(),
            StoredBlob {
                media_type: media_type.to_string(),
                content: content.freeze(),
            },
        );

        Ok(url)
    }

    async fn delete_blob(&self, url: &str) -> BlobResult<()> {
        self.log(&format!("delete blob {url}"));
        self.deletions.lock().push(url.to_string());

        // Unknown references no-op so that double-dispose stays harmless.
        self.blobs.write().remove(url);
        Ok(())
    }

    async fn save_as_file(&self, url: &str, filename: &str) -> BlobResult<()> {
        self.log(&format!("save blob: {url}"));

        // External references are allowed here, so no existence check.
        self.downloads.lock().push(SavedFile {
            url: url.to_string(),
            filename: filename.to_string(),
        });
        Ok(())
    }

    async fn set_verbose_logs(&self, enabled: bool) -> BlobResult<()> {
        *self.verbose.lock() = enabled;
        self.log(&format!("enable logs: {enabled}"));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_returns_true() {
        let endpoint = MemoryBlobEndpoint::new();
        assert!(endpoint.ping().await.unwrap());
    }

    #[tokio::test]
    async fn test_slices_concatenate_in_append_order() {
        let endpoint = MemoryBlobEndpoint::new();
        let id = BufferId::new();

        endpoint.create_buffer(id).await.unwrap();
        endpoint.add_to_buffer(id, b"hello ", 6).await.unwrap();
        endpoint.add_to_buffer(id, b"world", 5).await.unwrap();

        let url = endpoint.create_blob(id, "text/plain").await.unwrap();
        let blob = endpoint.blob(&url).unwrap();

        assert_eq!(blob.content.as_ref(), b"hello world");
        assert_eq!(blob.media_type, "text/plain");
        assert!(url.starts_with("blob:"));
    }

    #[tokio::test]
    async fn test_add_truncates_oversized_slice() {
        let endpoint = MemoryBlobEndpoint::new();
        let id = BufferId::new();

        endpoint.create_buffer(id).await.unwrap();
        endpoint.add_to_buffer(id, b"abcdef", 3).await.unwrap();

        assert_eq!(endpoint.slice_sizes(id), Some(vec![3]));

        let url = endpoint.create_blob(id, "text/plain").await.unwrap();
        assert_eq!(endpoint.blob(&url).unwrap().content.as_ref(), b"abc");
    }

    #[tokio::test]
    async fn test_base64_path_matches_binary_path() {
        let endpoint = MemoryBlobEndpoint::new();
        let id = BufferId::new();

        endpoint.create_buffer(id).await.unwrap();
        let encoded = general_purpose::STANDARD.encode(b"payload");
        endpoint.add_to_buffer_b64(id, &encoded, 7).await.unwrap();

        let url = endpoint.create_blob(id, "application/octet-stream").await.unwrap();
        assert_eq!(endpoint.blob(&url).unwrap().content.as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_add_to_unknown_buffer_fails() {
        let endpoint = MemoryBlobEndpoint::new();
        let err = endpoint.add_to_buffer(BufferId::new(), b"x", 1).await;
        assert!(matches!(err, Err(BlobError::BufferNotFound { .. })));
    }

    #[tokio::test]
    async fn test_delete_unknown_blob_is_noop() {
        let endpoint = MemoryBlobEndpoint::new();
        endpoint.delete_blob("blob:does-not-exist").await.unwrap();
        assert_eq!(endpoint.deleted_blobs(), vec!["blob:does-not-exist"]);
    }

    #[tokio::test]
    async fn test_delete_buffer_discards_slices() {
        let endpoint = MemoryBlobEndpoint::new();
        let id = BufferId::new();

        endpoint.create_buffer(id).await.unwrap();
        endpoint.add_to_buffer(id, b"data", 4).await.unwrap();
        endpoint.delete_buffer(id).await.unwrap();

        assert_eq!(endpoint.slice_sizes(id), None);
        assert_eq!(endpoint.buffer_count(), 0);
    }
}
