use futures_core::future::BoxFuture;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::debug;

use crate::{
    BlobConfig, BlobEndpoint, BlobError, BlobResult, BufferId, BufferPool, SliceStream,
};

/// Where the boundary-side endpoint executes relative to the caller.
///
/// Detected once at service construction; the two variants differ only in
/// slice transmission timing (inline vs. pipelined).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    /// The endpoint shares the caller's execution context; relay calls are
    /// cheap, so slices are transmitted inline.
    CoLocated,
    /// Relay calls cross an asynchronous channel; slices are pipelined
    /// through a background drain task to keep the writer off the
    /// round-trip path.
    Remote,
}

/// Translates stream writes and lifecycle calls into boundary-crossing
/// operations. One instance per service, owning the endpoint reference for
/// its whole lifetime.
pub struct RelayStrategy {
    endpoint: Arc<dyn BlobEndpoint>,
    pool: Arc<dyn BufferPool>,
    config: BlobConfig,
    topology: Topology,
}

impl RelayStrategy {
    pub(crate) fn new(
        endpoint: Arc<dyn BlobEndpoint>,
        pool: Arc<dyn BufferPool>,
        config: BlobConfig,
        topology: Topology,
    ) -> Self {
        Self {
            endpoint,
            pool,
            config,
            topology,
        }
    }

    /// Build a blob by driving `writer` through a slice-buffering stream
    /// bound to a freshly minted buffer id, then materialize the blob and
    /// delete the now-redundant buffer.
    ///
    /// A failed boundary call aborts the whole operation; the possibly
    /// orphaned boundary-side buffer is bounded by session lifetime.
    pub(crate) async fn create_blob<F>(&self, media_type: &str, writer: F) -> BlobResult<String>
    where
        F: for<'a> FnOnce(&'a mut SliceStream) -> BoxFuture<'a, BlobResult<()>> + Send,
    {
        if self.config.slice_size == 0 {
            return Err(BlobError::invalid("slice size must be greater than zero"));
        }

        let id = BufferId::new();

        self.endpoint.ping().await?;
        self.endpoint.create_buffer(id).await?;

        let mut stream = SliceStream::new(
            self.endpoint.clone(),
            self.pool.clone(),
            id,
            self.config.slice_size,
            self.config.wire_format,
            self.topology,
        )?;

        let wrote = writer(&mut stream).await;
        let total = stream.len();
        let finished = stream.finish().await;
        wrote?;
        finished?;

        debug!(%id, total, "buffer streamed to boundary");

        let url = self.endpoint.create_blob(id, media_type).await?;
        self.endpoint.delete_buffer(id).await?;

        Ok(url)
    }

    pub(crate) async fn save_as_file(&self, url: &str, filename: &str) -> BlobResult<()> {
        self.endpoint.save_as_file(url, filename).await
    }

    pub(crate) async fn delete_blob(&self, url: &str) -> BlobResult<()> {
        self.endpoint.delete_blob(url).await
    }

    /// Tear down the strategy. The liveness probe carries a short timeout so
    /// a dead boundary cannot hang disposal; its expiry is logged and
    /// swallowed.
    pub(crate) async fn dispose(&self) -> BlobResult<()> {
        match timeout(self.config.probe_timeout, self.endpoint.ping()).await {
            Ok(alive) => {
                alive?;
            }
            Err(_) => {
                debug!("liveness probe timed out during disposal");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryBlobEndpoint, SharedPool};
    use async_trait::async_trait;
    use std::time::Duration;

    fn relay_for(endpoint: Arc<dyn BlobEndpoint>, topology: Topology) -> RelayStrategy {
        RelayStrategy::new(
            endpoint,
            Arc::new(SharedPool::new()),
            BlobConfig::default().with_slice_size(1024),
            topology,
        )
    }

    /// Appends fail; everything else delegates.
    struct BrokenAppendEndpoint {
        inner: MemoryBlobEndpoint,
    }

    #[async_trait]
    impl BlobEndpoint for BrokenAppendEndpoint {
        async fn ping(&self) -> BlobResult<bool> {
            self.inner.ping().await
        }

        async fn create_buffer(&self, id: BufferId) -> BlobResult<()> {
            self.inner.create_buffer(id).await
        }

        async fn add_to_buffer(
            &self,
            _id: BufferId,
            _slice: &[u8],
            _len: usize,
        ) -> BlobResult<()> {
            Err(BlobError::boundary(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "channel closed",
            )))
        }

        async fn add_to_buffer_b64(
            &self,
            _id: BufferId,
            _slice_b64: &str,
            _len: usize,
        ) -> BlobResult<()> {
            Err(BlobError::boundary(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "channel closed",
            )))
        }

        async fn delete_buffer(&self, id: BufferId) -> BlobResult<()> {
            self.inner.delete_buffer(id).await
        }

        async fn create_blob(&self, id: BufferId, media_type: &str) -> BlobResult<String> {
            self.inner.create_blob(id, media_type).await
        }

        async fn delete_blob(&self, url: &str) -> BlobResult<()> {
            self.inner.delete_blob(url).await
        }

        async fn save_as_file(&self, url: &str, filename: &str) -> BlobResult<()> {
            self.inner.save_as_file(url, filename).await
        }

        async fn set_verbose_logs(&self, enabled: bool) -> BlobResult<()> {
            self.inner.set_verbose_logs(enabled).await
        }
    }

    /// Ping never answers.
    struct HungEndpoint {
        inner: MemoryBlobEndpoint,
    }

    #[async_trait]
    impl BlobEndpoint for HungEndpoint {
        async fn ping(&self) -> BlobResult<bool> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(true)
        }

        async fn create_buffer(&self, id: BufferId) -> BlobResult<()> {
            self.inner.create_buffer(id).await
        }

        async fn add_to_buffer(&self, id: BufferId, slice: &[u8], len: usize) -> BlobResult<()> {
            self.inner.add_to_buffer(id, slice, len).await
        }

        async fn add_to_buffer_b64(
            &self,
            id: BufferId,
            slice_b64: &str,
            len: usize,
        ) -> BlobResult<()> {
            self.inner.add_to_buffer_b64(id, slice_b64, len).await
        }

        async fn delete_buffer(&self, id: BufferId) -> BlobResult<()> {
            self.inner.delete_buffer(id).await
        }

        async fn create_blob(&self, id: BufferId, media_type: &str) -> BlobResult<String> {
            self.inner.create_blob(id, media_type).await
        }

        async fn delete_blob(&self, url: &str) -> BlobResult<()> {
            self.inner.delete_blob(url).await
        }

        async fn save_as_file(&self, url: &str, filename: &str) -> BlobResult<()> {
            self.inner.save_as_file(url, filename).await
        }

        async fn set_verbose_logs(&self, enabled: bool) -> BlobResult<()> {
            self.inner.set_verbose_logs(enabled).await
        }
    }

    #[tokio::test]
    async fn test_create_blob_runs_full_lifecycle() {
        let endpoint = Arc::new(MemoryBlobEndpoint::new());
        let relay = relay_for(endpoint.clone(), Topology::CoLocated);

        let url = relay
            .create_blob("text/plain", |stream: &mut SliceStream| {
                Box::pin(async move { stream.write(b"lifecycle").await })
            })
            .await
            .unwrap();

        let blob = endpoint.blob(&url).unwrap();
        assert_eq!(blob.content.as_ref(), b"lifecycle");
        assert_eq!(blob.media_type, "text/plain");

        // The slice buffer is deleted right after materialization.
        assert_eq!(endpoint.buffer_count(), 0);
    }

    #[tokio::test]
    async fn test_create_blob_with_empty_writer_still_cleans_up() {
        let endpoint = Arc::new(MemoryBlobEndpoint::new());
        let relay = relay_for(endpoint.clone(), Topology::CoLocated);

        let url = relay
            .create_blob("application/octet-stream", |_stream: &mut SliceStream| {
                Box::pin(async move { Ok(()) })
            })
            .await
            .unwrap();

        let blob = endpoint.blob(&url).unwrap();
        assert!(blob.content.is_empty());
        assert_eq!(endpoint.buffer_count(), 0);
    }

    #[tokio::test]
    async fn test_failed_append_aborts_and_leaves_orphan_buffer() {
        let endpoint = Arc::new(BrokenAppendEndpoint {
            inner: MemoryBlobEndpoint::new(),
        });
        let relay = relay_for(endpoint.clone(), Topology::CoLocated);

        let result = relay
            .create_blob("text/plain", |stream: &mut SliceStream| {
                Box::pin(async move { stream.write(&[1u8; 2048]).await })
            })
            .await;

        assert!(matches!(result, Err(BlobError::Boundary { .. })));

        // No retries, no cleanup of the half-filled buffer.
        assert_eq!(endpoint.inner.buffer_count(), 1);
        assert!(endpoint.inner.deleted_blobs().is_empty());
    }

    #[tokio::test]
    async fn test_writer_error_propagates() {
        let endpoint = Arc::new(MemoryBlobEndpoint::new());
        let relay = relay_for(endpoint.clone(), Topology::CoLocated);

        let result = relay
            .create_blob("text/plain", |_stream: &mut SliceStream| {
                Box::pin(async move { Err(BlobError::invalid("writer gave up")) })
            })
            .await;

        assert!(matches!(result, Err(BlobError::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_remote_topology_round_trips() {
        let endpoint = Arc::new(MemoryBlobEndpoint::new());
        let relay = relay_for(endpoint.clone(), Topology::Remote);

        let payload: Vec<u8> = (0..5000u32).map(|i| (i % 241) as u8).collect();
        let body = payload.clone();

        let url = relay
            .create_blob("application/octet-stream", move |stream: &mut SliceStream| {
                Box::pin(async move { stream.write(&body).await })
            })
            .await
            .unwrap();

        assert_eq!(endpoint.blob(&url).unwrap().content.as_ref(), &payload[..]);
    }

    #[tokio::test]
    async fn test_dispose_with_hung_endpoint_completes() {
        let endpoint = Arc::new(HungEndpoint {
            inner: MemoryBlobEndpoint::new(),
        });
        let relay = RelayStrategy::new(
            endpoint,
            Arc::new(SharedPool::new()),
            BlobConfig::default().with_probe_timeout(Duration::from_millis(20)),
            Topology::Remote,
        );

        let started = std::time::Instant::now();
        relay.dispose().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
