use async_trait::async_trait;
use futures_core::future::BoxFuture;
use futures_util::StreamExt;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::relay::RelayStrategy;
use crate::{
    Blob, BlobConfig, BlobEndpoint, BlobError, BlobResult, BufferPool, ByteStream, SharedPool,
    SliceStream, Topology,
};

/// Acquires the boundary-side endpoint and reports which topology it runs
/// under. The host decides this once, based on its own capability detection.
#[async_trait]
pub trait EndpointConnector: Send + Sync {
    async fn connect(&self) -> BlobResult<(Arc<dyn BlobEndpoint>, Topology)>;
}

/// Connector for hosts that already hold an endpoint reference
pub struct FixedConnector {
    endpoint: Arc<dyn BlobEndpoint>,
    topology: Topology,
}

impl FixedConnector {
    pub fn new(endpoint: Arc<dyn BlobEndpoint>, topology: Topology) -> Self {
        Self { endpoint, topology }
    }
}

#[async_trait]
impl EndpointConnector for FixedConnector {
    async fn connect(&self) -> BlobResult<(Arc<dyn BlobEndpoint>, Topology)> {
        Ok((self.endpoint.clone(), self.topology))
    }
}

/// Facade for building, saving, and releasing browser-side blobs.
///
/// The boundary endpoint is acquired lazily, at most once per service
/// instance, even when multiple create calls race to trigger it first.
pub struct BlobService {
    connector: Arc<dyn EndpointConnector>,
    pool: Arc<dyn BufferPool>,
    config: BlobConfig,
    strategy: OnceCell<Arc<RelayStrategy>>,
}

impl BlobService {
    /// Create a new blob service
    pub fn new<C: EndpointConnector + 'static>(connector: C, config: BlobConfig) -> Self {
        Self::with_pool(connector, SharedPool::new(), config)
    }

    /// Create with a custom buffer pool
    pub fn with_pool<C, P>(connector: C, pool: P, config: BlobConfig) -> Self
    where
        C: EndpointConnector + 'static,
        P: BufferPool + 'static,
    {
        Self {
            connector: Arc::new(connector),
            pool: Arc::new(pool),
            config,
            strategy: OnceCell::new(),
        }
    }

    /// Get configuration
    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    async fn strategy(&self) -> BlobResult<Arc<RelayStrategy>> {
        let strategy = self
            .strategy
            .get_or_try_init(|| async {
                debug!("acquiring boundary endpoint");
                let (endpoint, topology) = self.connector.connect().await?;
                endpoint.set_verbose_logs(self.config.endpoint_logs).await?;
                Ok::<_, BlobError>(Arc::new(RelayStrategy::new(
                    endpoint,
                    self.pool.clone(),
                    self.config.clone(),
                    topology,
                )))
            })
            .await?;

        Ok(strategy.clone())
    }

    /// Build a blob by copying an input stream through the slice relay.
    ///
    /// Reduces to [`create_blob_with`](BlobService::create_blob_with) with a
    /// writer that drains the stream.
    pub async fn create_blob(&self, body: ByteStream, media_type: &str) -> BlobResult<Blob> {
        self.create_blob_with(
            move |stream: &mut SliceStream| {
                Box::pin(async move {
                    let mut body = body;
                    while let Some(chunk) = body.next().await {
                        stream.write(&chunk?).await?;
                    }
                    Ok(())
                })
            },
            media_type,
        )
        .await
    }

    /// Build a blob by driving a caller-supplied writer through the slice
    /// relay
    pub async fn create_blob_with<F>(&self, writer: F, media_type: &str) -> BlobResult<Blob>
    where
        F: for<'a> FnOnce(&'a mut SliceStream) -> BoxFuture<'a, BlobResult<()>> + Send,
    {
        info!(media_type, "creating blob");

        let strategy = self.strategy().await?;
        let url = strategy.create_blob(media_type, writer).await?;

        info!(media_type, url = %url, "blob created");

        Ok(Blob::new(url, media_type.to_string(), strategy))
    }

    /// Save a previously created blob as a file
    pub async fn save_blob_as_file(&self, blob: &Blob, filename: &str) -> BlobResult<()> {
        blob.save_as_file(filename).await
    }

    /// Save an arbitrary reference as a file.
    ///
    /// With no filename supplied, one is derived from the reference's path
    /// component (query parameters stripped); an empty result synthesizes
    /// `Download_<uuid>`.
    pub async fn save_as_file(&self, reference: &str, filename: Option<&str>) -> BlobResult<()> {
        if reference.is_empty() {
            return Err(BlobError::invalid("reference must not be empty"));
        }

        let filename = match filename {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => derived_filename(reference),
        };

        let strategy = self.strategy().await?;
        strategy.save_as_file(reference, &filename).await
    }

    /// Tear down the relay strategy if it was ever initialized.
    ///
    /// Never fails merely because the boundary context is gone.
    pub async fn dispose(&self) -> BlobResult<()> {
        match self.strategy.get() {
            Some(strategy) => strategy.dispose().await,
            None => Ok(()),
        }
    }
}

/// Last path segment of the reference, query stripped; absolute URLs
/// contribute only their path part. Empty results fall back to a unique
/// download name.
fn derived_filename(reference: &str) -> String {
    let trimmed = reference.split('?').next().unwrap_or(reference);

    let candidate = match trimmed.split_once("://") {
        // Authority-only references ("http://host") have no path segment.
        Some((_, rest)) => match rest.split_once('/') {
            Some((_, path)) => path.rsplit('/').next().unwrap_or(""),
            None => "",
        },
        None => trimmed.rsplit('/').next().unwrap_or(""),
    };

    if candidate.is_empty() {
        format!("Download_{}", Uuid::new_v4())
    } else {
        candidate.to_string()
    }
}
