//! # blob-relay: chunked buffer relay for browser-side Blobs
//!
//! `blob-relay` builds browser-resident binary objects (Blobs) from streamed
//! application data without ever holding the full payload in application
//! memory. Bytes cross the application/browser boundary in bounded
//! fixed-size slices, are reassembled on the boundary side, and come back as
//! a disposable handle: an object URL plus MIME type.
//!
//! ## Key features
//!
//! - **Slice-buffered streaming**: arbitrary-sized writes are accumulated
//!   into fixed-capacity slices (32 KiB by default) and forwarded as each
//!   one fills; at most one slice is held locally
//! - **Two execution topologies**: co-located endpoints get inline
//!   transmission, remote endpoints get a pipelined background drain so
//!   writers never wait on round-trips
//! - **Pooled buffers**: slices are rented and returned, so steady-state
//!   construction allocates nothing
//! - **Lifecycle discipline**: per-call buffer ids, materialize-then-delete
//!   cleanup, disposable handles, and a bounded liveness probe so teardown
//!   never hangs on a dead boundary
//!
//! ## Quick start
//!
//! ```rust
//! use blob_relay::prelude::*;
//! use blob_relay::{FixedConnector, MemoryBlobEndpoint, Topology};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! // 1. Wire the service to a boundary endpoint
//! let endpoint = Arc::new(MemoryBlobEndpoint::new());
//! let connector = FixedConnector::new(endpoint, Topology::CoLocated);
//! let service = BlobService::new(connector, BlobConfig::default());
//!
//! // 2. Build a blob through the slice relay
//! let blob = service
//!     .create_blob_with(
//!         |stream: &mut SliceStream| {
//!             Box::pin(async move { stream.write(b"hello, browser").await })
//!         },
//!         "text/plain",
//!     )
//!     .await?;
//!
//! // 3. Use the handle, then release the boundary-side object
//! blob.save_as_file("hello.txt").await?;
//! blob.dispose().await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │   BlobService    │  ← lazy endpoint acquisition, filename derivation
//! ├──────────────────┤
//! │  RelayStrategy   │  ← create/materialize/delete lifecycle, topology
//! ├──────────────────┤
//! │   SliceStream    │  ← slice buffering, inline or pipelined transfer
//! ├──────────────────┤
//! │   BlobEndpoint   │  ← boundary-side buffer and Blob primitives
//! └──────────────────┘
//! ```
//!
//! The boundary side is reached only through the [`BlobEndpoint`] trait, so
//! any transport that can carry the relay operations works;
//! [`MemoryBlobEndpoint`] is the in-process reference implementation.

mod blob;
mod config;
mod endpoint;
mod error;
mod pool;
mod relay;
mod service;
mod stream;
mod types;

// Re-export main types for clean API
pub use blob::Blob;
pub use config::{BlobConfig, WireFormat};
pub use endpoint::{BlobEndpoint, MemoryBlobEndpoint, SavedFile, StoredBlob};
pub use error::{BlobError, BlobResult};
pub use pool::{BufferPool, SharedPool};
pub use relay::Topology;
pub use service::{BlobService, EndpointConnector, FixedConnector};
pub use stream::SliceStream;
pub use types::{BufferId, ByteStream};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        Blob, BlobConfig, BlobEndpoint, BlobError, BlobResult, BlobService, BufferId, ByteStream,
        SliceStream,
    };
}
