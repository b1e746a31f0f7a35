use base64::{engine::general_purpose, Engine as _};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::{BlobEndpoint, BlobError, BlobResult, BufferId, BufferPool, Topology, WireFormat};

/// Transmits one slice across the boundary, honoring the configured wire
/// format. Shared between the stream and its background drain task.
struct SliceSender {
    endpoint: Arc<dyn BlobEndpoint>,
    pool: Arc<dyn BufferPool>,
    id: BufferId,
    wire: WireFormat,
}

impl SliceSender {
    async fn transmit(&self, slice: &[u8], len: usize) -> BlobResult<()> {
        match self.wire {
            WireFormat::Binary => self.endpoint.add_to_buffer(self.id, &slice[..len], len).await,
            WireFormat::Base64 => {
                let encoded = general_purpose::STANDARD.encode(&slice[..len]);
                self.endpoint.add_to_buffer_b64(self.id, &encoded, len).await
            }
        }
    }
}

/// Slices waiting for the drain task, oldest first.
struct SliceQueue {
    pending: Mutex<VecDeque<(Vec<u8>, usize)>>,
    failure: Mutex<Option<BlobError>>,
}

enum Transmit {
    /// Co-located boundary: every completed slice is sent and awaited inline
    /// with the write call.
    Inline,
    /// Remote boundary: completed slices are queued and a single background
    /// task drains them, so writes are not serialized behind round-trips.
    Pipelined {
        queue: Arc<SliceQueue>,
        drain: Option<JoinHandle<()>>,
    },
}

/// Write-only destination that accumulates bytes into fixed-capacity slices
/// and forwards each completed slice to the boundary-side buffer it is bound
/// to.
///
/// At most one slice is held locally at a time; a write spanning several
/// slice boundaries is split and forwarded slice-by-slice within the same
/// call. A partially filled trailing slice is only forwarded by
/// [`flush`](SliceStream::flush). Writers must not assume a slice has been
/// transmitted just because `write` returned; only `flush`/`finish` give
/// that guarantee.
pub struct SliceStream {
    sender: Arc<SliceSender>,
    slice_size: usize,
    slice: Vec<u8>,
    filled: usize,
    total: u64,
    relay: Transmit,
}

impl SliceStream {
    pub(crate) fn new(
        endpoint: Arc<dyn BlobEndpoint>,
        pool: Arc<dyn BufferPool>,
        id: BufferId,
        slice_size: usize,
        wire: WireFormat,
        topology: Topology,
    ) -> BlobResult<Self> {
        if slice_size == 0 {
            return Err(BlobError::invalid("slice size must be greater than zero"));
        }

        let slice = pool.rent(slice_size);
        let relay = match topology {
            Topology::CoLocated => Transmit::Inline,
            Topology::Remote => Transmit::Pipelined {
                queue: Arc::new(SliceQueue {
                    pending: Mutex::new(VecDeque::new()),
                    failure: Mutex::new(None),
                }),
                drain: None,
            },
        };

        Ok(Self {
            sender: Arc::new(SliceSender {
                endpoint,
                pool,
                id,
                wire,
            }),
            slice_size,
            slice,
            filled: 0,
            total: 0,
            relay,
        })
    }

    /// Boundary-side buffer this stream feeds
    pub fn buffer_id(&self) -> BufferId {
        self.sender.id
    }

    /// Total bytes written so far. Diagnostics only; the boundary side infers
    /// blob size from slice concatenation.
    pub fn len(&self) -> u64 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Append bytes, forwarding every slice that fills exactly.
    ///
    /// Loop-safe for writes of arbitrary size relative to the slice
    /// capacity; a zero-length write is a no-op.
    pub async fn write(&mut self, mut data: &[u8]) -> BlobResult<()> {
        self.total += data.len() as u64;

        while !data.is_empty() {
            let room = self.slice.len() - self.filled;
            if data.len() >= room {
                self.slice[self.filled..].copy_from_slice(&data[..room]);
                self.filled = self.slice.len();
                data = &data[room..];
                self.dispatch().await?;
            } else {
                self.slice[self.filled..self.filled + data.len()].copy_from_slice(data);
                self.filled += data.len();
                break;
            }
        }

        Ok(())
    }

    /// Forward a partially filled trailing slice and wait for every in-flight
    /// transmission. Idempotent; with nothing pending this is a no-op.
    pub async fn flush(&mut self) -> BlobResult<()> {
        if self.filled > 0 {
            self.dispatch().await?;
        }
        self.settle().await
    }

    /// Flush and release the stream's resources. After `finish` returns, all
    /// slices have reached the boundary side.
    pub async fn finish(mut self) -> BlobResult<()> {
        self.flush().await
    }

    /// The stream is write-only; rewriting its length is not supported.
    pub fn set_len(&mut self, _len: u64) -> BlobResult<()> {
        Err(BlobError::Unsupported)
    }

    /// Hand the current (full) slice to the relay and rent a replacement.
    async fn dispatch(&mut self) -> BlobResult<()> {
        let len = self.filled;
        let full = std::mem::replace(&mut self.slice, self.sender.pool.rent(self.slice_size));
        self.filled = 0;

        match &mut self.relay {
            Transmit::Inline => {
                let result = self.sender.transmit(&full, len).await;
                self.sender.pool.give_back(full);
                result
            }
            Transmit::Pipelined { queue, drain } => {
                queue.pending.lock().push_back((full, len));
                if drain.as_ref().map_or(true, JoinHandle::is_finished) {
                    *drain = Some(spawn_drain(self.sender.clone(), queue.clone()));
                }
                Ok(())
            }
        }
    }

    /// Wait until the pending queue is empty and surface any stored drain
    /// failure.
    async fn settle(&mut self) -> BlobResult<()> {
        let Transmit::Pipelined { queue, drain } = &mut self.relay else {
            return Ok(());
        };

        loop {
            if let Some(task) = drain.take() {
                task.await.map_err(BlobError::boundary)?;
            }
            if let Some(err) = queue.failure.lock().take() {
                return Err(err);
            }
            // A slice enqueued just as the previous drain exited needs a
            // fresh task.
            if queue.pending.lock().is_empty() {
                return Ok(());
            }
            *drain = Some(spawn_drain(self.sender.clone(), queue.clone()));
        }
    }
}

impl Drop for SliceStream {
    fn drop(&mut self) {
        let slice = std::mem::take(&mut self.slice);
        if !slice.is_empty() {
            self.sender.pool.give_back(slice);
        }
    }
}

/// Drain pending slices in enqueue order, one relay call each. Exactly one
/// drain task runs per stream, which is what preserves slice order.
fn spawn_drain(sender: Arc<SliceSender>, queue: Arc<SliceQueue>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let next = queue.pending.lock().pop_front();
            let Some((slice, len)) = next else { break };

            match sender.transmit(&slice, len).await {
                Ok(()) => sender.pool.give_back(slice),
                Err(e) => {
                    sender.pool.give_back(slice);

                    // No retries: abandon the rest and surface the failure at
                    // the next flush/finish.
                    let abandoned: Vec<_> = queue.pending.lock().drain(..).collect();
                    for (buf, _) in abandoned {
                        sender.pool.give_back(buf);
                    }
                    *queue.failure.lock() = Some(e);
                    break;
                }
            }
        }
    })
}
