use std::time::Duration;

/// How slices are encoded when crossing the boundary.
///
/// Selected once at configuration time, never per call. Hosts whose channel
/// can carry raw binary should prefer [`WireFormat::Binary`]; the base64 path
/// exists for channels limited to text payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Raw binary slice transfer (preferred)
    #[default]
    Binary,
    /// Base64 text transfer (compatibility fallback)
    Base64,
}

/// Configuration for the blob relay
#[derive(Debug, Clone)]
pub struct BlobConfig {
    /// Capacity of each transfer slice, in bytes
    pub slice_size: usize,

    /// Slice encoding across the boundary
    pub wire_format: WireFormat,

    /// Enable verbose logging on the boundary-side endpoint
    pub endpoint_logs: bool,

    /// Upper bound on the liveness probe issued at disposal, so tearing down
    /// a dead boundary never hangs
    pub probe_timeout: Duration,
}

impl BlobConfig {
    /// Default slice capacity (32 KiB)
    pub const DEFAULT_SLICE_SIZE: usize = 32 * 1024;

    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slice capacity in bytes
    pub fn with_slice_size(mut self, bytes: usize) -> Self {
        self.slice_size = bytes;
        self
    }

    /// Set the wire format
    pub fn with_wire_format(mut self, format: WireFormat) -> Self {
        self.wire_format = format;
        self
    }

    /// Enable verbose boundary-side logging
    pub fn with_endpoint_logs(mut self) -> Self {
        self.endpoint_logs = true;
        self
    }

    /// Set the disposal liveness probe timeout
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            slice_size: Self::DEFAULT_SLICE_SIZE,
            wire_format: WireFormat::default(),
            endpoint_logs: false,
            probe_timeout: Duration::from_millis(500),
        }
    }
}
