use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::config::DeviceConfig;
use crate::cpu::alloc_zeroed;
use crate::error::{Result, TensorError};

use super::stream::Stream;

static DEFAULT_HEAP: OnceLock<Arc<DeviceHeap>> = OnceLock::new();

/// Capacity-accounted device memory.
///
/// Every [`DeviceBuffer`] holds a reservation against the heap's limit and
/// returns it when dropped, so a buffer is released exactly once.
pub struct DeviceHeap {
    limit: usize,
    in_use: AtomicUsize,
    stream: Stream,
}

impl DeviceHeap {
    pub fn with_config(config: &DeviceConfig) -> Arc<Self> {
        Arc::new(DeviceHeap {
            limit: config.memory_limit_bytes,
            in_use: AtomicUsize::new(0),
            stream: Stream::new(),
        })
    }

    /// The process-wide heap used by [`Backend::Cuda`] tensors.
    ///
    /// Configured from the environment on first use.
    pub fn global() -> Arc<DeviceHeap> {
        let heap = DEFAULT_HEAP.get_or_init(|| {
            let config = DeviceConfig::from_env().unwrap_or_else(|e| {
                warn!(error = %e, "falling back to default device config");
                DeviceConfig::default()
            });
            debug!(limit = config.memory_limit_bytes, "initializing device heap");
            DeviceHeap::with_config(&config)
        });
        Arc::clone(heap)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes currently held by live buffers.
    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Acquire)
    }

    pub fn available(&self) -> usize {
        self.limit.saturating_sub(self.in_use())
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Allocates `len` zeroed elements.
    pub fn alloc(self: &Arc<Self>, len: usize) -> Result<DeviceBuffer> {
        let bytes = len.saturating_mul(std::mem::size_of::<f32>());
        self.reserve(bytes)?;
        let mem = match alloc_zeroed(len) {
            Ok(mem) => mem.into_boxed_slice(),
            Err(e) => {
                self.release(bytes);
                return Err(TensorError::Allocation {
                    backend: Backend::Cuda,
                    requested: bytes,
                    reason: e.to_string(),
                });
            }
        };
        self.stream.launch("memset", len);
        debug!(bytes, in_use = self.in_use(), "device alloc");
        Ok(DeviceBuffer {
            heap: Arc::clone(self),
            mem,
        })
    }

    /// Allocates a buffer and copies `data` into it (host to device).
    pub fn upload(self: &Arc<Self>, data: &[f32]) -> Result<DeviceBuffer> {
        let mut buffer = self.alloc(data.len())?;
        self.stream.launch("memcpy_htod", data.len());
        buffer.mem.copy_from_slice(data);
        Ok(buffer)
    }

    fn reserve(&self, bytes: usize) -> Result<()> {
        self.in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= self.limit)
            })
            .map(|_| ())
            .map_err(|used| TensorError::Allocation {
                backend: Backend::Cuda,
                requested: bytes,
                reason: format!(
                    "out of device memory ({} of {} bytes available)",
                    self.limit.saturating_sub(used),
                    self.limit
                ),
            })
    }

    fn release(&self, bytes: usize) {
        self.in_use.fetch_sub(bytes, Ordering::AcqRel);
    }
}

impl fmt::Debug for DeviceHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceHeap")
            .field("limit", &self.limit)
            .field("in_use", &self.in_use())
            .finish()
    }
}

/// An allocation in device memory.
///
/// Contents are only reachable through kernels and the synchronizing
/// [`DeviceBuffer::download`].
pub struct DeviceBuffer {
    heap: Arc<DeviceHeap>,
    mem: Box<[f32]>,
}

impl DeviceBuffer {
    pub fn len(&self) -> usize {
        self.mem.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mem.is_empty()
    }

    pub fn byte_size(&self) -> usize {
        self.mem.len() * std::mem::size_of::<f32>()
    }

    pub fn heap(&self) -> &Arc<DeviceHeap> {
        &self.heap
    }

    /// Copies the buffer to host memory (device to host).
    ///
    /// Synchronizes the stream first so every pending write is visible.
    pub fn download(&self) -> Result<Vec<f32>> {
        self.heap.stream.launch("memcpy_dtoh", self.mem.len());
        self.heap.stream.synchronize();
        let mut host = alloc_zeroed(self.mem.len())?;
        host.copy_from_slice(&self.mem);
        Ok(host)
    }

    pub(crate) fn device_slice(&self) -> &[f32] {
        &self.mem
    }

    pub(crate) fn device_slice_mut(&mut self) -> &mut [f32] {
        &mut self.mem
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        let bytes = self.byte_size();
        self.heap.release(bytes);
        debug!(bytes, in_use = self.heap.in_use(), "device free");
    }
}

impl fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("len", &self.mem.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_heap(bytes: usize) -> Arc<DeviceHeap> {
        DeviceHeap::with_config(&DeviceConfig::with_memory_limit(bytes))
    }

    #[test]
    fn test_alloc_and_release() {
        let heap = small_heap(1024);
        {
            let a = heap.alloc(16).unwrap();
            assert_eq!(a.len(), 16);
            assert_eq!(heap.in_use(), 64);
            let _b = heap.alloc(32).unwrap();
            assert_eq!(heap.in_use(), 192);
        }
        assert_eq!(heap.in_use(), 0);
        assert_eq!(heap.available(), 1024);
    }

    #[test]
    fn test_alloc_over_limit() {
        let heap = small_heap(64);
        let _a = heap.alloc(10).unwrap();
        let err = heap.alloc(10).unwrap_err();
        assert!(matches!(
            err,
            TensorError::Allocation {
                backend: Backend::Cuda,
                requested: 40,
                ..
            }
        ));
        assert_eq!(heap.in_use(), 40);
    }

    #[test]
    fn test_upload_download() {
        let heap = small_heap(1024);
        let buf = heap.upload(&[1.0, 2.0, 3.0]).unwrap();
        assert!(heap.stream().pending() > 0);
        assert_eq!(buf.download().unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(heap.stream().pending(), 0);
    }
}
