//! Turning gralloc buffers into drm framebuffers
//!
//! A [`BufferImporter`] validates a [`GrallocHandle`], translates its pixel format,
//! reconstructs the geometry of every plane and finally registers the buffer with the
//! display driver. The result is an [`ImportedBuffer`] that owns the framebuffer and
//! releases it once dropped.
//!
//! Importing the same dmabuf twice yields the same gem handle. The importer counts the
//! buffers using each handle and closes it once the last of them is gone, so a single
//! importer (or clones of it) should be used per device.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::os::unix::io::BorrowedFd;
use std::sync::{Arc, Mutex, PoisonError};

use drm::buffer;
use drm::control::framebuffer;
use smallvec::SmallVec;
use tracing::{debug, error, instrument, trace, warn};

use super::{
    config::PlatformConfig,
    device::{FramebufferRequest, KmsDevice},
    error::AccessError,
};
use crate::backend::allocator::{
    format::{to_kernel_format, UnsupportedFormat},
    layout::{plane_layout, BufferLayout, LayoutError},
    Fourcc, GrallocHandle, PixelFormat, Usage, MAX_PLANES,
};

/// Errors thrown by [`BufferImporter::import_buffer`]
#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    /// The buffer has a degenerate or oversized geometry
    #[error("invalid buffer of size {width}x{height} with stride {stride}")]
    InvalidHandle {
        /// Width of the buffer
        width: u32,
        /// Height of the buffer
        height: u32,
        /// Stride of the first plane
        stride: u32,
    },
    /// The pixel format has no kernel counterpart
    #[error(transparent)]
    UnsupportedFormat(#[from] UnsupportedFormat),
    /// The plane geometry does not fit into 32 bits
    #[error(transparent)]
    Layout(#[from] LayoutError),
    /// The planes reach past the end of the allocation
    #[error("planes of the {fourcc} buffer span {required} bytes, but only {available} are allocated")]
    OutOfBounds {
        /// Format of the buffer
        fourcc: Fourcc,
        /// Bytes covered by the planes
        required: u64,
        /// Size of the allocation
        available: u64,
    },
    /// The driver refused the dmabuf
    #[error("the dmabuf could not be imported")]
    ImportRejected(#[source] AccessError),
    /// The driver refused the framebuffer
    #[error("the framebuffer could not be created")]
    FramebufferRegistrationFailed(#[source] AccessError),
}

impl ImportError {
    /// Returns true if the buffer was unusable in a way that points at a broken
    /// allocation or driver, rather than a buffer that was never meant for scan-out
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            ImportError::InvalidHandle { .. } | ImportError::UnsupportedFormat(_)
        )
    }
}

/// Gem handle, pitch and offset of one imported plane
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportedPlane {
    /// Gem handle of the memory backing the plane
    pub handle: buffer::Handle,
    /// Bytes per row
    pub pitch: u32,
    /// Offset into the memory
    pub offset: u32,
}

/// Reference counts of the gem handles held by imported buffers
#[derive(Debug, Default)]
struct GemHandles(Mutex<HashMap<buffer::Handle, usize>>);

impl GemHandles {
    fn import(&self, device: &impl KmsDevice, fd: BorrowedFd<'_>) -> io::Result<buffer::Handle> {
        let mut handles = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let handle = device.import_prime_fd(fd)?;
        *handles.entry(handle).or_insert(0) += 1;
        Ok(handle)
    }

    fn release(&self, device: &impl KmsDevice, handle: buffer::Handle) {
        let mut handles = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(count) = handles.get_mut(&handle) else {
            return;
        };
        *count -= 1;
        if *count > 0 {
            return;
        }

        handles.remove(&handle);
        trace!(?handle, "closing gem handle");
        if let Err(err) = device.close_buffer(handle) {
            warn!(?handle, ?err, "failed to close gem handle");
        }
    }
}

/// A gralloc buffer registered as a framebuffer
///
/// The framebuffer is destroyed on the device it was created on once this is dropped,
/// the gem handle is closed once no other imported buffer uses it.
pub struct ImportedBuffer<D: KmsDevice> {
    width: u32,
    height: u32,
    format: PixelFormat,
    fourcc: Fourcc,
    usage: Usage,
    handle: buffer::Handle,
    planes: SmallVec<[ImportedPlane; MAX_PLANES]>,
    fb: framebuffer::Handle,
    device: D,
    gem_handles: Arc<GemHandles>,
}

impl<D: KmsDevice> fmt::Debug for ImportedBuffer<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportedBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("fourcc", &self.fourcc)
            .field("usage", &self.usage)
            .field("handle", &self.handle)
            .field("planes", &self.planes)
            .field("fb", &self.fb)
            .finish_non_exhaustive()
    }
}

impl<D: KmsDevice> ImportedBuffer<D> {
    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel format as reported by the allocator
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Pixel format as registered with the driver
    pub fn fourcc(&self) -> Fourcc {
        self.fourcc
    }

    /// Usage flags of the source buffer
    pub fn usage(&self) -> Usage {
        self.usage
    }

    /// The planes of the buffer
    pub fn planes(&self) -> &[ImportedPlane] {
        &self.planes
    }

    /// Handle of the framebuffer
    pub fn framebuffer(&self) -> framebuffer::Handle {
        self.fb
    }
}

impl<D: KmsDevice> Drop for ImportedBuffer<D> {
    fn drop(&mut self) {
        trace!(fb = ?self.fb, "destroying framebuffer");
        if let Err(err) = self.device.destroy_framebuffer(self.fb) {
            warn!(fb = ?self.fb, ?err, "failed to destroy framebuffer");
        }
        self.gem_handles.release(&self.device, self.handle);
    }
}

/// Imports gralloc buffers into framebuffers of a single drm device
#[derive(Debug, Clone)]
pub struct BufferImporter<D: KmsDevice + Clone> {
    device: D,
    config: PlatformConfig,
    gem_handles: Arc<GemHandles>,
}

impl<D: KmsDevice + Clone> BufferImporter<D> {
    /// Create an importer for `device`
    pub fn new(device: D, config: PlatformConfig) -> Self {
        BufferImporter {
            device,
            config,
            gem_handles: Arc::default(),
        }
    }

    /// The underlying device
    pub fn device(&self) -> &D {
        &self.device
    }

    /// The platform configuration in use
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Check the geometry of a buffer
    ///
    /// Zero sized buffers, a zero stride and buffers exceeding the maximum resolution of
    /// the platform are rejected.
    pub fn check_buffer(&self, buffer: &impl GrallocHandle) -> Result<(), ImportError> {
        let (width, height, stride) = (buffer.width(), buffer.height(), buffer.stride());
        if !self.config.accepts_geometry(width, height, stride) {
            return Err(ImportError::InvalidHandle { width, height, stride });
        }
        Ok(())
    }

    /// Returns true if the buffer passes every check that does not involve the driver
    pub fn can_import(&self, buffer: &impl GrallocHandle) -> bool {
        self.check_buffer(buffer).is_ok()
            && self.config.is_scanout_capable(buffer.usage())
            && to_kernel_format(buffer.format()).is_ok()
    }

    /// Import a buffer and register it as a framebuffer
    ///
    /// Returns `Ok(None)` for buffers that were not allocated in scan-out capable memory.
    /// The driver is not called for buffers that fail validation.
    #[instrument(level = "trace", skip_all)]
    #[profiling::function]
    pub fn import_buffer(
        &self,
        buffer: &impl GrallocHandle,
    ) -> Result<Option<ImportedBuffer<D>>, ImportError> {
        self.check_buffer(buffer)?;

        let (width, height, stride, format, usage) = (
            buffer.width(),
            buffer.height(),
            buffer.stride(),
            buffer.format(),
            buffer.usage(),
        );
        if !self.config.is_scanout_capable(usage) {
            debug!(?usage, "buffer is not scan-out capable, skipping import");
            return Ok(None);
        }

        let fourcc = to_kernel_format(format)?;
        let layout = plane_layout(
            width,
            height,
            stride,
            fourcc,
            usage,
            self.config.chroma_alignment,
        )?;
        check_bounds(fourcc, &layout, buffer.allocation_size())?;

        let fd = buffer.fd();
        let handle = self.gem_handles.import(&self.device, fd).map_err(|source| {
            error!(
                ?fd,
                %format,
                width,
                height,
                stride,
                ?usage,
                ?source,
                "failed to import prime fd"
            );
            ImportError::ImportRejected(self.access_error("Failed to import prime fd", source))
        })?;

        let mut handles = [None; MAX_PLANES];
        for slot in handles.iter_mut().take(layout.num_planes()) {
            *slot = Some(handle);
        }
        let request = FramebufferRequest {
            size: (width, height),
            fourcc,
            handles,
            pitches: layout.pitches(),
            offsets: layout.offsets(),
        };

        let fb = self.device.add_planar_framebuffer(&request).map_err(|source| {
            self.gem_handles.release(&self.device, handle);
            error!(
                %fourcc,
                width,
                height,
                pitches = ?request.pitches,
                offsets = ?request.offsets,
                ?source,
                "failed to add framebuffer"
            );
            ImportError::FramebufferRegistrationFailed(self.access_error("Failed to add framebuffer", source))
        })?;
        trace!(?fb, %fourcc, width, height, planes = layout.num_planes(), "imported buffer");

        let planes = layout
            .planes()
            .iter()
            .map(|plane| ImportedPlane {
                handle,
                pitch: plane.pitch,
                offset: plane.offset,
            })
            .collect();

        Ok(Some(ImportedBuffer {
            width,
            height,
            format,
            fourcc,
            usage,
            handle,
            planes,
            fb,
            device: self.device.clone(),
            gem_handles: self.gem_handles.clone(),
        }))
    }

    fn access_error(&self, errmsg: &'static str, source: io::Error) -> AccessError {
        AccessError {
            errmsg,
            dev: self.device.dev_path(),
            source,
        }
    }
}

fn check_bounds(fourcc: Fourcc, layout: &BufferLayout, allocation: Option<u64>) -> Result<(), ImportError> {
    match allocation {
        Some(available) if layout.byte_len() > available => Err(ImportError::OutOfBounds {
            fourcc,
            required: layout.byte_len(),
            available,
        }),
        _ => Ok(()),
    }
}
