//! The parts of a drm device the importer talks to

use std::io;
use std::os::unix::io::BorrowedFd;
use std::path::PathBuf;

use drm::buffer::{self, PlanarBuffer};
use drm::control::framebuffer;

use crate::backend::allocator::{Fourcc, Modifier, MAX_PLANES};

mod fd;
pub use fd::DrmDeviceFd;

/// Kernel mode-setting operations needed to turn a dmabuf into a framebuffer
///
/// Implemented for [`DrmDeviceFd`]. Every operation is a single blocking ioctl.
pub trait KmsDevice {
    /// Map a shared dmabuf fd to a gem handle on this device
    fn import_prime_fd(&self, fd: BorrowedFd<'_>) -> io::Result<buffer::Handle>;

    /// Register a framebuffer for a multi-planar buffer
    fn add_planar_framebuffer(&self, request: &FramebufferRequest) -> io::Result<framebuffer::Handle>;

    /// Release a framebuffer again
    fn destroy_framebuffer(&self, fb: framebuffer::Handle) -> io::Result<()>;

    /// Close a gem handle, dropping the reference it holds on the dmabuf
    fn close_buffer(&self, handle: buffer::Handle) -> io::Result<()>;

    /// Path of the device node for diagnostics
    fn dev_path(&self) -> Option<PathBuf> {
        None
    }
}

impl<D: KmsDevice + ?Sized> KmsDevice for &D {
    fn import_prime_fd(&self, fd: BorrowedFd<'_>) -> io::Result<buffer::Handle> {
        (**self).import_prime_fd(fd)
    }

    fn add_planar_framebuffer(&self, request: &FramebufferRequest) -> io::Result<framebuffer::Handle> {
        (**self).add_planar_framebuffer(request)
    }

    fn destroy_framebuffer(&self, fb: framebuffer::Handle) -> io::Result<()> {
        (**self).destroy_framebuffer(fb)
    }

    fn close_buffer(&self, handle: buffer::Handle) -> io::Result<()> {
        (**self).close_buffer(handle)
    }

    fn dev_path(&self) -> Option<PathBuf> {
        (**self).dev_path()
    }
}

/// Arguments of an `ADDFB2` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramebufferRequest {
    /// Width and height in pixels
    pub size: (u32, u32),
    /// Pixel format
    pub fourcc: Fourcc,
    /// Gem handle per plane, `None` for unused planes
    pub handles: [Option<buffer::Handle>; MAX_PLANES],
    /// Pitch per plane
    pub pitches: [u32; MAX_PLANES],
    /// Offset per plane
    pub offsets: [u32; MAX_PLANES],
}

impl PlanarBuffer for FramebufferRequest {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn format(&self) -> Fourcc {
        self.fourcc
    }

    fn modifier(&self) -> Option<Modifier> {
        None
    }

    fn pitches(&self) -> [u32; 4] {
        self.pitches
    }

    fn handles(&self) -> [Option<buffer::Handle>; 4] {
        self.handles
    }

    fn offsets(&self) -> [u32; 4] {
        self.offsets
    }
}
