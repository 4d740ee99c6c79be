//! Platform buffer handles as handed out by the gralloc allocator.
//!
//! The allocator is not part of this crate. What the importer and the planner need
//! from it is captured by the [`GrallocHandle`] trait: the geometry, the logical
//! [`PixelFormat`], the [`Usage`] the buffer was allocated for and a shareable
//! dmabuf file descriptor.
//!
//! [`GrallocBuffer`] is a plain owned implementation for callers that decode the
//! vendor handle themselves.

use std::fmt;
use std::os::unix::io::{AsFd, BorrowedFd, OwnedFd};

/// Logical pixel format as reported by the allocator
///
/// This is a transparent wrapper around the raw code, so vendor specific formats
/// this crate knows nothing about can still be represented and reported.
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PixelFormat(pub u32);

impl PixelFormat {
    /// 32-bit RGBA, 8 bits per channel
    pub const RGBA_8888: PixelFormat = PixelFormat(1);
    /// 32-bit RGB with an unused padding byte
    pub const RGBX_8888: PixelFormat = PixelFormat(2);
    /// Packed 24-bit RGB
    pub const RGB_888: PixelFormat = PixelFormat(3);
    /// Packed 16-bit RGB
    pub const RGB_565: PixelFormat = PixelFormat(4);
    /// 32-bit BGRA, 8 bits per channel
    pub const BGRA_8888: PixelFormat = PixelFormat(5);
    /// Semi-planar 4:2:0 YUV, interleaved chroma plane
    pub const YCRCB_420_SP: PixelFormat = PixelFormat(0x11);
    /// Semi-planar 4:2:0 YUV under the vendor code several allocators still hand out
    pub const YCBCR_420_SP: PixelFormat = PixelFormat(0x109);
    /// Fully planar 4:2:0 YUV, V plane before U plane
    pub const YV12: PixelFormat = PixelFormat(0x3231_5659);

    /// Raw allocator code of this format
    pub fn raw(self) -> u32 {
        self.0
    }

    fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::RGBA_8888 => "RGBA_8888",
            Self::RGBX_8888 => "RGBX_8888",
            Self::RGB_888 => "RGB_888",
            Self::RGB_565 => "RGB_565",
            Self::BGRA_8888 => "BGRA_8888",
            Self::YCRCB_420_SP => "YCrCb_420_SP",
            Self::YCBCR_420_SP => "YCbCr_420_SP",
            Self::YV12 => "YV12",
            _ => return None,
        })
    }
}

impl fmt::Debug for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "PixelFormat({:#x})", self.0),
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl From<u32> for PixelFormat {
    fn from(raw: u32) -> Self {
        PixelFormat(raw)
    }
}

bitflags::bitflags! {
    /// Usage flags a buffer was allocated with
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct Usage: u32 {
        /// The cpu reads the buffer rarely
        const SW_READ_RARELY = 0x0000_0002;
        /// The cpu reads the buffer often
        const SW_READ_OFTEN = 0x0000_0003;
        /// The cpu writes the buffer rarely
        const SW_WRITE_RARELY = 0x0000_0020;
        /// The cpu writes the buffer often
        const SW_WRITE_OFTEN = 0x0000_0030;
        /// Sampled by the gpu
        const HW_TEXTURE = 0x0000_0100;
        /// Rendered to by the gpu
        const HW_RENDER = 0x0000_0200;
        /// Used by a 2D blitter
        const HW_2D = 0x0000_0400;
        /// Used by the hardware composer
        const HW_COMPOSER = 0x0000_0800;
        /// Backed by scanout-capable memory
        const HW_FB = 0x0000_1000;
        /// Shown on an external display
        const EXTERNAL_DISP = 0x0000_2000;
        /// Content protected
        const PROTECTED = 0x0000_4000;
        /// Used as a cursor image
        const CURSOR = 0x0000_8000;
        /// Read by a video encoder
        const HW_VIDEO_ENCODER = 0x0001_0000;
        /// Written by the camera pipeline
        const HW_CAMERA_WRITE = 0x0002_0000;
        /// Read by the camera pipeline
        const HW_CAMERA_READ = 0x0004_0000;
    }
}

impl Usage {
    const SW_READ_MASK: u32 = 0x0000_000f;
    const SW_WRITE_MASK: u32 = 0x0000_00f0;

    /// Returns true if the cpu reads or writes the buffer
    pub fn cpu_access(self) -> bool {
        self.bits() & (Self::SW_READ_MASK | Self::SW_WRITE_MASK) != 0
    }

    /// Returns true if the buffer lives in memory the display engine can scan out
    pub fn is_scanout(self) -> bool {
        self.contains(Usage::HW_FB)
    }
}

/// Metadata of a platform buffer handle
pub trait GrallocHandle {
    /// Width in pixels
    fn width(&self) -> u32;
    /// Height in pixels
    fn height(&self) -> u32;
    /// Logical pixel format
    fn format(&self) -> PixelFormat;
    /// Stride of the first plane in bytes
    fn stride(&self) -> u32;
    /// Usage flags the buffer was allocated with
    fn usage(&self) -> Usage;
    /// Shareable dmabuf file descriptor backing all planes of the buffer
    fn fd(&self) -> BorrowedFd<'_>;
    /// Size of the backing allocation in bytes, if the allocator reports it
    fn allocation_size(&self) -> Option<u64> {
        None
    }
}

impl<T: GrallocHandle + ?Sized> GrallocHandle for &T {
    fn width(&self) -> u32 {
        (**self).width()
    }
    fn height(&self) -> u32 {
        (**self).height()
    }
    fn format(&self) -> PixelFormat {
        (**self).format()
    }
    fn stride(&self) -> u32 {
        (**self).stride()
    }
    fn usage(&self) -> Usage {
        (**self).usage()
    }
    fn fd(&self) -> BorrowedFd<'_> {
        (**self).fd()
    }
    fn allocation_size(&self) -> Option<u64> {
        (**self).allocation_size()
    }
}

/// An owned, already decoded gralloc buffer
#[derive(Debug)]
pub struct GrallocBuffer {
    fd: OwnedFd,
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: u32,
    usage: Usage,
    size: Option<u64>,
}

impl GrallocBuffer {
    /// Wrap a dmabuf fd with the metadata the allocator reported for it
    pub fn new(
        fd: OwnedFd,
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: u32,
        usage: Usage,
    ) -> GrallocBuffer {
        GrallocBuffer {
            fd,
            width,
            height,
            format,
            stride,
            usage,
            size: None,
        }
    }

    /// Record the size of the backing allocation
    pub fn with_allocation_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Give up the wrapper and return the dmabuf fd
    pub fn into_fd(self) -> OwnedFd {
        self.fd
    }

    /// A buffer backed by `/dev/null` instead of a dmabuf
    #[cfg(test)]
    pub(crate) fn dummy(
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: u32,
        usage: Usage,
    ) -> GrallocBuffer {
        let fd = std::fs::File::open("/dev/null").expect("failed to open /dev/null");
        GrallocBuffer::new(fd.into(), width, height, format, stride, usage)
    }
}

impl AsFd for GrallocBuffer {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
}

impl GrallocHandle for GrallocBuffer {
    fn width(&self) -> u32 {
        self.width
    }
    fn height(&self) -> u32 {
        self.height
    }
    fn format(&self) -> PixelFormat {
        self.format
    }
    fn stride(&self) -> u32 {
        self.stride
    }
    fn usage(&self) -> Usage {
        self.usage
    }
    fn fd(&self) -> BorrowedFd<'_> {
        self.fd.as_fd()
    }
    fn allocation_size(&self) -> Option<u64> {
        self.size
    }
}
