//! Per-plane geometry of gralloc buffers.
//!
//! Gralloc only reports the stride of the first plane. For the planar YUV formats
//! the offsets and strides of the chroma planes follow from the allocator's fixed
//! alignment rules, which [`plane_layout`] reproduces so that every plane of the
//! buffer can be handed to the display driver.

use smallvec::SmallVec;

use super::{Fourcc, Usage, MAX_PLANES};

/// Alignment in bytes of the interleaved chroma plane of semi-planar formats
const SEMI_PLANAR_CHROMA_ALIGN: u32 = 16;

/// Alignment of the chroma stride of fully planar formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChromaAlignment {
    /// The same alignment regardless of how the buffer is accessed
    Fixed(u32),
    /// Finer alignment for buffers the cpu touches, coarser for device-only buffers
    ByAccess {
        /// Alignment if the usage flags carry any cpu read or write bit
        cpu: u32,
        /// Alignment for buffers only accessed by hardware
        device: u32,
    },
}

impl ChromaAlignment {
    /// A fixed alignment, `None` if `align` is not a power of two
    pub fn fixed(align: u32) -> Option<ChromaAlignment> {
        align.is_power_of_two().then_some(ChromaAlignment::Fixed(align))
    }

    /// An access dependent alignment, `None` if either value is not a power of two
    pub fn by_access(cpu: u32, device: u32) -> Option<ChromaAlignment> {
        (cpu.is_power_of_two() && device.is_power_of_two())
            .then_some(ChromaAlignment::ByAccess { cpu, device })
    }

    /// The alignment that applies to a buffer with the given usage
    pub fn for_usage(&self, usage: Usage) -> u32 {
        match *self {
            ChromaAlignment::Fixed(align) => align,
            ChromaAlignment::ByAccess { cpu, device } => {
                if usage.cpu_access() {
                    cpu
                } else {
                    device
                }
            }
        }
    }
}

impl Default for ChromaAlignment {
    fn default() -> Self {
        ChromaAlignment::ByAccess { cpu: 16, device: 128 }
    }
}

/// Pitch and offset of a single plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaneLayout {
    /// Bytes per row
    pub pitch: u32,
    /// Offset of the first byte of the plane from the start of the allocation
    pub offset: u32,
}

/// Geometry of all planes of a buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferLayout {
    planes: SmallVec<[PlaneLayout; MAX_PLANES]>,
    byte_len: u64,
}

impl BufferLayout {
    /// The planes in the order the driver expects them
    pub fn planes(&self) -> &[PlaneLayout] {
        &self.planes
    }

    /// Number of planes
    pub fn num_planes(&self) -> usize {
        self.planes.len()
    }

    /// Number of bytes from the start of the allocation to the end of the last plane
    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    /// Pitches padded to the four entries `ADDFB2` takes
    pub fn pitches(&self) -> [u32; MAX_PLANES] {
        let mut pitches = [0; MAX_PLANES];
        for (pitch, plane) in pitches.iter_mut().zip(self.planes.iter()) {
            *pitch = plane.pitch;
        }
        pitches
    }

    /// Offsets padded to the four entries `ADDFB2` takes
    pub fn offsets(&self) -> [u32; MAX_PLANES] {
        let mut offsets = [0; MAX_PLANES];
        for (offset, plane) in offsets.iter_mut().zip(self.planes.iter()) {
            *offset = plane.offset;
        }
        offsets
    }
}

/// Errors thrown by [`plane_layout`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// Computing the layout overflowed 32-bit offsets
    #[error("plane layout of {fourcc} with stride {stride} and height {height} does not fit into 32 bits")]
    Overflow {
        /// Format of the buffer
        fourcc: Fourcc,
        /// Stride of the first plane
        stride: u32,
        /// Height of the buffer
        height: u32,
    },
    /// The chroma alignment is not a power of two
    #[error("chroma alignment {0} is not a power of two")]
    InvalidAlignment(u32),
}

/// Round `value` up to a multiple of `align`, which has to be a power of two
#[inline]
fn align_up(value: u32, align: u32) -> Option<u32> {
    Some(value.checked_add(align - 1)? & !(align - 1))
}

/// Compute the pitch and offset of every plane of a buffer.
///
/// The first plane always starts at offset zero with the stride reported by the
/// allocator. `YVU420` gets a V plane followed by a U plane, both with the chroma
/// stride aligned as `alignment` dictates for `usage`. `NV12` and `NV21` get one
/// interleaved chroma plane. Every other format is treated as single plane.
///
/// `stride` and `height` have to be non-zero.
pub fn plane_layout(
    width: u32,
    height: u32,
    stride: u32,
    fourcc: Fourcc,
    usage: Usage,
    alignment: ChromaAlignment,
) -> Result<BufferLayout, LayoutError> {
    debug_assert!(stride != 0 && height != 0, "degenerate buffer {width}x{height}");

    let overflow = LayoutError::Overflow { fourcc, stride, height };
    let mut planes = SmallVec::new();
    planes.push(PlaneLayout { pitch: stride, offset: 0 });

    let byte_len = match fourcc {
        Fourcc::Yvu420 => {
            let align = alignment.for_usage(usage);
            if !align.is_power_of_two() {
                return Err(LayoutError::InvalidAlignment(align));
            }
            let adjusted_height = align_up(height, 2).ok_or(overflow)?;
            let y_size = adjusted_height.checked_mul(stride).ok_or(overflow)?;
            let vu_stride = align_up(stride / 2, align).ok_or(overflow)?;
            let v_size = vu_stride.checked_mul(adjusted_height / 2).ok_or(overflow)?;
            let u_offset = y_size.checked_add(v_size).ok_or(overflow)?;
            let end = u_offset.checked_add(v_size).ok_or(overflow)?;

            planes.push(PlaneLayout {
                pitch: vu_stride,
                offset: y_size,
            });
            planes.push(PlaneLayout {
                pitch: vu_stride,
                offset: u_offset,
            });
            end as u64
        }
        Fourcc::Nv12 | Fourcc::Nv21 => {
            let adjusted_height = align_up(height, 2).ok_or(overflow)?;
            let y_size = adjusted_height.checked_mul(stride).ok_or(overflow)?;
            let uv_stride = align_up(stride / 2, SEMI_PLANAR_CHROMA_ALIGN)
                .and_then(|s| s.checked_mul(2))
                .ok_or(overflow)?;

            planes.push(PlaneLayout {
                pitch: uv_stride,
                offset: y_size,
            });
            y_size as u64 + uv_stride as u64 * (adjusted_height / 2) as u64
        }
        _ => stride as u64 * height as u64,
    };

    Ok(BufferLayout { planes, byte_len })
}
