//! Buffer metadata and layout.
//!
//! Collection of common types and helpers around the buffers a platform
//! allocator hands to the compositor.
//!
//! Provided:
//! - [`GrallocHandle`] describing what the importer needs from an allocator buffer
//! - [`format`] tables translating [`PixelFormat`]s into DRM [`Fourcc`]s
//! - [`layout`] computing the pitch and offset of every plane of a buffer

pub mod format;
pub mod gralloc;
pub mod layout;

pub use gralloc::{GrallocBuffer, GrallocHandle, PixelFormat, Usage};

pub use drm_fourcc::{DrmFourcc as Fourcc, DrmModifier as Modifier, UnrecognizedFourcc};

/// Maximum amount of planes a framebuffer may reference
pub const MAX_PLANES: usize = 4;
