//! Backend helpers
//!
//! - [`allocator`] describes buffers handed out by a gralloc allocator and how their
//!   planes are laid out in memory.
//! - [`drm`] imports those buffers into framebuffers and assigns them to hardware planes.

pub mod allocator;
pub mod drm;
