#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![warn(missing_docs, missing_debug_implementations, rust_2018_idioms)]
// Allow acronyms like RGBA
#![allow(clippy::upper_case_acronyms)]

//! # Scanout: hardware planes for gralloc buffers
//!
//! This crate takes the buffers a compositor wants to show in a frame, as described by an
//! Android style gralloc allocator, and puts as many of them as possible directly onto
//! hardware planes of a drm device. Everything that does not fit is left to the gpu.
//!
//! ## Structure of the crate
//!
//! - [`backend::allocator`] contains the description of gralloc buffers: pixel formats,
//!   usage flags, the translation to drm fourcc codes and the reconstruction of the
//!   plane geometry of multi-planar buffers.
//! - [`backend::drm`] contains the device side: importing buffers into framebuffers,
//!   caching them across frames, listing the planes of a crtc and assigning layers to
//!   them.
//!
//! Hardware specific behavior is selected through a
//! [`PlatformConfig`](backend::drm::PlatformConfig) once at startup.
//!
//! ### Logging
//!
//! Diagnostics go through [`tracing`], no subscriber is installed by the crate.
//!
//! - `error`: the driver rejected a dmabuf or a framebuffer, with the buffer's format,
//!   geometry and usage attached
//! - `warn`: releasing a framebuffer or gem handle failed, or an environment override
//!   could not be parsed
//! - `debug`: buffers skipped for their usage flags and the outcome of every
//!   provisioning pass
//! - `trace`: per layer and per plane decisions, plus a span around every import and
//!   provisioning pass
//!
//! The per layer output is verbose. Release builds can compile it out with
//! `tracing`'s `release_max_level_debug` feature.

pub mod backend;
