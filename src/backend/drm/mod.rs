//! Drm/Kms scan-out of gralloc buffers
//!
//! This module imports buffers described by a gralloc allocator into framebuffers of a
//! drm device and decides which layers of a frame can be shown directly on a hardware
//! plane instead of being composited by the gpu.
//!
//! ## How to use it
//!
//! ### Initialization
//!
//! Open the drm node and wrap it into a [`DrmDeviceFd`]. Pick a [`PlatformConfig`]
//! for the display engine, either one of the presets or through
//! [`PlatformConfig::from_env`], and create a [`BufferImporter`] and a
//! [`PlaneProvisioner`] from it.
//!
//! ### Per frame
//!
//! Query the planes of the crtc through [`DrmDeviceFd::planes_for_crtc`], hand the
//! layers of the frame to [`PlaneProvisioner::provision`] and import the buffers of the
//! layers that got a plane. A [`FramebufferCache`] avoids importing the same buffer
//! every frame.
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::fs::OpenOptions;
//!
//! use indexmap::IndexMap;
//! use scanout::backend::allocator::GrallocBuffer;
//! use scanout::backend::drm::{
//!     BufferImporter, DrmDeviceFd, FramebufferCache, Layer, PlaneProvisioner, PlatformConfig,
//! };
//!
//! # fn buffers() -> HashMap<u64, GrallocBuffer> { unimplemented!() }
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = OpenOptions::new().read(true).write(true).open("/dev/dri/card0")?;
//! let device = DrmDeviceFd::new(file.into());
//! let config = PlatformConfig::from_env();
//! let importer = BufferImporter::new(device.clone(), config.clone());
//! let provisioner = PlaneProvisioner::new(config);
//! let mut cache = FramebufferCache::new();
//!
//! # let crtc = drm::control::from_u32(1).unwrap();
//! // buffers of the frame, keyed by surface id
//! let buffers = buffers();
//! let mut layers = buffers
//!     .iter()
//!     .map(|(id, buffer)| (*id, Layer::new(buffer)))
//!     .collect::<IndexMap<_, _>>();
//! let mut planes = device.planes_for_crtc(crtc)?;
//! for assignment in provisioner.provision(&mut layers, crtc, &mut planes)? {
//!     let buffer = &buffers[&assignment.source];
//!     if let Some(fb) = cache.get_or_import(&assignment.source, 0, buffer, &importer)? {
//!         println!("{:?} shows {:?}", assignment.plane, fb.framebuffer());
//!     }
//! }
//! // everything left in `layers` needs to be rendered
//! # Ok(())
//! # }
//! ```
//!
//! ## Logging
//!
//! Imports and plane assignments are traced through the `tracing` crate. Failed imports
//! caused by the driver are reported at the `error` level, skipped buffers and layers
//! at `debug` and `trace`.

pub mod config;
pub mod device;
pub mod error;

mod cache;
mod import;
mod planes;
mod planner;
#[cfg(test)]
mod testing;

pub use self::cache::{CachedImport, FramebufferCache};
pub use self::config::{ExhaustionPolicy, PlatformConfig};
pub use self::device::{DrmDeviceFd, FramebufferRequest, KmsDevice};
pub use self::error::AccessError;
pub use self::import::{BufferImporter, ImportError, ImportedBuffer, ImportedPlane};
pub use self::planes::{PlaneInfo, PlanePool};
pub use self::planner::{
    AssignmentKind, Layer, PlaneAssignment, PlaneProvisioner, ProvisionError, ScanoutCandidate,
};
