//! Assigning layers to hardware planes
//!
//! The [`PlaneProvisioner`] walks the layers of a frame once, in order, and hands every
//! layer it can to a free plane of the crtc. Layers that stay in the map afterwards
//! have to be composited by the gpu.

use std::fmt;
use std::hash::Hash;

use drm::control::{crtc, plane};
use indexmap::IndexMap;
use tracing::{debug, instrument, trace};

use super::{
    config::{ExhaustionPolicy, PlatformConfig},
    planes::PlanePool,
};
use crate::backend::allocator::{
    format::{is_rgb, to_kernel_format},
    GrallocHandle,
};

/// Something that may be shown on a plane
pub trait ScanoutCandidate {
    /// Buffer type backing the content
    type Buffer: GrallocHandle;

    /// The buffer to scan out, `None` if the content has to be rendered
    fn buffer(&self) -> Option<&Self::Buffer>;
}

impl<T: ScanoutCandidate + ?Sized> ScanoutCandidate for &T {
    type Buffer = T::Buffer;

    fn buffer(&self) -> Option<&Self::Buffer> {
        (**self).buffer()
    }
}

/// A plain layer of a frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer<B> {
    /// Buffer attached to the layer
    pub buffer: Option<B>,
}

impl<B> Layer<B> {
    /// A layer showing `buffer`
    pub fn new(buffer: B) -> Self {
        Layer { buffer: Some(buffer) }
    }

    /// A layer without a buffer, for example a solid color
    pub fn without_buffer() -> Self {
        Layer { buffer: None }
    }
}

impl<B: GrallocHandle> ScanoutCandidate for Layer<B> {
    type Buffer = B;

    fn buffer(&self) -> Option<&B> {
        self.buffer.as_ref()
    }
}

/// What a plane is used for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssignmentKind {
    /// The plane directly shows a layer
    Layer,
}

/// A plane taken for a layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneAssignment<K> {
    /// What the plane is used for
    pub kind: AssignmentKind,
    /// The plane
    pub plane: plane::Handle,
    /// The crtc the plane is attached to
    pub crtc: crtc::Handle,
    /// Key of the layer shown on the plane
    pub source: K,
}

/// Errors thrown by [`PlaneProvisioner::provision`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ProvisionError {
    /// A frame of at most a single layer could not be put on any plane
    #[error("no plane can show the frame of {layers} layer(s)")]
    NoViableComposition {
        /// Number of layers of the frame
        layers: usize,
    },
}

/// Greedy assignment of layers to planes
#[derive(Debug, Clone, Default)]
pub struct PlaneProvisioner {
    config: PlatformConfig,
}

impl PlaneProvisioner {
    /// Create a provisioner for the given platform
    pub fn new(config: PlatformConfig) -> Self {
        PlaneProvisioner { config }
    }

    /// The platform configuration in use
    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Assign as many `layers` as possible to planes out of `pool`
    ///
    /// Layers are visited in map order. Every layer that got a plane is removed from
    /// `layers` and its plane from `pool`, everything left over in `layers` falls back
    /// to gpu composition.
    ///
    /// RGB content is restricted to the primary plane if the platform asks for it, any
    /// other format takes the first plane in pool order that supports it.
    #[instrument(level = "trace", skip_all, fields(crtc = ?crtc))]
    #[profiling::function]
    pub fn provision<K, L>(
        &self,
        layers: &mut IndexMap<K, L>,
        crtc: crtc::Handle,
        pool: &mut PlanePool,
    ) -> Result<Vec<PlaneAssignment<K>>, ProvisionError>
    where
        K: Hash + Eq + Clone + fmt::Debug,
        L: ScanoutCandidate,
    {
        let layer_count = layers.len();
        let mut assignments = Vec::new();

        if self.config.force_gpu {
            trace!("plane assignment disabled");
        } else {
            for (key, layer) in layers.iter() {
                if self.config.exhaustion == ExhaustionPolicy::StopScan && pool.is_empty() {
                    trace!("no planes left, stopping");
                    break;
                }

                let Some(buffer) = layer.buffer() else {
                    trace!(?key, "layer has no buffer, skipping");
                    continue;
                };
                if !self
                    .config
                    .accepts_geometry(buffer.width(), buffer.height(), buffer.stride())
                {
                    trace!(
                        ?key,
                        width = buffer.width(),
                        height = buffer.height(),
                        stride = buffer.stride(),
                        "buffer geometry is not supported, skipping"
                    );
                    continue;
                }
                if !self.config.is_scanout_capable(buffer.usage()) {
                    trace!(?key, usage = ?buffer.usage(), "buffer is not scan-out capable, skipping");
                    continue;
                }
                let fourcc = match to_kernel_format(buffer.format()) {
                    Ok(fourcc) => fourcc,
                    Err(err) => {
                        trace!(?key, %err, "skipping layer");
                        continue;
                    }
                };

                let primary_only = self.config.rgb_primary_only && is_rgb(fourcc);
                if let Some(plane) = pool.pop_for_format(fourcc, primary_only) {
                    trace!(?key, plane = ?plane.handle, %fourcc, "assigned layer");
                    assignments.push(PlaneAssignment {
                        kind: AssignmentKind::Layer,
                        plane: plane.handle,
                        crtc,
                        source: key.clone(),
                    });
                }
            }

            for assignment in &assignments {
                layers.shift_remove(&assignment.source);
            }
        }

        if self.config.single_layer_safeguard && layer_count <= 1 && assignments.is_empty() {
            debug!(layers = layer_count, "frame cannot be shown on any plane");
            return Err(ProvisionError::NoViableComposition { layers: layer_count });
        }

        debug!(
            assigned = assignments.len(),
            remaining = layers.len(),
            "provisioned planes"
        );
        Ok(assignments)
    }
}
