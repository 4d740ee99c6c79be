//! Per-platform tuning of import and plane provisioning
//!
//! Display engines differ in how their allocator aligns chroma planes, which planes may
//! show RGB content and which buffers live in scan-out capable memory. All of that is
//! captured in a [`PlatformConfig`] that is chosen once at startup and handed to the
//! [`BufferImporter`](super::BufferImporter) and the
//! [`PlaneProvisioner`](super::PlaneProvisioner).
//!
//! Two environment variables are honored by [`PlatformConfig::from_env`]:
//!
//! - `SCANOUT_PLATFORM` selects a preset, one of `generic`, `hisi` or `zynqmp`.
//! - `SCANOUT_FORCE_GPU` disables plane assignment entirely when set to `1`, `true`,
//!   `yes` or `y`.

use tracing::{info, warn};

use crate::backend::allocator::{layout::ChromaAlignment, Usage};

/// What to do once no compatible plane is left for a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExhaustionPolicy {
    /// Leave the layer to the gpu and keep scanning the remaining layers
    #[default]
    SkipLayer,
    /// End the pass as soon as the pool runs empty
    StopScan,
}

/// Hardware specific knobs of the importer and the planner
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformConfig {
    /// Alignment of the chroma stride of fully planar buffers
    pub chroma_alignment: ChromaAlignment,
    /// RGB layers may only be placed on the primary plane
    pub rgb_primary_only: bool,
    /// Fail frames with at most one layer that got no plane at all
    pub single_layer_safeguard: bool,
    /// Usage bits marking a buffer as scan-out capable
    ///
    /// A buffer carrying none of them is silently left to the gpu. An empty set
    /// disables the check.
    pub scanout_usage: Usage,
    /// Behavior once the plane pool is exhausted
    pub exhaustion: ExhaustionPolicy,
    /// Largest buffer the display engine accepts, `None` for no limit
    pub max_resolution: Option<(u32, u32)>,
    /// Never assign any plane
    pub force_gpu: bool,
}

impl PlatformConfig {
    /// Defaults for display engines without special requirements
    pub fn generic() -> PlatformConfig {
        PlatformConfig {
            chroma_alignment: ChromaAlignment::default(),
            rgb_primary_only: true,
            single_layer_safeguard: true,
            scanout_usage: Usage::HW_FB | Usage::HW_CAMERA_WRITE,
            exhaustion: ExhaustionPolicy::SkipLayer,
            max_resolution: None,
            force_gpu: false,
        }
    }

    /// HiSilicon Kirin display engines
    ///
    /// Only buffers allocated for the framebuffer can be scanned out, there is no
    /// restriction on which plane shows RGB content and planes are handed out until
    /// none are left.
    pub fn hisi() -> PlatformConfig {
        PlatformConfig {
            rgb_primary_only: false,
            single_layer_safeguard: false,
            scanout_usage: Usage::HW_FB,
            exhaustion: ExhaustionPolicy::StopScan,
            ..PlatformConfig::generic()
        }
    }

    /// Xilinx ZynqMP display port subsystem
    ///
    /// The allocator aligns chroma planes to 16 bytes regardless of usage and every
    /// buffer lives in contiguous memory. The video plane does not show RGB.
    ///
    /// Buffers are checked against the mode config limits of the device, which have to
    /// be supplied through [`PlatformConfig::with_max_resolution`].
    pub fn zynqmp() -> PlatformConfig {
        PlatformConfig {
            chroma_alignment: ChromaAlignment::Fixed(16),
            scanout_usage: Usage::empty(),
            ..PlatformConfig::generic()
        }
    }

    /// Set the maximum buffer size the display engine accepts
    pub fn with_max_resolution(mut self, width: u32, height: u32) -> Self {
        self.max_resolution = Some((width, height));
        self
    }

    /// Preset selected by `SCANOUT_PLATFORM`, with `SCANOUT_FORCE_GPU` applied
    pub fn from_env() -> PlatformConfig {
        let mut config = match std::env::var("SCANOUT_PLATFORM") {
            Ok(platform) => match Self::preset(&platform) {
                Some(config) => config,
                None => {
                    warn!(%platform, "SCANOUT_PLATFORM was set to an unknown platform, using generic");
                    PlatformConfig::generic()
                }
            },
            Err(_) => PlatformConfig::generic(),
        };

        config.force_gpu = std::env::var("SCANOUT_FORCE_GPU")
            .map(|x| is_truthy(&x))
            .unwrap_or(false);
        if config.force_gpu {
            info!("SCANOUT_FORCE_GPU is set. Disabling plane assignment.");
        }

        config
    }

    /// Look up a preset by name
    pub fn preset(name: &str) -> Option<PlatformConfig> {
        match &*name.to_lowercase() {
            "generic" => Some(PlatformConfig::generic()),
            "hisi" => Some(PlatformConfig::hisi()),
            "zynqmp" => Some(PlatformConfig::zynqmp()),
            _ => None,
        }
    }

    /// Returns true if a buffer of this geometry can be shown at all
    ///
    /// Zero sized buffers, a zero stride and buffers exceeding the maximum resolution
    /// are rejected.
    pub fn accepts_geometry(&self, width: u32, height: u32, stride: u32) -> bool {
        let too_large = self
            .max_resolution
            .map(|(max_w, max_h)| width > max_w || height > max_h)
            .unwrap_or(false);
        width != 0 && height != 0 && stride != 0 && !too_large
    }

    /// Returns true if the usage marks a buffer the display engine can scan out
    pub fn is_scanout_capable(&self, usage: Usage) -> bool {
        self.scanout_usage.is_empty() || usage.intersects(self.scanout_usage)
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        PlatformConfig::generic()
    }
}

fn is_truthy(value: &str) -> bool {
    let value = value.to_lowercase();
    value == "1" || value == "true" || value == "yes" || value == "y"
}
