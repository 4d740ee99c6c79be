use std::{
    io,
    os::unix::io::{AsFd, AsRawFd, BorrowedFd, OwnedFd},
    path::PathBuf,
    sync::Arc,
};

use drm::control::{crtc, framebuffer, plane, Device as ControlDevice, FbCmd2Flags, PlaneType};
use drm::{buffer, ClientCapability, Device as BasicDevice};
use tracing::{debug, info, trace, warn};

use super::{FramebufferRequest, KmsDevice};
use crate::backend::allocator::Fourcc;
use crate::backend::drm::{error::AccessError, PlaneInfo, PlanePool};

/// Ref-counted file descriptor of an open drm device
///
/// Cloning is cheap, every clone refers to the same open device. Imported buffers keep
/// a clone around to release their framebuffer.
#[derive(Debug, Clone)]
pub struct DrmDeviceFd(Arc<OwnedFd>);

impl PartialEq for DrmDeviceFd {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.0.as_raw_fd() == other.0.as_raw_fd()
    }
}

impl AsFd for DrmDeviceFd {
    #[inline]
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.0.as_fd()
    }
}

impl BasicDevice for DrmDeviceFd {}
impl ControlDevice for DrmDeviceFd {}

impl DrmDeviceFd {
    /// Wrap an open drm node
    ///
    /// Universal planes are enabled on the device, otherwise the kernel hides the
    /// primary plane of every crtc.
    pub fn new(fd: OwnedFd) -> DrmDeviceFd {
        let dev = DrmDeviceFd(Arc::new(fd));
        info!(dev = ?KmsDevice::dev_path(&dev), "DrmDeviceFd initializing");

        if let Err(err) = dev.set_client_capability(ClientCapability::UniversalPlanes, true) {
            warn!(?err, "Unable to enable universal planes, only overlay planes will be listed");
        }

        dev
    }

    fn access_error(&self, errmsg: &'static str, source: io::Error) -> AccessError {
        AccessError {
            errmsg,
            dev: KmsDevice::dev_path(self),
            source,
        }
    }

    /// Planes that can be attached to `crtc`, in the order the driver lists them
    ///
    /// Cursor planes are skipped, as are formats without a known fourcc.
    pub fn planes_for_crtc(&self, crtc: crtc::Handle) -> Result<PlanePool, AccessError> {
        let resources = self
            .resource_handles()
            .map_err(|source| self.access_error("Error loading resource handles", source))?;
        let handles = self
            .plane_handles()
            .map_err(|source| self.access_error("Error loading plane handles", source))?;

        let mut planes = Vec::with_capacity(handles.len());
        for handle in handles {
            let info = self
                .get_plane(handle)
                .map_err(|source| self.access_error("Failed to get plane info", source))?;
            if !resources.filter_crtcs(info.possible_crtcs()).contains(&crtc) {
                continue;
            }

            let type_ = self.plane_type(handle)?;
            if type_ == PlaneType::Cursor {
                continue;
            }

            let formats = info
                .formats()
                .iter()
                .filter_map(|&code| Fourcc::try_from(code).ok())
                .collect::<Vec<_>>();
            trace!(plane = ?handle, ?type_, formats = formats.len(), "found plane for crtc");
            planes.push(PlaneInfo::new(handle, type_, formats));
        }

        debug!(?crtc, planes = planes.len(), "loaded planes");
        Ok(PlanePool::new(planes))
    }

    fn plane_type(&self, plane: plane::Handle) -> Result<PlaneType, AccessError> {
        let props = self
            .get_properties(plane)
            .map_err(|source| self.access_error("Failed to get properties of plane", source))?;
        let (ids, vals) = props.as_props_and_values();
        for (&id, &val) in ids.iter().zip(vals.iter()) {
            let info = self
                .get_property(id)
                .map_err(|source| self.access_error("Failed to get property info", source))?;
            if info.name().to_str().map(|x| x == "type").unwrap_or(false) {
                return Ok(match val {
                    x if x == (PlaneType::Primary as u32).into() => PlaneType::Primary,
                    x if x == (PlaneType::Cursor as u32).into() => PlaneType::Cursor,
                    _ => PlaneType::Overlay,
                });
            }
        }
        Ok(PlaneType::Overlay)
    }
}

impl KmsDevice for DrmDeviceFd {
    fn import_prime_fd(&self, fd: BorrowedFd<'_>) -> io::Result<buffer::Handle> {
        self.prime_fd_to_buffer(fd)
    }

    fn add_planar_framebuffer(&self, request: &FramebufferRequest) -> io::Result<framebuffer::Handle> {
        ControlDevice::add_planar_framebuffer(self, request, FbCmd2Flags::empty())
    }

    fn destroy_framebuffer(&self, fb: framebuffer::Handle) -> io::Result<()> {
        ControlDevice::destroy_framebuffer(self, fb)
    }

    fn close_buffer(&self, handle: buffer::Handle) -> io::Result<()> {
        ControlDevice::close_buffer(self, handle)
    }

    fn dev_path(&self) -> Option<PathBuf> {
        std::fs::read_link(format!("/proc/self/fd/{:?}", self.0.as_raw_fd())).ok()
    }
}
