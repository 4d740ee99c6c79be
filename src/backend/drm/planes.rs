//! Hardware planes available for scan-out on a crtc

use drm::control::{plane, PlaneType};
use indexmap::IndexSet;
use tracing::trace;

use crate::backend::allocator::Fourcc;

/// Info about a single plane
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaneInfo {
    /// Handle of the plane
    pub handle: plane::Handle,
    /// Type of the plane
    pub type_: PlaneType,
    /// Formats the plane can scan out, in driver order
    pub formats: IndexSet<Fourcc>,
}

impl PlaneInfo {
    /// Create a new plane info
    pub fn new(handle: plane::Handle, type_: PlaneType, formats: impl IntoIterator<Item = Fourcc>) -> Self {
        PlaneInfo {
            handle,
            type_,
            formats: formats.into_iter().collect(),
        }
    }

    /// Returns true if the plane advertises the format
    pub fn supports(&self, fourcc: Fourcc) -> bool {
        self.formats.contains(&fourcc)
    }

    /// Returns true for the primary plane
    pub fn is_primary(&self) -> bool {
        self.type_ == PlaneType::Primary
    }
}

/// Pool of free planes for a single frame
///
/// Planes keep the order they were inserted in. Taking a plane out of the pool leaves
/// a hole in its slot, so the order of the remaining planes never changes and removal
/// is constant time.
#[derive(Debug, Clone, Default)]
pub struct PlanePool {
    slots: Vec<Option<PlaneInfo>>,
    free: usize,
}

impl PlanePool {
    /// Create a pool from planes in priority order
    pub fn new(planes: impl IntoIterator<Item = PlaneInfo>) -> Self {
        let slots = planes.into_iter().map(Some).collect::<Vec<_>>();
        let free = slots.len();
        PlanePool { slots, free }
    }

    /// Number of planes left in the pool
    pub fn len(&self) -> usize {
        self.free
    }

    /// Returns true if every plane was taken
    pub fn is_empty(&self) -> bool {
        self.free == 0
    }

    /// Iterate over the remaining planes in pool order
    pub fn iter(&self) -> impl Iterator<Item = &PlaneInfo> {
        self.slots.iter().flatten()
    }

    /// Slot of the first remaining plane matching `pred`
    pub fn position(&self, mut pred: impl FnMut(&PlaneInfo) -> bool) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.as_ref().map(&mut pred).unwrap_or(false))
    }

    /// Remove the plane in `slot` from the pool
    pub fn take(&mut self, slot: usize) -> Option<PlaneInfo> {
        let plane = self.slots.get_mut(slot)?.take()?;
        self.free -= 1;
        Some(plane)
    }

    /// Remove and return the first plane that can show `fourcc`
    ///
    /// With `primary_only` set the first primary plane is returned, whatever formats
    /// it advertises.
    pub fn pop_for_format(&mut self, fourcc: Fourcc, primary_only: bool) -> Option<PlaneInfo> {
        let slot = if primary_only {
            self.position(PlaneInfo::is_primary)
        } else {
            self.position(|plane| plane.supports(fourcc))
        };

        match slot.and_then(|slot| self.take(slot)) {
            Some(plane) => {
                trace!(plane = ?plane.handle, %fourcc, "found plane for format");
                Some(plane)
            }
            None => {
                trace!(%fourcc, primary_only, "no plane left for format");
                None
            }
        }
    }
}

impl FromIterator<PlaneInfo> for PlanePool {
    fn from_iter<T: IntoIterator<Item = PlaneInfo>>(iter: T) -> Self {
        PlanePool::new(iter)
    }
}

#[cfg(test)]
mod tests {
    use drm::control::{from_u32, PlaneType};

    use super::{PlaneInfo, PlanePool};
    use crate::backend::allocator::Fourcc;

    fn plane(id: u32, type_: PlaneType, formats: &[Fourcc]) -> PlaneInfo {
        PlaneInfo::new(from_u32(id).unwrap(), type_, formats.iter().copied())
    }

    fn pool() -> PlanePool {
        PlanePool::new([
            plane(30, PlaneType::Overlay, &[Fourcc::Nv12]),
            plane(31, PlaneType::Primary, &[Fourcc::Nv12, Fourcc::Argb8888]),
            plane(32, PlaneType::Overlay, &[Fourcc::Argb8888, Fourcc::Yvu420]),
        ])
    }

    #[test]
    fn pops_first_supporting_plane() {
        let mut pool = pool();
        let nv12 = pool.pop_for_format(Fourcc::Nv12, false).unwrap();
        assert_eq!(u32::from(nv12.handle), 30);
        let nv12 = pool.pop_for_format(Fourcc::Nv12, false).unwrap();
        assert_eq!(u32::from(nv12.handle), 31);
        assert!(pool.pop_for_format(Fourcc::Nv12, false).is_none());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn primary_only_ignores_overlays() {
        let mut pool = pool();
        let argb = pool.pop_for_format(Fourcc::Argb8888, true).unwrap();
        assert!(argb.is_primary());
        assert!(pool.pop_for_format(Fourcc::Argb8888, true).is_none());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn removal_keeps_order() {
        let mut pool = pool();
        let slot = pool.position(|p| u32::from(p.handle) == 31).unwrap();
        pool.take(slot).unwrap();
        assert!(pool.take(slot).is_none());

        let order = pool.iter().map(|p| u32::from(p.handle)).collect::<Vec<_>>();
        assert_eq!(order, vec![30, 32]);
    }

    #[test]
    fn empty_pool() {
        let mut pool = PlanePool::default();
        assert!(pool.is_empty());
        assert!(pool.pop_for_format(Fourcc::Nv12, false).is_none());
    }
}
