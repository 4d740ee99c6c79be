//! Per-buffer cache of import results
//!
//! Importing a buffer costs two ioctls. Compositors hand out the same buffers frame after
//! frame, so the result of an import is kept around keyed by whatever identifies the
//! buffer to the caller, together with a generation that changes whenever the content
//! behind the key is reallocated. Failed imports are cached as well, a buffer that could
//! not be imported once will not be retried until its generation changes.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use tracing::trace;

use super::{
    device::KmsDevice,
    import::{BufferImporter, ImportError, ImportedBuffer},
};
use crate::backend::allocator::GrallocHandle;

/// Cached outcome of [`BufferImporter::import_buffer`]
pub type CachedImport<D> = Result<Option<Arc<ImportedBuffer<D>>>, Arc<ImportError>>;

#[derive(Debug)]
struct CacheEntry<D: KmsDevice> {
    generation: u64,
    result: CachedImport<D>,
}

/// Cache of imported framebuffers
#[derive(Debug)]
pub struct FramebufferCache<K, D: KmsDevice> {
    entries: HashMap<K, CacheEntry<D>>,
}

impl<K, D: KmsDevice> Default for FramebufferCache<K, D> {
    fn default() -> Self {
        FramebufferCache {
            entries: HashMap::new(),
        }
    }
}

impl<K, D> FramebufferCache<K, D>
where
    K: Hash + Eq + Clone,
    D: KmsDevice + Clone,
{
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the import result for `key` at `generation`, importing `buffer` on a miss
    ///
    /// An entry for an older generation is replaced, releasing its framebuffer once the
    /// last reference to it is gone.
    pub fn get_or_import(
        &mut self,
        key: &K,
        generation: u64,
        buffer: &impl GrallocHandle,
        importer: &BufferImporter<D>,
    ) -> CachedImport<D> {
        if let Some(entry) = self.entries.get(key) {
            if entry.generation == generation {
                return entry.result.clone();
            }
            trace!(old = entry.generation, new = generation, "buffer changed, reimporting");
        }

        let result = match importer.import_buffer(buffer) {
            Ok(imported) => Ok(imported.map(Arc::new)),
            Err(err) => Err(Arc::new(err)),
        };
        self.entries.insert(
            key.clone(),
            CacheEntry {
                generation,
                result: result.clone(),
            },
        );
        result
    }

    /// Drop the entry for `key`
    pub fn invalidate(&mut self, key: &K) {
        self.entries.remove(key);
    }

    /// Keep only the entries `keep` returns true for
    pub fn retain(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.entries.retain(|key, _| keep(key));
    }

    /// Number of cached results
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::FramebufferCache;
    use crate::backend::allocator::{GrallocBuffer, PixelFormat, Usage};
    use crate::backend::drm::{testing::MockDevice, BufferImporter, PlatformConfig};

    fn setup() -> (MockDevice, BufferImporter<MockDevice>, FramebufferCache<u32, MockDevice>) {
        let device = MockDevice::default();
        let importer = BufferImporter::new(device.clone(), PlatformConfig::generic());
        (device, importer, FramebufferCache::new())
    }

    #[test]
    fn hit_does_not_reimport() {
        let (device, importer, mut cache) = setup();
        let buffer = GrallocBuffer::dummy(64, 64, PixelFormat::RGBA_8888, 256, Usage::HW_FB);

        let first = cache.get_or_import(&1, 0, &buffer, &importer).unwrap().unwrap();
        let second = cache.get_or_import(&1, 0, &buffer, &importer).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(device.imports(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn new_generation_replaces_entry() {
        let (device, importer, mut cache) = setup();
        let buffer = GrallocBuffer::dummy(64, 64, PixelFormat::RGBA_8888, 256, Usage::HW_FB);

        let old_fb = cache
            .get_or_import(&1, 0, &buffer, &importer)
            .unwrap()
            .unwrap()
            .framebuffer();
        let new_fb = cache
            .get_or_import(&1, 1, &buffer, &importer)
            .unwrap()
            .unwrap()
            .framebuffer();

        assert_ne!(old_fb, new_fb);
        assert_eq!(device.imports(), 2);
        assert_eq!(device.destroyed(), vec![old_fb]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn failures_are_cached() {
        let (device, importer, mut cache) = setup();
        device.fail_import(true);
        let buffer = GrallocBuffer::dummy(64, 64, PixelFormat::RGBA_8888, 256, Usage::HW_FB);

        assert!(cache.get_or_import(&7, 3, &buffer, &importer).is_err());
        device.fail_import(false);
        assert!(cache.get_or_import(&7, 3, &buffer, &importer).is_err());
        assert_eq!(device.imports(), 0);

        assert!(cache.get_or_import(&7, 4, &buffer, &importer).is_ok());
        assert_eq!(device.imports(), 1);
    }

    #[test]
    fn skipped_buffers_are_cached() {
        let (device, importer, mut cache) = setup();
        let buffer = GrallocBuffer::dummy(64, 64, PixelFormat::RGBA_8888, 256, Usage::HW_TEXTURE);

        assert!(cache.get_or_import(&2, 0, &buffer, &importer).unwrap().is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(device.imports(), 0);
    }

    #[test]
    fn invalidate_and_retain_release_framebuffers() {
        let (device, importer, mut cache) = setup();
        let buffer = GrallocBuffer::dummy(64, 64, PixelFormat::RGBA_8888, 256, Usage::HW_FB);

        for key in 0..4 {
            cache.get_or_import(&key, 0, &buffer, &importer).unwrap();
        }
        cache.invalidate(&0);
        assert_eq!(device.destroyed().len(), 1);

        cache.retain(|key| key % 2 == 0);
        assert_eq!(cache.len(), 1);
        assert_eq!(device.destroyed().len(), 3);

        assert!(device.closed().is_empty());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(device.destroyed().len(), 4);
        // all four framebuffers shared the gem handle of the one dmabuf
        assert_eq!(device.closed().len(), 1);
    }
}
