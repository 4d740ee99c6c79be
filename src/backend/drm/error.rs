use std::path::PathBuf;

/// An ioctl on the drm device failed
#[derive(Debug, thiserror::Error)]
#[error("DRM access error: {errmsg} on device `{dev:?}` ({source:})")]
pub struct AccessError {
    /// Error message associated to the access error
    pub errmsg: &'static str,
    /// Device on which the error was generated
    pub dev: Option<PathBuf>,
    /// Underlying device error
    #[source]
    pub source: std::io::Error,
}

impl AccessError {
    /// Raw os error code reported by the kernel, if any
    pub fn errno(&self) -> Option<i32> {
        self.source.raw_os_error()
    }
}
