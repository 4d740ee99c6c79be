//! Translation tables between gralloc pixel formats and DRM formats.
//!
//! [`to_kernel_format`] maps a logical [`PixelFormat`] onto the fourcc the display
//! driver understands. Formats without a mapping are reported as [`UnsupportedFormat`].
//!
//! ```
//! # use scanout::backend::allocator::{Fourcc, PixelFormat};
//! # use scanout::backend::allocator::format::to_kernel_format;
//! assert_eq!(to_kernel_format(PixelFormat::RGBA_8888), Ok(Fourcc::Abgr8888));
//! assert!(to_kernel_format(PixelFormat(0xdead)).is_err());
//! ```
//!
//! [`is_rgb`] returns true for the single-plane RGB formats of the table.
//!
//! ```
//! # use scanout::backend::allocator::Fourcc;
//! # use scanout::backend::allocator::format::is_rgb;
//! assert!(is_rgb(Fourcc::Argb8888));
//! assert!(!is_rgb(Fourcc::Nv12));
//! ```
//!
//! [`plane_count`] returns the number of memory planes of a format.
//!
//! ```
//! # use scanout::backend::allocator::Fourcc;
//! # use scanout::backend::allocator::format::plane_count;
//! assert_eq!(plane_count(Fourcc::Yvu420), 3);
//! assert_eq!(plane_count(Fourcc::Bgr565), 1);
//! ```

use super::{Fourcc, PixelFormat};

/// The pixel format has no DRM equivalent this crate can scan out
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("pixel format {0} has no drm equivalent")]
pub struct UnsupportedFormat(pub PixelFormat);

/// Generates the lookup functions for the format table.
///
/// Every logical format maps onto exactly one fourcc, several logical
/// formats may share a fourcc.
macro_rules! format_tables {
    (
        $($hal: ident => $fourcc: ident { rgb: $rgb: expr, planes: $planes: expr $(,)? }),* $(,)?
    ) => {
        /// Translate a gralloc pixel format into the matching DRM fourcc.
        pub fn to_kernel_format(format: PixelFormat) -> Result<Fourcc, UnsupportedFormat> {
            match format {
                $(PixelFormat::$hal => Ok(Fourcc::$fourcc),)*
                _ => Err(UnsupportedFormat(format)),
            }
        }

        /// Returns true if the format is one of the packed RGB formats of the table.
        ///
        /// Unknown formats will always return `false`.
        #[allow(unreachable_patterns)]
        pub const fn is_rgb(fourcc: Fourcc) -> bool {
            match fourcc {
                $(Fourcc::$fourcc => $rgb,)*
                _ => false,
            }
        }

        /// Returns the number of memory planes this crate lays out for the format.
        ///
        /// Formats outside of the table are treated as single plane.
        #[allow(unreachable_patterns)]
        pub const fn plane_count(fourcc: Fourcc) -> usize {
            match fourcc {
                $(Fourcc::$fourcc => $planes,)*
                Fourcc::Nv21 => 2,
                _ => 1,
            }
        }

        #[cfg(test)]
        fn _impl_formats() -> &'static [(PixelFormat, Fourcc)] {
            &[$((PixelFormat::$hal, Fourcc::$fourcc),)*]
        }
    };
}

format_tables! {
    RGB_888 => Bgr888 { rgb: true, planes: 1 },
    BGRA_8888 => Argb8888 { rgb: true, planes: 1 },
    RGBX_8888 => Xbgr8888 { rgb: true, planes: 1 },
    RGBA_8888 => Abgr8888 { rgb: true, planes: 1 },
    RGB_565 => Bgr565 { rgb: true, planes: 1 },
    YV12 => Yvu420 { rgb: false, planes: 3 },
    YCRCB_420_SP => Nv12 { rgb: false, planes: 2 },
    YCBCR_420_SP => Nv12 { rgb: false, planes: 2 },
}

/// Returns true if the logical format translates into an RGB format.
pub fn is_rgb_format(format: PixelFormat) -> bool {
    to_kernel_format(format).map(is_rgb).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::{_impl_formats, is_rgb, is_rgb_format, plane_count, to_kernel_format, UnsupportedFormat};
    use crate::backend::allocator::{Fourcc, PixelFormat};

    #[test]
    fn table_matches_driver_layouts() {
        let expected = [
            (PixelFormat::RGB_888, Fourcc::Bgr888),
            (PixelFormat::BGRA_8888, Fourcc::Argb8888),
            (PixelFormat::RGBX_8888, Fourcc::Xbgr8888),
            (PixelFormat::RGBA_8888, Fourcc::Abgr8888),
            (PixelFormat::RGB_565, Fourcc::Bgr565),
            (PixelFormat::YV12, Fourcc::Yvu420),
            (PixelFormat::YCRCB_420_SP, Fourcc::Nv12),
            (PixelFormat::YCBCR_420_SP, Fourcc::Nv12),
        ];
        for (format, fourcc) in expected {
            assert_eq!(to_kernel_format(format), Ok(fourcc), "{format}");
        }
    }

    #[test]
    fn translation_is_stable() {
        for &(format, _) in _impl_formats() {
            assert_eq!(to_kernel_format(format), to_kernel_format(format));
        }
    }

    #[test]
    fn unknown_formats_are_reported() {
        for raw in [0u32, 6, 0x10, 0x22, 0x100, u32::MAX] {
            let format = PixelFormat(raw);
            assert_eq!(to_kernel_format(format), Err(UnsupportedFormat(format)));
            assert!(!is_rgb_format(format));
        }
    }

    /// RGB formats of the table are single plane, YUV formats are not
    #[test]
    fn rgb_formats_have_one_plane() {
        for &(_, fourcc) in _impl_formats() {
            assert_eq!(
                is_rgb(fourcc),
                plane_count(fourcc) == 1,
                "{} disagrees between rgb and plane count",
                fourcc
            );
        }
    }

    #[test]
    fn yuv_is_not_rgb() {
        assert!(!is_rgb(Fourcc::Yvu420));
        assert!(!is_rgb(Fourcc::Nv12));
        assert!(!is_rgb(Fourcc::Nv21));
        assert!(!is_rgb(Fourcc::Xrgb8888));
        assert!(is_rgb_format(PixelFormat::RGB_565));
        assert!(!is_rgb_format(PixelFormat::YV12));
    }
}
