//! Pixel formats understood by the native allocator.
//!
//! Positive values are storage layouts. Negative values are blending hints
//! that the platform resolves to a layout itself; they have no fixed size.

/// Color layout of a graphic buffer.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PixelFormat {
    /// Unknown or no format.
    #[default]
    Unknown = 0,
    /// Implementation-defined format.
    Custom = -4,
    /// Any format with more than one bit of alpha.
    Translucent = -3,
    /// Any format with at least one bit of alpha.
    Transparent = -2,
    /// Any format without alpha.
    Opaque = -1,
    /// 32-bit RGBA, 8 bits per channel.
    Rgba8888 = 1,
    /// 32-bit RGB with an unused padding byte.
    Rgbx8888 = 2,
    /// 24-bit packed RGB.
    Rgb888 = 3,
    /// 16-bit RGB 5:6:5.
    Rgb565 = 4,
    /// 32-bit BGRA, 8 bits per channel.
    Bgra8888 = 5,
    /// 16-bit RGBA 5:5:5:1.
    Rgba5551 = 6,
    /// 16-bit RGBA 4:4:4:4.
    Rgba4444 = 7,
}

impl PixelFormat {
    /// Platform alias for [`PixelFormat::Unknown`].
    pub const NONE: PixelFormat = PixelFormat::Unknown;

    /// Parse a raw format value. Returns `None` for values outside the set.
    pub fn from_raw(raw: i32) -> Option<PixelFormat> {
        Some(match raw {
            0 => PixelFormat::Unknown,
            -4 => PixelFormat::Custom,
            -3 => PixelFormat::Translucent,
            -2 => PixelFormat::Transparent,
            -1 => PixelFormat::Opaque,
            1 => PixelFormat::Rgba8888,
            2 => PixelFormat::Rgbx8888,
            3 => PixelFormat::Rgb888,
            4 => PixelFormat::Rgb565,
            5 => PixelFormat::Bgra8888,
            6 => PixelFormat::Rgba5551,
            7 => PixelFormat::Rgba4444,
            _ => return None,
        })
    }

    /// The raw value passed across the ABI.
    #[inline]
    pub fn as_raw(self) -> i32 {
        self as i32
    }

    /// Bytes per pixel for storage layouts, `None` for hints and unknown.
    pub fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Rgba8888 | PixelFormat::Rgbx8888 | PixelFormat::Bgra8888 => Some(4),
            PixelFormat::Rgb888 => Some(3),
            PixelFormat::Rgb565 | PixelFormat::Rgba5551 | PixelFormat::Rgba4444 => Some(2),
            PixelFormat::Unknown
            | PixelFormat::Custom
            | PixelFormat::Translucent
            | PixelFormat::Transparent
            | PixelFormat::Opaque => None,
        }
    }

    /// Whether this is a concrete storage layout.
    #[inline]
    pub fn is_concrete(self) -> bool {
        self.bytes_per_pixel().is_some()
    }

    /// Whether the layout carries an alpha channel.
    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgba8888
                | PixelFormat::Bgra8888
                | PixelFormat::Rgba5551
                | PixelFormat::Rgba4444
                | PixelFormat::Translucent
                | PixelFormat::Transparent
        )
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PixelFormat::Unknown => "UNKNOWN",
            PixelFormat::Custom => "CUSTOM",
            PixelFormat::Translucent => "TRANSLUCENT",
            PixelFormat::Transparent => "TRANSPARENT",
            PixelFormat::Opaque => "OPAQUE",
            PixelFormat::Rgba8888 => "RGBA_8888",
            PixelFormat::Rgbx8888 => "RGBX_8888",
            PixelFormat::Rgb888 => "RGB_888",
            PixelFormat::Rgb565 => "RGB_565",
            PixelFormat::Bgra8888 => "BGRA_8888",
            PixelFormat::Rgba5551 => "RGBA_5551",
            PixelFormat::Rgba4444 => "RGBA_4444",
        };
        f.write_str(name)
    }
}
