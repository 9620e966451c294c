//! Usage flags passed at allocation and lock time.
//!
//! The word is split into disjoint fields:
//!
//! ```text
//!  bits 0..4    software read intent   (never / rarely / often)
//!  bits 4..8    software write intent  (never / rarely / often)
//!  bits 8..12   hardware capabilities  (texture, render, 2D, composer)
//!  bit  14      protected content
//!  bits 16..19  more hardware          (video encoder, ...)
//! ```
//!
//! Intents are small enumerations packed into their 4-bit field, so test
//! them with [`UsageFlags::sw_read`] / [`UsageFlags::sw_write`] rather than
//! `contains`, which cannot tell "rarely" from "often".

use bitflags::bitflags;

bitflags! {
    /// Gralloc usage bitmask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UsageFlags: u32 {
        /// Software reads happen occasionally.
        const SW_READ_RARELY = 0x0000_0002;
        /// Software reads happen frequently.
        const SW_READ_OFTEN = 0x0000_0003;
        /// Software read intent field.
        const SW_READ_MASK = 0x0000_000f;

        /// Software writes happen occasionally.
        const SW_WRITE_RARELY = 0x0000_0020;
        /// Software writes happen frequently.
        const SW_WRITE_OFTEN = 0x0000_0030;
        /// Software write intent field.
        const SW_WRITE_MASK = 0x0000_00f0;

        /// Both software fields.
        const SOFTWARE_MASK = Self::SW_READ_MASK.bits() | Self::SW_WRITE_MASK.bits();

        /// Buffer holds protected content.
        const PROTECTED = 0x0000_4000;

        /// Sampled as a GPU texture.
        const HW_TEXTURE = 0x0000_0100;
        /// Used as a GPU render target.
        const HW_RENDER = 0x0000_0200;
        /// Used by the 2D blitter.
        const HW_2D = 0x0000_0400;
        /// Scanned out by the display composer.
        const HW_COMPOSER = 0x0000_0800;
        /// Fed to the video encoder.
        const HW_VIDEO_ENCODER = 0x0001_0000;
        /// Hardware capability field.
        const HW_MASK = 0x0007_1f00;
    }
}

/// How often software touches the buffer in one direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwIntent {
    /// Never.
    Never,
    /// Rarely.
    Rarely,
    /// Often.
    Often,
    /// A value in the field that the platform does not define.
    Other(u32),
}

impl UsageFlags {
    /// No software reads.
    pub const SW_READ_NEVER: UsageFlags = UsageFlags::empty();
    /// No software writes.
    pub const SW_WRITE_NEVER: UsageFlags = UsageFlags::empty();

    /// Build from a raw word, keeping bits that have no name.
    #[inline]
    pub fn from_raw(raw: u32) -> UsageFlags {
        UsageFlags::from_bits_retain(raw)
    }

    /// The raw word passed across the ABI.
    #[inline]
    pub fn as_raw(self) -> u32 {
        self.bits()
    }

    /// Software read intent.
    pub fn sw_read(self) -> SwIntent {
        match self.bits() & Self::SW_READ_MASK.bits() {
            0x0 => SwIntent::Never,
            0x2 => SwIntent::Rarely,
            0x3 => SwIntent::Often,
            other => SwIntent::Other(other),
        }
    }

    /// Software write intent.
    pub fn sw_write(self) -> SwIntent {
        match self.bits() & Self::SW_WRITE_MASK.bits() {
            0x00 => SwIntent::Never,
            0x20 => SwIntent::Rarely,
            0x30 => SwIntent::Often,
            other => SwIntent::Other(other),
        }
    }

    /// Whether any software access is requested.
    #[inline]
    pub fn has_software_access(self) -> bool {
        self.bits() & Self::SOFTWARE_MASK.bits() != 0
    }

    /// Hardware capability bits only.
    #[inline]
    pub fn hardware(self) -> UsageFlags {
        self & Self::HW_MASK
    }

    /// Hardware access with no software intent.
    pub fn is_gpu_only(self) -> bool {
        !self.hardware().is_empty() && !self.has_software_access()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks_are_disjoint() {
        assert!((UsageFlags::SW_READ_MASK & UsageFlags::SW_WRITE_MASK).is_empty());
        assert!((UsageFlags::HW_MASK & UsageFlags::SW_READ_MASK).is_empty());
        assert!((UsageFlags::HW_MASK & UsageFlags::SW_WRITE_MASK).is_empty());
        assert!((UsageFlags::PROTECTED & UsageFlags::HW_MASK).is_empty());
        assert!((UsageFlags::PROTECTED & UsageFlags::SOFTWARE_MASK).is_empty());
    }

    #[test]
    fn test_raw_values() {
        assert_eq!(UsageFlags::SOFTWARE_MASK.bits(), 0xff);
        assert_eq!(UsageFlags::SW_READ_NEVER.bits(), 0);
        assert_eq!(UsageFlags::SW_WRITE_NEVER.bits(), 0);
        assert_eq!(UsageFlags::HW_VIDEO_ENCODER.bits(), 0x10000);
    }

    #[test]
    fn test_hardware_bits_inside_hw_mask() {
        for flag in [
            UsageFlags::HW_TEXTURE,
            UsageFlags::HW_RENDER,
            UsageFlags::HW_2D,
            UsageFlags::HW_COMPOSER,
            UsageFlags::HW_VIDEO_ENCODER,
        ] {
            assert!(UsageFlags::HW_MASK.contains(flag));
        }
    }

    #[test]
    fn test_intents() {
        let usage = UsageFlags::SW_READ_OFTEN | UsageFlags::SW_WRITE_RARELY;
        assert_eq!(usage.sw_read(), SwIntent::Often);
        assert_eq!(usage.sw_write(), SwIntent::Rarely);
        assert_eq!(UsageFlags::HW_TEXTURE.sw_read(), SwIntent::Never);
        assert_eq!(UsageFlags::from_raw(0x5).sw_read(), SwIntent::Other(0x5));
    }

    #[test]
    fn test_gpu_only() {
        assert!((UsageFlags::HW_TEXTURE | UsageFlags::HW_RENDER).is_gpu_only());
        assert!(!(UsageFlags::HW_TEXTURE | UsageFlags::SW_READ_RARELY).is_gpu_only());
        assert!(!UsageFlags::empty().is_gpu_only());
    }

    #[test]
    fn test_unnamed_bits_retained() {
        let usage = UsageFlags::from_raw(0x0004_0000);
        assert_eq!(usage.as_raw(), 0x0004_0000);
        assert!(UsageFlags::HW_MASK.contains(usage));
    }
}
