//! The registry of known S16/C16/BLK variants.
//!
//! Every file starts with a u32 magic number, always read little-endian, that selects one of
//! these variants:
//!
//! | magic        | compressed | channels | byte order | name |
//! |--------------|------------|----------|------------|------|
//! | `0x00000000` | no         | RGB555   | little     | S16  |
//! | `0x00000001` | no         | RGB565   | little     | S16  |
//! | `0x00000002` | yes        | RGB555   | little     | C16  |
//! | `0x00000003` | yes        | RGB565   | little     | C16  |
//! | `0x01000000` | no         | RGB5551  | big        | N16  |
//! | `0x03000000` | no         | RGB5551  | big        | M16  |
//!
//! The big-endian variants come from a different tool in the same ecosystem. They can be read
//! but are never written.

use crate::utils::{rgb5551_to_rgb565, rgb555_to_rgb565};
use byteorder::{ByteOrder, LittleEndian};
use core::fmt;

/// How the colour channels of a stored pixel are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Rgb555,
    Rgb565,
    Rgb5551,
}

impl ChannelLayout {
    /// Converts a stored pixel of this layout to RGB565.
    #[inline]
    pub const fn to_rgb565(self, pixel: u16) -> u16 {
        match self {
            ChannelLayout::Rgb555 => rgb555_to_rgb565(pixel),
            ChannelLayout::Rgb565 => pixel,
            ChannelLayout::Rgb5551 => rgb5551_to_rgb565(pixel),
        }
    }
}

/// Byte order of everything after the magic number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Little,
    Big,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileFormatDescriptor {
    pub magic: u32,
    pub compressed: bool,
    pub channel_layout: ChannelLayout,
    pub byte_order: Endian,
    pub description: &'static str,
}

impl fmt::Display for FileFormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description)
    }
}

pub const S16_555: FileFormatDescriptor = FileFormatDescriptor {
    magic: 0x0000_0000,
    compressed: false,
    channel_layout: ChannelLayout::Rgb555,
    byte_order: Endian::Little,
    description: "S16 RGB555 LE",
};

pub const S16_565: FileFormatDescriptor = FileFormatDescriptor {
    magic: 0x0000_0001,
    compressed: false,
    channel_layout: ChannelLayout::Rgb565,
    byte_order: Endian::Little,
    description: "S16 RGB565 LE",
};

pub const C16_555: FileFormatDescriptor = FileFormatDescriptor {
    magic: 0x0000_0002,
    compressed: true,
    channel_layout: ChannelLayout::Rgb555,
    byte_order: Endian::Little,
    description: "C16 RGB555 LE",
};

pub const C16_565: FileFormatDescriptor = FileFormatDescriptor {
    magic: 0x0000_0003,
    compressed: true,
    channel_layout: ChannelLayout::Rgb565,
    byte_order: Endian::Little,
    description: "C16 RGB565 LE",
};

pub const N16: FileFormatDescriptor = FileFormatDescriptor {
    magic: 0x0100_0000,
    compressed: false,
    channel_layout: ChannelLayout::Rgb5551,
    byte_order: Endian::Big,
    description: "N16 RGB5551 BE",
};

pub const M16: FileFormatDescriptor = FileFormatDescriptor {
    magic: 0x0300_0000,
    compressed: false,
    channel_layout: ChannelLayout::Rgb5551,
    byte_order: Endian::Big,
    description: "M16 RGB5551 BE",
};

/// All known variants.
pub const FORMATS: [FileFormatDescriptor; 6] = [S16_555, S16_565, C16_555, C16_565, N16, M16];

impl FileFormatDescriptor {
    /// Looks up a variant by its magic number.
    pub fn from_magic(magic: u32) -> Option<&'static FileFormatDescriptor> {
        FORMATS.iter().find(|format| format.magic == magic)
    }
}

/// Identifies a S16/C16/BLK file by its magic number.
///
/// Only the first four bytes are looked at, so this never fails on short input; anything that
/// isn't a known magic (including fewer than four bytes) gives `None`.
pub fn identify(data: &[u8]) -> Option<&'static FileFormatDescriptor> {
    let magic = data.get(0..4)?;
    FileFormatDescriptor::from_magic(LittleEndian::read_u32(magic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifies_s16_565() {
        let format = identify(&[0x01, 0x00, 0x00, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(*format, S16_565);
        assert!(!format.compressed);
        assert_eq!(format.channel_layout, ChannelLayout::Rgb565);
        assert_eq!(format.byte_order, Endian::Little);
    }

    #[test]
    fn magic_only_is_enough() {
        let format = identify(&[0x02, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(*format, C16_555);
    }

    #[test]
    fn big_endian_magics() {
        assert_eq!(*identify(&[0x00, 0x00, 0x00, 0x01]).unwrap(), N16);
        assert_eq!(*identify(&[0x00, 0x00, 0x00, 0x03]).unwrap(), M16);
    }

    #[test]
    fn unknown_and_short() {
        assert!(identify(&[0x04, 0x00, 0x00, 0x00]).is_none());
        assert!(identify(&[0x01, 0x00, 0x00]).is_none());
        assert!(identify(&[]).is_none());
    }

    #[test]
    fn magics_are_unique() {
        for (i, a) in FORMATS.iter().enumerate() {
            for b in &FORMATS[i + 1..] {
                assert_ne!(a.magic, b.magic);
            }
        }
    }
}
