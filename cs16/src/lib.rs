//! Codec for the S16, C16 and BLK sprite formats, plus the bit-depth reduction used to get
//! true-colour artwork into them.
//!
//! All three formats store one or more frames of 16-bit packed RGB pixels. Whatever variant is
//! read, frames are handed out as RGB565 [`PixelBuffer`]s, and only RGB565 is ever written.
//!
//! # Pixels
//!
//! ```plain
//! .- RGB565 -----------------------------------------.
//! | 15 14 13 12 11 | 10  9  8  7  6  5 | 4  3  2  1  0 |
//! |      red       |      green        |     blue      |
//! `--------------------------------------------------`
//! ```
//!
//! The value `0x0000` is reserved: it is the mask colour, i.e. a fully transparent pixel. Opaque
//! black is written as [`COL_BLACK`](consts::COL_BLACK) instead.
//!
//! # Container
//!
//! - u32le magic (see [`format`] for the six known values)
//! - u16 frame count
//! - one frame table entry per frame: u32 data offset, u16 width, u16 height
//!   - compressed files follow each entry with `height - 1` u32 row offsets
//! - frame data
//!
//! All offsets are absolute from the start of the file.
//!
//! ## Compressed rows
//!
//! Each row is a sequence of runs, terminated by a zero u16. A run starts with a u16 header:
//!
//! ```plain
//! .- run header -------------------------.
//! | 15 .. 1                     |   0    |
//! |-----------------------------+--------|
//! |          length             | opaque |
//! `--------------------------------------`
//! ```
//!
//! Opaque runs are followed by `length` literal pixels, transparent runs by nothing. Each frame
//! ends with an extra zero u16 after its last row.
//!
//! # Backgrounds
//!
//! BLK files are an uncompressed container of 128x128 tiles with a wider header, see [`blk`].
//!
//! # Dithering
//!
//! [`dither`] reduces 8-bit channels to an arbitrary bit count with a selection of
//! [`Strategy`]s, and [`sprite`] uses it to pack RGBA artwork into RGB565 frames.

pub mod blk;
pub mod decode;
pub mod dither;
pub mod encode;
pub mod format;
pub mod image;
pub mod sprite;
pub mod utils;

pub use blk::{decode_blk, decode_blk_tiles, encode_blk, encode_blk_tiles, stitch};
pub use decode::{decode_cs16, read_headers, DecodeError};
pub use dither::{dither_channel, ChannelDitherer, Strategy};
pub use encode::{encode_like, encode_raw, encode_rle, write_raw, write_rle, EncodeError};
pub use format::{identify, FileFormatDescriptor};
pub use image::PixelBuffer;
pub use sprite::{planar_rgba_to_565, rgb_to_565, rgba_to_565, PackError, SpritePacker};

pub mod consts {
    /// Size of the S16/C16 file header: u32 magic, u16 frame count.
    pub const CS16_HEADER_SIZE: usize = 6;

    /// Size of a frame table entry: u32 offset, u16 width, u16 height.
    pub const CS16_FRAME_SIZE: usize = 8;

    /// Size of a C16 row offset.
    pub const C16_ROW_OFFSET_SIZE: usize = 4;

    /// Size of the BLK file header: u32 magic, u16 blocks wide, u16 blocks high, u16 block count.
    ///
    /// Four bytes longer than [`CS16_HEADER_SIZE`], which is why the frame offsets written into
    /// BLK files are off by four.
    pub const BLK_HEADER_SIZE: usize = 10;

    /// Width and height of a BLK tile.
    pub const BLK_TILE_SIZE: u32 = 128;

    /// Magic written for S16 files (uncompressed RGB565).
    pub const MAGIC_S16_565: u32 = 1;

    /// Magic written for C16 files (compressed RGB565).
    pub const MAGIC_C16_565: u32 = 3;

    /// Masked (transparent) colour.
    pub const COL_MASK: u16 = 0x0000;

    /// The darkest opaque colour that reads as black.
    ///
    /// Used in place of black whenever a pixel must not become transparent.
    pub const COL_BLACK: u16 = 0x0020;

    /// Longest run a C16 run header can describe.
    ///
    /// The header stores the length in its upper 15 bits, but the engine only accepts 14.
    pub const C16_MAX_RUN: usize = 0x3FFF;

    /// Run header bit marking an opaque run.
    pub const C16_RUN_OPAQUE: u16 = 0b1;

    /// Row terminator and end-of-image marker.
    pub const C16_END: u16 = 0;
}
