//! BLK backgrounds: big images stored as a grid of 128x128 tiles.
//!
//! The layout is an uncompressed S16 file with a longer header:
//!
//! - u32le magic
//! - u16 blocks wide
//! - u16 blocks high
//! - u16 block count
//! - `block count` frame table entries
//! - tile data, in frame table order
//!
//! Tiles are stored column by column: all tiles of the leftmost column top to bottom, then the
//! next column. The frame offsets are written as if the header were the S16 one, so every
//! offset points four bytes before its tile. Readers walk the tiles in table order and never
//! look at the offsets, which also copes with editors that write garbage offsets past the first
//! row of tiles.

use crate::{
    consts::{BLK_HEADER_SIZE, BLK_TILE_SIZE, CS16_HEADER_SIZE, MAGIC_S16_565},
    decode::{
        decode_samples, read_format, read_header_u16, CompressedBackgroundSnafu, DecodeError,
        TileCountMismatchSnafu, UnsupportedByteOrderSnafu,
    },
    encode::{encode_raw, EncodeError, TooManyTilesSnafu},
    format::Endian,
    image::PixelBuffer,
};
use byteorder::LittleEndian;
use itertools::Itertools;
use snafu::ensure;
use std::io::Cursor;

/// Decodes a BLK file into its dimensions in tiles and the tiles themselves.
pub fn decode_blk_tiles(data: &[u8]) -> Result<(u32, u32, Vec<PixelBuffer>), DecodeError> {
    let format = read_format(data)?;
    ensure!(
        format.byte_order == Endian::Little,
        UnsupportedByteOrderSnafu { format: *format }
    );
    ensure!(
        !format.compressed,
        CompressedBackgroundSnafu { format: *format }
    );

    let mut cursor = Cursor::new(data);
    cursor.set_position(4);
    let blocks_wide = read_header_u16::<LittleEndian>(&mut cursor)?;
    let blocks_high = read_header_u16::<LittleEndian>(&mut cursor)?;
    let count = read_header_u16::<LittleEndian>(&mut cursor)?;
    // the canvas is sized from the grid, so it has to agree with what's actually stored
    ensure!(
        u32::from(blocks_wide) * u32::from(blocks_high) == u32::from(count),
        TileCountMismatchSnafu {
            blocks_wide,
            blocks_high,
            count
        }
    );

    let mut sizes = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        // offset, unused
        cursor.set_position(cursor.position() + 4);
        let width = read_header_u16::<LittleEndian>(&mut cursor)?;
        let height = read_header_u16::<LittleEndian>(&mut cursor)?;
        sizes.push((width, height));
    }

    let mut position = cursor.position() as usize;
    let tiles = sizes
        .into_iter()
        .map(|(width, height)| {
            let pixel_count = usize::from(width) * usize::from(height);
            let start = position.min(data.len());
            let pixels =
                decode_samples::<LittleEndian>(&data[start..], format.channel_layout, pixel_count);
            position += pixel_count * 2;
            PixelBuffer::from_raw(u32::from(width), u32::from(height), pixels)
        })
        .collect();

    Ok((u32::from(blocks_wide), u32::from(blocks_high), tiles))
}

/// Lays out tiles column by column into one image.
///
/// The tile size is taken from the first tile (128x128 if there are none). Missing tiles leave
/// their area transparent, extra tiles are ignored.
pub fn stitch(blocks_wide: u32, blocks_high: u32, tiles: &[PixelBuffer]) -> PixelBuffer {
    let (tile_width, tile_height) = tiles
        .first()
        .map_or((BLK_TILE_SIZE, BLK_TILE_SIZE), |t| (t.width(), t.height()));

    let expected = blocks_wide as usize * blocks_high as usize;
    if tiles.len() != expected {
        log::warn!(
            "{blocks_wide}x{blocks_high} background has {} tiles instead of {expected}",
            tiles.len()
        );
    }

    let mut full = PixelBuffer::new(blocks_wide * tile_width, blocks_high * tile_height);
    let positions = (0..blocks_wide).cartesian_product(0..blocks_high);
    for ((x, y), tile) in positions.zip(tiles) {
        full.blit(
            tile,
            i64::from(x * tile_width),
            i64::from(y * tile_height),
            false,
        );
    }

    full
}

/// Decodes a BLK file into the full background image.
pub fn decode_blk(data: &[u8]) -> Result<PixelBuffer, DecodeError> {
    let (blocks_wide, blocks_high, tiles) = decode_blk_tiles(data)?;
    Ok(stitch(blocks_wide, blocks_high, &tiles))
}

/// Encodes tiles, already in column order, as an RGB565 BLK file.
pub fn encode_blk_tiles(tiles: &[PixelBuffer], blocks_wide: u32) -> Result<Vec<u8>, EncodeError> {
    let blocks_high = if blocks_wide == 0 {
        0
    } else {
        tiles.len() as u32 / blocks_wide
    };
    ensure!(
        tiles.len() <= usize::from(u16::MAX) && blocks_wide <= u32::from(u16::MAX),
        TooManyTilesSnafu {
            blocks_wide,
            blocks_high
        }
    );

    // the S16 encoder does the work, only the header differs
    let s16 = encode_raw(tiles)?;
    let mut out = Vec::with_capacity(s16.len() + BLK_HEADER_SIZE - CS16_HEADER_SIZE);
    out.extend_from_slice(&MAGIC_S16_565.to_le_bytes());
    out.extend_from_slice(&(blocks_wide as u16).to_le_bytes());
    out.extend_from_slice(&(blocks_high as u16).to_le_bytes());
    out.extend_from_slice(&(tiles.len() as u16).to_le_bytes());
    out.extend_from_slice(&s16[CS16_HEADER_SIZE..]);

    Ok(out)
}

/// Splits an image into 128x128 tiles and encodes them as an RGB565 BLK file.
///
/// Tiles hanging over the right or bottom edge are padded with the mask colour.
pub fn encode_blk(image: &PixelBuffer) -> Result<Vec<u8>, EncodeError> {
    let blocks_wide = image.width().div_ceil(BLK_TILE_SIZE);
    let blocks_high = image.height().div_ceil(BLK_TILE_SIZE);
    ensure!(
        u64::from(blocks_wide) * u64::from(blocks_high) <= u64::from(u16::MAX),
        TooManyTilesSnafu {
            blocks_wide,
            blocks_high
        }
    );

    let tiles = (0..blocks_wide)
        .cartesian_product(0..blocks_high)
        .map(|(x, y)| {
            let mut tile = PixelBuffer::new(BLK_TILE_SIZE, BLK_TILE_SIZE);
            tile.blit(
                image,
                -i64::from(x * BLK_TILE_SIZE),
                -i64::from(y * BLK_TILE_SIZE),
                false,
            );
            tile
        })
        .collect::<Vec<_>>();

    encode_blk_tiles(&tiles, blocks_wide)
}
