use crate::{
    consts::{C16_END, C16_RUN_OPAQUE},
    format::{ChannelLayout, Endian, FileFormatDescriptor},
    image::PixelBuffer,
};
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt};
use snafu::{OptionExt, ResultExt, Snafu};
use std::io::Cursor;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DecodeError {
    #[snafu(display("Unknown S16/C16/BLK magic number {magic:#010x}"))]
    UnknownFormat { magic: u32 },
    #[snafu(display("File ends inside its header (at byte {offset})"))]
    TruncatedHeader {
        offset: u64,
        source: std::io::Error,
    },
    #[snafu(display("No support for big-endian {format} here"))]
    UnsupportedByteOrder { format: FileFormatDescriptor },
    #[snafu(display("Backgrounds aren't supposed to be compressed, found {format}"))]
    CompressedBackground { format: FileFormatDescriptor },
    #[snafu(display("A {blocks_wide}x{blocks_high} background can't be made of {count} tiles"))]
    TileCountMismatch {
        blocks_wide: u16,
        blocks_high: u16,
        count: u16,
    },
}

/// One entry of the frame table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTableEntry {
    /// Absolute offset of the frame's pixel data (of its first row, if compressed).
    pub data_offset: u32,
    pub width: u16,
    pub height: u16,
    /// Absolute offsets of every row but the first. Always empty for uncompressed frames.
    pub row_offsets: Vec<u32>,
}

impl FrameTableEntry {
    #[inline]
    pub fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }
}

/// Reads the magic number and returns the matching variant.
pub(crate) fn read_format(data: &[u8]) -> Result<&'static FileFormatDescriptor, DecodeError> {
    let magic = Cursor::new(data)
        .read_u32::<LittleEndian>()
        .context(TruncatedHeaderSnafu { offset: 0u64 })?;
    FileFormatDescriptor::from_magic(magic).context(UnknownFormatSnafu { magic })
}

/// Reads the file header and frame table of a S16/C16 file.
pub fn read_headers(
    data: &[u8],
) -> Result<(&'static FileFormatDescriptor, Vec<FrameTableEntry>), DecodeError> {
    let format = read_format(data)?;
    let entries = match format.byte_order {
        Endian::Little => read_frame_table::<LittleEndian>(format, data)?,
        Endian::Big => read_frame_table::<BigEndian>(format, data)?,
    };
    Ok((format, entries))
}

fn read_frame_table<B: ByteOrder>(
    format: &FileFormatDescriptor,
    data: &[u8],
) -> Result<Vec<FrameTableEntry>, DecodeError> {
    let mut cursor = Cursor::new(data);
    cursor.set_position(4);

    let count = read_header_u16::<B>(&mut cursor)?;
    let mut entries = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let data_offset = read_header_u32::<B>(&mut cursor)?;
        let width = read_header_u16::<B>(&mut cursor)?;
        let height = read_header_u16::<B>(&mut cursor)?;

        let mut row_offsets = Vec::new();
        if format.compressed {
            row_offsets.reserve(usize::from(height.saturating_sub(1)));
            for _ in 1..height {
                row_offsets.push(read_header_u32::<B>(&mut cursor)?);
            }
        }

        entries.push(FrameTableEntry {
            data_offset,
            width,
            height,
            row_offsets,
        });
    }

    Ok(entries)
}

pub(crate) fn read_header_u16<B: ByteOrder>(
    cursor: &mut Cursor<&[u8]>,
) -> Result<u16, DecodeError> {
    let offset = cursor.position();
    cursor
        .read_u16::<B>()
        .context(TruncatedHeaderSnafu { offset })
}

pub(crate) fn read_header_u32<B: ByteOrder>(
    cursor: &mut Cursor<&[u8]>,
) -> Result<u32, DecodeError> {
    let offset = cursor.position();
    cursor
        .read_u32::<B>()
        .context(TruncatedHeaderSnafu { offset })
}

/// Decodes a S16 or C16 file into RGB565 frames.
///
/// Pixel data that is cut short is padded with transparency instead of failing, since some
/// historical tools write short buffers. Only a damaged header is an error.
pub fn decode_cs16(data: &[u8]) -> Result<Vec<PixelBuffer>, DecodeError> {
    let (format, entries) = read_headers(data)?;
    let frames = match format.byte_order {
        Endian::Little => decode_frames::<LittleEndian>(format, &entries, data),
        Endian::Big => decode_frames::<BigEndian>(format, &entries, data),
    };
    Ok(frames)
}

fn decode_frames<B: ByteOrder>(
    format: &FileFormatDescriptor,
    entries: &[FrameTableEntry],
    data: &[u8],
) -> Vec<PixelBuffer> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let pixels = if format.compressed {
                decode_rle_frame::<B>(format.channel_layout, entry, data, index)
            } else {
                let start = (entry.data_offset as usize).min(data.len());
                decode_samples::<B>(&data[start..], format.channel_layout, entry.pixel_count())
            };
            PixelBuffer::from_raw(u32::from(entry.width), u32::from(entry.height), pixels)
        })
        .collect()
}

/// Decodes packed samples to RGB565, zero-padding or cutting to exactly `expected` pixels.
pub(crate) fn decode_samples<B: ByteOrder>(
    bytes: &[u8],
    layout: ChannelLayout,
    expected: usize,
) -> Vec<u16> {
    let available = (bytes.len() / 2).min(expected);
    let mut pixels = vec![0; expected];
    B::read_u16_into(&bytes[..available * 2], &mut pixels[..available]);

    if layout != ChannelLayout::Rgb565 {
        for pixel in &mut pixels[..available] {
            *pixel = layout.to_rgb565(*pixel);
        }
    }

    if available < expected {
        log::warn!(
            "pixel data short by {} pixels, padding with transparency",
            expected - available
        );
    }

    pixels
}

/// Decodes a compressed frame by walking its runs sequentially from the first row's offset.
///
/// The per-row offsets are not needed for this and are not trusted.
fn decode_rle_frame<B: ByteOrder>(
    layout: ChannelLayout,
    entry: &FrameTableEntry,
    data: &[u8],
    index: usize,
) -> Vec<u16> {
    let width = usize::from(entry.width);
    let total = entry.pixel_count();
    let mut pixels = vec![0; total];

    let mut cursor = Cursor::new(data);
    cursor.set_position(u64::from(entry.data_offset));

    'rows: for row in 0..usize::from(entry.height) {
        let mut pos = row * width;
        loop {
            let Ok(header) = cursor.read_u16::<B>() else {
                log::warn!("frame {index}: data ends in row {row}");
                break 'rows;
            };
            if header == C16_END {
                break;
            }

            let length = usize::from(header >> 1);
            let start = pos.min(total);
            pos += length;
            if header & C16_RUN_OPAQUE == 0 {
                continue;
            }

            let run_start = cursor.position() as usize;
            let run_bytes = data.get(run_start..).unwrap_or_default();
            let end = pos.min(total);
            if end < pos {
                log::warn!("frame {index}: run in row {row} overflows the frame, clamping");
            }

            let run = decode_samples::<B>(run_bytes, layout, length);
            pixels[start..end].copy_from_slice(&run[..end - start]);
            cursor.set_position((run_start + length * 2) as u64);
        }
    }

    pixels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consts::{COL_MASK, CS16_FRAME_SIZE, CS16_HEADER_SIZE};

    fn s16(magic: u32, frames: &[(u16, u16, &[u16])]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&magic.to_le_bytes());
        out.extend_from_slice(&(frames.len() as u16).to_le_bytes());
        let mut offset = CS16_HEADER_SIZE + frames.len() * CS16_FRAME_SIZE;
        for (w, h, pixels) in frames {
            out.extend_from_slice(&(offset as u32).to_le_bytes());
            out.extend_from_slice(&w.to_le_bytes());
            out.extend_from_slice(&h.to_le_bytes());
            offset += pixels.len() * 2;
        }
        for (_, _, pixels) in frames {
            for p in *pixels {
                out.extend_from_slice(&p.to_le_bytes());
            }
        }
        out
    }

    #[test]
    fn raw_565() {
        let data = s16(1, &[(2, 1, &[0x1234, 0xFFFF]), (1, 1, &[0x0020])]);
        let frames = decode_cs16(&data).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data(), &[0x1234, 0xFFFF]);
        assert_eq!(frames[1].data(), &[0x0020]);
    }

    #[test]
    fn raw_555_is_converted() {
        let data = s16(0, &[(3, 1, &[0x7FFF, 0x7C00, 0x0200])]);
        let frames = decode_cs16(&data).unwrap();
        assert_eq!(frames[0].data(), &[0xFFFF, 0xF800, 0x0420]);
    }

    #[test]
    fn short_pixel_data_is_padded() {
        let mut data = s16(1, &[(2, 2, &[1, 2, 3, 4])]);
        data.truncate(data.len() - 3);
        let frames = decode_cs16(&data).unwrap();
        assert_eq!(frames[0].data(), &[1, 2, 0, 0]);
    }

    #[test]
    fn offset_past_end_gives_blank_frame() {
        let mut data = s16(1, &[(2, 1, &[1, 2])]);
        data[6..10].copy_from_slice(&1000u32.to_le_bytes());
        let frames = decode_cs16(&data).unwrap();
        assert_eq!(frames[0].data(), &[COL_MASK, COL_MASK]);
    }

    #[test]
    fn unknown_magic() {
        let data = s16(7, &[]);
        assert!(matches!(
            decode_cs16(&data),
            Err(DecodeError::UnknownFormat { magic: 7 })
        ));
    }

    #[test]
    fn truncated_frame_table() {
        let data = s16(1, &[(1, 1, &[1])]);
        assert!(matches!(
            decode_cs16(&data[..10]),
            Err(DecodeError::TruncatedHeader { offset: 10, .. })
        ));
        assert!(matches!(
            decode_cs16(&data[..4]),
            Err(DecodeError::TruncatedHeader { offset: 4, .. })
        ));
    }

    #[test]
    fn big_endian_5551() {
        let mut data = Vec::new();
        data.extend_from_slice(&0x0100_0000u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&14u32.to_be_bytes());
        data.extend_from_slice(&2u16.to_be_bytes());
        data.extend_from_slice(&1u16.to_be_bytes());
        data.extend_from_slice(&0xFFFEu16.to_be_bytes());
        data.extend_from_slice(&0x07C0u16.to_be_bytes());

        let frames = decode_cs16(&data).unwrap();
        assert_eq!(frames[0].width(), 2);
        assert_eq!(frames[0].data(), &[0xFFFF, 0x07E0]);
    }

    fn c16_single_row(width: u16, stream: &[u16]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&3u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&14u32.to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        for v in stream {
            out.extend_from_slice(&v.to_le_bytes());
        }
        out
    }

    #[test]
    fn rle_runs() {
        let data = c16_single_row(4, &[0x0002, 0x0005, 0xAAAA, 0xBBBB, 0x0000, 0x0000]);
        let frames = decode_cs16(&data).unwrap();
        assert_eq!(frames[0].data(), &[0, 0xAAAA, 0xBBBB, 0]);
    }

    #[test]
    fn rle_truncated_run_is_padded() {
        let data = c16_single_row(3, &[0x0007, 0xAAAA]);
        let frames = decode_cs16(&data).unwrap();
        assert_eq!(frames[0].data(), &[0xAAAA, 0, 0]);
    }

    #[test]
    fn rle_overlong_run_is_clamped() {
        let data = c16_single_row(2, &[0x0007, 1, 2, 3, 0x0000, 0x0000]);
        let frames = decode_cs16(&data).unwrap();
        assert_eq!(frames[0].data(), &[1, 2]);
    }

    #[test]
    fn headers_include_row_offsets() {
        let mut data = Vec::new();
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&22u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&26u32.to_le_bytes());
        data.extend_from_slice(&30u32.to_le_bytes());

        let (format, entries) = read_headers(&data).unwrap();
        assert!(format.compressed);
        assert_eq!(entries[0].row_offsets, vec![26, 30]);
    }
}
