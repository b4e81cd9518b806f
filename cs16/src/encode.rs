use crate::{
    consts::*,
    format::FileFormatDescriptor,
    image::PixelBuffer,
};
use byteorder::{ByteOrder, LittleEndian};
use snafu::{ensure, Snafu};

mod std_api;
pub use std_api::*;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum EncodeError {
    #[snafu(display("Too many frames: {count} given, at most 65535 can be stored"))]
    TooManyFrames { count: usize },
    #[snafu(display(
        "Frame {index} is {width}x{height}, but at most 65535x65535 can be stored"
    ))]
    FrameTooLarge { index: usize, width: u32, height: u32 },
    #[snafu(display("Encoded data would not be addressable with 32-bit offsets"))]
    FileTooLarge,
    #[snafu(display(
        "A background of {blocks_wide}x{blocks_high} tiles has more than 65535 tiles"
    ))]
    TooManyTiles { blocks_wide: u32, blocks_high: u32 },
    WriteIo { source: std::io::Error },
}

/// A frame converted to C16 runs, one run stream per row (without the row terminators).
#[derive(Debug, Clone)]
pub(crate) struct CompressedFrame {
    pub width: u16,
    pub height: u16,
    pub rows: Vec<Vec<u16>>,
}

impl CompressedFrame {
    pub fn new(frame: &PixelBuffer) -> Self {
        let rows = (0..frame.height())
            .map(|y| {
                let mut stream = Vec::new();
                compress_row(frame.row(y), &mut stream);
                stream
            })
            .collect();
        Self {
            width: frame.width() as u16,
            height: frame.height() as u16,
            rows,
        }
    }

    /// Encoded size of the frame data: each row plus its terminator, then the end-of-image
    /// marker.
    pub fn data_size(&self) -> usize {
        self.rows.iter().map(|row| (row.len() + 1) * 2).sum::<usize>() + 2
    }
}

/// Appends the runs for a row of pixels to `out`.
///
/// Runs are maximal stretches of either all-transparent or all-opaque pixels, split so that none
/// is longer than [`C16_MAX_RUN`].
pub(crate) fn compress_row(row: &[u16], out: &mut Vec<u16>) {
    let mut rest = row;
    while let Some(&first) = rest.first() {
        let transparent = first == COL_MASK;
        let len = rest
            .iter()
            .take(C16_MAX_RUN)
            .take_while(|&&p| (p == COL_MASK) == transparent)
            .count();
        let (run, tail) = rest.split_at(len);
        debug_assert!(run.len() <= C16_MAX_RUN);

        let header = (run.len() as u16) << 1;
        if transparent {
            out.push(header);
        } else {
            out.push(header | C16_RUN_OPAQUE);
            out.extend_from_slice(run);
        }

        rest = tail;
    }
}

pub(crate) fn check_frames(frames: &[PixelBuffer]) -> Result<(), EncodeError> {
    ensure!(
        frames.len() <= usize::from(u16::MAX),
        TooManyFramesSnafu {
            count: frames.len()
        }
    );
    for (index, frame) in frames.iter().enumerate() {
        let (width, height) = (frame.width(), frame.height());
        ensure!(
            width <= u32::from(u16::MAX) && height <= u32::from(u16::MAX),
            FrameTooLargeSnafu {
                index,
                width,
                height
            }
        );
    }
    Ok(())
}

fn offset(value: usize) -> Result<u32, EncodeError> {
    u32::try_from(value).map_err(|_| EncodeError::FileTooLarge)
}

fn push_entry(out: &mut Vec<u8>, data_offset: u32, width: u16, height: u16) {
    out.extend_from_slice(&data_offset.to_le_bytes());
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&height.to_le_bytes());
}

pub(crate) fn push_samples(out: &mut Vec<u8>, samples: &[u16]) {
    let start = out.len();
    out.resize(start + samples.len() * 2, 0);
    LittleEndian::write_u16_into(samples, &mut out[start..]);
}

/// Header and frame table of an S16 file holding `frames`. Frames are expected to be checked.
pub(crate) fn raw_header(frames: &[PixelBuffer]) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::with_capacity(CS16_HEADER_SIZE + frames.len() * CS16_FRAME_SIZE);
    out.extend_from_slice(&MAGIC_S16_565.to_le_bytes());
    out.extend_from_slice(&(frames.len() as u16).to_le_bytes());

    let mut data_offset = CS16_HEADER_SIZE + frames.len() * CS16_FRAME_SIZE;
    for frame in frames {
        push_entry(
            &mut out,
            offset(data_offset)?,
            frame.width() as u16,
            frame.height() as u16,
        );
        data_offset += frame.data().len() * 2;
    }
    offset(data_offset)?;

    Ok(out)
}

/// Header, frame table and row offsets of a C16 file holding `frames`.
pub(crate) fn rle_header(frames: &[CompressedFrame]) -> Result<Vec<u8>, EncodeError> {
    let header_size = CS16_HEADER_SIZE
        + frames
            .iter()
            .map(|f| CS16_FRAME_SIZE + usize::from(f.height.saturating_sub(1)) * C16_ROW_OFFSET_SIZE)
            .sum::<usize>();

    let mut out = Vec::with_capacity(header_size);
    out.extend_from_slice(&MAGIC_C16_565.to_le_bytes());
    out.extend_from_slice(&(frames.len() as u16).to_le_bytes());

    let mut data_offset = header_size;
    for frame in frames {
        push_entry(&mut out, offset(data_offset)?, frame.width, frame.height);
        for (y, row) in frame.rows.iter().enumerate() {
            if y != 0 {
                out.extend_from_slice(&offset(data_offset)?.to_le_bytes());
            }
            data_offset += (row.len() + 1) * 2;
        }
        // end-of-image marker
        data_offset += 2;
    }
    offset(data_offset)?;

    assert_eq!(
        out.len(),
        header_size,
        "C16 header size doesn't match where frame data starts"
    );

    Ok(out)
}

/// Encodes frames as an uncompressed RGB565 S16 file.
pub fn encode_raw(frames: &[PixelBuffer]) -> Result<Vec<u8>, EncodeError> {
    check_frames(frames)?;

    let mut out = raw_header(frames)?;
    for frame in frames {
        push_samples(&mut out, frame.data());
    }

    Ok(out)
}

/// Encodes frames as a compressed RGB565 C16 file.
pub fn encode_rle(frames: &[PixelBuffer]) -> Result<Vec<u8>, EncodeError> {
    check_frames(frames)?;

    let compressed = frames.iter().map(CompressedFrame::new).collect::<Vec<_>>();
    let mut out = rle_header(&compressed)?;
    out.reserve(compressed.iter().map(CompressedFrame::data_size).sum());
    for frame in &compressed {
        for row in &frame.rows {
            push_samples(&mut out, row);
            out.extend_from_slice(&C16_END.to_le_bytes());
        }
        out.extend_from_slice(&C16_END.to_le_bytes());
    }

    Ok(out)
}

/// Encodes frames the same way (compressed or not) as an existing file of the given format.
pub fn encode_like(
    format: &FileFormatDescriptor,
    frames: &[PixelBuffer],
) -> Result<Vec<u8>, EncodeError> {
    if format.compressed {
        encode_rle(frames)
    } else {
        encode_raw(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::decode_cs16;

    fn runs(row: &[u16]) -> Vec<u16> {
        let mut out = Vec::new();
        compress_row(row, &mut out);
        out
    }

    #[test]
    fn row_runs() {
        assert_eq!(runs(&[0x0000, 0xFFFF]), vec![0x0002, 0x0003, 0xFFFF]);
        assert_eq!(runs(&[1, 2, 0, 0, 0]), vec![0x0005, 1, 2, 0x0006]);
        assert_eq!(runs(&[]), Vec::<u16>::new());
    }

    #[test]
    fn long_runs_are_split() {
        let row = vec![0x1234; 20000];
        let out = runs(&row);
        assert_eq!(out[0], ((C16_MAX_RUN as u16) << 1) | 1);
        let second = 1 + C16_MAX_RUN;
        assert_eq!(out[second], (((20000 - C16_MAX_RUN) as u16) << 1) | 1);
        assert_eq!(out.len(), 2 + 20000);

        let out = runs(&vec![0; 40000]);
        assert_eq!(
            out,
            vec![
                (C16_MAX_RUN as u16) << 1,
                (C16_MAX_RUN as u16) << 1,
                ((40000 - 2 * C16_MAX_RUN) as u16) << 1
            ]
        );
    }

    #[test]
    fn raw_layout() {
        let frame = PixelBuffer::from_data(2, 1, vec![0x1234, 0xABCD]).unwrap();
        let data = encode_raw(&[frame.clone(), frame]).unwrap();
        assert_eq!(&data[0..6], &[1, 0, 0, 0, 2, 0]);
        // first frame right after the table, second after the first
        assert_eq!(&data[6..14], &[22, 0, 0, 0, 2, 0, 1, 0]);
        assert_eq!(&data[14..22], &[26, 0, 0, 0, 2, 0, 1, 0]);
        assert_eq!(&data[22..26], &[0x34, 0x12, 0xCD, 0xAB]);
        assert_eq!(data.len(), 30);
    }

    #[test]
    fn rle_layout() {
        let frame = PixelBuffer::from_data(1, 2, vec![0xFFFF, 0x0000]).unwrap();
        let data = encode_rle(&[frame]).unwrap();
        let header_size = 6 + 8 + 4;
        assert_eq!(&data[0..6], &[3, 0, 0, 0, 1, 0]);
        assert_eq!(&data[6..10], &(header_size as u32).to_le_bytes());
        // row 1 starts after row 0: header, pixel, terminator
        assert_eq!(&data[14..18], &((header_size + 6) as u32).to_le_bytes());
        assert_eq!(
            &data[header_size..],
            &[0x03, 0x00, 0xFF, 0xFF, 0x00, 0x00, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00]
        );
    }

    #[test]
    fn empty_frames() {
        let frames = [PixelBuffer::new(0, 0), PixelBuffer::new(3, 0)];
        for data in [encode_raw(&frames).unwrap(), encode_rle(&frames).unwrap()] {
            let decoded = decode_cs16(&data).unwrap();
            assert_eq!(decoded, frames);
        }
    }

    #[test]
    fn oversized_frames_are_rejected() {
        let frame = PixelBuffer::new(70000, 0);
        assert!(matches!(
            encode_raw(&[frame]),
            Err(EncodeError::FrameTooLarge { index: 0, .. })
        ));
    }

    #[test]
    fn encode_like_follows_compression() {
        let frame = PixelBuffer::new_filled(1, 1, 0xFFFF);
        let c16 = encode_like(&crate::format::C16_555, &[frame.clone()]).unwrap();
        let s16 = encode_like(&crate::format::S16_555, &[frame]).unwrap();
        assert_eq!(c16[0], 3);
        assert_eq!(s16[0], 1);
    }
}
