use crate::{
    consts::C16_END,
    encode::{check_frames, raw_header, rle_header, CompressedFrame, EncodeError, WriteIoSnafu},
    image::PixelBuffer,
};
use byteorder::{LittleEndian, WriteBytesExt};
use snafu::ResultExt;
use std::io::Write;

/// Streams an uncompressed RGB565 S16 file to `w`.
///
/// Produces the same bytes as [`encode_raw`](crate::encode_raw) without holding the whole file
/// in memory.
pub fn write_raw<W: Write>(frames: &[PixelBuffer], mut w: W) -> Result<(), EncodeError> {
    check_frames(frames)?;

    w.write_all(&raw_header(frames)?).context(WriteIoSnafu)?;
    for frame in frames {
        write_samples(frame.data(), &mut w)?;
    }

    Ok(())
}

/// Streams a compressed RGB565 C16 file to `w`.
pub fn write_rle<W: Write>(frames: &[PixelBuffer], mut w: W) -> Result<(), EncodeError> {
    macro_rules! w {
        ($value:expr) => {
            w.write_u16::<LittleEndian>($value).context(WriteIoSnafu)
        };
    }

    check_frames(frames)?;

    // row offsets need every row's length up front
    let compressed = frames.iter().map(CompressedFrame::new).collect::<Vec<_>>();
    w.write_all(&rle_header(&compressed)?)
        .context(WriteIoSnafu)?;

    for frame in &compressed {
        for row in &frame.rows {
            write_samples(row, &mut w)?;
            w!(C16_END)?;
        }
        w!(C16_END)?;
    }

    Ok(())
}

fn write_samples<W: Write>(samples: &[u16], mut w: W) -> Result<(), EncodeError> {
    for &sample in samples {
        w.write_u16::<LittleEndian>(sample).context(WriteIoSnafu)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{consts::COL_MASK, encode_raw, encode_rle};

    fn frames() -> Vec<PixelBuffer> {
        vec![
            PixelBuffer::from_data(3, 2, vec![COL_MASK, 0x1234, 0x1234, 0xFFFF, COL_MASK, COL_MASK])
                .unwrap(),
            PixelBuffer::new_filled(2, 1, 0x0020),
        ]
    }

    #[test]
    fn streamed_matches_buffered() {
        let frames = frames();

        let mut raw = Vec::new();
        write_raw(&frames, &mut raw).unwrap();
        assert_eq!(raw, encode_raw(&frames).unwrap());

        let mut rle = Vec::new();
        write_rle(&frames, &mut rle).unwrap();
        assert_eq!(rle, encode_rle(&frames).unwrap());
    }

    #[test]
    fn write_errors_are_reported() {
        let mut buf = [0u8; 8];
        let result = write_raw(&frames(), &mut buf[..]);
        assert!(matches!(result, Err(EncodeError::WriteIo { .. })));
    }
}
