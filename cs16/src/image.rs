use crate::{
    consts::{COL_BLACK, COL_MASK},
    utils::rgb565_to_rgb888,
};
use snafu::{ensure, OptionExt, Snafu};

#[derive(Debug, Snafu)]
pub enum CropError {
    #[snafu(display("Invalid crop range {start}..{end} for a size of {size}"))]
    InvalidCrop { start: u32, end: u32, size: u32 },
    #[snafu(display("Padding {kept} pixels by {pad_start} and {pad_end} overflows the image size"))]
    TooLarge {
        kept: u32,
        pad_start: u32,
        pad_end: u32,
    },
}

#[derive(Debug, Snafu)]
#[snafu(display(
    "Image dimensions don't match the number of pixels: {width} * {height} != {pixel_count}"
))]
pub struct SizeMismatch {
    width: u32,
    height: u32,
    pixel_count: usize,
}

/// An RGB565 frame.
///
/// Out-of-range reads give [`COL_MASK`], out-of-range writes do nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u16>,
}

impl PixelBuffer {
    /// Creates a fully transparent buffer.
    pub fn new(width: u32, height: u32) -> Self {
        Self::new_filled(width, height, COL_MASK)
    }

    pub fn new_filled(width: u32, height: u32, colour: u16) -> Self {
        Self {
            width,
            height,
            data: vec![colour; width as usize * height as usize],
        }
    }

    /// Wraps existing pixel data, which must be exactly `width * height` long.
    pub fn from_data(width: u32, height: u32, data: Vec<u16>) -> Result<Self, SizeMismatch> {
        ensure!(
            width as usize * height as usize == data.len(),
            SizeMismatchSnafu {
                width,
                height,
                pixel_count: data.len()
            }
        );
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Wraps pixel data that the caller already sized correctly.
    pub(crate) fn from_raw(width: u32, height: u32, data: Vec<u16>) -> Self {
        debug_assert_eq!(width as usize * height as usize, data.len());
        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn data(&self) -> &[u16] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u16] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<u16> {
        self.data
    }

    /// A single row of pixels.
    #[inline]
    pub fn row(&self, y: u32) -> &[u16] {
        let start = y as usize * self.width as usize;
        &self.data[start..start + self.width as usize]
    }

    #[inline]
    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        Some(x as usize + y as usize * self.width as usize)
    }

    /// Gets a pixel, or [`COL_MASK`] if out of range.
    #[inline]
    pub fn pixel(&self, x: i64, y: i64) -> u16 {
        self.index(x, y).map_or(COL_MASK, |i| self.data[i])
    }

    /// Sets a pixel. Does nothing if out of range.
    #[inline]
    pub fn set_pixel(&mut self, x: i64, y: i64, colour: u16) {
        if let Some(i) = self.index(x, y) {
            self.data[i] = colour;
        }
    }

    /// Expands to 8-bit RGB. The mask colour comes out as black.
    pub fn to_rgb(&self) -> Vec<[u8; 3]> {
        self.data.iter().map(|&p| rgb565_to_rgb888(p)).collect()
    }

    /// Expands to 8-bit RGBA. The mask colour comes out as fully transparent black, everything
    /// else as fully opaque.
    pub fn to_rgba(&self) -> Vec<[u8; 4]> {
        self.data
            .iter()
            .map(|&p| {
                if p == COL_MASK {
                    [0; 4]
                } else {
                    let [r, g, b] = rgb565_to_rgb888(p);
                    [r, g, b, 255]
                }
            })
            .collect()
    }

    /// Crops and then pads both axes.
    ///
    /// Boxes are `(left, top, right, bottom)`. The crop box is in pixel coordinates (end
    /// exclusive), the pad box is the amount of `pad_colour` to add on each side.
    pub fn crop_pad(
        &mut self,
        crop: (u32, u32, u32, u32),
        pad: (u32, u32, u32, u32),
        pad_colour: u16,
    ) -> Result<(), CropError> {
        self.crop_pad_x(crop.0, crop.2, pad.0, pad.2, pad_colour)?;
        self.crop_pad_y(crop.1, crop.3, pad.1, pad.3, pad_colour)
    }

    pub fn crop_pad_x(
        &mut self,
        crop_l: u32,
        crop_r: u32,
        pad_l: u32,
        pad_r: u32,
        pad_colour: u16,
    ) -> Result<(), CropError> {
        ensure!(
            crop_l <= crop_r && crop_r <= self.width,
            InvalidCropSnafu {
                start: crop_l,
                end: crop_r,
                size: self.width
            }
        );

        let new_width = padded_size(crop_r - crop_l, pad_l, pad_r)?;
        let mut data = Vec::with_capacity(new_width as usize * self.height as usize);
        for y in 0..self.height {
            let row = self.row(y);
            data.extend(core::iter::repeat(pad_colour).take(pad_l as usize));
            data.extend_from_slice(&row[crop_l as usize..crop_r as usize]);
            data.extend(core::iter::repeat(pad_colour).take(pad_r as usize));
        }

        self.data = data;
        self.width = new_width;
        Ok(())
    }

    pub fn crop_pad_y(
        &mut self,
        crop_u: u32,
        crop_d: u32,
        pad_u: u32,
        pad_d: u32,
        pad_colour: u16,
    ) -> Result<(), CropError> {
        ensure!(
            crop_u <= crop_d && crop_d <= self.height,
            InvalidCropSnafu {
                start: crop_u,
                end: crop_d,
                size: self.height
            }
        );

        let width = self.width as usize;
        let new_height = padded_size(crop_d - crop_u, pad_u, pad_d)?;
        let mut data = Vec::with_capacity(width * new_height as usize);
        data.extend(core::iter::repeat(pad_colour).take(pad_u as usize * width));
        data.extend_from_slice(&self.data[crop_u as usize * width..crop_d as usize * width]);
        data.extend(core::iter::repeat(pad_colour).take(pad_d as usize * width));

        self.data = data;
        self.height = new_height;
        Ok(())
    }

    /// Shifts the image by the given amounts.
    ///
    /// Negative amounts delete pixels from the top/left, positive amounts pad the top/left with
    /// `pad_colour`. The image size changes accordingly. Fails without touching the image if the
    /// new size doesn't fit in a u32.
    pub fn shift(&mut self, x: i64, y: i64, pad_colour: u16) -> Result<(), CropError> {
        // shift_x leaves the height alone, so check it before changing anything
        if y > 0 {
            padded_size(self.height, saturate_u32(y), 0)?;
        }
        self.shift_x(x, pad_colour)?;
        self.shift_y(y, pad_colour)
    }

    pub fn shift_x(&mut self, amount: i64, pad_colour: u16) -> Result<(), CropError> {
        let width = i64::from(self.width);
        if amount <= -width {
            self.crop_pad_x(0, 0, 0, 0, pad_colour)
        } else if amount < 0 {
            self.crop_pad_x((-amount) as u32, self.width, 0, 0, pad_colour)
        } else if amount > 0 {
            self.crop_pad_x(0, self.width, saturate_u32(amount), 0, pad_colour)
        } else {
            Ok(())
        }
    }

    pub fn shift_y(&mut self, amount: i64, pad_colour: u16) -> Result<(), CropError> {
        let height = i64::from(self.height);
        if amount <= -height {
            self.crop_pad_y(0, 0, 0, 0, pad_colour)
        } else if amount < 0 {
            self.crop_pad_y((-amount) as u32, self.height, 0, 0, pad_colour)
        } else if amount > 0 {
            self.crop_pad_y(0, self.height, saturate_u32(amount), 0, pad_colour)
        } else {
            Ok(())
        }
    }

    /// Copies `source` onto this image with its top-left corner at `(tx, ty)`.
    ///
    /// Whatever falls outside this image is dropped. With `alpha_aware`, masked source pixels
    /// leave the destination alone; without it they are copied like any other colour.
    pub fn blit(&mut self, source: &PixelBuffer, tx: i64, ty: i64, alpha_aware: bool) {
        let (x_start, x_end) = overlap(tx, source.width, self.width);
        let (y_start, y_end) = overlap(ty, source.height, self.height);
        if x_start >= x_end {
            return;
        }

        for y in y_start..y_end {
            let src = &source.row(y)[x_start as usize..x_end as usize];
            let dst_y = (ty + i64::from(y)) as usize;
            let dst_x = (tx + i64::from(x_start)) as usize;
            let dst_start = dst_y * self.width as usize + dst_x;
            let dst = &mut self.data[dst_start..dst_start + src.len()];

            if alpha_aware {
                for (d, &s) in dst.iter_mut().zip(src) {
                    if s != COL_MASK {
                        *d = s;
                    }
                }
            } else {
                dst.copy_from_slice(src);
            }
        }
    }

    /// Replaces the colour of every opaque pixel with the colour at the same position in
    /// `source`, offset by `(source_x, source_y)`. Transparency stays as it was.
    ///
    /// Source pixels that are masked (or out of range) become [`COL_BLACK`] so that no opaque
    /// pixel turns transparent.
    pub fn colours_from(&mut self, source: &PixelBuffer, source_x: i64, source_y: i64) {
        let width = self.width as usize;
        for (i, pixel) in self.data.iter_mut().enumerate() {
            if *pixel == COL_MASK {
                continue;
            }
            let x = (i % width) as i64;
            let y = (i / width) as i64;
            let colour = source.pixel(source_x + x, source_y + y);
            *pixel = if colour == COL_MASK { COL_BLACK } else { colour };
        }
    }
}

/// The range of source coordinates that land inside the destination when placed at `offset`.
fn overlap(offset: i64, source_size: u32, dest_size: u32) -> (u32, u32) {
    let start = (-offset).clamp(0, i64::from(source_size));
    let end = (i64::from(dest_size) - offset).clamp(0, i64::from(source_size));
    (start as u32, end as u32)
}

/// `kept + pad_start + pad_end`, if it fits in a u32.
fn padded_size(kept: u32, pad_start: u32, pad_end: u32) -> Result<u32, CropError> {
    kept.checked_add(pad_start)
        .and_then(|size| size.checked_add(pad_end))
        .context(TooLargeSnafu {
            kept,
            pad_start,
            pad_end,
        })
}

fn saturate_u32(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(width: u32, height: u32) -> PixelBuffer {
        let data = (1..=(width * height) as u16).collect();
        PixelBuffer::from_data(width, height, data).unwrap()
    }

    #[test]
    fn out_of_range_access() {
        let mut image = numbered(2, 2);
        assert_eq!(image.pixel(-1, 0), COL_MASK);
        assert_eq!(image.pixel(0, 2), COL_MASK);
        assert_eq!(image.pixel(1, 1), 4);

        image.set_pixel(2, 0, 99);
        image.set_pixel(0, -1, 99);
        assert_eq!(image.data(), &[1, 2, 3, 4]);

        image.set_pixel(1, 0, 99);
        assert_eq!(image.data(), &[1, 99, 3, 4]);
    }

    #[test]
    fn from_data_checks_length() {
        assert!(PixelBuffer::from_data(2, 2, vec![0; 3]).is_err());
        assert!(PixelBuffer::from_data(0, 5, vec![]).is_ok());
    }

    #[test]
    fn crop_pad_both_axes() {
        let mut image = numbered(3, 3);
        image.crop_pad((1, 1, 3, 2), (1, 0, 0, 1), 0xAAAA).unwrap();
        assert_eq!(image.width(), 3);
        assert_eq!(image.height(), 2);
        assert_eq!(image.data(), &[0xAAAA, 5, 6, 0xAAAA, 0xAAAA, 0xAAAA]);
        assert_eq!(image.data().len(), 6);
    }

    #[test]
    fn crop_rejects_bad_ranges() {
        let mut image = numbered(3, 3);
        assert!(image.crop_pad_x(2, 1, 0, 0, 0).is_err());
        assert!(image.crop_pad_x(0, 4, 0, 0, 0).is_err());
        assert!(image.crop_pad_y(0, 4, 0, 0, 0).is_err());
        assert_eq!(image, numbered(3, 3));
    }

    #[test]
    fn shift_pads_and_deletes() {
        let mut image = numbered(2, 2);
        image.shift(1, -1, 0).unwrap();
        assert_eq!((image.width(), image.height()), (3, 1));
        assert_eq!(image.data(), &[0, 3, 4]);

        image.shift(-10, 0, 0).unwrap();
        assert_eq!((image.width(), image.height()), (0, 1));
        assert!(image.data().is_empty());
    }

    #[test]
    fn oversized_shifts_fail_cleanly() {
        let mut image = numbered(2, 2);
        assert!(matches!(
            image.shift(i64::from(u32::MAX), 0, 0),
            Err(CropError::TooLarge { .. })
        ));
        assert!(matches!(
            image.shift(i64::MAX, 0, 0),
            Err(CropError::TooLarge { .. })
        ));
        assert!(matches!(
            image.shift(-1, i64::from(u32::MAX), 0),
            Err(CropError::TooLarge { .. })
        ));
        // nothing was changed, not even the x axis of the last one
        assert_eq!(image, numbered(2, 2));

        assert!(matches!(
            image.crop_pad_y(0, 2, u32::MAX, 1, 0),
            Err(CropError::TooLarge { .. })
        ));
        assert_eq!(image, numbered(2, 2));
    }

    #[test]
    fn blit_clips() {
        let mut dest = PixelBuffer::new(3, 3);
        dest.blit(&numbered(2, 2), 2, -1, false);
        assert_eq!(dest.data(), &[0, 0, 3, 0, 0, 0, 0, 0, 0]);

        let mut dest = PixelBuffer::new(2, 2);
        dest.blit(&numbered(2, 2), 5, 5, false);
        dest.blit(&numbered(2, 2), -5, 0, false);
        assert_eq!(dest.data(), &[0; 4]);
    }

    #[test]
    fn blit_alpha_awareness() {
        let source = PixelBuffer::from_data(2, 1, vec![COL_MASK, 7]).unwrap();

        let mut dest = PixelBuffer::new_filled(2, 1, 5);
        dest.blit(&source, 0, 0, true);
        assert_eq!(dest.data(), &[5, 7]);

        let mut dest = PixelBuffer::new_filled(2, 1, 5);
        dest.blit(&source, 0, 0, false);
        assert_eq!(dest.data(), &[COL_MASK, 7]);
    }

    #[test]
    fn colour_transplant() {
        let mut victim = PixelBuffer::from_data(3, 1, vec![COL_MASK, 1, 1]).unwrap();
        let source = PixelBuffer::from_data(3, 1, vec![10, 20, COL_MASK]).unwrap();
        victim.colours_from(&source, 0, 0);
        assert_eq!(victim.data(), &[COL_MASK, 20, COL_BLACK]);

        let mut victim = PixelBuffer::from_data(2, 1, vec![1, 1]).unwrap();
        victim.colours_from(&source, 1, 0);
        assert_eq!(victim.data(), &[20, COL_BLACK]);
    }

    #[test]
    fn rgba_expansion() {
        let image = PixelBuffer::from_data(2, 1, vec![COL_MASK, 0xFFFF]).unwrap();
        assert_eq!(image.to_rgba(), vec![[0, 0, 0, 0], [255, 255, 255, 255]]);
        assert_eq!(image.to_rgb(), vec![[0, 0, 0], [255, 255, 255]]);
    }
}
