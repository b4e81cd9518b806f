//! Packing 8-bit artwork into RGB565 frames.

use crate::{
    consts::{COL_BLACK, COL_MASK},
    dither::{ChannelDitherer, Curve, Noise, Strategy},
    image::PixelBuffer,
    utils::rgb888_to_rgb565_floor,
};
use snafu::{ensure, Snafu};

/// Bits kept per channel, in R, G, B order.
const RGB565_BITS: [u8; 3] = [5, 6, 5];

#[derive(Debug, Snafu)]
pub enum PackError {
    #[snafu(display(
        "Specified image dimensions don't match the number of bytes: {width} * {height} * {channels} == {} bytes, but {byte_count} bytes were given",
        width * height * channels
    ))]
    InvalidDimensions {
        width: usize,
        height: usize,
        channels: usize,
        byte_count: usize,
    },
    #[snafu(display(
        "The {channel} plane has {sample_count} samples, but a {width}x{height} image needs {}",
        width * height
    ))]
    InvalidPlane {
        channel: &'static str,
        width: usize,
        height: usize,
        sample_count: usize,
    },
}

/// Converts interleaved 8-bit pixels to RGB565 frames, dithering every channel.
#[derive(Debug, Clone)]
pub struct SpritePacker {
    colour: ChannelDitherer,
    alpha: ChannelDitherer,
    false_black: u16,
}

impl SpritePacker {
    pub fn new(colour: Strategy, alpha: Strategy) -> Self {
        Self {
            colour: ChannelDitherer::new(colour),
            alpha: ChannelDitherer::new(alpha).with_curve(Curve::Direct),
            false_black: COL_BLACK,
        }
    }

    /// Sets the colour written for opaque pixels that would otherwise pack to the mask colour.
    pub fn with_false_black(mut self, false_black: u16) -> Self {
        self.false_black = false_black;
        self
    }

    /// Makes random strategies reproducible.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.colour = self.colour.with_noise(Noise::seeded(seed));
        self.alpha = self.alpha.with_noise(Noise::seeded(seed.wrapping_add(1)));
        self
    }

    fn split<const N: usize>(
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Result<[Vec<u8>; N], PackError> {
        let count = width as usize * height as usize;
        ensure!(
            count * N == pixels.len(),
            InvalidDimensionsSnafu {
                width: width as usize,
                height: height as usize,
                channels: N,
                byte_count: pixels.len()
            }
        );

        let mut channels: [Vec<u8>; N] = core::array::from_fn(|_| Vec::with_capacity(count));
        for pixel in pixels.chunks_exact(N) {
            for (channel, &sample) in channels.iter_mut().zip(pixel) {
                channel.push(sample);
            }
        }
        Ok(channels)
    }

    fn dither_colour(&mut self, width: u32, height: u32, channels: &mut [Vec<u8>]) {
        for (channel, bits) in channels.iter_mut().zip(RGB565_BITS) {
            self.colour.run(width, height, channel, bits);
        }
    }

    /// Packs RGBA pixels (four bytes each) into a sprite frame.
    ///
    /// Pixels whose dithered alpha is off become the mask colour. Opaque pixels that pack to the
    /// mask colour are replaced by the false black.
    pub fn pack_rgba(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<PixelBuffer, PackError> {
        let channels = Self::split::<4>(width, height, rgba)?;
        Ok(self.pack_channels(width, height, channels))
    }

    /// Like [`pack_rgba`](Self::pack_rgba), but with each channel in its own plane.
    pub fn pack_planes(
        &mut self,
        width: u32,
        height: u32,
        [r, g, b, a]: [&[u8]; 4],
    ) -> Result<PixelBuffer, PackError> {
        let count = width as usize * height as usize;
        for (channel, plane) in ["red", "green", "blue", "alpha"].into_iter().zip([r, g, b, a]) {
            ensure!(
                plane.len() == count,
                InvalidPlaneSnafu {
                    channel,
                    width: width as usize,
                    height: height as usize,
                    sample_count: plane.len()
                }
            );
        }

        let channels = [r.to_vec(), g.to_vec(), b.to_vec(), a.to_vec()];
        Ok(self.pack_channels(width, height, channels))
    }

    fn pack_channels(
        &mut self,
        width: u32,
        height: u32,
        mut channels: [Vec<u8>; 4],
    ) -> PixelBuffer {
        self.dither_colour(width, height, &mut channels[..3]);
        self.alpha.run(width, height, &mut channels[3], 1);

        let false_black = self.false_black;
        let [r, g, b, a] = &channels;
        let data = itertools::izip!(r, g, b, a)
            .map(|(&r, &g, &b, &a)| {
                if a < 0x80 {
                    return COL_MASK;
                }
                match rgb888_to_rgb565_floor([r, g, b]) {
                    COL_MASK => false_black,
                    colour => colour,
                }
            })
            .collect();

        PixelBuffer::from_raw(width, height, data)
    }

    /// Packs RGB pixels (three bytes each) into a background frame.
    ///
    /// There is no transparency here, so black packs to the mask colour like any other value.
    pub fn pack_rgb(
        &mut self,
        width: u32,
        height: u32,
        rgb: &[u8],
    ) -> Result<PixelBuffer, PackError> {
        let mut channels = Self::split::<3>(width, height, rgb)?;
        self.dither_colour(width, height, &mut channels);

        let [r, g, b] = &channels;
        let data = itertools::izip!(r, g, b)
            .map(|(&r, &g, &b)| rgb888_to_rgb565_floor([r, g, b]))
            .collect();

        Ok(PixelBuffer::from_raw(width, height, data))
    }
}

/// Packs RGBA pixels (four bytes each) into an RGB565 sprite frame.
///
/// Colour is dithered with `colour`, alpha down to a single bit with `alpha`.
pub fn rgba_to_565(
    width: u32,
    height: u32,
    rgba: &[u8],
    false_black: u16,
    colour: Strategy,
    alpha: Strategy,
) -> Result<PixelBuffer, PackError> {
    SpritePacker::new(colour, alpha)
        .with_false_black(false_black)
        .pack_rgba(width, height, rgba)
}

/// Packs separate R, G, B and A planes into an RGB565 sprite frame.
///
/// The same as [`rgba_to_565`], for callers that keep their channels apart.
#[allow(clippy::too_many_arguments)]
pub fn planar_rgba_to_565(
    width: u32,
    height: u32,
    r: &[u8],
    g: &[u8],
    b: &[u8],
    a: &[u8],
    false_black: u16,
    colour: Strategy,
    alpha: Strategy,
) -> Result<PixelBuffer, PackError> {
    SpritePacker::new(colour, alpha)
        .with_false_black(false_black)
        .pack_planes(width, height, [r, g, b, a])
}

/// Packs RGB pixels (three bytes each) into an RGB565 background frame.
pub fn rgb_to_565(
    width: u32,
    height: u32,
    rgb: &[u8],
    colour: Strategy,
) -> Result<PixelBuffer, PackError> {
    SpritePacker::new(colour, Strategy::Nearest).pack_rgb(width, height, rgb)
}
