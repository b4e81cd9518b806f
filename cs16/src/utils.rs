/// Packs 8-bit channels into RGB565 by dropping their low bits.
///
/// This is the "floor" conversion: any value produced by [`rgb565_to_rgb888`] comes back
/// unchanged.
#[inline]
pub const fn rgb888_to_rgb565_floor([r, g, b]: [u8; 3]) -> u16 {
    (((r as u16) << 8) & 0xF800) | (((g as u16) << 3) & 0x07E0) | (((b as u16) >> 3) & 0x001F)
}

/// Converts an RGB565 pixel into an RGB888 pixel.
///
/// Channels are bit-copied downwards (`RRRRR` becomes `RRRRRRRR`), so full intensity maps to
/// 255 and the conversion round-trips through [`rgb888_to_rgb565_floor`].
#[inline]
pub const fn rgb565_to_rgb888(pixel: u16) -> [u8; 3] {
    let r = ((pixel & 0xF800) >> 8) as u8;
    let g = ((pixel & 0x07E0) >> 3) as u8;
    let b = ((pixel & 0x001F) << 3) as u8;

    [r | (r >> 5), g | (g >> 6), b | (b >> 5)]
}

/// Converts an RGB555 pixel into an RGB565 pixel.
///
/// ```plain
/// 555: 0RRRRRGGGGGBBBBB
/// 565: RRRRRGGGGGgBBBBB
/// ```
///
/// R and G move up a bit, the top G bit is copied into the new low G bit, B stays.
#[inline]
pub const fn rgb555_to_rgb565(pixel: u16) -> u16 {
    ((pixel & 0x7FE0) << 1) | ((pixel & 0x0200) >> 4) | (pixel & 0x001F)
}

/// Converts an RGB5551 pixel into an RGB565 pixel.
///
/// ```plain
/// 5551: RRRRRGGGGGBBBBBx
/// 565:  RRRRRGGGGGgBBBBB
/// ```
#[inline]
pub const fn rgb5551_to_rgb565(pixel: u16) -> u16 {
    (pixel & 0xFFC0) | ((pixel & 0x0400) >> 5) | ((pixel & 0x003E) >> 1)
}
