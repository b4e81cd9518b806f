use argh::FromArgs;
use cs16::{
    consts::COL_MASK,
    dither::{tables::tables, ChannelDitherer, Curve, DEFAULT_ALPHA_STRATEGY, DEFAULT_COLOUR_STRATEGY},
    FileFormatDescriptor, PixelBuffer, SpritePacker, Strategy,
};
use image::{ImageFormat, RgbImage, RgbaImage};
use std::{error::Error, path::Path, str::FromStr};

type CliResult = Result<(), Box<dyn Error>>;

/// S16, C16 and BLK sprite tool.
///
/// Sprites are converted to directories of numbered PNG files. Decoding is lossless, though
/// RGB555 files come out as RGB565. Encoding drops the low bits of every channel, the
/// dithering modes decide how.
#[derive(FromArgs)]
struct Cli {
    #[argh(subcommand)]
    command: Command,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Command {
    Info(Info),
    EncodeS16(EncodeS16),
    EncodeC16(EncodeC16),
    EncodeBlk(EncodeBlk),
    Decode(Decode),
    DecodeFrame(DecodeFrame),
    DecodeBlk(DecodeBlk),
    DecodeC2b(DecodeC2b),
    Mask(Mask),
    Shift(Shift),
    Blit(Blit),
    GenPalRef(GenPalRef),
    Dither(Dither),
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Png,
    Jpg,
    Bmp,
}

impl FromStr for Format {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        #[rustfmt::skip]
        let Some(format) = s.eq_ignore_ascii_case("png").then_some(Format::Png)
               .or_else(|| s.eq_ignore_ascii_case("jpg").then_some(Format::Jpg))
               .or_else(|| s.eq_ignore_ascii_case("bmp").then_some(Format::Bmp))
        else { return Err("invalid string"); };

        Ok(format)
    }
}

impl From<Format> for ImageFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Png => ImageFormat::Png,
            Format::Jpg => ImageFormat::Jpeg,
            Format::Bmp => ImageFormat::Bmp,
        }
    }
}

fn main() -> CliResult {
    let Cli { command } = argh::from_env();

    match command {
        Command::Info(options) => info(options),
        Command::EncodeS16(EncodeS16 {
            cdmode,
            admode,
            input,
            output,
        }) => encode_frames(&input, &output, cdmode, admode, false),
        Command::EncodeC16(EncodeC16 {
            cdmode,
            admode,
            input,
            output,
        }) => encode_frames(&input, &output, cdmode, admode, true),
        Command::EncodeBlk(options) => encode_blk(options),
        Command::Decode(options) => decode(options),
        Command::DecodeFrame(options) => decode_frame(options),
        Command::DecodeBlk(options) => decode_blk(options),
        Command::DecodeC2b(options) => decode_c2b(options),
        Command::Mask(options) => mask(options),
        Command::Shift(options) => shift(options),
        Command::Blit(options) => blit(options),
        Command::GenPalRef(options) => gen_pal_ref(options),
        Command::Dither(options) => dither(options),
    }
}

fn load_rgba(path: &Path) -> Result<RgbaImage, Box<dyn Error>> {
    Ok(image::io::Reader::open(path)?
        .with_guessed_format()?
        .decode()?
        .into_rgba8())
}

/// Saves a frame with the mask colour as transparency, or as plain RGB if the format can't
/// store alpha.
fn save_frame(frame: &PixelBuffer, output: &Path, format: Format) -> CliResult {
    match format {
        Format::Jpg => save_opaque(frame, output, format),
        Format::Png | Format::Bmp => {
            RgbaImage::from_vec(frame.width(), frame.height(), frame.to_rgba().concat())
                .ok_or("failed to create image")?
                .save_with_format(output, format.into())?;
            Ok(())
        }
    }
}

/// Saves a frame ignoring the mask colour.
fn save_opaque(frame: &PixelBuffer, output: &Path, format: Format) -> CliResult {
    RgbImage::from_vec(frame.width(), frame.height(), frame.to_rgb().concat())
        .ok_or("failed to create image")?
        .save_with_format(output, format.into())?;
    Ok(())
}

fn read_frames(input: &str) -> Result<Vec<PixelBuffer>, Box<dyn Error>> {
    let data = std::fs::read(input)?;
    Ok(cs16::decode_cs16(&data)?)
}

/// Shows the format and frame sizes of S16/C16 files.
#[derive(FromArgs)]
#[argh(subcommand, name = "info")]
struct Info {
    /// one line per file
    #[argh(switch)]
    short: bool,

    /// the input files
    #[argh(positional)]
    inputs: Vec<String>,
}

fn info(options: Info) -> CliResult {
    let Info { short, inputs } = options;

    for input in inputs {
        let data = std::fs::read(&input)?;
        let Some(format) = cs16::identify(&data) else {
            println!("{input}: Unknown!");
            continue;
        };

        let (_, entries) = match cs16::read_headers(&data) {
            Ok(headers) => headers,
            Err(e) if short => {
                println!("{input}: {format} ({e})");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        if short {
            println!("{input}: {format}, {} frames", entries.len());
            continue;
        }

        println!("{input}: {format}");
        println!("{} frames", entries.len());
        for (index, entry) in entries.iter().enumerate() {
            println!(
                " {index}: {}x{} at {:#x}",
                entry.width, entry.height, entry.data_offset
            );
        }
    }

    Ok(())
}

/// Encodes a directory of frames as an uncompressed S16 file.
#[derive(FromArgs)]
#[argh(subcommand, name = "encode-s16")]
struct EncodeS16 {
    /// colour dithering mode
    #[argh(option, default = "DEFAULT_COLOUR_STRATEGY")]
    cdmode: Strategy,

    /// alpha dithering mode
    #[argh(option, default = "DEFAULT_ALPHA_STRATEGY")]
    admode: Strategy,

    /// directory of frames named 0.png, 1.png, ... (JPG and BMP work too)
    #[argh(positional)]
    input: String,
    /// the output file
    #[argh(positional)]
    output: String,
}

/// Encodes a directory of frames as a compressed C16 file.
#[derive(FromArgs)]
#[argh(subcommand, name = "encode-c16")]
struct EncodeC16 {
    /// colour dithering mode
    #[argh(option, default = "DEFAULT_COLOUR_STRATEGY")]
    cdmode: Strategy,

    /// alpha dithering mode
    #[argh(option, default = "DEFAULT_ALPHA_STRATEGY")]
    admode: Strategy,

    /// directory of frames named 0.png, 1.png, ... (JPG and BMP work too)
    #[argh(positional)]
    input: String,
    /// the output file
    #[argh(positional)]
    output: String,
}

fn frame_path(dir: &Path, index: usize) -> Option<std::path::PathBuf> {
    ["png", "jpg", "bmp"]
        .iter()
        .map(|ext| dir.join(format!("{index}.{ext}")))
        .find(|path| path.is_file())
}

fn encode_frames(
    input: &str,
    output: &str,
    cdmode: Strategy,
    admode: Strategy,
    compressed: bool,
) -> CliResult {
    if cdmode.is_random() || admode.is_random() {
        println!("Dithering with {cdmode}/{admode}, output will differ between runs");
    }

    let mut packer = SpritePacker::new(cdmode, admode);
    let mut frames = Vec::new();
    while let Some(path) = frame_path(Path::new(input), frames.len()) {
        let image = load_rgba(&path)?;
        println!(
            "Encoding {}x{} frame `{}`",
            image.width(),
            image.height(),
            path.display()
        );
        frames.push(packer.pack_rgba(image.width(), image.height(), image.as_raw())?);
    }

    if frames.is_empty() {
        return Err(format!("no frames found in `{input}`").into());
    }

    let v = if compressed {
        cs16::encode_rle(&frames)?
    } else {
        cs16::encode_raw(&frames)?
    };

    std::fs::write(output, &v)?;
    println!("Written {} bytes to `{output}`", v.len());

    Ok(())
}

/// Encodes an image as a BLK background.
#[derive(FromArgs)]
#[argh(subcommand, name = "encode-blk")]
struct EncodeBlk {
    /// colour dithering mode
    #[argh(option, default = "DEFAULT_COLOUR_STRATEGY")]
    cdmode: Strategy,

    /// the input file, a PNG, JPG or BMP
    #[argh(positional)]
    input: String,
    /// the output file
    #[argh(positional)]
    output: String,
}

fn encode_blk(options: EncodeBlk) -> CliResult {
    let EncodeBlk {
        cdmode,
        input,
        output,
    } = options;

    let image = image::io::Reader::open(&input)?
        .with_guessed_format()?
        .decode()?
        .into_rgb8();
    let (width, height) = image.dimensions();
    println!("Encoding {width}x{height} background");

    let background = cs16::rgb_to_565(width, height, image.as_raw(), cdmode)?;
    let v = cs16::encode_blk(&background)?;

    std::fs::write(&output, &v)?;
    println!("Written {} bytes to `{output}`", v.len());

    Ok(())
}

/// Decodes a S16/C16 file to a directory of numbered PNG files.
#[derive(FromArgs)]
#[argh(subcommand, name = "decode")]
struct Decode {
    /// the input file
    #[argh(positional)]
    input: String,
    /// the output directory, created if missing
    #[argh(positional)]
    output: String,
}

fn decode(options: Decode) -> CliResult {
    let Decode { input, output } = options;

    println!("Decoding `{input}`");
    let frames = read_frames(&input)?;

    let dir = Path::new(&output);
    std::fs::create_dir_all(dir)?;
    for (index, frame) in frames.iter().enumerate() {
        save_frame(frame, &dir.join(format!("{index}.png")), Format::Png)?;
    }

    println!("Written {} frames to `{output}`", frames.len());

    Ok(())
}

/// Decodes a single frame of a S16/C16 file.
#[derive(FromArgs)]
#[argh(subcommand, name = "decode-frame")]
struct DecodeFrame {
    /// output format (png, jpg, bmp)
    #[argh(option, default = "Format::Png")]
    format: Format,

    /// the input file
    #[argh(positional)]
    input: String,
    /// index of the frame
    #[argh(positional)]
    frame: usize,
    /// the output file
    #[argh(positional)]
    output: String,
}

fn decode_frame(options: DecodeFrame) -> CliResult {
    let DecodeFrame {
        format,
        input,
        frame,
        output,
    } = options;

    let frames = read_frames(&input)?;
    let image = frames
        .get(frame)
        .ok_or_else(|| format!("`{input}` has no frame {frame}"))?;
    save_frame(image, Path::new(&output), format)?;

    println!(
        "Written {}x{} frame to `{output}`",
        image.width(),
        image.height()
    );

    Ok(())
}

/// Decodes a BLK background to a PNG file.
#[derive(FromArgs)]
#[argh(subcommand, name = "decode-blk")]
struct DecodeBlk {
    /// the input file
    #[argh(positional)]
    input: String,
    /// the output file
    #[argh(positional)]
    output: String,
}

fn decode_blk(options: DecodeBlk) -> CliResult {
    let DecodeBlk { input, output } = options;

    println!("Decoding `{input}`");
    let background = cs16::decode_blk(&std::fs::read(&input)?)?;
    save_opaque(&background, Path::new(&output), Format::Png)?;

    println!(
        "Written {}x{} image to `{output}`",
        background.width(),
        background.height()
    );

    Ok(())
}

/// Decodes an older background, a S16 of 128x128 tiles in columns of 16, to a PNG file.
#[derive(FromArgs)]
#[argh(subcommand, name = "decode-c2b")]
struct DecodeC2b {
    /// the input file
    #[argh(positional)]
    input: String,
    /// the output file
    #[argh(positional)]
    output: String,
}

fn decode_c2b(options: DecodeC2b) -> CliResult {
    let DecodeC2b { input, output } = options;

    println!("Decoding `{input}`");
    let tiles = read_frames(&input)?;
    let background = cs16::stitch(tiles.len() as u32 / 16, 16, &tiles);
    save_opaque(&background, Path::new(&output), Format::Png)?;

    println!(
        "Written {}x{} image to `{output}`",
        background.width(),
        background.height()
    );

    Ok(())
}

/// Rewrites one frame of a S16/C16 file in place, keeping the file's compression.
fn edit_frame(
    victim: &str,
    frame: usize,
    check_pre: Option<&str>,
    check_post: Option<&str>,
    edit: impl FnOnce(&mut PixelBuffer) -> CliResult,
) -> CliResult {
    let data = std::fs::read(victim)?;
    let format: &FileFormatDescriptor =
        cs16::identify(&data).ok_or_else(|| format!("`{victim}` isn't a S16/C16 file"))?;
    let mut frames = cs16::decode_cs16(&data)?;
    let image = frames
        .get_mut(frame)
        .ok_or_else(|| format!("`{victim}` has no frame {frame}"))?;

    if let Some(path) = check_pre {
        save_frame(image, Path::new(path), Format::Png)?;
    }
    edit(image)?;
    if let Some(path) = check_post {
        save_frame(image, Path::new(path), Format::Png)?;
    }

    let v = cs16::encode_like(format, &frames)?;
    std::fs::write(victim, &v)?;
    println!("Written {} bytes to `{victim}`", v.len());

    Ok(())
}

/// **Rewrites** a frame to take its colours from frame 0 of another file, keeping its own
/// transparency.
#[derive(FromArgs)]
#[argh(subcommand, name = "mask")]
struct Mask {
    /// x position in the source
    #[argh(option, default = "0")]
    x: i64,
    /// y position in the source
    #[argh(option, default = "0")]
    y: i64,
    /// save the frame as PNG here before editing
    #[argh(option)]
    check_pre: Option<String>,
    /// save the frame as PNG here after editing
    #[argh(option)]
    check_post: Option<String>,

    /// the file to take colours from
    #[argh(positional)]
    source: String,
    /// the file to rewrite
    #[argh(positional)]
    victim: String,
    /// index of the frame to rewrite
    #[argh(positional)]
    frame: usize,
}

fn mask(options: Mask) -> CliResult {
    let Mask {
        x,
        y,
        check_pre,
        check_post,
        source,
        victim,
        frame,
    } = options;

    let source = read_frames(&source)?
        .into_iter()
        .next()
        .ok_or("the source file has no frames")?;
    edit_frame(
        &victim,
        frame,
        check_pre.as_deref(),
        check_post.as_deref(),
        |image| {
            image.colours_from(&source, x, y);
            Ok(())
        },
    )
}

/// **Rewrites** a frame to shift it. Negative amounts cut pixels off the top/left, positive
/// amounts add transparent pixels there.
#[derive(FromArgs)]
#[argh(subcommand, name = "shift")]
struct Shift {
    /// horizontal shift
    #[argh(option, default = "0")]
    x: i64,
    /// vertical shift
    #[argh(option, default = "0")]
    y: i64,
    /// save the frame as PNG here before editing
    #[argh(option)]
    check_pre: Option<String>,
    /// save the frame as PNG here after editing
    #[argh(option)]
    check_post: Option<String>,

    /// the file to rewrite
    #[argh(positional)]
    victim: String,
    /// index of the frame to rewrite
    #[argh(positional)]
    frame: usize,
}

fn shift(options: Shift) -> CliResult {
    let Shift {
        x,
        y,
        check_pre,
        check_post,
        victim,
        frame,
    } = options;

    edit_frame(
        &victim,
        frame,
        check_pre.as_deref(),
        check_post.as_deref(),
        |image| Ok(image.shift(x, y, COL_MASK)?),
    )
}

/// **Rewrites** a frame by drawing a frame of another file onto it. Transparent source pixels
/// are skipped.
#[derive(FromArgs)]
#[argh(subcommand, name = "blit")]
struct Blit {
    /// x position in the rewritten frame
    #[argh(option, default = "0")]
    x: i64,
    /// y position in the rewritten frame
    #[argh(option, default = "0")]
    y: i64,
    /// save the frame as PNG here before editing
    #[argh(option)]
    check_pre: Option<String>,
    /// save the frame as PNG here after editing
    #[argh(option)]
    check_post: Option<String>,

    /// the file to draw from
    #[argh(positional)]
    source: String,
    /// index of the frame to draw
    #[argh(positional)]
    source_frame: usize,
    /// the file to rewrite
    #[argh(positional)]
    victim: String,
    /// index of the frame to rewrite
    #[argh(positional)]
    frame: usize,
}

fn blit(options: Blit) -> CliResult {
    let Blit {
        x,
        y,
        check_pre,
        check_post,
        source,
        source_frame,
        victim,
        frame,
    } = options;

    let source_frames = read_frames(&source)?;
    let source_image = source_frames
        .get(source_frame)
        .ok_or_else(|| format!("`{source}` has no frame {source_frame}"))?;
    edit_frame(
        &victim,
        frame,
        check_pre.as_deref(),
        check_post.as_deref(),
        |image| {
            image.blit(source_image, x, y, true);
            Ok(())
        },
    )
}

/// Generates a 256x256 PNG holding every RGB565 value once, row-major.
#[derive(FromArgs)]
#[argh(subcommand, name = "gen-pal-ref")]
struct GenPalRef {
    /// the output file
    #[argh(positional)]
    output: String,
}

fn gen_pal_ref(options: GenPalRef) -> CliResult {
    let GenPalRef { output } = options;

    let palette = PixelBuffer::from_data(256, 256, (0..=u16::MAX).collect())?;
    save_opaque(&palette, Path::new(&output), Format::Png)?;
    println!("Written palette reference to `{output}`");

    Ok(())
}

/// Previews dithering an image to arbitrary channel depths.
#[derive(FromArgs)]
#[argh(subcommand, name = "dither")]
struct Dither {
    /// colour dithering mode
    #[argh(option, default = "DEFAULT_COLOUR_STRATEGY")]
    cdmode: Strategy,
    /// alpha dithering mode
    #[argh(option, default = "DEFAULT_ALPHA_STRATEGY")]
    admode: Strategy,
    /// red bits
    #[argh(option, default = "5")]
    rbits: u8,
    /// green bits
    #[argh(option, default = "6")]
    gbits: u8,
    /// blue bits
    #[argh(option, default = "5")]
    bbits: u8,
    /// alpha bits
    #[argh(option, default = "1")]
    abits: u8,
    /// the output PNG, named after the input and the settings if not given
    #[argh(option)]
    output: Option<String>,

    /// the input file, a PNG, JPG or BMP
    #[argh(positional)]
    input: String,
}

fn dither(options: Dither) -> CliResult {
    let Dither {
        cdmode,
        admode,
        rbits,
        gbits,
        bbits,
        abits,
        output,
        input,
    } = options;

    let bits = [rbits, gbits, bbits, abits];
    if let Some(&too_many) = bits.iter().find(|&&b| b > 8) {
        return Err(format!("can't dither to {too_many} bits, at most 8 are supported").into());
    }

    let output = output.unwrap_or_else(|| {
        format!("{input}.{cdmode}{rbits}{gbits}{bbits}.{admode}{abits}.png")
    });

    let image = load_rgba(Path::new(&input))?;
    let (width, height) = image.dimensions();
    println!("Dithering {width}x{height} image");

    let mut channels: [Vec<u8>; 4] = Default::default();
    for pixel in image.pixels() {
        for (channel, &sample) in channels.iter_mut().zip(&pixel.0) {
            channel.push(sample);
        }
    }

    let mut colour = ChannelDitherer::new(cdmode);
    let mut alpha = ChannelDitherer::new(admode).with_curve(Curve::Direct);
    for (index, (channel, &bits)) in channels.iter_mut().zip(&bits).enumerate() {
        let ditherer = if index == 3 { &mut alpha } else { &mut colour };
        ditherer.run(width, height, channel, bits);

        // expand back to 8 bits the way the engine does
        let table = &tables(bits).bitcopy;
        for sample in channel.iter_mut() {
            *sample = table[usize::from(*sample)];
        }
    }

    let [r, g, b, a] = &channels;
    let rgba = r
        .iter()
        .zip(g)
        .zip(b)
        .zip(a)
        .flat_map(|(((&r, &g), &b), &a)| [r, g, b, a])
        .collect::<Vec<_>>();
    RgbaImage::from_vec(width, height, rgba)
        .ok_or("failed to create image")?
        .save_with_format(&output, ImageFormat::Png)?;

    println!("Written {width}x{height} image to `{output}`");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cs16::consts::COL_BLACK;

    #[test]
    fn false_black_is_default() {
        // frames packed by the encode commands must never turn opaque black transparent
        let frame = SpritePacker::new(DEFAULT_COLOUR_STRATEGY, DEFAULT_ALPHA_STRATEGY)
            .pack_rgba(1, 1, &[0, 0, 0, 255])
            .unwrap();
        assert_eq!(frame.data(), &[COL_BLACK]);
    }

    #[test]
    fn formats() {
        assert!(matches!("PNG".parse::<Format>(), Ok(Format::Png)));
        assert!(matches!("bmp".parse::<Format>(), Ok(Format::Bmp)));
        assert!("gif".parse::<Format>().is_err());
    }
}
