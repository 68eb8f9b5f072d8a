use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use image::{ColorType, ImageEncoder, codecs::png::PngEncoder};
use log::info;
use pal_formats::{
    ArchiveFlavor, FBP_HEIGHT, FBP_SIZE, FBP_WIDTH, IndexedSurface, MkfArchive, Palette,
    RleBitmap, Sprite, Yj1Decompressor, blit_fbp,
};

#[derive(Parser, Debug)]
#[command(about = "Render an RLE bitmap, sprite frame or FBP image from an MKF chunk to PNG", version)]
struct Args {
    /// MKF archive holding the image
    #[arg(long, value_name = "PATH")]
    mkf: PathBuf,

    /// Chunk index inside the archive
    #[arg(long, value_name = "N")]
    chunk: u32,

    /// Treat the chunk as a sprite and render one of its frames
    #[arg(long, conflicts_with = "fbp")]
    sprite: bool,

    /// Frame to render when --sprite is set
    #[arg(long, value_name = "N", default_value_t = 0, requires = "sprite")]
    frame: i32,

    /// Treat the chunk as a 320x200 full-screen bitmap
    #[arg(long)]
    fbp: bool,

    /// Palette archive (PAT.MKF); a grey ramp is used when omitted
    #[arg(long, value_name = "PAT.MKF")]
    palette: Option<PathBuf>,

    /// Palette chunk to use
    #[arg(long, value_name = "N", default_value_t = 0)]
    palette_index: u32,

    /// Use the night half of the palette when it has one
    #[arg(long)]
    night: bool,

    /// Expand the chunk with the YJ_1 codec before decoding
    #[arg(long)]
    decompress: bool,

    /// Output PNG path
    #[arg(long, value_name = "PNG")]
    out: PathBuf,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut archive = MkfArchive::open(&args.mkf, ArchiveFlavor::Dos)?;
    let chunk = if args.decompress {
        archive.decompress_chunk_to_vec(args.chunk, &Yj1Decompressor)
    } else {
        archive.read_chunk_to_vec(args.chunk)
    }
    .with_context(|| format!("reading chunk {} of {}", args.chunk, args.mkf.display()))?;

    let palette = load_palette(args.palette.as_deref(), args.palette_index, args.night)?;

    let (width, height, rgba) = if args.fbp {
        render_fbp(&chunk, &palette)?
    } else {
        let bytes = if args.sprite {
            let sprite = Sprite::new(&chunk);
            sprite.frame(args.frame).ok_or_else(|| {
                anyhow!(
                    "sprite has no frame {} ({} drawable)",
                    args.frame,
                    sprite.frame_count()
                )
            })?
        } else {
            &chunk[..]
        };
        render_rle(bytes, &palette)?
    };

    write_png(&args.out, width, height, &rgba)?;
    info!("wrote {width}x{height} image to {}", args.out.display());
    Ok(())
}

fn load_palette(path: Option<&Path>, index: u32, night: bool) -> Result<Palette> {
    let Some(path) = path else {
        return Ok(Palette::default());
    };
    let mut archive = MkfArchive::open(path, ArchiveFlavor::Dos)?;
    let chunk = archive
        .read_chunk_to_vec(index)
        .with_context(|| format!("reading palette {index} from {}", path.display()))?;
    Ok(Palette::from_chunk(&chunk, night)?)
}

fn render_rle(bytes: &[u8], palette: &Palette) -> Result<(u32, u32, Vec<u8>)> {
    let bitmap = RleBitmap::parse(bytes)?;
    if bitmap.pixel_count() == 0 {
        bail!("bitmap is empty");
    }
    let pixels = bitmap.decode(0);
    let mask = bitmap.coverage();

    let mut rgba = Vec::with_capacity(pixels.len() * 4);
    for (&index, &drawn) in pixels.iter().zip(&mask) {
        let [r, g, b] = palette.color(index);
        rgba.extend_from_slice(&[r, g, b, if drawn { 0xFF } else { 0 }]);
    }
    Ok((u32::from(bitmap.width()), u32::from(bitmap.height()), rgba))
}

fn render_fbp(bytes: &[u8], palette: &Palette) -> Result<(u32, u32, Vec<u8>)> {
    let mut pixels = vec![0u8; FBP_SIZE];
    let mut surface = IndexedSurface::packed(&mut pixels, FBP_WIDTH, FBP_HEIGHT)?;
    blit_fbp(bytes, &mut surface)?;
    Ok((
        FBP_WIDTH as u32,
        FBP_HEIGHT as u32,
        palette.to_rgba(&pixels, None),
    ))
}

fn write_png(path: &Path, width: u32, height: u32, data: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let encoder = PngEncoder::new(file);
    encoder
        .write_image(data, width, height, ColorType::Rgba8.into())
        .with_context(|| format!("writing PNG to {}", path.display()))?;
    Ok(())
}
