use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use pal_formats::{ArchiveFlavor, MkfArchive, Sprite, Yj1Decompressor, rle_height, rle_width};

#[derive(Parser)]
struct Args {
    /// MKF archive holding sprites (e.g. MGO.MKF or F.MKF).
    input: PathBuf,
    /// Chunk to inspect.
    chunk: u32,
    /// Chunk is YJ_1 compressed.
    #[arg(long)]
    compressed: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut archive = MkfArchive::open(&args.input, ArchiveFlavor::Dos)?;
    let data = if args.compressed {
        archive.decompress_chunk_to_vec(args.chunk, &Yj1Decompressor)?
    } else {
        archive.read_chunk_to_vec(args.chunk)?
    };

    let sprite = Sprite::new(&data);
    println!(
        "Sprite {}#{}: {} bytes, {} frames ({} table entries)",
        args.input.display(),
        args.chunk,
        data.len(),
        sprite.frame_count(),
        sprite.indexable_frame_count()
    );
    for (index, frame) in sprite.frames().enumerate() {
        println!(
            "  frame {index:>3}: {}x{}",
            rle_width(frame),
            rle_height(frame)
        );
    }
    Ok(())
}
