use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{info, warn};
use pal_formats::{ArchiveFlavor, MkfArchive, MkfFile, Yj1Decompressor};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(about = "Extract chunks from MKF archives", version)]
struct Args {
    /// MKF archive to extract (may be passed multiple times)
    #[arg(long = "mkf", value_name = "PATH", conflicts_with = "root")]
    mkfs: Vec<PathBuf>,

    /// Directory containing MKF archives (recursively scanned when --mkf is not used)
    #[arg(long = "root", value_name = "DIR", conflicts_with = "mkfs")]
    root: Option<PathBuf>,

    /// Destination directory; each archive gets its own subdirectory
    #[arg(long, value_name = "DIR", default_value = "extracted")]
    dest: PathBuf,

    /// Release the archives come from
    #[arg(long, value_enum, default_value_t = ArchiveFlavor::Dos)]
    flavor: ArchiveFlavor,

    /// Expand YJ_1 compressed chunks before writing them
    #[arg(long)]
    decompress: bool,

    /// Chunk indices to extract (may repeat); all chunks when omitted
    #[arg(long = "chunk", value_name = "N")]
    chunks: Vec<u32>,

    /// Overwrite existing files instead of skipping them
    #[arg(long)]
    overwrite: bool,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    if args.decompress && args.flavor == ArchiveFlavor::Win95 {
        bail!("--decompress only understands YJ_1 chunks from the DOS release");
    }

    let mkfs = resolve_mkf_paths(&args);
    if mkfs.is_empty() {
        bail!("no MKF archives to extract");
    }

    let filter: Option<HashSet<u32>> = if args.chunks.is_empty() {
        None
    } else {
        Some(args.chunks.iter().copied().collect())
    };

    fs::create_dir_all(&args.dest)
        .with_context(|| format!("creating destination {}", args.dest.display()))?;

    for mkf_path in mkfs {
        let mut archive = MkfArchive::open(&mkf_path, args.flavor)
            .with_context(|| format!("opening MKF archive {}", mkf_path.display()))?;
        extract_archive(&mut archive, &mkf_path, &args, filter.as_ref())?;
    }

    Ok(())
}

fn resolve_mkf_paths(args: &Args) -> Vec<PathBuf> {
    let mut mkfs = Vec::new();

    if !args.mkfs.is_empty() {
        mkfs.extend(args.mkfs.iter().cloned());
    } else if let Some(root) = args.root.as_ref() {
        for entry in WalkDir::new(root).into_iter().filter_map(|res| res.ok()) {
            let is_mkf = entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("mkf"));
            if entry.file_type().is_file() && is_mkf {
                mkfs.push(entry.into_path());
            }
        }
    }

    mkfs.sort();
    mkfs.dedup();
    mkfs
}

fn extract_archive(
    archive: &mut MkfFile,
    mkf_path: &Path,
    args: &Args,
    filter: Option<&HashSet<u32>>,
) -> Result<()> {
    let stem = mkf_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("mkf")
        .to_ascii_uppercase();
    let dest = args.dest.join(stem);
    fs::create_dir_all(&dest).with_context(|| format!("creating {}", dest.display()))?;

    let count = archive.chunk_count();
    if let Some(filter) = filter {
        for index in filter.iter().filter(|&&index| index >= count) {
            warn!("{} has no chunk {index}", mkf_path.display());
        }
    }

    let mut extracted = 0usize;
    for index in 0..count {
        if filter.is_some_and(|filter| !filter.contains(&index)) {
            continue;
        }

        let dest_path = dest.join(format!("{index:04}.bin"));
        if dest_path.exists() && !args.overwrite {
            continue;
        }

        let bytes = if args.decompress {
            archive.decompress_chunk_to_vec(index, &Yj1Decompressor)
        } else {
            archive.read_chunk_to_vec(index)
        }
        .with_context(|| format!("reading chunk {index} of {}", mkf_path.display()))?;

        fs::write(&dest_path, &bytes)
            .with_context(|| format!("writing {}", dest_path.display()))?;
        extracted += 1;
    }

    info!("{} holds {count} chunks", mkf_path.display());
    println!(
        "Extracted {} chunks from {} into {}",
        extracted,
        mkf_path.display(),
        dest.display()
    );
    Ok(())
}
