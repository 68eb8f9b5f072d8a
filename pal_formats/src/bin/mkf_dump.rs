use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use pal_formats::{ArchiveFlavor, ChunkInfo, MkfArchive};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(about = "List the chunk table of an MKF archive", version)]
struct Args {
    /// MKF archive to inspect
    mkf: PathBuf,

    /// Release the archive comes from; selects the compressed-chunk header
    #[arg(long, value_enum, default_value_t = ArchiveFlavor::Dos)]
    flavor: ArchiveFlavor,

    /// Also read the decompressed size from each chunk header
    #[arg(long)]
    unpacked: bool,

    /// Emit JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct Report {
    path: PathBuf,
    flavor: ArchiveFlavor,
    chunks: Vec<ChunkReport>,
}

#[derive(Debug, Serialize)]
struct ChunkReport {
    #[serde(flatten)]
    info: ChunkInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    unpacked_size: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut archive = MkfArchive::open(&args.mkf, args.flavor)?;
    let table = archive
        .chunk_table()
        .with_context(|| format!("reading chunk table of {}", args.mkf.display()))?;

    let mut chunks = Vec::with_capacity(table.len());
    for info in table {
        let unpacked_size = if args.unpacked && info.size > 0 {
            match archive.decompressed_size(info.index) {
                Ok(size) => Some(size),
                Err(err) => {
                    log::debug!("chunk {} has no compressed header: {err}", info.index);
                    None
                }
            }
        } else {
            None
        };
        chunks.push(ChunkReport {
            info,
            unpacked_size,
        });
    }

    let report = Report {
        path: args.mkf,
        flavor: args.flavor,
        chunks,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!(
        "{} chunks in {}",
        report.chunks.len(),
        report.path.display()
    );
    for chunk in &report.chunks {
        let unpacked = chunk
            .unpacked_size
            .map(|size| size.to_string())
            .unwrap_or_else(|| String::from("-"));
        println!(
            "{index:>5} {offset:>#10x} {size:>10} {unpacked:>10}",
            index = chunk.info.index,
            offset = chunk.info.offset,
            size = chunk.info.size,
            unpacked = unpacked
        );
    }
    Ok(())
}
