use std::fs::File;
use std::io::{self, BufReader, Cursor, ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use memmap2::{Mmap, MmapOptions};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{CodecError, Decompressor};

/// "YJ_1" read as a little-endian word.
pub const YJ1_MAGIC: u32 = 0x315f_4a59;

/// Which release an archive came from. The Win95 release stores a bare
/// length word at the start of compressed chunks instead of a YJ_1 header.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveFlavor {
    #[default]
    Dos,
    Win95,
}

#[derive(Debug, Error)]
pub enum MkfError {
    #[error("opening MKF archive at {}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("destination buffer has zero capacity")]
    InvalidArgument,
    #[error("chunk {index} out of range (archive holds {count} chunks)")]
    IndexOutOfRange { index: u32, count: u32 },
    #[error("chunk {index} offsets decrease ({offset:#x} > {next:#x})")]
    CorruptOffsets { index: u32, offset: u32, next: u32 },
    #[error("chunk {index} needs {needed} bytes but the buffer holds {capacity}")]
    BufferTooSmall {
        index: u32,
        needed: usize,
        capacity: usize,
    },
    #[error("chunk {index} is empty")]
    EmptyChunk { index: u32 },
    #[error("chunk {index} header magic {found:#010x} is not YJ_1")]
    BadMagic { index: u32, found: u32 },
    #[error("cannot allocate {size} byte scratch buffer for chunk {index}")]
    OutOfMemory { index: u32, size: usize },
    #[error("decompressing chunk {index}")]
    Codec {
        index: u32,
        #[source]
        source: CodecError,
    },
}

impl MkfError {
    /// Integer status the engine API reports for this failure.
    pub fn code(&self) -> i32 {
        match self {
            MkfError::BufferTooSmall { .. } => -2,
            MkfError::OutOfMemory { .. } => -3,
            _ => -1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkInfo {
    pub index: u32,
    pub offset: u32,
    pub size: u32,
}

/// Reader for MKF archives: a table of little-endian chunk offsets followed
/// by the chunk payloads. Every call seeks the underlying reader.
#[derive(Debug)]
pub struct MkfArchive<R> {
    reader: R,
    flavor: ArchiveFlavor,
}

pub type MkfFile = MkfArchive<BufReader<File>>;

impl MkfArchive<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P, flavor: ArchiveFlavor) -> Result<Self, MkfError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| MkfError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(MkfArchive::new(BufReader::new(file), flavor))
    }
}

pub type MappedMkf = MkfArchive<Cursor<Mmap>>;

impl MkfArchive<Cursor<Mmap>> {
    /// Maps the whole archive into memory instead of reading through a file
    /// handle.
    pub fn open_mapped<P: AsRef<Path>>(path: P, flavor: ArchiveFlavor) -> Result<Self, MkfError> {
        let path = path.as_ref();
        let open_error = |source| MkfError::Open {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(open_error)?;
        let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(open_error)?;
        Ok(MkfArchive::new(Cursor::new(mmap), flavor))
    }
}

impl<R: Read + Seek> MkfArchive<R> {
    pub fn new(reader: R, flavor: ArchiveFlavor) -> Self {
        MkfArchive { reader, flavor }
    }

    pub fn flavor(&self) -> ArchiveFlavor {
        self.flavor
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn read_u32_at(&mut self, position: u64) -> io::Result<u32> {
        self.reader.seek(SeekFrom::Start(position))?;
        self.reader.read_u32::<LittleEndian>()
    }

    /// Number of chunks, derived from the first offset in the table.
    /// Returns 0 when the table cannot be read.
    pub fn chunk_count(&mut self) -> u32 {
        match self.read_u32_at(0) {
            Ok(first) => first.saturating_sub(4) >> 2,
            Err(err) => {
                debug!("MKF chunk table unreadable: {err}");
                0
            }
        }
    }

    fn check_index(&mut self, index: u32) -> Result<(), MkfError> {
        let count = self.chunk_count();
        if index >= count {
            return Err(MkfError::IndexOutOfRange { index, count });
        }
        Ok(())
    }

    fn chunk_bounds(&mut self, index: u32) -> Result<(u32, u32), MkfError> {
        self.check_index(index)?;
        let offset = self.read_u32_at(4 * u64::from(index))?;
        let next = self.reader.read_u32::<LittleEndian>()?;
        if next < offset {
            return Err(MkfError::CorruptOffsets {
                index,
                offset,
                next,
            });
        }
        Ok((offset, next))
    }

    pub fn chunk_size(&mut self, index: u32) -> Result<u32, MkfError> {
        let (offset, next) = self.chunk_bounds(index)?;
        Ok(next - offset)
    }

    /// Reads chunk `index` into the front of `buffer` and returns the number
    /// of bytes read. Nothing is written when the buffer is too small.
    pub fn read_chunk(&mut self, index: u32, buffer: &mut [u8]) -> Result<usize, MkfError> {
        if buffer.is_empty() {
            return Err(MkfError::InvalidArgument);
        }

        let (offset, next) = self.chunk_bounds(index)?;
        let len = (next - offset) as usize;

        if len > buffer.len() {
            return Err(MkfError::BufferTooSmall {
                index,
                needed: len,
                capacity: buffer.len(),
            });
        }
        if len == 0 {
            return Err(MkfError::EmptyChunk { index });
        }

        self.reader.seek(SeekFrom::Start(u64::from(offset)))?;
        let read = read_up_to(&mut self.reader, &mut buffer[..len])?;
        if read < len {
            warn!("chunk {index} truncated: read {read} of {len} bytes");
        }
        debug!("read chunk {index} ({read} bytes at {offset:#x})");
        Ok(read)
    }

    pub fn read_chunk_to_vec(&mut self, index: u32) -> Result<Vec<u8>, MkfError> {
        let size = self.chunk_size(index)? as usize;
        if size == 0 {
            return Ok(Vec::new());
        }
        let mut buffer = vec![0u8; size];
        let read = self.read_chunk(index, &mut buffer)?;
        buffer.truncate(read);
        Ok(buffer)
    }

    /// Size a compressed chunk expands to, taken from its header.
    pub fn decompressed_size(&mut self, index: u32) -> Result<u32, MkfError> {
        self.check_index(index)?;
        let offset = self.read_u32_at(4 * u64::from(index))?;
        self.reader.seek(SeekFrom::Start(u64::from(offset)))?;

        match self.flavor {
            ArchiveFlavor::Win95 => Ok(self.reader.read_u32::<LittleEndian>()?),
            ArchiveFlavor::Dos => {
                let magic = self.reader.read_u32::<LittleEndian>()?;
                let length = self.reader.read_u32::<LittleEndian>()?;
                if magic != YJ1_MAGIC {
                    return Err(MkfError::BadMagic {
                        index,
                        found: magic,
                    });
                }
                Ok(length)
            }
        }
    }

    /// Reads the raw bytes of chunk `index` and runs them through `codec`
    /// into `out`. An empty chunk decompresses to nothing.
    pub fn decompress_chunk<D: Decompressor + ?Sized>(
        &mut self,
        index: u32,
        out: &mut [u8],
        codec: &D,
    ) -> Result<usize, MkfError> {
        let len = self.chunk_size(index)? as usize;
        if len == 0 {
            return Ok(0);
        }

        let mut scratch = Vec::new();
        scratch
            .try_reserve_exact(len)
            .map_err(|_| MkfError::OutOfMemory { index, size: len })?;
        scratch.resize(len, 0);

        let read = self.read_chunk(index, &mut scratch)?;
        scratch.truncate(read);

        let written = codec
            .decompress(&scratch, out)
            .map_err(|source| MkfError::Codec { index, source })?;
        debug!("decompressed chunk {index}: {read} -> {written} bytes");
        Ok(written)
    }

    pub fn decompress_chunk_to_vec<D: Decompressor + ?Sized>(
        &mut self,
        index: u32,
        codec: &D,
    ) -> Result<Vec<u8>, MkfError> {
        if self.chunk_size(index)? == 0 {
            return Ok(Vec::new());
        }
        let size = self.decompressed_size(index)? as usize;
        let mut out = Vec::new();
        out.try_reserve_exact(size)
            .map_err(|_| MkfError::OutOfMemory { index, size })?;
        out.resize(size, 0);
        let written = self.decompress_chunk(index, &mut out, codec)?;
        out.truncate(written);
        Ok(out)
    }

    pub fn chunk_table(&mut self) -> Result<Vec<ChunkInfo>, MkfError> {
        let count = self.chunk_count();
        let mut offsets = Vec::with_capacity(count as usize + 1);
        self.reader.seek(SeekFrom::Start(0))?;
        for _ in 0..=count {
            offsets.push(self.reader.read_u32::<LittleEndian>()?);
        }

        offsets
            .windows(2)
            .zip(0u32..)
            .map(|(pair, index)| {
                let (offset, next) = (pair[0], pair[1]);
                let size = next
                    .checked_sub(offset)
                    .ok_or(MkfError::CorruptOffsets {
                        index,
                        offset,
                        next,
                    })?;
                Ok(ChunkInfo {
                    index,
                    offset,
                    size,
                })
            })
            .collect()
    }
}

fn read_up_to<R: Read>(reader: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buffer.len() {
        match reader.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}
