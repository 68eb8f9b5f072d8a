// YJ_1 is the chunk compressor of the DOS release: a static Huffman tree for
// literals combined with LZSS back-references, split into blocks of at most
// 0x4000 output bytes. Bits are consumed MSB-first from little-endian words.

use log::warn;

use crate::codec::{CodecError, Decompressor};
use crate::mkf::YJ1_MAGIC;

const FILE_HEADER_LEN: usize = 16;
const BLOCK_HEADER_LEN: usize = 24;

#[derive(Debug, Clone, Copy, Default)]
pub struct Yj1Decompressor;

impl Decompressor for Yj1Decompressor {
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        decompress_yj1(src, dst)
    }
}

#[derive(Debug, Clone, Copy)]
struct Node {
    value: u8,
    leaf: bool,
}

struct BlockHeader {
    uncompressed_len: u16,
    compressed_len: u16,
    repeat_table: [u16; 4],
    offset_code_lengths: [u8; 4],
    repeat_code_lengths: [u8; 3],
    count_code_lengths: [u8; 3],
    count_table: [u8; 2],
}

impl BlockHeader {
    fn parse(bytes: &[u8]) -> Result<Self, CodecError> {
        let bytes = bytes
            .get(..BLOCK_HEADER_LEN)
            .ok_or(CodecError::Truncated("block header"))?;
        let word = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        Ok(BlockHeader {
            uncompressed_len: word(0),
            compressed_len: word(2),
            repeat_table: [word(4), word(6), word(8), word(10)],
            offset_code_lengths: [bytes[12], bytes[13], bytes[14], bytes[15]],
            repeat_code_lengths: [bytes[16], bytes[17], bytes[18]],
            count_code_lengths: [bytes[19], bytes[20], bytes[21]],
            count_table: [bytes[22], bytes[23]],
        })
    }
}

/// Bit cursor over a stream of little-endian 16-bit words. Reads past the end
/// of the data yield zero bits.
struct BitReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        BitReader { data, position: 0 }
    }

    fn word(&self, index: usize) -> u32 {
        let at = index * 2;
        let lo = self.data.get(at).copied().unwrap_or(0);
        let hi = self.data.get(at + 1).copied().unwrap_or(0);
        u32::from(u16::from_le_bytes([lo, hi]))
    }

    fn read(&mut self, count: u8) -> u32 {
        let count = u32::from(count.min(16));
        if count == 0 {
            return 0;
        }

        let word_index = self.position >> 4;
        let bit = (self.position & 0xF) as u32;
        self.position += count as usize;

        let first = self.word(word_index);
        if count > 16 - bit {
            let spill = count + bit - 16;
            let mask = 0xFFFF >> bit;
            ((first & mask) << spill) | (self.word(word_index + 1) >> (16 - spill))
        } else {
            ((first << bit) & 0xFFFF) >> (16 - count)
        }
    }

    fn bit(&mut self) -> bool {
        self.read(1) != 0
    }
}

struct Output<'a> {
    buffer: &'a mut [u8],
    written: usize,
}

impl Output<'_> {
    fn push(&mut self, value: u8) -> Result<(), CodecError> {
        let capacity = self.buffer.len();
        let slot = self
            .buffer
            .get_mut(self.written)
            .ok_or(CodecError::OutputTooSmall {
                needed: capacity + 1,
                capacity,
            })?;
        *slot = value;
        self.written += 1;
        Ok(())
    }

    fn copy_back(&mut self, distance: usize, count: usize) -> Result<(), CodecError> {
        if distance == 0 || distance > self.written {
            return Err(CodecError::BadBackReference {
                distance,
                written: self.written,
            });
        }
        for _ in 0..count {
            let value = self.buffer[self.written - distance];
            self.push(value)?;
        }
        Ok(())
    }
}

fn build_tree(src: &[u8], tree_len: usize) -> Result<(Vec<Node>, usize), CodecError> {
    let flag_words = tree_len.div_ceil(16);
    let tree_end = FILE_HEADER_LEN + tree_len;
    let values = src
        .get(FILE_HEADER_LEN..tree_end)
        .ok_or(CodecError::Truncated("huffman tree"))?;
    let flags = src
        .get(tree_end..tree_end + flag_words * 2)
        .ok_or(CodecError::Truncated("huffman leaf flags"))?;

    let mut bits = BitReader::new(flags);
    let mut nodes = Vec::with_capacity(tree_len + 1);
    nodes.push(Node {
        value: 0,
        leaf: false,
    });
    for &value in values {
        let leaf = !bits.bit();
        nodes.push(Node { value, leaf });
    }

    Ok((nodes, tree_end + flag_words * 2))
}

fn decode_symbol(nodes: &[Node], bits: &mut BitReader<'_>) -> Result<u8, CodecError> {
    let mut index = 0usize;
    // A well-formed tree reaches a leaf in fewer steps than it has nodes.
    for _ in 0..nodes.len() {
        let node = nodes.get(index).ok_or(CodecError::BadTree(index))?;
        if node.leaf {
            return Ok(node.value);
        }
        let left = usize::from(node.value) * 2 + 1;
        index = if bits.bit() { left + 1 } else { left };
    }
    Err(CodecError::BadTree(index))
}

fn read_loop(bits: &mut BitReader<'_>, header: &BlockHeader) -> u32 {
    if bits.bit() {
        return u32::from(header.count_table[0]);
    }
    match bits.read(2) {
        0 => u32::from(header.count_table[1]),
        selector => bits.read(header.count_code_lengths[selector as usize - 1]),
    }
}

fn read_count(bits: &mut BitReader<'_>, header: &BlockHeader) -> u32 {
    match bits.read(2) {
        0 => u32::from(header.repeat_table[0]),
        selector => {
            let selector = selector as usize;
            if bits.bit() {
                bits.read(header.repeat_code_lengths[selector - 1])
            } else {
                u32::from(header.repeat_table[selector])
            }
        }
    }
}

fn decode_block(
    nodes: &[Node],
    header: &BlockHeader,
    stream: &[u8],
    out: &mut Output<'_>,
) -> Result<(), CodecError> {
    let mut bits = BitReader::new(stream);
    loop {
        let literals = read_loop(&mut bits, header);
        if literals == 0 {
            break;
        }
        for _ in 0..literals {
            let value = decode_symbol(nodes, &mut bits)?;
            out.push(value)?;
        }

        let references = read_loop(&mut bits, header);
        if references == 0 {
            break;
        }
        for _ in 0..references {
            let count = read_count(&mut bits, header) as usize;
            let selector = bits.read(2) as usize;
            let distance = bits.read(header.offset_code_lengths[selector]) as usize;
            out.copy_back(distance, count)?;
        }
    }
    Ok(())
}

/// Expands a YJ_1 stream into `dst` and returns the declared uncompressed
/// length.
pub fn decompress_yj1(src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
    let header = src
        .get(..FILE_HEADER_LEN)
        .ok_or(CodecError::Truncated("file header"))?;
    let signature = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    if signature != YJ1_MAGIC {
        return Err(CodecError::BadSignature(signature));
    }
    let uncompressed_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]) as usize;
    let block_count = u16::from_le_bytes([header[12], header[13]]);
    let tree_len = usize::from(header[15]) * 2;

    if uncompressed_len > dst.len() {
        return Err(CodecError::OutputTooSmall {
            needed: uncompressed_len,
            capacity: dst.len(),
        });
    }

    let (nodes, mut position) = build_tree(src, tree_len)?;
    let mut out = Output {
        buffer: dst,
        written: 0,
    };

    for _ in 0..block_count {
        let prefix = src
            .get(position..position + 4)
            .ok_or(CodecError::Truncated("block header"))?;
        let stored_len = usize::from(u16::from_le_bytes([prefix[0], prefix[1]]));
        let compressed_len = usize::from(u16::from_le_bytes([prefix[2], prefix[3]]));

        if compressed_len == 0 {
            let start = position + 4;
            let stored = src
                .get(start..start + stored_len)
                .ok_or(CodecError::Truncated("stored block"))?;
            for &byte in stored {
                out.push(byte)?;
            }
            position = start + stored_len;
            continue;
        }

        let block = BlockHeader::parse(&src[position..])?;
        let stream = src.get(position + BLOCK_HEADER_LEN..).unwrap_or(&[]);
        let before = out.written;
        decode_block(&nodes, &block, stream, &mut out)?;
        if out.written - before != usize::from(block.uncompressed_len) {
            warn!(
                "YJ_1 block produced {} bytes, header declares {}",
                out.written - before,
                block.uncompressed_len
            );
        }
        position += usize::from(block.compressed_len);
    }

    Ok(uncompressed_len)
}
