use thiserror::Error;

/// Byte-stream decompression used for compressed MKF chunks.
///
/// Implementations write into the front of `dst` and return the number of
/// bytes produced. Plain functions and closures with the same signature can be
/// passed wherever a `Decompressor` is expected.
pub trait Decompressor {
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError>;
}

impl<F> Decompressor for F
where
    F: Fn(&[u8], &mut [u8]) -> Result<usize, CodecError>,
{
    fn decompress(&self, src: &[u8], dst: &mut [u8]) -> Result<usize, CodecError> {
        self(src, dst)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("compressed stream truncated in {0}")]
    Truncated(&'static str),
    #[error("unexpected signature {0:#010x}")]
    BadSignature(u32),
    #[error("output needs {needed} bytes but the buffer holds {capacity}")]
    OutputTooSmall { needed: usize, capacity: usize },
    #[error("back-reference distance {distance} with only {written} bytes decoded")]
    BadBackReference { distance: usize, written: usize },
    #[error("huffman tree walk reached invalid node {0}")]
    BadTree(usize),
}
