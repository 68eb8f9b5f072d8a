//! Pixel-format conversion for presenting the 15-bit screen.
//!
//! The engine renders into a 555 surface and hands it to a display that is
//! usually 565 or XRGB8888. Matching format pairs take a fast path with a
//! choice of channel widening; every other pair falls back to a mask-driven
//! conversion that behaves like an SDL 1.2 blit. The battle background pass
//! lives here as well because it shares the scalar/lanes split.

use thiserror::Error;

pub mod convert;
pub mod format;
pub mod scene;
pub mod surface;

pub use convert::{BlitPath, ExpandPolicy, Strategy, blit_surface, generic_blit};
pub use format::PixelFormat;
pub use scene::{shift_background, shift_brightness};
pub use surface::{SurfaceMut, SurfaceRef};

/// Errors raised while validating or converting surfaces.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("pitch {pitch} cannot hold a {row_bytes} byte row")]
    PitchTooSmall { row_bytes: usize, pitch: usize },
    #[error("buffer of {len} bytes is smaller than the {required} bytes the surface spans")]
    BufferTooSmall { len: usize, required: usize },
    #[error("{bytes_per_pixel} byte pixels cannot be converted")]
    UnsupportedFormat { bytes_per_pixel: u8 },
    #[error("background of {background} bytes cannot fill a {scene} byte scene")]
    ShortBackground { background: usize, scene: usize },
}

impl ConvertError {
    /// Integer status the engine API reports; every failure is -1.
    pub fn code(&self) -> i32 {
        -1
    }
}
