use thiserror::Error;

/// Destination of a blit, stored as two signed 16-bit halves the way the
/// engine packs it: `(y << 16) | x`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct PalPos {
    pub x: i16,
    pub y: i16,
}

impl PalPos {
    pub const fn new(x: i16, y: i16) -> Self {
        PalPos { x, y }
    }

    pub const fn from_packed(packed: u32) -> Self {
        PalPos {
            x: (packed & 0xFFFF) as u16 as i16,
            y: (packed >> 16) as u16 as i16,
        }
    }

    pub const fn packed(self) -> u32 {
        ((self.y as u16 as u32) << 16) | self.x as u16 as u32
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    #[error("pitch {pitch} is smaller than width {width}")]
    PitchTooSmall { width: usize, pitch: usize },
    #[error("{len} byte buffer cannot hold {width}x{height} pixels at pitch {pitch}")]
    BufferTooSmall {
        len: usize,
        width: usize,
        height: usize,
        pitch: usize,
    },
}

/// Borrowed 8-bit palette-indexed pixel buffer. Rows start `pitch` bytes
/// apart; bytes between `width` and `pitch` are never touched.
#[derive(Debug)]
pub struct IndexedSurface<'a> {
    pixels: &'a mut [u8],
    width: usize,
    height: usize,
    pitch: usize,
}

impl<'a> IndexedSurface<'a> {
    pub fn new(
        pixels: &'a mut [u8],
        width: usize,
        height: usize,
        pitch: usize,
    ) -> Result<Self, SurfaceError> {
        if pitch < width {
            return Err(SurfaceError::PitchTooSmall { width, pitch });
        }
        let required = match height {
            0 => 0,
            rows => pitch * (rows - 1) + width,
        };
        if pixels.len() < required {
            return Err(SurfaceError::BufferTooSmall {
                len: pixels.len(),
                width,
                height,
                pitch,
            });
        }
        Ok(IndexedSurface {
            pixels,
            width,
            height,
            pitch,
        })
    }

    /// Surface whose pitch equals its width.
    pub fn packed(pixels: &'a mut [u8], width: usize, height: usize) -> Result<Self, SurfaceError> {
        Self::new(pixels, width, height, width)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pitch(&self) -> usize {
        self.pitch
    }

    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.pitch;
        &self.pixels[start..start + self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [u8] {
        let start = y * self.pitch;
        &mut self.pixels[start..start + self.width]
    }

    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.row(y)[x]
    }

    pub fn fill(&mut self, value: u8) {
        for y in 0..self.height {
            self.row_mut(y).fill(value);
        }
    }
}
