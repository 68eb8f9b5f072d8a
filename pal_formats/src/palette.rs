use thiserror::Error;

const ENTRIES: usize = 256;
pub const PALETTE_BYTES: usize = ENTRIES * 3;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("palette chunk holds {0} bytes, expected at least {PALETTE_BYTES}")]
pub struct PaletteTooShort(pub usize);

/// 256 RGB colours decoded from a palette chunk of 6-bit VGA components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: [[u8; 3]; ENTRIES],
}

impl Palette {
    /// Chunks longer than one palette carry a night variant right after the
    /// day colours; `night` is ignored for chunks that do not.
    pub fn from_chunk(chunk: &[u8], night: bool) -> Result<Self, PaletteTooShort> {
        if chunk.len() < PALETTE_BYTES {
            return Err(PaletteTooShort(chunk.len()));
        }
        let base = if night && chunk.len() >= PALETTE_BYTES * 2 {
            PALETTE_BYTES
        } else {
            0
        };

        let mut colors = [[0u8; 3]; ENTRIES];
        for (color, rgb) in colors
            .iter_mut()
            .zip(chunk[base..base + PALETTE_BYTES].chunks_exact(3))
        {
            *color = [rgb[0] << 2, rgb[1] << 2, rgb[2] << 2];
        }
        Ok(Palette { colors })
    }

    pub fn color(&self, index: u8) -> [u8; 3] {
        self.colors[usize::from(index)]
    }

    pub fn colors(&self) -> &[[u8; 3]; ENTRIES] {
        &self.colors
    }

    /// Expands indexed pixels to RGBA; `transparent` pixels get alpha 0.
    pub fn to_rgba(&self, indices: &[u8], transparent: Option<u8>) -> Vec<u8> {
        let mut rgba = Vec::with_capacity(indices.len() * 4);
        for &index in indices {
            let [r, g, b] = self.color(index);
            let alpha = if Some(index) == transparent { 0 } else { 0xFF };
            rgba.extend_from_slice(&[r, g, b, alpha]);
        }
        rgba
    }
}

impl Default for Palette {
    /// Grey ramp, used when no palette chunk is available.
    fn default() -> Self {
        let mut colors = [[0u8; 3]; ENTRIES];
        for (index, color) in colors.iter_mut().enumerate() {
            *color = [index as u8; 3];
        }
        Palette { colors }
    }
}
