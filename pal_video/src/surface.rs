use crate::ConvertError;
use crate::format::PixelFormat;

fn validate(
    len: usize,
    width: usize,
    height: usize,
    pitch: usize,
    format: &PixelFormat,
) -> Result<(), ConvertError> {
    let row_bytes = width * usize::from(format.bytes_per_pixel);
    if pitch < row_bytes {
        return Err(ConvertError::PitchTooSmall { row_bytes, pitch });
    }
    let required = match height {
        0 => 0,
        rows => pitch * (rows - 1) + row_bytes,
    };
    if len < required {
        return Err(ConvertError::BufferTooSmall {
            len,
            required,
        });
    }
    Ok(())
}

/// Read-only view of packed pixels in native byte order. The slice may start
/// at any address.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceRef<'a> {
    pixels: &'a [u8],
    width: usize,
    height: usize,
    pitch: usize,
    format: PixelFormat,
}

impl<'a> SurfaceRef<'a> {
    pub fn new(
        pixels: &'a [u8],
        width: usize,
        height: usize,
        pitch: usize,
        format: PixelFormat,
    ) -> Result<Self, ConvertError> {
        validate(pixels.len(), width, height, pitch, &format)?;
        Ok(SurfaceRef {
            pixels,
            width,
            height,
            pitch,
            format,
        })
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

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// First `pixels` pixels of row `y`.
    pub(crate) fn row_prefix(&self, y: usize, pixels: usize) -> &'a [u8] {
        let start = y * self.pitch;
        &self.pixels[start..start + pixels * usize::from(self.format.bytes_per_pixel)]
    }
}

/// Mutable counterpart of [`SurfaceRef`].
#[derive(Debug)]
pub struct SurfaceMut<'a> {
    pixels: &'a mut [u8],
    width: usize,
    height: usize,
    pitch: usize,
    format: PixelFormat,
}

impl<'a> SurfaceMut<'a> {
    pub fn new(
        pixels: &'a mut [u8],
        width: usize,
        height: usize,
        pitch: usize,
        format: PixelFormat,
    ) -> Result<Self, ConvertError> {
        validate(pixels.len(), width, height, pitch, &format)?;
        Ok(SurfaceMut {
            pixels,
            width,
            height,
            pitch,
            format,
        })
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

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn view(&self) -> SurfaceRef<'_> {
        SurfaceRef {
            pixels: &*self.pixels,
            width: self.width,
            height: self.height,
            pitch: self.pitch,
            format: self.format,
        }
    }

    pub(crate) fn row_prefix_mut(&mut self, y: usize, pixels: usize) -> &mut [u8] {
        let start = y * self.pitch;
        &mut self.pixels[start..start + pixels * usize::from(self.format.bytes_per_pixel)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_row_needs_only_its_pixels() {
        let buffer = vec![0u8; 2 * 12 + 8];
        let surface = SurfaceRef::new(&buffer, 4, 3, 12, PixelFormat::RGB555).unwrap();
        assert_eq!(surface.row_prefix(2, 4).len(), 8);

        assert_eq!(
            SurfaceRef::new(&buffer, 4, 4, 12, PixelFormat::RGB555).unwrap_err(),
            ConvertError::BufferTooSmall {
                len: 32,
                required: 44
            }
        );
    }

    #[test]
    fn pitch_must_cover_a_row() {
        let mut buffer = vec![0u8; 64];
        let err = SurfaceMut::new(&mut buffer, 4, 2, 12, PixelFormat::XRGB8888).unwrap_err();
        assert_eq!(
            err,
            ConvertError::PitchTooSmall {
                row_bytes: 16,
                pitch: 12
            }
        );
    }
}
