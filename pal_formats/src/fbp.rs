use crate::rle::BlitError;
use crate::surface::IndexedSurface;

pub const FBP_WIDTH: usize = 320;
pub const FBP_HEIGHT: usize = 200;
pub const FBP_SIZE: usize = FBP_WIDTH * FBP_HEIGHT;

/// Copies an uncompressed full-screen bitmap onto a 320x200 surface.
pub fn blit_fbp(bitmap: &[u8], surface: &mut IndexedSurface<'_>) -> Result<(), BlitError> {
    if surface.width() != FBP_WIDTH || surface.height() != FBP_HEIGHT {
        return Err(BlitError::SizeMismatch {
            width: surface.width(),
            height: surface.height(),
            expected_width: FBP_WIDTH,
            expected_height: FBP_HEIGHT,
        });
    }
    if bitmap.len() < FBP_SIZE {
        return Err(BlitError::InvalidBitmap { len: bitmap.len() });
    }

    for (y, row) in bitmap.chunks_exact(FBP_WIDTH).take(FBP_HEIGHT).enumerate() {
        surface.row_mut(y).copy_from_slice(row);
    }
    Ok(())
}
