//! Battle scene background pass: every byte of the 8-bit background is
//! copied into the scene buffer with its low nibble (brightness within a
//! palette row) moved by a signed amount.

use crate::ConvertError;
use crate::convert::Strategy;

const LANES: usize = 16;

/// Byte-at-a-time form. The sum wraps at 8 bits: a set top bit means the
/// shift went negative and clamps to 0, any of bits 4 to 6 clamps to 15.
#[inline]
pub fn shift_brightness(pixel: u8, shift: i8) -> u8 {
    let mut low = (pixel & 0x0F).wrapping_add(shift as u8);
    if low & 0x80 != 0 {
        low = 0;
    } else if low & 0x70 != 0 {
        low = 0x0F;
    }
    low | (pixel & 0xF0)
}

/// Signed saturating form used per lane.
#[inline]
fn shift_lane(pixel: u8, shift: i8) -> u8 {
    let low = ((pixel & 0x0F) as i8).wrapping_add(shift).clamp(0, 0x0F) as u8;
    low | (pixel & 0xF0)
}

#[inline]
fn shift_block(src: &[u8; LANES], dst: &mut [u8; LANES], shift: i8) {
    for (out, &pixel) in dst.iter_mut().zip(src) {
        *out = shift_lane(pixel, shift);
    }
}

/// Fills `scene` from the front of `background`. Both buffers cover
/// `pitch * height` bytes of their surfaces, padding included.
pub fn shift_background(
    background: &[u8],
    scene: &mut [u8],
    shift: i8,
    strategy: Strategy,
) -> Result<(), ConvertError> {
    if background.len() < scene.len() {
        return Err(ConvertError::ShortBackground {
            background: background.len(),
            scene: scene.len(),
        });
    }
    let background = &background[..scene.len()];

    match strategy {
        Strategy::Scalar => {
            for (out, &pixel) in scene.iter_mut().zip(background) {
                *out = shift_brightness(pixel, shift);
            }
        }
        Strategy::Lanes => {
            let whole = scene.len() / LANES * LANES;
            let (dst_blocks, dst_tail) = scene.split_at_mut(whole);
            let (src_blocks, src_tail) = background.split_at(whole);
            let dst_blocks: &mut [[u8; LANES]] = bytemuck::cast_slice_mut(dst_blocks);
            let src_blocks: &[[u8; LANES]] = bytemuck::cast_slice(src_blocks);
            for (out, block) in dst_blocks.iter_mut().zip(src_blocks) {
                shift_block(block, out, shift);
            }
            for (out, &pixel) in dst_tail.iter_mut().zip(src_tail) {
                *out = shift_lane(pixel, shift);
            }
        }
    }
    Ok(())
}
