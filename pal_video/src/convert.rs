use bytemuck::{try_cast_slice, try_cast_slice_mut};
use log::{debug, warn};

use crate::ConvertError;
use crate::format::{Channel, PixelFormat};
use crate::surface::{SurfaceMut, SurfaceRef};

/// How 5-bit channels are widened on the fast paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExpandPolicy {
    /// Shift into place and leave the low bits zero, matching SDL 1.2 blits.
    #[default]
    Replicate,
    /// Fill the low bits from the top of the channel so full intensity maps
    /// to full intensity.
    Expand,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// One pixel at a time.
    Scalar,
    /// Fixed-width groups of pixels the compiler can vectorise.
    #[default]
    Lanes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitPath {
    FastPath,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FastPath {
    Rgb555ToRgb565,
    Rgb555ToXrgb8888,
}

fn select_fast_path(src: &PixelFormat, dst: &PixelFormat) -> Option<FastPath> {
    if !src.is_555() || src.bytes_per_pixel != 2 || src.a_mask != 0 || dst.a_mask != 0 {
        return None;
    }
    if src.bits_per_pixel == 16
        && dst.bits_per_pixel == 16
        && dst.bytes_per_pixel == 2
        && dst.has_masks(0xF800, 0x07E0, 0x001F)
    {
        return Some(FastPath::Rgb555ToRgb565);
    }
    if matches!(src.bits_per_pixel, 15 | 16)
        && dst.bits_per_pixel == 32
        && dst.bytes_per_pixel == 4
        && dst.has_masks(0x00FF_0000, 0x0000_FF00, 0x0000_00FF)
    {
        return Some(FastPath::Rgb555ToXrgb8888);
    }
    None
}

#[inline]
pub fn rgb555_to_rgb565(pixel: u16, policy: ExpandPolicy) -> u16 {
    let out = (pixel & 0x001F) | ((pixel & 0x7FE0) << 1);
    match policy {
        ExpandPolicy::Replicate => out,
        ExpandPolicy::Expand => out | ((pixel & 0x0200) >> 4),
    }
}

/// Two 555 pixels packed in one word, converted together.
#[inline]
fn rgb555_pair_to_rgb565(pair: u32, policy: ExpandPolicy) -> u32 {
    let out = (pair & 0x001F_001F) | ((pair & 0x7FE0_7FE0) << 1);
    match policy {
        ExpandPolicy::Replicate => out,
        ExpandPolicy::Expand => out | ((pair & 0x0200_0200) >> 4),
    }
}

#[inline]
pub fn rgb555_to_xrgb8888(pixel: u16, policy: ExpandPolicy) -> u32 {
    let pixel = u32::from(pixel);
    let out = ((pixel & 0x001F) << 3) | ((pixel & 0x03E0) << 6) | ((pixel & 0x7C00) << 9);
    match policy {
        ExpandPolicy::Replicate => out,
        ExpandPolicy::Expand => {
            out | ((pixel & 0x001F) >> 2) | ((pixel & 0x0380) << 1) | ((pixel & 0x7000) << 4)
        }
    }
}

fn row_to_565_scalar(src: &[u8], dst: &mut [u8], policy: ExpandPolicy) {
    for (out, pixel) in dst.chunks_exact_mut(2).zip(src.chunks_exact(2)) {
        let value = rgb555_to_rgb565(u16::from_ne_bytes([pixel[0], pixel[1]]), policy);
        out.copy_from_slice(&value.to_ne_bytes());
    }
}

fn pairs_aligned(src: &[u8], dst: &mut [u8], policy: ExpandPolicy) -> bool {
    let (Ok(src), Ok(dst)) = (try_cast_slice::<u8, u32>(src), try_cast_slice_mut::<u8, u32>(dst))
    else {
        return false;
    };
    for (out, &pair) in dst.iter_mut().zip(src) {
        *out = rgb555_pair_to_rgb565(pair, policy);
    }
    true
}

fn row_to_565_lanes(src: &[u8], dst: &mut [u8], policy: ExpandPolicy) {
    let paired = src.len() / 4 * 4;
    let (src_pairs, src_tail) = src.split_at(paired);
    let (dst_pairs, dst_tail) = dst.split_at_mut(paired);

    if !pairs_aligned(src_pairs, dst_pairs, policy) {
        for (out, pair) in dst_pairs.chunks_exact_mut(4).zip(src_pairs.chunks_exact(4)) {
            let word = u32::from_ne_bytes([pair[0], pair[1], pair[2], pair[3]]);
            out.copy_from_slice(&rgb555_pair_to_rgb565(word, policy).to_ne_bytes());
        }
    }
    row_to_565_scalar(src_tail, dst_tail, policy);
}

fn row_to_8888_scalar(src: &[u8], dst: &mut [u8], policy: ExpandPolicy) {
    for (out, pixel) in dst.chunks_exact_mut(4).zip(src.chunks_exact(2)) {
        let value = rgb555_to_xrgb8888(u16::from_ne_bytes([pixel[0], pixel[1]]), policy);
        out.copy_from_slice(&value.to_ne_bytes());
    }
}

const BLOCK: usize = 8;

#[inline]
fn convert_block(src: &[u16; BLOCK], dst: &mut [u32; BLOCK], policy: ExpandPolicy) {
    for (out, &pixel) in dst.iter_mut().zip(src) {
        *out = rgb555_to_xrgb8888(pixel, policy);
    }
}

fn blocks_aligned(src: &[u8], dst: &mut [u8], policy: ExpandPolicy) -> bool {
    let (Ok(src), Ok(dst)) = (
        try_cast_slice::<u8, [u16; BLOCK]>(src),
        try_cast_slice_mut::<u8, [u32; BLOCK]>(dst),
    ) else {
        return false;
    };
    for (out, block) in dst.iter_mut().zip(src) {
        convert_block(block, out, policy);
    }
    true
}

fn row_to_8888_lanes(src: &[u8], dst: &mut [u8], policy: ExpandPolicy) {
    let blocks = src.len() / (BLOCK * 2);
    let (src_blocks, src_tail) = src.split_at(blocks * BLOCK * 2);
    let (dst_blocks, dst_tail) = dst.split_at_mut(blocks * BLOCK * 4);

    if !blocks_aligned(src_blocks, dst_blocks, policy) {
        for (out, bytes) in dst_blocks
            .chunks_exact_mut(BLOCK * 4)
            .zip(src_blocks.chunks_exact(BLOCK * 2))
        {
            let mut pixels = [0u16; BLOCK];
            for (pixel, raw) in pixels.iter_mut().zip(bytes.chunks_exact(2)) {
                *pixel = u16::from_ne_bytes([raw[0], raw[1]]);
            }
            let mut converted = [0u32; BLOCK];
            convert_block(&pixels, &mut converted, policy);
            for (value, raw) in converted.iter().zip(out.chunks_exact_mut(4)) {
                raw.copy_from_slice(&value.to_ne_bytes());
            }
        }
    }
    row_to_8888_scalar(src_tail, dst_tail, policy);
}

/// Converts the overlapping top-left area of `src` into `dst`. Matching
/// 555 to 565 or 555 to XRGB8888 formats take a fast path; everything else
/// goes through [`generic_blit`].
pub fn blit_surface(
    src: &SurfaceRef<'_>,
    dst: &mut SurfaceMut<'_>,
    policy: ExpandPolicy,
    strategy: Strategy,
) -> Result<BlitPath, ConvertError> {
    let Some(path) = select_fast_path(&src.format(), &dst.format()) else {
        if policy == ExpandPolicy::Expand {
            warn!(
                "no fast path from {:?} to {:?}; generic conversion leaves low bits zero",
                src.format(),
                dst.format()
            );
        }
        generic_blit(src, dst)?;
        return Ok(BlitPath::Generic);
    };

    let width = src.width().min(dst.width());
    let height = src.height().min(dst.height());
    for y in 0..height {
        let from = src.row_prefix(y, width);
        let to = dst.row_prefix_mut(y, width);
        match (path, strategy) {
            (FastPath::Rgb555ToRgb565, Strategy::Scalar) => row_to_565_scalar(from, to, policy),
            (FastPath::Rgb555ToRgb565, Strategy::Lanes) => row_to_565_lanes(from, to, policy),
            (FastPath::Rgb555ToXrgb8888, Strategy::Scalar) => row_to_8888_scalar(from, to, policy),
            (FastPath::Rgb555ToXrgb8888, Strategy::Lanes) => row_to_8888_lanes(from, to, policy),
        }
    }
    debug!("{path:?} blit of {width}x{height} ({strategy:?}, {policy:?})");
    Ok(BlitPath::FastPath)
}

fn read_pixel(bytes: &[u8]) -> u32 {
    match *bytes {
        [a, b] => u32::from(u16::from_ne_bytes([a, b])),
        [a, b, c] if cfg!(target_endian = "little") => u32::from_le_bytes([a, b, c, 0]),
        [a, b, c] => u32::from_be_bytes([0, a, b, c]),
        [a, b, c, d] => u32::from_ne_bytes([a, b, c, d]),
        _ => 0,
    }
}

fn write_pixel(bytes: &mut [u8], value: u32) {
    match bytes.len() {
        2 => bytes.copy_from_slice(&(value as u16).to_ne_bytes()),
        3 if cfg!(target_endian = "little") => bytes.copy_from_slice(&value.to_le_bytes()[..3]),
        3 => bytes.copy_from_slice(&value.to_be_bytes()[1..]),
        4 => bytes.copy_from_slice(&value.to_ne_bytes()),
        _ => {}
    }
}

/// Mask-driven per-pixel conversion between any 2, 3 or 4 byte formats.
/// Channels go through an 8-bit intermediate with zero low bits; a
/// destination alpha channel is opaque unless the source carries alpha.
pub fn generic_blit(src: &SurfaceRef<'_>, dst: &mut SurfaceMut<'_>) -> Result<(), ConvertError> {
    let (src_format, dst_format) = (src.format(), dst.format());
    for format in [&src_format, &dst_format] {
        if !(2..=4).contains(&format.bytes_per_pixel) {
            return Err(ConvertError::UnsupportedFormat {
                bytes_per_pixel: format.bytes_per_pixel,
            });
        }
    }

    let src_channels = src_format.channels();
    let dst_channels = dst_format.channels();
    let src_alpha = Channel::from_mask(src_format.a_mask);
    let dst_alpha = Channel::from_mask(dst_format.a_mask);
    let src_bytes = usize::from(src_format.bytes_per_pixel);
    let dst_bytes = usize::from(dst_format.bytes_per_pixel);

    let width = src.width().min(dst.width());
    let height = src.height().min(dst.height());
    for y in 0..height {
        let from = src.row_prefix(y, width);
        let to = dst.row_prefix_mut(y, width);
        for (out, pixel) in to.chunks_exact_mut(dst_bytes).zip(from.chunks_exact(src_bytes)) {
            let value = read_pixel(pixel);
            let mut converted = src_channels
                .iter()
                .zip(&dst_channels)
                .fold(0, |acc, (s, d)| acc | d.pack(s.unpack(value)));
            if dst_format.a_mask != 0 {
                let alpha = if src_format.a_mask != 0 {
                    src_alpha.unpack(value)
                } else {
                    0xFF
                };
                converted |= dst_alpha.pack(alpha);
            }
            write_pixel(out, converted);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_bytes<T: Copy>(pixels: &[T], to_bytes: fn(T) -> Vec<u8>) -> Vec<u8> {
        pixels.iter().flat_map(|&p| to_bytes(p)).collect()
    }

    #[test]
    fn white_and_black_follow_the_policy() {
        assert_eq!(rgb555_to_rgb565(0x7FFF, ExpandPolicy::Replicate), 0xFFDF);
        assert_eq!(rgb555_to_rgb565(0x7FFF, ExpandPolicy::Expand), 0xFFFF);
        assert_eq!(rgb555_to_xrgb8888(0x7FFF, ExpandPolicy::Replicate), 0x00F8_F8F8);
        assert_eq!(rgb555_to_xrgb8888(0x7FFF, ExpandPolicy::Expand), 0x00FF_FFFF);
        for policy in [ExpandPolicy::Replicate, ExpandPolicy::Expand] {
            assert_eq!(rgb555_to_rgb565(0, policy), 0);
            assert_eq!(rgb555_to_xrgb8888(0, policy), 0);
        }
    }

    #[test]
    fn pair_conversion_matches_single_pixels() {
        let (a, b) = (0x1234u16, 0x7E0Fu16);
        let pair = u32::from(a) | (u32::from(b) << 16);
        for policy in [ExpandPolicy::Replicate, ExpandPolicy::Expand] {
            let out = rgb555_pair_to_rgb565(pair, policy);
            assert_eq!(out as u16, rgb555_to_rgb565(a, policy));
            assert_eq!((out >> 16) as u16, rgb555_to_rgb565(b, policy));
        }
    }

    #[test]
    fn unused_top_bit_is_ignored() {
        assert_eq!(
            rgb555_to_rgb565(0x8000 | 0x1234, ExpandPolicy::Expand),
            rgb555_to_rgb565(0x1234, ExpandPolicy::Expand)
        );
    }

    #[test]
    fn copy_area_is_the_overlap() {
        let src_pixels: Vec<u16> = (0..6).map(|i| 0x7FFF - i).collect();
        let src_bytes = surface_bytes(&src_pixels, |p: u16| p.to_ne_bytes().to_vec());
        let src = SurfaceRef::new(&src_bytes, 3, 2, 6, PixelFormat::RGB555).unwrap();

        let mut dst_bytes = vec![0xAAu8; 2 * 3 * 4];
        let mut dst = SurfaceMut::new(&mut dst_bytes, 2, 3, 8, PixelFormat::XRGB8888).unwrap();
        let path = blit_surface(&src, &mut dst, ExpandPolicy::Replicate, Strategy::Scalar).unwrap();
        assert_eq!(path, BlitPath::FastPath);

        let word = |at: usize| u32::from_ne_bytes(dst_bytes[at..at + 4].try_into().unwrap());
        assert_eq!(word(0), rgb555_to_xrgb8888(src_pixels[0], ExpandPolicy::Replicate));
        assert_eq!(word(4), rgb555_to_xrgb8888(src_pixels[1], ExpandPolicy::Replicate));
        assert_eq!(word(8), rgb555_to_xrgb8888(src_pixels[3], ExpandPolicy::Replicate));
        assert_eq!(word(12), rgb555_to_xrgb8888(src_pixels[4], ExpandPolicy::Replicate));
        assert!(dst_bytes[16..].iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn other_formats_take_the_generic_path() {
        let src_bytes = 0x001Fu16.to_ne_bytes();
        let src = SurfaceRef::new(&src_bytes, 1, 1, 2, PixelFormat::RGB565).unwrap();
        let mut dst_bytes = [0u8; 4];
        let mut dst = SurfaceMut::new(&mut dst_bytes, 1, 1, 4, PixelFormat::ARGB8888).unwrap();
        let path = blit_surface(&src, &mut dst, ExpandPolicy::Replicate, Strategy::Lanes).unwrap();
        assert_eq!(path, BlitPath::Generic);
        assert_eq!(u32::from_ne_bytes(dst_bytes), 0xFF00_00F8);
    }

    #[test]
    fn generic_handles_three_byte_pixels() {
        let src_bytes = 0x7C00u16.to_ne_bytes();
        let src = SurfaceRef::new(&src_bytes, 1, 1, 2, PixelFormat::RGB555).unwrap();
        let mut dst_bytes = [0u8; 3];
        let mut dst = SurfaceMut::new(&mut dst_bytes, 1, 1, 3, PixelFormat::RGB888).unwrap();
        generic_blit(&src, &mut dst).unwrap();
        assert_eq!(read_pixel(&dst_bytes), 0x00F8_0000);
    }

    #[test]
    fn indexed_surfaces_are_rejected() {
        let indexed = PixelFormat {
            bits_per_pixel: 8,
            bytes_per_pixel: 1,
            r_mask: 0,
            g_mask: 0,
            b_mask: 0,
            a_mask: 0,
        };
        let src_bytes = [0u8; 4];
        let src = SurfaceRef::new(&src_bytes, 2, 2, 2, indexed).unwrap();
        let mut dst_bytes = [0u8; 8];
        let mut dst = SurfaceMut::new(&mut dst_bytes, 2, 2, 4, PixelFormat::RGB565).unwrap();
        let err = blit_surface(&src, &mut dst, ExpandPolicy::Replicate, Strategy::Scalar)
            .unwrap_err();
        assert_eq!(err, ConvertError::UnsupportedFormat { bytes_per_pixel: 1 });
        assert_eq!(err.code(), -1);
    }
}
