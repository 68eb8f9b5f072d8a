// RLE bitmaps: optional `02 00 00 00` marker, u16 width, u16 height, then a
// token stream. A token byte with the high bit set that does not exceed
// 0x80 + width skips `T - 0x80` pixels; any other byte introduces a literal
// run of `T` palette indices. Runs may cross row boundaries.

use thiserror::Error;

use crate::surface::{IndexedSurface, PalPos};

pub const RLE_MARKER: [u8; 4] = [0x02, 0x00, 0x00, 0x00];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlitError {
    #[error("bitmap of {len} bytes is too short for its header")]
    InvalidBitmap { len: usize },
    #[error("surface is {width}x{height} but the bitmap needs {expected_width}x{expected_height}")]
    SizeMismatch {
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },
}

impl BlitError {
    pub fn code(&self) -> i32 {
        -1
    }
}

/// Per-pixel policy applied while walking a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlitMode {
    Copy,
    /// Darkens what is already on the surface; source values are ignored.
    Shadow,
    ColorShift(i32),
    /// Keeps the source brightness but forces the palette row of `color`.
    MonoColor { color: u8, shift: i32 },
}

impl BlitMode {
    #[inline]
    fn apply(self, src: u8, dst: u8) -> u8 {
        match self {
            BlitMode::Copy => src,
            BlitMode::Shadow => shadow_color(dst),
            BlitMode::ColorShift(shift) => shift_color(src, shift) | (src & 0xF0),
            BlitMode::MonoColor { color, shift } => shift_color(src, shift) | (color & 0xF0),
        }
    }
}

#[inline]
pub fn shadow_color(color: u8) -> u8 {
    (color & 0xF0) | ((color & 0x0F) >> 1)
}

/// Low nibble of `color` moved by `shift` and clamped to 0..=15.
#[inline]
pub fn shift_color(color: u8, shift: i32) -> u8 {
    (i32::from(color & 0x0F) + shift).clamp(0, 0x0F) as u8
}

fn skip_marker(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(&RLE_MARKER[..]).unwrap_or(bytes)
}

fn parse_header(bytes: &[u8]) -> Option<(u16, u16, &[u8])> {
    let body = skip_marker(bytes);
    if body.len() < 4 {
        return None;
    }
    let width = u16::from_le_bytes([body[0], body[1]]);
    let height = u16::from_le_bytes([body[2], body[3]]);
    Some((width, height, &body[4..]))
}

/// Width field of an RLE bitmap, or 0 when the blob is too short.
pub fn rle_width(bytes: &[u8]) -> u16 {
    parse_header(bytes).map_or(0, |(width, _, _)| width)
}

/// Height field of an RLE bitmap, or 0 when the blob is too short.
pub fn rle_height(bytes: &[u8]) -> u16 {
    parse_header(bytes).map_or(0, |(_, height, _)| height)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RleToken<'a> {
    Skip(u8),
    Literal(&'a [u8]),
}

/// Raw token stream of a bitmap. Stops at the end of the data; a literal run
/// cut short by the end of the data is yielded with the bytes that remain.
#[derive(Debug, Clone)]
pub struct Tokens<'a> {
    stream: &'a [u8],
    width: u16,
}

impl<'a> Iterator for Tokens<'a> {
    type Item = RleToken<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (&token, rest) = self.stream.split_first()?;
        if token & 0x80 != 0 && u32::from(token) <= 0x80 + u32::from(self.width) {
            self.stream = rest;
            return Some(RleToken::Skip(token - 0x80));
        }
        let len = usize::from(token).min(rest.len());
        let (run, rest) = rest.split_at(len);
        self.stream = rest;
        Some(RleToken::Literal(run))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RleBitmap<'a> {
    width: u16,
    height: u16,
    stream: &'a [u8],
}

impl<'a> RleBitmap<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, BlitError> {
        let (width, height, stream) =
            parse_header(bytes).ok_or(BlitError::InvalidBitmap { len: bytes.len() })?;
        Ok(RleBitmap {
            width,
            height,
            stream,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixel_count(&self) -> usize {
        usize::from(self.width) * usize::from(self.height)
    }

    pub fn tokens(&self) -> Tokens<'a> {
        Tokens {
            stream: self.stream,
            width: self.width,
        }
    }

    /// Expands the bitmap into a `width * height` buffer; skipped pixels
    /// keep `fill`.
    pub fn decode(&self, fill: u8) -> Vec<u8> {
        let (width, height) = (usize::from(self.width), usize::from(self.height));
        let mut pixels = vec![fill; width * height];
        if let Ok(mut surface) = IndexedSurface::packed(&mut pixels, width, height) {
            self.blit(&mut surface, PalPos::default(), BlitMode::Copy);
        }
        pixels
    }

    /// Marks which of the `width * height` pixels the token stream writes.
    pub fn coverage(&self) -> Vec<bool> {
        let total = self.pixel_count();
        let mut mask = vec![false; total];
        let mut at = 0usize;
        for token in self.tokens() {
            if at >= total {
                break;
            }
            match token {
                RleToken::Skip(count) => at += usize::from(count),
                RleToken::Literal(run) => {
                    let end = (at + run.len()).min(total);
                    mask[at..end].fill(true);
                    at += run.len();
                }
            }
        }
        mask
    }

    /// Composites the bitmap onto `surface` with its top-left corner at
    /// `pos`, clipping against the surface bounds.
    pub fn blit(&self, surface: &mut IndexedSurface<'_>, pos: PalPos, mode: BlitMode) {
        let width = i64::from(self.width);
        let height = i64::from(self.height);
        let surface_w = surface.width() as i64;
        let surface_h = surface.height() as i64;
        let dx = i64::from(pos.x);
        let mut dy = i64::from(pos.y);

        if width + dx <= 0 || dx >= surface_w || height + dy <= 0 || dy >= surface_h {
            return;
        }

        let total = width * height;
        let mut consumed = 0i64;
        let mut src_x = 0i64;
        let mut tokens = self.tokens();

        while consumed < total {
            let Some(token) = tokens.next() else {
                break;
            };
            match token {
                RleToken::Skip(count) => {
                    let count = i64::from(count);
                    consumed += count;
                    src_x += count;
                    if src_x >= width {
                        src_x -= width;
                        dy += 1;
                    }
                }
                RleToken::Literal(run) => {
                    let run_len = run.len() as i64;
                    let walk = RunWalk {
                        run,
                        width,
                        surface_w,
                        surface_h,
                    };
                    if walk.draw(surface, dx, dy, src_x, mode) == RunEnd::BelowSurface {
                        break;
                    }
                    consumed += run_len;
                    src_x += run_len;
                    while src_x >= width {
                        src_x -= width;
                        dy += 1;
                    }
                }
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum RunEnd {
    Drawn,
    BelowSurface,
}

struct RunWalk<'r> {
    run: &'r [u8],
    width: i64,
    surface_w: i64,
    surface_h: i64,
}

impl RunWalk<'_> {
    /// Writes one literal run that starts at bitmap column `src_x` of the
    /// row placed at surface row `dy`.
    fn draw(
        &self,
        surface: &mut IndexedSurface<'_>,
        dx: i64,
        dy: i64,
        src_x: i64,
        mode: BlitMode,
    ) -> RunEnd {
        let len = self.run.len() as i64;
        let mut j = 0i64;
        let mut sx = src_x;
        let mut x = dx + src_x;
        let mut y = dy;

        if y < 0 {
            j += -y * self.width;
            y = 0;
        } else if y >= self.surface_h {
            return RunEnd::BelowSurface;
        }

        while j < len {
            if x < 0 {
                j += -x;
                if j >= len {
                    break;
                }
                sx += -x;
                x = 0;
            } else if x >= self.surface_w {
                j += self.width - sx;
                x -= sx;
                sx = 0;
                y += 1;
                if y >= self.surface_h {
                    return RunEnd::BelowSurface;
                }
                continue;
            }

            let count = (len - j).min(self.surface_w - x).min(self.width - sx);
            sx += count;

            let row = surface.row_mut(y as usize);
            let start = x as usize;
            let src = &self.run[j as usize..(j + count) as usize];
            for (dst, &value) in row[start..start + count as usize].iter_mut().zip(src) {
                *dst = mode.apply(value, *dst);
            }
            j += count;
            x += count;

            if sx >= self.width {
                sx -= self.width;
                x -= self.width;
                y += 1;
                if y >= self.surface_h {
                    return RunEnd::BelowSurface;
                }
            }
        }
        RunEnd::Drawn
    }
}

fn blit_bytes(
    bitmap: &[u8],
    surface: &mut IndexedSurface<'_>,
    pos: PalPos,
    mode: BlitMode,
) -> Result<(), BlitError> {
    RleBitmap::parse(bitmap)?.blit(surface, pos, mode);
    Ok(())
}

pub fn blit_to_surface(
    bitmap: &[u8],
    surface: &mut IndexedSurface<'_>,
    pos: PalPos,
) -> Result<(), BlitError> {
    blit_bytes(bitmap, surface, pos, BlitMode::Copy)
}

/// Blits the bitmap, or with `shadow` set only darkens the pixels it covers.
pub fn blit_with_shadow(
    bitmap: &[u8],
    surface: &mut IndexedSurface<'_>,
    pos: PalPos,
    shadow: bool,
) -> Result<(), BlitError> {
    let mode = if shadow {
        BlitMode::Shadow
    } else {
        BlitMode::Copy
    };
    blit_bytes(bitmap, surface, pos, mode)
}

pub fn blit_with_color_shift(
    bitmap: &[u8],
    surface: &mut IndexedSurface<'_>,
    pos: PalPos,
    shift: i32,
) -> Result<(), BlitError> {
    blit_bytes(bitmap, surface, pos, BlitMode::ColorShift(shift))
}

pub fn blit_mono_color(
    bitmap: &[u8],
    surface: &mut IndexedSurface<'_>,
    pos: PalPos,
    color: u8,
    shift: i32,
) -> Result<(), BlitError> {
    blit_bytes(bitmap, surface, pos, BlitMode::MonoColor { color, shift })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct XorShift(pub u32);

    impl XorShift {
        pub(crate) fn next(&mut self) -> u32 {
            let mut x = self.0;
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            self.0 = x;
            x
        }

        pub(crate) fn below(&mut self, bound: u32) -> u32 {
            self.next() % bound
        }
    }

    /// Encodes a row-major image where `None` is transparent. Runs never
    /// cross a row boundary.
    pub(crate) fn encode(width: u16, height: u16, pixels: &[Option<u8>]) -> Vec<u8> {
        let mut data = Vec::new();
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        for row in pixels.chunks(usize::from(width)) {
            let mut x = 0;
            while x < row.len() {
                let opaque = row[x].is_some();
                let mut end = x;
                while end < row.len() && row[end].is_some() == opaque && end - x < 0x7F {
                    end += 1;
                }
                if opaque {
                    data.push((end - x) as u8);
                    data.extend(row[x..end].iter().map(|p| p.unwrap_or(0)));
                } else {
                    data.push(0x80 + (end - x) as u8);
                }
                x = end;
            }
        }
        data
    }

    /// Header plus a single literal run covering every pixel.
    fn single_run(width: u16, height: u16, pixels: &[u8]) -> Vec<u8> {
        assert!(pixels.len() < 0x80);
        let mut data = Vec::new();
        data.extend_from_slice(&width.to_le_bytes());
        data.extend_from_slice(&height.to_le_bytes());
        data.push(pixels.len() as u8);
        data.extend_from_slice(pixels);
        data
    }

    /// Straightforward placement used as the expected result.
    fn place(
        surface: &mut [u8],
        surface_w: usize,
        surface_h: usize,
        width: usize,
        pixels: &[Option<u8>],
        pos: PalPos,
    ) {
        for (index, pixel) in pixels.iter().enumerate() {
            let Some(value) = pixel else { continue };
            let x = i64::from(pos.x) + (index % width) as i64;
            let y = i64::from(pos.y) + (index / width) as i64;
            if (0..surface_w as i64).contains(&x) && (0..surface_h as i64).contains(&y) {
                surface[y as usize * surface_w + x as usize] = *value;
            }
        }
    }

    fn random_image(rng: &mut XorShift, width: u16, height: u16) -> Vec<Option<u8>> {
        (0..usize::from(width) * usize::from(height))
            .map(|_| match rng.below(4) {
                0 => None,
                _ => Some(rng.below(256) as u8),
            })
            .collect()
    }

    #[test]
    fn header_parsing_ignores_marker() {
        let plain = single_run(3, 2, &[1, 2, 3, 4, 5, 6]);
        let mut marked = RLE_MARKER.to_vec();
        marked.extend_from_slice(&plain);

        for bytes in [&plain, &marked] {
            assert_eq!(rle_width(bytes), 3);
            assert_eq!(rle_height(bytes), 2);
        }
        assert_eq!(rle_width(&[1, 2]), 0);
        assert_eq!(rle_height(&[]), 0);

        let a = RleBitmap::parse(&plain).unwrap().decode(0);
        let b = RleBitmap::parse(&marked).unwrap().decode(0);
        assert_eq!(a, b);
        assert_eq!(a, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn short_bitmap_is_invalid() {
        let mut buffer = [0u8; 4];
        let mut surface = IndexedSurface::packed(&mut buffer, 2, 2).unwrap();
        let err = blit_to_surface(&[5, 0, 1], &mut surface, PalPos::default()).unwrap_err();
        assert_eq!(err, BlitError::InvalidBitmap { len: 3 });
        assert_eq!(err.code(), -1);
    }

    #[test]
    fn full_cover_touches_every_pixel_once() {
        // One shadow pass turns 0x5F into 0x57; a second write on any pixel
        // would give 0x53.
        let bitmap = single_run(5, 4, &[9; 20]);
        let mut buffer = vec![0x5Fu8; 6 * 4];
        let mut surface = IndexedSurface::new(&mut buffer, 5, 4, 6).unwrap();
        blit_with_shadow(&bitmap, &mut surface, PalPos::new(0, 0), true).unwrap();
        for y in 0..4 {
            assert_eq!(&buffer[y * 6..y * 6 + 5], &[0x57; 5]);
            assert_eq!(buffer[y * 6 + 5], 0x5F, "padding of row {y} changed");
        }

        let pixels: Vec<u8> = (0..20).collect();
        let bitmap = single_run(5, 4, &pixels);
        let mut buffer = vec![0xFFu8; 20];
        let mut surface = IndexedSurface::packed(&mut buffer, 5, 4).unwrap();
        blit_to_surface(&bitmap, &mut surface, PalPos::default()).unwrap();
        assert_eq!(buffer, pixels);
    }

    #[test]
    fn shadow_twice_halves_twice() {
        let bitmap = single_run(4, 1, &[0, 0, 0, 0]);
        let original = [0x3F, 0xA9, 0x01, 0xF0];
        let mut buffer = original;
        let mut surface = IndexedSurface::packed(&mut buffer, 4, 1).unwrap();
        blit_with_shadow(&bitmap, &mut surface, PalPos::default(), true).unwrap();
        blit_with_shadow(&bitmap, &mut surface, PalPos::default(), true).unwrap();
        for (after, before) in buffer.iter().zip(original) {
            let once = (before & 0xF0) | ((before & 0x0F) >> 1);
            assert_eq!(*after, shadow_color(once));
        }
        assert_eq!(buffer, [0x33, 0xA2, 0x00, 0xF0]);
    }

    #[test]
    fn color_shift_clamps_low_nibble() {
        assert_eq!(shift_color(0x4E, 5), 0x0F);
        assert_eq!(shift_color(0x41, -5), 0x00);
        assert_eq!(shift_color(0x47, 2), 0x09);

        let bitmap = single_run(3, 1, &[0x4E, 0x81, 0xC7]);
        let mut buffer = [0u8; 3];
        let mut surface = IndexedSurface::packed(&mut buffer, 3, 1).unwrap();
        blit_with_color_shift(&bitmap, &mut surface, PalPos::default(), 5).unwrap();
        assert_eq!(buffer, [0x4F, 0x86, 0xCC]);

        let mut surface = IndexedSurface::packed(&mut buffer, 3, 1).unwrap();
        blit_with_color_shift(&bitmap, &mut surface, PalPos::default(), -5).unwrap();
        assert_eq!(buffer, [0x49, 0x80, 0xC2]);
    }

    #[test]
    fn mono_color_replaces_high_nibble() {
        let bitmap = single_run(3, 1, &[0x4E, 0x81, 0xC7]);
        let mut buffer = [0u8; 3];
        let mut surface = IndexedSurface::packed(&mut buffer, 3, 1).unwrap();
        blit_mono_color(&bitmap, &mut surface, PalPos::default(), 0x2B, 1).unwrap();
        assert_eq!(buffer, [0x2F, 0x22, 0x28]);
    }

    #[test]
    fn bitmap_outside_surface_is_a_no_op() {
        let bitmap = single_run(3, 3, &[7; 9]);
        for pos in [
            PalPos::new(0, 5),
            PalPos::new(0, 4),
            PalPos::new(-3, 0),
            PalPos::new(4, 0),
            PalPos::new(0, -3),
            PalPos::new(-100, -100),
            PalPos::new(i16::MAX, i16::MAX),
        ] {
            let mut buffer = [1u8; 16];
            let mut surface = IndexedSurface::packed(&mut buffer, 4, 4).unwrap();
            assert!(blit_to_surface(&bitmap, &mut surface, pos).is_ok());
            assert_eq!(buffer, [1u8; 16], "surface changed for {pos:?}");
        }
    }

    #[test]
    fn clipped_blits_match_direct_placement() {
        let mut rng = XorShift(0x1234_5678);
        for _ in 0..300 {
            let width = 1 + rng.below(12) as u16;
            let height = 1 + rng.below(12) as u16;
            let image = random_image(&mut rng, width, height);
            let bitmap = encode(width, height, &image);
            let pos = PalPos::new(
                rng.below(30) as i16 - 14,
                rng.below(30) as i16 - 14,
            );

            let (surface_w, surface_h) = (10, 8);
            let mut expected = vec![0xEEu8; surface_w * surface_h];
            place(&mut expected, surface_w, surface_h, usize::from(width), &image, pos);

            let mut actual = vec![0xEEu8; surface_w * surface_h];
            let mut surface = IndexedSurface::packed(&mut actual, surface_w, surface_h).unwrap();
            blit_to_surface(&bitmap, &mut surface, pos).unwrap();
            assert_eq!(actual, expected, "{width}x{height} at {pos:?}");
        }
    }

    #[test]
    fn runs_crossing_rows_clip_on_every_edge() {
        let pixels: Vec<u8> = (1..=30).collect();
        let image: Vec<Option<u8>> = pixels.iter().copied().map(Some).collect();
        let bitmap = single_run(6, 5, &pixels);

        for y in -5..=5 {
            for x in -6..=6 {
                let pos = PalPos::new(x, y);
                let mut expected = vec![0u8; 16];
                place(&mut expected, 4, 4, 6, &image, pos);

                let mut actual = vec![0u8; 16];
                let mut surface = IndexedSurface::packed(&mut actual, 4, 4).unwrap();
                blit_to_surface(&bitmap, &mut surface, pos).unwrap();
                assert_eq!(actual, expected, "at {pos:?}");
            }
        }
    }

    #[test]
    fn high_literal_token_beyond_skip_range() {
        // With width 1, 0x82 cannot be a skip and reads 130 literal bytes.
        let mut bitmap = Vec::new();
        bitmap.extend_from_slice(&1u16.to_le_bytes());
        bitmap.extend_from_slice(&132u16.to_le_bytes());
        bitmap.push(0x81);
        bitmap.push(0x82);
        bitmap.extend((0..130).map(|i| i as u8));
        bitmap.push(1);
        bitmap.push(0xAB);

        let rle = RleBitmap::parse(&bitmap).unwrap();
        let tokens: Vec<_> = rle.tokens().collect();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[0], RleToken::Skip(1));

        let decoded = rle.decode(0xFF);
        assert_eq!(decoded[0], 0xFF);
        assert_eq!(decoded[1], 0);
        assert_eq!(decoded[130], 129);
        assert_eq!(decoded[131], 0xAB);
    }

    #[test]
    fn coverage_matches_opaque_pixels() {
        let mut rng = XorShift(7);
        for _ in 0..40 {
            let image = random_image(&mut rng, 9, 4);
            let bitmap = encode(9, 4, &image);
            let mask = RleBitmap::parse(&bitmap).unwrap().coverage();
            let expected: Vec<bool> = image.iter().map(Option::is_some).collect();
            assert_eq!(mask, expected);
        }
    }

    #[test]
    fn truncated_stream_draws_what_is_present() {
        let mut bitmap = single_run(4, 2, &[1, 2, 3, 4, 5, 6, 7, 8]);
        bitmap.truncate(bitmap.len() - 3);
        let decoded = RleBitmap::parse(&bitmap).unwrap().decode(0);
        assert_eq!(decoded, vec![1, 2, 3, 4, 5, 0, 0, 0]);
    }

    #[test]
    fn marker_prefixed_bitmaps_blit_identically() {
        let mut rng = XorShift(99);
        for _ in 0..50 {
            let image = random_image(&mut rng, 7, 5);
            let plain = encode(7, 5, &image);
            let mut marked = RLE_MARKER.to_vec();
            marked.extend_from_slice(&plain);

            let pos = PalPos::new(rng.below(9) as i16 - 4, rng.below(9) as i16 - 4);
            let mut a = vec![3u8; 48];
            let mut b = vec![3u8; 48];
            blit_with_color_shift(&plain, &mut IndexedSurface::packed(&mut a, 8, 6).unwrap(), pos, 2)
                .unwrap();
            blit_with_color_shift(&marked, &mut IndexedSurface::packed(&mut b, 8, 6).unwrap(), pos, 2)
                .unwrap();
            assert_eq!(a, b);
        }
    }
}
