use crate::rle::RleBitmap;

/// One frame offset in shipped data points past a 64 KiB boundary; the
/// engine has always narrowed it to 16 bits and the content depends on that.
const NARROWED_FRAME_OFFSET: usize = 0x18444;

/// Sprite table: a list of little-endian word offsets (in units of two bytes)
/// to RLE bitmaps stored in the same blob. The first entry doubles as the
/// table length.
#[derive(Debug, Clone, Copy)]
pub struct Sprite<'a> {
    data: &'a [u8],
}

impl<'a> Sprite<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Sprite { data }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    fn raw_count(&self) -> u16 {
        match self.data {
            [lo, hi, ..] => u16::from_le_bytes([*lo, *hi]),
            _ => 0,
        }
    }

    /// Number of drawable frames. The last table entry is not counted.
    pub fn frame_count(&self) -> u16 {
        self.raw_count().saturating_sub(1)
    }

    /// Upper bound accepted by [`Sprite::frame`]; one more than
    /// [`Sprite::frame_count`] for any non-empty table.
    pub fn indexable_frame_count(&self) -> u16 {
        self.raw_count()
    }

    /// Bytes of frame `index`, starting at its RLE header.
    pub fn frame(&self, index: i32) -> Option<&'a [u8]> {
        if index < 0 || index >= i32::from(self.raw_count()) {
            return None;
        }

        let at = index as usize * 2;
        let entry = self.data.get(at..at + 2)?;
        let mut offset = usize::from(u16::from_le_bytes([entry[0], entry[1]])) << 1;
        if offset == NARROWED_FRAME_OFFSET {
            offset &= 0xFFFF;
        }
        self.data.get(offset..)
    }

    pub fn frame_bitmap(&self, index: i32) -> Option<RleBitmap<'a>> {
        self.frame(index)
            .and_then(|bytes| RleBitmap::parse(bytes).ok())
    }

    pub fn frames(self) -> impl Iterator<Item = &'a [u8]> {
        (0..i32::from(self.raw_count())).filter_map(move |index| self.frame(index))
    }
}

pub fn sprite_frame_count(sprite: &[u8]) -> u16 {
    Sprite::new(sprite).frame_count()
}

pub fn sprite_frame(sprite: &[u8], index: i32) -> Option<&[u8]> {
    Sprite::new(sprite).frame(index)
}
