/// Channel layout of a packed-pixel surface, in SDL terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelFormat {
    /// Significant bits; 15 and 16 both occupy two bytes.
    pub bits_per_pixel: u8,
    pub bytes_per_pixel: u8,
    pub r_mask: u32,
    pub g_mask: u32,
    pub b_mask: u32,
    pub a_mask: u32,
}

impl PixelFormat {
    /// 555 pixels stored in 16-bit words, as the engine allocates its
    /// high-colour screen.
    pub const RGB555: Self = PixelFormat {
        bits_per_pixel: 16,
        bytes_per_pixel: 2,
        r_mask: 0x7C00,
        g_mask: 0x03E0,
        b_mask: 0x001F,
        a_mask: 0,
    };

    /// Same layout as [`PixelFormat::RGB555`] but reporting 15 significant bits.
    pub const RGB555_15: Self = PixelFormat {
        bits_per_pixel: 15,
        ..Self::RGB555
    };

    pub const RGB565: Self = PixelFormat {
        bits_per_pixel: 16,
        bytes_per_pixel: 2,
        r_mask: 0xF800,
        g_mask: 0x07E0,
        b_mask: 0x001F,
        a_mask: 0,
    };

    pub const XRGB8888: Self = PixelFormat {
        bits_per_pixel: 32,
        bytes_per_pixel: 4,
        r_mask: 0x00FF_0000,
        g_mask: 0x0000_FF00,
        b_mask: 0x0000_00FF,
        a_mask: 0,
    };

    pub const ARGB8888: Self = PixelFormat {
        a_mask: 0xFF00_0000,
        ..Self::XRGB8888
    };

    pub const RGB888: Self = PixelFormat {
        bits_per_pixel: 24,
        bytes_per_pixel: 3,
        ..Self::XRGB8888
    };

    pub(crate) fn is_555(&self) -> bool {
        self.r_mask == 0x7C00 && self.g_mask == 0x03E0 && self.b_mask == 0x001F
    }

    pub(crate) fn has_masks(&self, r: u32, g: u32, b: u32) -> bool {
        self.r_mask == r && self.g_mask == g && self.b_mask == b
    }

    pub(crate) fn channels(&self) -> [Channel; 3] {
        [
            Channel::from_mask(self.r_mask),
            Channel::from_mask(self.g_mask),
            Channel::from_mask(self.b_mask),
        ]
    }
}

/// Position and width of one colour channel inside a pixel word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Channel {
    pub mask: u32,
    pub shift: u32,
    /// Bits dropped relative to an 8-bit channel.
    pub loss: u32,
}

impl Channel {
    pub(crate) fn from_mask(mask: u32) -> Self {
        if mask == 0 {
            return Channel {
                mask,
                shift: 0,
                loss: 8,
            };
        }
        Channel {
            mask,
            shift: mask.trailing_zeros(),
            loss: 8u32.saturating_sub(mask.count_ones()),
        }
    }

    /// Channel value widened to 8 bits with zero low bits.
    #[inline]
    pub(crate) fn unpack(self, pixel: u32) -> u32 {
        ((pixel & self.mask) >> self.shift) << self.loss
    }

    #[inline]
    pub(crate) fn pack(self, value: u32) -> u32 {
        ((value >> self.loss) << self.shift) & self.mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_geometry_follows_masks() {
        let [r, g, b] = PixelFormat::RGB565.channels();
        assert_eq!((r.shift, r.loss), (11, 3));
        assert_eq!((g.shift, g.loss), (5, 2));
        assert_eq!((b.shift, b.loss), (0, 3));

        let [r, _, _] = PixelFormat::XRGB8888.channels();
        assert_eq!((r.shift, r.loss), (16, 0));
        assert_eq!(r.pack(r.unpack(0x00AB_0000)), 0x00AB_0000);
    }

    #[test]
    fn unpacking_drops_to_zero_low_bits() {
        let [_, g, _] = PixelFormat::RGB555.channels();
        assert_eq!(g.unpack(0x03E0), 0xF8);
        assert!(PixelFormat::RGB555_15.is_555());
        assert!(!PixelFormat::RGB565.is_555());
    }
}
