pub mod codec;
pub mod fbp;
pub mod mkf;
pub mod palette;
pub mod rle;
pub mod sprite;
pub mod surface;
pub mod yj1;

pub use codec::{CodecError, Decompressor};
pub use fbp::{FBP_HEIGHT, FBP_SIZE, FBP_WIDTH, blit_fbp};
pub use mkf::{ArchiveFlavor, ChunkInfo, MappedMkf, MkfArchive, MkfError, MkfFile, YJ1_MAGIC};
pub use palette::{Palette, PaletteTooShort};
pub use rle::{
    BlitError, BlitMode, RleBitmap, blit_mono_color, blit_to_surface, blit_with_color_shift,
    blit_with_shadow, rle_height, rle_width,
};
pub use sprite::{Sprite, sprite_frame, sprite_frame_count};
pub use surface::{IndexedSurface, PalPos, SurfaceError};
pub use yj1::{Yj1Decompressor, decompress_yj1};
