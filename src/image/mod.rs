//! 图像处理模块

pub mod bitmap;
pub mod channel_mask;
pub mod palette;
pub mod pixel;
pub mod scanline;

pub use bitmap::{Bitmap, BitmapInfo, ImageBuffer};
pub use channel_mask::{ChannelMask, apply_channel_mask};
pub use palette::{Color, Palette};
pub use pixel::{Bgr24, Bgra32, PixelFormat, PixelLayout, Rgb555, Rgb565};
pub use scanline::{Scanline, ScanlineMut, Scanlines, ScanlinesMut, rows, rows_mut};

/// 计算行字节数 (按 4 字节对齐, 与 BMP 相同)
pub fn width_bytes(bit_count: usize, width: usize) -> usize {
    (width * bit_count).div_ceil(32) * 4
}
