//! Pixel Mask - 位图像素格式视图与颜色通道遮罩
//!
//! 核心是两部分:
//! - [`crate::image::scanline`]: 按行、带边界检查地读写 16/24/32 位像素内存
//! - [`crate::image::channel_mask`]: 对每个像素或调色板条目的 R/G/B 分量做按位与
//!
//! 加载、保存、旋转、灰度转换由外部图像库完成, 见 [`formats`].

#![warn(missing_docs)]

pub mod error;
pub mod formats;
pub mod image;

pub use error::{BitmapError, Result};
pub use formats::{Document, ImageCodec, ImageRsCodec, LoadedImage};
pub use crate::image::{
    Bitmap, BitmapInfo, ChannelMask, Color, ImageBuffer, Palette, PixelFormat, apply_channel_mask,
    rows, rows_mut,
};
