//! 颜色通道遮罩
//!
//! 对每个像素 (或每个调色板条目) 的 R/G/B 分量分别按位与上遮罩值.
//! Alpha、尺寸、位深、调色板长度保持不变.

use crate::error::{BitmapError, Result};
use crate::image::bitmap::ImageBuffer;
use crate::image::palette::Color;
use crate::image::pixel::{Bgr24, Bgra32, PixelFormat, PixelLayout, Rgb555, Rgb565};
use crate::image::scanline::rows_mut;
use std::str::FromStr;

/// R/G/B 三个通道的遮罩
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMask {
    /// 红色遮罩
    pub red: u8,
    /// 绿色遮罩
    pub green: u8,
    /// 蓝色遮罩
    pub blue: u8,
}

impl ChannelMask {
    /// 保留全部通道
    pub const ALL: Self = Self::new(0xff, 0xff, 0xff);
    /// 清除全部通道
    pub const NONE: Self = Self::new(0x00, 0x00, 0x00);
    /// 只保留红色
    pub const RED_ONLY: Self = Self::new(0xff, 0x00, 0x00);
    /// 只保留绿色
    pub const GREEN_ONLY: Self = Self::new(0x00, 0xff, 0x00);
    /// 只保留蓝色
    pub const BLUE_ONLY: Self = Self::new(0x00, 0x00, 0xff);

    /// 创建遮罩
    pub const fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    /// 遮罩单个颜色, alpha 不变
    #[inline]
    pub fn apply_to(self, color: Color) -> Color {
        Color {
            r: color.r & self.red,
            g: color.g & self.green,
            b: color.b & self.blue,
            a: color.a,
        }
    }
}

impl Default for ChannelMask {
    fn default() -> Self {
        Self::ALL
    }
}

impl std::fmt::Display for ChannelMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02x},{:02x},{:02x}", self.red, self.green, self.blue)
    }
}

/// 解析 "RR,GG,BB" 形式的十六进制遮罩
impl FromStr for ChannelMask {
    type Err = BitmapError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let [red, green, blue] = parts.as_slice() else {
            return Err(BitmapError::InvalidArgument(format!(
                "遮罩格式应为 RR,GG,BB: {}",
                s
            )));
        };
        let parse = |part: &str| {
            let digits = part
                .strip_prefix("0x")
                .or_else(|| part.strip_prefix("0X"))
                .unwrap_or(part);
            u8::from_str_radix(digits, 16)
                .map_err(|_| BitmapError::InvalidArgument(format!("无效的遮罩值: {}", part)))
        };
        Ok(Self::new(parse(*red)?, parse(*green)?, parse(*blue)?))
    }
}

/// 对图像应用通道遮罩
///
/// 先识别格式, 不支持的格式在修改任何数据之前返回 `UnsupportedFormat`.
pub fn apply_channel_mask<B: ImageBuffer + ?Sized>(image: &mut B, mask: ChannelMask) -> Result<()> {
    let format = image.pixel_format()?;
    tracing::debug!(
        "应用通道遮罩 {} ({}x{}, {})",
        mask,
        image.width(),
        image.height(),
        format
    );

    match format {
        PixelFormat::Indexed => mask_palette(image, mask),
        PixelFormat::Rgb555 => mask_rows::<Rgb555, B>(image, mask),
        PixelFormat::Rgb565 => mask_rows::<Rgb565, B>(image, mask),
        PixelFormat::Rgb24 => mask_rows::<Bgr24, B>(image, mask),
        PixelFormat::Rgba32 => mask_rows::<Bgra32, B>(image, mask),
    }
}

fn mask_palette<B: ImageBuffer + ?Sized>(image: &mut B, mask: ChannelMask) -> Result<()> {
    let bit_depth = image.bit_depth();
    let palette = image
        .palette_mut()
        .ok_or(BitmapError::UnsupportedFormat {
            bit_depth,
            has_palette: false,
        })?;

    for entry in palette.iter_mut() {
        *entry = mask.apply_to(*entry);
    }
    Ok(())
}

fn mask_rows<P: PixelLayout, B: ImageBuffer + ?Sized>(image: &mut B, mask: ChannelMask) -> Result<()> {
    for mut line in rows_mut::<P, B>(image)? {
        line.update(|color| mask.apply_to(color));
    }
    Ok(())
}
