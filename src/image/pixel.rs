//! 像素格式描述与各格式的编解码

use crate::error::{BitmapError, Result};
use crate::image::palette::Color;
use byteorder::{ByteOrder, LittleEndian};

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// 索引颜色 (1/4/8 位, 带调色板)
    Indexed,
    /// 16 位 RGB555
    Rgb555,
    /// 16 位 RGB565
    Rgb565,
    /// 24 位 RGB (内存顺序 B, G, R)
    Rgb24,
    /// 32 位 RGBA (内存顺序 B, G, R, A)
    Rgba32,
}

impl PixelFormat {
    /// 根据位深、调色板标志和 16 位布局标志识别像素格式
    ///
    /// 调色板只在 1/4/8 位时合法, 直接颜色只支持 16/24/32 位.
    pub fn detect(bit_depth: u32, has_palette: bool, is_rgb565: bool) -> Result<Self> {
        match (bit_depth, has_palette) {
            (1 | 4 | 8, true) => Ok(PixelFormat::Indexed),
            (16, false) if is_rgb565 => Ok(PixelFormat::Rgb565),
            (16, false) => Ok(PixelFormat::Rgb555),
            (24, false) => Ok(PixelFormat::Rgb24),
            (32, false) => Ok(PixelFormat::Rgba32),
            _ => Err(BitmapError::UnsupportedFormat {
                bit_depth,
                has_palette,
            }),
        }
    }

    /// 直接颜色格式的位深, 索引格式返回 None
    pub fn direct_bit_depth(&self) -> Option<u32> {
        match self {
            PixelFormat::Indexed => None,
            PixelFormat::Rgb555 | PixelFormat::Rgb565 => Some(16),
            PixelFormat::Rgb24 => Some(24),
            PixelFormat::Rgba32 => Some(32),
        }
    }

    /// 获取格式名称
    pub fn name(&self) -> &'static str {
        match self {
            PixelFormat::Indexed => "Indexed",
            PixelFormat::Rgb555 => "RGB555",
            PixelFormat::Rgb565 => "RGB565",
            PixelFormat::Rgb24 => "RGB24",
            PixelFormat::Rgba32 => "RGBA32",
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// 直接颜色像素的内存布局
///
/// `read`/`write` 的切片长度恰好为 `BYTES`.
pub trait PixelLayout {
    /// 对应的像素格式
    const FORMAT: PixelFormat;
    /// 每像素字节数
    const BYTES: usize;

    /// 解码一个像素
    fn read(bytes: &[u8]) -> Color;

    /// 编码一个像素并写回
    fn write(bytes: &mut [u8], color: Color);
}

/// 5 位分量扩展到 8 位 (31 -> 255)
#[inline]
fn expand5(v: u16) -> u8 {
    ((v << 3) | (v >> 2)) as u8
}

/// 6 位分量扩展到 8 位 (63 -> 255)
#[inline]
fn expand6(v: u16) -> u8 {
    ((v << 2) | (v >> 4)) as u8
}

/// 16 位 RGB555, 最高位保留
pub struct Rgb555;

impl Rgb555 {
    const RED_MASK: u16 = 0x7c00;
    const GREEN_MASK: u16 = 0x03e0;
    const BLUE_MASK: u16 = 0x001f;
}

impl PixelLayout for Rgb555 {
    const FORMAT: PixelFormat = PixelFormat::Rgb555;
    const BYTES: usize = 2;

    #[inline]
    fn read(bytes: &[u8]) -> Color {
        let value = LittleEndian::read_u16(bytes);
        Color::rgb(
            expand5((value & Self::RED_MASK) >> 10),
            expand5((value & Self::GREEN_MASK) >> 5),
            expand5(value & Self::BLUE_MASK),
        )
    }

    #[inline]
    fn write(bytes: &mut [u8], color: Color) {
        let reserved = LittleEndian::read_u16(bytes) & 0x8000;
        let value = reserved
            | ((color.r as u16 >> 3) << 10)
            | ((color.g as u16 >> 3) << 5)
            | (color.b as u16 >> 3);
        LittleEndian::write_u16(bytes, value);
    }
}

/// 16 位 RGB565
pub struct Rgb565;

impl Rgb565 {
    const RED_MASK: u16 = 0xf800;
    const GREEN_MASK: u16 = 0x07e0;
    const BLUE_MASK: u16 = 0x001f;
}

impl PixelLayout for Rgb565 {
    const FORMAT: PixelFormat = PixelFormat::Rgb565;
    const BYTES: usize = 2;

    #[inline]
    fn read(bytes: &[u8]) -> Color {
        let value = LittleEndian::read_u16(bytes);
        Color::rgb(
            expand5((value & Self::RED_MASK) >> 11),
            expand6((value & Self::GREEN_MASK) >> 5),
            expand5(value & Self::BLUE_MASK),
        )
    }

    #[inline]
    fn write(bytes: &mut [u8], color: Color) {
        let value = ((color.r as u16 >> 3) << 11)
            | ((color.g as u16 >> 2) << 5)
            | (color.b as u16 >> 3);
        LittleEndian::write_u16(bytes, value);
    }
}

/// 24 位, B G R
pub struct Bgr24;

impl PixelLayout for Bgr24 {
    const FORMAT: PixelFormat = PixelFormat::Rgb24;
    const BYTES: usize = 3;

    #[inline]
    fn read(bytes: &[u8]) -> Color {
        Color::rgb(bytes[2], bytes[1], bytes[0])
    }

    #[inline]
    fn write(bytes: &mut [u8], color: Color) {
        bytes[0] = color.b;
        bytes[1] = color.g;
        bytes[2] = color.r;
    }
}

/// 32 位, B G R A
pub struct Bgra32;

impl PixelLayout for Bgra32 {
    const FORMAT: PixelFormat = PixelFormat::Rgba32;
    const BYTES: usize = 4;

    #[inline]
    fn read(bytes: &[u8]) -> Color {
        Color::rgba(bytes[2], bytes[1], bytes[0], bytes[3])
    }

    #[inline]
    fn write(bytes: &mut [u8], color: Color) {
        bytes[0] = color.b;
        bytes[1] = color.g;
        bytes[2] = color.r;
        bytes[3] = color.a;
    }
}
