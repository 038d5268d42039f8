//! 位图和图像缓冲区

use crate::error::{BitmapError, Result};
use crate::image::palette::{Color, Palette};
use crate::image::pixel::{Bgr24, Bgra32, PixelFormat, PixelLayout, Rgb555, Rgb565};
use crate::image::scanline::{rows, rows_mut};
use crate::image::width_bytes;
use std::collections::HashSet;

/// 图像缓冲区句柄
///
/// 像素内存按行连续存放, 共 `height` 行, 每行 `pitch` 字节.
/// 由外部持有, 操作期间以 `&mut` 独占借用.
pub trait ImageBuffer {
    /// 宽度 (像素)
    fn width(&self) -> usize;
    /// 高度 (像素)
    fn height(&self) -> usize;
    /// 每像素位数
    fn bit_depth(&self) -> u32;
    /// 16 位图像是否为 RGB565 布局
    fn is_rgb565(&self) -> bool;
    /// 每行字节数
    fn pitch(&self) -> usize;
    /// 像素数据
    fn bits(&self) -> &[u8];
    /// 可写像素数据
    fn bits_mut(&mut self) -> &mut [u8];
    /// 调色板
    fn palette(&self) -> Option<&Palette>;
    /// 可写调色板
    fn palette_mut(&mut self) -> Option<&mut Palette>;

    /// 是否带调色板
    fn has_palette(&self) -> bool {
        self.palette().is_some()
    }

    /// 识别像素格式
    fn pixel_format(&self) -> Result<PixelFormat> {
        PixelFormat::detect(self.bit_depth(), self.has_palette(), self.is_rgb565())
    }
}

/// 位图
///
/// 行从上到下存放, 行跨度按 4 字节对齐, 颜色分量按 B, G, R[, A] 顺序存放.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    bit_depth: u32,
    rgb565: bool,
    pitch: usize,
    bits: Vec<u8>,
    palette: Option<Palette>,
}

impl Bitmap {
    /// 创建全零位图. 索引格式使用 8 位灰阶调色板.
    pub fn new(width: usize, height: usize, format: PixelFormat) -> Result<Self> {
        match format.direct_bit_depth() {
            Some(bit_depth) => {
                Self::allocate(width, height, bit_depth, format == PixelFormat::Rgb565, None)
            }
            None => Self::new_indexed(width, height, 8, Palette::greyscale(8)?),
        }
    }

    /// 创建索引位图, 所有像素指向条目 0
    pub fn new_indexed(width: usize, height: usize, bit_depth: u32, palette: Palette) -> Result<Self> {
        if !matches!(bit_depth, 1 | 4 | 8) {
            return Err(BitmapError::UnsupportedFormat {
                bit_depth,
                has_palette: true,
            });
        }
        if palette.len() > 1 << bit_depth {
            return Err(BitmapError::InvalidImageData(format!(
                "{} 位图像的调色板条目过多: {}",
                bit_depth,
                palette.len()
            )));
        }
        Self::allocate(width, height, bit_depth, false, Some(palette))
    }

    fn allocate(
        width: usize,
        height: usize,
        bit_depth: u32,
        rgb565: bool,
        palette: Option<Palette>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(BitmapError::InvalidImageData(format!(
                "图像尺寸无效: {}x{}",
                width, height
            )));
        }
        let pitch = width_bytes(bit_depth as usize, width);
        Ok(Self {
            width,
            height,
            bit_depth,
            rgb565,
            pitch,
            bits: vec![0; pitch * height],
            palette,
        })
    }

    /// 从原始内存创建位图
    ///
    /// 只校验尺寸和调色板大小, 不校验格式; 不支持的格式在操作时报告.
    pub fn from_raw(
        width: usize,
        height: usize,
        bit_depth: u32,
        pitch: usize,
        bits: Vec<u8>,
        palette: Option<Palette>,
        rgb565: bool,
    ) -> Result<Self> {
        let row_bytes = (width * bit_depth as usize).div_ceil(8);
        if pitch < row_bytes {
            return Err(BitmapError::InvalidImageData(format!(
                "行跨度 {} 小于行字节数 {}",
                pitch, row_bytes
            )));
        }
        if bits.len() < pitch * height {
            return Err(BitmapError::InvalidImageData(format!(
                "像素数据长度 {} 小于 {}",
                bits.len(),
                pitch * height
            )));
        }
        if let Some(ref palette) = palette {
            if bit_depth <= 8 && palette.len() > 1 << bit_depth {
                return Err(BitmapError::InvalidImageData(format!(
                    "{} 位图像的调色板条目过多: {}",
                    bit_depth,
                    palette.len()
                )));
            }
        }
        Ok(Self {
            width,
            height,
            bit_depth,
            rgb565,
            pitch,
            bits,
            palette,
        })
    }

    /// 从按行排列的颜色创建直接颜色位图
    pub fn from_colors(
        width: usize,
        height: usize,
        format: PixelFormat,
        colors: &[Color],
    ) -> Result<Self> {
        if colors.len() != width * height {
            return Err(BitmapError::InvalidArgument(format!(
                "颜色数 {} 与尺寸 {}x{} 不符",
                colors.len(),
                width,
                height
            )));
        }
        if format == PixelFormat::Indexed {
            return Err(BitmapError::InvalidArgument(
                "索引位图不能由颜色直接创建".to_string(),
            ));
        }
        let mut bitmap = Self::new(width, height, format)?;
        match format {
            PixelFormat::Indexed => {}
            PixelFormat::Rgb555 => fill_colors::<Rgb555>(&mut bitmap, colors)?,
            PixelFormat::Rgb565 => fill_colors::<Rgb565>(&mut bitmap, colors)?,
            PixelFormat::Rgb24 => fill_colors::<Bgr24>(&mut bitmap, colors)?,
            PixelFormat::Rgba32 => fill_colors::<Bgra32>(&mut bitmap, colors)?,
        }
        Ok(bitmap)
    }

    /// 消耗位图, 返回像素数据
    pub fn into_bits(self) -> Vec<u8> {
        self.bits
    }

    fn check_position(&self, x: usize, y: usize) -> Result<()> {
        if x >= self.width {
            return Err(BitmapError::IndexOutOfRange {
                index: x,
                len: self.width,
            });
        }
        if y >= self.height {
            return Err(BitmapError::IndexOutOfRange {
                index: y,
                len: self.height,
            });
        }
        Ok(())
    }

    /// 索引位图中 (x, y) 处的调色板索引
    pub fn index_at(&self, x: usize, y: usize) -> Result<u8> {
        self.check_position(x, y)?;
        let row = &self.bits[y * self.pitch..];
        match (self.bit_depth, self.has_palette()) {
            (8, true) => Ok(row[x]),
            (4, true) => {
                let byte = row[x / 2];
                Ok(if x % 2 == 0 { byte >> 4 } else { byte & 0x0f })
            }
            (1, true) => Ok((row[x / 8] >> (7 - x % 8)) & 1),
            (bit_depth, has_palette) => Err(BitmapError::UnsupportedFormat {
                bit_depth,
                has_palette,
            }),
        }
    }

    /// 设置索引位图中 (x, y) 处的调色板索引
    ///
    /// 索引必须同时小于 2^位深 和调色板条目数.
    pub fn set_index(&mut self, x: usize, y: usize, index: u8) -> Result<()> {
        self.check_position(x, y)?;
        let Some(len) = self.palette.as_ref().map(Palette::len) else {
            return Err(BitmapError::UnsupportedFormat {
                bit_depth: self.bit_depth,
                has_palette: false,
            });
        };
        if !matches!(self.bit_depth, 1 | 4 | 8) {
            return Err(BitmapError::UnsupportedFormat {
                bit_depth: self.bit_depth,
                has_palette: true,
            });
        }
        let capacity = 1usize << self.bit_depth;
        if index as usize >= capacity {
            return Err(BitmapError::IndexOutOfRange {
                index: index as usize,
                len: capacity,
            });
        }
        if index as usize >= len {
            return Err(BitmapError::IndexOutOfRange {
                index: index as usize,
                len,
            });
        }
        let offset = y * self.pitch;
        let row = &mut self.bits[offset..offset + self.pitch];
        match self.bit_depth {
            8 => row[x] = index,
            4 => {
                let byte = &mut row[x / 2];
                *byte = if x % 2 == 0 {
                    (*byte & 0x0f) | (index << 4)
                } else {
                    (*byte & 0xf0) | index
                };
            }
            _ => {
                let shift = 7 - x % 8;
                row[x / 8] = (row[x / 8] & !(1 << shift)) | (index << shift);
            }
        }
        Ok(())
    }

    /// 读取 (x, y) 处的颜色, 索引图像通过调色板解析
    pub fn color_at(&self, x: usize, y: usize) -> Result<Color> {
        self.check_position(x, y)?;
        match self.pixel_format()? {
            PixelFormat::Indexed => self.resolve_index(x, y),
            PixelFormat::Rgb555 => read_pixel::<Rgb555>(self, x, y),
            PixelFormat::Rgb565 => read_pixel::<Rgb565>(self, x, y),
            PixelFormat::Rgb24 => read_pixel::<Bgr24>(self, x, y),
            PixelFormat::Rgba32 => read_pixel::<Bgra32>(self, x, y),
        }
    }

    fn resolve_index(&self, x: usize, y: usize) -> Result<Color> {
        let index = self.index_at(x, y)? as usize;
        match self.palette {
            Some(ref palette) => palette.get(index),
            None => Err(BitmapError::UnsupportedFormat {
                bit_depth: self.bit_depth,
                has_palette: false,
            }),
        }
    }

    /// 按行从上到下展开全部像素颜色
    pub fn to_colors(&self) -> Result<Vec<Color>> {
        let mut out = Vec::with_capacity(self.width * self.height);
        match self.pixel_format()? {
            PixelFormat::Indexed => {
                for y in 0..self.height {
                    for x in 0..self.width {
                        out.push(self.resolve_index(x, y)?);
                    }
                }
            }
            PixelFormat::Rgb555 => extend_colors::<Rgb555>(self, &mut out)?,
            PixelFormat::Rgb565 => extend_colors::<Rgb565>(self, &mut out)?,
            PixelFormat::Rgb24 => extend_colors::<Bgr24>(self, &mut out)?,
            PixelFormat::Rgba32 => extend_colors::<Bgra32>(self, &mut out)?,
        }
        Ok(out)
    }

    /// 图像中实际出现的不同颜色数
    pub fn unique_colors(&self) -> Result<usize> {
        let colors: HashSet<Color> = self.to_colors()?.into_iter().collect();
        Ok(colors.len())
    }

    /// 获取图像信息
    pub fn info(&self) -> Result<BitmapInfo> {
        Ok(BitmapInfo {
            width: self.width,
            height: self.height,
            bit_depth: self.bit_depth,
            format: self.pixel_format()?,
            colors: self.unique_colors()?,
        })
    }
}

impl ImageBuffer for Bitmap {
    fn width(&self) -> usize {
        self.width
    }

    fn height(&self) -> usize {
        self.height
    }

    fn bit_depth(&self) -> u32 {
        self.bit_depth
    }

    fn is_rgb565(&self) -> bool {
        self.rgb565
    }

    fn pitch(&self) -> usize {
        self.pitch
    }

    fn bits(&self) -> &[u8] {
        &self.bits
    }

    fn bits_mut(&mut self) -> &mut [u8] {
        &mut self.bits
    }

    fn palette(&self) -> Option<&Palette> {
        self.palette.as_ref()
    }

    fn palette_mut(&mut self) -> Option<&mut Palette> {
        self.palette.as_mut()
    }
}

fn read_pixel<P: PixelLayout>(bitmap: &Bitmap, x: usize, y: usize) -> Result<Color> {
    match rows::<P, _>(bitmap)?.nth(y) {
        Some(line) => line.get(x),
        None => Err(BitmapError::IndexOutOfRange {
            index: y,
            len: bitmap.height,
        }),
    }
}

fn extend_colors<P: PixelLayout>(bitmap: &Bitmap, out: &mut Vec<Color>) -> Result<()> {
    for line in rows::<P, _>(bitmap)? {
        out.extend(line.pixels());
    }
    Ok(())
}

fn fill_colors<P: PixelLayout>(bitmap: &mut Bitmap, colors: &[Color]) -> Result<()> {
    let width = bitmap.width;
    for (mut line, src) in rows_mut::<P, _>(bitmap)?.zip(colors.chunks(width)) {
        let mut src = src.iter();
        line.update(|_| src.next().copied().unwrap_or_default());
    }
    Ok(())
}

/// 图像信息（用于显示）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BitmapInfo {
    /// 宽度
    pub width: usize,
    /// 高度
    pub height: usize,
    /// 每像素位数
    pub bit_depth: u32,
    /// 像素格式
    pub format: PixelFormat,
    /// 不同颜色数
    pub colors: usize,
}

impl std::fmt::Display for BitmapInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Width: {}  Height: {}  Bpp: {} ({})  Colors: {}",
            self.width, self.height, self.bit_depth, self.format, self.colors
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_direct_pitch() {
        let bmp = Bitmap::new(3, 2, PixelFormat::Rgb565).unwrap();
        assert_eq!(bmp.bit_depth(), 16);
        assert!(bmp.is_rgb565());
        assert_eq!(bmp.pitch(), 8);
        assert_eq!(bmp.bits().len(), 16);
        assert!(!bmp.has_palette());
        assert_eq!(bmp.pixel_format().unwrap(), PixelFormat::Rgb565);
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(matches!(
            Bitmap::new(0, 4, PixelFormat::Rgb24),
            Err(BitmapError::InvalidImageData(_))
        ));
    }

    #[test]
    fn test_indexed_nibbles_and_bits() {
        let palette = Palette::greyscale(4).unwrap();
        let mut bmp = Bitmap::new_indexed(3, 1, 4, palette).unwrap();
        bmp.set_index(0, 0, 0xa).unwrap();
        bmp.set_index(1, 0, 0x5).unwrap();
        bmp.set_index(2, 0, 0xf).unwrap();
        assert_eq!(bmp.bits()[0], 0xa5);
        assert_eq!(bmp.bits()[1], 0xf0);
        assert_eq!(bmp.index_at(1, 0).unwrap(), 0x5);

        let mut mono = Bitmap::new_indexed(9, 1, 1, Palette::greyscale(1).unwrap()).unwrap();
        mono.set_index(0, 0, 1).unwrap();
        mono.set_index(8, 0, 1).unwrap();
        assert_eq!(&mono.bits()[..2], &[0x80, 0x80]);
        assert_eq!(mono.color_at(8, 0).unwrap(), Color::rgba(255, 255, 255, 0));
        assert!(mono.set_index(1, 0, 2).is_err());
    }

    #[test]
    fn test_indexed_palette_too_large() {
        let palette = Palette::greyscale(8).unwrap();
        assert!(Bitmap::new_indexed(2, 2, 4, palette).is_err());
    }

    #[test]
    fn test_from_colors_and_back() {
        let colors = vec![
            Color::rgba(1, 2, 3, 4),
            Color::rgba(5, 6, 7, 8),
            Color::rgba(9, 10, 11, 12),
            Color::rgba(13, 14, 15, 16),
        ];
        let bmp = Bitmap::from_colors(2, 2, PixelFormat::Rgba32, &colors).unwrap();
        assert_eq!(bmp.to_colors().unwrap(), colors);
        assert_eq!(bmp.color_at(1, 1).unwrap(), Color::rgba(13, 14, 15, 16));
        assert!(bmp.color_at(2, 0).is_err());
        assert!(Bitmap::from_colors(3, 2, PixelFormat::Rgba32, &colors).is_err());
    }

    #[test]
    fn test_from_raw_checks_length() {
        assert!(Bitmap::from_raw(4, 4, 8, 4, vec![0; 15], None, false).is_err());
        assert!(Bitmap::from_raw(4, 4, 24, 4, vec![0; 64], None, false).is_err());
        let bmp = Bitmap::from_raw(4, 4, 8, 4, vec![0; 16], None, false).unwrap();
        assert!(matches!(
            bmp.pixel_format(),
            Err(BitmapError::UnsupportedFormat { bit_depth: 8, has_palette: false })
        ));
    }

    #[test]
    fn test_info_counts_unique_colors() {
        let colors = vec![
            Color::rgb(255, 0, 0),
            Color::rgb(255, 0, 0),
            Color::rgb(0, 0, 255),
        ];
        let bmp = Bitmap::from_colors(3, 1, PixelFormat::Rgb24, &colors).unwrap();
        let info = bmp.info().unwrap();
        assert_eq!(info.colors, 2);
        assert_eq!(info.bit_depth, 24);
        assert_eq!(info.format, PixelFormat::Rgb24);
        assert_eq!(
            info.to_string(),
            "Width: 3  Height: 1  Bpp: 24 (RGB24)  Colors: 2"
        );
    }

    #[test]
    fn test_set_index_rejects_index_beyond_depth() {
        let mut bmp =
            Bitmap::new_indexed(2, 1, 4, Palette::new(vec![Color::black(); 16]).unwrap()).unwrap();
        bmp.set_index(0, 0, 0x3).unwrap();
        assert!(matches!(
            bmp.set_index(1, 0, 0x12),
            Err(BitmapError::IndexOutOfRange { index: 0x12, len: 16 })
        ));
        assert_eq!(bmp.index_at(0, 0).unwrap(), 0x3);
        assert_eq!(bmp.index_at(1, 0).unwrap(), 0);

        let mut mono = Bitmap::new_indexed(8, 1, 1, Palette::greyscale(1).unwrap()).unwrap();
        assert!(matches!(
            mono.set_index(3, 0, 2),
            Err(BitmapError::IndexOutOfRange { index: 2, len: 2 })
        ));
        assert_eq!(mono.bits()[0], 0);
    }

    #[test]
    fn test_from_raw_rejects_oversized_palette() {
        let result = Bitmap::from_raw(
            2,
            1,
            4,
            4,
            vec![0; 4],
            Some(Palette::greyscale(8).unwrap()),
            false,
        );
        assert!(matches!(result, Err(BitmapError::InvalidImageData(_))));

        let bmp = Bitmap::from_raw(
            2,
            1,
            4,
            4,
            vec![0; 4],
            Some(Palette::greyscale(4).unwrap()),
            false,
        )
        .unwrap();
        assert_eq!(bmp.pixel_format().unwrap(), PixelFormat::Indexed);
    }

    #[test]
    fn test_indexed_out_of_range_every_depth() {
        for bit_depth in [1, 4, 8] {
            let palette = Palette::greyscale(bit_depth).unwrap();
            let mut bmp = Bitmap::new_indexed(3, 2, bit_depth, palette).unwrap();
            assert!(bmp.index_at(2, 1).is_ok());
            assert!(matches!(
                bmp.index_at(3, 0),
                Err(BitmapError::IndexOutOfRange { index: 3, len: 3 })
            ));
            assert!(matches!(
                bmp.set_index(3, 0, 0),
                Err(BitmapError::IndexOutOfRange { index: 3, len: 3 })
            ));
            assert!(matches!(
                bmp.color_at(3, 1),
                Err(BitmapError::IndexOutOfRange { index: 3, len: 3 })
            ));
            assert!(matches!(
                bmp.index_at(0, 2),
                Err(BitmapError::IndexOutOfRange { index: 2, len: 2 })
            ));
        }
    }
}
