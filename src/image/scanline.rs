//! 扫描线视图
//!
//! 按行访问直接颜色图像的像素内存, 每行一个视图, 从上到下.
//! 视图借用缓冲区, 生命周期不会超过创建它的操作.

use crate::error::{BitmapError, Result};
use crate::image::bitmap::ImageBuffer;
use crate::image::palette::Color;
use crate::image::pixel::PixelLayout;
use std::marker::PhantomData;

/// 校验缓冲区与布局 `P` 是否一致, 返回 (宽, 高, 行跨度)
fn checked_geometry<P: PixelLayout, B: ImageBuffer + ?Sized>(
    buffer: &B,
) -> Result<(usize, usize, usize)> {
    let actual = buffer.pixel_format()?;
    if actual != P::FORMAT {
        return Err(BitmapError::FormatMismatch {
            expected: P::FORMAT,
            actual,
        });
    }

    let (width, height, pitch) = (buffer.width(), buffer.height(), buffer.pitch());
    let row_bytes = width * P::BYTES;
    if pitch < row_bytes || (height > 0 && pitch == 0) {
        return Err(BitmapError::InvalidImageData(format!(
            "行跨度 {} 小于行字节数 {}",
            pitch, row_bytes
        )));
    }
    let needed = pitch * height;
    if buffer.bits().len() < needed {
        return Err(BitmapError::InvalidImageData(format!(
            "像素数据长度 {} 小于 {}",
            buffer.bits().len(),
            needed
        )));
    }

    Ok((width, height, pitch))
}

/// 按行只读遍历直接颜色图像
pub fn rows<P: PixelLayout, B: ImageBuffer + ?Sized>(buffer: &B) -> Result<Scanlines<'_, P>> {
    let (width, height, pitch) = checked_geometry::<P, B>(buffer)?;
    let bits = &buffer.bits()[..pitch * height];
    Ok(Scanlines {
        rows: bits.chunks(pitch.max(1)),
        width,
        _layout: PhantomData,
    })
}

/// 按行可读写遍历直接颜色图像
pub fn rows_mut<P: PixelLayout, B: ImageBuffer + ?Sized>(
    buffer: &mut B,
) -> Result<ScanlinesMut<'_, P>> {
    let (width, height, pitch) = checked_geometry::<P, B>(buffer)?;
    let bits = &mut buffer.bits_mut()[..pitch * height];
    Ok(ScanlinesMut {
        rows: bits.chunks_mut(pitch.max(1)),
        width,
        _layout: PhantomData,
    })
}

#[inline]
fn check_index(x: usize, width: usize) -> Result<()> {
    if x < width {
        Ok(())
    } else {
        Err(BitmapError::IndexOutOfRange { index: x, len: width })
    }
}

/// 只读扫描线
pub struct Scanline<'a, P> {
    bytes: &'a [u8],
    width: usize,
    _layout: PhantomData<P>,
}

impl<'a, P: PixelLayout> Scanline<'a, P> {
    /// 行宽 (像素数)
    pub fn len(&self) -> usize {
        self.width
    }

    /// 行是否为空
    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    /// 读取第 x 个像素
    pub fn get(&self, x: usize) -> Result<Color> {
        check_index(x, self.width)?;
        let start = x * P::BYTES;
        Ok(P::read(&self.bytes[start..start + P::BYTES]))
    }

    /// 消耗视图, 逐像素迭代
    pub fn pixels(self) -> impl Iterator<Item = Color> + 'a
    where
        P: 'a,
    {
        self.bytes.chunks_exact(P::BYTES).map(P::read)
    }
}

/// 可读写扫描线, 写入直接修改底层缓冲区
pub struct ScanlineMut<'a, P> {
    bytes: &'a mut [u8],
    width: usize,
    _layout: PhantomData<P>,
}

impl<P: PixelLayout> ScanlineMut<'_, P> {
    /// 行宽 (像素数)
    pub fn len(&self) -> usize {
        self.width
    }

    /// 行是否为空
    pub fn is_empty(&self) -> bool {
        self.width == 0
    }

    /// 读取第 x 个像素
    pub fn get(&self, x: usize) -> Result<Color> {
        check_index(x, self.width)?;
        let start = x * P::BYTES;
        Ok(P::read(&self.bytes[start..start + P::BYTES]))
    }

    /// 写入第 x 个像素
    pub fn set(&mut self, x: usize, color: Color) -> Result<()> {
        check_index(x, self.width)?;
        let start = x * P::BYTES;
        P::write(&mut self.bytes[start..start + P::BYTES], color);
        Ok(())
    }

    /// 对整行每个像素执行 读取-修改-写回
    pub fn update<F>(&mut self, mut f: F)
    where
        F: FnMut(Color) -> Color,
    {
        for pixel in self.bytes.chunks_exact_mut(P::BYTES) {
            let color = f(P::read(pixel));
            P::write(pixel, color);
        }
    }
}

/// 只读扫描线迭代器
pub struct Scanlines<'a, P> {
    rows: std::slice::Chunks<'a, u8>,
    width: usize,
    _layout: PhantomData<P>,
}

impl<'a, P: PixelLayout> Iterator for Scanlines<'a, P> {
    type Item = Scanline<'a, P>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(Scanline {
            bytes: &row[..self.width * P::BYTES],
            width: self.width,
            _layout: PhantomData,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

/// 可读写扫描线迭代器
pub struct ScanlinesMut<'a, P> {
    rows: std::slice::ChunksMut<'a, u8>,
    width: usize,
    _layout: PhantomData<P>,
}

impl<'a, P: PixelLayout> Iterator for ScanlinesMut<'a, P> {
    type Item = ScanlineMut<'a, P>;

    fn next(&mut self) -> Option<Self::Item> {
        let row = self.rows.next()?;
        Some(ScanlineMut {
            bytes: &mut row[..self.width * P::BYTES],
            width: self.width,
            _layout: PhantomData,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}
