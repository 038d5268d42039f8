//! 基于 `image` crate 的编解码实现

use crate::error::{BitmapError, Result};
use crate::formats::{ImageCodec, LoadedImage};
use crate::image::{Bitmap, Color, ImageBuffer, Palette, PixelFormat};
use image::codecs::gif::GifDecoder;
use image::{
    AnimationDecoder, DynamicImage, GrayImage, ImageFormat, ImageReader, Luma, Rgb, RgbImage, Rgba,
    RgbaImage,
};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// 使用 `image` crate 完成加载、保存、旋转和灰度转换
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageRsCodec;

impl ImageRsCodec {
    /// 创建编解码器
    pub fn new() -> Self {
        Self
    }

    fn load_gif_frames(path: &Path) -> Result<Vec<Bitmap>> {
        let reader = BufReader::new(File::open(path)?);
        let decoder = GifDecoder::new(reader)?;
        let frames = decoder.into_frames().collect_frames()?;
        tracing::debug!("GIF 帧数: {}", frames.len());

        frames
            .into_iter()
            .map(|frame| bitmap_from_dynamic(DynamicImage::ImageRgba8(frame.into_buffer())))
            .collect()
    }
}

impl ImageCodec for ImageRsCodec {
    fn load(&self, path: &Path) -> Result<LoadedImage> {
        tracing::debug!("开始加载图像: {:?}", path);

        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format();
        let format_name = format
            .map(|f| format!("{:?}", f))
            .unwrap_or_else(|| "Unknown".to_string());
        tracing::debug!("识别为格式: {}", format_name);

        let frames = if format == Some(ImageFormat::Gif) {
            Self::load_gif_frames(path)?
        } else {
            vec![bitmap_from_dynamic(reader.decode()?)?]
        };

        if frames.is_empty() {
            return Err(BitmapError::InvalidImageData(format!("图像没有帧: {:?}", path)));
        }

        Ok(LoadedImage {
            format_name,
            frames,
        })
    }

    fn save(&self, bitmap: &Bitmap, path: &Path) -> Result<()> {
        let format = ImageFormat::from_path(path)?;
        tracing::debug!("保存图像: {:?} ({:?})", path, format);

        let mut img = dynamic_from_bitmap(bitmap)?;
        if format == ImageFormat::Jpeg && img.color().has_alpha() {
            tracing::warn!("{:?} 不支持透明通道, 已丢弃 alpha", format);
            img = DynamicImage::ImageRgb8(img.to_rgb8());
        }
        img.save_with_format(path, format)?;
        Ok(())
    }

    fn rotate(&self, bitmap: &Bitmap, degrees: f32) -> Result<Bitmap> {
        if !degrees.is_finite() {
            return Err(BitmapError::InvalidArgument(format!("无效的旋转角度: {}", degrees)));
        }
        let degrees = degrees.rem_euclid(360.0);
        let format = bitmap.pixel_format()?;
        tracing::debug!("旋转图像: {}° ({})", degrees, format);

        if degrees % 90.0 == 0.0 {
            let quarter_turns = (degrees / 90.0) as u32 % 4;
            if quarter_turns == 0 {
                return Ok(bitmap.clone());
            }
            // 索引图像直接搬运索引, 保留位深和调色板
            if format == PixelFormat::Indexed {
                return rotate_indexed(bitmap, quarter_turns);
            }
            let img = dynamic_from_bitmap(bitmap)?;
            let rotated = match quarter_turns {
                1 => img.rotate90(),
                2 => img.rotate180(),
                _ => img.rotate270(),
            };
            return restore_layout(bitmap_from_dynamic(rotated)?, format);
        }

        let theta = degrees.to_radians();
        let rotated = match dynamic_from_bitmap(bitmap)? {
            DynamicImage::ImageLuma8(grey) => DynamicImage::ImageLuma8(rotate_about_center(
                &grey,
                theta,
                Interpolation::Bilinear,
                Luma([0]),
            )),
            DynamicImage::ImageRgba8(rgba) => DynamicImage::ImageRgba8(rotate_about_center(
                &rgba,
                theta,
                Interpolation::Bilinear,
                Rgba([0, 0, 0, 0]),
            )),
            other => DynamicImage::ImageRgb8(rotate_about_center(
                &other.to_rgb8(),
                theta,
                Interpolation::Bilinear,
                Rgb([0, 0, 0]),
            )),
        };
        restore_layout(bitmap_from_dynamic(rotated)?, format)
    }

    fn greyscale(&self, bitmap: &Bitmap) -> Result<Bitmap> {
        let img = dynamic_from_bitmap(bitmap)?;
        bitmap_from_dynamic(DynamicImage::ImageLuma8(img.to_luma8()))
    }
}

/// 16 位图像恢复原布局, 其余布局保持转换结果
fn restore_layout(rotated: Bitmap, format: PixelFormat) -> Result<Bitmap> {
    match format {
        PixelFormat::Rgb555 | PixelFormat::Rgb565 => Bitmap::from_colors(
            rotated.width(),
            rotated.height(),
            format,
            &rotated.to_colors()?,
        ),
        _ => Ok(rotated),
    }
}

/// 顺时针旋转索引图像 90° 的整数倍
fn rotate_indexed(bitmap: &Bitmap, quarter_turns: u32) -> Result<Bitmap> {
    let (width, height) = (bitmap.width(), bitmap.height());
    let palette = bitmap
        .palette()
        .cloned()
        .ok_or(BitmapError::UnsupportedFormat {
            bit_depth: bitmap.bit_depth(),
            has_palette: false,
        })?;
    let (new_width, new_height) = if quarter_turns % 2 == 1 {
        (height, width)
    } else {
        (width, height)
    };

    let mut rotated = Bitmap::new_indexed(new_width, new_height, bitmap.bit_depth(), palette)?;
    for y in 0..height {
        for x in 0..width {
            let (dx, dy) = match quarter_turns % 4 {
                1 => (height - 1 - y, x),
                2 => (width - 1 - x, height - 1 - y),
                3 => (y, width - 1 - x),
                _ => (x, y),
            };
            rotated.set_index(dx, dy, bitmap.index_at(x, y)?)?;
        }
    }
    Ok(rotated)
}

/// 将解码结果转换为支持的布局
///
/// 灰度 -> 8 位灰阶索引, RGB -> 24 位, 带透明通道 -> 32 位.
pub fn bitmap_from_dynamic(img: DynamicImage) -> Result<Bitmap> {
    let (width, height) = (img.width() as usize, img.height() as usize);

    match img {
        DynamicImage::ImageLuma8(grey) => {
            let mut bitmap = Bitmap::new_indexed(width, height, 8, Palette::greyscale(8)?)?;
            for (x, y, pixel) in grey.enumerate_pixels() {
                bitmap.set_index(x as usize, y as usize, pixel.0[0])?;
            }
            Ok(bitmap)
        }
        other if other.color().has_alpha() => {
            let colors: Vec<Color> = other
                .to_rgba8()
                .pixels()
                .map(|p| Color::rgba(p.0[0], p.0[1], p.0[2], p.0[3]))
                .collect();
            Bitmap::from_colors(width, height, PixelFormat::Rgba32, &colors)
        }
        other => {
            let colors: Vec<Color> = other
                .to_rgb8()
                .pixels()
                .map(|p| Color::rgb(p.0[0], p.0[1], p.0[2]))
                .collect();
            Bitmap::from_colors(width, height, PixelFormat::Rgb24, &colors)
        }
    }
}

/// 将位图转换为 `DynamicImage`
///
/// 灰阶调色板输出 Luma8, 32 位输出 Rgba8, 其余输出 Rgb8.
pub fn dynamic_from_bitmap(bitmap: &Bitmap) -> Result<DynamicImage> {
    let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
    let format = bitmap.pixel_format()?;
    let colors = bitmap.to_colors()?;
    let grey_palette = bitmap.palette().is_some_and(Palette::is_greyscale);

    let invalid = || BitmapError::InvalidImageData(format!("像素数与尺寸不符: {}x{}", width, height));

    let img = match format {
        PixelFormat::Indexed if grey_palette => {
            let raw = colors.iter().map(|c| c.r).collect();
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw).ok_or_else(invalid)?)
        }
        PixelFormat::Rgba32 => {
            let raw = colors.iter().flat_map(|c| [c.r, c.g, c.b, c.a]).collect();
            DynamicImage::ImageRgba8(RgbaImage::from_raw(width, height, raw).ok_or_else(invalid)?)
        }
        _ => {
            let raw = colors.iter().flat_map(|c| [c.r, c.g, c.b]).collect();
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, raw).ok_or_else(invalid)?)
        }
    };
    Ok(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{ChannelMask, apply_channel_mask};
    use image::codecs::gif::GifEncoder;
    use image::{Frame, Rgba};
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("pixel_mask_{}_{}", std::process::id(), name))
    }

    fn gradient(width: usize, height: usize) -> Bitmap {
        let colors: Vec<Color> = (0..width * height)
            .map(|i| Color::rgb((i * 7) as u8, (i * 13) as u8, (i * 29) as u8))
            .collect();
        Bitmap::from_colors(width, height, PixelFormat::Rgb24, &colors).unwrap()
    }

    #[test]
    fn test_png_save_and_load() {
        let codec = ImageRsCodec::new();
        let path = temp_path("roundtrip.png");
        let bitmap = gradient(5, 3);

        codec.save(&bitmap, &path).unwrap();
        let loaded = codec.load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.format_name, "Png");
        assert_eq!(loaded.frames.len(), 1);
        assert_eq!(loaded.frames[0].to_colors().unwrap(), bitmap.to_colors().unwrap());
    }

    #[test]
    fn test_masked_png_keeps_alpha() {
        let codec = ImageRsCodec::new();
        let path = temp_path("alpha.png");
        let colors = vec![Color::rgba(255, 255, 255, 77); 4];
        let mut bitmap = Bitmap::from_colors(2, 2, PixelFormat::Rgba32, &colors).unwrap();
        apply_channel_mask(&mut bitmap, ChannelMask::RED_ONLY).unwrap();

        codec.save(&bitmap, &path).unwrap();
        let loaded = codec.load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let frame = &loaded.frames[0];
        assert_eq!(frame.pixel_format().unwrap(), PixelFormat::Rgba32);
        assert_eq!(frame.color_at(1, 1).unwrap(), Color::rgba(255, 0, 0, 77));
    }

    #[test]
    fn test_load_missing_file() {
        let codec = ImageRsCodec::new();
        let result = codec.load(&temp_path("does_not_exist.png"));
        assert!(matches!(result, Err(BitmapError::Io(_))));
    }

    #[test]
    fn test_save_unknown_extension() {
        let codec = ImageRsCodec::new();
        let result = codec.save(&gradient(1, 1), &temp_path("out.unknown"));
        assert!(matches!(result, Err(BitmapError::Image(_))));
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        let codec = ImageRsCodec::new();
        let path = temp_path("alpha.jpg");
        let bitmap = Bitmap::new(4, 4, PixelFormat::Rgba32).unwrap();
        codec.save(&bitmap, &path).unwrap();
        let loaded = codec.load(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.format_name, "Jpeg");
        assert_eq!(loaded.frames[0].pixel_format().unwrap(), PixelFormat::Rgb24);
    }

    #[test]
    fn test_gif_frames() {
        let codec = ImageRsCodec::new();
        let path = temp_path("frames.gif");
        {
            let file = File::create(&path).unwrap();
            let mut encoder = GifEncoder::new(file);
            let frames = [Rgba([255u8, 0, 0, 255]), Rgba([0, 0, 255, 255])]
                .into_iter()
                .map(|px| Frame::new(RgbaImage::from_pixel(3, 2, px)));
            encoder.encode_frames(frames).unwrap();
        }
        let loaded = codec.load(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.format_name, "Gif");
        assert_eq!(loaded.frames.len(), 2);
        assert!(loaded.frames.iter().all(|f| f.width() == 3 && f.height() == 2));
    }

    #[test]
    fn test_rotate_quarter_turn() {
        let codec = ImageRsCodec::new();
        let colors = [Color::rgb(1, 0, 0), Color::rgb(2, 0, 0), Color::rgb(3, 0, 0)];
        let bitmap = Bitmap::from_colors(3, 1, PixelFormat::Rgb24, &colors).unwrap();

        let rotated = codec.rotate(&bitmap, 90.0).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (1, 3));
        assert_eq!(rotated.color_at(0, 0).unwrap(), Color::rgb(1, 0, 0));
        assert_eq!(rotated.color_at(0, 2).unwrap(), Color::rgb(3, 0, 0));

        let full = codec.rotate(&bitmap, 360.0).unwrap();
        assert_eq!(full, bitmap);
    }

    #[test]
    fn test_rotate_keeps_16bit_layout() {
        let codec = ImageRsCodec::new();
        let bitmap = Bitmap::from_colors(2, 1, PixelFormat::Rgb565, &[Color::white(); 2]).unwrap();
        let rotated = codec.rotate(&bitmap, -180.0).unwrap();
        assert_eq!(rotated.pixel_format().unwrap(), PixelFormat::Rgb565);
        assert_eq!(rotated.to_colors().unwrap(), vec![Color::white(); 2]);
    }

    #[test]
    fn test_rotate_arbitrary_angle() {
        let codec = ImageRsCodec::new();
        let bitmap =
            Bitmap::from_colors(5, 5, PixelFormat::Rgb24, &[Color::rgb(200, 40, 10); 25]).unwrap();

        let rotated = codec.rotate(&bitmap, 45.0).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (5, 5));
        assert_eq!(rotated.pixel_format().unwrap(), PixelFormat::Rgb24);
        // 双线性插值允许 1 的舍入误差
        let centre = rotated.color_at(2, 2).unwrap();
        for (got, want) in [(centre.r, 200), (centre.g, 40), (centre.b, 10)] {
            assert!(got.abs_diff(want) <= 1, "{} vs {}", got, want);
        }
        // 角落转出画布, 填充黑色
        assert_eq!(rotated.color_at(0, 0).unwrap(), Color::black());

        assert!(codec.rotate(&bitmap, f32::NAN).is_err());
    }

    #[test]
    fn test_rotate_arbitrary_angle_16bit() {
        let codec = ImageRsCodec::new();
        let bitmap = Bitmap::from_colors(3, 3, PixelFormat::Rgb555, &[Color::white(); 9]).unwrap();
        let rotated = codec.rotate(&bitmap, 30.0).unwrap();
        assert_eq!(rotated.pixel_format().unwrap(), PixelFormat::Rgb555);
        assert_eq!(rotated.color_at(1, 1).unwrap(), Color::white());
    }

    #[test]
    fn test_rotate_indexed_keeps_depth_and_palette() {
        let codec = ImageRsCodec::new();
        let palette = Palette::new(vec![
            Color::rgba(255, 0, 0, 0),
            Color::rgba(0, 255, 0, 0),
            Color::rgba(0, 0, 255, 0),
        ])
        .unwrap();
        let mut bitmap = Bitmap::new_indexed(3, 2, 4, palette.clone()).unwrap();
        bitmap.set_index(0, 0, 1).unwrap();
        bitmap.set_index(2, 1, 2).unwrap();

        let rotated = codec.rotate(&bitmap, 90.0).unwrap();
        assert_eq!((rotated.width(), rotated.height()), (2, 3));
        assert_eq!(rotated.bit_depth(), 4);
        assert_eq!(rotated.palette(), Some(&palette));
        assert_eq!(rotated.index_at(1, 0).unwrap(), 1);
        assert_eq!(rotated.index_at(0, 2).unwrap(), 2);

        let back = codec.rotate(&rotated, 270.0).unwrap();
        assert_eq!(back, bitmap);
    }

    #[test]
    fn test_greyscale_is_indexed() {
        let codec = ImageRsCodec::new();
        let grey = codec.greyscale(&gradient(4, 4)).unwrap();
        assert_eq!(grey.bit_depth(), 8);
        assert_eq!(grey.pixel_format().unwrap(), PixelFormat::Indexed);
        assert!(grey.palette().unwrap().is_greyscale());
        assert!(matches!(
            dynamic_from_bitmap(&grey).unwrap(),
            DynamicImage::ImageLuma8(_)
        ));

        let mut masked = grey.clone();
        apply_channel_mask(&mut masked, ChannelMask::RED_ONLY).unwrap();
        assert!(matches!(
            dynamic_from_bitmap(&masked).unwrap(),
            DynamicImage::ImageRgb8(_)
        ));
    }
}
