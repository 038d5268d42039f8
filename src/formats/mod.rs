//! 图像文件格式模块
//!
//! 编解码、旋转、灰度转换由外部图像库提供, 通过 [`ImageCodec`] 接入.
//! 通道遮罩本身不依赖这里的任何代码.

pub mod image_rs;

pub use image_rs::ImageRsCodec;

use crate::error::{BitmapError, Result};
use crate::image::{Bitmap, BitmapInfo};
use std::path::Path;

/// 外部图像库的能力接口
pub trait ImageCodec {
    /// 加载图像, 每帧/每页一个位图
    fn load(&self, path: &Path) -> Result<LoadedImage>;

    /// 按扩展名选择格式保存
    fn save(&self, bitmap: &Bitmap, path: &Path) -> Result<()>;

    /// 绕中心顺时针旋转任意角度 (度), 画布尺寸不变, 90° 的整数倍时无损交换宽高
    ///
    /// 90° 整数倍旋转保留原位深和调色板. 其它角度需要插值:
    /// 16 位图像恢复原布局, 索引图像变为 8 位灰阶 (灰阶调色板) 或 24 位.
    fn rotate(&self, bitmap: &Bitmap, degrees: f32) -> Result<Bitmap>;

    /// 转换为 8 位灰阶索引图像
    fn greyscale(&self, bitmap: &Bitmap) -> Result<Bitmap>;
}

/// 加载结果
#[derive(Debug, Clone)]
pub struct LoadedImage {
    /// 格式名称
    pub format_name: String,
    /// 所有帧
    pub frames: Vec<Bitmap>,
}

/// 当前打开的图像文档（多帧, 一个活动帧）
#[derive(Debug, Clone)]
pub struct Document {
    file_name: String,
    format_name: String,
    frames: Vec<Bitmap>,
    active: usize,
}

impl Document {
    /// 从文件打开文档
    pub fn open<C: ImageCodec + ?Sized>(codec: &C, path: &Path) -> Result<Self> {
        let loaded = codec.load(path)?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("")
            .to_string();

        tracing::debug!(
            "文档加载成功: {} ({}, {} 帧)",
            file_name,
            loaded.format_name,
            loaded.frames.len()
        );
        Self::from_frames(file_name, loaded.format_name, loaded.frames)
    }

    /// 由已有帧创建文档, 至少需要一帧
    pub fn from_frames(file_name: String, format_name: String, frames: Vec<Bitmap>) -> Result<Self> {
        if frames.is_empty() {
            return Err(BitmapError::InvalidImageData("文档没有帧".to_string()));
        }
        Ok(Self {
            file_name,
            format_name,
            frames,
            active: 0,
        })
    }

    /// 文件名
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// 格式名称
    pub fn format_name(&self) -> &str {
        &self.format_name
    }

    /// 帧数
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// 当前活动帧索引
    pub fn active_index(&self) -> usize {
        self.active
    }

    /// 切换活动帧
    pub fn select_frame(&mut self, index: usize) -> Result<()> {
        if index >= self.frames.len() {
            return Err(BitmapError::FrameOutOfRange(index));
        }
        tracing::debug!("切换到帧: {}", index);
        self.active = index;
        Ok(())
    }

    /// 活动帧
    pub fn active(&self) -> &Bitmap {
        &self.frames[self.active]
    }

    /// 可写活动帧
    pub fn active_mut(&mut self) -> &mut Bitmap {
        &mut self.frames[self.active]
    }

    /// 替换活动帧
    pub fn replace_active(&mut self, bitmap: Bitmap) {
        self.frames[self.active] = bitmap;
    }

    /// 活动帧的图像信息
    pub fn info(&self) -> Result<BitmapInfo> {
        self.active().info()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::{Color, ImageBuffer, PixelFormat};
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// 记录调用的测试用编解码器
    #[derive(Default)]
    struct FakeCodec {
        saved: RefCell<Vec<PathBuf>>,
    }

    impl ImageCodec for FakeCodec {
        fn load(&self, _path: &Path) -> Result<LoadedImage> {
            let frames = (0..3u8)
                .map(|i| Bitmap::from_colors(1, 1, PixelFormat::Rgb24, &[Color::rgb(i, i, i)]))
                .collect::<Result<Vec<_>>>()?;
            Ok(LoadedImage {
                format_name: "Fake".to_string(),
                frames,
            })
        }

        fn save(&self, _bitmap: &Bitmap, path: &Path) -> Result<()> {
            self.saved.borrow_mut().push(path.to_path_buf());
            Ok(())
        }

        fn rotate(&self, bitmap: &Bitmap, _degrees: f32) -> Result<Bitmap> {
            Ok(bitmap.clone())
        }

        fn greyscale(&self, bitmap: &Bitmap) -> Result<Bitmap> {
            Ok(bitmap.clone())
        }
    }

    #[test]
    fn test_open_and_select_frame() {
        let codec = FakeCodec::default();
        let mut doc = Document::open(&codec, Path::new("/tmp/anim.fake")).unwrap();
        assert_eq!(doc.file_name(), "anim.fake");
        assert_eq!(doc.format_name(), "Fake");
        assert_eq!(doc.frame_count(), 3);
        assert_eq!(doc.active_index(), 0);

        doc.select_frame(2).unwrap();
        assert_eq!(doc.active().color_at(0, 0).unwrap(), Color::rgb(2, 2, 2));

        assert!(matches!(doc.select_frame(3), Err(BitmapError::FrameOutOfRange(3))));
        assert_eq!(doc.active_index(), 2);
    }

    #[test]
    fn test_replace_active() {
        let codec = FakeCodec::default();
        let mut doc = Document::open(&codec, Path::new("a.fake")).unwrap();
        doc.select_frame(1).unwrap();
        doc.replace_active(Bitmap::new(2, 2, PixelFormat::Rgba32).unwrap());
        assert_eq!(doc.active().width(), 2);
        assert_eq!(doc.info().unwrap().bit_depth, 32);
        doc.select_frame(0).unwrap();
        assert_eq!(doc.active().width(), 1);
    }

    #[test]
    fn test_empty_document_rejected() {
        assert!(Document::from_frames(String::new(), String::new(), Vec::new()).is_err());
    }

    #[test]
    fn test_codec_trait_object() {
        let codec = FakeCodec::default();
        let dyn_codec: &dyn ImageCodec = &codec;
        let doc = Document::open(dyn_codec, Path::new("x.fake")).unwrap();
        dyn_codec.save(doc.active(), Path::new("out.fake")).unwrap();
        assert_eq!(codec.saved.borrow().as_slice(), &[PathBuf::from("out.fake")]);
    }
}
