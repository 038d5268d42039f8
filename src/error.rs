//! 错误类型定义

use thiserror::Error;

/// 位图操作错误类型
#[derive(Error, Debug)]
pub enum BitmapError {
    /// 文件读写失败
    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 外部图像库编解码失败
    #[error("图片编解码错误: {0}")]
    Image(#[from] image::ImageError),

    /// 扫描线、调色板或坐标越界
    #[error("索引超出范围: {index} (长度 {len})")]
    IndexOutOfRange {
        /// 请求的索引
        index: usize,
        /// 有效范围的长度
        len: usize,
    },

    /// 位深与调色板组合不是支持的五种格式之一
    #[error("不支持的像素格式: {bit_depth} 位, 调色板: {has_palette}")]
    UnsupportedFormat {
        /// 每像素位数
        bit_depth: u32,
        /// 是否带调色板
        has_palette: bool,
    },

    /// 请求的扫描线布局与图像格式不一致
    #[error("像素格式不匹配: 期望 {expected}, 实际 {actual}")]
    FormatMismatch {
        /// 请求的格式
        expected: crate::image::PixelFormat,
        /// 图像的实际格式
        actual: crate::image::PixelFormat,
    },

    /// 尺寸、行跨度或调色板不一致
    #[error("无效的图片数据: {0}")]
    InvalidImageData(String),

    /// 帧索引越界
    #[error("帧索引超出范围: {0}")]
    FrameOutOfRange(usize),

    /// 调用参数无效
    #[error("无效的参数: {0}")]
    InvalidArgument(String),
}

/// 库内统一的结果类型
pub type Result<T> = std::result::Result<T, BitmapError>;
