//! 调色板定义和管理

use crate::error::{BitmapError, Result};

/// RGBA 颜色结构
///
/// 调色板条目中 `a` 对应 RGBQUAD 的保留字节.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Color {
    /// 红
    pub r: u8,
    /// 绿
    pub g: u8,
    /// 蓝
    pub b: u8,
    /// 透明度 / 保留字节
    pub a: u8,
}

impl Color {
    /// 创建不透明颜色
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// 从 RGBA 各分量创建颜色
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// 创建黑色
    pub const fn black() -> Self {
        Self::rgb(0, 0, 0)
    }

    /// 创建白色
    pub const fn white() -> Self {
        Self::rgb(255, 255, 255)
    }

    /// 检查是否为灰色 (R == G == B)
    pub fn is_grey(self) -> bool {
        self.r == self.g && self.g == self.b
    }

    /// 格式化为十六进制颜色字符串 (如 "#FF0000" 或 "#FF0000FF" 带alpha)
    pub fn to_hex_string(self, with_alpha: bool) -> String {
        if with_alpha {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        } else {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        }
    }
}

impl std::fmt::Display for Color {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.a == 255 {
            write!(f, "Color(#{:02X}{:02X}{:02X})", self.r, self.g, self.b)
        } else {
            write!(f, "Color(#{:02X}{:02X}{:02X}{:02X})", self.r, self.g, self.b, self.a)
        }
    }
}

/// 调色板最大条目数
pub const MAX_PALETTE_ENTRIES: usize = 256;

/// 索引图像的调色板, 1..=256 个条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    entries: Vec<Color>,
}

impl Palette {
    /// 从颜色列表创建调色板
    pub fn new(entries: Vec<Color>) -> Result<Self> {
        if entries.is_empty() || entries.len() > MAX_PALETTE_ENTRIES {
            return Err(BitmapError::InvalidImageData(format!(
                "调色板条目数无效: {}",
                entries.len()
            )));
        }
        Ok(Self { entries })
    }

    /// 线性灰阶调色板, 条目数为 2^bit_depth
    pub fn greyscale(bit_depth: u32) -> Result<Self> {
        if !matches!(bit_depth, 1 | 4 | 8) {
            return Err(BitmapError::UnsupportedFormat {
                bit_depth,
                has_palette: true,
            });
        }
        let count = 1usize << bit_depth;
        let entries = (0..count)
            .map(|i| {
                let v = (i * 255 / (count - 1)) as u8;
                Color::rgba(v, v, v, 0)
            })
            .collect();
        Ok(Self { entries })
    }

    /// 条目数
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// 调色板不会为空, 保留此方法以配合 `len`
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 获取指定索引的颜色
    pub fn get(&self, index: usize) -> Result<Color> {
        self.entries
            .get(index)
            .copied()
            .ok_or(BitmapError::IndexOutOfRange {
                index,
                len: self.entries.len(),
            })
    }

    /// 设置指定索引的颜色
    pub fn set(&mut self, index: usize, color: Color) -> Result<()> {
        let len = self.entries.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(BitmapError::IndexOutOfRange { index, len })?;
        *entry = color;
        Ok(())
    }

    /// 调色板迭代器
    pub fn iter(&self) -> impl Iterator<Item = Color> + '_ {
        self.entries.iter().copied()
    }

    /// 可变迭代器, 用于就地修改
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Color> {
        self.entries.iter_mut()
    }

    /// 是否为灰阶调色板 (每个条目 R == G == B)
    pub fn is_greyscale(&self) -> bool {
        self.entries.iter().all(|c| c.is_grey())
    }
}
