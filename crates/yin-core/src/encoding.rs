//! 输出 PCM 编码定义.
//!
//! 所有编码均为小端、交错排列.

use serde::{Deserialize, Serialize};
use std::fmt;

/// PCM 输出编码
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// 有符号 16 位整数
    S16,
    /// 无符号 16 位整数 (零点 0x8000)
    U16,
    /// 有符号 8 位整数
    S8,
    /// 无符号 8 位整数 (零点 0x80)
    U8,
    /// 有符号 32 位整数
    S32,
    /// 无符号 32 位整数 (零点 0x8000_0000)
    U32,
    /// 32 位浮点
    F32,
    /// 64 位浮点
    F64,
}

impl Encoding {
    /// 全部支持的编码, 按优先级排列
    pub const ALL: [Encoding; 8] = [
        Self::S16,
        Self::S32,
        Self::F32,
        Self::U16,
        Self::U32,
        Self::S8,
        Self::U8,
        Self::F64,
    ];

    /// 每个采样点占用的字节数
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            Self::S8 | Self::U8 => 1,
            Self::S16 | Self::U16 => 2,
            Self::S32 | Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }

    /// 是否为浮点编码
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// 是否为无符号整数编码
    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::U8 | Self::U16 | Self::U32)
    }

    /// 一个静音采样点的字节表示
    ///
    /// 由编码的零点推导: 有符号整数与浮点为全零,
    /// 无符号整数为最高位置 1 的中点值.
    pub const fn neutral_sample(&self) -> &'static [u8] {
        match self {
            Self::S8 => &[0x00],
            Self::U8 => &[0x80],
            Self::S16 => &[0x00, 0x00],
            Self::U16 => &[0x00, 0x80],
            Self::S32 | Self::F32 => &[0x00, 0x00, 0x00, 0x00],
            Self::U32 => &[0x00, 0x00, 0x00, 0x80],
            Self::F64 => &[0x00; 8],
        }
    }

    /// 用静音值填充缓冲区
    ///
    /// 填充按采样点边界对齐, 即 `buf[i]` 取 `neutral_sample()[i % bytes_per_sample]`.
    pub fn fill_neutral(&self, buf: &mut [u8]) {
        let pattern = self.neutral_sample();
        for chunk in buf.chunks_mut(pattern.len()) {
            chunk.copy_from_slice(&pattern[..chunk.len()]);
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::S16 => "s16",
            Self::U16 => "u16",
            Self::S8 => "s8",
            Self::U8 => "u8",
            Self::S32 => "s32",
            Self::U32 => "u32",
            Self::F32 => "flt",
            Self::F64 => "dbl",
        };
        write!(f, "{name}")
    }
}
