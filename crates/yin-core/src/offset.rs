//! 流位置宽度转换.
//!
//! 引擎内部一律使用 64 位 [`WideOff`] 表示字节偏移、帧号与采样位置;
//! 窄接口使用 32 位 [`NarrowOff`]. 窄化只允许无损转换, 超出范围返回
//! [`YinError::Overflow`], 不截断也不饱和.

use crate::{YinError, YinResult};
use std::io::SeekFrom;

/// 内部宽位置类型
pub type WideOff = i64;

/// 调用方窄位置类型
pub type NarrowOff = i32;

/// 定位基准
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// 从头开始
    Set,
    /// 相对当前位置
    Cur,
    /// 相对末尾
    End,
}

impl Whence {
    /// 与偏移组合为 [`SeekFrom`]
    ///
    /// `Set` 的负偏移无法表示, 返回 `InvalidArgument`.
    pub fn to_seek_from(self, offset: WideOff) -> YinResult<SeekFrom> {
        match self {
            Self::Set => u64::try_from(offset)
                .map(SeekFrom::Start)
                .map_err(|_| YinError::InvalidArgument(format!("绝对定位偏移为负: {offset}"))),
            Self::Cur => Ok(SeekFrom::Current(offset)),
            Self::End => Ok(SeekFrom::End(offset)),
        }
    }
}

/// 宽位置转窄位置
pub fn to_narrow(value: WideOff) -> YinResult<NarrowOff> {
    NarrowOff::try_from(value).map_err(|_| YinError::Overflow(value))
}

/// 窄位置转宽位置 (总是无损)
pub fn to_wide(value: NarrowOff) -> WideOff {
    WideOff::from(value)
}

/// 无符号长度转宽位置
pub fn len_to_wide(value: u64) -> YinResult<WideOff> {
    WideOff::try_from(value).map_err(|_| YinError::Overflow(WideOff::MAX))
}

/// 宽位置转 usize (用于缓冲区下标)
pub fn to_usize(value: WideOff) -> YinResult<usize> {
    usize::try_from(value).map_err(|_| YinError::Overflow(value))
}
