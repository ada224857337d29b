//! # yin-core
//!
//! Yin 音频解码引擎核心库, 提供错误类型、位流读取、CRC、
//! 输出编码与位置宽度转换等基础设施.

pub mod bitreader;
#[cfg(any(test, feature = "test-util"))]
pub mod bitwriter;
pub mod crc;
pub mod encoding;
pub mod error;
pub mod offset;

// 重导出常用类型
pub use encoding::Encoding;
pub use error::{YinError, YinResult};
pub use offset::{NarrowOff, Whence, WideOff};
