//! # Yin (音)
//!
//! 纯 Rust 实现的流式 MPEG 音频解码引擎 (Layer I/II/III).
//!
//! - **解码**: 帧同步、重同步、Layer I/II 子带解码, Layer III 交给可插拔后端
//! - **输出**: 整数/浮点多种采样编码, 强制单声道或立体声, N:M 重采样
//! - **定位**: 帧索引 + 预解码, 采样级精确 seek, gapless 首尾裁剪
//! - **输入**: 文件、可定位句柄、只读流、套接字、回调与推送模式
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use yin::{DecodeStatus, Decoder};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut dec = Decoder::new();
//! dec.open("music.mp3")?;
//! let format = dec.format()?;
//! println!("{} Hz, {} 声道", format.rate, format.channels);
//!
//! let mut pcm = vec![0u8; Decoder::safe_buffer()];
//! loop {
//!     let (status, n) = dec.read(&mut pcm)?;
//!     // 处理 pcm[..n]
//!     if status == DecodeStatus::Done {
//!         break;
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `yin-core` | 错误类型、位读写、宽窄位置、采样编码 |
//! | `yin-codec` | 帧头解析, Layer I/II/III 解码 |
//! | `yin-format` | I/O 抽象、帧索引、标签与信息帧 |
//! | `yin-resample` | N:M 重采样与声道混合 |

/// 核心类型与工具
pub use yin_core as core;

/// 帧头解析与分层解码
pub use yin_codec as codec;

/// I/O 抽象与帧索引
pub use yin_format as format;

/// 重采样与采样编码
pub use yin_resample as resample;

pub mod decoder;
pub mod logging;

pub use decoder::{
    DecodeStatus, Decoder, DecoderFlags, DecoderParams, FrameInfo, FrameInfoFlags, OutputFormat,
    StateKey, VbrMode,
};
pub use yin_core::{Encoding, NarrowOff, Whence, WideOff, YinError, YinResult};

/// 获取 Yin 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
