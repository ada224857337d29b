//! # yin-format
//!
//! Yin 音频解码引擎的输入侧: 字节流 I/O 抽象、稀疏帧索引,
//! 以及 MPEG 音频流中标签与信息帧的探测.

pub mod index;
pub mod io;
pub mod mpa;

// 重导出常用类型
pub use index::{FrameIndex, IndexSnapshot};
pub use io::{HandleCallbacks, IoBackend, IoContext, IoKind, MemoryBackend, SeekCallback};
pub use mpa::{InfoFrame, InfoKind, TrailingTag};
