//! # yin-codec
//!
//! MPEG-1/2/2.5 音频帧头解析与子带解码.
//!
//! - [`header`]: 帧头解析与帧长计算
//! - [`layer12`]: Layer I / II 位分配、比例因子与采样重建
//! - [`synthesis`]: 多相合成滤波器组
//! - [`layer3`]: Layer III 外部解码后端接口

pub mod header;
pub mod layer12;
pub mod layer3;
pub mod synthesis;
pub mod tables;

pub use header::{ChannelMode, FrameHeader, HeaderChange, MpegVersion};
pub use layer12::Layer12Decoder;
pub use layer3::{Layer3Backend, default_backend};
pub use synthesis::SynthesisFilter;
