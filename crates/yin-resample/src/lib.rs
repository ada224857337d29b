//! # yin-resample
//!
//! 输出侧处理: N:M 定点重采样, PCM 编码与声道转换.

pub mod convert;
pub mod ntom;

pub use convert::{MonoMix, decode_sample, encode_samples, remix_channels};
pub use ntom::{NTOM_MAX, NTOM_MAX_FREQ, NTOM_MUL, NtomResampler};
