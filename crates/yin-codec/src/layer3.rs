//! Layer III 解码接口.
//!
//! Layer III 的熵解码与反量化不在本库实现, 通过 [`Layer3Backend`] 接入外部解码器.
//! 启用 `symphonia-backend` 特性时提供基于 symphonia 的实现.

use yin_core::YinResult;

use crate::header::FrameHeader;

/// Layer III 解码后端
pub trait Layer3Backend: Send {
    /// 后端名称
    fn name(&self) -> &str;

    /// 解码一帧 (含帧头的完整帧数据), 交错 f32 采样追加到 `out`
    ///
    /// 返回每声道产生的采样数. 比特储备不足时可以少于帧长.
    fn decode(&mut self, header: &FrameHeader, frame: &[u8], out: &mut Vec<f32>)
    -> YinResult<usize>;

    /// 丢弃比特储备与重叠缓冲 (seek 之后调用)
    fn reset(&mut self);
}

/// 创建默认 Layer III 后端
///
/// 未启用任何后端时返回 `None`.
pub fn default_backend() -> Option<Box<dyn Layer3Backend>> {
    #[cfg(feature = "symphonia-backend")]
    {
        symphonia_backend::SymphoniaLayer3::new()
            .ok()
            .map(|b| Box::new(b) as Box<dyn Layer3Backend>)
    }
    #[cfg(not(feature = "symphonia-backend"))]
    {
        None
    }
}

#[cfg(feature = "symphonia-backend")]
pub use symphonia_backend::SymphoniaLayer3;

#[cfg(feature = "symphonia-backend")]
mod symphonia_backend {
    use log::debug;
    use symphonia_bundle_mp3::MpaDecoder as SymMpaDecoder;
    use symphonia_core::audio::SampleBuffer;
    use symphonia_core::codecs::{
        CODEC_TYPE_MP3, CodecParameters as SymCodecParameters, Decoder as SymDecoderTrait,
        DecoderOptions as SymDecoderOptions,
    };
    use symphonia_core::formats::Packet as SymPacket;
    use yin_core::{YinError, YinResult};

    use super::Layer3Backend;
    use crate::header::FrameHeader;

    /// 基于 symphonia 的 Layer III 后端
    pub struct SymphoniaLayer3 {
        decoder: SymMpaDecoder,
        /// 已送入的采样数, 作为数据包时间戳
        next_ts: u64,
    }

    impl SymphoniaLayer3 {
        /// 创建后端
        pub fn new() -> YinResult<Self> {
            let params = SymCodecParameters {
                codec: CODEC_TYPE_MP3,
                ..Default::default()
            };
            let decoder = SymMpaDecoder::try_new(&params, &SymDecoderOptions::default())
                .map_err(|e| YinError::Unsupported(format!("symphonia Layer III 初始化失败: {e}")))?;
            Ok(Self { decoder, next_ts: 0 })
        }
    }

    impl Layer3Backend for SymphoniaLayer3 {
        fn name(&self) -> &str {
            "symphonia"
        }

        fn decode(
            &mut self,
            header: &FrameHeader,
            frame: &[u8],
            out: &mut Vec<f32>,
        ) -> YinResult<usize> {
            let spf = header.samples_per_frame as u64;
            let packet = SymPacket::new_from_slice(0, self.next_ts, spf, frame);
            self.next_ts += spf;
            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let spec = *decoded.spec();
                    let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                    buf.copy_interleaved_ref(decoded);
                    let channels = spec.channels.count().max(1);
                    let samples = buf.samples();
                    out.extend_from_slice(samples);
                    Ok(samples.len() / channels)
                }
                Err(e) => {
                    debug!("symphonia Layer III 解码失败: {e}");
                    Err(YinError::InvalidData(format!("Layer III 帧解码失败: {e}")))
                }
            }
        }

        fn reset(&mut self) {
            self.decoder.reset();
            self.next_ts = 0;
        }
    }
}

#[cfg(all(test, feature = "symphonia-backend"))]
mod tests {
    use super::*;

    #[test]
    fn test_默认后端可用() {
        let backend = default_backend().unwrap();
        assert_eq!(backend.name(), "symphonia");
    }
}
