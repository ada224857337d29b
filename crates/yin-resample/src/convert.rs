//! 采样编码与声道转换.
//!
//! 合成与重采样在 f32 上进行, 输出前统一换算为目标 PCM 编码.
//! 整数编码按四舍五入取整并饱和, 超出范围的采样点计入削波计数.

use byteorder::{ByteOrder, LittleEndian};
use yin_core::{Encoding, YinError, YinResult};

/// 单声道输出时的声道取舍方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonoMix {
    /// 只取左声道
    Left,
    /// 只取右声道
    Right,
    /// 左右取平均
    Mix,
}

/// 把 f32 交错采样编码为目标格式
///
/// `scale` 为输出增益. 返回被削波的采样点数.
///
/// # 参数
/// - `input`: 交错 f32 采样, 名义范围 [-1.0, 1.0)
/// - `encoding`: 目标编码
/// - `scale`: 增益
/// - `output`: 目标缓冲区, 长度至少 `input.len() * bytes_per_sample`
pub fn encode_samples(
    input: &[f32],
    encoding: Encoding,
    scale: f64,
    output: &mut [u8],
) -> YinResult<usize> {
    let bps = encoding.bytes_per_sample();
    let expected_len = input.len() * bps;
    if output.len() < expected_len {
        return Err(YinError::InvalidArgument(format!(
            "输出缓冲区不足: 期望 {expected_len} 字节, 实际 {} 字节",
            output.len()
        )));
    }

    let mut clipped = 0usize;
    for (sample, dst) in input.iter().zip(output.chunks_exact_mut(bps)) {
        let value = f64::from(*sample) * scale;
        match encoding {
            Encoding::S16 => {
                let v = quantize(value, 32768.0, &mut clipped);
                LittleEndian::write_i16(dst, v as i16);
            }
            Encoding::U16 => {
                let v = quantize(value, 32768.0, &mut clipped);
                LittleEndian::write_u16(dst, (v + 32768) as u16);
            }
            Encoding::S8 => {
                let v = quantize(value, 128.0, &mut clipped);
                dst[0] = v as i8 as u8;
            }
            Encoding::U8 => {
                let v = quantize(value, 128.0, &mut clipped);
                dst[0] = (v + 128) as u8;
            }
            Encoding::S32 => {
                let v = quantize(value, 2_147_483_648.0, &mut clipped);
                LittleEndian::write_i32(dst, v as i32);
            }
            Encoding::U32 => {
                let v = quantize(value, 2_147_483_648.0, &mut clipped);
                LittleEndian::write_u32(dst, (v + 2_147_483_648) as u32);
            }
            Encoding::F32 => LittleEndian::write_f32(dst, value as f32),
            Encoding::F64 => LittleEndian::write_f64(dst, value),
        }
    }

    Ok(clipped)
}

/// 按满刻度 `full` 量化并饱和到 [-full, full - 1]
fn quantize(value: f64, full: f64, clipped: &mut usize) -> i64 {
    let scaled = (value * full).round();
    if scaled > full - 1.0 {
        *clipped += 1;
        (full - 1.0) as i64
    } else if scaled < -full {
        *clipped += 1;
        -full as i64
    } else {
        scaled as i64
    }
}

/// 把单个编码采样还原为 f64 (名义范围 [-1.0, 1.0))
pub fn decode_sample(data: &[u8], encoding: Encoding) -> YinResult<f64> {
    if data.len() < encoding.bytes_per_sample() {
        return Err(YinError::InvalidArgument("采样数据长度不足".into()));
    }
    let value = match encoding {
        Encoding::S16 => f64::from(LittleEndian::read_i16(data)) / 32768.0,
        Encoding::U16 => (f64::from(LittleEndian::read_u16(data)) - 32768.0) / 32768.0,
        Encoding::S8 => f64::from(data[0] as i8) / 128.0,
        Encoding::U8 => (f64::from(data[0]) - 128.0) / 128.0,
        Encoding::S32 => f64::from(LittleEndian::read_i32(data)) / 2_147_483_648.0,
        Encoding::U32 => (f64::from(LittleEndian::read_u32(data)) - 2_147_483_648.0) / 2_147_483_648.0,
        Encoding::F32 => f64::from(LittleEndian::read_f32(data)),
        Encoding::F64 => LittleEndian::read_f64(data),
    };
    Ok(value)
}

/// 声道转换
///
/// 支持的转换:
/// - N 声道 → N 声道: 原样复制
/// - 单声道 → 立体声: 复制
/// - 立体声 → 单声道: 按 [`MonoMix`] 取舍
pub fn remix_channels(
    input: &[f32],
    src_channels: usize,
    dst_channels: usize,
    mono: MonoMix,
    output: &mut Vec<f32>,
) -> YinResult<()> {
    match (src_channels, dst_channels) {
        (s, d) if s == d => output.extend_from_slice(input),
        (1, 2) => {
            for &s in input {
                output.push(s);
                output.push(s);
            }
        }
        (2, 1) => {
            for pair in input.chunks_exact(2) {
                output.push(match mono {
                    MonoMix::Left => pair[0],
                    MonoMix::Right => pair[1],
                    MonoMix::Mix => 0.5 * (pair[0] + pair[1]),
                });
            }
        }
        (s, d) => {
            return Err(YinError::Unsupported(format!(
                "不支持的声道转换: {s} -> {d}"
            )));
        }
    }
    Ok(())
}
