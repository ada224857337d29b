//! MPEG Layer I / Layer II 子带解码.
//!
//! 每帧分两遍:
//! 1. 位分配与比例因子: 按子带读取位分配码, Layer II 另有比例因子选择信息,
//!    再按选择信息读取 1~3 个 6 bit 比例因子.
//! 2. 采样重建: 每部分 12 个时隙 (Layer I 一部分, Layer II 三部分),
//!    按量化类别读取线性或分组码字, 反量化后乘以比例因子.
//!
//! 联合立体声边界以上的子带两声道共用位分配与采样码字,
//! 但各自使用自己的比例因子.

use log::{debug, trace};
use yin_core::bitreader::BitReader;
use yin_core::crc::mpeg_frame_crc;
use yin_core::{YinError, YinResult};

use crate::header::{ChannelMode, FrameHeader};
use crate::synthesis::SynthesisFilter;
use crate::tables::{
    ALLOC_L1, ALLOC_L2_LSF, ALLOC_L2_M1, ALLOC_L2_M1_LOWRATE, BITALLOC_CODE_TAB, SubbandAlloc,
    grouped_code_bits, quant_levels, scale_factor,
};

/// 子带数
pub const SUBBANDS: usize = 32;

/// 每部分的时隙数
const SLOTS_PER_PART: usize = 12;

/// 一帧的位分配与比例因子
struct ScaleInfo {
    /// 实际编码的子带数
    total_bands: usize,
    /// 两声道分别编码的子带数 (联合立体声边界)
    stereo_bands: usize,
    /// 量化类别 [ch][sb], 0 表示未分配
    class: [[u8; SUBBANDS]; 2],
    /// 比例因子乘数 [ch][sb][part]
    scf: [[[f32; 3]; SUBBANDS]; 2],
}

/// 选择位分配表, 返回 (表, 子带数)
fn alloc_table(header: &FrameHeader) -> (&'static [SubbandAlloc], usize) {
    if header.layer == 1 {
        return (&ALLOC_L1, 32);
    }
    if header.is_lsf() {
        return (&ALLOC_L2_LSF, 30);
    }
    let kbps_per_channel = header.bitrate_kbps / header.channels();
    if kbps_per_channel < 56 {
        let bands = if header.sample_rate_index == 2 { 12 } else { 8 };
        (&ALLOC_L2_M1_LOWRATE, bands)
    } else if kbps_per_channel >= 96 && header.sample_rate_index != 1 {
        (&ALLOC_L2_M1, 30)
    } else {
        (&ALLOC_L2_M1, 27)
    }
}

/// 两声道分别编码的子带数
fn stereo_bound(header: &FrameHeader, total_bands: usize) -> usize {
    let bound = match header.mode {
        ChannelMode::Mono => 0,
        ChannelMode::JointStereo => usize::from(header.mode_ext) * 4 + 4,
        ChannelMode::Stereo | ChannelMode::DualChannel => SUBBANDS,
    };
    bound.min(total_bands)
}

/// 位流耗尽转为损坏帧错误
fn exhausted(stage: &'static str) -> impl FnOnce(YinError) -> YinError {
    move |e| match e {
        YinError::Eof => YinError::InvalidData(format!("{stage}: 帧数据不足")),
        other => other,
    }
}

/// 读取位分配与比例因子选择信息
///
/// 返回时位流停在比例因子之前, 即 CRC 保护区的末尾.
fn read_allocation(
    br: &mut BitReader<'_>,
    header: &FrameHeader,
) -> YinResult<(ScaleInfo, [[u8; SUBBANDS]; 2])> {
    let (table, total_bands) = alloc_table(header);
    let stereo_bands = stereo_bound(header, total_bands);
    let mut info = ScaleInfo {
        total_bands,
        stereo_bands,
        class: [[0; SUBBANDS]; 2],
        scf: [[[0.0; 3]; SUBBANDS]; 2],
    };

    let mut entries = table.iter();
    let mut entry = SubbandAlloc {
        tab_offset: 0,
        width: 0,
        count: 0,
    };
    let mut band_end = 0;
    for sb in 0..total_bands {
        if sb == band_end {
            entry = *entries
                .next()
                .ok_or_else(|| YinError::Internal("位分配表子带数不足".into()))?;
            band_end += entry.count;
        }
        let code = br.read_bits(entry.width)? as usize;
        info.class[0][sb] = BITALLOC_CODE_TAB[entry.tab_offset + code];
        info.class[1][sb] = if sb < stereo_bands {
            let code = br.read_bits(entry.width)? as usize;
            BITALLOC_CODE_TAB[entry.tab_offset + code]
        } else if header.channels() == 2 {
            info.class[0][sb]
        } else {
            0
        };
    }

    // Layer I 固定为单个比例因子
    let mut scfsi = [[0u8; SUBBANDS]; 2];
    for sb in 0..total_bands {
        for ch in 0..2 {
            if info.class[ch][sb] != 0 {
                scfsi[ch][sb] = if header.layer == 1 {
                    2
                } else {
                    br.read_bits(2)? as u8
                };
            }
        }
    }
    Ok((info, scfsi))
}

/// 按选择信息读取比例因子
///
/// 选择码: 0 读三个, 1 读 (a, a, b), 2 读 (a, a, a), 3 读 (a, b, b).
fn read_scale_factors(
    br: &mut BitReader<'_>,
    info: &mut ScaleInfo,
    scfsi: &[[u8; SUBBANDS]; 2],
) -> YinResult<()> {
    for sb in 0..info.total_bands {
        for ch in 0..2 {
            if info.class[ch][sb] == 0 {
                continue;
            }
            let mut read = || -> YinResult<f32> { Ok(scale_factor(br.read_bits(6)? as u8)) };
            info.scf[ch][sb] = match scfsi[ch][sb] {
                0 => [read()?, read()?, read()?],
                1 => {
                    let a = read()?;
                    let b = read()?;
                    [a, a, b]
                }
                2 => {
                    let a = read()?;
                    [a, a, a]
                }
                _ => {
                    let a = read()?;
                    let b = read()?;
                    [a, b, b]
                }
            };
        }
    }
    Ok(())
}

/// 读取一组 (group 个) 量化值, 返回反量化前的归一化分数
fn read_group(br: &mut BitReader<'_>, class: u8, group: usize, out: &mut [f32; 3]) -> YinResult<()> {
    let levels = quant_levels(class);
    let norm = 2.0 / levels as f32;
    let half = (levels - 1) / 2;
    if let Some(bits) = grouped_code_bits(class) {
        let mut code = br.read_bits(bits)?;
        for v in out.iter_mut().take(group) {
            *v = ((code % levels) as f32 - half as f32) * norm;
            code /= levels;
        }
    } else {
        for v in out.iter_mut().take(group) {
            let x = br.read_bits(u32::from(class))?;
            *v = (x as f32 - half as f32) * norm;
        }
    }
    Ok(())
}

/// Layer I / II 解码器
#[derive(Debug, Clone)]
pub struct Layer12Decoder {
    synth: [SynthesisFilter; 2],
    /// 参与合成的子带上限, 以上子带置零
    sblimit: usize,
    /// 是否校验 CRC
    check_crc: bool,
}

impl Default for Layer12Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer12Decoder {
    /// 创建解码器
    pub fn new() -> Self {
        Self {
            synth: [SynthesisFilter::new(), SynthesisFilter::new()],
            sblimit: SUBBANDS,
            check_crc: false,
        }
    }

    /// 设置合成子带上限 (1..=32)
    pub fn set_sblimit(&mut self, sblimit: usize) {
        self.sblimit = sblimit.clamp(1, SUBBANDS);
    }

    /// 当前合成子带上限
    pub fn sblimit(&self) -> usize {
        self.sblimit
    }

    /// 是否校验带保护帧的 CRC
    pub fn set_crc_check(&mut self, enabled: bool) {
        self.check_crc = enabled;
    }

    /// 清空合成滤波器历史
    pub fn reset(&mut self) {
        for s in &mut self.synth {
            s.reset();
        }
    }

    /// 解码一帧, 交错 f32 采样追加到 `out`
    ///
    /// 返回每声道产生的采样数. 位分配区不完整或 CRC 不符时返回
    /// `InvalidData` 且不产生采样; 采样区中途耗尽时保留已完成的部分,
    /// 返回值小于帧长.
    pub fn decode(
        &mut self,
        header: &FrameHeader,
        frame: &[u8],
        out: &mut Vec<f32>,
    ) -> YinResult<usize> {
        if header.layer == 3 {
            return Err(YinError::InvalidArgument("Layer III 帧不能由 Layer I/II 解码".into()));
        }
        let end = header.frame_size.min(frame.len());
        let payload_start = header.payload_offset();
        if end <= payload_start {
            return Err(YinError::InvalidData("帧长度不足".into()));
        }
        let payload = &frame[payload_start..end];
        let mut br = BitReader::new(payload);

        let (mut info, scfsi) =
            read_allocation(&mut br, header).map_err(exhausted("位分配"))?;

        if self.check_crc && header.has_crc {
            let stored = u16::from_be_bytes([frame[4], frame[5]]);
            let head = [frame[0], frame[1], frame[2], frame[3]];
            let computed = mpeg_frame_crc(&head, payload, br.bits_read());
            if stored != computed {
                debug!("Layer {}: CRC 不符 ({stored:#06x} != {computed:#06x})", header.layer);
                return Err(YinError::InvalidData("CRC 校验失败".into()));
            }
        }

        read_scale_factors(&mut br, &mut info, &scfsi).map_err(exhausted("比例因子"))?;

        let channels = header.channels() as usize;
        let (parts, group) = if header.layer == 1 { (1, 1) } else { (3, 3) };
        let mut produced = 0;
        for part in 0..parts {
            let mut slots = [[[0.0f32; SUBBANDS]; SLOTS_PER_PART]; 2];
            if let Err(e) = self.read_part(&mut br, &info, part, group, &mut slots) {
                if matches!(e, YinError::Eof) {
                    trace!("Layer {}: 第 {part} 部分数据不足, 已完成 {produced} 个采样", header.layer);
                    break;
                }
                return Err(e);
            }
            self.synthesize_part(&slots, channels, out);
            produced += SLOTS_PER_PART * SUBBANDS;
        }
        Ok(produced)
    }

    /// 读取一个部分的 12 个时隙
    fn read_part(
        &self,
        br: &mut BitReader<'_>,
        info: &ScaleInfo,
        part: usize,
        group: usize,
        slots: &mut [[[f32; SUBBANDS]; SLOTS_PER_PART]; 2],
    ) -> YinResult<()> {
        let granules = SLOTS_PER_PART / group;
        let mut values = [0.0f32; 3];
        for gr in 0..granules {
            let base = gr * group;
            for sb in 0..info.total_bands {
                if sb >= info.stereo_bands {
                    // 共享码字, 两声道各乘自己的比例因子
                    let class = info.class[0][sb];
                    if class == 0 {
                        continue;
                    }
                    read_group(br, class, group, &mut values)?;
                    for (ch, ch_slots) in slots.iter_mut().enumerate() {
                        let scf = info.scf[ch][sb][part];
                        for k in 0..group {
                            ch_slots[base + k][sb] = values[k] * scf;
                        }
                    }
                    continue;
                }
                for ch in 0..2 {
                    let class = info.class[ch][sb];
                    if class == 0 {
                        continue;
                    }
                    read_group(br, class, group, &mut values)?;
                    let scf = info.scf[ch][sb][part];
                    for k in 0..group {
                        slots[ch][base + k][sb] = values[k] * scf;
                    }
                }
            }
        }
        if self.sblimit < SUBBANDS {
            for ch_slots in slots.iter_mut() {
                for slot in ch_slots.iter_mut() {
                    slot[self.sblimit..].fill(0.0);
                }
            }
        }
        Ok(())
    }

    fn synthesize_part(
        &mut self,
        slots: &[[[f32; SUBBANDS]; SLOTS_PER_PART]; 2],
        channels: usize,
        out: &mut Vec<f32>,
    ) {
        let mut pcm = [[0.0f32; SUBBANDS]; 2];
        for slot in 0..SLOTS_PER_PART {
            for ch in 0..channels {
                self.synth[ch].synthesize(&slots[ch][slot], &mut pcm[ch]);
            }
            for i in 0..SUBBANDS {
                for ch_pcm in pcm.iter().take(channels) {
                    out.push(ch_pcm[i]);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use yin_core::bitwriter::BitWriter;

    /// 构造帧头: MPEG-1 Layer II
    fn header_raw(bitrate_idx: u32, mode: u32, crc: bool) -> u32 {
        0xFFE0_0000 | (3 << 19) | (2 << 17) | (u32::from(!crc) << 16) | (bitrate_idx << 12) | (mode << 6)
    }

    /// 按给定的 (子带, 位分配码, 比例因子索引, 采样码) 构造 Layer II 帧
    ///
    /// 只支持非分组量化类别, 所有声道写入相同内容.
    fn build_frame(raw: u32, bands: &[(usize, u32, u32, u32)], crc: bool) -> (FrameHeader, Vec<u8>) {
        let header = FrameHeader::parse(raw).unwrap();
        let (table, total) = alloc_table(&header);
        let channels = header.channels() as usize;
        let lookup = |sb: usize| bands.iter().find(|b| b.0 == sb);

        let mut w = BitWriter::new();
        let mut sb = 0;
        for entry in table {
            for _ in 0..entry.count {
                if sb >= total {
                    break;
                }
                let code = lookup(sb).map_or(0, |b| b.1);
                for _ in 0..channels {
                    w.write_bits(code, entry.width);
                }
                sb += 1;
            }
        }
        for _ in 0..bands.len() * channels {
            w.write_bits(2, 2);
        }
        let protected_bits = w.bits_written();
        for b in bands {
            for _ in 0..channels {
                w.write_bits(b.2, 6);
            }
        }
        let class_of = |sb: usize| {
            let mut sb_i = 0;
            for entry in table {
                if sb < sb_i + entry.count {
                    return BITALLOC_CODE_TAB[entry.tab_offset + lookup(sb).map_or(0, |b| b.1) as usize];
                }
                sb_i += entry.count;
            }
            0
        };
        let payload_cap = (header.frame_size - header.payload_offset()) * 8;
        'outer: for _ in 0..12 {
            for b in bands {
                let class = class_of(b.0);
                for _ in 0..channels {
                    for _ in 0..3 {
                        if w.bits_written() + class as usize > payload_cap {
                            break 'outer;
                        }
                        w.write_bits(b.3, u32::from(class));
                    }
                }
            }
        }
        let payload = w.finish();

        let mut frame = raw.to_be_bytes().to_vec();
        if crc {
            let crc = mpeg_frame_crc(&raw.to_be_bytes(), &payload, protected_bits);
            frame.extend_from_slice(&crc.to_be_bytes());
        }
        frame.extend_from_slice(&payload);
        frame.resize(header.frame_size, 0);
        (header, frame)
    }

    #[test]
    fn test_全零分配输出静音() {
        let (header, frame) = build_frame(header_raw(8, 0, false), &[], false);
        let mut dec = Layer12Decoder::new();
        let mut out = Vec::new();
        let n = dec.decode(&header, &frame, &mut out).unwrap();
        assert_eq!(n, 1152);
        assert_eq!(out.len(), 2304);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_最低子带直流重建() {
        // 子带 0: 位分配码 2 -> 3 bit 线性量化 (7 级), 采样码 6 -> 3/7 * 2
        // 比例因子索引 3 -> 1.0
        let (header, frame) = build_frame(header_raw(8, 3, false), &[(0, 2, 3, 6)], false);
        let mut dec = Layer12Decoder::new();
        let mut out = Vec::new();
        let n = dec.decode(&header, &frame, &mut out).unwrap();
        assert_eq!(n, 1152);
        assert_eq!(out.len(), 1152);
        let expected = 6.0 / 7.0;
        for &s in &out[600..] {
            assert!((s - expected).abs() < 1e-2, "采样 {s}");
        }
    }

    #[test]
    fn test_采样区耗尽保留已完成部分() {
        // 32 kbps 单声道: 低码率表, 8 个子带, 负载 100 字节
        // 两个子带 15 bit 量化, 每部分 360 bit, 只能完成两部分
        let raw = header_raw(1, 3, false);
        let (header, frame) = build_frame(raw, &[(0, 15, 10, 100), (1, 15, 10, 200)], false);
        assert_eq!(header.frame_size, 104);
        let mut dec = Layer12Decoder::new();
        let mut out = Vec::new();
        let n = dec.decode(&header, &frame, &mut out).unwrap();
        assert_eq!(n, 768);
        assert_eq!(out.len(), 768);
    }

    #[test]
    fn test_位分配区不足为损坏帧() {
        let header = FrameHeader::parse(header_raw(8, 0, false)).unwrap();
        let mut frame = header.raw.to_be_bytes().to_vec();
        frame.push(0xFF);
        let mut dec = Layer12Decoder::new();
        let mut out = Vec::new();
        let err = dec.decode(&header, &frame, &mut out).unwrap_err();
        assert!(err.is_frame_local());
        assert!(out.is_empty());
    }

    #[test]
    fn test_crc_校验() {
        let raw = header_raw(8, 0, true);
        let (header, mut frame) = build_frame(raw, &[(0, 2, 3, 6)], true);
        let mut dec = Layer12Decoder::new();
        dec.set_crc_check(true);
        let mut out = Vec::new();
        assert_eq!(dec.decode(&header, &frame, &mut out).unwrap(), 1152);

        frame[4] ^= 0x55;
        out.clear();
        let err = dec.decode(&header, &frame, &mut out).unwrap_err();
        assert!(matches!(err, YinError::InvalidData(_)));

        // 关闭校验时忽略 CRC
        dec.set_crc_check(false);
        assert_eq!(dec.decode(&header, &frame, &mut out).unwrap(), 1152);
    }

    #[test]
    fn test_sblimit_置零高子带() {
        let (header, frame) = build_frame(header_raw(8, 3, false), &[(20, 3, 3, 6)], false);
        let mut dec = Layer12Decoder::new();
        dec.set_sblimit(8);
        assert_eq!(dec.sblimit(), 8);
        let mut out = Vec::new();
        dec.decode(&header, &frame, &mut out).unwrap();
        assert!(out.iter().all(|&s| s == 0.0));
    }
}
