//! 集成测试公共工具: 合成 MPEG-1 Layer II 码流.
//!
//! 只用到两个 3 bit 线性量化的子带, 采样码随帧号和时隙变化,
//! 合成后是非静音、逐帧不同的 PCM, 足以检验定位和重采样的一致性.

#![allow(dead_code)]

use yin::codec::FrameHeader;
use yin::codec::tables::ALLOC_L2_M1;
use yin_core::bitwriter::BitWriter;

/// MPEG-1 Layer II, 128 kbps, 44100 Hz, 立体声, 无 CRC
pub const L2_STEREO_44K: u32 = 0xFFFD_9004;
/// 同上, 48000 Hz
pub const L2_STEREO_48K: u32 = 0xFFFD_9404;
/// MPEG-1 Layer II, 128 kbps, 44100 Hz, 单声道
pub const L2_MONO_44K: u32 = 0xFFFD_90C4;

/// 每帧采样数
pub const SPF: i64 = 1152;

/// 参与编码的子带与位分配码 (都映射到 3 bit 量化)
const ACTIVE: [(usize, u32); 2] = [(0, 2), (3, 3)];

/// 比例因子索引 6 -> 0.5
const SCALE_INDEX: u32 = 6;

/// 构造一帧, `seed` 决定采样码
pub fn layer2_frame(raw: u32, seed: u32) -> Vec<u8> {
    let header = FrameHeader::parse(raw).expect("帧头无效");
    assert_eq!(header.layer, 2);
    assert!(!header.is_lsf());
    let channels = header.channels();
    let per_channel = header.bitrate_kbps / channels;
    assert!(per_channel >= 56, "低码率表未实现");
    let bands = if per_channel >= 96 && header.sample_rate_index != 1 {
        30
    } else {
        27
    };
    let code_of = |sb: usize| ACTIVE.iter().find(|a| a.0 == sb).map_or(0, |a| a.1);

    let mut w = BitWriter::new();
    let mut sb = 0;
    'alloc: for entry in &ALLOC_L2_M1 {
        for _ in 0..entry.count {
            if sb == bands {
                break 'alloc;
            }
            for _ in 0..channels {
                w.write_bits(code_of(sb), entry.width);
            }
            sb += 1;
        }
    }
    // scfsi = 2: 三个部分共用一个比例因子
    for _ in 0..ACTIVE.len() as u32 * channels {
        w.write_bits(2, 2);
    }
    for _ in 0..ACTIVE.len() as u32 * channels {
        w.write_bits(SCALE_INDEX, 6);
    }
    for gr in 0..12u32 {
        for (i, _) in ACTIVE.iter().enumerate() {
            for ch in 0..channels {
                for k in 0..3u32 {
                    let code = (seed * 5 + gr * 3 + k + ch + i as u32 * 2) % 7;
                    w.write_bits(code, 3);
                }
            }
        }
    }
    let payload = w.finish();

    let mut frame = raw.to_be_bytes().to_vec();
    frame.extend_from_slice(&payload);
    assert!(frame.len() <= header.frame_size);
    frame.resize(header.frame_size, 0);
    frame
}

/// `n` 帧连续码流
pub fn layer2_stream(raw: u32, n: u32) -> Vec<u8> {
    (0..n).flat_map(|i| layer2_frame(raw, i)).collect()
}

/// 每帧字节数
pub fn frame_size(raw: u32) -> usize {
    FrameHeader::parse(raw).expect("帧头无效").frame_size
}

/// 一次性读出全部 PCM, 跳过格式通知
pub fn read_all(dec: &mut yin::Decoder) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; 16 * 1024];
    loop {
        let (status, n) = dec.read(&mut buf).expect("解码失败");
        out.extend_from_slice(&buf[..n]);
        if status == yin::DecodeStatus::Done {
            return out;
        }
    }
}
