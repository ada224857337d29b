//! MPEG 音频静态表.

/// 比特率表 (kbps), 按 [lsf][layer - 1][bitrate_index] 索引
pub const BITRATE_KBPS: [[[u32; 16]; 3]; 2] = [
    [
        [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0],
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0],
        [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0],
    ],
    [
        [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
        [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0],
    ],
];

/// 采样率表 [version][sr_index]
pub const SAMPLE_RATES: [[u32; 3]; 3] = [
    [44100, 48000, 32000], // MPEG-1
    [22050, 24000, 16000], // MPEG-2
    [11025, 12000, 8000],  // MPEG-2.5
];

/// 子带位分配描述
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubbandAlloc {
    /// 在 [`BITALLOC_CODE_TAB`] 中的起始偏移
    pub tab_offset: usize,
    /// 位分配字段宽度 (bit)
    pub width: u32,
    /// 使用该描述的连续子带数
    pub count: usize,
}

const fn alloc(tab_offset: usize, width: u32, count: usize) -> SubbandAlloc {
    SubbandAlloc {
        tab_offset,
        width,
        count,
    }
}

/// Layer I: 32 个子带, 4 bit 位分配
pub const ALLOC_L1: [SubbandAlloc; 1] = [alloc(76, 4, 32)];

/// Layer II, MPEG-2/2.5 低采样率表
pub const ALLOC_L2_LSF: [SubbandAlloc; 3] = [alloc(60, 4, 4), alloc(44, 3, 7), alloc(44, 2, 19)];

/// Layer II, MPEG-1 表 (27 或 30 子带)
pub const ALLOC_L2_M1: [SubbandAlloc; 4] = [
    alloc(0, 4, 3),
    alloc(16, 4, 8),
    alloc(32, 3, 12),
    alloc(40, 2, 7),
];

/// Layer II, MPEG-1 低码率表 (每声道低于 56 kbps)
pub const ALLOC_L2_M1_LOWRATE: [SubbandAlloc; 2] = [alloc(44, 4, 2), alloc(44, 3, 10)];

/// 位分配码到量化类别的映射
///
/// 0 表示不分配; 17/18/19 表示 3/5/9 级分组量化;
/// 其余值 n 表示 n bit 线性量化 (2^n - 1 级).
pub const BITALLOC_CODE_TAB: [u8; 92] = [
    0, 17, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16, //
    0, 17, 18, 3, 19, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 16, //
    0, 17, 18, 3, 19, 4, 5, 16, //
    0, 17, 18, 16, //
    0, 17, 18, 19, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, //
    0, 17, 18, 3, 19, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, //
    0, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
];

/// 量化类别对应的量化级数
pub fn quant_levels(class: u8) -> u32 {
    match class {
        17 => 3,
        18 => 5,
        19 => 9,
        n => (1u32 << n) - 1,
    }
}

/// 分组量化码字的位宽
pub fn grouped_code_bits(class: u8) -> Option<u32> {
    match class {
        17 => Some(5),
        18 => Some(7),
        19 => Some(10),
        _ => None,
    }
}

/// 比例因子索引对应的乘数: 2^(1 - idx/3)
pub fn scale_factor(idx: u8) -> f32 {
    2.0f32.powf(1.0 - f32::from(idx) / 3.0)
}
