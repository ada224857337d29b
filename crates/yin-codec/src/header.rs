//! MPEG 音频帧头解析.
//!
//! 帧头结构 (32 位):
//! ```text
//! AAAA AAAA  AAAB BCCD  EEEE FFGH  IIJJ KLMM
//! A = 同步位 (11 bit, 全1)   B = MPEG 版本    C = 层
//! D = CRC 保护 (0 表示有)    E = 比特率索引    F = 采样率索引
//! G = 填充位                H = 私有位        I = 声道模式
//! J = 模式扩展              K = 版权         L = 原始/复制
//! M = 强调
//! ```

use yin_core::{YinError, YinResult};

use crate::tables::{BITRATE_KBPS, SAMPLE_RATES};

/// MPEG 版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MpegVersion {
    /// MPEG-1
    Mpeg1,
    /// MPEG-2 (LSF)
    Mpeg2,
    /// MPEG-2.5
    Mpeg25,
}

impl MpegVersion {
    /// 采样率表行号
    pub(crate) fn table_index(self) -> usize {
        match self {
            Self::Mpeg1 => 0,
            Self::Mpeg2 => 1,
            Self::Mpeg25 => 2,
        }
    }
}

/// 声道模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelMode {
    /// 立体声
    Stereo,
    /// 联合立体声
    JointStereo,
    /// 双声道
    DualChannel,
    /// 单声道
    Mono,
}

/// 帧头变化程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum HeaderChange {
    /// 无变化
    None,
    /// 比特率或声道模式等不影响输出格式的变化
    Minor,
    /// 层、版本、采样率或声道数变化, 需要重新配置解码器
    Format,
}

/// MPEG 音频帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// 原始 32 位帧头
    pub raw: u32,
    /// MPEG 版本
    pub version: MpegVersion,
    /// 层 (1, 2, 3)
    pub layer: u8,
    /// 是否带 CRC 校验字
    pub has_crc: bool,
    /// 比特率索引
    pub bitrate_index: u8,
    /// 比特率 (kbps)
    pub bitrate_kbps: u32,
    /// 采样率索引
    pub sample_rate_index: u8,
    /// 采样率 (Hz)
    pub sample_rate: u32,
    /// 填充位
    pub padding: bool,
    /// 私有位
    pub private: bool,
    /// 声道模式
    pub mode: ChannelMode,
    /// 模式扩展
    pub mode_ext: u8,
    /// 版权位
    pub copyright: bool,
    /// 原始位
    pub original: bool,
    /// 强调
    pub emphasis: u8,
    /// 帧总字节数 (含帧头)
    pub frame_size: usize,
    /// 每帧采样数
    pub samples_per_frame: usize,
}

impl FrameHeader {
    /// 帧头字节数
    pub const SIZE: usize = 4;

    /// 解析 32 位帧头
    ///
    /// 自由格式 (比特率索引 0) 与所有保留值都会被拒绝.
    pub fn parse(raw: u32) -> YinResult<Self> {
        if raw & 0xFFE0_0000 != 0xFFE0_0000 {
            return Err(YinError::InvalidData(format!("帧同步字无效: {raw:#010x}")));
        }

        let version = match (raw >> 19) & 0x3 {
            0 => MpegVersion::Mpeg25,
            2 => MpegVersion::Mpeg2,
            3 => MpegVersion::Mpeg1,
            _ => return Err(YinError::InvalidData("保留的 MPEG 版本".into())),
        };
        let layer = match (raw >> 17) & 0x3 {
            1 => 3,
            2 => 2,
            3 => 1,
            _ => return Err(YinError::InvalidData("保留的层".into())),
        };
        let has_crc = (raw >> 16) & 1 == 0;

        let bitrate_index = ((raw >> 12) & 0xF) as u8;
        if bitrate_index == 0 {
            return Err(YinError::Unsupported("自由格式比特率".into()));
        }
        if bitrate_index == 15 {
            return Err(YinError::InvalidData("保留的比特率索引".into()));
        }
        let sample_rate_index = ((raw >> 10) & 0x3) as u8;
        if sample_rate_index == 3 {
            return Err(YinError::InvalidData("保留的采样率索引".into()));
        }

        let lsf = version != MpegVersion::Mpeg1;
        let bitrate_kbps =
            BITRATE_KBPS[usize::from(lsf)][usize::from(layer - 1)][usize::from(bitrate_index)];
        let sample_rate = SAMPLE_RATES[version.table_index()][usize::from(sample_rate_index)];

        let padding = (raw >> 9) & 1 == 1;
        let private = (raw >> 8) & 1 == 1;
        let mode = match (raw >> 6) & 0x3 {
            0 => ChannelMode::Stereo,
            1 => ChannelMode::JointStereo,
            2 => ChannelMode::DualChannel,
            _ => ChannelMode::Mono,
        };
        let mode_ext = ((raw >> 4) & 0x3) as u8;
        let copyright = (raw >> 3) & 1 == 1;
        let original = (raw >> 2) & 1 == 1;
        let emphasis = (raw & 0x3) as u8;

        let bitrate = bitrate_kbps as usize * 1000;
        let rate = sample_rate as usize;
        let pad = usize::from(padding);
        let (frame_size, samples_per_frame) = match layer {
            1 => ((12 * bitrate / rate + pad) * 4, 384),
            2 => (144 * bitrate / rate + pad, 1152),
            _ if lsf => (72 * bitrate / rate + pad, 576),
            _ => (144 * bitrate / rate + pad, 1152),
        };

        Ok(Self {
            raw,
            version,
            layer,
            has_crc,
            bitrate_index,
            bitrate_kbps,
            sample_rate_index,
            sample_rate,
            padding,
            private,
            mode,
            mode_ext,
            copyright,
            original,
            emphasis,
            frame_size,
            samples_per_frame,
        })
    }

    /// 从字节切片前 4 字节解析
    pub fn from_bytes(data: &[u8]) -> YinResult<Self> {
        match data.get(..Self::SIZE) {
            Some(b) => Self::parse(u32::from_be_bytes([b[0], b[1], b[2], b[3]])),
            None => Err(YinError::NeedMoreData),
        }
    }

    /// 快速检查 4 字节是否可能是帧头
    pub fn looks_valid(raw: u32) -> bool {
        raw & 0xFFE0_0000 == 0xFFE0_0000
            && (raw >> 19) & 0x3 != 1
            && (raw >> 17) & 0x3 != 0
            && (raw >> 12) & 0xF != 0
            && (raw >> 12) & 0xF != 15
            && (raw >> 10) & 0x3 != 3
    }

    /// 声道数
    pub fn channels(&self) -> u32 {
        if self.mode == ChannelMode::Mono { 1 } else { 2 }
    }

    /// 是否为低采样率扩展 (MPEG-2 / 2.5)
    pub fn is_lsf(&self) -> bool {
        self.version != MpegVersion::Mpeg1
    }

    /// 帧头之后的负载起点 (跳过 CRC 校验字)
    pub fn payload_offset(&self) -> usize {
        Self::SIZE + if self.has_crc { 2 } else { 0 }
    }

    /// Layer III 侧信息字节数
    pub fn side_info_size(&self) -> usize {
        match (self.is_lsf(), self.mode == ChannelMode::Mono) {
            (false, true) => 17,
            (false, false) => 32,
            (true, true) => 9,
            (true, false) => 17,
        }
    }

    /// 与上一帧帧头相比的变化程度
    pub fn change_from(&self, prev: &FrameHeader) -> HeaderChange {
        if self.layer != prev.layer
            || self.version != prev.version
            || self.sample_rate != prev.sample_rate
            || self.channels() != prev.channels()
        {
            HeaderChange::Format
        } else if self.bitrate_index != prev.bitrate_index
            || self.mode != prev.mode
            || self.mode_ext != prev.mode_ext
        {
            HeaderChange::Minor
        } else {
            HeaderChange::None
        }
    }

    /// 帧时长 (秒)
    pub fn duration_secs(&self) -> f64 {
        self.samples_per_frame as f64 / f64::from(self.sample_rate)
    }
}
