//! 解码参数.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use yin_core::{Encoding, YinError, YinResult};
use yin_resample::{MonoMix, NTOM_MAX_FREQ};

bitflags! {
    /// 解码行为标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DecoderFlags: u32 {
        /// 按编码器延迟/填充裁剪首尾 (gapless)
        const GAPLESS = 0x0001;
        /// 不输出警告日志
        const QUIET = 0x0002;
        /// 强制单声道, 只取左声道
        const FORCE_MONO_LEFT = 0x0004;
        /// 强制单声道, 只取右声道
        const FORCE_MONO_RIGHT = 0x0008;
        /// 强制单声道, 左右混合
        const FORCE_MONO_MIX = 0x0010;
        /// 强制立体声输出
        const FORCE_STEREO = 0x0020;
        /// 在信息帧声明的帧数处结束, 不读取追加的帧
        const NO_FRANKENSTEIN = 0x0040;
        /// 校验 Layer I/II 帧的 CRC
        const CHECK_CRC = 0x0080;
        /// 不解析 Xing/Info/VBRI 信息帧, 当作普通帧解码
        const IGNORE_INFOFRAME = 0x0100;
    }
}

impl DecoderFlags {
    /// 任意一种强制单声道
    pub const FORCE_MONO: Self = Self::FORCE_MONO_LEFT
        .union(Self::FORCE_MONO_RIGHT)
        .union(Self::FORCE_MONO_MIX);

    /// 强制单声道时的声道取舍
    pub fn mono_mix(&self) -> Option<MonoMix> {
        if self.contains(Self::FORCE_MONO_MIX) {
            Some(MonoMix::Mix)
        } else if self.contains(Self::FORCE_MONO_RIGHT) {
            Some(MonoMix::Right)
        } else if self.contains(Self::FORCE_MONO_LEFT) {
            Some(MonoMix::Left)
        } else {
            None
        }
    }
}

impl Default for DecoderFlags {
    fn default() -> Self {
        Self::GAPLESS
    }
}

mod flag_bits {
    use super::DecoderFlags;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(flags: &DecoderFlags, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u32(flags.bits())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DecoderFlags, D::Error> {
        Ok(DecoderFlags::from_bits_truncate(u32::deserialize(d)?))
    }
}

/// 解码参数
///
/// 可从配置文件反序列化, 缺省字段取默认值.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecoderParams {
    #[serde(with = "flag_bits", default)]
    pub flags: DecoderFlags,
    /// 强制输出采样率, 0 表示不强制
    #[serde(default)]
    pub force_rate: u32,
    /// 降采样: 0 原速, 1 一半, 2 四分之一 (`force_rate` 优先)
    #[serde(default)]
    pub down_sample: u8,
    /// 强制输出声道数, 0 表示跟随码流
    #[serde(default)]
    pub force_channels: u32,
    #[serde(default = "default_encoding")]
    pub encoding: Encoding,
    /// 输出增益
    #[serde(default = "default_outscale")]
    pub outscale: f64,
    /// 重同步时最多跳过的字节数, 负数表示不限
    #[serde(default = "default_resync_limit")]
    pub resync_limit: i64,
    /// 帧索引容量, 负数表示满后按其绝对值扩容而非折叠
    #[serde(default = "default_index_size")]
    pub index_size: i64,
    /// seek 后在目标帧之前预解码的帧数
    #[serde(default = "default_preframes")]
    pub preframes: i64,
    /// 每帧重复输出的次数 (慢放), 0 关闭
    #[serde(default)]
    pub halfspeed: u32,
    /// 每 N 帧只播放一帧 (快放), 0 关闭
    #[serde(default)]
    pub doublespeed: u32,
    /// 网络读取超时 (秒), 0 表示不设超时
    #[serde(default)]
    pub timeout: u64,
}

fn default_encoding() -> Encoding {
    Encoding::S16
}

fn default_outscale() -> f64 {
    1.0
}

fn default_resync_limit() -> i64 {
    1024
}

fn default_index_size() -> i64 {
    1000
}

fn default_preframes() -> i64 {
    4
}

impl Default for DecoderParams {
    fn default() -> Self {
        Self {
            flags: DecoderFlags::default(),
            force_rate: 0,
            down_sample: 0,
            force_channels: 0,
            encoding: default_encoding(),
            outscale: default_outscale(),
            resync_limit: default_resync_limit(),
            index_size: default_index_size(),
            preframes: default_preframes(),
            halfspeed: 0,
            doublespeed: 0,
            timeout: 0,
        }
    }
}

impl DecoderParams {
    /// 校验参数, 报告第一个无效字段
    pub fn validate(&self) -> YinResult<()> {
        if self.force_rate > NTOM_MAX_FREQ {
            return Err(YinError::BadRate(format!(
                "强制采样率 {} 超过上限 {NTOM_MAX_FREQ}",
                self.force_rate
            )));
        }
        if self.down_sample > 2 {
            return Err(YinError::BadParam(format!(
                "down_sample 只能为 0/1/2, 实际 {}",
                self.down_sample
            )));
        }
        if self.force_channels > 2 {
            return Err(YinError::BadChannels(self.force_channels));
        }
        let mono = self.flags.intersects(DecoderFlags::FORCE_MONO);
        if mono && self.flags.contains(DecoderFlags::FORCE_STEREO) {
            return Err(YinError::BadParam("不能同时强制单声道与立体声".into()));
        }
        let stereo = self.flags.contains(DecoderFlags::FORCE_STEREO);
        if (mono && self.force_channels == 2) || (stereo && self.force_channels == 1) {
            return Err(YinError::BadChannels(self.force_channels));
        }
        if !self.outscale.is_finite() || self.outscale < 0.0 {
            return Err(YinError::BadParam(format!("无效增益: {}", self.outscale)));
        }
        if self.preframes < 0 {
            return Err(YinError::BadParam(format!("preframes 不能为负: {}", self.preframes)));
        }
        Ok(())
    }

    /// 请求的输出声道数, `None` 表示跟随码流
    pub fn requested_channels(&self) -> Option<u32> {
        if self.flags.intersects(DecoderFlags::FORCE_MONO) {
            Some(1)
        } else if self.flags.contains(DecoderFlags::FORCE_STEREO) {
            Some(2)
        } else if self.force_channels > 0 {
            Some(self.force_channels)
        } else {
            None
        }
    }

    /// 帧索引 (容量, 扩容步长)
    pub fn index_layout(&self) -> (usize, usize) {
        if self.index_size < 0 {
            let grow = self.index_size.unsigned_abs() as usize;
            (grow, grow)
        } else {
            (self.index_size as usize, 0)
        }
    }

    /// 是否输出警告
    pub(crate) fn noisy(&self) -> bool {
        !self.flags.contains(DecoderFlags::QUIET)
    }
}

/// 可查询的解码状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateKey {
    /// 位置信息是否精确
    Accurate,
    /// 码流中途是否发生格式相关变化
    Frankenstein,
    /// 推送模式下缓冲的输入字节数
    BufferFill,
    /// 解码器自上次查询以来是否重新配置过 (查询后清除)
    FreshDecoder,
    /// 编码器延迟 (采样), 未知为 -1
    EncDelay,
    /// 编码器尾部填充 (采样), 未知为 -1
    EncPadding,
    /// 解码器固有延迟 (采样), 非 Layer III 为 -1
    DecDelay,
}
