//! N:M 定点重采样.
//!
//! 每个原生采样点累加一次步进 `step = target * NTOM_MUL / native`,
//! 累加器每越过一次 `NTOM_MUL` 就输出一个采样点 (最近邻保持).
//!
//! 累加器在帧与帧之间携带相位. 任意帧起点的相位都可以从第 0 帧逐帧模拟得到,
//! 这使得 seek 之后的输出对齐与顺序解码完全一致.
//! 所有位置换算都按帧迭代, 每步的中间值不超过一帧的贡献.

use log::debug;
use yin_core::{YinError, YinResult};

/// 定点乘数
pub const NTOM_MUL: i64 = 32768;

/// 最大上采样倍数
pub const NTOM_MAX: i64 = 8;

/// 允许的最高采样率 (Hz)
pub const NTOM_MAX_FREQ: u32 = 96000;

/// N:M 重采样器
#[derive(Debug, Clone)]
pub struct NtomResampler {
    native_rate: u32,
    target_rate: u32,
    /// 每帧原生采样数
    spf: i64,
    /// 每个原生采样点的累加步进
    step: i64,
    /// 已提交的累加器 (当前帧起点)
    current: i64,
    /// 当前帧处理后的累加器 (尚未提交)
    pending: i64,
}

impl NtomResampler {
    /// 配置重采样器, 并把累加器定位到 `frame` 的起点
    pub fn configure(native_rate: u32, target_rate: u32, spf: usize, frame: i64) -> YinResult<Self> {
        if native_rate == 0
            || target_rate == 0
            || native_rate > NTOM_MAX_FREQ
            || target_rate > NTOM_MAX_FREQ
        {
            return Err(YinError::BadRate(format!(
                "NtoM 采样率超出范围: {native_rate} -> {target_rate}"
            )));
        }
        if spf == 0 {
            return Err(YinError::InvalidArgument("每帧采样数为 0".into()));
        }

        let step = i64::from(target_rate) * NTOM_MUL / i64::from(native_rate);
        if step > NTOM_MAX * NTOM_MUL {
            return Err(YinError::BadRate(format!(
                "NtoM 比例过大: {native_rate} -> {target_rate} (step={step})"
            )));
        }
        if step < 1 {
            return Err(YinError::BadRate(format!(
                "NtoM 比例过小: {native_rate} -> {target_rate} (step={step})"
            )));
        }

        let mut rs = Self {
            native_rate,
            target_rate,
            spf: spf as i64,
            step,
            current: 0,
            pending: 0,
        };
        rs.set_for_seek(frame);
        debug!(
            "NtoM: {} -> {} Hz, step={}, 起始帧 {}",
            native_rate, target_rate, step, frame
        );
        Ok(rs)
    }

    /// 原生采样率
    pub fn native_rate(&self) -> u32 {
        self.native_rate
    }

    /// 目标采样率
    pub fn target_rate(&self) -> u32 {
        self.target_rate
    }

    /// 累加步进
    pub fn step(&self) -> i64 {
        self.step
    }

    /// 已提交的累加器
    pub fn current(&self) -> i64 {
        self.current
    }

    /// 尚未提交的累加器
    pub fn pending(&self) -> i64 {
        self.pending
    }

    /// 下一帧完整解码后应输出的采样数 (不提交)
    pub fn outsamples_for_next_frame(&self) -> usize {
        ((self.current + self.spf * self.step) / NTOM_MUL) as usize
    }

    /// 一帧最多可能输出的采样数 (用于确定输出缓冲区大小)
    pub fn max_outsamples_per_frame(&self) -> usize {
        ((NTOM_MUL - 1 + self.spf * self.step) / NTOM_MUL + 1) as usize
    }

    /// 计算 `frame` 起点处的累加器
    pub fn value_at_frame(&self, frame: i64) -> i64 {
        let mut ntm = NTOM_MUL >> 1;
        for _ in 0..frame.max(0) {
            ntm += self.spf * self.step;
            ntm -= (ntm / NTOM_MUL) * NTOM_MUL;
        }
        ntm
    }

    /// 把 current 与 pending 同时重置为 `frame` 起点的值
    pub fn set_for_seek(&mut self, frame: i64) {
        let ntm = self.value_at_frame(frame);
        self.current = ntm;
        self.pending = ntm;
    }

    /// 帧 `frame` 之前的输出采样总数
    pub fn frame_outs(&self, frame: i64) -> i64 {
        let mut ntm = NTOM_MUL >> 1;
        let mut soff = 0;
        for _ in 0..frame.max(0) {
            ntm += self.spf * self.step;
            soff += ntm / NTOM_MUL;
            ntm -= (ntm / NTOM_MUL) * NTOM_MUL;
        }
        soff
    }

    /// 原生采样数换算为输出采样数
    pub fn ins_to_outs(&self, ins: i64) -> i64 {
        let mut ntm = NTOM_MUL >> 1;
        let mut soff = 0;
        let mut left = ins;
        while left > 0 {
            let block = left.min(self.spf);
            ntm += block * self.step;
            soff += ntm / NTOM_MUL;
            ntm -= (ntm / NTOM_MUL) * NTOM_MUL;
            left -= block;
        }
        soff
    }

    /// 包含输出采样点 `outs` 的帧号
    pub fn frame_offset(&self, outs: i64) -> i64 {
        if outs <= 0 {
            return 0;
        }
        let mut ntm = NTOM_MUL >> 1;
        let mut soff = outs;
        let mut frame = 0;
        loop {
            ntm += self.spf * self.step;
            let produced = ntm / NTOM_MUL;
            if produced > soff {
                return frame;
            }
            soff -= produced;
            ntm -= produced * NTOM_MUL;
            frame += 1;
        }
    }

    /// 重采样一帧交错数据
    ///
    /// 从 `current` 出发, 结果累加器写入 `pending`; 调用 [`commit`](Self::commit)
    /// 之后才成为下一帧的起点.
    pub fn resample(&mut self, input: &[f32], channels: usize, output: &mut Vec<f32>) {
        let channels = channels.max(1);
        let mut ntm = self.current;
        for frame in input.chunks_exact(channels) {
            ntm += self.step;
            while ntm >= NTOM_MUL {
                output.extend_from_slice(frame);
                ntm -= NTOM_MUL;
            }
        }
        self.pending = ntm;
    }

    /// 重采样单个声道 (非交错)
    ///
    /// 每个声道都从同一个 `current` 出发, 结果相同地写入 `pending`.
    pub fn resample_channel(&mut self, input: &[f32], output: &mut Vec<f32>) {
        self.resample(input, 1, output);
    }

    /// 提交 pending 为新的 current
    pub fn commit(&mut self) {
        self.current = self.pending;
    }
}
