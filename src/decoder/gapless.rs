//! 首尾裁剪与位置换算.
//!
//! 对外报告的采样位置都扣除了编码器延迟与解码器延迟 (gapless 模式),
//! 内部位置是输出采样率下从流起点开始的原始计数. 两者通过
//! [`Decoder::sample_adjust`] / [`Decoder::sample_unadjust`] 互换.

use log::{debug, warn};

use super::{Decoder, DecoderFlags, StateFlags};

/// Layer III 解码器固有延迟 (采样)
pub(crate) const DECODER_DELAY: i64 = 529;

/// 裁剪与起止帧状态
#[derive(Debug, Clone)]
pub(crate) struct Gapless {
    /// 信息帧声明的帧数, 未知为 -1
    pub frames: i64,
    /// 原生采样下的起点与终点, 终点未知为 -1
    pub begin_s: i64,
    pub end_s: i64,
    /// 输出采样下的起点、终点与全长, 终点未知为 -1
    pub begin_os: i64,
    pub end_os: i64,
    pub fullend_os: i64,
    /// 第一个输出帧与帧内跳过的采样数
    pub firstframe: i64,
    pub firstoff: i64,
    /// 最后一个输出帧与帧内保留的采样数, -1 表示不裁尾
    pub lastframe: i64,
    pub lastoff: i64,
    /// 从这一帧开始预解码
    pub ignoreframe: i64,
    /// 编码器延迟与尾部填充, 未知为 -1
    pub enc_delay: i64,
    pub enc_padding: i64,
}

impl Default for Gapless {
    fn default() -> Self {
        Self {
            frames: -1,
            begin_s: 0,
            end_s: -1,
            begin_os: 0,
            end_os: -1,
            fullend_os: 0,
            firstframe: 0,
            firstoff: 0,
            lastframe: -1,
            lastoff: 0,
            ignoreframe: 0,
            enc_delay: -1,
            enc_padding: -1,
        }
    }
}

impl Decoder {
    /// 当前帧的每帧原生采样数
    pub(crate) fn native_spf(&self) -> i64 {
        self.header
            .map_or(self.spf as i64, |h| h.samples_per_frame as i64)
    }

    fn gapless_enabled(&self) -> bool {
        self.params.flags.contains(DecoderFlags::GAPLESS)
    }

    /// 帧 `frame` 之前的输出采样总数
    pub(crate) fn frame_outs(&self, frame: i64) -> i64 {
        match &self.ntom {
            Some(nt) => nt.frame_outs(frame),
            None => self.native_spf() * frame,
        }
    }

    /// 原生采样数换算为输出采样数
    pub(crate) fn ins_to_outs(&self, ins: i64) -> i64 {
        match &self.ntom {
            Some(nt) => nt.ins_to_outs(ins),
            None => ins,
        }
    }

    /// 包含输出采样 `outs` 的帧号
    pub(crate) fn frame_offset(&self, outs: i64) -> i64 {
        match &self.ntom {
            Some(nt) => nt.frame_offset(outs),
            None => {
                let spf = self.native_spf();
                if spf > 0 { outs / spf } else { 0 }
            }
        }
    }

    /// 内部位置换算为对外位置
    ///
    /// 尾部填充区间内的位置都折算到曲目终点, 其后的位置扣除整段填充.
    pub(crate) fn sample_adjust(&self, x: i64) -> i64 {
        if !self.gapless_enabled() {
            return x;
        }
        let g = &self.gapless;
        if g.end_os < 0 {
            return x - g.begin_os;
        }
        if x > g.end_os {
            if x < g.fullend_os {
                g.end_os - g.begin_os
            } else {
                x - (g.fullend_os - g.end_os + g.begin_os)
            }
        } else {
            x - g.begin_os
        }
    }

    /// 对外位置换算为内部位置
    pub(crate) fn sample_unadjust(&self, x: i64) -> i64 {
        if !self.gapless_enabled() {
            return x;
        }
        let g = &self.gapless;
        let mut s = x + g.begin_os;
        if g.end_os >= 0 && s >= g.end_os {
            s += g.fullend_os - g.end_os;
        }
        s
    }

    /// 按信息帧设置裁剪范围 (原生采样)
    pub(crate) fn gapless_init(&mut self, frames: i64, enc_delay: i64, enc_padding: i64) {
        let spf = self.native_spf();
        let g = &mut self.gapless;
        g.frames = frames;
        if frames > 0 && enc_delay >= 0 && enc_padding >= 0 {
            g.begin_s = enc_delay + DECODER_DELAY;
            g.end_s = (frames * spf - enc_padding + DECODER_DELAY).max(0);
        } else {
            g.begin_s = 0;
            g.end_s = -1;
        }
        g.begin_os = 0;
        g.end_os = -1;
        g.fullend_os = 0;
        debug!(
            "gapless: frames={frames}, begin_s={}, end_s={}",
            g.begin_s, g.end_s
        );
    }

    /// 输出格式确定后把裁剪范围换算到输出采样
    pub(crate) fn gapless_realinit(&mut self) {
        let begin_os = self.ins_to_outs(self.gapless.begin_s);
        let end_os = match self.gapless.end_s {
            s if s >= 0 => self.ins_to_outs(s),
            _ => -1,
        };
        let fullend_os = if self.gapless.frames > 0 {
            self.ins_to_outs(self.gapless.frames * self.native_spf())
        } else {
            0
        };
        let g = &mut self.gapless;
        g.begin_os = begin_os;
        g.end_os = end_os;
        g.fullend_os = fullend_os;
    }

    /// 扫描得到实际长度后校正声明的帧数
    pub(crate) fn gapless_update(&mut self, total_samples: i64) {
        if self.gapless.frames < 1 {
            return;
        }
        let announced = self.gapless.frames * self.native_spf();
        if announced > total_samples {
            if self.params.noisy() {
                warn!(
                    "信息帧声明 {announced} 个采样, 实际只有 {total_samples} 个, 停用 gapless 裁剪"
                );
            }
            self.gapless_init(-1, 0, 0);
            self.gapless_realinit();
            self.gapless.lastframe = -1;
            self.gapless.lastoff = 0;
        }
    }

    /// 按当前层与预解码帧数重算 `ignoreframe`
    pub(crate) fn update_ignoreframe(&mut self) {
        let layer = self.header.map_or(0, |h| h.layer);
        let mut preshift = self.params.preframes;
        if layer == 3 && preshift < 1 {
            preshift = 1;
        }
        if layer != 3 && preshift > 2 {
            preshift = 2;
        }
        self.gapless.ignoreframe = self.gapless.firstframe - preshift;
    }

    /// seek 帧号: 从这一帧开始读取
    pub(crate) fn seek_frame_target(&self) -> i64 {
        self.gapless.ignoreframe.max(0)
    }

    /// 以帧为单位设置起点, gapless 模式下同时确定首尾裁剪
    pub(crate) fn set_frameseek(&mut self, fe: i64) {
        self.gapless.firstframe = fe;
        if self.gapless_enabled() && self.gapless.frames > 0 {
            let beg_f = self.frame_offset(self.gapless.begin_os);
            if fe <= beg_f {
                self.gapless.firstframe = beg_f;
                self.gapless.firstoff = self.gapless.begin_os - self.frame_outs(beg_f);
            } else {
                self.gapless.firstoff = 0;
            }
            if self.gapless.end_os >= 0 {
                let lastframe = self.frame_offset(self.gapless.end_os);
                self.gapless.lastframe = lastframe;
                self.gapless.lastoff = self.gapless.end_os - self.frame_outs(lastframe);
            } else {
                self.gapless.lastframe = -1;
                self.gapless.lastoff = 0;
            }
        } else {
            self.gapless.firstoff = 0;
            self.gapless.lastoff = 0;
            self.gapless.lastframe = -1;
        }
        self.update_ignoreframe();
    }

    /// 以内部采样位置设置起点
    pub(crate) fn set_seek(&mut self, sp: i64) {
        let firstframe = self.frame_offset(sp);
        self.gapless.firstframe = firstframe;
        if let Some(nt) = self.ntom.as_mut() {
            nt.set_for_seek(firstframe);
        }
        self.update_ignoreframe();
        self.gapless.firstoff = sp - self.frame_outs(firstframe);
    }

    /// 对刚解码的帧做首尾裁剪
    pub(crate) fn buffercheck(&mut self) {
        if !self.state.contains(StateFlags::ACCURATE) {
            return;
        }
        let Some(format) = self.format else {
            return;
        };
        let frame_bytes = format.frame_bytes() as i64;
        let g = &self.gapless;
        if g.frames > 0 && self.num >= g.frames {
            return;
        }
        if g.lastframe > -1 && self.num >= g.lastframe {
            let keep = if self.num == g.lastframe {
                g.lastoff * frame_bytes
            } else {
                0
            };
            self.buffer.truncate(keep.max(0) as usize);
        }
        if g.firstoff > 0 && self.num == g.firstframe {
            let skip = (g.firstoff * frame_bytes) as usize;
            self.buffer.skip_front(skip);
            self.gapless.firstoff = 0;
        }
    }
}
