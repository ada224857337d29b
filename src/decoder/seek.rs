//! 定位与位置查询.
//!
//! 采样级 seek 先定位到目标帧之前 `preframes` 帧, 预解码这些帧以恢复
//! 合成滤波器与比特储备的状态, 再在目标帧内丢弃多余采样.
//! 这样 seek 之后的输出与从头顺序解码逐字节一致.

use log::debug;
use yin_codec::HeaderChange;
use yin_core::{WideOff, Whence, YinError, YinResult};
use yin_format::IndexSnapshot;

use super::{Decoder, DecoderFlags};

impl Decoder {
    /// 已缓冲但尚未交给调用方的采样数
    fn buffered_samples(&self) -> i64 {
        match self.format {
            Some(f) if f.frame_bytes() > 0 => (self.buffer.fill() / f.frame_bytes()) as i64,
            _ => 0,
        }
    }

    /// 下一个交给调用方的采样位置 (已扣除 gapless 延迟)
    pub fn tell(&self) -> WideOff {
        if !self.track_ready {
            return 0;
        }
        let g = &self.gapless;
        let outs = if self.num < g.firstframe || (self.num == g.firstframe && self.to_decode) {
            self.frame_outs(g.firstframe) + g.firstoff
        } else if self.to_decode {
            self.frame_outs(self.num) - self.buffered_samples()
        } else {
            self.frame_outs(self.num + 1) - self.buffered_samples()
        };
        self.sample_adjust(outs).max(0)
    }

    /// 下一个输出的帧号
    pub fn tell_frame(&self) -> WideOff {
        if self.num < self.gapless.firstframe {
            self.gapless.firstframe
        } else if self.to_decode || self.buffer.fill() > 0 {
            self.num
        } else {
            self.num + 1
        }
    }

    /// 输入流的读取位置 (字节)
    pub fn tell_stream(&self) -> YinResult<WideOff> {
        self.io
            .as_ref()
            .map(|io| io.tell())
            .ok_or(YinError::NoStream)
    }

    /// 按 seek 目标计算对外位置
    fn seek_target(&mut self, sample: WideOff, whence: Whence, pos: WideOff) -> YinResult<WideOff> {
        Ok(match whence {
            Whence::Set => sample,
            Whence::Cur => pos + sample,
            Whence::End => {
                // 偏移总是指向末尾之前
                let back = if sample > 0 { -sample } else { sample };
                let seekable = self.io.as_ref().is_some_and(|io| io.is_seekable());
                if self.track_frames < 1 && seekable {
                    self.scan()?;
                }
                if self.track_frames > 0 {
                    self.sample_adjust(self.frame_outs(self.track_frames)) + back
                } else if self.gapless.end_os >= 0 {
                    self.sample_adjust(self.gapless.end_os) + back
                } else {
                    return Err(YinError::NoSeekFromEnd);
                }
            }
        })
    }

    /// 采样级 seek, 返回新的 [`tell`](Self::tell) 位置
    pub fn seek(&mut self, sample: WideOff, whence: Whence) -> YinResult<WideOff> {
        if self.io.is_none() {
            return Err(if whence == Whence::Cur {
                YinError::NoRelativeSeek
            } else {
                YinError::NoStream
            });
        }
        let pos = self.tell();
        self.init_track()?;
        let target = self.seek_target(sample, whence, pos)?.max(0);
        debug!("seek: {sample} ({whence:?}) -> 采样 {target}");
        let internal = self.sample_unadjust(target);
        self.set_seek(internal);
        self.do_the_seek()?;
        Ok(self.tell())
    }

    /// 推送模式 seek
    ///
    /// 返回 (新位置, 输入偏移). 调用方应丢弃已准备的数据, 从输入偏移处继续推送.
    pub fn feed_seek(&mut self, sample: WideOff, whence: Whence) -> YinResult<(WideOff, WideOff)> {
        let io = self.io.as_ref().ok_or(YinError::NoStream)?;
        if !io.is_feed() {
            return Err(YinError::Unsupported("feed_seek 只用于推送模式".into()));
        }
        let pos = self.tell();
        self.init_track()?;
        let target = match whence {
            Whence::Set => sample,
            Whence::Cur => pos + sample,
            Whence::End => {
                if self.track_frames > 0 {
                    self.sample_adjust(self.frame_outs(self.track_frames)) - sample
                } else if self.gapless.end_os >= 0 {
                    self.sample_adjust(self.gapless.end_os) - sample
                } else {
                    return Err(YinError::NoSeekFromEnd);
                }
            }
        }
        .max(0);
        let internal = self.sample_unadjust(target);
        self.set_seek(internal);
        let fnum = self.seek_frame_target();
        self.buffer.clear();

        let mut input_offset = self.io_mut()?.buffered_end();
        if self.num < self.gapless.firstframe {
            self.to_decode = false;
        }
        let shortcut = (self.num == fnum && self.to_decode) || self.num == fnum - 1;
        if !shortcut {
            let (entry, offset) = self.index.find(fnum, self.audio_start);
            input_offset = self.io_mut()?.feed_set_pos(offset);
            self.num = entry - 1;
            self.to_decode = false;
            self.to_ignore = false;
            self.frame_buffers_reset();
            debug!("feed_seek: 帧 {fnum}, 从帧 {entry} 的偏移 {offset} 重新推送");
        }
        Ok((self.tell(), input_offset))
    }

    /// 帧级 seek, 返回新的 [`tell_frame`](Self::tell_frame) 位置
    ///
    /// `Cur` 相对于最近读取的帧号. 目标不按已知帧数截断, 流可能比声明的更长.
    pub fn seek_frame(&mut self, offset: WideOff, whence: Whence) -> YinResult<WideOff> {
        self.init_track()?;
        let target = match whence {
            Whence::Set => offset,
            Whence::Cur => self.num + offset,
            Whence::End => {
                if self.track_frames > 0 {
                    self.track_frames - offset
                } else {
                    return Err(YinError::NoSeekFromEnd);
                }
            }
        }
        .max(0);
        self.set_frameseek(target);
        self.do_the_seek()?;
        Ok(self.tell_frame())
    }

    /// 按 `firstframe`/`ignoreframe` 定位读取器
    fn do_the_seek(&mut self) -> YinResult<()> {
        let fnum = self.seek_frame_target();
        self.buffer.clear();
        if self.num < self.gapless.firstframe {
            self.to_decode = false;
            // 仍在预解码区间内, 顺序读下去即可
            if self.num > fnum {
                return Ok(());
            }
        }
        if self.num == fnum && (self.to_decode || fnum < self.gapless.firstframe) {
            return Ok(());
        }
        if self.num == fnum - 1 {
            self.to_decode = false;
            return Ok(());
        }

        self.frame_buffers_reset();
        if let Some(nt) = self.ntom.as_mut() {
            nt.set_for_seek(fnum);
        }
        self.seek_to_frame(fnum)?;
        if self.header_change == HeaderChange::Format {
            self.header_change = HeaderChange::None;
            self.decode_update()?;
        }
        if self.num < self.gapless.firstframe {
            self.to_decode = false;
        }
        self.playnum = self.num;
        Ok(())
    }

    /// 把读取器定位到帧 `fnum` (读完该帧)
    ///
    /// 可定位的流先按索引跳到最近的已知帧再向前读; 不可定位的流只能向前读.
    /// 目标超出流末尾时停在最后一帧.
    pub(crate) fn seek_to_frame(&mut self, fnum: i64) -> YinResult<()> {
        let io = self.io.as_mut().ok_or(YinError::NoStream)?;
        if io.is_seekable() {
            let (entry, offset) = self.index.find(fnum, self.audio_start);
            if !(self.num >= entry && self.num < fnum) {
                io.seek(offset, Whence::Set)?;
                self.num = entry - 1;
                debug!("定位到帧 {entry} (偏移 {offset}), 目标帧 {fnum}");
            }
        } else if fnum < self.num {
            return Err(YinError::NoSeek);
        } else if fnum == self.num {
            self.to_decode = true;
            self.to_ignore = true;
            return Ok(());
        }
        while self.num < fnum {
            if !self.read_frame()? {
                debug!("目标帧 {fnum} 超出流末尾, 停在帧 {}", self.num);
                break;
            }
        }
        Ok(())
    }

    /// 扫描整个流, 得到精确长度
    ///
    /// 只用于可定位的流. 扫描后回到原来的位置, 返回对外的总采样数.
    pub fn scan(&mut self) -> YinResult<WideOff> {
        let seekable = self
            .io
            .as_ref()
            .ok_or(YinError::NoStream)?
            .is_seekable();
        if !seekable {
            return Err(YinError::NoSeek);
        }
        match self.init_track() {
            Ok(()) => {}
            Err(YinError::Eof) => return Ok(0),
            Err(e) => return Err(e),
        }
        let oldpos = self.tell();
        self.seek_to_frame(0)?;
        if self.num != 0 {
            return Err(YinError::Internal(format!("扫描无法回到第 0 帧 (当前 {})", self.num)));
        }
        let mut frames: i64 = 1;
        let mut samples = self.native_spf();
        while self.read_frame()? {
            frames += 1;
            samples += self.native_spf();
        }
        debug!("扫描完成: {frames} 帧, {samples} 个原生采样");
        self.track_frames = frames;
        self.track_samples = samples;
        if self.params.flags.contains(DecoderFlags::GAPLESS) {
            self.gapless_update(samples);
        }
        self.seek(oldpos, Whence::Set)?;
        self.length()
    }

    fn stream_size(&self) -> Option<WideOff> {
        self.io.as_ref().and_then(|io| io.size())
    }

    fn bytes_per_frame(&self) -> f64 {
        if self.mean_framesize > 0.0 {
            self.mean_framesize
        } else {
            self.header.map_or(0.0, |h| h.frame_size as f64)
        }
    }

    /// 对外的总采样数
    ///
    /// 扫描过或有信息帧时精确; 否则按流长度与平均帧长估计; 都不可用时为已读帧数.
    pub fn length(&mut self) -> YinResult<WideOff> {
        self.init_track()?;
        let spf = self.native_spf();
        let bpf = self.bytes_per_frame();
        let ins = if self.track_samples > -1 {
            self.track_samples
        } else if self.track_frames > 0 {
            self.track_frames * spf
        } else {
            match self.stream_size() {
                Some(size) if size > 0 && bpf > 0.0 => {
                    let audio = (size - self.audio_start).max(0);
                    (audio as f64 / bpf * spf as f64) as i64
                }
                Some(0) => return Ok(self.tell()),
                _ => (self.num + 1).max(0) * spf,
            }
        };
        Ok(self.sample_adjust(self.ins_to_outs(ins)))
    }

    /// 总帧数, 规则同 [`length`](Self::length)
    pub fn frame_length(&mut self) -> YinResult<WideOff> {
        self.init_track()?;
        if self.track_frames > 0 {
            return Ok(self.track_frames);
        }
        let bpf = self.bytes_per_frame();
        match self.stream_size() {
            Some(size) if size > 0 && bpf > 0.0 => {
                let audio = (size - self.audio_start).max(0);
                Ok((audio as f64 / bpf + 0.5) as i64)
            }
            _ => Ok((self.num + 1).max(0)),
        }
    }

    /// 声明流总字节数 (用于无法获知长度的来源的长度估计)
    pub fn set_filesize(&mut self, size: WideOff) -> YinResult<()> {
        if size < 0 {
            return Err(YinError::InvalidArgument(format!("流长度不能为负: {size}")));
        }
        self.io_mut()?.set_size(size);
        Ok(())
    }

    /// 导出帧索引
    pub fn index(&self) -> IndexSnapshot {
        self.index.snapshot()
    }

    /// 导入帧索引 (例如上次扫描保存的结果)
    pub fn set_index(&mut self, snapshot: &IndexSnapshot) -> YinResult<()> {
        self.index.restore(snapshot)
    }
}
