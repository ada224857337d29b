//! 解码循环.
//!
//! 状态机: 读取帧 -> (可选) 预解码丢弃 -> 解码到内部缓冲区 -> 交给调用方.
//! 输出格式在第一帧确定, 之后帧头发生格式相关变化时重新协商, 并通过
//! [`DecodeStatus::NewFormat`] 通知调用方.

use log::{debug, trace, warn};
use yin_codec::{HeaderChange, default_backend};
use yin_core::{YinError, YinResult};
use yin_resample::{MonoMix, NTOM_MAX, NtomResampler, encode_samples, remix_channels};

use super::gapless::DECODER_DELAY;
use super::{
    DecodeStatus, Decoder, DecoderFlags, FrameInfo, FrameInfoFlags, OutputFormat, StateFlags,
    StateKey,
};

/// 子带数
const SBLIMIT: u32 = 32;

impl Decoder {
    /// 推送输入数据 (仅推送模式)
    pub fn feed(&mut self, input: &[u8]) -> YinResult<()> {
        self.io_mut()?.feed_data(input)
    }

    /// 推送输入并解码到 `output`
    ///
    /// 一直解码直到 `output` 写满、需要更多输入、流结束或输出格式改变.
    /// 返回状态与写入的字节数; 非 `Ok` 状态下已写入的字节同样有效.
    pub fn decode(&mut self, input: &[u8], output: &mut [u8]) -> YinResult<(DecodeStatus, usize)> {
        if !input.is_empty() {
            self.feed(input)?;
        }
        let mut done = 0;
        loop {
            if self.to_decode {
                if self.decoder_change {
                    self.decode_update()?;
                }
                if self.new_format {
                    self.new_format = false;
                    return Ok((DecodeStatus::NewFormat, done));
                }
                self.decode_the_frame()?;
                self.to_decode = false;
                self.to_ignore = false;
            }
            if self.buffer.fill() > 0 {
                let n = self.buffer.fill().min(output.len() - done);
                output[done..done + n].copy_from_slice(&self.buffer.pending()[..n]);
                self.buffer.consume(n);
                done += n;
                if done == output.len() {
                    return Ok((DecodeStatus::Ok, done));
                }
            } else {
                match self.get_next_frame()? {
                    DecodeStatus::Ok => {}
                    status => return Ok((status, done)),
                }
            }
        }
    }

    /// 解码到 `output`, 不推送输入
    pub fn read(&mut self, output: &mut [u8]) -> YinResult<(DecodeStatus, usize)> {
        self.decode(&[], output)
    }

    /// 解码恰好一帧
    ///
    /// 返回状态、帧号与该帧的 PCM. 非 `Ok` 状态下帧号为 -1, PCM 为空.
    pub fn decode_frame(&mut self) -> YinResult<(DecodeStatus, i64, &[u8])> {
        self.buffer.clear();
        loop {
            if self.to_decode {
                if self.decoder_change {
                    self.decode_update()?;
                }
                if self.new_format {
                    self.new_format = false;
                    return Ok((DecodeStatus::NewFormat, -1, &[]));
                }
                let num = self.num;
                self.decode_the_frame()?;
                self.to_decode = false;
                self.to_ignore = false;
                return Ok((DecodeStatus::Ok, num, self.buffer.pending()));
            }
            match self.get_next_frame()? {
                DecodeStatus::Ok => {}
                status => return Ok((status, -1, &[])),
            }
        }
    }

    /// 逐帧模式: 读取下一帧但不解码
    pub fn frame_by_frame_next(&mut self) -> YinResult<DecodeStatus> {
        self.to_decode = false;
        self.to_ignore = false;
        self.buffer.clear();
        let status = self.get_next_frame()?;
        if status != DecodeStatus::Ok {
            return Ok(status);
        }
        if self.new_format {
            self.new_format = false;
            return Ok(DecodeStatus::NewFormat);
        }
        Ok(DecodeStatus::Ok)
    }

    /// 逐帧模式: 解码 [`frame_by_frame_next`](Self::frame_by_frame_next) 读到的帧
    ///
    /// 没有待解码的帧时返回帧号 -1 与空 PCM.
    pub fn frame_by_frame_decode(&mut self) -> YinResult<(i64, &[u8])> {
        if !self.to_decode {
            return Ok((-1, &[]));
        }
        if self.decoder_change {
            self.decode_update()?;
        }
        let num = self.num;
        self.decode_the_frame()?;
        self.to_decode = false;
        self.to_ignore = false;
        Ok((num, self.buffer.pending()))
    }

    /// 确保已读到第一帧
    pub(crate) fn init_track(&mut self) -> YinResult<()> {
        if self.track_ready {
            return Ok(());
        }
        match self.get_next_frame()? {
            DecodeStatus::Ok | DecodeStatus::NewFormat => Ok(()),
            DecodeStatus::NeedMore => Err(YinError::NeedMoreData),
            DecodeStatus::Done => Err(YinError::Eof),
        }
    }

    /// 前进到下一个需要输出的帧
    pub(crate) fn get_next_frame(&mut self) -> YinResult<DecodeStatus> {
        loop {
            let mut change = false;
            if self.header_change == HeaderChange::Format && self.num >= 0 {
                change = true;
                self.header_change = HeaderChange::None;
                self.decode_update()?;
            }
            loop {
                if self.in_ignore_window() {
                    self.ignore_decode()?;
                }
                self.to_decode = false;
                match self.next_raw_frame() {
                    Ok(true) => {}
                    Ok(false) => {
                        self.track_frames = self.num + 1;
                        debug!("流结束, 共 {} 帧", self.track_frames);
                        return Ok(DecodeStatus::Done);
                    }
                    Err(YinError::NeedMoreData) => return Ok(DecodeStatus::NeedMore),
                    Err(e) => return Err(e),
                }
                if self.header_change == HeaderChange::Format || self.decoder_change {
                    change = true;
                    self.header_change = HeaderChange::None;
                    self.decode_update()?;
                }
                self.playnum += 1;
                let doublespeed = i64::from(self.params.doublespeed);
                let skip_speed = doublespeed > 0 && self.playnum % doublespeed != 0;
                if self.num < self.gapless.firstframe || skip_speed {
                    // 将被预解码的帧不跳过
                    if !self.in_ignore_window() {
                        trace!("跳过帧 {}", self.num);
                    }
                    continue;
                }
                break;
            }

            self.track_ready = true;
            if change && self.fresh {
                self.fresh = false;
                self.gapless_realinit();
                self.set_frameseek(self.num);
                if self.num < self.gapless.firstframe {
                    continue;
                }
            }
            return Ok(DecodeStatus::Ok);
        }
    }

    fn in_ignore_window(&self) -> bool {
        self.to_ignore && self.num < self.gapless.firstframe && self.num >= self.gapless.ignoreframe
    }

    /// 读取原始帧, 慢放时重复上一帧
    fn next_raw_frame(&mut self) -> YinResult<bool> {
        let halfspeed = self.params.halfspeed;
        if halfspeed > 0 && self.halfphase > 0 && !self.frame.is_empty() {
            self.halfphase -= 1;
            self.to_decode = true;
            self.to_ignore = true;
            return Ok(true);
        }
        let ok = self.read_frame()?;
        if ok && halfspeed > 0 {
            self.halfphase = halfspeed - 1;
        }
        Ok(ok)
    }

    /// 解码当前帧以填充解码器状态, 丢弃输出
    fn ignore_decode(&mut self) -> YinResult<()> {
        trace!("预解码帧 {}", self.num);
        if let Err(e) = self.run_layer() {
            if !e.is_frame_local() {
                return Err(e);
            }
        }
        if let Some(nt) = self.ntom.as_mut() {
            nt.set_for_seek(self.num + 1);
        }
        self.to_ignore = false;
        self.to_decode = false;
        Ok(())
    }

    /// 按层解码当前帧到 `self.pcm` (原生采样率, 交错)
    fn run_layer(&mut self) -> YinResult<usize> {
        let header = self
            .header
            .ok_or_else(|| YinError::Internal("没有待解码的帧".into()))?;
        self.pcm.clear();
        if header.layer == 3 {
            let backend = self
                .layer3
                .as_mut()
                .ok_or_else(|| YinError::Unsupported("未启用 Layer III 解码后端".into()))?;
            backend.decode(&header, &self.frame, &mut self.pcm)
        } else {
            self.layer12.decode(&header, &self.frame, &mut self.pcm)
        }
    }

    /// 解码当前帧到输出缓冲区
    ///
    /// 产生的字节数总是等于承诺值; 损坏或不完整的帧用中性值补齐尾部.
    fn decode_the_frame(&mut self) -> YinResult<()> {
        let format = self
            .format
            .ok_or_else(|| YinError::Internal("输出格式尚未确定".into()))?;
        let header = self
            .header
            .ok_or_else(|| YinError::Internal("没有待解码的帧".into()))?;
        let frame_bytes = format.frame_bytes();
        let expected = match &self.ntom {
            Some(nt) => nt.outsamples_for_next_frame(),
            None => header.samples_per_frame,
        };
        let needed = expected * frame_bytes;

        let produced = match self.run_layer() {
            Ok(n) => n,
            Err(e) if e.is_frame_local() => {
                if self.params.noisy() {
                    warn!("帧 {} 损坏, 以静音补齐: {e}", self.num);
                }
                0
            }
            Err(e) => return Err(e),
        };
        let native_ch = header.channels() as usize;
        let out_ch = format.channels as usize;
        self.pcm.truncate(produced * native_ch);

        if native_ch != out_ch {
            self.mixed.clear();
            remix_channels(&self.pcm, native_ch, out_ch, self.mono_mix, &mut self.mixed)?;
            std::mem::swap(&mut self.pcm, &mut self.mixed);
        }
        if let Some(nt) = self.ntom.as_mut() {
            self.resampled.clear();
            nt.resample(&self.pcm, out_ch, &mut self.resampled);
            nt.commit();
            std::mem::swap(&mut self.pcm, &mut self.resampled);
        }

        let encoded = self.pcm.len() * format.encoding.bytes_per_sample();
        let out = self.buffer.prepare(encoded.max(needed));
        self.clip += encode_samples(&self.pcm, format.encoding, self.params.outscale, &mut out[..encoded])?;
        let fill = if encoded < needed {
            format.encoding.fill_neutral(&mut out[encoded..needed]);
            self.padded = needed - encoded;
            if let Some(nt) = self.ntom.as_mut() {
                nt.set_for_seek(self.num + 1);
            }
            debug!("帧 {}: 补齐 {} 字节", self.num, self.padded);
            needed
        } else {
            self.padded = 0;
            encoded
        };
        self.buffer.set_fill(fill);
        self.buffercheck();
        Ok(())
    }

    /// 按当前帧头与参数重新配置解码器
    pub(crate) fn decode_update(&mut self) -> YinResult<()> {
        self.state.remove(StateFlags::DECODER_LIVE);
        if self.num < 0 {
            return Err(YinError::Internal("读到第一帧之前不能配置解码器".into()));
        }
        let header = self
            .header
            .ok_or_else(|| YinError::Internal("没有当前帧头".into()))?;
        self.state.insert(StateFlags::FRESH_DECODER);

        let native = header.sample_rate;
        let rate = if self.params.force_rate > 0 {
            self.params.force_rate
        } else {
            native >> self.params.down_sample
        };
        let channels = self.params.requested_channels().unwrap_or(header.channels());
        let format = OutputFormat {
            rate,
            channels,
            encoding: self.params.encoding,
        };
        if self.format != Some(format) {
            debug!("输出格式: {} Hz, {} 声道, {:?}", rate, channels, format.encoding);
            self.new_format = true;
            self.format = Some(format);
        }

        self.spf = header.samples_per_frame;
        let sblimit = if rate == native {
            self.ntom = None;
            SBLIMIT
        } else {
            let nt = NtomResampler::configure(native, rate, self.spf, self.num)?;
            self.ntom = Some(nt);
            if native > rate {
                (SBLIMIT * rate / native).max(1)
            } else {
                SBLIMIT
            }
        };
        self.layer12.set_sblimit(sblimit as usize);
        self.layer12
            .set_crc_check(self.params.flags.contains(DecoderFlags::CHECK_CRC));

        let samples = self
            .ntom
            .as_ref()
            .map_or(self.spf, NtomResampler::max_outsamples_per_frame);
        self.outblock = samples * format.frame_bytes();
        self.buffer.reserve(self.outblock);

        self.mono_mix = self.params.flags.mono_mix().unwrap_or(MonoMix::Mix);

        if header.layer == 3 && self.layer3.is_none() {
            let backend = default_backend()
                .ok_or_else(|| YinError::Unsupported("未启用 Layer III 解码后端".into()))?;
            debug!("Layer III 后端: {}", backend.name());
            self.layer3 = Some(backend);
        }

        self.decoder_change = false;
        self.state.insert(StateFlags::DECODER_LIVE);
        Ok(())
    }

    /// 清空输出缓冲区与各层解码器的历史状态
    pub(crate) fn frame_buffers_reset(&mut self) {
        self.buffer.clear();
        self.layer12.reset();
        if let Some(backend) = self.layer3.as_mut() {
            backend.reset();
        }
        self.halfphase = 0;
    }

    /// 当前帧信息
    pub fn info(&mut self) -> YinResult<FrameInfo> {
        self.init_track()?;
        let h = self
            .header
            .ok_or_else(|| YinError::Internal("没有当前帧头".into()))?;
        let mut flags = FrameInfoFlags::empty();
        flags.set(FrameInfoFlags::CRC, h.has_crc);
        flags.set(FrameInfoFlags::COPYRIGHT, h.copyright);
        flags.set(FrameInfoFlags::PRIVATE, h.private);
        flags.set(FrameInfoFlags::ORIGINAL, h.original);
        Ok(FrameInfo {
            version: h.version,
            layer: h.layer,
            rate: h.sample_rate,
            mode: h.mode,
            mode_ext: h.mode_ext,
            frame_size: h.frame_size,
            flags,
            emphasis: h.emphasis,
            bitrate: h.bitrate_kbps,
            vbr: self.vbr,
        })
    }

    /// 输出格式
    ///
    /// 必要时先读取第一帧. 调用后不再报告挂起的 `NewFormat`.
    pub fn format(&mut self) -> YinResult<OutputFormat> {
        self.init_track()?;
        self.new_format = false;
        self.format
            .ok_or_else(|| YinError::Internal("输出格式尚未确定".into()))
    }

    /// 查询解码状态
    pub fn state(&mut self, key: StateKey) -> YinResult<i64> {
        Ok(match key {
            StateKey::Accurate => i64::from(self.state.contains(StateFlags::ACCURATE)),
            StateKey::Frankenstein => i64::from(self.state.contains(StateFlags::FRANKENSTEIN)),
            StateKey::BufferFill => self.io.as_ref().map_or(0, |io| io.buffered() as i64),
            StateKey::FreshDecoder => {
                let fresh = self.state.contains(StateFlags::FRESH_DECODER);
                self.state.remove(StateFlags::FRESH_DECODER);
                i64::from(fresh)
            }
            StateKey::EncDelay => self.gapless.enc_delay,
            StateKey::EncPadding => self.gapless.enc_padding,
            StateKey::DecDelay => match self.header {
                Some(h) if h.layer == 3 => DECODER_DELAY,
                _ => -1,
            },
        })
    }

    /// 一帧最多产生的字节数, 格式未确定时为 [`safe_buffer`](Self::safe_buffer)
    pub fn outblock(&self) -> usize {
        if self.outblock > 0 {
            self.outblock
        } else {
            Self::safe_buffer()
        }
    }

    /// 任意格式下一帧输出的上限字节数
    pub const fn safe_buffer() -> usize {
        8 * 2 * 1152 * NTOM_MAX as usize
    }

    /// 每帧时长 (秒)
    pub fn time_per_frame(&mut self) -> YinResult<f64> {
        self.init_track()?;
        let h = self
            .header
            .ok_or_else(|| YinError::Internal("没有当前帧头".into()))?;
        Ok(h.duration_secs())
    }

    /// 给定秒数对应的帧数
    pub fn time_frame(&mut self, seconds: f64) -> YinResult<i64> {
        let tpf = self.time_per_frame()?;
        Ok((seconds / tpf) as i64)
    }

    /// 取出并清零削波计数
    pub fn clip(&mut self) -> usize {
        std::mem::take(&mut self.clip)
    }

    /// 最近一次解码的帧补齐的字节数
    pub fn padded_bytes(&self) -> usize {
        self.padded
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecoderParams;
    use yin_codec::FrameHeader;
    use yin_core::Encoding;

    const L2_HEAD: u32 = 0xFFFD_9004;

    fn silent_frames(n: usize) -> Vec<u8> {
        let size = FrameHeader::parse(L2_HEAD).unwrap().frame_size;
        let mut data = Vec::new();
        for _ in 0..n {
            let start = data.len();
            data.resize(start + size, 0);
            data[start..start + 4].copy_from_slice(&L2_HEAD.to_be_bytes());
        }
        data
    }

    fn open(n: usize, params: DecoderParams) -> Decoder {
        let mut dec = Decoder::with_params(params).unwrap();
        dec.open_memory(silent_frames(n)).unwrap();
        dec
    }

    #[test]
    fn test_先报告新格式() {
        let mut dec = open(4, DecoderParams::default());
        let mut out = vec![0u8; 4096];
        let (status, n) = dec.read(&mut out).unwrap();
        assert_eq!(status, DecodeStatus::NewFormat);
        assert_eq!(n, 0);
        let format = dec.format().unwrap();
        assert_eq!(format.rate, 44100);
        assert_eq!(format.channels, 2);
        assert_eq!(dec.outblock(), 1152 * 4);
        let (status, n) = dec.read(&mut out).unwrap();
        assert_eq!(status, DecodeStatus::Ok);
        assert_eq!(n, 4096);
    }

    #[test]
    fn test_读完全部字节() {
        let mut dec = open(5, DecoderParams::default());
        let mut out = vec![0u8; 1000];
        let mut total = 0;
        loop {
            let (status, n) = dec.read(&mut out).unwrap();
            total += n;
            if status == DecodeStatus::Done {
                break;
            }
        }
        assert_eq!(total, 5 * 1152 * 4);
        assert_eq!(dec.track_frames, 5);
    }

    #[test]
    fn test_零长度输出() {
        let mut dec = open(2, DecoderParams::default());
        dec.format().unwrap();
        let (status, n) = dec.read(&mut []).unwrap();
        assert_eq!(status, DecodeStatus::Ok);
        assert_eq!(n, 0);
        assert_eq!(dec.buffer.fill(), 1152 * 4);
    }

    #[test]
    fn test_逐帧解码() {
        let mut dec = open(3, DecoderParams::default());
        assert_eq!(dec.frame_by_frame_next().unwrap(), DecodeStatus::NewFormat);
        let (num, pcm) = dec.frame_by_frame_decode().unwrap();
        assert_eq!(num, 0);
        assert_eq!(pcm.len(), 1152 * 4);
        assert_eq!(dec.frame_by_frame_next().unwrap(), DecodeStatus::Ok);
        assert_eq!(dec.frame_by_frame_decode().unwrap().0, 1);
        let (num, pcm) = dec.frame_by_frame_decode().unwrap();
        assert_eq!(num, -1);
        assert!(pcm.is_empty());
    }

    #[test]
    fn test_单帧解码() {
        let mut dec = open(2, DecoderParams::default());
        let (status, _, _) = dec.decode_frame().unwrap();
        assert_eq!(status, DecodeStatus::NewFormat);
        let (status, num, pcm) = dec.decode_frame().unwrap();
        assert_eq!(status, DecodeStatus::Ok);
        assert_eq!(num, 0);
        assert!(pcm.iter().all(|&b| b == 0));
        assert_eq!(dec.decode_frame().unwrap().1, 1);
        assert_eq!(dec.decode_frame().unwrap().0, DecodeStatus::Done);
    }

    #[test]
    fn test_强制单声道与浮点() {
        let params = DecoderParams {
            flags: DecoderFlags::FORCE_MONO_MIX,
            encoding: Encoding::F32,
            ..Default::default()
        };
        let mut dec = open(1, params);
        let format = dec.format().unwrap();
        assert_eq!(format.channels, 1);
        let (_, _, pcm) = dec.decode_frame().unwrap();
        assert_eq!(pcm.len(), 1152 * 4);
    }

    #[test]
    fn test_降采样() {
        let params = DecoderParams {
            down_sample: 1,
            ..Default::default()
        };
        let mut dec = open(3, params);
        let format = dec.format().unwrap();
        assert_eq!(format.rate, 22050);
        assert_eq!(dec.layer12.sblimit(), 16);
        let (_, _, pcm) = dec.decode_frame().unwrap();
        assert_eq!(pcm.len(), 576 * 4);
    }

    #[test]
    fn test_快放跳帧() {
        let params = DecoderParams {
            doublespeed: 2,
            ..Default::default()
        };
        let mut dec = open(6, params);
        dec.format().unwrap();
        let mut frames = Vec::new();
        loop {
            let (status, num, _) = dec.decode_frame().unwrap();
            match status {
                DecodeStatus::Ok => frames.push(num),
                DecodeStatus::Done => break,
                _ => {}
            }
        }
        assert_eq!(frames, vec![1, 3, 5]);
    }

    #[test]
    fn test_慢放重复() {
        let params = DecoderParams {
            halfspeed: 2,
            ..Default::default()
        };
        let mut dec = open(2, params);
        dec.format().unwrap();
        let mut frames = Vec::new();
        loop {
            let (status, num, _) = dec.decode_frame().unwrap();
            match status {
                DecodeStatus::Ok => frames.push(num),
                DecodeStatus::Done => break,
                _ => {}
            }
        }
        assert_eq!(frames, vec![0, 0, 1, 1]);
    }

    #[test]
    fn test_状态查询() {
        let mut dec = open(2, DecoderParams::default());
        dec.format().unwrap();
        assert_eq!(dec.state(StateKey::Accurate).unwrap(), 1);
        assert_eq!(dec.state(StateKey::Frankenstein).unwrap(), 0);
        assert_eq!(dec.state(StateKey::FreshDecoder).unwrap(), 1);
        assert_eq!(dec.state(StateKey::FreshDecoder).unwrap(), 0);
        assert_eq!(dec.state(StateKey::EncDelay).unwrap(), -1);
        assert_eq!(dec.state(StateKey::DecDelay).unwrap(), -1);
        let info = dec.info().unwrap();
        assert_eq!(info.layer, 2);
        assert_eq!(info.bitrate, 128);
        assert!(info.flags.contains(FrameInfoFlags::ORIGINAL));
        assert!((dec.time_per_frame().unwrap() - 1152.0 / 44100.0).abs() < 1e-12);
        assert_eq!(dec.time_frame(1.0).unwrap(), 38);
    }

    #[test]
    fn test_空流() {
        let mut dec = Decoder::new();
        dec.open_memory(Vec::new()).unwrap();
        let mut out = [0u8; 16];
        assert_eq!(dec.read(&mut out).unwrap(), (DecodeStatus::Done, 0));
        assert!(matches!(dec.format(), Err(YinError::Eof)));
    }

    #[test]
    fn test_未打开() {
        let mut dec = Decoder::new();
        let mut out = [0u8; 16];
        assert!(matches!(dec.read(&mut out), Err(YinError::NoStream)));
        assert_eq!(Decoder::safe_buffer(), 147_456);
    }
}
