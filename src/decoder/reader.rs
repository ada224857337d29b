//! 帧读取.
//!
//! 从 I/O 层逐帧取出完整的 MPEG 音频帧: 跳过 ID3v2 / APE 标签,
//! 在 ID3v1 标签处结束, 失步时按 `resync_limit` 逐字节重同步,
//! 并在第一帧处识别 Xing/Info/VBRI 信息帧.

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace, warn};
use yin_codec::{FrameHeader, HeaderChange};
use yin_core::{WideOff, YinError, YinResult};
use yin_format::mpa::{ID3V2_HEADER_SIZE, InfoFrame, TrailingTag, detect_tag, id3v2_tag_size, parse_info_frame};

use super::{Decoder, DecoderFlags, StateFlags, VbrMode};

/// APE 标签头/尾字节数
const APE_TAG_FOOTER: usize = 32;
/// APE 标志: 本块为标签头
const APE_FLAG_IS_HEADER: u32 = 1 << 29;

/// 单次探测的结果
enum Probe {
    /// 找到帧头
    Frame(FrameHeader),
    /// 跳过了一个标签, 继续
    Skipped,
    /// 流结束
    End,
    /// 不是帧头, 需要重同步
    Lost,
}

impl Decoder {
    /// 读取下一帧到 `self.frame`
    ///
    /// 返回 `Ok(false)` 表示流正常结束. 推送模式数据不足时回退到帧起点并返回
    /// `NeedMoreData`, 补充数据后可以重新调用.
    pub(crate) fn read_frame(&mut self) -> YinResult<bool> {
        if self.params.flags.contains(DecoderFlags::NO_FRANKENSTEIN) && self.at_announced_end() {
            debug!("已到信息帧声明的第 {} 帧, 不再读取", self.num + 1);
            return Ok(false);
        }
        match self.read_frame_inner() {
            Err(YinError::NeedMoreData) => {
                if let Some(io) = self.io.as_mut() {
                    io.rewind();
                }
                Err(YinError::NeedMoreData)
            }
            Err(YinError::Eof) => Ok(false),
            other => other,
        }
    }

    fn at_announced_end(&self) -> bool {
        (self.track_frames > 0 && self.num >= self.track_frames - 1)
            || (self.gapless.frames > 0 && self.num >= self.gapless.frames - 1)
    }

    fn read_frame_inner(&mut self) -> YinResult<bool> {
        let mut skipped: i64 = 0;
        loop {
            let framepos = {
                let io = self.io.as_mut().ok_or(YinError::NoStream)?;
                io.mark();
                io.tell()
            };
            let header = match self.probe()? {
                Probe::Frame(h) => h,
                Probe::Skipped => continue,
                Probe::End => return Ok(false),
                Probe::Lost => {
                    self.resync_step(framepos, &mut skipped)?;
                    continue;
                }
            };
            if self.firsthead.is_none() && !self.next_header_agrees(&header)? {
                trace!("偏移 {framepos} 处的帧头与后继帧不一致");
                self.resync_step(framepos, &mut skipped)?;
                continue;
            }

            {
                let io = self.io.as_mut().ok_or(YinError::NoStream)?;
                let data = io.read_exact(header.frame_size)?;
                self.frame.clear();
                self.frame.extend_from_slice(data);
            }
            if skipped > 0 {
                debug!("重同步完成: 跳过 {skipped} 字节, 帧位于 {framepos}");
            }

            if !self.info_checked {
                self.info_checked = true;
                if header.layer == 3 && !self.params.flags.contains(DecoderFlags::IGNORE_INFOFRAME) {
                    if let Some(info) = parse_info_frame(&self.frame, &header) {
                        self.header = Some(header);
                        self.apply_info_frame(&info);
                        self.io.as_mut().ok_or(YinError::NoStream)?.forget();
                        continue;
                    }
                }
            }

            self.io.as_mut().ok_or(YinError::NoStream)?.forget();
            self.accept_frame(header, framepos);
            return Ok(true);
        }
    }

    /// 查看当前位置是帧头、标签还是垃圾数据
    fn probe(&mut self) -> YinResult<Probe> {
        let io = self.io.as_mut().ok_or(YinError::NoStream)?;
        let head = {
            let b = io.peek(FrameHeader::SIZE)?;
            [b[0], b[1], b[2], b[3]]
        };
        let tag = if &head == b"APET" {
            match io.peek(APE_TAG_FOOTER) {
                Ok(b) => detect_tag(b),
                Err(YinError::Eof) => None,
                Err(e) => return Err(e),
            }
        } else {
            detect_tag(&head)
        };

        match tag {
            Some(TrailingTag::Id3v1) => {
                debug!("遇到 ID3v1 标签, 流结束于 {}", io.tell());
                return Ok(Probe::End);
            }
            Some(TrailingTag::Id3v2) => {
                let size = match io.peek(ID3V2_HEADER_SIZE) {
                    Ok(b) => id3v2_tag_size(b),
                    Err(YinError::Eof) => None,
                    Err(e) => return Err(e),
                };
                if let Some(size) = size {
                    debug!("跳过 ID3v2 标签: {size} 字节, 位于 {}", io.tell());
                    io.skip(size as WideOff)?;
                    io.forget();
                    return Ok(Probe::Skipped);
                }
            }
            Some(TrailingTag::Ape) => {
                let b = io.peek(APE_TAG_FOOTER)?;
                let size = LittleEndian::read_u32(&b[12..16]) as WideOff;
                let flags = LittleEndian::read_u32(&b[20..24]);
                // 标签头之后还有条目与标签尾, 标签尾之后即结束
                let total = if flags & APE_FLAG_IS_HEADER != 0 {
                    size + APE_TAG_FOOTER as WideOff
                } else {
                    APE_TAG_FOOTER as WideOff
                };
                debug!("跳过 APE 标签: {total} 字节, 位于 {}", io.tell());
                io.skip(total)?;
                io.forget();
                return Ok(Probe::Skipped);
            }
            None => {}
        }

        Ok(match FrameHeader::parse(u32::from_be_bytes(head)) {
            Ok(h) => Probe::Frame(h),
            Err(_) => Probe::Lost,
        })
    }

    /// 向前跳过一个字节, 超过重同步上限时报错
    fn resync_step(&mut self, framepos: WideOff, skipped: &mut i64) -> YinResult<()> {
        let limit = self.params.resync_limit;
        if limit == 0 {
            return Err(YinError::OutOfSync(framepos));
        }
        if limit > 0 && *skipped >= limit {
            if self.params.noisy() {
                warn!("重同步失败: 跳过 {} 字节仍未找到有效帧", *skipped);
            }
            return Err(YinError::ResyncFailed(*skipped));
        }
        if *skipped == 0 && self.firsthead.is_some() && self.params.noisy() {
            warn!("偏移 {framepos} 处帧同步丢失, 开始重同步");
        }
        let io = self.io.as_mut().ok_or(YinError::NoStream)?;
        io.skip(1)?;
        io.forget();
        *skipped += 1;
        Ok(())
    }

    /// 第一帧: 要求紧随其后的 4 字节也是兼容的帧头 (或标签/流结束)
    fn next_header_agrees(&mut self, header: &FrameHeader) -> YinResult<bool> {
        let io = self.io.as_mut().ok_or(YinError::NoStream)?;
        let want = header.frame_size + FrameHeader::SIZE;
        let b = match io.peek(want) {
            Ok(b) => b,
            Err(YinError::Eof) => return Ok(true),
            Err(e) => return Err(e),
        };
        let next = &b[header.frame_size..want];
        if detect_tag(next).is_some() || next == b"APET" {
            return Ok(true);
        }
        let raw = u32::from_be_bytes([next[0], next[1], next[2], next[3]]);
        Ok(FrameHeader::parse(raw).is_ok_and(|n| n.change_from(header) != HeaderChange::Format))
    }

    fn apply_info_frame(&mut self, info: &InfoFrame) {
        debug!("信息帧: {info:?}");
        if let Some(frames) = info.frames.filter(|&f| f > 0) {
            let frames = frames as i64;
            self.track_frames = frames;
            if self.params.flags.contains(DecoderFlags::GAPLESS) {
                self.gapless_init(
                    frames,
                    i64::from(info.enc_delay),
                    i64::from(info.enc_padding),
                );
            }
            if let Some(bytes) = info.bytes.filter(|&b| b > 0) {
                self.mean_framesize = bytes as f64 / frames as f64;
            }
        }
        if info.has_gapless() {
            self.gapless.enc_delay = i64::from(info.enc_delay);
            self.gapless.enc_padding = i64::from(info.enc_padding);
        }
        self.vbr = if info.is_vbr() { VbrMode::Vbr } else { VbrMode::Cbr };
    }

    /// 记录一个完整读取的音频帧
    fn accept_frame(&mut self, header: FrameHeader, framepos: WideOff) {
        self.num += 1;
        self.to_decode = true;
        self.to_ignore = true;
        self.framepos = framepos;

        if self.state.contains(StateFlags::ACCURATE) {
            self.index.add(self.num, framepos);
        }

        let change = match &self.oldhead {
            None => HeaderChange::Format,
            Some(old) if old.raw == header.raw => HeaderChange::None,
            Some(old) => {
                if old.bitrate_index != header.bitrate_index {
                    self.vbr = VbrMode::Vbr;
                }
                header.change_from(old)
            }
        };
        if let Some(first) = &self.firsthead {
            if header.change_from(first) == HeaderChange::Format
                && !self.state.contains(StateFlags::FRANKENSTEIN)
            {
                if self.params.noisy() {
                    warn!("第 {} 帧格式与首帧不同, 码流由不同来源拼接", self.num);
                }
                self.state.insert(StateFlags::FRANKENSTEIN);
            }
        }
        if self.track_frames > 0
            && self.num >= self.track_frames
            && !self.state.contains(StateFlags::FRANKENSTEIN)
        {
            if self.params.noisy() {
                warn!("读到第 {} 帧, 超过信息帧声明的 {} 帧", self.num, self.track_frames);
            }
            self.state.insert(StateFlags::FRANKENSTEIN);
        }
        self.header_change = self.header_change.max(change);

        if self.firsthead.is_none() {
            self.firsthead = Some(header);
            self.audio_start = framepos;
            debug!(
                "首帧: MPEG {:?} Layer {} {} Hz {} kbps, 位于 {framepos}",
                header.version, header.layer, header.sample_rate, header.bitrate_kbps
            );
        }
        self.oldhead = Some(header);
        self.header = Some(header);

        self.mean_frames += 1;
        self.mean_framesize += (header.frame_size as f64 - self.mean_framesize) / self.mean_frames as f64;
        trace!("帧 {}: {} 字节, 位于 {framepos}", self.num, header.frame_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecoderParams;

    /// MPEG-1 Layer II 128kbps 44100Hz 立体声, 417 字节, 负载全零
    const L2_HEAD: u32 = 0xFFFD_9004;

    fn frames(n: usize) -> Vec<u8> {
        let size = FrameHeader::parse(L2_HEAD).unwrap().frame_size;
        let mut data = Vec::new();
        for _ in 0..n {
            let start = data.len();
            data.resize(start + size, 0);
            data[start..start + 4].copy_from_slice(&L2_HEAD.to_be_bytes());
        }
        data
    }

    fn open(data: Vec<u8>, params: DecoderParams) -> Decoder {
        let mut dec = Decoder::with_params(params).unwrap();
        dec.open_memory(data).unwrap();
        dec
    }

    #[test]
    fn test_逐帧读取() {
        let mut dec = open(frames(3), DecoderParams::default());
        assert!(dec.read_frame().unwrap());
        assert_eq!(dec.num, 0);
        assert_eq!(dec.header_change, HeaderChange::Format);
        assert!(dec.read_frame().unwrap());
        assert!(dec.read_frame().unwrap());
        assert_eq!(dec.num, 2);
        assert_eq!(dec.framepos, 2 * 417);
        assert!(!dec.read_frame().unwrap());
        assert_eq!(dec.index.fill(), 3);
        assert!((dec.mean_framesize - 417.0).abs() < 1e-9);
    }

    #[test]
    fn test_跳过id3v2与垃圾() {
        let mut data = vec![b'I', b'D', b'3', 4, 0, 0, 0, 0, 0, 20];
        data.extend_from_slice(&[0xAB; 20]);
        data.extend_from_slice(&[0x00, 0x11, 0x22]);
        data.extend_from_slice(&frames(2));
        let mut dec = open(data, DecoderParams::default());
        assert!(dec.read_frame().unwrap());
        assert_eq!(dec.framepos, 33);
        assert_eq!(dec.audio_start, 33);
    }

    #[test]
    fn test_id3v1_结束流() {
        let mut data = frames(1);
        data.extend_from_slice(b"TAG");
        data.extend_from_slice(&[0; 125]);
        data.extend_from_slice(&frames(1));
        let mut dec = open(data, DecoderParams::default());
        assert!(dec.read_frame().unwrap());
        assert!(!dec.read_frame().unwrap());
    }

    #[test]
    fn test_ape_标签被跳过() {
        let mut data = frames(1);
        let mut ape = vec![0u8; 32];
        ape[..8].copy_from_slice(b"APETAGEX");
        ape[12..16].copy_from_slice(&40u32.to_le_bytes());
        ape[20..24].copy_from_slice(&APE_FLAG_IS_HEADER.to_le_bytes());
        data.extend_from_slice(&ape);
        data.extend_from_slice(&[0u8; 40]);
        data.extend_from_slice(&frames(1));
        let mut dec = open(data, DecoderParams::default());
        assert!(dec.read_frame().unwrap());
        assert!(dec.read_frame().unwrap());
        assert_eq!(dec.framepos, 417 + 72);
    }

    #[test]
    fn test_重同步上限() {
        let mut data = vec![0x55u8; 64];
        data.extend_from_slice(&frames(2));
        let mut dec = open(
            data.clone(),
            DecoderParams {
                resync_limit: 16,
                ..Default::default()
            },
        );
        assert!(matches!(dec.read_frame(), Err(YinError::ResyncFailed(16))));

        let mut dec = open(
            data.clone(),
            DecoderParams {
                resync_limit: 0,
                ..Default::default()
            },
        );
        assert!(matches!(dec.read_frame(), Err(YinError::OutOfSync(0))));

        let mut dec = open(
            data,
            DecoderParams {
                resync_limit: -1,
                ..Default::default()
            },
        );
        assert!(dec.read_frame().unwrap());
        assert_eq!(dec.framepos, 64);
    }

    #[test]
    fn test_推送模式数据不足可重试() {
        let data = frames(2);
        let mut dec = Decoder::new();
        dec.open_feed().unwrap();
        dec.feed(&data[..300]).unwrap();
        assert!(matches!(dec.read_frame(), Err(YinError::NeedMoreData)));
        dec.feed(&data[300..]).unwrap();
        assert!(dec.read_frame().unwrap());
        assert_eq!(dec.num, 0);
        assert!(dec.read_frame().unwrap());
        assert_eq!(dec.num, 1);
        assert!(matches!(dec.read_frame(), Err(YinError::NeedMoreData)));
    }

    #[test]
    fn test_格式变化标记拼接流() {
        // 第三帧改为 48000Hz
        let mut data = frames(2);
        let other = 0xFFFD_9404u32;
        let size = FrameHeader::parse(other).unwrap().frame_size;
        let start = data.len();
        data.resize(start + size, 0);
        data[start..start + 4].copy_from_slice(&other.to_be_bytes());
        let mut dec = open(data, DecoderParams::default());
        assert!(dec.read_frame().unwrap());
        assert!(dec.read_frame().unwrap());
        dec.header_change = HeaderChange::None;
        assert!(!dec.state.contains(StateFlags::FRANKENSTEIN));
        assert!(dec.read_frame().unwrap());
        assert_eq!(dec.header_change, HeaderChange::Format);
        assert!(dec.state.contains(StateFlags::FRANKENSTEIN));
    }
}
