//! MPEG 音频流探测辅助.
//!
//! ID3v2 标签长度、流末尾标签识别, 以及第一帧中 Xing/Info (含 LAME 扩展)
//! 与 VBRI 信息头的解析.

use byteorder::{BigEndian, ByteOrder};
use log::debug;
use yin_codec::FrameHeader;

/// ID3v2 标签头字节数
pub const ID3V2_HEADER_SIZE: usize = 10;

/// LAME 扩展中编码延迟/填充的合理上限
const MAX_GAPLESS_SAMPLES: u32 = 2880;

/// 解析 ID3v2 标签头, 返回整个标签 (含头与可选尾) 的字节数
///
/// `header` 不以 "ID3" 开头或大小字段不是 syncsafe 时返回 `None`.
pub fn id3v2_tag_size(header: &[u8]) -> Option<u64> {
    let header = header.get(..ID3V2_HEADER_SIZE)?;
    if &header[0..3] != b"ID3" || header[3] == 0xFF || header[4] == 0xFF {
        return None;
    }
    if header[6..10].iter().any(|&b| b & 0x80 != 0) {
        return None;
    }
    let size = u64::from(header[6]) << 21
        | u64::from(header[7]) << 14
        | u64::from(header[8]) << 7
        | u64::from(header[9]);
    // 标志位 0x10 表示带 10 字节尾
    let footer = if header[5] & 0x10 != 0 { 10 } else { 0 };
    Some(ID3V2_HEADER_SIZE as u64 + size + footer)
}

/// 帧位置处的非音频标签
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrailingTag {
    /// ID3v1 ("TAG", 128 字节, 位于流末尾)
    Id3v1,
    /// APE 标签 ("APETAGEX")
    Ape,
    /// 流中间的 ID3v2 标签
    Id3v2,
}

/// 识别帧位置上的标签起始
pub fn detect_tag(data: &[u8]) -> Option<TrailingTag> {
    if data.starts_with(b"APETAGEX") {
        Some(TrailingTag::Ape)
    } else if data.starts_with(b"TAG") {
        Some(TrailingTag::Id3v1)
    } else if data.starts_with(b"ID3") {
        Some(TrailingTag::Id3v2)
    } else {
        None
    }
}

/// 信息帧种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoKind {
    /// "Xing" (VBR)
    Xing,
    /// "Info" (CBR)
    Info,
    /// Fraunhofer VBRI
    Vbri,
}

/// 第一帧中的信息头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InfoFrame {
    /// 种类
    pub kind: InfoKind,
    /// 音频帧总数 (不含信息帧本身)
    pub frames: Option<u64>,
    /// 音频数据总字节数
    pub bytes: Option<u64>,
    /// 编码器延迟 (采样)
    pub enc_delay: u32,
    /// 编码器尾部填充 (采样)
    pub enc_padding: u32,
}

impl InfoFrame {
    /// 是否为 VBR 流
    pub fn is_vbr(&self) -> bool {
        matches!(self.kind, InfoKind::Xing | InfoKind::Vbri)
    }

    /// 是否带 gapless 信息
    pub fn has_gapless(&self) -> bool {
        self.enc_delay > 0 || self.enc_padding > 0
    }
}

/// 解析 Layer III 第一帧中的信息头
///
/// `frame` 为含帧头的完整帧数据. 非 Layer III 帧返回 `None`.
pub fn parse_info_frame(frame: &[u8], header: &FrameHeader) -> Option<InfoFrame> {
    if header.layer != 3 {
        return None;
    }
    let xing_offset = FrameHeader::SIZE + header.side_info_size();
    if let Some(info) = parse_xing(frame, xing_offset) {
        return Some(info);
    }
    parse_vbri(frame, FrameHeader::SIZE + 32)
}

fn parse_xing(frame: &[u8], offset: usize) -> Option<InfoFrame> {
    let tag = frame.get(offset..offset + 4)?;
    let kind = match tag {
        b"Xing" => InfoKind::Xing,
        b"Info" => InfoKind::Info,
        _ => return None,
    };
    let mut pos = offset + 4;
    let flags = BigEndian::read_u32(frame.get(pos..pos + 4)?);
    pos += 4;

    let read_u32 = |pos: &mut usize| -> Option<u32> {
        let v = BigEndian::read_u32(frame.get(*pos..*pos + 4)?);
        *pos += 4;
        Some(v)
    };
    let frames = if flags & 0x1 != 0 {
        Some(u64::from(read_u32(&mut pos)?))
    } else {
        None
    };
    let bytes = if flags & 0x2 != 0 {
        Some(u64::from(read_u32(&mut pos)?))
    } else {
        None
    };
    if flags & 0x4 != 0 {
        pos += 100;
    }
    if flags & 0x8 != 0 {
        pos += 4;
    }

    let mut info = InfoFrame {
        kind,
        frames,
        bytes,
        enc_delay: 0,
        enc_padding: 0,
    };

    // LAME 扩展: 9 字节版本串之后, 偏移 21..24 为 12 bit 延迟 + 12 bit 填充
    if let Some(lame) = frame.get(pos..pos + 24) {
        let d = &lame[21..24];
        let delay = (u32::from(d[0]) << 4) | (u32::from(d[1]) >> 4);
        let padding = ((u32::from(d[1]) & 0xF) << 8) | u32::from(d[2]);
        if delay <= MAX_GAPLESS_SAMPLES && padding <= MAX_GAPLESS_SAMPLES {
            info.enc_delay = delay;
            info.enc_padding = padding;
        }
    }
    debug!(
        "信息帧 {:?}: frames={:?}, bytes={:?}, delay={}, padding={}",
        info.kind, info.frames, info.bytes, info.enc_delay, info.enc_padding
    );
    Some(info)
}

fn parse_vbri(frame: &[u8], offset: usize) -> Option<InfoFrame> {
    let data = frame.get(offset..offset + 18)?;
    if &data[0..4] != b"VBRI" {
        return None;
    }
    let bytes = BigEndian::read_u32(&data[10..14]);
    let frames = BigEndian::read_u32(&data[14..18]);
    debug!("VBRI 信息帧: frames={frames}, bytes={bytes}");
    Some(InfoFrame {
        kind: InfoKind::Vbri,
        frames: Some(u64::from(frames)),
        bytes: Some(u64::from(bytes)),
        enc_delay: 0,
        enc_padding: 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MPEG-1 Layer III 128kbps 44100Hz 立体声, 417 字节
    fn layer3_frame() -> (Vec<u8>, FrameHeader) {
        let raw = 0xFFFB_9000u32;
        let header = FrameHeader::parse(raw).unwrap();
        let mut frame = vec![0u8; header.frame_size];
        frame[..4].copy_from_slice(&raw.to_be_bytes());
        (frame, header)
    }

    #[test]
    fn test_id3v2_大小() {
        let header = [b'I', b'D', b'3', 4, 0, 0, 0, 0, 0x02, 0x01];
        assert_eq!(id3v2_tag_size(&header), Some(10 + 257));
        let with_footer = [b'I', b'D', b'3', 4, 0, 0x10, 0, 0, 0, 5];
        assert_eq!(id3v2_tag_size(&with_footer), Some(25));
        let not_syncsafe = [b'I', b'D', b'3', 4, 0, 0, 0x80, 0, 0, 0];
        assert_eq!(id3v2_tag_size(&not_syncsafe), None);
        assert_eq!(id3v2_tag_size(b"RIFF000000"), None);
        assert_eq!(id3v2_tag_size(b"ID3"), None);
    }

    #[test]
    fn test_识别末尾标签() {
        assert_eq!(detect_tag(b"TAGtitle"), Some(TrailingTag::Id3v1));
        assert_eq!(detect_tag(b"APETAGEX...."), Some(TrailingTag::Ape));
        assert_eq!(detect_tag(b"ID3\x04"), Some(TrailingTag::Id3v2));
        assert_eq!(detect_tag(&[0xFF, 0xFB, 0x90, 0x00]), None);
    }

    #[test]
    fn test_xing_含_lame_扩展() {
        let (mut frame, header) = layer3_frame();
        let off = 4 + 32;
        frame[off..off + 4].copy_from_slice(b"Xing");
        frame[off + 4..off + 8].copy_from_slice(&0x3u32.to_be_bytes());
        frame[off + 8..off + 12].copy_from_slice(&100u32.to_be_bytes());
        frame[off + 12..off + 16].copy_from_slice(&41_700u32.to_be_bytes());
        let lame = off + 16;
        frame[lame..lame + 4].copy_from_slice(b"LAME");
        // delay = 576, padding = 1000
        frame[lame + 21] = (576 >> 4) as u8;
        frame[lame + 22] = (((576 & 0xF) << 4) | (1000 >> 8)) as u8;
        frame[lame + 23] = (1000 & 0xFF) as u8;

        let info = parse_info_frame(&frame, &header).unwrap();
        assert_eq!(info.kind, InfoKind::Xing);
        assert!(info.is_vbr());
        assert_eq!(info.frames, Some(100));
        assert_eq!(info.bytes, Some(41_700));
        assert_eq!(info.enc_delay, 576);
        assert_eq!(info.enc_padding, 1000);
    }

    #[test]
    fn test_info_无帧数() {
        let (mut frame, header) = layer3_frame();
        let off = 4 + 32;
        frame[off..off + 4].copy_from_slice(b"Info");
        let info = parse_info_frame(&frame, &header).unwrap();
        assert_eq!(info.kind, InfoKind::Info);
        assert_eq!(info.frames, None);
        assert!(!info.has_gapless());
    }

    #[test]
    fn test_vbri() {
        let (mut frame, header) = layer3_frame();
        let off = 36;
        frame[off..off + 4].copy_from_slice(b"VBRI");
        frame[off + 10..off + 14].copy_from_slice(&5000u32.to_be_bytes());
        frame[off + 14..off + 18].copy_from_slice(&321u32.to_be_bytes());
        let info = parse_info_frame(&frame, &header).unwrap();
        assert_eq!(info.kind, InfoKind::Vbri);
        assert_eq!(info.frames, Some(321));
    }

    #[test]
    fn test_普通帧无信息头() {
        let (frame, header) = layer3_frame();
        assert!(parse_info_frame(&frame, &header).is_none());
        let l2 = FrameHeader::parse(0xFFFD_9000).unwrap();
        assert!(parse_info_frame(&vec![0u8; l2.frame_size], &l2).is_none());
    }
}
