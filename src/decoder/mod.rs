//! 流式 MPEG 音频解码器.
//!
//! [`Decoder`] 是顶层句柄: 从文件、调用方句柄或推送的数据中读取帧,
//! 解码为 PCM, 并提供采样精确的 seek 与位置查询.
//!
//! # 示例
//!
//! ```rust,no_run
//! use yin::decoder::{DecodeStatus, Decoder};
//!
//! let mut dec = Decoder::new();
//! dec.open("music.mp2")?;
//! let mut pcm = vec![0u8; Decoder::safe_buffer()];
//! loop {
//!     let (status, n) = dec.read(&mut pcm)?;
//!     // 使用 pcm[..n]
//!     if status == DecodeStatus::Done {
//!         break;
//!     }
//! }
//! # Ok::<(), yin::core::YinError>(())
//! ```
//!
//! 子模块按职责划分:
//! - `params`: 解码参数与状态键
//! - `reader`: 帧读取、标签跳过与重同步
//! - `engine`: 解码循环与输出格式协商
//! - `gapless`: 首尾裁剪与位置换算
//! - `seek`: seek / tell / scan / 长度估计
//! - `narrow`: 窄位置类型接口

mod engine;
mod gapless;
mod narrow;
mod params;
mod reader;
mod seek;

pub use params::{DecoderFlags, DecoderParams, StateKey};

use std::io::{Read, Seek};
use std::net::TcpStream;
use std::path::Path;
use std::time::Duration;

use bitflags::bitflags;
use log::debug;
use yin_codec::{ChannelMode, FrameHeader, HeaderChange, Layer12Decoder, Layer3Backend, MpegVersion};
use yin_core::{Encoding, WideOff, YinError, YinResult};
use yin_format::{FrameIndex, HandleCallbacks, IoContext};
use yin_resample::{MonoMix, NtomResampler};

use gapless::Gapless;
use narrow::NarrowState;

/// 解码调用的结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// 正常, 可以继续调用
    Ok,
    /// 输出格式已改变, 调用方应先查询 [`Decoder::format`]
    NewFormat,
    /// 推送模式下需要更多输入
    NeedMore,
    /// 流已结束
    Done,
}

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormat {
    pub rate: u32,
    pub channels: u32,
    pub encoding: Encoding,
}

impl OutputFormat {
    /// 一个采样帧 (所有声道) 的字节数
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.encoding.bytes_per_sample()
    }
}

/// 码率模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbrMode {
    Cbr,
    Vbr,
}

bitflags! {
    /// 帧头标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FrameInfoFlags: u32 {
        const CRC = 0x1;
        const COPYRIGHT = 0x2;
        const PRIVATE = 0x4;
        const ORIGINAL = 0x8;
    }
}

/// 当前帧信息
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameInfo {
    pub version: MpegVersion,
    pub layer: u8,
    /// 原生采样率
    pub rate: u32,
    pub mode: ChannelMode,
    pub mode_ext: u8,
    /// 帧字节数 (含帧头)
    pub frame_size: usize,
    pub flags: FrameInfoFlags,
    pub emphasis: u8,
    /// 比特率 (kbps)
    pub bitrate: u32,
    pub vbr: VbrMode,
}

bitflags! {
    /// 内部状态标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct StateFlags: u8 {
        /// 帧号与字节位置对应关系确定
        const ACCURATE = 0x1;
        /// 流中途发生了格式相关变化
        const FRANKENSTEIN = 0x2;
        /// 解码器刚重新配置
        const FRESH_DECODER = 0x4;
        /// 解码器已按当前帧头配置好
        const DECODER_LIVE = 0x8;
    }
}

/// 解码输出缓冲区
///
/// `data` 只增长不收缩, 有效数据为 `data[pos..pos + fill]`.
#[derive(Debug, Default)]
pub(crate) struct OutBuffer {
    data: Vec<u8>,
    pos: usize,
    fill: usize,
}

impl OutBuffer {
    pub(crate) fn clear(&mut self) {
        self.pos = 0;
        self.fill = 0;
    }

    pub(crate) fn fill(&self) -> usize {
        self.fill
    }

    pub(crate) fn pending(&self) -> &[u8] {
        &self.data[self.pos..self.pos + self.fill]
    }

    pub(crate) fn consume(&mut self, n: usize) {
        let n = n.min(self.fill);
        self.pos += n;
        self.fill -= n;
    }

    /// 截断到前 `len` 字节
    pub(crate) fn truncate(&mut self, len: usize) {
        self.fill = self.fill.min(len);
    }

    /// 丢弃开头 `n` 字节
    pub(crate) fn skip_front(&mut self, n: usize) {
        if n >= self.fill {
            self.clear();
        } else {
            self.consume(n);
        }
    }

    /// 清空并返回长度为 `len` 的可写区
    pub(crate) fn prepare(&mut self, len: usize) -> &mut [u8] {
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
        self.clear();
        &mut self.data[..len]
    }

    pub(crate) fn set_fill(&mut self, fill: usize) {
        self.pos = 0;
        self.fill = fill.min(self.data.len());
    }

    pub(crate) fn reserve(&mut self, len: usize) {
        if self.data.len() < len {
            self.data.resize(len, 0);
        }
    }
}

/// MPEG 音频解码器句柄
pub struct Decoder {
    pub(crate) params: DecoderParams,
    pub(crate) io: Option<IoContext>,

    /// 当前帧号, 读到第一帧之前为 -1
    pub(crate) num: i64,
    pub(crate) playnum: i64,
    pub(crate) to_decode: bool,
    pub(crate) to_ignore: bool,
    /// 新曲目, 第一帧尚未完成初始化
    pub(crate) fresh: bool,
    /// 已读到第一帧并确定了输出格式
    pub(crate) track_ready: bool,
    pub(crate) state: StateFlags,

    pub(crate) header: Option<FrameHeader>,
    pub(crate) firsthead: Option<FrameHeader>,
    pub(crate) oldhead: Option<FrameHeader>,
    pub(crate) header_change: HeaderChange,
    /// 参数已改变, 下一帧前需要重新配置
    pub(crate) decoder_change: bool,
    /// 当前帧数据 (含帧头)
    pub(crate) frame: Vec<u8>,
    /// 当前帧的字节位置
    pub(crate) framepos: WideOff,
    /// 第一个音频帧的字节位置
    pub(crate) audio_start: WideOff,
    pub(crate) info_checked: bool,
    pub(crate) halfphase: u32,

    pub(crate) format: Option<OutputFormat>,
    pub(crate) new_format: bool,
    /// 当前解码配置下每帧原生采样数
    pub(crate) spf: usize,
    pub(crate) outblock: usize,
    pub(crate) ntom: Option<NtomResampler>,
    pub(crate) mono_mix: MonoMix,
    pub(crate) layer12: Layer12Decoder,
    pub(crate) layer3: Option<Box<dyn Layer3Backend>>,
    pub(crate) buffer: OutBuffer,
    pub(crate) pcm: Vec<f32>,
    pub(crate) mixed: Vec<f32>,
    pub(crate) resampled: Vec<f32>,
    pub(crate) clip: usize,
    pub(crate) padded: usize,

    pub(crate) index: FrameIndex,
    pub(crate) track_frames: i64,
    pub(crate) track_samples: i64,
    pub(crate) mean_framesize: f64,
    pub(crate) mean_frames: i64,
    pub(crate) vbr: VbrMode,
    pub(crate) gapless: Gapless,

    pub(crate) narrow: Option<NarrowState>,
    /// `open_fixed` 之前的参数, 关闭时恢复
    pub(crate) saved_params: Option<DecoderParams>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder {
    /// 以默认参数创建解码器
    pub fn new() -> Self {
        let params = DecoderParams::default();
        let (size, grow) = params.index_layout();
        Self {
            params,
            io: None,
            num: -1,
            playnum: 0,
            to_decode: false,
            to_ignore: false,
            fresh: true,
            track_ready: false,
            state: StateFlags::ACCURATE,
            header: None,
            firsthead: None,
            oldhead: None,
            header_change: HeaderChange::None,
            decoder_change: false,
            frame: Vec::new(),
            framepos: 0,
            audio_start: 0,
            info_checked: false,
            halfphase: 0,
            format: None,
            new_format: false,
            spf: 0,
            outblock: 0,
            ntom: None,
            mono_mix: MonoMix::Mix,
            layer12: Layer12Decoder::new(),
            layer3: None,
            buffer: OutBuffer::default(),
            pcm: Vec::new(),
            mixed: Vec::new(),
            resampled: Vec::new(),
            clip: 0,
            padded: 0,
            index: FrameIndex::new(size, grow),
            track_frames: -1,
            track_samples: -1,
            mean_framesize: 0.0,
            mean_frames: 0,
            vbr: VbrMode::Cbr,
            gapless: Gapless::default(),
            narrow: None,
            saved_params: None,
        }
    }

    /// 以指定参数创建解码器
    pub fn with_params(params: DecoderParams) -> YinResult<Self> {
        let mut dec = Self::new();
        dec.set_params(params)?;
        Ok(dec)
    }

    /// 当前参数
    pub fn params(&self) -> &DecoderParams {
        &self.params
    }

    /// 替换参数
    ///
    /// 参数无效时返回错误且句柄不变. 已开始解码的流在下一帧前按新参数重新配置.
    pub fn set_params(&mut self, params: DecoderParams) -> YinResult<()> {
        params.validate()?;
        self.apply_params(params);
        Ok(())
    }

    fn apply_params(&mut self, params: DecoderParams) {
        let (size, grow) = params.index_layout();
        if size != self.index.size() {
            self.index.resize(size);
        }
        self.index.set_grow_size(grow);
        self.layer12
            .set_crc_check(params.flags.contains(DecoderFlags::CHECK_CRC));
        if params != self.params && self.num >= 0 {
            self.decoder_change = true;
        }
        self.params = params;
    }

    fn attach(&mut self, io: IoContext) {
        debug!("打开输入: {io:?}");
        self.io = Some(io);
    }

    /// 打开文件路径, 关闭时释放文件
    pub fn open(&mut self, path: impl AsRef<Path>) -> YinResult<()> {
        self.close();
        let io = IoContext::open_path(path)?;
        self.attach(io);
        Ok(())
    }

    /// 打开文件并固定输出格式
    ///
    /// 输出采样率固定为码流原生采样率, 声道数与编码由调用方指定.
    /// 可定位且长度未知时会先扫描全流. 强制的参数只对这条流有效,
    /// [`close`](Self::close) 时恢复为调用前的参数.
    pub fn open_fixed(
        &mut self,
        path: impl AsRef<Path>,
        channels: u32,
        encoding: Encoding,
    ) -> YinResult<()> {
        if channels == 0 || channels > 2 {
            return Err(YinError::BadChannels(channels));
        }
        self.close();
        let caller = self.params.clone();
        let mut params = caller.clone();
        params.flags |= DecoderFlags::NO_FRANKENSTEIN;
        params.flags.remove(DecoderFlags::FORCE_MONO | DecoderFlags::FORCE_STEREO);
        params.force_channels = channels;
        params.force_rate = 0;
        params.down_sample = 0;
        params.encoding = encoding;
        self.set_params(params)?;
        if let Err(e) = self.open(path) {
            self.apply_params(caller);
            return Err(e);
        }
        self.saved_params = Some(caller);

        let result = self.pin_native_rate();
        if result.is_err() {
            self.close();
        }
        result
    }

    fn pin_native_rate(&mut self) -> YinResult<()> {
        let format = self.format()?;
        let mut params = self.params.clone();
        params.force_rate = format.rate;
        self.set_params(params)?;
        let seekable = self.io.as_ref().is_some_and(IoContext::is_seekable);
        if self.track_frames < 1 && seekable {
            debug!("固定格式打开: 长度未知, 扫描全流");
            self.scan()?;
        }
        Ok(())
    }

    /// 包装调用方的可定位句柄 (`File`, `Cursor` 等)
    pub fn open_reader<R: Read + Seek + Send + 'static>(&mut self, reader: R) -> YinResult<()> {
        self.close();
        let io = IoContext::from_reader(reader)?;
        self.attach(io);
        Ok(())
    }

    /// 包装只读流 (不可定位)
    pub fn open_stream<R: Read + Send + 'static>(&mut self, reader: R) -> YinResult<()> {
        self.close();
        self.attach(IoContext::from_stream(reader));
        Ok(())
    }

    /// 包装套接字, 读取超时取自参数 `timeout`
    pub fn open_socket(&mut self, stream: TcpStream) -> YinResult<()> {
        self.close();
        let timeout = (self.params.timeout > 0).then(|| Duration::from_secs(self.params.timeout));
        let io = IoContext::from_socket(stream, timeout)?;
        self.attach(io);
        Ok(())
    }

    /// 包装调用方回调
    pub fn open_handle(&mut self, callbacks: HandleCallbacks) -> YinResult<()> {
        self.close();
        let io = IoContext::from_callbacks(callbacks)?;
        self.attach(io);
        Ok(())
    }

    /// 从内存数据解码
    pub fn open_memory(&mut self, data: Vec<u8>) -> YinResult<()> {
        self.close();
        self.attach(IoContext::from_memory(data));
        Ok(())
    }

    /// 进入推送模式, 之后用 [`feed`](Self::feed) 或 [`decode`](Self::decode) 提供数据
    pub fn open_feed(&mut self) -> YinResult<()> {
        self.close();
        self.attach(IoContext::feed());
        Ok(())
    }

    /// 关闭当前流
    ///
    /// 释放 I/O 资源并重置所有与曲目相关的状态. 参数保留.
    pub fn close(&mut self) {
        if let Some(mut io) = self.io.take() {
            io.close();
        }
        self.reset_track();
        if let Some(params) = self.saved_params.take() {
            debug!("恢复固定格式打开之前的参数");
            self.apply_params(params);
        }
    }

    /// 重置曲目状态
    fn reset_track(&mut self) {
        self.num = -1;
        self.playnum = 0;
        self.to_decode = false;
        self.to_ignore = false;
        self.fresh = true;
        self.track_ready = false;
        self.state = StateFlags::ACCURATE;
        self.header = None;
        self.firsthead = None;
        self.oldhead = None;
        self.header_change = HeaderChange::None;
        self.decoder_change = false;
        self.frame.clear();
        self.framepos = 0;
        self.audio_start = 0;
        self.info_checked = false;
        self.halfphase = 0;
        self.format = None;
        self.new_format = false;
        self.spf = 0;
        self.outblock = 0;
        self.ntom = None;
        self.layer12.reset();
        self.layer3 = None;
        self.buffer.clear();
        self.clip = 0;
        self.padded = 0;
        self.index.reset();
        self.track_frames = -1;
        self.track_samples = -1;
        self.mean_framesize = 0.0;
        self.mean_frames = 0;
        self.vbr = VbrMode::Cbr;
        self.gapless = Gapless::default();
    }

    /// 是否已打开输入
    pub fn is_open(&self) -> bool {
        self.io.is_some()
    }

    pub(crate) fn io_mut(&mut self) -> YinResult<&mut IoContext> {
        self.io.as_mut().ok_or(YinError::NoStream)
    }
}

impl Drop for Decoder {
    fn drop(&mut self) {
        self.close();
        self.narrow = None;
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("num", &self.num)
            .field("format", &self.format)
            .field("track_frames", &self.track_frames)
            .field("io", &self.io)
            .finish()
    }
}
