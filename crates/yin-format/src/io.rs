//! I/O 抽象层.
//!
//! 为帧读取器提供统一的字节流接口, 支持以下来源:
//! - 自行打开的文件路径 (关闭时释放)
//! - 调用方提供的描述符类句柄 (`File`, 任意 `Read + Seek`, 带超时的 `TcpStream`)
//! - 调用方提供的读取/定位回调 (宽或窄位置类型), 可附带清理回调
//! - 内存缓冲区
//! - 推送模式: 调用方逐块喂入数据, 不支持 seek
//!
//! 所有位置都以 [`WideOff`] 表示. 窄定位回调在调用前做范围检查,
//! 无法表示的值返回 [`YinError::Overflow`].
//!
//! 读取到的数据先进入内部缓冲区. 帧读取器在每帧开始处 [`mark`](IoContext::mark),
//! 数据不足时 [`rewind`](IoContext::rewind), 一帧完整读取后 [`forget`](IoContext::forget).

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::net::TcpStream;
use std::time::Duration;

use bytes::{Buf, BytesMut};
use log::{debug, trace};
use yin_core::offset::{len_to_wide, to_narrow, to_usize, to_wide};
use yin_core::{NarrowOff, Whence, WideOff, YinError, YinResult};

/// 读取块大小
const READ_CHUNK: usize = 16 * 1024;

/// I/O 来源种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoKind {
    /// 自行打开的文件
    Path,
    /// 调用方提供的描述符类句柄
    Descriptor,
    /// 调用方回调, 宽定位
    WideHandle,
    /// 调用方回调, 窄定位
    NarrowHandle,
    /// 调用方回调, 不可定位
    ReadOnlyHandle,
    /// 内存缓冲区
    Memory,
    /// 推送模式
    Feed,
}

/// I/O 后端 trait
///
/// 实现此 trait 以支持不同的字节来源.
pub trait IoBackend: Send {
    /// 读取数据, 返回 0 表示流结束
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 定位, 返回新的绝对位置
    fn seek(&mut self, offset: WideOff, whence: Whence) -> YinResult<WideOff>;
    /// 总字节数 (如果可知)
    fn size(&self) -> Option<WideOff>;
    /// 是否支持随机访问
    fn is_seekable(&self) -> bool;
    /// 来源种类
    fn kind(&self) -> IoKind;
    /// 释放资源
    fn close(&mut self) {}
}

/// 读取回调
pub type ReadFn = Box<dyn FnMut(&mut [u8]) -> io::Result<usize> + Send>;
/// 宽定位回调
pub type WideSeekFn = Box<dyn FnMut(WideOff, Whence) -> io::Result<WideOff> + Send>;
/// 窄定位回调
pub type NarrowSeekFn = Box<dyn FnMut(NarrowOff, Whence) -> io::Result<NarrowOff> + Send>;
/// 清理回调, 最多调用一次
pub type CleanupFn = Box<dyn FnOnce() + Send>;

/// 定位回调
#[derive(Default)]
pub enum SeekCallback {
    /// 不可定位
    #[default]
    None,
    /// 宽位置
    Wide(WideSeekFn),
    /// 窄位置
    Narrow(NarrowSeekFn),
}

/// 调用方句柄的回调集合
#[derive(Default)]
pub struct HandleCallbacks {
    /// 读取回调 (必需)
    pub read: Option<ReadFn>,
    /// 定位回调
    pub seek: SeekCallback,
    /// 关闭时调用的清理回调
    pub cleanup: Option<CleanupFn>,
}

impl HandleCallbacks {
    /// 以读取回调创建
    pub fn new(read: impl FnMut(&mut [u8]) -> io::Result<usize> + Send + 'static) -> Self {
        Self {
            read: Some(Box::new(read)),
            ..Default::default()
        }
    }

    /// 设置宽定位回调
    pub fn with_seek(
        mut self,
        seek: impl FnMut(WideOff, Whence) -> io::Result<WideOff> + Send + 'static,
    ) -> Self {
        self.seek = SeekCallback::Wide(Box::new(seek));
        self
    }

    /// 设置窄定位回调
    pub fn with_narrow_seek(
        mut self,
        seek: impl FnMut(NarrowOff, Whence) -> io::Result<NarrowOff> + Send + 'static,
    ) -> Self {
        self.seek = SeekCallback::Narrow(Box::new(seek));
        self
    }

    /// 设置清理回调
    pub fn with_cleanup(mut self, cleanup: impl FnOnce() + Send + 'static) -> Self {
        self.cleanup = Some(Box::new(cleanup));
        self
    }
}

fn seek_from(offset: WideOff, whence: Whence) -> YinResult<SeekFrom> {
    whence.to_seek_from(offset)
}

/// 文件后端 (路径打开)
struct FileBackend {
    file: File,
    size: Option<WideOff>,
}

impl IoBackend for FileBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn seek(&mut self, offset: WideOff, whence: Whence) -> YinResult<WideOff> {
        let pos = self.file.seek(seek_from(offset, whence)?)?;
        len_to_wide(pos)
    }

    fn size(&self) -> Option<WideOff> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn kind(&self) -> IoKind {
        IoKind::Path
    }
}

/// 描述符类句柄后端
struct ReaderBackend<R> {
    inner: R,
    size: Option<WideOff>,
}

impl<R: Read + Seek + Send> IoBackend for ReaderBackend<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn seek(&mut self, offset: WideOff, whence: Whence) -> YinResult<WideOff> {
        let pos = self.inner.seek(seek_from(offset, whence)?)?;
        len_to_wide(pos)
    }

    fn size(&self) -> Option<WideOff> {
        self.size
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn kind(&self) -> IoKind {
        IoKind::Descriptor
    }
}

/// 只读流后端 (套接字、管道等)
struct StreamBackend<R> {
    inner: R,
}

impl<R: Read + Send> IoBackend for StreamBackend<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }

    fn seek(&mut self, _offset: WideOff, _whence: Whence) -> YinResult<WideOff> {
        Err(YinError::NoSeek)
    }

    fn size(&self) -> Option<WideOff> {
        None
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn kind(&self) -> IoKind {
        IoKind::Descriptor
    }
}

/// 回调后端
struct CallbackBackend {
    read: ReadFn,
    seek: SeekCallback,
    cleanup: Option<CleanupFn>,
}

impl CallbackBackend {
    fn run_cleanup(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            debug!("调用句柄清理回调");
            cleanup();
        }
    }
}

impl IoBackend for CallbackBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (self.read)(buf)
    }

    fn seek(&mut self, offset: WideOff, whence: Whence) -> YinResult<WideOff> {
        match &mut self.seek {
            SeekCallback::None => Err(YinError::NoSeek),
            SeekCallback::Wide(seek) => Ok(seek(offset, whence)?),
            SeekCallback::Narrow(seek) => {
                let narrow = to_narrow(offset)?;
                Ok(to_wide(seek(narrow, whence)?))
            }
        }
    }

    fn size(&self) -> Option<WideOff> {
        None
    }

    fn is_seekable(&self) -> bool {
        !matches!(self.seek, SeekCallback::None)
    }

    fn kind(&self) -> IoKind {
        match self.seek {
            SeekCallback::None => IoKind::ReadOnlyHandle,
            SeekCallback::Wide(_) => IoKind::WideHandle,
            SeekCallback::Narrow(_) => IoKind::NarrowHandle,
        }
    }

    fn close(&mut self) {
        self.run_cleanup();
    }
}

impl Drop for CallbackBackend {
    fn drop(&mut self) {
        self.run_cleanup();
    }
}

/// 内存缓冲区后端
///
/// 用于测试和内存中处理.
pub struct MemoryBackend {
    data: Vec<u8>,
    pos: usize,
}

impl MemoryBackend {
    /// 从已有数据创建
    pub fn from_data(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }

    /// 获取内部数据的引用
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl IoBackend for MemoryBackend {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let available = self.data.len().saturating_sub(self.pos);
        let to_read = buf.len().min(available);
        buf[..to_read].copy_from_slice(&self.data[self.pos..self.pos + to_read]);
        self.pos += to_read;
        Ok(to_read)
    }

    fn seek(&mut self, offset: WideOff, whence: Whence) -> YinResult<WideOff> {
        let base = match whence {
            Whence::Set => 0,
            Whence::Cur => self.pos as WideOff,
            Whence::End => self.data.len() as WideOff,
        };
        let target = base + offset;
        if target < 0 {
            return Err(YinError::InvalidArgument(format!("seek 位置不能为负: {target}")));
        }
        self.pos = to_usize(target)?;
        Ok(target)
    }

    fn size(&self) -> Option<WideOff> {
        Some(self.data.len() as WideOff)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn kind(&self) -> IoKind {
        IoKind::Memory
    }
}

/// I/O 上下文
///
/// 封装底层后端与读缓冲区. `buf[..cursor]` 为已读但尚未遗忘的数据,
/// `buf[cursor..]` 为预读数据, `base` 为 `buf[0]` 的流位置.
pub struct IoContext {
    backend: Option<Box<dyn IoBackend>>,
    buf: BytesMut,
    cursor: usize,
    mark: usize,
    base: WideOff,
    /// 后端已返回流结束
    eof: bool,
    /// 调用方声明的流长度
    size_override: Option<WideOff>,
    closed: bool,
}

impl IoContext {
    fn with_backend(backend: Option<Box<dyn IoBackend>>, base: WideOff) -> Self {
        Self {
            backend,
            buf: BytesMut::with_capacity(READ_CHUNK),
            cursor: 0,
            mark: 0,
            base,
            eof: false,
            size_override: None,
            closed: false,
        }
    }

    /// 从后端创建上下文
    pub fn new(backend: Box<dyn IoBackend>) -> Self {
        Self::with_backend(Some(backend), 0)
    }

    /// 打开文件路径 (只读), 关闭时释放
    pub fn open_path(path: impl AsRef<std::path::Path>) -> YinResult<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .map_err(|e| YinError::BadFile(format!("{}: {e}", path.display())))?;
        let size = file.metadata().ok().and_then(|m| len_to_wide(m.len()).ok());
        debug!("打开文件 {}, 大小 {:?}", path.display(), size);
        Ok(Self::new(Box::new(FileBackend { file, size })))
    }

    /// 包装调用方的可定位句柄
    ///
    /// 流位置从句柄的当前位置起算.
    pub fn from_reader<R: Read + Seek + Send + 'static>(mut inner: R) -> YinResult<Self> {
        let start = inner.stream_position()?;
        let end = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(start))?;
        let size = len_to_wide(end).ok();
        let mut ctx = Self::new(Box::new(ReaderBackend { inner, size }));
        ctx.base = len_to_wide(start)?;
        Ok(ctx)
    }

    /// 包装只读流 (不可定位)
    pub fn from_stream<R: Read + Send + 'static>(inner: R) -> Self {
        Self::new(Box::new(StreamBackend { inner }))
    }

    /// 包装套接字, 可设置读取超时
    pub fn from_socket(stream: TcpStream, timeout: Option<Duration>) -> YinResult<Self> {
        if let Some(t) = timeout {
            stream.set_read_timeout(Some(t))?;
        }
        Ok(Self::from_stream(stream))
    }

    /// 包装调用方回调
    ///
    /// 缺少读取回调时返回 `NoReader`.
    pub fn from_callbacks(callbacks: HandleCallbacks) -> YinResult<Self> {
        let HandleCallbacks {
            read,
            seek,
            cleanup,
        } = callbacks;
        let Some(read) = read else {
            // 清理回调仍需执行
            if let Some(cleanup) = cleanup {
                cleanup();
            }
            return Err(YinError::NoReader);
        };
        Ok(Self::new(Box::new(CallbackBackend {
            read,
            seek,
            cleanup,
        })))
    }

    /// 从内存数据创建
    pub fn from_memory(data: Vec<u8>) -> Self {
        Self::new(Box::new(MemoryBackend::from_data(data)))
    }

    /// 创建推送模式上下文
    pub fn feed() -> Self {
        Self::with_backend(None, 0)
    }

    /// 来源种类
    pub fn kind(&self) -> IoKind {
        self.backend.as_ref().map_or(IoKind::Feed, |b| b.kind())
    }

    /// 是否为推送模式
    pub fn is_feed(&self) -> bool {
        self.backend.is_none()
    }

    /// 是否支持随机访问
    pub fn is_seekable(&self) -> bool {
        self.backend.as_ref().is_some_and(|b| b.is_seekable())
    }

    /// 流总字节数
    pub fn size(&self) -> Option<WideOff> {
        self.size_override
            .or_else(|| self.backend.as_ref().and_then(|b| b.size()))
    }

    /// 声明流总字节数 (用于无法获知长度的来源)
    pub fn set_size(&mut self, size: WideOff) {
        self.size_override = (size >= 0).then_some(size);
    }

    /// 当前读取位置
    pub fn tell(&self) -> WideOff {
        self.base + self.cursor as WideOff
    }

    /// 缓冲区中尚未读取的字节数
    pub fn buffered(&self) -> usize {
        self.buf.len() - self.cursor
    }

    /// 缓冲区末尾对应的流位置 (推送模式下即下一个喂入字节的位置)
    pub fn buffered_end(&self) -> WideOff {
        self.base + self.buf.len() as WideOff
    }

    fn check_open(&self) -> YinResult<()> {
        if self.closed {
            Err(YinError::NoStream)
        } else {
            Ok(())
        }
    }

    /// 保证缓冲区中至少有 `want` 字节可读 (流结束时可能不足)
    fn fill(&mut self, want: usize) -> YinResult<usize> {
        self.check_open()?;
        let Some(backend) = self.backend.as_mut() else {
            return Ok(self.buf.len() - self.cursor);
        };
        while self.buf.len() - self.cursor < want && !self.eof {
            let old_len = self.buf.len();
            self.buf.resize(old_len + READ_CHUNK, 0);
            let result = backend.read(&mut self.buf[old_len..]);
            match result {
                Ok(0) => {
                    self.buf.truncate(old_len);
                    self.eof = true;
                    trace!("I/O: 流结束于 {}", self.base + old_len as WideOff);
                }
                Ok(n) => self.buf.truncate(old_len + n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                    self.buf.truncate(old_len);
                }
                Err(e) => {
                    self.buf.truncate(old_len);
                    return Err(YinError::Io(e));
                }
            }
        }
        Ok(self.buf.len() - self.cursor)
    }

    /// 查看接下来的 `n` 字节, 不移动读取位置
    ///
    /// 推送模式数据不足返回 `NeedMoreData`, 其他来源流结束返回 `Eof`.
    pub fn peek(&mut self, n: usize) -> YinResult<&[u8]> {
        if self.fill(n)? < n {
            return Err(if self.is_feed() {
                YinError::NeedMoreData
            } else {
                YinError::Eof
            });
        }
        Ok(&self.buf[self.cursor..self.cursor + n])
    }

    /// 读取恰好 `n` 字节
    pub fn read_exact(&mut self, n: usize) -> YinResult<&[u8]> {
        self.peek(n)?;
        let start = self.cursor;
        self.cursor += n;
        Ok(&self.buf[start..start + n])
    }

    /// 读取最多 `out.len()` 字节, 流结束时返回实际字节数
    ///
    /// 推送模式下只做整体读取: 数据不足返回 `NeedMoreData` 且不消耗.
    pub fn read(&mut self, out: &mut [u8]) -> YinResult<usize> {
        let available = self.fill(out.len())?;
        if self.is_feed() && available < out.len() {
            return Err(YinError::NeedMoreData);
        }
        let n = available.min(out.len());
        out[..n].copy_from_slice(&self.buf[self.cursor..self.cursor + n]);
        self.cursor += n;
        Ok(n)
    }

    /// 跳过 `n` 字节
    pub fn skip(&mut self, n: WideOff) -> YinResult<()> {
        if n <= 0 {
            return Ok(());
        }
        if n <= self.buffered() as WideOff || self.is_feed() || !self.is_seekable() {
            let n = to_usize(n)?;
            if self.fill(n)? < n {
                return Err(if self.is_feed() {
                    YinError::NeedMoreData
                } else {
                    YinError::Eof
                });
            }
            self.cursor += n;
            return Ok(());
        }
        let target = self.tell() + n;
        self.seek(target, Whence::Set).map(|_| ())
    }

    /// 标记当前位置
    pub fn mark(&mut self) {
        self.mark = self.cursor;
    }

    /// 回到上次标记的位置
    pub fn rewind(&mut self) {
        self.cursor = self.mark.min(self.cursor);
    }

    /// 丢弃当前位置之前的数据
    pub fn forget(&mut self) {
        self.buf.advance(self.cursor);
        self.base += self.cursor as WideOff;
        self.cursor = 0;
        self.mark = 0;
    }

    /// 定位到流位置
    ///
    /// 目标在缓冲区内时不访问后端. 推送模式只能在缓冲区内定位.
    pub fn seek(&mut self, offset: WideOff, whence: Whence) -> YinResult<WideOff> {
        self.check_open()?;
        let target = match whence {
            Whence::Set => Some(offset),
            Whence::Cur => Some(self.tell() + offset),
            Whence::End => self.size().map(|s| s + offset),
        };
        if let Some(target) = target {
            if target < 0 {
                return Err(YinError::InvalidArgument(format!("seek 位置不能为负: {target}")));
            }
            let end = self.base + self.buf.len() as WideOff;
            if target >= self.base && target <= end {
                self.cursor = to_usize(target - self.base)?;
                self.mark = self.mark.min(self.cursor);
                return Ok(target);
            }
        }

        let backend = self.backend.as_mut().ok_or(YinError::NoSeek)?;
        if !backend.is_seekable() {
            return Err(YinError::NoSeek);
        }
        let pos = match target {
            Some(t) => backend.seek(t, Whence::Set)?,
            None => backend.seek(offset, Whence::End)?,
        };
        trace!("I/O: 定位到 {pos}");
        self.buf.clear();
        self.cursor = 0;
        self.mark = 0;
        self.base = pos;
        self.eof = false;
        Ok(pos)
    }

    /// 推送数据 (仅推送模式)
    pub fn feed_data(&mut self, data: &[u8]) -> YinResult<()> {
        self.check_open()?;
        if !self.is_feed() {
            return Err(YinError::Unsupported("非推送模式不能喂入数据".into()));
        }
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// 丢弃所有缓冲数据, 并声明下一个喂入字节位于 `offset`
    pub fn feed_set_pos(&mut self, offset: WideOff) -> WideOff {
        self.buf.clear();
        self.cursor = 0;
        self.mark = 0;
        self.base = offset;
        self.eof = false;
        offset
    }

    /// 关闭底层资源
    ///
    /// 自行打开的文件被释放, 调用方句柄的清理回调被调用一次.
    pub fn close(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.close();
        }
        self.buf.clear();
        self.cursor = 0;
        self.mark = 0;
        self.closed = true;
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl std::fmt::Debug for IoContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoContext")
            .field("kind", &self.kind())
            .field("pos", &self.tell())
            .field("buffered", &self.buffered())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_内存读取与短读() {
        let mut io = IoContext::from_memory(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(io.read(&mut buf).unwrap(), 3);
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(io.tell(), 3);
        assert_eq!(io.read(&mut buf).unwrap(), 2);
        assert_eq!(io.read(&mut buf).unwrap(), 0);
        assert!(matches!(io.peek(1), Err(YinError::Eof)));
    }

    #[test]
    fn test_缓冲区内定位() {
        let mut io = IoContext::from_memory((0..100).collect());
        io.read_exact(10).unwrap();
        assert_eq!(io.seek(4, Whence::Set).unwrap(), 4);
        assert_eq!(io.read_exact(1).unwrap(), &[4]);
        assert_eq!(io.seek(-2, Whence::End).unwrap(), 98);
        assert_eq!(io.read_exact(2).unwrap(), &[98, 99]);
        assert!(io.seek(-1, Whence::Set).is_err());
    }

    #[test]
    fn test_中断重试() {
        let mut calls = 0;
        let cb = HandleCallbacks::new(move |buf: &mut [u8]| {
            calls += 1;
            match calls {
                1 => Err(io::Error::new(io::ErrorKind::Interrupted, "信号")),
                2 => {
                    buf[0] = 7;
                    Ok(1)
                }
                _ => Ok(0),
            }
        });
        let mut io = IoContext::from_callbacks(cb).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(io.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 7);
    }

    #[test]
    fn test_真实错误不被吞掉() {
        let cb = HandleCallbacks::new(|_buf: &mut [u8]| Err(io::Error::other("坏扇区")));
        let mut io = IoContext::from_callbacks(cb).unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(io.read(&mut buf), Err(YinError::Io(_))));
    }

    #[test]
    fn test_缺少读取回调() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let cb = HandleCallbacks::default().with_cleanup(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        assert!(matches!(IoContext::from_callbacks(cb), Err(YinError::NoReader)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_清理回调只调用一次() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let cb = HandleCallbacks::new(|_buf: &mut [u8]| Ok(0)).with_cleanup(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let mut io = IoContext::from_callbacks(cb).unwrap();
        io.close();
        io.close();
        drop(io);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let counter2 = Arc::new(AtomicUsize::new(0));
        let c2 = Arc::clone(&counter2);
        let cb = HandleCallbacks::new(|_buf: &mut [u8]| Ok(0)).with_cleanup(move || {
            c2.fetch_add(1, Ordering::SeqCst);
        });
        drop(IoContext::from_callbacks(cb).unwrap());
        assert_eq!(counter2.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_窄定位回调溢出() {
        let cb = HandleCallbacks::new(|_buf: &mut [u8]| Ok(0))
            .with_narrow_seek(|off: NarrowOff, _whence| Ok(off));
        let mut io = IoContext::from_callbacks(cb).unwrap();
        assert_eq!(io.kind(), IoKind::NarrowHandle);
        let big = WideOff::from(i32::MAX) + 10;
        match io.seek(big, Whence::Set) {
            Err(YinError::Overflow(v)) => assert_eq!(v, big),
            other => panic!("期望溢出错误, 实际 {other:?}"),
        }
        assert_eq!(io.seek(1000, Whence::Set).unwrap(), 1000);
        assert_eq!(io.tell(), 1000);
    }

    #[test]
    fn test_推送模式() {
        let mut io = IoContext::feed();
        assert!(io.is_feed());
        assert!(!io.is_seekable());
        io.feed_data(&[1, 2]).unwrap();
        io.mark();
        assert_eq!(io.read_exact(1).unwrap(), &[1]);
        assert!(matches!(io.read_exact(2), Err(YinError::NeedMoreData)));
        io.rewind();
        assert_eq!(io.tell(), 0);
        io.feed_data(&[3]).unwrap();
        assert_eq!(io.read_exact(3).unwrap(), &[1, 2, 3]);
        io.forget();
        assert_eq!(io.tell(), 3);
        assert_eq!(io.buffered(), 0);
        assert!(matches!(io.seek(100, Whence::Set), Err(YinError::NoSeek)));

        assert_eq!(io.feed_set_pos(5000), 5000);
        io.feed_data(&[9]).unwrap();
        assert_eq!(io.tell(), 5000);
        assert_eq!(io.read_exact(1).unwrap(), &[9]);
    }

    #[test]
    fn test_路径打开失败() {
        let err = IoContext::open_path("/nonexistent/yin/test.mp2").unwrap_err();
        assert!(matches!(err, YinError::BadFile(_)));
    }

    #[test]
    fn test_关闭后不可读() {
        let mut io = IoContext::from_memory(vec![0; 8]);
        io.close();
        assert!(io.is_closed());
        assert!(matches!(io.peek(1), Err(YinError::NoStream)));
    }
}
