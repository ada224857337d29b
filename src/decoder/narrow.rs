//! 窄位置类型接口.
//!
//! 每个位置相关操作的 32 位版本, 只做宽窄转换, 不改变行为.
//! 结果超出 [`NarrowOff`] 范围时返回 [`YinError::Overflow`].

use log::trace;
use yin_core::offset::{to_narrow, to_wide};
use yin_core::{NarrowOff, Whence, YinError, YinResult};
use yin_format::{IndexSnapshot, IoKind};

use super::Decoder;

/// 窄接口的附加状态, 首次调用任一窄接口时创建
#[derive(Debug, Default)]
pub(crate) struct NarrowState {
    /// 最近一次使用时的输入来源
    pub io_kind: Option<IoKind>,
    /// 帧索引的窄化副本
    pub index: Vec<NarrowOff>,
}

impl Decoder {
    /// 取得窄接口状态; 输入来源变化时丢弃旧的索引副本
    fn narrow_state(&mut self) -> &mut NarrowState {
        let io_kind = self.io.as_ref().map(|io| io.kind());
        let state = self.narrow.get_or_insert_with(|| {
            trace!("创建窄接口状态");
            NarrowState::default()
        });
        if state.io_kind != io_kind {
            if !state.index.is_empty() {
                trace!("输入来源 {:?} -> {:?}, 丢弃窄索引副本", state.io_kind, io_kind);
                state.index.clear();
            }
            state.io_kind = io_kind;
        }
        state
    }

    /// [`seek`](Self::seek) 的窄版本
    pub fn seek_narrow(&mut self, sample: NarrowOff, whence: Whence) -> YinResult<NarrowOff> {
        self.narrow_state();
        to_narrow(self.seek(to_wide(sample), whence)?)
    }

    /// [`feed_seek`](Self::feed_seek) 的窄版本
    pub fn feed_seek_narrow(
        &mut self,
        sample: NarrowOff,
        whence: Whence,
    ) -> YinResult<(NarrowOff, NarrowOff)> {
        self.narrow_state();
        let (pos, input_offset) = self.feed_seek(to_wide(sample), whence)?;
        Ok((to_narrow(pos)?, to_narrow(input_offset)?))
    }

    /// [`seek_frame`](Self::seek_frame) 的窄版本
    pub fn seek_frame_narrow(&mut self, frame: NarrowOff, whence: Whence) -> YinResult<NarrowOff> {
        self.narrow_state();
        to_narrow(self.seek_frame(to_wide(frame), whence)?)
    }

    pub fn tell_narrow(&mut self) -> YinResult<NarrowOff> {
        self.narrow_state();
        to_narrow(self.tell())
    }

    pub fn tell_frame_narrow(&mut self) -> YinResult<NarrowOff> {
        self.narrow_state();
        to_narrow(self.tell_frame())
    }

    pub fn tell_stream_narrow(&mut self) -> YinResult<NarrowOff> {
        self.narrow_state();
        to_narrow(self.tell_stream()?)
    }

    pub fn length_narrow(&mut self) -> YinResult<NarrowOff> {
        self.narrow_state();
        to_narrow(self.length()?)
    }

    pub fn frame_length_narrow(&mut self) -> YinResult<NarrowOff> {
        self.narrow_state();
        to_narrow(self.frame_length()?)
    }

    pub fn scan_narrow(&mut self) -> YinResult<NarrowOff> {
        self.narrow_state();
        to_narrow(self.scan()?)
    }

    pub fn time_frame_narrow(&mut self, seconds: f64) -> YinResult<NarrowOff> {
        self.narrow_state();
        to_narrow(self.time_frame(seconds)?)
    }

    pub fn set_filesize_narrow(&mut self, size: NarrowOff) -> YinResult<()> {
        self.narrow_state();
        self.set_filesize(to_wide(size))
    }

    /// [`index`](Self::index) 的窄版本, 返回 (偏移, 步长, 有效项数)
    ///
    /// 任何一项偏移放不进窄类型时整体失败.
    pub fn index_narrow(&mut self) -> YinResult<(&[NarrowOff], NarrowOff, usize)> {
        let snapshot = self.index.snapshot();
        let step = to_narrow(snapshot.step)?;
        let offsets = snapshot
            .offsets
            .iter()
            .map(|&o| to_narrow(o))
            .collect::<YinResult<Vec<_>>>()?;
        let state = self.narrow_state();
        state.index = offsets;
        Ok((&state.index, step, snapshot.fill))
    }

    /// [`set_index`](Self::set_index) 的窄版本
    pub fn set_index_narrow(
        &mut self,
        offsets: &[NarrowOff],
        step: NarrowOff,
        fill: usize,
    ) -> YinResult<()> {
        if fill > offsets.len() {
            return Err(YinError::BadIndexParam(format!(
                "有效项数 {fill} 超过数据长度 {}",
                offsets.len()
            )));
        }
        let snapshot = IndexSnapshot {
            offsets: offsets.iter().copied().map(to_wide).collect(),
            step: to_wide(step),
            fill,
        };
        self.set_index(&snapshot)?;
        self.narrow_state().index = offsets[..fill].to_vec();
        Ok(())
    }
}
