//! 帧索引.
//!
//! 稀疏的 帧号 -> 字节偏移 表, 第 `i` 项对应帧 `i * step`.
//! 容量用尽时要么按 `grow_size` 扩容, 要么折叠: 丢弃每隔一项, 步长翻倍,
//! 用固定内存覆盖整个流.

use log::trace;
use serde::{Deserialize, Serialize};
use yin_core::{WideOff, YinError, YinResult};

/// 索引导出快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSnapshot {
    /// 字节偏移, 第 `i` 项对应帧 `i * step`
    pub offsets: Vec<WideOff>,
    /// 相邻项之间的帧数
    pub step: WideOff,
    /// 有效项数
    pub fill: usize,
}

/// 帧索引
#[derive(Debug, Clone)]
pub struct FrameIndex {
    data: Vec<WideOff>,
    step: WideOff,
    size: usize,
    grow_size: usize,
    /// 下一个应记录的帧号
    next: WideOff,
}

impl FrameIndex {
    /// 创建索引, `size == 0` 表示禁用; `grow_size > 0` 时满后扩容而非折叠
    pub fn new(size: usize, grow_size: usize) -> Self {
        Self {
            data: Vec::with_capacity(size),
            step: 1,
            size,
            grow_size,
            next: 0,
        }
    }

    /// 清空内容, 保留容量设置
    pub fn reset(&mut self) {
        self.data.clear();
        self.step = 1;
        self.next = 0;
    }

    /// 是否启用
    pub fn is_enabled(&self) -> bool {
        self.size > 0
    }

    /// 有效项数
    pub fn fill(&self) -> usize {
        self.data.len()
    }

    /// 容量
    pub fn size(&self) -> usize {
        self.size
    }

    /// 步长
    pub fn step(&self) -> WideOff {
        self.step
    }

    /// 下一个应记录的帧号
    pub fn next_frame(&self) -> WideOff {
        self.next
    }

    /// 有效项
    pub fn offsets(&self) -> &[WideOff] {
        &self.data
    }

    /// 设置扩容步长
    pub fn set_grow_size(&mut self, grow_size: usize) {
        self.grow_size = grow_size;
    }

    fn update_next(&mut self) {
        self.next = self.data.len() as WideOff * self.step;
    }

    /// 折叠: 保留偶数项, 步长翻倍
    ///
    /// 只有一项时保留第 0 帧, 步长照样翻倍.
    fn fold(&mut self) {
        if self.data.is_empty() {
            return;
        }
        let half = self.data.len().div_ceil(2);
        for c in 0..half {
            self.data[c] = self.data[2 * c];
        }
        self.data.truncate(half);
        self.step *= 2;
        self.update_next();
        trace!("帧索引折叠: fill={}, step={}", half, self.step);
    }

    /// 调整容量
    ///
    /// 新容量小于当前项数时反复折叠直到放得下. 容量 0 清空并禁用索引.
    pub fn resize(&mut self, new_size: usize) {
        if new_size == 0 {
            self.data = Vec::new();
            self.size = 0;
            self.step = 1;
            self.next = 0;
            return;
        }
        while self.data.len() > new_size {
            self.fold();
        }
        self.size = new_size;
        if self.data.capacity() < new_size {
            self.data.reserve(new_size - self.data.len());
        }
        self.update_next();
    }

    /// 记录帧 `frame` 的字节偏移
    ///
    /// 只接受 `frame == next_frame()` 的调用. 返回是否实际写入.
    pub fn add(&mut self, frame: WideOff, offset: WideOff) -> bool {
        if self.size == 0 || frame != self.next {
            return false;
        }
        if self.data.last().is_some_and(|&last| offset <= last) {
            return false;
        }
        if self.data.len() == self.size {
            let framenum = self.data.len() as WideOff * self.step;
            if self.grow_size > 0 {
                self.size += self.grow_size;
                self.data.reserve(self.grow_size);
            } else {
                self.fold();
            }
            // 折叠后该帧可能不再落在步长上
            self.update_next();
            if self.next != framenum {
                return false;
            }
        }
        self.data.push(offset);
        self.update_next();
        true
    }

    /// 整体替换内容
    ///
    /// `step` 必须为正, `fill` 不超过 `offsets.len()`, 偏移严格递增.
    pub fn set(&mut self, offsets: &[WideOff], step: WideOff, fill: usize) -> YinResult<()> {
        if step <= 0 {
            return Err(YinError::BadIndexParam(format!("步长必须为正: {step}")));
        }
        if fill > offsets.len() {
            return Err(YinError::BadIndexParam(format!(
                "有效项数 {fill} 超过数据长度 {}",
                offsets.len()
            )));
        }
        let entries = &offsets[..fill];
        if entries.windows(2).any(|w| w[1] <= w[0]) || entries.first().is_some_and(|&o| o < 0) {
            return Err(YinError::BadIndexParam("偏移必须非负且严格递增".into()));
        }
        self.data.clear();
        self.data.extend_from_slice(entries);
        self.step = step;
        self.size = self.size.max(fill);
        self.update_next();
        Ok(())
    }

    /// 查找目标帧之前最近的索引项, 返回 (项对应帧号, 字节偏移)
    ///
    /// 空索引返回 `(0, stream_start)`.
    pub fn find(&self, frame: WideOff, stream_start: WideOff) -> (WideOff, WideOff) {
        if self.data.is_empty() || frame < 0 {
            return (0, stream_start);
        }
        let fi = ((frame / self.step) as usize).min(self.data.len() - 1);
        (fi as WideOff * self.step, self.data[fi])
    }

    /// 导出快照
    pub fn snapshot(&self) -> IndexSnapshot {
        IndexSnapshot {
            offsets: self.data.clone(),
            step: self.step,
            fill: self.data.len(),
        }
    }

    /// 从快照导入
    pub fn restore(&mut self, snapshot: &IndexSnapshot) -> YinResult<()> {
        self.set(&snapshot.offsets, snapshot.step, snapshot.fill)
    }
}
