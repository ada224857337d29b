//! 统一错误类型定义.
//!
//! 所有 Yin crate 共用的错误类型, 支持跨模块传播.
//!
//! 错误分为四类:
//! - 配置错误 (参数、采样率、声道数): 调用立即失败, 句柄状态不变
//! - 流错误 (读取、定位、失步): 当前操作失败, 句柄仍可关闭
//! - 帧内错误 (单个损坏帧): 由状态机补零恢复, 不中断流
//! - 表示错误 (宽位置无法放入窄类型): 与 I/O 错误区分报告

use thiserror::Error;

/// Yin 统一错误类型
#[derive(Debug, Error)]
pub enum YinError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 参数值超出允许范围
    #[error("无效解码参数: {0}")]
    BadParam(String),

    /// 无效采样率 (非正, 超过上限, 或重采样比例过大)
    #[error("无效采样率: {0}")]
    BadRate(String),

    /// 无效声道数
    #[error("无效声道数: {0}")]
    BadChannels(u32),

    /// 无效帧索引参数
    #[error("无效帧索引参数: {0}")]
    BadIndexParam(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 无法打开文件
    #[error("无法打开文件: {0}")]
    BadFile(String),

    /// 提供了句柄但没有读取回调
    #[error("句柄缺少读取回调")]
    NoReader,

    /// 尚未打开任何流
    #[error("尚未打开输入流")]
    NoStream,

    /// 流不支持随机访问
    #[error("流不支持 seek")]
    NoSeek,

    /// 流长度未知, 无法从末尾定位
    #[error("流长度未知, 无法从末尾定位")]
    NoSeekFromEnd,

    /// 当前位置无效, 只允许绝对定位
    #[error("当前位置无效, 只允许绝对定位")]
    NoRelativeSeek,

    /// 在重同步上限内未找到有效帧
    #[error("重同步失败: 已跳过 {0} 字节")]
    ResyncFailed(i64),

    /// 码流失步且未允许重同步
    #[error("码流失步: 偏移 {0}")]
    OutOfSync(i64),

    /// 无效数据 (损坏的帧等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 整数宽度转换溢出
    #[error("位置宽度转换溢出: {0} 超出目标类型范围")]
    Overflow(i64),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 内部错误 (不应发生)
    #[error("内部错误: {0}")]
    Internal(String),
}

impl YinError {
    /// 是否为帧内可恢复错误
    pub fn is_frame_local(&self) -> bool {
        matches!(self, Self::InvalidData(_))
    }

    /// 是否为宽度转换错误
    pub fn is_overflow(&self) -> bool {
        matches!(self, Self::Overflow(_))
    }
}

/// Yin 统一 Result 类型
pub type YinResult<T> = Result<T, YinError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_is_not_io() {
        let err = YinError::Overflow(i64::from(i32::MAX) + 1);
        assert!(err.is_overflow());
        assert!(!matches!(err, YinError::Io(_)));
        assert!(err.to_string().contains("2147483648"));
    }

    #[test]
    fn test_io_from() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: YinError = io.into();
        assert!(matches!(err, YinError::Io(_)));
        assert!(!err.is_frame_local());
    }
}
