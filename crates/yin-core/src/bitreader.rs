//! Layer I/II 帧体的位流读取.
//!
//! 位分配、scfsi、比例因子与采样码都是不超过 16 bit 的大端位域,
//! 紧密排列且不按字节对齐. 读取器按位计数, 每次从当前字节起取 5 字节窗口
//! 截出所需位域.

use crate::{YinError, YinResult};

/// 帧体位流读取器
///
/// 位数不足时返回 [`YinError::Eof`], 读取位置不变; 解码器据此判定帧数据不足.
///
/// # 示例
/// ```
/// use yin_core::bitreader::BitReader;
///
/// // 立体声 Layer II: 子带 0 的两个 4 bit 位分配码
/// let payload = [0x23, 0x80];
/// let mut br = BitReader::new(&payload);
/// assert_eq!(br.read_bits(4).unwrap(), 2);
/// assert_eq!(br.read_bits(4).unwrap(), 3);
/// assert_eq!(br.read_bits(2).unwrap(), 0b10);
/// assert_eq!(br.bits_read(), 10);
/// ```
pub struct BitReader<'a> {
    data: &'a [u8],
    /// 已消耗的位数
    pos: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 已读取的位数
    pub fn bits_read(&self) -> usize {
        self.pos
    }

    /// 剩余位数
    pub fn bits_left(&self) -> usize {
        (self.data.len() * 8).saturating_sub(self.pos)
    }

    /// 读取 `n` 位 (最多 32 位), 高位在前
    pub fn read_bits(&mut self, n: u32) -> YinResult<u32> {
        if n == 0 {
            return Ok(0);
        }
        if n > 32 {
            return Err(YinError::InvalidArgument(format!("一次最多读取 32 位, 请求 {n}")));
        }
        if n as usize > self.bits_left() {
            return Err(YinError::Eof);
        }

        let start = self.pos / 8;
        let window = (0..5).fold(0u64, |acc, i| {
            acc << 8 | u64::from(self.data.get(start + i).copied().unwrap_or(0))
        });
        let offset = (self.pos % 8) as u32;
        let value = (window >> (40 - offset - n)) & ((1u64 << n) - 1);
        self.pos += n as usize;
        Ok(value as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_位分配码序列() {
        // 4,4,3,3,2 bit 的位域紧密排列
        let data = [0b1011_0001, 0b0111_0100];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(4).unwrap(), 0b1011);
        assert_eq!(br.read_bits(4).unwrap(), 0b0001);
        assert_eq!(br.read_bits(3).unwrap(), 0b011);
        assert_eq!(br.read_bits(3).unwrap(), 0b101);
        assert_eq!(br.read_bits(2).unwrap(), 0b00);
        assert_eq!(br.bits_left(), 0);
    }

    #[test]
    fn test_跨五字节读取() {
        let data = [0x0F, 0xFF, 0x00, 0xFF, 0xF0];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(4).unwrap(), 0);
        assert_eq!(br.read_bits(32).unwrap(), 0xFFF0_0FFF);
        assert_eq!(br.read_bits(4).unwrap(), 0);
    }

    #[test]
    fn test_位数不足不移动位置() {
        let data = [0xAB];
        let mut br = BitReader::new(&data);
        br.read_bits(5).unwrap();
        assert!(matches!(br.read_bits(4), Err(YinError::Eof)));
        assert_eq!(br.bits_read(), 5);
        assert_eq!(br.read_bits(3).unwrap(), 0b011);
        assert!(matches!(br.read_bits(1), Err(YinError::Eof)));
    }

    #[test]
    fn test_参数校验() {
        let data = [0u8; 8];
        let mut br = BitReader::new(&data);
        assert_eq!(br.read_bits(0).unwrap(), 0);
        assert!(matches!(br.read_bits(33), Err(YinError::InvalidArgument(_))));
        assert_eq!(br.bits_read(), 0);
        assert_eq!(BitReader::new(&[]).bits_left(), 0);
    }
}
