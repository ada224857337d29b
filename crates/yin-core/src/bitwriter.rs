//! 构造测试码流用的位流写入器.
//!
//! 与 [`BitReader`](crate::bitreader::BitReader) 位序相同, 只在测试或启用
//! `test-util` 特性时编译.

/// 位流写入器
///
/// # 示例
/// ```
/// use yin_core::bitwriter::BitWriter;
///
/// let mut bw = BitWriter::new();
/// bw.write_bits(2, 4);
/// bw.write_bits(3, 4);
/// bw.write_bits(0b10, 2);
/// assert_eq!(bw.finish(), vec![0x23, 0x80]);
/// ```
#[derive(Debug, Default)]
pub struct BitWriter {
    data: Vec<u8>,
    /// 尚未成整字节的位, 右对齐
    acc: u64,
    acc_bits: u32,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的位数
    pub fn bits_written(&self) -> usize {
        self.data.len() * 8 + self.acc_bits as usize
    }

    /// 写入 `value` 的低 `n` 位 (最多 32 位), 高位在前
    pub fn write_bits(&mut self, value: u32, n: u32) {
        debug_assert!(n <= 32, "一次最多写入 32 位, 请求 {n}");
        if n == 0 {
            return;
        }
        let mask = (1u64 << n) - 1;
        self.acc = self.acc << n | (u64::from(value) & mask);
        self.acc_bits += n;
        while self.acc_bits >= 8 {
            self.acc_bits -= 8;
            self.data.push((self.acc >> self.acc_bits) as u8);
        }
        self.acc &= (1u64 << self.acc_bits) - 1;
    }

    /// 结束写入, 末尾不足一字节的部分以 0 补齐
    pub fn finish(mut self) -> Vec<u8> {
        if self.acc_bits > 0 {
            self.data.push((self.acc << (8 - self.acc_bits)) as u8);
        }
        self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitReader;

    #[test]
    fn test_整字节写入() {
        let mut bw = BitWriter::new();
        bw.write_bits(0xFFFD_9004, 32);
        assert_eq!(bw.bits_written(), 32);
        assert_eq!(bw.finish(), vec![0xFF, 0xFD, 0x90, 0x04]);
    }

    #[test]
    fn test_不对齐位域() {
        let mut bw = BitWriter::new();
        bw.write_bits(0b101, 3);
        bw.write_bits(0x3FF, 10);
        bw.write_bits(0, 1);
        assert_eq!(bw.bits_written(), 14);
        assert_eq!(bw.finish(), vec![0b1011_1111, 0b1111_1000]);
    }

    #[test]
    fn test_高位被截掉() {
        let mut bw = BitWriter::new();
        bw.write_bits(0xFF, 2);
        bw.write_bits(0, 6);
        assert_eq!(bw.finish(), vec![0b1100_0000]);
    }

    #[test]
    fn test_与读取器位序一致() {
        // 帧头之后的位分配, scfsi 与比例因子
        let fields: [(u32, u32); 6] = [(2, 4), (3, 4), (2, 2), (2, 2), (6, 6), (63, 6)];
        let mut bw = BitWriter::new();
        for &(v, n) in &fields {
            bw.write_bits(v, n);
        }
        let data = bw.finish();
        let mut br = BitReader::new(&data);
        for &(v, n) in &fields {
            assert_eq!(br.read_bits(n).unwrap(), v);
        }
    }
}
