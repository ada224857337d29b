//! CRC 校验和计算.
//!
//! MPEG 音频帧的可选 CRC-16 (多项式 0x8005, 初始值 0xFFFF).
//! 受保护区域为帧头后 16 位加上位分配等侧信息, 长度不一定是整字节,
//! 因此同时提供按字节与按位两种更新方式.

/// CRC-16 查找表 (多项式 0x8005)
const CRC16_TABLE: [u16; 256] = {
    let mut table = [0u16; 256];
    let mut i = 0u16;
    while i < 256 {
        let mut crc = i << 8;
        let mut j = 0;
        while j < 8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x8005;
            } else {
                crc <<= 1;
            }
            j += 1;
        }
        table[i as usize] = crc;
        i += 1;
    }
    table
};

/// MPEG 音频 CRC 初始值
pub const MPEG_CRC_INIT: u16 = 0xFFFF;

/// 按整字节更新 CRC-16
pub fn crc16_update(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc = (crc << 8) ^ CRC16_TABLE[((crc >> 8) as u8 ^ byte) as usize];
    }
    crc
}

/// 按位更新 CRC-16, 只处理 `data` 的前 `nbits` 位
pub fn crc16_update_bits(crc: u16, data: &[u8], nbits: usize) -> u16 {
    let whole = (nbits / 8).min(data.len());
    let mut crc = crc16_update(crc, &data[..whole]);
    let rest = nbits - whole * 8;
    if rest > 0 && whole < data.len() {
        let byte = data[whole];
        for i in 0..rest {
            let bit = (byte >> (7 - i)) & 1;
            let top = ((crc >> 15) as u8) & 1;
            crc <<= 1;
            if top ^ bit != 0 {
                crc ^= 0x8005;
            }
        }
    }
    crc
}

/// 计算 MPEG 音频帧的 CRC
///
/// `header` 为 4 字节帧头, 只有后两个字节参与计算;
/// `side` 为帧头 (及 CRC 字段) 之后的数据, 参与计算的位数为 `side_bits`.
pub fn mpeg_frame_crc(header: &[u8; 4], side: &[u8], side_bits: usize) -> u16 {
    let crc = crc16_update(MPEG_CRC_INIT, &header[2..4]);
    crc16_update_bits(crc, side, side_bits)
}
