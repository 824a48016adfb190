//! 6-bit 字符编码
//!
//! SCIP 2.0 把数值拆成 6-bit 分组，每组加上 0x30 变成可打印字符，
//! 高位在前。测距值用 3 字符（18 bit），时间戳用 4 字符（24 bit）。

use crate::ProtocolError;

/// 字符偏移量
pub const CHAR_OFFSET: u8 = 0x30;

/// 单个编码字符能表示的最大值
const CHAR_MASK: u32 = 0x3F;

/// 计算校验字符
///
/// 对 `payload` 所有字节求和，取低 6 位后加 0x30。
///
/// # Example
///
/// ```
/// use urg_protocol::checksum;
///
/// assert_eq!(checksum(b"00"), b'P');
/// assert_eq!(checksum(b"99"), b'b');
/// assert_eq!(checksum(b"DMIN:20"), b'4');
/// ```
pub fn checksum(payload: &[u8]) -> u8 {
    let sum: u32 = payload.iter().map(|&b| b as u32).sum();
    (sum & CHAR_MASK) as u8 + CHAR_OFFSET
}

/// 校验一行数据（最后一个字符为校验字符）
///
/// 返回去掉校验字符后的有效载荷。
pub fn verify_line(line: &str) -> Result<&str, ProtocolError> {
    let bytes = line.as_bytes();
    let Some((&actual, payload)) = bytes.split_last() else {
        return Err(ProtocolError::EmptyBlock);
    };
    let expected = checksum(payload);
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch {
            line: line.to_string(),
            expected: expected as char,
            actual: actual as char,
        });
    }
    // 校验字符总在 0x30..=0x6F 内：末字节匹配成功时它必是完整的 ASCII 字符，切片边界合法
    Ok(&line[..payload.len()])
}

/// 解码若干字符为一个整数（高位在前）
///
/// # 错误
/// - `ProtocolError::InvalidCharacter`: 字符超出 `0x30..=0x6F`
pub fn decode_chars(chars: &[u8]) -> Result<u32, ProtocolError> {
    chars.iter().try_fold(0u32, |acc, &c| {
        if !(CHAR_OFFSET..=CHAR_OFFSET + CHAR_MASK as u8).contains(&c) {
            return Err(ProtocolError::InvalidCharacter { byte: c });
        }
        Ok((acc << 6) | (c - CHAR_OFFSET) as u32)
    })
}

/// 把整数编码为 `width` 个字符（高位在前，超出部分截断）
pub fn encode_chars(value: u32, width: usize) -> Vec<u8> {
    (0..width)
        .rev()
        .map(|i| ((value >> (6 * i as u32)) & CHAR_MASK) as u8 + CHAR_OFFSET)
        .collect()
}

/// 按固定宽度解码一串字符
///
/// # 错误
/// - `ProtocolError::InvalidLength`: 长度不是 `width` 的整数倍
pub fn decode_sequence(chars: &[u8], width: usize) -> Result<Vec<u32>, ProtocolError> {
    if !chars.len().is_multiple_of(width) {
        return Err(ProtocolError::InvalidLength {
            len: chars.len(),
            width,
        });
    }
    chars.chunks_exact(width).map(decode_chars).collect()
}
