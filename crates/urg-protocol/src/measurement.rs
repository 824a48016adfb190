//! 测距帧（`MD` 响应）

use crate::ProtocolError;
use crate::encoding::{checksum, decode_chars, decode_sequence, encode_chars, verify_line};
use crate::response::ResponseBlock;

/// 测距值的编码宽度（3 字符 = 18 bit）
pub const RANGE_WIDTH: usize = 3;

/// 时间戳的编码宽度（4 字符 = 24 bit）
pub const TIMESTAMP_WIDTH: usize = 4;

/// 每个数据行的最大有效字符数
pub const LINE_PAYLOAD_LEN: usize = 64;

/// 连续测距时数据块的状态码
pub const STATUS_DATA: &str = "99";

/// 一帧测距数据
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeasurementFrame {
    /// 传感器时间戳（ms，24 bit 回绕）
    pub timestamp: u32,
    /// 按步号递增排列的测距值（mm）
    pub ranges: Vec<u32>,
}

impl MeasurementFrame {
    /// 是否为空帧（解码失败或无数据）
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

/// 解析一个测距数据块
///
/// 要求回显为 `MD`/`MS`，状态为 `99`，随后是时间戳行和若干数据行。
/// 跨行的 3 字符分组按拼接后的顺序解码。
///
/// # 错误
/// - `ProtocolError::UnexpectedEcho`: 不是测距命令的响应
/// - `ProtocolError::BadStatus`: 状态码不是 `99`（例如 `MD` 命令本身的 `00` 应答）
/// - `ProtocolError::ChecksumMismatch` / `InvalidCharacter` / `InvalidLength`: 数据损坏
pub fn decode_measurement_frame(text: &str) -> Result<MeasurementFrame, ProtocolError> {
    let block = ResponseBlock::parse(text)?;
    if !(block.echo.starts_with("MD") || block.echo.starts_with("MS")) {
        return Err(ProtocolError::UnexpectedEcho {
            expected: "MD".to_string(),
            actual: block.echo.to_string(),
        });
    }
    block.expect_status(&[STATUS_DATA])?;

    let mut lines = block.data.iter();
    let timestamp_line = lines.next().ok_or(ProtocolError::EmptyBlock)?;
    let timestamp_payload = verify_line(timestamp_line)?;
    if timestamp_payload.len() != TIMESTAMP_WIDTH {
        return Err(ProtocolError::InvalidLength {
            len: timestamp_payload.len(),
            width: TIMESTAMP_WIDTH,
        });
    }
    let timestamp = decode_chars(timestamp_payload.as_bytes())?;

    let mut encoded = Vec::with_capacity(block.data.len() * LINE_PAYLOAD_LEN);
    for line in lines {
        encoded.extend_from_slice(verify_line(line)?.as_bytes());
    }
    let ranges = decode_sequence(&encoded, RANGE_WIDTH)?;

    Ok(MeasurementFrame { timestamp, ranges })
}

/// 编码一个只含状态码的响应块（命令应答）
///
/// # Example
///
/// ```
/// use urg_protocol::encode_status_block;
///
/// assert_eq!(encode_status_block("QT", "00"), "QT\n00P\n\n");
/// ```
pub fn encode_status_block(echo: &str, status: &str) -> String {
    let sum = checksum(status.as_bytes()) as char;
    format!("{}\n{}{}\n\n", echo, status, sum)
}

/// 编码一个测距数据块（用于模拟器与测试）
///
/// 数据按每行 64 字符切分，每行附加校验字符。
pub fn encode_measurement_block(echo: &str, timestamp: u32, ranges: &[u32]) -> String {
    let mut text = String::with_capacity(64 + ranges.len() * (RANGE_WIDTH + 1));
    text.push_str(echo);
    text.push('\n');
    text.push_str(STATUS_DATA);
    text.push(checksum(STATUS_DATA.as_bytes()) as char);
    text.push('\n');

    push_line(&mut text, &encode_chars(timestamp, TIMESTAMP_WIDTH));

    let encoded: Vec<u8> = ranges
        .iter()
        .flat_map(|&r| encode_chars(r, RANGE_WIDTH))
        .collect();
    for chunk in encoded.chunks(LINE_PAYLOAD_LEN) {
        push_line(&mut text, chunk);
    }
    text.push('\n');
    text
}

fn push_line(text: &mut String, payload: &[u8]) {
    // 编码字符都在 0x30..=0x6F 范围内，均为 ASCII
    text.extend(payload.iter().map(|&b| b as char));
    text.push(checksum(payload) as char);
    text.push('\n');
}
