//! # URG Protocol
//!
//! URG 系列激光测距仪的 SCIP 2.0 协议定义（无 I/O 依赖）
//!
//! ## 模块
//!
//! - `encoding`: 6-bit 字符编码与校验和
//! - `command`: 命令构建（PP / SCIP2.0 / MD / QT / VV）
//! - `response`: 响应块结构解析（回显行、状态行、数据行）
//! - `identify`: 传感器参数（PP 响应）与版本信息（VV 响应）解析
//! - `measurement`: 测距帧（MD 响应）解析与编码
//!
//! ## 响应块格式
//!
//! ```text
//! 回显行\n
//! 状态码 + 校验字符\n
//! (数据 + 校验字符\n)*
//! \n
//! ```
//!
//! 每个响应块以两个连续换行结束，传输层按此切分。

pub mod command;
pub mod encoding;
pub mod identify;
pub mod measurement;
pub mod response;

pub use command::ScipCommand;
pub use encoding::{checksum, decode_chars, encode_chars};
pub use identify::{
    SensorSpec, VersionInfo, decode_identify_response, decode_version_response,
    encode_identify_block, encode_version_block,
};
pub use measurement::{
    MeasurementFrame, decode_measurement_frame, encode_measurement_block, encode_status_block,
};
pub use response::ResponseBlock;

use thiserror::Error;

/// 传感器默认 TCP 端口
pub const DEFAULT_PORT: u16 = 10940;

/// 协议解析错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Empty response block")]
    EmptyBlock,

    #[error("Unexpected echo: expected prefix {expected:?}, got {actual:?}")]
    UnexpectedEcho { expected: String, actual: String },

    #[error("Sensor returned status {status:?} for {command}")]
    BadStatus { command: String, status: String },

    #[error("Checksum mismatch in line {line:?}: expected {expected:?}, got {actual:?}")]
    ChecksumMismatch {
        line: String,
        expected: char,
        actual: char,
    },

    #[error("Invalid character 0x{byte:02X} in encoded data")]
    InvalidCharacter { byte: u8 },

    #[error("Invalid encoded length {len} (must be a multiple of {width})")]
    InvalidLength { len: usize, width: usize },

    #[error("Missing field {0} in identify response")]
    MissingField(&'static str),

    #[error("Invalid value for field {field}: {value:?}")]
    InvalidValue { field: String, value: String },
}
