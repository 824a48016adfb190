//! SCIP 2.0 命令构建
//!
//! 纯函数：只负责生成命令字节，不做任何 I/O。

use crate::ProtocolError;
use std::fmt;

/// 步号字段的最大值（4 位十进制）
pub const MAX_STEP: u16 = 9999;

/// SCIP 2.0 命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScipCommand {
    /// `PP`：读取传感器参数（ARES / AMAX 等）
    Identify,
    /// `VV`：读取版本信息
    Version,
    /// `SCIP2.0`：切换到 SCIP 2.0 协议
    SwitchToScip2,
    /// `MD`：开始连续测距
    StartMeasurement {
        /// 起始步号
        start_step: u16,
        /// 结束步号
        end_step: u16,
        /// 相邻步合并数（0 与 1 等价）
        cluster_count: u8,
        /// 扫描间隔（跳过的扫描圈数，0-9）
        scan_interval: u8,
        /// 扫描次数（0 表示持续测距）
        scan_count: u8,
    },
    /// `QT`：停止测距
    StopMeasurement,
}

impl ScipCommand {
    /// 连续测距命令（不合并、不跳圈、无限次）
    ///
    /// # 错误
    /// - `ProtocolError::InvalidValue`: 步号超过 4 位或 `start_step > end_step`
    ///
    /// # Example
    ///
    /// ```
    /// use urg_protocol::ScipCommand;
    ///
    /// let cmd = ScipCommand::continuous_measurement(0, 1080).unwrap();
    /// assert_eq!(cmd.encode(), b"MD0000108000000\n".to_vec());
    /// ```
    pub fn continuous_measurement(start_step: u16, end_step: u16) -> Result<Self, ProtocolError> {
        if end_step > MAX_STEP {
            return Err(ProtocolError::InvalidValue {
                field: "end_step".to_string(),
                value: end_step.to_string(),
            });
        }
        if start_step > end_step {
            return Err(ProtocolError::InvalidValue {
                field: "start_step".to_string(),
                value: format!("{} > end_step {}", start_step, end_step),
            });
        }
        Ok(Self::StartMeasurement {
            start_step,
            end_step,
            cluster_count: 0,
            scan_interval: 0,
            scan_count: 0,
        })
    }

    /// 命令回显的前缀（传感器在响应块第一行原样返回命令）
    pub fn echo_prefix(&self) -> &'static str {
        match self {
            Self::Identify => "PP",
            Self::Version => "VV",
            Self::SwitchToScip2 => "SCIP2.0",
            Self::StartMeasurement { .. } => "MD",
            Self::StopMeasurement => "QT",
        }
    }

    /// 编码为以 LF 结尾的 ASCII 字节
    pub fn encode(&self) -> Vec<u8> {
        let mut text = self.to_string();
        text.push('\n');
        text.into_bytes()
    }
}

impl fmt::Display for ScipCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::StartMeasurement {
                start_step,
                end_step,
                cluster_count,
                scan_interval,
                scan_count,
            } => write!(
                f,
                "MD{:04}{:04}{:02}{:01}{:02}",
                start_step,
                end_step,
                cluster_count.min(99),
                scan_interval.min(9),
                scan_count.min(99)
            ),
            _ => f.write_str(self.echo_prefix()),
        }
    }
}
