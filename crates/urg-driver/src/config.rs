//! 会话配置与检测参数

use crate::error::DriverError;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;
use urg_detect::DetectionParams;
use urg_protocol::DEFAULT_PORT;

/// 会话配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// 传感器主机名或 IPv4 地址
    pub address: String,
    pub port: u16,
    /// 测量窗口起始步号
    pub start_step: u16,
    /// 测量窗口结束步号（握手后按 `AMAX` 截断）
    pub end_step: u16,
    /// TCP 连接超时，`None` 使用系统默认值
    pub connect_timeout: Option<Duration>,
    /// 握手阶段每个响应的读取超时
    pub handshake_timeout: Option<Duration>,
    /// 采集阶段的读取超时
    ///
    /// 默认 `None`：传感器停止发送时采集线程一直阻塞，直到会话关闭。
    pub read_timeout: Option<Duration>,
    /// 关闭时等待采集线程退出的时限
    pub join_timeout: Duration,
    /// 关闭时等待 `QT` 应答的时限
    pub close_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            address: "192.168.0.10".to_string(),
            port: DEFAULT_PORT,
            start_step: 0,
            end_step: 2160,
            connect_timeout: Some(Duration::from_secs(3)),
            handshake_timeout: Some(Duration::from_secs(3)),
            read_timeout: None,
            join_timeout: Duration::from_secs(2),
            close_timeout: Duration::from_secs(1),
        }
    }
}

impl SessionConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    /// 设置测量窗口
    pub fn with_window(mut self, start_step: u16, end_step: u16) -> Self {
        self.start_step = start_step;
        self.end_step = end_step;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// 解析为 socket 地址（取第一个结果）
    pub fn socket_addr(&self) -> Result<SocketAddr, DriverError> {
        (self.address.as_str(), self.port)
            .to_socket_addrs()
            .map_err(|e| DriverError::InvalidAddress(format!("{}: {}", self.address, e)))?
            .next()
            .ok_or_else(|| DriverError::InvalidAddress(self.address.clone()))
    }
}

/// 检测参数（原子版本，用于线程间共享）
///
/// 每个字段独立原子读写，不保证多字段的一致快照；聚类允许读到上一拍的值。
#[derive(Debug)]
pub struct DetectionConfig {
    gap: AtomicU32,
    min_size: AtomicUsize,
    max_size: AtomicUsize,
    skip: AtomicUsize,
}

impl DetectionConfig {
    pub fn new(params: DetectionParams) -> Self {
        Self {
            gap: AtomicU32::new(params.gap),
            min_size: AtomicUsize::new(params.min_size),
            max_size: AtomicUsize::new(params.max_size),
            skip: AtomicUsize::new(params.stride()),
        }
    }

    /// 读取当前参数
    pub fn snapshot(&self) -> DetectionParams {
        DetectionParams {
            gap: self.gap.load(Ordering::Relaxed),
            min_size: self.min_size.load(Ordering::Relaxed),
            max_size: self.max_size.load(Ordering::Relaxed),
            skip: self.skip.load(Ordering::Relaxed),
        }
    }

    /// 按顺序设置阈值、最小长度、最大长度
    ///
    /// - `gap <= 0`：拒绝
    /// - `min_size <= 0`：拒绝
    /// - `max_size <= min_size`（与本次更新后的最小长度比较）：拒绝
    ///
    /// 被拒绝的字段保持不变。全部接受时返回 `true`。
    pub fn set_params(&self, gap: i32, min_size: i32, max_size: i32) -> bool {
        let gap_ok = self.set_gap(gap);
        let min_ok = self.set_min_size(min_size);
        let max_ok = self.set_max_size(max_size);
        gap_ok && min_ok && max_ok
    }

    pub fn set_gap(&self, gap: i32) -> bool {
        match u32::try_from(gap) {
            Ok(gap) if gap > 0 => {
                self.gap.store(gap, Ordering::Relaxed);
                true
            },
            _ => {
                warn!("Rejected gap threshold {} (must be > 0)", gap);
                false
            },
        }
    }

    pub fn set_min_size(&self, min_size: i32) -> bool {
        match usize::try_from(min_size) {
            Ok(min_size) if min_size > 0 => {
                self.min_size.store(min_size, Ordering::Relaxed);
                true
            },
            _ => {
                warn!("Rejected minimum cluster size {} (must be > 0)", min_size);
                false
            },
        }
    }

    pub fn set_max_size(&self, max_size: i32) -> bool {
        let min_size = self.min_size.load(Ordering::Relaxed);
        match usize::try_from(max_size) {
            Ok(max_size) if max_size > min_size => {
                self.max_size.store(max_size, Ordering::Relaxed);
                true
            },
            _ => {
                warn!(
                    "Rejected maximum cluster size {} (must be > minimum {})",
                    max_size, min_size
                );
                false
            },
        }
    }

    pub fn skip(&self) -> usize {
        self.skip.load(Ordering::Relaxed)
    }

    /// 设置采样步长，小于 1 时按 1 处理；返回实际生效的值
    pub fn set_skip(&self, skip: i32) -> usize {
        let clamped = usize::try_from(skip).unwrap_or(0).max(1);
        if clamped as i64 != skip as i64 {
            warn!("Clamped sample stride {} to {}", skip, clamped);
        }
        self.skip.store(clamped, Ordering::Relaxed);
        clamped
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self::new(DetectionParams::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.port, 10940);
        assert_eq!(config.read_timeout, None);
        assert_eq!(config.join_timeout, Duration::from_secs(2));

        let params = DetectionConfig::default().snapshot();
        assert_eq!(params, DetectionParams::default());
        assert_eq!(params.gap, 100);
        assert_eq!(params.min_size, 20);
        assert_eq!(params.max_size, 150);
        assert_eq!(params.skip, 1);
    }

    #[test]
    fn test_socket_addr() {
        let config = SessionConfig::new("127.0.0.1").with_port(20000);
        assert_eq!(
            config.socket_addr().unwrap(),
            "127.0.0.1:20000".parse().unwrap()
        );
        assert!(SessionConfig::new("not an address").socket_addr().is_err());
    }

    #[test]
    fn test_set_params_accepts_valid_values() {
        let config = DetectionConfig::default();
        assert!(config.set_params(50, 2, 40));
        let p = config.snapshot();
        assert_eq!((p.gap, p.min_size, p.max_size), (50, 2, 40));
    }

    #[test]
    fn test_set_params_rejects_each_field_independently() {
        let config = DetectionConfig::default();
        // gap 与 min 被拒绝，max 与旧的 min（20）比较后接受
        assert!(!config.set_params(0, -5, 30));
        let p = config.snapshot();
        assert_eq!((p.gap, p.min_size, p.max_size), (100, 20, 30));
    }

    #[test]
    fn test_max_must_exceed_new_min() {
        let config = DetectionConfig::default();
        assert!(!config.set_params(100, 60, 60));
        let p = config.snapshot();
        assert_eq!(p.min_size, 60);
        assert_eq!(p.max_size, 150);
    }

    #[test]
    fn test_skip_clamps_to_one() {
        let config = DetectionConfig::default();
        assert_eq!(config.set_skip(0), 1);
        assert_eq!(config.set_skip(-3), 1);
        assert_eq!(config.set_skip(4), 4);
        assert_eq!(config.skip(), 4);
        assert_eq!(config.snapshot().skip, 4);
    }
}
