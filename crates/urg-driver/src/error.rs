//! 驱动层错误类型定义

use thiserror::Error;
use urg_protocol::ProtocolError;
use urg_transport::TransportError;

/// 驱动层错误类型
#[derive(Error, Debug)]
pub enum DriverError {
    /// 传输层错误（连接失败、读写失败）
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// 握手响应格式错误
    #[error("Handshake failed: {0}")]
    Protocol(#[from] ProtocolError),

    /// 地址无法解析
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// 会话已打开
    #[error("Session already open")]
    AlreadyOpen,

    /// 握手期间收到过多无关响应块
    #[error("No reply to {command} after {skipped} unrelated blocks")]
    NoReply { command: String, skipped: usize },

    /// 采集线程错误
    #[error("Acquisition thread error: {0}")]
    IoThread(String),
}

impl DriverError {
    /// 是否为连接阶段失败（对应 ConnectFailure）
    pub fn is_connect_failure(&self) -> bool {
        matches!(self, Self::InvalidAddress(_) | Self::Transport(TransportError::Io(_)))
    }
}
