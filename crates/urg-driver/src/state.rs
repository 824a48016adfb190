//! 会话状态机

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// 会话状态
///
/// `Disconnected → Connecting → Handshaking → Streaming → Closing → Disconnected`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum SessionState {
    #[default]
    Disconnected = 0,
    Connecting = 1,
    Handshaking = 2,
    Streaming = 3,
    Closing = 4,
}

impl SessionState {
    /// 从 u8 转换，无效值视为 Disconnected
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Handshaking,
            3 => Self::Streaming,
            4 => Self::Closing,
            _ => Self::Disconnected,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_streaming(self) -> bool {
        self == Self::Streaming
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Streaming => "streaming",
            Self::Closing => "closing",
        };
        f.write_str(name)
    }
}

/// 会话状态（原子版本，用于线程间共享）
#[derive(Debug, Default)]
pub struct AtomicSessionState {
    inner: AtomicU8,
}

impl AtomicSessionState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: AtomicU8::new(state.as_u8()),
        }
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.inner.load(Ordering::Acquire))
    }

    pub fn set(&self, state: SessionState) {
        self.inner.store(state.as_u8(), Ordering::Release);
    }
}
