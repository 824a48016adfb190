//! # URG Transport Layer
//!
//! 传感器通信抽象层：把字节流切分成以 `"\n\n"` 结尾的响应块。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

pub mod framer;
#[cfg(feature = "mock")]
pub mod mock;
pub mod tcp;

pub use framer::BlockFramer;
#[cfg(feature = "mock")]
pub use mock::{MockFeed, MockLog, MockTransport, wait_until};
pub use tcp::TcpTransport;

/// 传输层统一错误类型
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Read timeout")]
    Timeout,
    #[error("Connection closed by peer")]
    Closed,
    #[error("Transport aborted")]
    Aborted,
}

/// 中断句柄
///
/// 可以从其他线程调用 `abort()`，让阻塞中的 `receive_block()` 立即返回
/// `TransportError::Aborted`。只在关闭流程的兜底路径使用。
#[derive(Clone)]
pub struct AbortHandle(Arc<dyn Fn() + Send + Sync>);

impl AbortHandle {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn abort(&self) {
        (self.0)()
    }
}

impl fmt::Debug for AbortHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AbortHandle")
    }
}

pub trait ScipTransport: Send {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;
    fn receive_block(&mut self) -> Result<String, TransportError>;
    fn set_read_timeout(&mut self, _timeout: Option<Duration>) -> Result<(), TransportError> {
        Ok(())
    }
    fn abort_handle(&self) -> Option<AbortHandle> {
        None
    }
    /// 发送命令并读取一个响应块
    fn request(&mut self, data: &[u8]) -> Result<String, TransportError> {
        self.send(data)?;
        self.receive_block()
    }
}

impl<T: ScipTransport + ?Sized> ScipTransport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }
    fn receive_block(&mut self) -> Result<String, TransportError> {
        (**self).receive_block()
    }
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        (**self).set_read_timeout(timeout)
    }
    fn abort_handle(&self) -> Option<AbortHandle> {
        (**self).abort_handle()
    }
}
