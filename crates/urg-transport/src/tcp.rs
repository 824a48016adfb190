//! TCP 传输实现

use crate::{AbortHandle, BlockFramer, ScipTransport, TransportError};
use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

const READ_CHUNK: usize = 4096;

/// 基于 `std::net::TcpStream` 的阻塞传输
pub struct TcpTransport {
    stream: TcpStream,
    peer: SocketAddr,
    framer: BlockFramer,
    read_buf: Box<[u8; READ_CHUNK]>,
    aborted: Arc<AtomicBool>,
}

impl TcpTransport {
    /// 连接传感器
    ///
    /// `timeout` 为 `None` 时使用系统默认的连接超时。连接建立后开启 `TCP_NODELAY`。
    pub fn connect(addr: SocketAddr, timeout: Option<Duration>) -> Result<Self, TransportError> {
        debug!("Connecting to {}", addr);
        let stream = match timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        Self::from_stream(stream)
    }

    /// 包装一个已建立的连接
    pub fn from_stream(stream: TcpStream) -> Result<Self, TransportError> {
        stream.set_nodelay(true)?;
        let peer = stream.peer_addr()?;
        Ok(Self {
            stream,
            peer,
            framer: BlockFramer::new(),
            read_buf: Box::new([0; READ_CHUNK]),
            aborted: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn closed_error(&self) -> TransportError {
        if self.aborted.load(Ordering::Acquire) {
            TransportError::Aborted
        } else {
            TransportError::Closed
        }
    }
}

impl ScipTransport for TcpTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        trace!("TX {:?}", String::from_utf8_lossy(data));
        self.stream.write_all(data)?;
        self.stream.flush()?;
        Ok(())
    }

    fn receive_block(&mut self) -> Result<String, TransportError> {
        loop {
            if let Some(block) = self.framer.next_block() {
                trace!("RX block ({} bytes)", block.len());
                return Ok(block);
            }
            match self.stream.read(&mut self.read_buf[..]) {
                Ok(0) => return Err(self.closed_error()),
                Ok(n) => self.framer.push(&self.read_buf[..n]),
                // 超时：保留已缓存的半个块，下次继续拼接
                Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    return Err(TransportError::Timeout);
                },
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    if self.aborted.load(Ordering::Acquire) {
                        return Err(TransportError::Aborted);
                    }
                    return Err(TransportError::Io(e));
                },
            }
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        // std 不接受零时长
        let timeout = timeout.filter(|t| !t.is_zero());
        self.stream.set_read_timeout(timeout)?;
        Ok(())
    }

    fn abort_handle(&self) -> Option<AbortHandle> {
        let stream = self.stream.try_clone().ok()?;
        let aborted = self.aborted.clone();
        Some(AbortHandle::new(move || {
            aborted.store(true, Ordering::Release);
            let _ = stream.shutdown(Shutdown::Both);
        }))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        debug!("Connection to {} closed", self.peer);
    }
}
