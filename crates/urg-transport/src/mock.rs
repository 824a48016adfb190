//! 脚本化的 Mock 传输（仅在 `mock` feature 下可用）
//!
//! 命令应答通过 [`MockTransport::respond_to`] 预先登记；连续测距的数据块
//! 由测试线程通过 [`MockFeed`] 推送。

use crate::{AbortHandle, ScipTransport, TransportError};
use crossbeam_channel::{Receiver, Sender, bounded, select, unbounded};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 已发送命令的记录
#[derive(Clone, Default)]
pub struct MockLog(Arc<Mutex<Vec<String>>>);

impl MockLog {
    /// 已发送的命令（去掉结尾换行）
    pub fn commands(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn contains(&self, prefix: &str) -> bool {
        self.0.lock().iter().any(|c| c.starts_with(prefix))
    }
}

/// 向 Mock 传输推送数据块的句柄
///
/// 所有 `MockFeed` 被 drop 后，读取端返回 `TransportError::Closed`。
#[derive(Clone)]
pub struct MockFeed(Sender<String>);

impl MockFeed {
    pub fn push(&self, block: impl Into<String>) {
        let _ = self.0.send(block.into());
    }
}

pub struct MockTransport {
    responses: Vec<(String, VecDeque<String>)>,
    pending: VecDeque<String>,
    stream_rx: Receiver<String>,
    abort_tx: Sender<()>,
    abort_rx: Receiver<()>,
    read_timeout: Option<Duration>,
    log: MockLog,
}

impl MockTransport {
    pub fn new() -> (Self, MockFeed) {
        let (stream_tx, stream_rx) = unbounded();
        let (abort_tx, abort_rx) = bounded(1);
        let transport = Self {
            responses: Vec::new(),
            pending: VecDeque::new(),
            stream_rx,
            abort_tx,
            abort_rx,
            read_timeout: None,
            log: MockLog::default(),
        };
        (transport, MockFeed(stream_tx))
    }

    /// 登记应答：发送以 `prefix` 开头的命令后，依次返回 `blocks`
    ///
    /// 同一前缀可多次登记，每次发送消耗一组。
    pub fn respond_to(&mut self, prefix: &str, blocks: &[&str]) -> &mut Self {
        self.responses.push((
            prefix.to_string(),
            blocks.iter().map(|b| b.to_string()).collect(),
        ));
        self
    }

    pub fn log(&self) -> MockLog {
        self.log.clone()
    }
}

impl ScipTransport for MockTransport {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        let command = String::from_utf8_lossy(data).trim_end().to_string();
        if let Some(index) = self
            .responses
            .iter()
            .position(|(prefix, _)| command.starts_with(prefix.as_str()))
        {
            let (_, blocks) = self.responses.remove(index);
            self.pending.extend(blocks);
        }
        self.log.0.lock().push(command);
        Ok(())
    }

    fn receive_block(&mut self) -> Result<String, TransportError> {
        if let Some(block) = self.pending.pop_front() {
            return Ok(block);
        }
        match self.read_timeout {
            Some(timeout) => select! {
                recv(self.stream_rx) -> msg => msg.map_err(|_| TransportError::Closed),
                recv(self.abort_rx) -> _ => Err(TransportError::Aborted),
                default(timeout) => Err(TransportError::Timeout),
            },
            None => select! {
                recv(self.stream_rx) -> msg => msg.map_err(|_| TransportError::Closed),
                recv(self.abort_rx) -> _ => Err(TransportError::Aborted),
            },
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.read_timeout = timeout;
        Ok(())
    }

    fn abort_handle(&self) -> Option<AbortHandle> {
        let tx = self.abort_tx.clone();
        Some(AbortHandle::new(move || {
            let _ = tx.try_send(());
        }))
    }
}

/// 轮询等待条件成立（测试辅助）
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
