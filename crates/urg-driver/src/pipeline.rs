//! 采集线程
//!
//! 后台线程循环读取响应块并解码，把有效帧写入 [`ScanStore`]。
//! 每次读取之后检查取消令牌，因此关闭请求最多等待一个在途的读取。

use crate::heartbeat::ConnectionMonitor;
use crate::metrics::AcquisitionMetrics;
use crate::state::{AtomicSessionState, SessionState};
use crate::store::ScanStore;
use crossbeam_channel::{Receiver, RecvTimeoutError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use urg_protocol::decode_measurement_frame;
use urg_transport::{ScipTransport, TransportError};

/// 取消令牌
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// 采集线程共享的上下文
#[derive(Clone)]
pub struct AcquisitionContext {
    pub store: Arc<ScanStore>,
    pub metrics: Arc<AcquisitionMetrics>,
    pub monitor: Arc<ConnectionMonitor>,
    /// 测量窗口在 `latest` 中的起始下标
    pub offset: usize,
    /// 每帧应有的测距值个数
    pub window_len: usize,
    /// 采集线程因读取失败退出时置位
    pub stream_lost: Arc<AtomicBool>,
    /// 会话状态；数据流中断时由采集线程置为 `Disconnected`
    pub state: Arc<AtomicSessionState>,
}

/// 采集主循环
///
/// 取消或传输层出现致命错误时返回，并交还传输对象，由关闭流程发送停止命令。
pub fn acquisition_loop<T: ScipTransport>(
    mut transport: T,
    ctx: AcquisitionContext,
    cancel: CancelToken,
) -> T {
    info!("Acquisition thread started");
    while !cancel.is_cancelled() {
        let block = match transport.receive_block() {
            Ok(block) => block,
            Err(TransportError::Timeout) => {
                ctx.metrics.read_timeouts.fetch_add(1, Ordering::Relaxed);
                trace!("Read timeout while streaming");
                continue;
            },
            Err(TransportError::Aborted) => {
                debug!("Acquisition read aborted");
                break;
            },
            Err(e) => {
                ctx.metrics.read_errors.fetch_add(1, Ordering::Relaxed);
                ctx.stream_lost.store(true, Ordering::Release);
                ctx.state.set(SessionState::Disconnected);
                warn!("Acquisition stopped: {}", e);
                break;
            },
        };
        if cancel.is_cancelled() {
            break;
        }
        accept_block(&block, &ctx);
    }
    info!("Acquisition thread exited");
    transport
}

fn accept_block(block: &str, ctx: &AcquisitionContext) {
    let frame = match decode_measurement_frame(block) {
        Ok(frame) if !frame.is_empty() => frame,
        Ok(_) => {
            drop_frame(ctx, "empty frame");
            return;
        },
        Err(e) => {
            drop_frame(ctx, &e.to_string());
            return;
        },
    };
    if frame.ranges.len() != ctx.window_len {
        drop_frame(
            ctx,
            &format!(
                "expected {} readings, got {}",
                ctx.window_len,
                frame.ranges.len()
            ),
        );
        return;
    }
    if !ctx.store.write_latest(ctx.offset, &frame.ranges, frame.timestamp) {
        drop_frame(ctx, "window outside scan buffer");
        return;
    }
    ctx.metrics.frames_decoded.fetch_add(1, Ordering::Relaxed);
    ctx.monitor.register_frame();
}

fn drop_frame(ctx: &AcquisitionContext, reason: &str) {
    ctx.metrics.frames_dropped.fetch_add(1, Ordering::Relaxed);
    debug!("Dropped frame: {}", reason);
}

/// 带超时的线程 join
///
/// 看门狗线程负责 join，结果通过通道返回；超时后可以再次等待同一个结果。
pub struct JoinWatch<T> {
    rx: Receiver<std::thread::Result<T>>,
}

/// join 失败的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinFailure {
    TimedOut,
    Panicked,
}

impl<T: Send + 'static> JoinWatch<T> {
    pub fn new(handle: JoinHandle<T>) -> Self {
        let (tx, rx) = bounded(1);
        spawn(move || {
            // 接收端可能已超时放弃，忽略发送错误
            let _ = tx.send(handle.join());
        });
        Self { rx }
    }

    pub fn wait(&self, timeout: Duration) -> Result<T, JoinFailure> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(JoinFailure::Panicked),
            Err(RecvTimeoutError::Timeout) => Err(JoinFailure::TimedOut),
            Err(RecvTimeoutError::Disconnected) => Err(JoinFailure::Panicked),
        }
    }
}
