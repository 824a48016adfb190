//! 采集线程指标
//!
//! 原子计数器，可以在任何线程读取，不引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct AcquisitionMetrics {
    /// 成功写入 ScanStore 的帧数
    pub frames_decoded: AtomicU64,

    /// 作为噪声丢弃的帧数（解码失败、空帧、长度不符）
    pub frames_dropped: AtomicU64,

    /// 读取超时次数（仅在配置了读取超时时出现）
    pub read_timeouts: AtomicU64,

    /// 致命读取错误次数
    pub read_errors: AtomicU64,
}

impl AcquisitionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            read_timeouts: self.read_timeouts.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }

    pub fn reset(&self) {
        self.frames_decoded.store(0, Ordering::Relaxed);
        self.frames_dropped.store(0, Ordering::Relaxed);
        self.read_timeouts.store(0, Ordering::Relaxed);
        self.read_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub frames_decoded: u64,
    pub frames_dropped: u64,
    pub read_timeouts: u64,
    pub read_errors: u64,
}

impl MetricsSnapshot {
    /// 噪声帧占比（0.0 ~ 1.0）
    pub fn drop_rate(&self) -> f64 {
        let total = self.frames_decoded + self.frames_dropped;
        if total == 0 {
            0.0
        } else {
            self.frames_dropped as f64 / total as f64
        }
    }
}
