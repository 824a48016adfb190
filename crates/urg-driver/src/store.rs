//! 扫描数据存储
//!
//! 采集线程是 `latest` 的唯一写者，调用方线程是 `baseline` 的唯一写者。
//! 两帧共用一把锁；读取方在锁内拷贝，锁外计算。

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct ScanBuffers {
    latest: Vec<u32>,
    baseline: Vec<u32>,
    /// 已写入的帧序号（0 表示尚未收到任何帧）
    sequence: u64,
    timestamp: u32,
}

/// 一致快照：同一时刻的 `latest` 与 `baseline`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanSnapshot {
    pub latest: Vec<u32>,
    pub baseline: Vec<u32>,
    pub sequence: u64,
    pub timestamp: u32,
}

#[derive(Debug)]
pub struct ScanStore {
    inner: Mutex<ScanBuffers>,
    frame_ready: Condvar,
}

impl ScanStore {
    /// 创建 `steps` 个步号的全零缓冲区
    pub fn new(steps: usize) -> Self {
        Self {
            inner: Mutex::new(ScanBuffers {
                latest: vec![0; steps],
                baseline: vec![0; steps],
                sequence: 0,
                timestamp: 0,
            }),
            frame_ready: Condvar::new(),
        }
    }

    pub fn steps(&self) -> usize {
        self.inner.lock().latest.len()
    }

    /// 把一帧测距值写入 `latest[offset..offset + ranges.len()]`
    ///
    /// 越界时不写入并返回 `false`。
    pub fn write_latest(&self, offset: usize, ranges: &[u32], timestamp: u32) -> bool {
        let mut buffers = self.inner.lock();
        let Some(target) = buffers.latest.get_mut(offset..offset + ranges.len()) else {
            return false;
        };
        target.copy_from_slice(ranges);
        buffers.sequence += 1;
        buffers.timestamp = timestamp;
        drop(buffers);
        self.frame_ready.notify_all();
        true
    }

    /// 把当前 `latest` 整帧拷贝为 `baseline`
    pub fn capture_baseline(&self) {
        let mut buffers = self.inner.lock();
        let ScanBuffers {
            latest, baseline, ..
        } = &mut *buffers;
        baseline.copy_from_slice(latest);
    }

    pub fn latest(&self) -> Vec<u32> {
        self.inner.lock().latest.clone()
    }

    pub fn baseline(&self) -> Vec<u32> {
        self.inner.lock().baseline.clone()
    }

    /// 差分帧 `|latest - baseline|`
    pub fn calibrated(&self) -> Vec<u32> {
        let buffers = self.inner.lock();
        buffers
            .latest
            .iter()
            .zip(&buffers.baseline)
            .map(|(l, b)| l.abs_diff(*b))
            .collect()
    }

    pub fn snapshot(&self) -> ScanSnapshot {
        let buffers = self.inner.lock();
        ScanSnapshot {
            latest: buffers.latest.clone(),
            baseline: buffers.baseline.clone(),
            sequence: buffers.sequence,
            timestamp: buffers.timestamp,
        }
    }

    pub fn sequence(&self) -> u64 {
        self.inner.lock().sequence
    }

    /// 阻塞等待帧序号超过 `after`，超时返回 `false`
    pub fn wait_for_frame(&self, after: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut buffers = self.inner.lock();
        while buffers.sequence <= after {
            if self
                .frame_ready
                .wait_until(&mut buffers, deadline)
                .timed_out()
            {
                return buffers.sequence > after;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_new_store_is_zeroed() {
        let store = ScanStore::new(5);
        assert_eq!(store.steps(), 5);
        assert_eq!(store.latest(), vec![0; 5]);
        assert_eq!(store.baseline(), vec![0; 5]);
        assert_eq!(store.sequence(), 0);
    }

    #[test]
    fn test_write_window() {
        let store = ScanStore::new(6);
        assert!(store.write_latest(2, &[7, 8, 9], 42));
        assert_eq!(store.latest(), vec![0, 0, 7, 8, 9, 0]);
        assert_eq!(store.snapshot().timestamp, 42);
        assert!(!store.write_latest(4, &[1, 2, 3], 0));
        assert_eq!(store.sequence(), 1);
    }

    #[test]
    fn test_capture_and_calibrated() {
        let store = ScanStore::new(3);
        store.write_latest(0, &[100, 200, 300], 0);
        store.capture_baseline();
        store.write_latest(0, &[150, 200, 250], 0);
        assert_eq!(store.baseline(), vec![100, 200, 300]);
        assert_eq!(store.calibrated(), vec![50, 0, 50]);
    }

    #[test]
    fn test_wait_for_frame() {
        let store = Arc::new(ScanStore::new(2));
        assert!(!store.wait_for_frame(0, Duration::from_millis(10)));

        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                store.write_latest(0, &[1, 2], 0);
            })
        };
        assert!(store.wait_for_frame(0, Duration::from_secs(2)));
        writer.join().unwrap();
    }

    #[test]
    fn test_concurrent_reader_sees_whole_frames() {
        let store = Arc::new(ScanStore::new(1000));
        let writer = {
            let store = store.clone();
            thread::spawn(move || {
                for value in 1..=200u32 {
                    store.write_latest(0, &vec![value; 1000], value);
                }
            })
        };
        for _ in 0..200 {
            let latest = store.latest();
            assert!(latest.iter().all(|&v| v == latest[0]));
        }
        writer.join().unwrap();
    }
}
