//! 响应块分帧
//!
//! 传感器的每个响应块都以一个空行结束（`"\n\n"`）。TCP 读取可能在任意位置
//! 截断，所以这里缓存未完成的块，直到收到结束符。

use bytes::{Buf, BytesMut};
use tracing::warn;

/// 单个响应块的上限
///
/// 1081 步的 `MD` 数据块约 3.4 KiB，超过上限说明流已失步。
pub const MAX_BLOCK_LEN: usize = 64 * 1024;

const TERMINATOR: &[u8] = b"\n\n";

#[derive(Debug, Default)]
pub struct BlockFramer {
    buf: BytesMut,
    /// 已确认不含结束符的前缀长度
    scanned: usize,
}

impl BlockFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加收到的字节（CR 被丢弃）
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.reserve(bytes.len());
        for chunk in bytes.split(|&b| b == b'\r') {
            self.buf.extend_from_slice(chunk);
        }
        if self.buf.len() > MAX_BLOCK_LEN && self.find_terminator().is_none() {
            warn!(
                "Discarding {} buffered bytes without block terminator",
                self.buf.len()
            );
            self.clear();
        }
    }

    /// 取出下一个完整的响应块（包含结尾的空行）
    pub fn next_block(&mut self) -> Option<String> {
        let end = self.find_terminator()?;
        let block = self.buf.split_to(end + TERMINATOR.len());
        self.scanned = 0;
        Some(String::from_utf8_lossy(&block).into_owned())
    }

    /// 丢弃所有已缓存数据
    pub fn clear(&mut self) {
        self.buf.advance(self.buf.len());
        self.scanned = 0;
    }

    /// 已缓存但尚未组成完整块的字节数
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn find_terminator(&mut self) -> Option<usize> {
        // 结束符可能跨越上次扫描的边界，回退一个字节
        let from = self.scanned.saturating_sub(1);
        let found = self.buf[from..]
            .windows(TERMINATOR.len())
            .position(|w| w == TERMINATOR)
            .map(|pos| from + pos);
        if found.is_none() {
            self.scanned = self.buf.len();
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_block() {
        let mut framer = BlockFramer::new();
        framer.push(b"QT\n00P\n\n");
        assert_eq!(framer.next_block().as_deref(), Some("QT\n00P\n\n"));
        assert_eq!(framer.next_block(), None);
        assert_eq!(framer.pending(), 0);
    }

    #[test]
    fn test_block_split_across_reads() {
        let mut framer = BlockFramer::new();
        framer.push(b"PP\n00P\nARES:1440;^\n");
        assert_eq!(framer.next_block(), None);
        framer.push(b"\n");
        assert_eq!(
            framer.next_block().as_deref(),
            Some("PP\n00P\nARES:1440;^\n\n")
        );
    }

    #[test]
    fn test_terminator_split_between_reads() {
        let mut framer = BlockFramer::new();
        framer.push(b"QT\n00P\n");
        assert_eq!(framer.next_block(), None);
        framer.push(b"\nVV\n");
        assert_eq!(framer.next_block().as_deref(), Some("QT\n00P\n\n"));
        assert_eq!(framer.next_block(), None);
        assert_eq!(framer.pending(), 3);
    }

    #[test]
    fn test_multiple_blocks_in_one_read() {
        let mut framer = BlockFramer::new();
        framer.push(b"SCIP2.0\n0\n\nMD0000108000000\n00P\n\n");
        assert_eq!(framer.next_block().as_deref(), Some("SCIP2.0\n0\n\n"));
        assert_eq!(
            framer.next_block().as_deref(),
            Some("MD0000108000000\n00P\n\n")
        );
        assert_eq!(framer.next_block(), None);
    }

    #[test]
    fn test_carriage_returns_are_dropped() {
        let mut framer = BlockFramer::new();
        framer.push(b"QT\r\n00P\r\n\r\n");
        assert_eq!(framer.next_block().as_deref(), Some("QT\n00P\n\n"));
    }

    #[test]
    fn test_oversized_garbage_is_discarded() {
        let mut framer = BlockFramer::new();
        framer.push(&vec![b'0'; MAX_BLOCK_LEN + 1]);
        assert_eq!(framer.pending(), 0);
        framer.push(b"QT\n00P\n\n");
        assert_eq!(framer.next_block().as_deref(), Some("QT\n00P\n\n"));
    }
}
