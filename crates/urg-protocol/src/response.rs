//! 响应块结构解析

use crate::ProtocolError;
use crate::encoding::verify_line;

/// 一个完整的响应块（按行切分后的视图）
///
/// 不拷贝数据，所有字段都借用原始文本。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseBlock<'a> {
    /// 命令回显
    pub echo: &'a str,
    /// 状态码（已去掉校验字符）
    pub status: &'a str,
    /// 数据行（保留各行末尾的校验字符）
    pub data: Vec<&'a str>,
}

impl<'a> ResponseBlock<'a> {
    /// 解析响应块
    ///
    /// 跳过开头的空行，遇到块内第一个空行即结束；CR 字符被忽略。
    ///
    /// # 错误
    /// - `ProtocolError::EmptyBlock`: 没有回显行或状态行
    /// - `ProtocolError::ChecksumMismatch`: 三字符状态行校验失败
    pub fn parse(text: &'a str) -> Result<Self, ProtocolError> {
        let mut lines = text
            .split('\n')
            .map(|line| line.trim_end_matches('\r'))
            .skip_while(|line| line.is_empty())
            .take_while(|line| !line.is_empty());

        let echo = lines.next().ok_or(ProtocolError::EmptyBlock)?;
        let status_line = lines.next().ok_or(ProtocolError::EmptyBlock)?;
        let status = match status_line.len() {
            // SCIP 2.0：两位状态码 + 校验字符
            3 => verify_line(status_line)?,
            // SCIP 1.1 与模式切换时的简短应答不带校验字符
            _ => status_line,
        };

        Ok(Self {
            echo,
            status,
            data: lines.collect(),
        })
    }

    /// 检查回显前缀
    pub fn expect_echo(&self, prefix: &str) -> Result<(), ProtocolError> {
        if self.echo.starts_with(prefix) {
            Ok(())
        } else {
            Err(ProtocolError::UnexpectedEcho {
                expected: prefix.to_string(),
                actual: self.echo.to_string(),
            })
        }
    }

    /// 检查状态码是否在可接受列表中
    pub fn expect_status(&self, accepted: &[&str]) -> Result<(), ProtocolError> {
        if accepted.contains(&self.status) {
            Ok(())
        } else {
            Err(ProtocolError::BadStatus {
                command: self.echo.to_string(),
                status: self.status.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status_only_block() {
        let block = ResponseBlock::parse("QT\n00P\n\n").unwrap();
        assert_eq!(block.echo, "QT");
        assert_eq!(block.status, "00");
        assert!(block.data.is_empty());
    }

    #[test]
    fn test_parse_ignores_cr_and_leading_blank_lines() {
        let block = ResponseBlock::parse("\r\n\nPP\r\n00P\r\nARES:1440;?\r\n\r\n").unwrap();
        assert_eq!(block.echo, "PP");
        assert_eq!(block.data, vec!["ARES:1440;?"]);
    }

    #[test]
    fn test_parse_short_status() {
        let block = ResponseBlock::parse("SCIP2.0\n0\n\n").unwrap();
        assert_eq!(block.status, "0");
    }

    #[test]
    fn test_parse_rejects_bad_status_checksum() {
        assert!(matches!(
            ResponseBlock::parse("MD0000108000000\n00Q\n\n"),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_empty() {
        assert_eq!(ResponseBlock::parse("\n\n"), Err(ProtocolError::EmptyBlock));
        assert_eq!(ResponseBlock::parse("PP\n\n"), Err(ProtocolError::EmptyBlock));
    }

    #[test]
    fn test_expectations() {
        let block = ResponseBlock::parse("MD0000108000000\n0Ll\n\n").unwrap();
        assert_eq!(block.status, "0L");
        assert!(block.expect_echo("MD").is_ok());
        assert!(block.expect_echo("PP").is_err());
        assert!(matches!(
            block.expect_status(&["00"]),
            Err(ProtocolError::BadStatus { .. })
        ));
    }
}
