//! 传感器参数（`PP` 响应）

use crate::ProtocolError;
use crate::command::MAX_STEP;
use crate::encoding::checksum;
use crate::response::ResponseBlock;

/// 传感器自报参数
///
/// 握手阶段由 `PP` 命令获得，连接期间不再变化。
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SensorSpec {
    /// 型号字符串（`MODL`）
    pub model: Option<String>,
    /// 最小有效距离，mm（`DMIN`）
    pub min_distance: Option<u32>,
    /// 最大有效距离，mm（`DMAX`）
    pub max_distance: Option<u32>,
    /// 一圈的角度分辨率（`ARES`，步数/圈）
    pub ares: u32,
    /// 最小有效步号（`AMIN`）
    pub amin: Option<u32>,
    /// 最大有效步号（`AMAX`）
    pub amax: u32,
    /// 正前方对应的步号（`AFRT`）
    pub afrt: Option<u32>,
    /// 转速，rpm（`SCAN`）
    pub scan_rpm: Option<u32>,
}

impl SensorSpec {
    /// 每帧的步数（`amax + 1`）
    pub fn steps(&self) -> usize {
        self.amax as usize + 1
    }
}

/// 解析 `PP` 响应块
///
/// 数据行格式为 `KEY:value;S`，`S` 是 `KEY:value` 的校验字符。
/// `ARES` 与 `AMAX` 必须存在，其余字段可选；未知字段忽略。
///
/// # 错误
/// - `ProtocolError::UnexpectedEcho` / `BadStatus`: 不是成功的 `PP` 响应
/// - `ProtocolError::ChecksumMismatch`: 数据行校验失败
/// - `ProtocolError::MissingField`: 缺少 `ARES` 或 `AMAX`
/// - `ProtocolError::InvalidValue`: 数值字段无法解析，或 `ARES`/`AMAX` 不在 `1..=9999` / `0..=9999` 内
///
/// # Example
///
/// ```
/// use urg_protocol::decode_identify_response;
///
/// let text = "PP\n00P\nDMIN:20;4\nARES:1440;^\nAMAX:1080;Z\n\n";
/// let spec = decode_identify_response(text).unwrap();
/// assert_eq!(spec.ares, 1440);
/// assert_eq!(spec.amax, 1080);
/// assert_eq!(spec.min_distance, Some(20));
/// ```
pub fn decode_identify_response(text: &str) -> Result<SensorSpec, ProtocolError> {
    let block = ResponseBlock::parse(text)?;
    block.expect_echo("PP")?;
    block.expect_status(&["00"])?;

    let mut model = None;
    let mut numbers: [Option<u32>; 7] = [None; 7];
    const KEYS: [&str; 7] = ["DMIN", "DMAX", "ARES", "AMIN", "AMAX", "AFRT", "SCAN"];

    for (key, value) in parameter_lines(&block.data)? {
        if key == "MODL" {
            model = Some(value.to_string());
            continue;
        }
        if let Some(index) = KEYS.iter().position(|k| *k == key) {
            numbers[index] = Some(parse_number(key, value)?);
        }
    }

    let [min_distance, max_distance, ares, amin, amax, afrt, scan_rpm] = numbers;
    let ares = ares.ok_or(ProtocolError::MissingField("ARES"))?;
    let amax = amax.ok_or(ProtocolError::MissingField("AMAX"))?;
    // 步号字段只有 4 位十进制，超出即为损坏的应答；缓冲区按 amax 分配
    check_range("ARES", ares, 1)?;
    check_range("AMAX", amax, 0)?;

    Ok(SensorSpec {
        model,
        min_distance,
        max_distance,
        ares,
        amin,
        amax,
        afrt,
        scan_rpm,
    })
}

fn check_range(field: &str, value: u32, min: u32) -> Result<(), ProtocolError> {
    if (min..=u32::from(MAX_STEP)).contains(&value) {
        Ok(())
    } else {
        Err(ProtocolError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })
    }
}

/// 校验所有数据行并切分为 `(KEY, value)`，没有 `:` 的行忽略
fn parameter_lines<'a>(data: &[&'a str]) -> Result<Vec<(&'a str, &'a str)>, ProtocolError> {
    let mut fields = Vec::with_capacity(data.len());
    for &line in data {
        if let Some(pair) = verify_parameter_line(line)?.split_once(':') {
            fields.push(pair);
        }
    }
    Ok(fields)
}

/// 校验 `KEY:value;S`，返回 `KEY:value`
fn verify_parameter_line(line: &str) -> Result<&str, ProtocolError> {
    let Some((payload, sum)) = line.rsplit_once(';') else {
        return Err(ProtocolError::InvalidValue {
            field: "parameter line".to_string(),
            value: line.to_string(),
        });
    };
    let expected = checksum(payload.as_bytes());
    match sum.as_bytes() {
        [actual] if *actual == expected => Ok(payload),
        _ => Err(ProtocolError::ChecksumMismatch {
            line: line.to_string(),
            expected: expected as char,
            actual: sum.chars().next().unwrap_or(' '),
        }),
    }
}

fn parse_number(key: &str, value: &str) -> Result<u32, ProtocolError> {
    value.trim().parse().map_err(|_| ProtocolError::InvalidValue {
        field: key.to_string(),
        value: value.to_string(),
    })
}

/// 传感器版本信息（`VV` 响应）
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VersionInfo {
    /// 厂商（`VEND`）
    pub vendor: Option<String>,
    /// 产品名（`PROD`）
    pub product: Option<String>,
    /// 固件版本（`FIRM`）
    pub firmware: Option<String>,
    /// 协议版本（`PROT`）
    pub protocol: Option<String>,
    /// 序列号（`SERI`）
    pub serial: Option<String>,
}

/// 解析 `VV` 响应块，所有字段可选
pub fn decode_version_response(text: &str) -> Result<VersionInfo, ProtocolError> {
    let block = ResponseBlock::parse(text)?;
    block.expect_echo("VV")?;
    block.expect_status(&["00"])?;

    let mut info = VersionInfo::default();
    for (key, value) in parameter_lines(&block.data)? {
        let slot = match key {
            "VEND" => &mut info.vendor,
            "PROD" => &mut info.product,
            "FIRM" => &mut info.firmware,
            "PROT" => &mut info.protocol,
            "SERI" => &mut info.serial,
            _ => continue,
        };
        *slot = Some(value.to_string());
    }
    Ok(info)
}

/// 编码一个 `VV` 响应块（用于模拟器与测试）
pub fn encode_version_block(info: &VersionInfo) -> String {
    let fields = [
        ("VEND", &info.vendor),
        ("PROD", &info.product),
        ("FIRM", &info.firmware),
        ("PROT", &info.protocol),
        ("SERI", &info.serial),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.clone().map(|v| (key, v)));
    encode_parameter_block("VV", fields)
}

/// 编码一个 `PP` 响应块（用于模拟器与测试）
pub fn encode_identify_block(spec: &SensorSpec) -> String {
    let mut fields: Vec<(&str, String)> = Vec::new();
    if let Some(model) = &spec.model {
        fields.push(("MODL", model.clone()));
    }
    let optional = [
        ("DMIN", spec.min_distance),
        ("DMAX", spec.max_distance),
        ("ARES", Some(spec.ares)),
        ("AMIN", spec.amin),
        ("AMAX", Some(spec.amax)),
        ("AFRT", spec.afrt),
        ("SCAN", spec.scan_rpm),
    ];
    fields.extend(
        optional
            .into_iter()
            .filter_map(|(key, value)| value.map(|v| (key, v.to_string()))),
    );

    encode_parameter_block("PP", fields)
}

fn encode_parameter_block<'a>(
    echo: &str,
    fields: impl IntoIterator<Item = (&'a str, String)>,
) -> String {
    let mut text = format!("{}\n00P\n", echo);
    for (key, value) in fields {
        let payload = format!("{}:{}", key, value);
        let sum = checksum(payload.as_bytes()) as char;
        text.push_str(&payload);
        text.push(';');
        text.push(sum);
        text.push('\n');
    }
    text.push('\n');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ust_10lx() -> SensorSpec {
        SensorSpec {
            model: Some("UST-10LX(Hokuyo Automatic Co., Ltd.)".to_string()),
            min_distance: Some(20),
            max_distance: Some(30000),
            ares: 1440,
            amin: Some(0),
            amax: 1080,
            afrt: Some(540),
            scan_rpm: Some(2400),
        }
    }

    #[test]
    fn test_decode_full_response() {
        let spec = ust_10lx();
        let decoded = decode_identify_response(&encode_identify_block(&spec)).unwrap();
        assert_eq!(decoded, spec);
        assert_eq!(decoded.steps(), 1081);
    }

    #[test]
    fn test_missing_amax_is_error() {
        let text = "PP\n00P\nARES:1440;^\n\n";
        assert_eq!(
            decode_identify_response(text),
            Err(ProtocolError::MissingField("AMAX"))
        );
    }

    #[test]
    fn test_bad_checksum_is_error() {
        let text = "PP\n00P\nARES:1440;0\nAMAX:1080;Z\n\n";
        assert!(matches!(
            decode_identify_response(text),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_wrong_echo_is_error() {
        assert!(matches!(
            decode_identify_response("VV\n00P\n\n"),
            Err(ProtocolError::UnexpectedEcho { .. })
        ));
    }

    #[test]
    fn test_oversized_amax_is_rejected() {
        let mut spec = ust_10lx();
        spec.amax = 50_000_000;
        assert_eq!(
            decode_identify_response(&encode_identify_block(&spec)),
            Err(ProtocolError::InvalidValue {
                field: "AMAX".to_string(),
                value: "50000000".to_string(),
            })
        );

        spec.amax = 9999;
        let decoded = decode_identify_response(&encode_identify_block(&spec)).unwrap();
        assert_eq!(decoded.steps(), 10_000);
    }

    #[test]
    fn test_oversized_resolution_is_rejected() {
        let mut spec = ust_10lx();
        spec.ares = 4_000_000_000;
        assert!(matches!(
            decode_identify_response(&encode_identify_block(&spec)),
            Err(ProtocolError::InvalidValue { ref field, .. }) if field == "ARES"
        ));
    }

    #[test]
    fn test_decode_version_response() {
        let info = VersionInfo {
            vendor: Some("Hokuyo Automatic Co., Ltd.".to_string()),
            product: Some("UST-10LX".to_string()),
            firmware: Some("1.0.3".to_string()),
            protocol: Some("SCIP 2.2".to_string()),
            serial: None,
        };
        assert_eq!(decode_version_response(&encode_version_block(&info)).unwrap(), info);
        assert!(matches!(
            decode_version_response(&encode_identify_block(&ust_10lx())),
            Err(ProtocolError::UnexpectedEcho { .. })
        ));
    }

    #[test]
    fn test_zero_resolution_is_error() {
        let mut spec = ust_10lx();
        spec.ares = 0;
        assert!(matches!(
            decode_identify_response(&encode_identify_block(&spec)),
            Err(ProtocolError::InvalidValue { .. })
        ));
    }
}
