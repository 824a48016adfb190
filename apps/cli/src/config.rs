//! 配置文件
//!
//! `config.toml` 分为三个表，所有字段都有默认值：
//!
//! ```toml
//! [connection]
//! address = "192.168.0.10"
//! port = 10940
//! start_step = 0
//! end_step = 2160
//!
//! [sensor]
//! height = 0.0        # mm
//! shift_x = 0.0       # mm
//! rotate = 0.0        # deg
//! projected_size = 1000.0
//!
//! [detection]
//! gap = 100
//! min_size = 20
//! max_size = 150
//! skip = 1
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use urg_driver::{Pose, SessionConfig};

/// 默认配置文件路径（`<config_dir>/urg/config.toml`）
pub fn default_path() -> Result<PathBuf> {
    let mut path = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("无法确定配置目录"))?;
    path.push("urg");
    path.push("config.toml");
    Ok(path)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub connection: ConnectionSection,
    pub sensor: SensorSection,
    pub detection: DetectionSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSection {
    pub address: String,
    pub port: u16,
    pub start_step: u16,
    pub end_step: u16,
    pub connect_timeout_ms: u64,
    /// 采集读取超时；0 表示不设超时
    pub read_timeout_ms: u64,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            address: session.address,
            port: session.port,
            start_step: session.start_step,
            end_step: session.end_step,
            connect_timeout_ms: 3000,
            read_timeout_ms: 0,
        }
    }
}

/// 传感器安装参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorSection {
    /// 安装高度（mm）
    pub height: f64,
    /// 水平偏移（mm）
    pub shift_x: f64,
    /// 旋转（度）
    pub rotate: f64,
    /// 投影区域的实际尺寸（mm），必须为正
    pub projected_size: f64,
}

impl Default for SensorSection {
    fn default() -> Self {
        Self {
            height: 0.0,
            shift_x: 0.0,
            rotate: 0.0,
            projected_size: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionSection {
    pub gap: i32,
    pub min_size: i32,
    pub max_size: i32,
    pub skip: i32,
}

impl Default for DetectionSection {
    fn default() -> Self {
        Self {
            gap: 100,
            min_size: 20,
            max_size: 150,
            skip: 1,
        }
    }
}

impl AppConfig {
    /// 读取配置文件；文件不存在时返回默认配置
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("解析配置文件失败: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("创建配置目录失败")?;
        }
        fs::write(path, self.to_toml()?).context("写入配置文件失败")?;
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        let c = &self.connection;
        SessionConfig {
            address: c.address.clone(),
            port: c.port,
            start_step: c.start_step,
            end_step: c.end_step,
            connect_timeout: Some(Duration::from_millis(c.connect_timeout_ms))
                .filter(|t| !t.is_zero()),
            read_timeout: Some(Duration::from_millis(c.read_timeout_ms)).filter(|t| !t.is_zero()),
            ..SessionConfig::default()
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::from_mounting(self.sensor.shift_x, self.sensor.height, self.sensor.rotate)
    }

    /// 投影尺寸，非正值按 1 处理
    pub fn projected_size(&self) -> f64 {
        if self.sensor.projected_size > 0.0 {
            self.sensor.projected_size
        } else {
            1.0
        }
    }
}
