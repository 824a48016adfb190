//! 命令定义和实现

pub mod config;
pub mod identify;
pub mod monitor;

pub use config::ConfigCommand;
pub use identify::IdentifyCommand;
pub use monitor::MonitorCommand;

use crate::config::{AppConfig, default_path};
use anyhow::Result;
use clap::Args;
use std::path::PathBuf;

/// 公共参数：配置文件与连接覆盖项
#[derive(Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// 配置文件路径（默认 `<config_dir>/urg/config.toml`）
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 传感器地址（覆盖配置文件）
    #[arg(short, long)]
    pub address: Option<String>,

    /// 传感器端口（覆盖配置文件）
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ConnectionArgs {
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => default_path(),
        }
    }

    /// 加载配置文件并应用命令行覆盖项
    pub fn load(&self) -> Result<AppConfig> {
        let mut config = AppConfig::load(&self.config_path()?)?;
        if let Some(address) = &self.address {
            config.connection.address = address.clone();
        }
        if let Some(port) = self.port {
            config.connection.port = port;
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_on_top_of_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[connection]\naddress = \"10.0.0.1\"\nport = 1\n").unwrap();

        let args = ConnectionArgs {
            config: Some(path),
            address: None,
            port: Some(20000),
        };
        let config = args.load().unwrap();
        assert_eq!(config.connection.address, "10.0.0.1");
        assert_eq!(config.connection.port, 20000);
    }
}
