//! 配置管理命令

use crate::config::{AppConfig, default_path};
use anyhow::{Result, bail};
use clap::Subcommand;
use std::path::PathBuf;

/// 配置命令
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// 打印生效的配置
    Show {
        /// 配置文件路径
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// 写入默认配置文件
    Init {
        /// 配置文件路径
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// 覆盖已存在的文件
        #[arg(long)]
        force: bool,
    },
}

impl ConfigCommand {
    pub fn execute(self) -> Result<()> {
        match self {
            ConfigCommand::Show { config } => {
                let path = resolve(config)?;
                let app = AppConfig::load(&path)?;
                println!("# {}", path.display());
                print!("{}", app.to_toml()?);
                Ok(())
            },
            ConfigCommand::Init { config, force } => {
                let path = resolve(config)?;
                if path.exists() && !force {
                    bail!("配置文件已存在: {}（使用 --force 覆盖）", path.display());
                }
                AppConfig::default().save(&path)?;
                println!("✅ 已写入 {}", path.display());
                Ok(())
            },
        }
    }
}

fn resolve(path: Option<PathBuf>) -> Result<PathBuf> {
    match path {
        Some(path) => Ok(path),
        None => default_path(),
    }
}
