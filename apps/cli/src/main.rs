//! # URG CLI
//!
//! Command-line monitor for SCIP 2.0 laser rangefinders.
//!
//! ```bash
//! # 写入默认配置
//! urg-cli config init
//!
//! # 查询传感器参数
//! urg-cli identify --address 192.168.0.10
//!
//! # 10 秒后捕获基准帧，之后每 100 ms 打印检测到的物体
//! urg-cli monitor --frequency 10 --baseline-delay 10
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;

use commands::{ConfigCommand, IdentifyCommand, MonitorCommand};

/// URG CLI - 激光测距仪命令行工具
#[derive(Parser, Debug)]
#[command(name = "urg-cli")]
#[command(about = "Command-line monitor for SCIP 2.0 laser rangefinders", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 配置管理
    #[command(subcommand)]
    Config(ConfigCommand),

    /// 查询传感器参数
    Identify {
        #[command(flatten)]
        args: IdentifyCommand,
    },

    /// 监控检测到的物体
    Monitor {
        #[command(flatten)]
        args: MonitorCommand,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("urg_cli=info,urg_driver=info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config(cmd) => cmd.execute(),
        Commands::Identify { args } => args.execute(),
        Commands::Monitor { args } => args.execute(),
    }
}
