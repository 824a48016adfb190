//! 查询传感器参数

use super::ConnectionArgs;
use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;
use urg_driver::{Connection, VersionInfo, read_version};

#[derive(Args, Debug)]
pub struct IdentifyCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,
}

impl IdentifyCommand {
    pub fn execute(self) -> Result<()> {
        let config = self.connection.load()?;
        let session = config.session_config();
        let address = format!("{}:{}", session.address, session.port);

        println!("⏳ 连接到 {} ...", address);
        let mut urg = Connection::new(session.clone());
        urg.try_open()
            .with_context(|| format!("无法打开传感器 {}", address))?;

        if let Some(spec) = urg.sensor_spec() {
            println!("✅ 已连接");
            println!("  型号:       {}", spec.model.as_deref().unwrap_or("(unknown)"));
            println!("  ARES:       {} 步/圈", spec.ares);
            println!("  AMAX:       {}", spec.amax);
            print_optional("AMIN", spec.amin);
            print_optional("AFRT", spec.afrt);
            print_optional("DMIN (mm)", spec.min_distance);
            print_optional("DMAX (mm)", spec.max_distance);
            print_optional("SCAN (rpm)", spec.scan_rpm);
        }
        if let Some((start, end)) = urg.window() {
            println!("  测量窗口:   {}..={}", start, end);
        }

        urg.close();

        // 测距已停止，重新连接一次读取版本信息
        match read_version(&session) {
            Ok(info) => print_version(&info),
            Err(e) => warn!("Failed to read version info: {}", e),
        }
        Ok(())
    }
}

fn print_version(info: &VersionInfo) {
    let fields = [
        ("厂商", &info.vendor),
        ("产品", &info.product),
        ("固件", &info.firmware),
        ("协议", &info.protocol),
        ("序列号", &info.serial),
    ];
    println!("  版本信息:");
    for (label, value) in fields {
        if let Some(value) = value {
            println!("    {}: {}", label, value);
        }
    }
}

fn print_optional(label: &str, value: Option<u32>) {
    match value {
        Some(v) => println!("  {:<11} {}", format!("{}:", label), v),
        None => println!("  {:<11} (未报告)", format!("{}:", label)),
    }
}
