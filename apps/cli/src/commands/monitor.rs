//! 持续监控：自动捕获基准后，每个周期打印检测到的物体

use super::ConnectionArgs;
use crate::config::AppConfig;
use anyhow::{Result, bail};
use clap::Args;
use crossbeam_channel::{bounded, select};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use urg_driver::{Connection, ObjectCluster, Point2};

#[derive(Args, Debug)]
pub struct MonitorCommand {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// 更新频率（Hz）
    #[arg(short, long, default_value_t = 10)]
    pub frequency: u32,

    /// 打开后多少秒自动捕获基准帧
    #[arg(long, default_value_t = 10.0)]
    pub baseline_delay: f64,

    /// 每隔多少秒重新捕获基准帧
    #[arg(long)]
    pub recapture_every: Option<f64>,

    /// 运行多少秒后自动退出（默认一直运行到 Ctrl+C）
    #[arg(long)]
    pub duration: Option<f64>,
}

impl MonitorCommand {
    pub fn execute(self) -> Result<()> {
        let baseline_delay = secs("baseline-delay", self.baseline_delay)?;
        let recapture_every = self
            .recapture_every
            .map(|s| secs("recapture-every", s))
            .transpose()?;
        let run_for = self.duration.map(|s| secs("duration", s)).transpose()?;

        let config = self.connection.load()?;
        let session = config.session_config();

        let mut urg = Connection::new(session.clone());
        if !urg.open(&session.address, session.start_step, session.end_step) {
            bail!("无法打开传感器 {}:{}", session.address, session.port);
        }
        apply_settings(&urg, &config);

        println!("✅ 已连接，{} 步/帧", urg.steps());
        println!(
            "📊 监控中 ({} Hz)，{:.1} 秒后捕获基准帧",
            self.frequency, self.baseline_delay
        );
        println!("按 Ctrl+C 停止\n");

        let (stop_tx, stop_rx) = bounded::<()>(1);
        ctrlc::set_handler(move || {
            let _ = stop_tx.try_send(());
        })?;

        let interval = if self.frequency > 0 {
            Duration::from_secs_f64(1.0 / self.frequency as f64)
        } else {
            Duration::from_secs(1)
        };
        let started = Instant::now();
        // 加法溢出时视为永不到期
        let deadline = run_for.and_then(|d| started.checked_add(d));
        let mut next_capture = started.checked_add(baseline_delay);
        let mut iteration = 0u64;

        loop {
            select! {
                recv(stop_rx) -> _ => {
                    println!("\n收到退出信号，正在关闭...");
                    break;
                },
                default(interval) => {},
            }

            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                break;
            }
            if next_capture.is_some_and(|t| now >= t) {
                urg.capture_baseline();
                println!("📌 基准帧已捕获");
                next_capture = recapture_every.and_then(|d| now.checked_add(d));
            }
            if !urg.is_open() {
                warn!("Sensor stream lost");
                break;
            }

            iteration += 1;
            let objects = urg.update();
            let sorted = objects.sorted_by_size();
            print_tick(iteration, &urg, &sorted, config.projected_size());
        }

        let metrics = urg.metrics();
        urg.close();
        info!(
            "Decoded {} frames, dropped {} ({:.1}%)",
            metrics.frames_decoded,
            metrics.frames_dropped,
            metrics.drop_rate() * 100.0
        );
        Ok(())
    }
}

/// 命令行给出的秒数转为 `Duration`，负数按 0 处理
fn secs(name: &str, s: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(s.max(0.0)) {
        Ok(d) => Ok(d),
        Err(_) => bail!("--{} 超出范围: {}", name, s),
    }
}

/// 把配置文件中的安装参数与检测参数应用到会话
fn apply_settings(urg: &Connection, config: &AppConfig) {
    let d = &config.detection;
    urg.set_detection_params(d.gap, d.min_size, d.max_size);
    urg.set_skip(d.skip);
    urg.set_pose(config.pose());
}

/// 世界坐标（m）→ 投影区域归一化坐标
///
/// 投影区域高度为 `2000 / projected_size` m，底边中点位于世界原点。
pub fn to_projected(point: &Point2<f64>, projected_size: f64) -> (f64, f64) {
    let height = 2000.0 / projected_size;
    (point.x / height + 0.5, point.y / height)
}

fn print_tick(iteration: u64, urg: &Connection, objects: &[ObjectCluster], projected_size: f64) {
    let status = if urg.is_receiving() { "●" } else { "○" };
    println!("[{:>6}] {} {} objects", iteration, status, objects.len());
    for (i, obj) in objects.iter().enumerate() {
        let (u, v) = to_projected(&obj.centroid, projected_size);
        println!(
            "   #{:<2} size {:>4}  step {:>5}  world ({:>7.3}, {:>7.3}) m  projected ({:.3}, {:.3})",
            i, obj.size, obj.start_step, obj.centroid.x, obj.centroid.y, u, v
        );
    }
}
