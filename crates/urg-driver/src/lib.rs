//! # URG Driver
//!
//! 激光测距仪会话驱动，包括：
//! - 连接与握手（PP → SCIP2.0 → MD）
//! - 后台采集线程（阻塞读取 + 取消令牌 + 带超时的 join）
//! - 扫描数据存储（单锁保护 `latest` / `baseline`）
//! - 检测参数（逐字段原子读写）与聚类结果发布（ArcSwap）
//! - 采集指标与数据流存活监测
//!
//! # 使用场景
//!
//! 调用方线程每个显示帧调用一次 [`Connection::update`]，然后读取
//! [`Connection::objects`] 与扫描数组进行渲染。

mod connection;
mod error;

pub mod config;
pub mod heartbeat;
pub mod metrics;
pub mod pipeline;
pub mod state;
pub mod store;

pub use config::{DetectionConfig, SessionConfig};
pub use connection::{Connection, query_version, read_version};
pub use error::DriverError;
pub use heartbeat::ConnectionMonitor;
pub use metrics::{AcquisitionMetrics, MetricsSnapshot};
pub use pipeline::{AcquisitionContext, CancelToken, JoinFailure, JoinWatch, acquisition_loop};
pub use state::{AtomicSessionState, SessionState};
pub use store::{ScanSnapshot, ScanStore};

pub use urg_detect::{ClusterSet, DetectionParams, ObjectCluster, Point2, Pose};
pub use urg_protocol::{SensorSpec, VersionInfo};
