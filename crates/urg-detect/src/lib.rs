//! # URG Detect
//!
//! 扫描几何与前景聚类。
//!
//! 纯函数库：不持有线程、不做 I/O。输入是一帧测距值和一帧基准（背景）测距值，
//! 输出是按扫描顺序排列的物体簇。
//!
//! ## 坐标约定
//!
//! - 传感器局部坐标：步号 `step` 对应角度 `2π/ares * step - π/4`，单位 m
//! - 世界坐标：由调用方提供的 [`Pose`]（二维刚体变换）从局部坐标变换得到
//!
//! ## 示例
//!
//! ```
//! use urg_detect::{ClusterEngine, DetectionParams, Pose, ScanProjector};
//!
//! let baseline = vec![3000u32; 1081];
//! let mut latest = baseline.clone();
//! latest[400..430].fill(1500);
//!
//! let engine = ClusterEngine::new(ScanProjector::new(1080, Pose::identity()));
//! let params = DetectionParams { gap: 100, min_size: 2, max_size: 50, skip: 1 };
//! let clusters = engine.detect(&latest, &baseline, &params);
//!
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters.largest().unwrap().size, 30);
//! ```

pub mod cluster;
pub mod geometry;

pub use cluster::{ClusterEngine, ClusterSet, DetectionParams, ObjectCluster};
pub use geometry::{Pose, ScanProjector, step_to_local};

pub use nalgebra::{Point2, Vector2};
