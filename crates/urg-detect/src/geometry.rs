//! 扫描几何：步号 + 距离 → 平面坐标

use nalgebra::{Isometry2, Point2, Vector2};
use std::f64::consts::{FRAC_PI_4, TAU};

/// 传感器原生单位（mm）到工作单位（m）的换算系数
pub const MM_TO_M: f64 = 0.001;

/// 把一个测距点转换为传感器局部坐标（m）
///
/// 角度为 `2π/ares * step - π/4`，`-π/4` 对应传感器物理零方向。
///
/// # Example
///
/// ```
/// use urg_detect::step_to_local;
///
/// // ares = 1440 时第 180 步正好是 0 rad
/// let p = step_to_local(180, 2000, 1440);
/// assert!((p.x - 2.0).abs() < 1e-9);
/// assert!(p.y.abs() < 1e-9);
/// ```
pub fn step_to_local(step: usize, range: u32, ares: u32) -> Point2<f64> {
    let angle = TAU / ares as f64 * step as f64 - FRAC_PI_4;
    let distance = range as f64 * MM_TO_M;
    Point2::new(angle.cos() * distance, angle.sin() * distance)
}

/// 传感器在世界坐标系中的安装位姿
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose(Isometry2<f64>);

impl Pose {
    pub fn identity() -> Self {
        Self(Isometry2::identity())
    }

    pub fn new(isometry: Isometry2<f64>) -> Self {
        Self(isometry)
    }

    /// 由安装参数构造位姿
    ///
    /// - `shift_x`: 水平偏移（mm）
    /// - `height`: 安装高度（mm）
    /// - `rotate`: 绕传感器轴的旋转（度）
    pub fn from_mounting(shift_x: f64, height: f64, rotate: f64) -> Self {
        Self(Isometry2::new(
            Vector2::new(shift_x * MM_TO_M, height * MM_TO_M),
            rotate.to_radians(),
        ))
    }

    pub fn isometry(&self) -> &Isometry2<f64> {
        &self.0
    }

    pub fn to_world(&self, local: &Point2<f64>) -> Point2<f64> {
        self.0 * local
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

/// 带标定的投影器
///
/// 同一个投影公式，分别作用于实时帧、差分帧（`|latest - baseline|`）和基准帧。
/// 越界的步号返回 `None`。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanProjector {
    ares: u32,
    pose: Pose,
}

impl ScanProjector {
    /// `ares` 为 0 时按 1 处理，避免除零
    pub fn new(ares: u32, pose: Pose) -> Self {
        Self {
            ares: ares.max(1),
            pose,
        }
    }

    pub fn ares(&self) -> u32 {
        self.ares
    }

    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    pub fn local(&self, step: usize, range: u32) -> Point2<f64> {
        step_to_local(step, range, self.ares)
    }

    pub fn world(&self, step: usize, range: u32) -> Point2<f64> {
        self.pose.to_world(&self.local(step, range))
    }

    // ---- 局部坐标 ----

    pub fn raw_local(&self, latest: &[u32], step: usize) -> Option<Point2<f64>> {
        latest.get(step).map(|&r| self.local(step, r))
    }

    pub fn calibrated_local(
        &self,
        latest: &[u32],
        baseline: &[u32],
        step: usize,
    ) -> Option<Point2<f64>> {
        let range = latest.get(step)?.abs_diff(*baseline.get(step)?);
        Some(self.local(step, range))
    }

    pub fn baseline_local(&self, baseline: &[u32], step: usize) -> Option<Point2<f64>> {
        baseline.get(step).map(|&r| self.local(step, r))
    }

    // ---- 世界坐标 ----

    pub fn raw_world(&self, latest: &[u32], step: usize) -> Option<Point2<f64>> {
        latest.get(step).map(|&r| self.world(step, r))
    }

    pub fn baseline_world(&self, baseline: &[u32], step: usize) -> Option<Point2<f64>> {
        baseline.get(step).map(|&r| self.world(step, r))
    }

    /// 整帧投影到世界坐标（用于渲染）
    pub fn project_all(&self, ranges: &[u32]) -> Vec<Point2<f64>> {
        ranges
            .iter()
            .enumerate()
            .map(|(step, &r)| self.world(step, r))
            .collect()
    }
}
