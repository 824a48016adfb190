//! 基于基准帧差分的前景分段聚类

use crate::geometry::ScanProjector;
use nalgebra::{Point2, Vector2};
use tracing::trace;

/// 聚类参数（某一时刻的取值）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionParams {
    /// 前景判定阈值：`|latest - baseline| > gap`（mm）
    pub gap: u32,
    /// 最小连续长度（不含）
    pub min_size: usize,
    /// 最大连续长度（不含）
    pub max_size: usize,
    /// 采样步长，0 按 1 处理
    pub skip: usize,
}

impl DetectionParams {
    pub fn stride(&self) -> usize {
        self.skip.max(1)
    }
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            gap: 100,
            min_size: 20,
            max_size: 150,
            skip: 1,
        }
    }
}

/// 一个检测到的物体
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObjectCluster {
    /// 质心（投影点的算术平均）
    pub centroid: Point2<f64>,
    /// 组成该物体的连续采样点数
    pub size: usize,
    /// 第一个前景点的步号
    pub start_step: usize,
}

/// 一次聚类的结果，按扫描顺序（步号递增）排列
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterSet {
    clusters: Vec<ObjectCluster>,
}

impl ClusterSet {
    pub fn new(clusters: Vec<ObjectCluster>) -> Self {
        Self { clusters }
    }

    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ObjectCluster> {
        self.clusters.iter()
    }

    pub fn as_slice(&self) -> &[ObjectCluster] {
        &self.clusters
    }

    /// 最大的物体；尺寸相同时取步号最小的
    pub fn largest(&self) -> Option<&ObjectCluster> {
        self.clusters.iter().fold(None, |best, c| match best {
            Some(b) if c.size <= b.size => Some(b),
            _ => Some(c),
        })
    }

    /// 按尺寸降序排列的副本（稳定排序，不改变自身顺序）
    pub fn sorted_by_size(&self) -> Vec<ObjectCluster> {
        let mut sorted = self.clusters.clone();
        sorted.sort_by(|a, b| b.size.cmp(&a.size));
        sorted
    }
}

impl<'a> IntoIterator for &'a ClusterSet {
    type Item = &'a ObjectCluster;
    type IntoIter = std::slice::Iter<'a, ObjectCluster>;

    fn into_iter(self) -> Self::IntoIter {
        self.clusters.iter()
    }
}

/// 聚类引擎
///
/// 沿步号以 `skip` 为步长遍历，把 `|latest - baseline| > gap` 的连续点
/// 归为一段；段长满足 `min_size < len < max_size` 时输出一个物体，
/// 质心为各点世界坐标的平均值。
#[derive(Debug, Clone, Copy)]
pub struct ClusterEngine {
    projector: ScanProjector,
}

impl ClusterEngine {
    pub fn new(projector: ScanProjector) -> Self {
        Self { projector }
    }

    pub fn projector(&self) -> &ScanProjector {
        &self.projector
    }

    /// 对一帧执行聚类
    ///
    /// 两帧长度不一致时只处理公共部分。遍历范围为 `0..len - skip`，
    /// 扫描结束时仍未闭合的段同样参与判定。
    pub fn detect(&self, latest: &[u32], baseline: &[u32], params: &DetectionParams) -> ClusterSet {
        let stride = params.stride();
        let end = latest.len().min(baseline.len()).saturating_sub(stride);

        let mut clusters = Vec::new();
        let mut run = Run::default();

        for step in (0..end).step_by(stride) {
            if latest[step].abs_diff(baseline[step]) > params.gap {
                let point = self.projector.world(step, latest[step]);
                run.push(step, point);
            } else if let Some(cluster) = run.take(params) {
                clusters.push(cluster);
            }
        }
        if let Some(cluster) = run.take(params) {
            clusters.push(cluster);
        }

        trace!("Detected {} clusters", clusters.len());
        ClusterSet::new(clusters)
    }
}

#[derive(Default)]
struct Run {
    sum: Vector2<f64>,
    count: usize,
    start: usize,
}

impl Run {
    fn push(&mut self, step: usize, point: Point2<f64>) {
        if self.count == 0 {
            self.start = step;
            self.sum = Vector2::zeros();
        }
        self.sum += point.coords;
        self.count += 1;
    }

    /// 闭合当前段并重置
    fn take(&mut self, params: &DetectionParams) -> Option<ObjectCluster> {
        let count = std::mem::take(&mut self.count);
        if count > params.min_size && count < params.max_size {
            Some(ObjectCluster {
                centroid: Point2::from(self.sum / count as f64),
                size: count,
                start_step: self.start,
            })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Pose;
    use approx::assert_relative_eq;

    const STEPS: usize = 1081;

    fn engine() -> ClusterEngine {
        ClusterEngine::new(ScanProjector::new(1080, Pose::identity()))
    }

    fn params(min_size: usize, max_size: usize) -> DetectionParams {
        DetectionParams {
            gap: 100,
            min_size,
            max_size,
            skip: 1,
        }
    }

    fn scan_with_runs(runs: &[(usize, usize)]) -> (Vec<u32>, Vec<u32>) {
        let baseline = vec![3000; STEPS];
        let mut latest = baseline.clone();
        for &(start, len) in runs {
            latest[start..start + len].fill(1500);
        }
        (latest, baseline)
    }

    #[test]
    fn test_single_run_example() {
        let (latest, baseline) = scan_with_runs(&[(400, 30)]);
        let clusters = engine().detect(&latest, &baseline, &params(2, 50));
        assert_eq!(clusters.len(), 1);
        let c = clusters.largest().unwrap();
        assert_eq!(c.size, 30);
        assert_eq!(c.start_step, 400);
    }

    #[test]
    fn test_centroid_is_mean_of_projected_points() {
        let (latest, baseline) = scan_with_runs(&[(100, 5)]);
        let engine = engine();
        let clusters = engine.detect(&latest, &baseline, &params(2, 50));
        let expected = (100..105)
            .map(|s| engine.projector().world(s, 1500).coords)
            .sum::<Vector2<f64>>()
            / 5.0;
        assert_relative_eq!(clusters.as_slice()[0].centroid.coords, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_boundary_lengths_are_excluded() {
        let (latest, baseline) = scan_with_runs(&[(100, 2), (200, 3), (300, 49), (500, 50)]);
        let clusters = engine().detect(&latest, &baseline, &params(2, 50));
        let sizes: Vec<usize> = clusters.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![3, 49]);
    }

    #[test]
    fn test_no_foreground_no_clusters() {
        let baseline = vec![3000; STEPS];
        let latest: Vec<u32> = baseline.iter().map(|r| r + 100).collect();
        assert!(engine().detect(&latest, &baseline, &params(0, 50)).is_empty());
    }

    #[test]
    fn test_uncaptured_baseline_reads_as_foreground() {
        let latest = vec![3000; STEPS];
        let baseline = vec![0; STEPS];
        // 整帧都是前景，超过 max_size 被当作墙面丢弃
        assert!(engine().detect(&latest, &baseline, &params(2, 50)).is_empty());
        let clusters = engine().detect(&latest, &baseline, &params(2, 2000));
        assert_eq!(clusters.len(), 1);
        // 最后 skip 个步号不参与遍历
        assert_eq!(clusters.as_slice()[0].size, STEPS - 1);
    }

    #[test]
    fn test_run_open_at_end_is_flushed() {
        let (latest, baseline) = scan_with_runs(&[(STEPS - 11, 11)]);
        let clusters = engine().detect(&latest, &baseline, &params(2, 50));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters.as_slice()[0].size, 10);
    }

    #[test]
    fn test_skip_counts_samples() {
        let (latest, baseline) = scan_with_runs(&[(400, 30)]);
        let p = DetectionParams {
            skip: 3,
            ..params(2, 50)
        };
        let clusters = engine().detect(&latest, &baseline, &p);
        assert_eq!(clusters.len(), 1);
        // 400..430 中 3 的倍数：402, 405, ..., 429
        assert_eq!(clusters.as_slice()[0].size, 10);
        assert_eq!(clusters.as_slice()[0].start_step, 402);
    }

    #[test]
    fn test_zero_skip_is_treated_as_one() {
        let (latest, baseline) = scan_with_runs(&[(400, 30)]);
        let p = DetectionParams {
            skip: 0,
            ..params(2, 50)
        };
        assert_eq!(engine().detect(&latest, &baseline, &p).len(), 1);
    }

    #[test]
    fn test_largest_tie_prefers_lowest_step() {
        let (latest, baseline) = scan_with_runs(&[(100, 10), (300, 20), (600, 20)]);
        let clusters = engine().detect(&latest, &baseline, &params(2, 50));
        assert_eq!(clusters.largest().unwrap().start_step, 300);
    }

    #[test]
    fn test_sorted_by_size_is_stable_and_non_mutating() {
        let (latest, baseline) = scan_with_runs(&[(100, 10), (300, 20), (600, 20), (800, 5)]);
        let clusters = engine().detect(&latest, &baseline, &params(2, 50));
        let sorted = clusters.sorted_by_size();
        let order: Vec<usize> = sorted.iter().map(|c| c.start_step).collect();
        assert_eq!(order, vec![300, 600, 100, 800]);
        let original: Vec<usize> = clusters.iter().map(|c| c.start_step).collect();
        assert_eq!(original, vec![100, 300, 600, 800]);
    }

    #[test]
    fn test_self_diff_is_empty() {
        let (latest, _) = scan_with_runs(&[(400, 30)]);
        assert!(engine().detect(&latest, &latest, &params(2, 50)).is_empty());
    }

    #[test]
    fn test_mismatched_lengths_use_common_prefix() {
        let (latest, baseline) = scan_with_runs(&[(400, 30)]);
        let clusters = engine().detect(&latest[..420], &baseline, &params(2, 50));
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters.as_slice()[0].size, 19);
    }

    #[test]
    fn test_empty_input() {
        assert!(engine().detect(&[], &[], &DetectionParams::default()).is_empty());
        assert!(ClusterSet::default().largest().is_none());
    }
}
