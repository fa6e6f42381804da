use log::warn;
use serde::Deserialize;

use super::frame::Frame;
use crate::core::error::IndexResult;

/// 关键帧判定：候选帧相对参考帧是否变化足够大
///
/// 实现必须是无状态的，参考帧由调用方持有和更新。
pub trait KeyFrameFilter: Send + Sync {
    fn is_key_frame(&self, reference: &Frame, candidate: &Frame) -> bool;
}

/// 帧差法参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PixelDiffConfig {
    pub sample_width: u32,
    pub sample_height: u32,
    /// 单个像素灰度差超过该值才算变化
    pub pixel_delta: u8,
    /// 变化像素比例超过该值即为关键帧
    pub changed_ratio: f32,
}

impl Default for PixelDiffConfig {
    fn default() -> Self {
        Self {
            sample_width: 32,
            sample_height: 32,
            pixel_delta: 25,
            changed_ratio: 0.05,
        }
    }
}

/// 帧差法：两帧缩放到同一采样尺寸后逐像素比较灰度
pub struct FrameDiffFilter {
    config: PixelDiffConfig,
}

impl FrameDiffFilter {
    pub fn new() -> Self {
        Self::with_config(PixelDiffConfig::default())
    }

    pub fn with_config(config: PixelDiffConfig) -> Self {
        Self { config }
    }

    /// Fraction of sampled pixels whose gray level moved by more than `pixel_delta`.
    pub fn changed_fraction(&self, reference: &Frame, candidate: &Frame) -> IndexResult<f32> {
        let (w, h) = (self.config.sample_width, self.config.sample_height);
        let a = reference.resize_to(w, h)?.to_gray();
        let b = candidate.resize_to(w, h)?.to_gray();

        let changed = a
            .iter()
            .zip(b.iter())
            .filter(|(x, y)| x.abs_diff(**y) > self.config.pixel_delta)
            .count();

        Ok(changed as f32 / a.len().max(1) as f32)
    }
}

impl Default for FrameDiffFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyFrameFilter for FrameDiffFilter {
    fn is_key_frame(&self, reference: &Frame, candidate: &Frame) -> bool {
        match self.changed_fraction(reference, candidate) {
            Ok(fraction) => fraction > self.config.changed_ratio,
            Err(e) => {
                warn!("⚠️ Frame diff failed on frame {}: {}", candidate.frame_number, e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistogramMetric {
    Correlation,
    ChiSquare,
    Intersection,
}

/// 直方图差异法参数
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HistDiffConfig {
    pub bins: usize,
    pub metric: HistogramMetric,
    /// 差异分数超过该值即为关键帧
    pub threshold: f32,
}

impl Default for HistDiffConfig {
    fn default() -> Self {
        Self {
            bins: 64,
            metric: HistogramMetric::Correlation,
            threshold: 0.10,
        }
    }
}

/// 直方图差异法：比较两帧的全局灰度直方图
pub struct HistDiffFilter {
    config: HistDiffConfig,
}

impl HistDiffFilter {
    pub fn new() -> Self {
        Self::with_config(HistDiffConfig::default())
    }

    pub fn with_config(config: HistDiffConfig) -> Self {
        Self { config }
    }

    /// 归一化灰度直方图（各 bin 之和为 1）
    fn gray_histogram(frame: &Frame, bins: usize) -> Vec<f32> {
        let bins = bins.clamp(1, 256);
        let mut hist = vec![0f32; bins];
        let gray = frame.to_gray();
        for &val in &gray {
            hist[val as usize * bins / 256] += 1.0;
        }
        let total = gray.len().max(1) as f32;
        hist.iter_mut().for_each(|v| *v /= total);
        hist
    }

    /// 差异分数，0 表示相同，越大差异越大
    pub fn difference(&self, reference: &Frame, candidate: &Frame) -> f32 {
        let h1 = Self::gray_histogram(reference, self.config.bins);
        let h2 = Self::gray_histogram(candidate, self.config.bins);

        match self.config.metric {
            HistogramMetric::Correlation => 1.0 - Self::correlation(&h1, &h2),
            HistogramMetric::ChiSquare => Self::chi_square(&h1, &h2),
            HistogramMetric::Intersection => 1.0 - Self::intersection(&h1, &h2),
        }
    }

    fn correlation(h1: &[f32], h2: &[f32]) -> f32 {
        let n = h1.len() as f32;
        let mean1 = h1.iter().sum::<f32>() / n;
        let mean2 = h2.iter().sum::<f32>() / n;

        let mut num = 0.0;
        let mut den1 = 0.0;
        let mut den2 = 0.0;
        for (a, b) in h1.iter().zip(h2.iter()) {
            let da = a - mean1;
            let db = b - mean2;
            num += da * db;
            den1 += da * da;
            den2 += db * db;
        }

        let den = (den1 * den2).sqrt();
        if den <= f32::EPSILON {
            // 两个直方图至少有一个是平的
            return if h1 == h2 { 1.0 } else { 0.0 };
        }
        num / den
    }

    fn chi_square(h1: &[f32], h2: &[f32]) -> f32 {
        h1.iter()
            .zip(h2.iter())
            .filter(|(a, _)| **a > 0.0)
            .map(|(a, b)| (a - b) * (a - b) / a)
            .sum()
    }

    fn intersection(h1: &[f32], h2: &[f32]) -> f32 {
        h1.iter().zip(h2.iter()).map(|(a, b)| a.min(*b)).sum()
    }
}

impl Default for HistDiffFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyFrameFilter for HistDiffFilter {
    fn is_key_frame(&self, reference: &Frame, candidate: &Frame) -> bool {
        self.difference(reference, candidate) > self.config.threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_frame(width: u32, height: u32, fill: u8) -> Frame {
        let data = vec![fill; (width * height * 4) as usize];
        Frame::new(width, height, data, 0, 0)
    }

    fn half_split_frame(width: u32, height: u32, top: u8, bottom: u8) -> Frame {
        let mut data = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height {
            let v = if y < height / 2 { top } else { bottom };
            for _ in 0..width {
                data.extend_from_slice(&[v, v, v, 255]);
            }
        }
        Frame::new(width, height, data, 0, 0)
    }

    #[test]
    fn test_identical_frames() {
        let filter = FrameDiffFilter::new();
        let frame1 = create_test_frame(100, 100, 128);
        let frame2 = create_test_frame(100, 100, 128);

        assert!(!filter.is_key_frame(&frame1, &frame2));
        assert_eq!(filter.changed_fraction(&frame1, &frame2).unwrap(), 0.0);
    }

    #[test]
    fn test_different_frames() {
        let filter = FrameDiffFilter::new();
        let frame1 = create_test_frame(100, 100, 0);
        let frame2 = create_test_frame(100, 100, 255);

        assert!(filter.is_key_frame(&frame1, &frame2));
    }

    #[test]
    fn test_small_change_below_ratio() {
        let filter = FrameDiffFilter::with_config(PixelDiffConfig {
            changed_ratio: 0.6,
            ..PixelDiffConfig::default()
        });
        let frame1 = create_test_frame(64, 64, 0);
        let frame2 = half_split_frame(64, 64, 0, 255);

        let fraction = filter.changed_fraction(&frame1, &frame2).unwrap();
        assert!(fraction > 0.4 && fraction < 0.6);
        assert!(!filter.is_key_frame(&frame1, &frame2));
    }

    #[test]
    fn test_invalid_frame_is_not_key() {
        let filter = FrameDiffFilter::new();
        let good = create_test_frame(10, 10, 0);
        let bad = Frame::new(10, 10, vec![0u8; 3], 0, 0);
        assert!(!filter.is_key_frame(&good, &bad));
    }

    #[test]
    fn test_histogram_identical_frames() {
        for metric in [
            HistogramMetric::Correlation,
            HistogramMetric::ChiSquare,
            HistogramMetric::Intersection,
        ] {
            let filter = HistDiffFilter::with_config(HistDiffConfig {
                metric,
                ..HistDiffConfig::default()
            });
            let a = half_split_frame(40, 40, 10, 200);
            let b = half_split_frame(40, 40, 10, 200);
            assert!(filter.difference(&a, &b).abs() < 1e-5, "{:?}", metric);
            assert!(!filter.is_key_frame(&a, &b));
        }
    }

    #[test]
    fn test_histogram_different_frames() {
        let filter = HistDiffFilter::new();
        let a = create_test_frame(40, 40, 10);
        let b = create_test_frame(40, 40, 220);
        assert!(filter.is_key_frame(&a, &b));
    }

    #[test]
    fn test_histogram_ignores_frame_size() {
        let filter = HistDiffFilter::with_config(HistDiffConfig {
            metric: HistogramMetric::Intersection,
            ..HistDiffConfig::default()
        });
        let a = half_split_frame(40, 40, 10, 200);
        let b = half_split_frame(80, 20, 10, 200);
        assert!(filter.difference(&a, &b).abs() < 1e-5);
    }

    #[test]
    fn test_intersection_and_correlation() {
        let h1 = [0.25f32; 4];
        assert!((HistDiffFilter::intersection(&h1, &h1) - 1.0).abs() < 1e-6);
        let h2 = [1.0f32, 0.0, 0.0, 0.0];
        let h3 = [0.0f32, 1.0, 0.0, 0.0];
        assert!(HistDiffFilter::correlation(&h2, &h3) < 0.0);
        assert!((HistDiffFilter::correlation(&h2, &h2) - 1.0).abs() < 1e-6);
    }
}
