use super::frame::{Frame, Region};
use crate::core::error::IndexResult;

/// 行人检测协作方
///
/// The returned order is the per-frame sequence order of the emitted records,
/// so implementations must be deterministic for a given frame. An empty list is
/// a valid answer. The frame is borrowed immutably.
pub trait RegionDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> IndexResult<Vec<Region>>;
}

/// 去掉严格嵌套在其他检测框内部的框，保持原有顺序
pub fn suppress_nested(regions: Vec<Region>) -> Vec<Region> {
    regions
        .iter()
        .enumerate()
        .filter(|(i, r)| {
            !regions
                .iter()
                .enumerate()
                .any(|(j, q)| *i != j && r.is_inside(q))
        })
        .map(|(_, r)| *r)
        .collect()
}

/// 固定返回预设区域的检测器（用于测试和联调）
pub struct MockRegionDetector {
    regions: Vec<Region>,
    // 模拟只在特定帧编号上有人
    frame_pattern: Option<Box<dyn Fn(u64) -> bool + Send + Sync>>,
}

impl MockRegionDetector {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            regions,
            frame_pattern: None,
        }
    }

    pub fn with_pattern<F>(regions: Vec<Region>, pattern: F) -> Self
    where
        F: Fn(u64) -> bool + Send + Sync + 'static,
    {
        Self {
            regions,
            frame_pattern: Some(Box::new(pattern)),
        }
    }

    pub fn with_fixed_frames(regions: Vec<Region>, frames: Vec<u64>) -> Self {
        Self::with_pattern(regions, move |frame_num| frames.contains(&frame_num))
    }
}

impl Default for MockRegionDetector {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RegionDetector for MockRegionDetector {
    fn detect(&self, frame: &Frame) -> IndexResult<Vec<Region>> {
        let present = self
            .frame_pattern
            .as_ref()
            .map(|p| p(frame.frame_number))
            .unwrap_or(true);

        Ok(if present {
            self.regions.clone()
        } else {
            Vec::new()
        })
    }
}
