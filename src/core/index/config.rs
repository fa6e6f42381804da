use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::emitter::{EmitConfig, EmitMode};
use crate::core::error::{IndexError, IndexResult};
use crate::core::video::{
    FrameDiffFilter, HistDiffConfig, HistDiffFilter, KeyFrameFilter, PixelDiffConfig,
    DEFAULT_SEGMENT_WINDOW_MS,
};

/// 2 位区域序号能表示的上限
pub const MAX_REGIONS_PER_FRAME: usize = 100;

/// 关键帧判定策略
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum KeyFrameConfig {
    PixelDiff(PixelDiffConfig),
    HistogramDiff(HistDiffConfig),
}

impl Default for KeyFrameConfig {
    fn default() -> Self {
        KeyFrameConfig::PixelDiff(PixelDiffConfig::default())
    }
}

impl KeyFrameConfig {
    /// 人流密集场景：小变化也处理
    pub fn sensitive() -> Self {
        KeyFrameConfig::PixelDiff(PixelDiffConfig {
            pixel_delta: 15,
            changed_ratio: 0.02,
            ..PixelDiffConfig::default()
        })
    }

    /// 静态场景：只处理明显变化
    pub fn conservative() -> Self {
        KeyFrameConfig::PixelDiff(PixelDiffConfig {
            pixel_delta: 35,
            changed_ratio: 0.10,
            ..PixelDiffConfig::default()
        })
    }

    pub fn build(&self) -> Box<dyn KeyFrameFilter> {
        match self {
            KeyFrameConfig::PixelDiff(c) => Box::new(FrameDiffFilter::with_config(c.clone())),
            KeyFrameConfig::HistogramDiff(c) => Box::new(HistDiffFilter::with_config(c.clone())),
        }
    }

    fn validate(&self) -> IndexResult<()> {
        match self {
            KeyFrameConfig::PixelDiff(c) => {
                if c.sample_width == 0 || c.sample_height == 0 {
                    return Err(invalid("pixel_diff sample size must be non-zero"));
                }
                if !(0.0..=1.0).contains(&c.changed_ratio) {
                    return Err(invalid("pixel_diff changed_ratio must be within 0..=1"));
                }
            }
            KeyFrameConfig::HistogramDiff(c) => {
                if c.bins == 0 || c.bins > 256 {
                    return Err(invalid("histogram_diff bins must be within 1..=256"));
                }
                if !c.threshold.is_finite() || c.threshold < 0.0 {
                    return Err(invalid("histogram_diff threshold must be a non-negative number"));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub max_regions_per_frame: usize,
    /// 去掉嵌套在其他检测框内的框
    pub suppress_nested: bool,
    /// 同一帧的多个区域并行提取特征
    pub parallel_regions: bool,
    /// 只保留前 N 个主成分
    pub components: Option<usize>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            max_regions_per_frame: MAX_REGIONS_PER_FRAME,
            suppress_nested: true,
            parallel_regions: false,
            components: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub model_path: PathBuf,
    pub segment_window_ms: u64,
    pub key_frame: KeyFrameConfig,
    pub extraction: ExtractionConfig,
    pub emit: EmitConfig,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("model/pca.json"),
            segment_window_ms: DEFAULT_SEGMENT_WINDOW_MS,
            key_frame: KeyFrameConfig::default(),
            extraction: ExtractionConfig::default(),
            emit: EmitConfig::default(),
        }
    }
}

fn invalid(msg: &str) -> IndexError {
    IndexError::InvalidConfig(msg.to_string())
}

impl IndexerConfig {
    pub fn from_json5_str(raw: &str) -> IndexResult<Self> {
        let config: IndexerConfig = json5::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json5_file(path: impl AsRef<Path>) -> IndexResult<Self> {
        let raw = fs::read_to_string(path)?;
        Self::from_json5_str(&raw)
    }

    pub fn validate(&self) -> IndexResult<()> {
        if self.segment_window_ms == 0 {
            return Err(invalid("segment_window_ms must be non-zero"));
        }
        self.key_frame.validate()?;

        let max = self.extraction.max_regions_per_frame;
        if max == 0 || max > MAX_REGIONS_PER_FRAME {
            return Err(IndexError::InvalidConfig(format!(
                "max_regions_per_frame must be within 1..={}",
                MAX_REGIONS_PER_FRAME
            )));
        }
        if self.extraction.components == Some(0) {
            return Err(invalid("components must be at least 1"));
        }
        if self.emit.mode == EmitMode::Queued && self.emit.capacity == 0 {
            return Err(invalid("queued emit needs a non-zero capacity"));
        }
        Ok(())
    }
}
