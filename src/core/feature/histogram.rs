use super::color::ColorSpace;
use super::stripe::{BandMask, BAND_COUNT};
use crate::core::error::IndexResult;
use crate::core::video::Frame;

pub const HIST_BINS: usize = 16;
pub const CHANNELS: usize = 3;

/// 单通道 16 bin 直方图（原始像素计数）
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelHistogram(pub [f32; HIST_BINS]);

impl ChannelHistogram {
    /// 均匀分箱；落在 [low, high) 之外的值不计入任何 bin
    pub fn add(&mut self, value: u8, (low, high): (f32, f32)) {
        let scale = HIST_BINS as f32 / (high - low);
        let idx = ((value as f32 - low) * scale).floor();
        if idx >= 0.0 && (idx as usize) < HIST_BINS {
            self.0[idx as usize] += 1.0;
        }
    }

    pub fn total(&self) -> f32 {
        self.0.iter().sum()
    }

    pub fn bins(&self) -> &[f32; HIST_BINS] {
        &self.0
    }
}

/// 一个颜色空间下 6 条带 × 3 通道的直方图
pub type BandHistograms = [[ChannelHistogram; CHANNELS]; BAND_COUNT];

/// 按条带掩膜统计 `region` 在 `space` 颜色空间下各通道的直方图
///
/// Only pixels selected by a band's mask contribute to that band. A frame whose
/// buffer does not match its size is rejected.
pub fn extract(
    region: &Frame,
    masks: &[BandMask; BAND_COUNT],
    space: ColorSpace,
) -> IndexResult<BandHistograms> {
    region.validate()?;
    let ranges = space.channel_ranges();
    let mut out = [[ChannelHistogram::default(); CHANNELS]; BAND_COUNT];

    for (band, mask) in masks.iter().enumerate() {
        let rows = mask.rows.start..mask.rows.end.min(region.height);
        let cols = mask.width.min(region.width);
        for y in rows {
            for x in 0..cols {
                let [r, g, b, _] = region.pixel(x, y);
                let converted = space.convert([r, g, b]);
                for (c, value) in converted.into_iter().enumerate() {
                    out[band][c].add(value, ranges[c]);
                }
            }
        }
    }

    Ok(out)
}
