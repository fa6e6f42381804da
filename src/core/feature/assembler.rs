use super::color::ColorSpace;
use super::histogram::{self, BandHistograms, CHANNELS, HIST_BINS};
use super::stripe::{make_band_masks, BAND_COUNT};
use crate::core::error::{IndexError, IndexResult};
use crate::core::video::Frame;

/// 6 条带 × 4 颜色空间 × 3 通道 × 16 bin
pub const FEATURE_LEN: usize = BAND_COUNT * ColorSpace::ALL.len() * CHANNELS * HIST_BINS;

/// 拼接后的 1152 维原始特征
///
/// Layout: band, then colour space in `ColorSpace::ALL` order, then channel,
/// then bin. Trained reduction models depend on this exact order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatFeatureVector(Vec<f32>);

impl FlatFeatureVector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Offset of `(band, space, channel)`'s first bin.
    pub fn offset(band: usize, space: ColorSpace, channel: usize) -> usize {
        let space_idx = ColorSpace::ALL
            .iter()
            .position(|s| *s == space)
            .unwrap_or_default();
        ((band * ColorSpace::ALL.len() + space_idx) * CHANNELS + channel) * HIST_BINS
    }

    #[cfg(test)]
    pub(crate) fn from_raw(values: Vec<f32>) -> Self {
        assert_eq!(values.len(), FEATURE_LEN);
        Self(values)
    }
}

/// 提取行人图片的颜色直方图特征
pub fn assemble(region: &Frame) -> IndexResult<FlatFeatureVector> {
    region.validate()?;
    if region.width == 0 || region.height == 0 {
        return Err(IndexError::InvalidFrame(format!(
            "empty region {}x{}",
            region.width, region.height
        )));
    }

    let masks = make_band_masks(region.width, region.height);
    let per_space = ColorSpace::ALL
        .iter()
        .map(|&space| histogram::extract(region, &masks, space))
        .collect::<IndexResult<Vec<BandHistograms>>>()?;

    let mut feature = Vec::with_capacity(FEATURE_LEN);
    for band in 0..BAND_COUNT {
        for hists in &per_space {
            for channel in &hists[band] {
                feature.extend_from_slice(channel.bins());
            }
        }
    }

    debug_assert_eq!(feature.len(), FEATURE_LEN);
    Ok(FlatFeatureVector(feature))
}
