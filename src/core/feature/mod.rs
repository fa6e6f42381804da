//! 行人图片特征提取
//!
//! 1. 条带划分 - 6 个水平条带
//! 2. 颜色直方图 - BGR / HSV / YCrCb / Lab，每通道 16 bin
//! 3. 特征拼接 - 1152 维
//! 4. PCA 降维 - 预训练模型

pub mod assembler;
pub mod color;
pub mod histogram;
pub mod reducer;
pub mod stripe;

pub use assembler::{assemble, FlatFeatureVector, FEATURE_LEN};
pub use color::ColorSpace;
pub use histogram::{BandHistograms, ChannelHistogram, HIST_BINS};
pub use reducer::{Fingerprint, ReductionModel};
pub use stripe::{make_band_masks, BandMask, BAND_COUNT};
