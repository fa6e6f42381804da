pub mod detector;
pub mod diff_filter;
pub mod frame;
pub mod segmenter;

pub use detector::{suppress_nested, MockRegionDetector, RegionDetector};
pub use diff_filter::{
    FrameDiffFilter, HistDiffConfig, HistDiffFilter, HistogramMetric, KeyFrameFilter,
    PixelDiffConfig,
};
pub use frame::{Frame, Region};
pub use segmenter::{
    SegmentId, SegmentIdSource, SegmentTick, SegmentWindow, Segmenter, TimestampSegmentIds,
    DEFAULT_SEGMENT_WINDOW_MS, SEGMENT_ID_LEN,
};
