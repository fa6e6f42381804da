pub mod indexer;

pub use indexer::{CameraIndexer, FrameSource, RunEnd, RunSummary, SourceFrame};
