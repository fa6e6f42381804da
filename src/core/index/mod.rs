//! 特征索引：记录 ID、存储、发射与逐帧协调

pub mod config;
pub mod coordinator;
pub mod emitter;
pub mod record_id;
pub mod sink;

pub use config::{ExtractionConfig, IndexerConfig, KeyFrameConfig, MAX_REGIONS_PER_FRAME};
pub use coordinator::{Coordinator, FrameOutcome, PipelineStats};
pub use emitter::{
    BackpressurePolicy, EmitConfig, EmitCounts, EmitMode, EmitQueue, EmitRecord, Emitter,
};
pub use record_id::{
    make_id, CameraId, RecordId, RecordParts, CAMERA_ID_LEN, MAX_FRAME_POSITION, MAX_SEQUENCE,
};
pub use sink::{FeatureSink, JsonLinesSink, MemorySink};
