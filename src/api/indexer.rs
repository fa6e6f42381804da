//! 单路摄像头索引器

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{error, info, warn};

use crate::core::error::IndexResult;
use crate::core::feature::ReductionModel;
use crate::core::index::{
    CameraId, Coordinator, EmitCounts, Emitter, FeatureSink, FrameOutcome, IndexerConfig,
    PipelineStats,
};
use crate::core::video::{Frame, RegionDetector, SegmentIdSource, Segmenter, TimestampSegmentIds};

/// 数据源读出的一帧，`stream_ms` 为单调递增的流时间
#[derive(Debug, Clone)]
pub struct SourceFrame {
    pub stream_ms: u64,
    pub frame: Frame,
}

/// 摄像头/视频流读取方。`Ok(None)` 表示流已结束。
pub trait FrameSource {
    fn next_frame(&mut self) -> IndexResult<Option<SourceFrame>>;
}

impl<I> FrameSource for I
where
    I: Iterator<Item = SourceFrame>,
{
    fn next_frame(&mut self) -> IndexResult<Option<SourceFrame>> {
        Ok(self.next())
    }
}

/// 采集循环结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEnd {
    /// 数据源没有更多帧
    Exhausted,
    /// 外部设置了停止标志
    Stopped,
    /// 数据源读取失败
    SourceFailed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub end: RunEnd,
    pub frames_read: u64,
    pub segments: u64,
    pub stats: PipelineStats,
    /// 排队发射时的计数，直接发射时为 `None`
    pub emit: Option<EmitCounts>,
}

/// 摄像头索引器 - 分段 + 关键帧 + 行人特征入库
///
/// ```ignore
/// let config = IndexerConfig::from_json5_file("indexer.json5")?;
/// let indexer = CameraIndexer::new("192.168.3.1", config, detector, sink)?;
/// let summary = indexer.run(&mut frames, &stop);
/// ```
pub struct CameraIndexer<S: SegmentIdSource = TimestampSegmentIds> {
    camera: CameraId,
    segmenter: Segmenter<S>,
    coordinator: Coordinator,
    frames_read: u64,
    segments: u64,
}

impl CameraIndexer<TimestampSegmentIds> {
    /// 加载配置中的降维模型并创建索引器
    ///
    /// A missing or malformed model is a startup error.
    pub fn new(
        camera: &str,
        config: IndexerConfig,
        detector: Box<dyn RegionDetector>,
        sink: Arc<dyn FeatureSink>,
    ) -> IndexResult<Self> {
        let model = ReductionModel::load(&config.model_path)?;
        Self::with_parts(camera, config, model, detector, sink, TimestampSegmentIds::new())
    }
}

impl<S: SegmentIdSource> CameraIndexer<S> {
    pub fn with_parts(
        camera: &str,
        config: IndexerConfig,
        model: ReductionModel,
        detector: Box<dyn RegionDetector>,
        sink: Arc<dyn FeatureSink>,
        segment_ids: S,
    ) -> IndexResult<Self> {
        config.validate()?;
        let camera = CameraId::parse(camera)?;

        let model = match config.extraction.components {
            Some(k) => model.truncated(k)?,
            None => model,
        };

        let emitter = Emitter::from_config(&config.emit, sink)?;
        let coordinator = Coordinator::new(
            Arc::new(model),
            config.key_frame.build(),
            detector,
            emitter,
            config.extraction.clone(),
        )?;

        info!(
            "🎬 CameraIndexer: created for camera {} ({:?} emit)",
            camera, config.emit.mode
        );
        Ok(Self {
            camera,
            segmenter: Segmenter::with_window(segment_ids, config.segment_window_ms),
            coordinator,
            frames_read: 0,
            segments: 0,
        })
    }

    pub fn camera(&self) -> &CameraId {
        &self.camera
    }

    /// 处理单帧：推进分段，再交给协调器
    pub fn process(&mut self, stream_ms: u64, frame: &Frame) -> FrameOutcome {
        self.frames_read += 1;
        let tick = self.segmenter.advance(stream_ms);
        if tick.is_new_segment {
            self.segments += 1;
        }
        self.coordinator
            .handle(&self.camera, &tick.segment, tick.window.frame_count, frame)
    }

    pub fn stats(&self) -> PipelineStats {
        self.coordinator.stats()
    }

    /// 持续读取直到数据源结束或 `stop` 被置位，然后关闭发射通道
    pub fn run<F>(mut self, source: &mut F, stop: &AtomicBool) -> RunSummary
    where
        F: FrameSource + ?Sized,
    {
        let end = loop {
            if stop.load(Ordering::SeqCst) {
                info!("🛑 Stop requested after {} frames", self.frames_read);
                break RunEnd::Stopped;
            }
            match source.next_frame() {
                Ok(Some(SourceFrame { stream_ms, frame })) => {
                    self.process(stream_ms, &frame);
                }
                Ok(None) => {
                    info!("✅ Source exhausted after {} frames", self.frames_read);
                    break RunEnd::Exhausted;
                }
                Err(e) => {
                    error!("❌ Frame source failed: {}", e);
                    break RunEnd::SourceFailed;
                }
            }
        };

        let frames_read = self.frames_read;
        let segments = self.segments;
        let stats = self.coordinator.stats();
        let emit = self.coordinator.close();
        RunSummary {
            end,
            frames_read,
            segments,
            stats,
            emit,
        }
    }

    /// 正常关闭，等待排队中的记录写完
    pub fn close(self) -> Option<EmitCounts> {
        info!("🗑️ CameraIndexer: released camera {}", self.camera);
        self.coordinator.close()
    }

    /// 强制关闭，最多丢失已排队但未写出的记录
    pub fn abort(self) -> Option<EmitCounts> {
        warn!("🗑️ CameraIndexer: aborting camera {}", self.camera);
        self.coordinator.abort()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::IndexError;
    use crate::core::feature::FEATURE_LEN;
    use crate::core::index::{EmitConfig, EmitMode, MemorySink, RecordId};
    use crate::core::video::{MockRegionDetector, Region, SegmentId};
    use std::io::Write;

    fn axis_model_json(rank: usize) -> serde_json::Value {
        let eigenvectors: Vec<Vec<f32>> = (0..rank)
            .map(|i| {
                let mut row = vec![0f32; FEATURE_LEN];
                row[i * 16] = 1.0;
                row
            })
            .collect();
        serde_json::json!({
            "mean": vec![0f32; FEATURE_LEN],
            "eigenvalues": vec![1f32; rank],
            "eigenvectors": eigenvectors,
        })
    }

    fn model_file(rank: usize) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", axis_model_json(rank)).unwrap();
        file
    }

    fn model(rank: usize) -> ReductionModel {
        serde_json::from_value(axis_model_json(rank)).unwrap()
    }

    fn segment_ids() -> impl FnMut() -> SegmentId {
        let mut n = 0;
        move || {
            n += 1;
            SegmentId::new(format!("2015100722{:04}", n)).unwrap()
        }
    }

    /// 黑白交替，保证每帧都与上一关键帧差异明显
    fn flat_frame(frame_number: u64) -> Frame {
        let value = if frame_number % 2 == 0 { 0 } else { 255 };
        let data = [value, value, value, 255].repeat(48 * 64);
        Frame::new(48, 64, data, frame_number * 40, frame_number)
    }

    fn source(times_ms: &[u64]) -> impl Iterator<Item = SourceFrame> {
        times_ms
            .iter()
            .enumerate()
            .map(|(i, &stream_ms)| SourceFrame {
                stream_ms,
                frame: flat_frame(i as u64 + 1),
            })
            .collect::<Vec<_>>()
            .into_iter()
    }

    fn detector() -> Box<dyn RegionDetector> {
        Box::new(MockRegionDetector::new(vec![
            Region::new(0, 0, 16, 24),
            Region::new(20, 10, 20, 40),
        ]))
    }

    fn indexer(
        config: IndexerConfig,
        sink: Arc<MemorySink>,
    ) -> CameraIndexer<impl FnMut() -> SegmentId> {
        CameraIndexer::with_parts("192.168.3.1", config, model(4), detector(), sink, segment_ids())
            .unwrap()
    }

    #[test]
    fn test_new_loads_model_from_config() {
        let file = model_file(3);
        let config = IndexerConfig {
            model_path: file.path().to_path_buf(),
            ..IndexerConfig::default()
        };
        let sink = Arc::new(MemorySink::new());
        let indexer = CameraIndexer::new("192.168.3.1", config, detector(), sink.clone()).unwrap();
        assert_eq!(indexer.camera().as_str(), "c0a80301");

        let summary = indexer.run(&mut source(&[0]), &AtomicBool::new(false));
        assert_eq!(summary.end, RunEnd::Exhausted);
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.get(&sink.ids()[0]).unwrap().len(), 3);
    }

    #[test]
    fn test_missing_model_is_fatal() {
        let config = IndexerConfig {
            model_path: "/nonexistent/pca.json".into(),
            ..IndexerConfig::default()
        };
        let err = CameraIndexer::new("192.168.3.1", config, detector(), Arc::new(MemorySink::new()))
            .err()
            .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_invalid_camera_rejected() {
        let result = CameraIndexer::with_parts(
            "cam #1",
            IndexerConfig::default(),
            model(2),
            detector(),
            Arc::new(MemorySink::new()),
            segment_ids(),
        );
        assert!(matches!(result, Err(IndexError::InvalidCamera(_))));
    }

    #[test]
    fn test_run_until_exhausted() {
        let sink = Arc::new(MemorySink::new());
        let summary = indexer(IndexerConfig::default(), sink.clone())
            .run(&mut source(&[0, 40, 80]), &AtomicBool::new(false));

        assert_eq!(summary.end, RunEnd::Exhausted);
        assert_eq!(summary.frames_read, 3);
        assert_eq!(summary.segments, 1);
        assert_eq!(summary.stats.key_frames, 3);
        assert_eq!(summary.stats.records_emitted, 6);
        assert_eq!(summary.emit, None);

        let positions: Vec<u64> = sink
            .ids()
            .iter()
            .map(|id| RecordId::parse(id.as_str()).unwrap().frame_position)
            .collect();
        assert_eq!(positions, vec![0, 0, 1, 1, 2, 2]);
        assert!(sink.ids()[0].as_str().starts_with("c0a8030120151007220001"));
    }

    #[test]
    fn test_segment_rollover_restarts_positions() {
        let sink = Arc::new(MemorySink::new());
        let summary = indexer(IndexerConfig::default(), sink.clone())
            .run(&mut source(&[0, 40, 600_000, 600_040]), &AtomicBool::new(false));

        assert_eq!(summary.segments, 2);
        let parts: Vec<_> = sink
            .ids()
            .iter()
            .map(|id| RecordId::parse(id.as_str()).unwrap())
            .collect();
        assert_eq!(parts.len(), 8);
        assert_eq!(parts[4].segment, "20151007220002");
        assert_eq!(parts[4].frame_position, 0);
        assert_eq!(parts[6].frame_position, 1);
    }

    #[test]
    fn test_stop_flag_ends_run() {
        let sink = Arc::new(MemorySink::new());
        let summary = indexer(IndexerConfig::default(), sink.clone())
            .run(&mut source(&[0, 40]), &AtomicBool::new(true));
        assert_eq!(summary.end, RunEnd::Stopped);
        assert_eq!(summary.frames_read, 0);
        assert!(sink.is_empty());
    }

    struct BrokenSource {
        remaining: usize,
    }

    impl FrameSource for BrokenSource {
        fn next_frame(&mut self) -> IndexResult<Option<SourceFrame>> {
            if self.remaining == 0 {
                return Err(IndexError::InvalidFrame("decoder lost sync".to_string()));
            }
            self.remaining -= 1;
            Ok(Some(SourceFrame {
                stream_ms: 0,
                frame: flat_frame(1),
            }))
        }
    }

    #[test]
    fn test_source_failure_ends_run() {
        let sink = Arc::new(MemorySink::new());
        let summary = indexer(IndexerConfig::default(), sink.clone())
            .run(&mut BrokenSource { remaining: 1 }, &AtomicBool::new(false));
        assert_eq!(summary.end, RunEnd::SourceFailed);
        assert_eq!(summary.frames_read, 1);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_queued_emit_drains_on_close() {
        let sink = Arc::new(MemorySink::new());
        let config = IndexerConfig {
            emit: EmitConfig {
                mode: EmitMode::Queued,
                capacity: 2,
                ..EmitConfig::default()
            },
            ..IndexerConfig::default()
        };
        let summary = indexer(config, sink.clone())
            .run(&mut source(&[0, 40, 80, 120]), &AtomicBool::new(false));

        let emit = summary.emit.unwrap();
        assert_eq!(emit.enqueued, 8);
        assert_eq!(emit.stored, 8);
        assert_eq!(sink.len(), 8);
    }

    #[test]
    fn test_components_truncate_fingerprints() {
        let sink = Arc::new(MemorySink::new());
        let mut config = IndexerConfig::default();
        config.extraction.components = Some(2);

        let mut indexer = indexer(config, sink.clone());
        let outcome = indexer.process(0, &flat_frame(1));
        assert_eq!(outcome.emitted, 2);
        assert_eq!(indexer.close(), None);
        assert_eq!(sink.get(&sink.ids()[0]).unwrap().len(), 2);
    }
}
