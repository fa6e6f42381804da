use std::sync::Arc;

use log::{debug, error, info, warn};
use rayon::prelude::*;
use rayon::ThreadPool;

use super::config::ExtractionConfig;
use super::emitter::{EmitCounts, Emitter};
use super::record_id::{make_id, CameraId};
use crate::core::error::{IndexError, IndexResult};
use crate::core::feature::{assemble, Fingerprint, ReductionModel};
use crate::core::video::{
    suppress_nested, Frame, KeyFrameFilter, Region, RegionDetector, SegmentId,
};

/// 处理统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_seen: u64,
    pub invalid_frames: u64,
    pub key_frames: u64,
    pub detection_failures: u64,
    pub regions_detected: u64,
    pub regions_skipped: u64,
    pub records_emitted: u64,
    pub emit_failures: u64,
}

/// 单帧处理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    pub key_frame: bool,
    pub emitted: usize,
    pub skipped: usize,
}

/// 关键帧参考状态：首帧之前为空
#[derive(Debug, Default)]
struct ReferenceState {
    frame: Option<Frame>,
}

impl ReferenceState {
    fn is_initialized(&self) -> bool {
        self.frame.is_some()
    }

    fn replace(&mut self, frame: &Frame) {
        self.frame = Some(frame.clone());
    }
}

/// 单路摄像头的逐帧处理器
///
/// 帧差预筛 → 行人检测 → 逐区域提取特征并降维 → 生成 ID → 发射到存储。
/// One instance per camera; frames must arrive in stream order.
pub struct Coordinator {
    model: Arc<ReductionModel>,
    filter: Box<dyn KeyFrameFilter>,
    detector: Box<dyn RegionDetector>,
    emitter: Emitter,
    options: ExtractionConfig,
    reference: ReferenceState,
    stats: PipelineStats,
    pool: Option<ThreadPool>,
}

impl Coordinator {
    pub fn new(
        model: Arc<ReductionModel>,
        filter: Box<dyn KeyFrameFilter>,
        detector: Box<dyn RegionDetector>,
        emitter: Emitter,
        options: ExtractionConfig,
    ) -> IndexResult<Self> {
        let pool = if options.parallel_regions {
            let num_threads = num_cpus::get().min(4);
            debug!("Using {} threads for region extraction", num_threads);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(num_threads)
                .thread_name(|i| format!("person-index-region-{}", i))
                .build()
                .map_err(|e| IndexError::InvalidConfig(format!("region thread pool: {}", e)))?;
            Some(pool)
        } else {
            None
        };

        info!("🎬 Coordinator: created, model rank {}", model.rank());
        Ok(Self {
            model,
            filter,
            detector,
            emitter,
            options,
            reference: ReferenceState::default(),
            stats: PipelineStats::default(),
            pool,
        })
    }

    pub fn handle(
        &mut self,
        camera: &CameraId,
        segment: &SegmentId,
        frame_position: u64,
        frame: &Frame,
    ) -> FrameOutcome {
        self.stats.frames_seen += 1;

        if let Err(e) = frame.validate() {
            error!("❌ Dropping frame {}: {}", frame_position, e);
            self.stats.invalid_frames += 1;
            return FrameOutcome::default();
        }

        // 首帧没有参考帧，无条件作为关键帧
        let is_key_frame = match &self.reference.frame {
            None => true,
            Some(reference) => self.filter.is_key_frame(reference, frame),
        };
        if !is_key_frame {
            return FrameOutcome::default();
        }

        self.reference.replace(frame);
        self.stats.key_frames += 1;
        debug!("🔑 Key frame {} in segment {}", frame_position, segment);

        let regions = match self.detector.detect(frame) {
            Ok(regions) => self.post_process(regions),
            Err(e) => {
                error!("❌ Detection failed on frame {}: {}", frame_position, e);
                self.stats.detection_failures += 1;
                return FrameOutcome {
                    key_frame: true,
                    ..FrameOutcome::default()
                };
            }
        };
        self.stats.regions_detected += regions.len() as u64;

        let fingerprints = self.fingerprint_all(frame, &regions);

        let mut outcome = FrameOutcome {
            key_frame: true,
            ..FrameOutcome::default()
        };
        for (sequence, result) in fingerprints.into_iter().enumerate() {
            let fingerprint = match result {
                Ok(fp) => fp,
                Err(e) => {
                    warn!(
                        "⚠️ Skipping region {} of frame {}: {}",
                        sequence, frame_position, e
                    );
                    outcome.skipped += 1;
                    continue;
                }
            };

            let id = match make_id(camera, segment, frame_position, sequence) {
                Ok(id) => id,
                Err(e) => {
                    warn!("⚠️ No record id for region {}: {}", sequence, e);
                    outcome.skipped += 1;
                    continue;
                }
            };
            match self.emitter.emit(id.clone(), fingerprint) {
                Ok(()) => outcome.emitted += 1,
                Err(e) => {
                    error!("❌ Failed to emit {}: {}", id, e);
                    self.stats.emit_failures += 1;
                }
            }
        }

        self.stats.regions_skipped += outcome.skipped as u64;
        self.stats.records_emitted += outcome.emitted as u64;
        outcome
    }

    fn post_process(&self, regions: Vec<Region>) -> Vec<Region> {
        let mut regions = if self.options.suppress_nested {
            suppress_nested(regions)
        } else {
            regions
        };
        if regions.len() > self.options.max_regions_per_frame {
            warn!(
                "⚠️ {} regions detected, keeping the first {}",
                regions.len(),
                self.options.max_regions_per_frame
            );
            regions.truncate(self.options.max_regions_per_frame);
        }
        regions
    }

    /// 结果顺序与 `regions` 一致
    fn fingerprint_all(
        &self,
        frame: &Frame,
        regions: &[Region],
    ) -> Vec<IndexResult<Fingerprint>> {
        let model = self.model.as_ref();
        match &self.pool {
            Some(pool) if regions.len() > 1 => pool.install(|| {
                regions
                    .par_iter()
                    .map(|region| fingerprint_region(model, frame, region))
                    .collect()
            }),
            _ => regions
                .iter()
                .map(|region| fingerprint_region(model, frame, region))
                .collect(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn is_initialized(&self) -> bool {
        self.reference.is_initialized()
    }

    pub fn reference_frame(&self) -> Option<&Frame> {
        self.reference.frame.as_ref()
    }

    pub fn emit_counts(&self) -> Option<EmitCounts> {
        self.emitter.counts()
    }

    /// 释放参考帧并关闭发射通道（等待队列写完）
    pub fn close(self) -> Option<EmitCounts> {
        info!("🗑️ Coordinator: released, {:?}", self.stats);
        self.emitter.close()
    }

    /// 强制关闭，丢弃尚未写出的记录
    pub fn abort(self) -> Option<EmitCounts> {
        warn!("🛑 Coordinator: aborted, {:?}", self.stats);
        self.emitter.abort()
    }
}

fn fingerprint_region(
    model: &ReductionModel,
    frame: &Frame,
    region: &Region,
) -> IndexResult<Fingerprint> {
    let clipped = region.clip_to(frame.width, frame.height).ok_or_else(|| {
        IndexError::RegionOutOfBounds(format!("{:?} lies outside the frame", region))
    })?;
    let crop = frame.crop(&clipped)?;
    let feature = assemble(&crop)?;
    Ok(model.reduce(&feature))
}
