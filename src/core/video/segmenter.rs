//! 视频分段：按流时间每 10 分钟切出一个新片段

use std::fmt;

use chrono::{Duration as ChronoDuration, Local, NaiveDateTime};
use log::info;

use crate::core::error::{IndexError, IndexResult};

pub const DEFAULT_SEGMENT_WINDOW_MS: u64 = 600_000;

const SEGMENT_ID_FORMAT: &str = "%Y%m%d%H%M%S";

/// 片段 ID 固定为 14 位数字
pub const SEGMENT_ID_LEN: usize = 14;

/// 片段标识，片段内所有帧和特征记录的命名空间
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentId(String);

impl SegmentId {
    /// Record ids embed the segment without a separator, so the token must be
    /// exactly 14 ASCII digits.
    pub fn new(id: impl Into<String>) -> IndexResult<Self> {
        let id = id.into();
        if id.len() != SEGMENT_ID_LEN || !id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IndexError::InvalidSegment(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 片段时间窗口（毫秒，流时间）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentWindow {
    pub start_ms: u64,
    pub end_ms: u64,
    pub frame_count: u64,
}

/// 每帧推进一次的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentTick {
    pub segment: SegmentId,
    pub window: SegmentWindow,
    pub is_new_segment: bool,
}

/// 片段 ID 生成器
pub trait SegmentIdSource {
    fn next_id(&mut self) -> SegmentId;
}

impl<F> SegmentIdSource for F
where
    F: FnMut() -> SegmentId,
{
    fn next_id(&mut self) -> SegmentId {
        self()
    }
}

/// `%Y%m%d%H%M%S` 时间戳 ID，例如 20151007221022
///
/// Never issues the same token twice: a clock reading at or before the last
/// issued second is bumped to one second after it.
pub struct TimestampSegmentIds {
    clock: Box<dyn FnMut() -> NaiveDateTime + Send>,
    last: Option<NaiveDateTime>,
}

impl TimestampSegmentIds {
    pub fn new() -> Self {
        Self::with_clock(|| Local::now().naive_local())
    }

    pub fn with_clock<C>(clock: C) -> Self
    where
        C: FnMut() -> NaiveDateTime + Send + 'static,
    {
        Self {
            clock: Box::new(clock),
            last: None,
        }
    }
}

impl Default for TimestampSegmentIds {
    fn default() -> Self {
        Self::new()
    }
}

impl SegmentIdSource for TimestampSegmentIds {
    fn next_id(&mut self) -> SegmentId {
        let mut now = (self.clock)();
        if let Some(last) = self.last {
            if now <= last {
                now = last + ChronoDuration::seconds(1);
            }
        }
        self.last = Some(now);
        SegmentId(now.format(SEGMENT_ID_FORMAT).to_string())
    }
}

pub struct Segmenter<S: SegmentIdSource> {
    ids: S,
    window_ms: u64,
    current: Option<SegmentTick>,
    last_cut_ms: u64,
}

impl<S: SegmentIdSource> Segmenter<S> {
    pub fn new(ids: S) -> Self {
        Self::with_window(ids, DEFAULT_SEGMENT_WINDOW_MS)
    }

    pub fn with_window(ids: S, window_ms: u64) -> Self {
        Self {
            ids,
            window_ms,
            current: None,
            last_cut_ms: 0,
        }
    }

    /// 每帧调用一次，`now_ms` 为单调递增的流时间
    pub fn advance(&mut self, now_ms: u64) -> SegmentTick {
        let rollover = match &self.current {
            None => true,
            Some(_) => now_ms.saturating_sub(self.last_cut_ms) >= self.window_ms,
        };

        let tick = match self.current.take() {
            Some(mut tick) if !rollover => {
                tick.window.end_ms = now_ms;
                tick.window.frame_count += 1;
                tick.is_new_segment = false;
                tick
            }
            _ => {
                let segment = self.ids.next_id();
                info!("🎞️ New segment {} at {}ms", segment, now_ms);
                self.last_cut_ms = now_ms;
                SegmentTick {
                    segment,
                    window: SegmentWindow {
                        start_ms: now_ms,
                        end_ms: now_ms,
                        frame_count: 0,
                    },
                    is_new_segment: true,
                }
            }
        };

        self.current = Some(tick.clone());
        tick
    }

    pub fn current(&self) -> Option<&SegmentTick> {
        self.current.as_ref()
    }
}
