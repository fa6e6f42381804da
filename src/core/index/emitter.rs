//! 特征记录发射：直接调用存储，或经有界队列交给后台线程
//!
//! The queued mode keeps a slow sink from stalling frame ingestion. What
//! happens when the queue is full is the configured `BackpressurePolicy`.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use serde::Deserialize;

use super::record_id::RecordId;
use super::sink::FeatureSink;
use crate::core::error::{IndexError, IndexResult};
use crate::core::feature::Fingerprint;

#[derive(Debug, Clone)]
pub struct EmitRecord {
    pub id: RecordId,
    pub fingerprint: Fingerprint,
}

/// 队列满时的处理策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicy {
    /// 阻塞采集线程直到有空位
    Block,
    /// 丢弃队头最旧的记录
    DropOldest,
    /// 拒绝新记录
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmitMode {
    Direct,
    Queued,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmitConfig {
    pub mode: EmitMode,
    pub capacity: usize,
    pub policy: BackpressurePolicy,
}

impl Default for EmitConfig {
    fn default() -> Self {
        Self {
            mode: EmitMode::Direct,
            capacity: 256,
            policy: BackpressurePolicy::Block,
        }
    }
}

/// 调用存储方，存储方 panic 时按写入失败处理
fn guarded_store(
    sink: &dyn FeatureSink,
    id: &RecordId,
    fingerprint: &Fingerprint,
) -> IndexResult<()> {
    panic::catch_unwind(AssertUnwindSafe(|| sink.store(id, fingerprint)))
        .unwrap_or_else(|_| Err(IndexError::Storage(format!("sink panicked storing {}", id))))
}

/// 发射统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitCounts {
    pub enqueued: u64,
    pub stored: u64,
    pub dropped: u64,
    pub failed: u64,
}

#[derive(Debug, Default)]
struct EmitStats {
    enqueued: AtomicU64,
    stored: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
}

impl EmitStats {
    fn snapshot(&self) -> EmitCounts {
        EmitCounts {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

pub struct EmitQueue {
    tx: Option<Sender<EmitRecord>>,
    // 生产端也持有接收端，DropOldest 用它丢弃队头
    rx: Receiver<EmitRecord>,
    policy: BackpressurePolicy,
    stats: Arc<EmitStats>,
    abort: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl EmitQueue {
    pub fn spawn(
        sink: Arc<dyn FeatureSink>,
        capacity: usize,
        policy: BackpressurePolicy,
    ) -> IndexResult<Self> {
        if capacity == 0 {
            return Err(IndexError::InvalidConfig(
                "emit queue capacity must be at least 1".to_string(),
            ));
        }

        let (tx, rx) = bounded::<EmitRecord>(capacity);
        let stats = Arc::new(EmitStats::default());
        let abort = Arc::new(AtomicBool::new(false));

        let worker_rx = rx.clone();
        let worker_stats = Arc::clone(&stats);
        let worker_abort = Arc::clone(&abort);
        let worker = thread::Builder::new()
            .name("person-index-emit".to_string())
            .spawn(move || {
                for record in worker_rx.iter() {
                    if worker_abort.load(Ordering::Relaxed) {
                        worker_stats.dropped.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                    match guarded_store(sink.as_ref(), &record.id, &record.fingerprint) {
                        Ok(()) => {
                            worker_stats.stored.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(e) => {
                            worker_stats.failed.fetch_add(1, Ordering::Relaxed);
                            error!("❌ Failed to store {}: {}", record.id, e);
                        }
                    }
                }
                debug!("Emit worker drained");
            })?;

        info!(
            "🚚 Emit queue started: capacity {}, policy {:?}",
            capacity, policy
        );
        Ok(Self {
            tx: Some(tx),
            rx,
            policy,
            stats,
            abort,
            worker: Some(worker),
        })
    }

    pub fn push(&self, record: EmitRecord) -> IndexResult<()> {
        let tx = self.tx.as_ref().ok_or(IndexError::QueueClosed)?;

        match self.policy {
            BackpressurePolicy::Block => {
                tx.send(record).map_err(|_| IndexError::QueueClosed)?;
            }
            BackpressurePolicy::Reject => match tx.try_send(record) {
                Ok(()) => {}
                Err(TrySendError::Full(rejected)) => {
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!("⚠️ Emit queue full, rejected {}", rejected.id);
                    return Err(IndexError::QueueFull);
                }
                Err(TrySendError::Disconnected(_)) => return Err(IndexError::QueueClosed),
            },
            BackpressurePolicy::DropOldest => {
                let mut pending = record;
                loop {
                    match tx.try_send(pending) {
                        Ok(()) => break,
                        Err(TrySendError::Full(back)) => {
                            pending = back;
                            if let Ok(oldest) = self.rx.try_recv() {
                                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                                warn!("⚠️ Emit queue full, dropped oldest {}", oldest.id);
                            }
                        }
                        Err(TrySendError::Disconnected(_)) => return Err(IndexError::QueueClosed),
                    }
                }
            }
        }

        self.stats.enqueued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn counts(&self) -> EmitCounts {
        self.stats.snapshot()
    }

    /// 关闭队列，等待已缓冲的记录全部写完
    pub fn close(mut self) -> EmitCounts {
        self.shutdown();
        self.counts()
    }

    /// 关闭队列，丢弃尚未写出的记录
    pub fn abort(mut self) -> EmitCounts {
        self.abort.store(true, Ordering::Relaxed);
        self.shutdown();
        self.counts()
    }

    fn shutdown(&mut self) {
        // 断开发送端后 worker 的 iter() 会在队列清空后结束
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("❌ Emit worker panicked");
            }
            info!("🗑️ Emit queue closed: {:?}", self.stats.snapshot());
        }
    }
}

impl Drop for EmitQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// 记录发射方式
pub enum Emitter {
    Direct(Arc<dyn FeatureSink>),
    Queued(EmitQueue),
}

impl Emitter {
    pub fn from_config(config: &EmitConfig, sink: Arc<dyn FeatureSink>) -> IndexResult<Self> {
        Ok(match config.mode {
            EmitMode::Direct => Emitter::Direct(sink),
            EmitMode::Queued => {
                Emitter::Queued(EmitQueue::spawn(sink, config.capacity, config.policy)?)
            }
        })
    }

    pub fn emit(&self, id: RecordId, fingerprint: Fingerprint) -> IndexResult<()> {
        match self {
            Emitter::Direct(sink) => guarded_store(sink.as_ref(), &id, &fingerprint),
            Emitter::Queued(queue) => queue.push(EmitRecord { id, fingerprint }),
        }
    }

    pub fn counts(&self) -> Option<EmitCounts> {
        match self {
            Emitter::Direct(_) => None,
            Emitter::Queued(queue) => Some(queue.counts()),
        }
    }

    pub fn close(self) -> Option<EmitCounts> {
        match self {
            Emitter::Direct(_) => None,
            Emitter::Queued(queue) => Some(queue.close()),
        }
    }

    pub fn abort(self) -> Option<EmitCounts> {
        match self {
            Emitter::Direct(_) => None,
            Emitter::Queued(queue) => Some(queue.abort()),
        }
    }
}
