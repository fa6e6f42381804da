use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use log::info;
use serde::Serialize;

use super::record_id::RecordId;
use crate::core::error::{IndexError, IndexResult};
use crate::core::feature::Fingerprint;

/// 特征存储协作方
///
/// Repeating a call with the same id must be harmless. Failures are reported
/// and never retried by the caller.
pub trait FeatureSink: Send + Sync {
    fn store(&self, id: &RecordId, fingerprint: &Fingerprint) -> IndexResult<()>;
}

fn poisoned(what: &str) -> IndexError {
    IndexError::Storage(format!("{} lock poisoned", what))
}

/// 内存存储，按 ID 覆盖写入
#[derive(Default)]
pub struct MemorySink {
    records: Mutex<HashMap<RecordId, Fingerprint>>,
    order: Mutex<Vec<RecordId>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &RecordId) -> Option<Fingerprint> {
        self.records.lock().ok()?.get(id).cloned()
    }

    /// 按首次写入顺序返回所有 ID
    pub fn ids(&self) -> Vec<RecordId> {
        self.order.lock().map(|o| o.clone()).unwrap_or_default()
    }
}

impl FeatureSink for MemorySink {
    fn store(&self, id: &RecordId, fingerprint: &Fingerprint) -> IndexResult<()> {
        let mut records = self.records.lock().map_err(|_| poisoned("records"))?;
        if records.insert(id.clone(), fingerprint.clone()).is_none() {
            self.order
                .lock()
                .map_err(|_| poisoned("order"))?
                .push(id.clone());
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct StoredRecord<'a> {
    id: &'a RecordId,
    fingerprint: &'a Fingerprint,
}

/// 追加写入 JSON Lines 文件，每条记录一行
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    pub fn open(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        info!("📝 JsonLinesSink: appending to {}", path.display());
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }
}

impl FeatureSink for JsonLinesSink {
    fn store(&self, id: &RecordId, fingerprint: &Fingerprint) -> IndexResult<()> {
        let line = serde_json::to_string(&StoredRecord { id, fingerprint })?;
        let mut writer = self.writer.lock().map_err(|_| poisoned("writer"))?;
        writeln!(writer, "{}", line).map_err(|e| IndexError::Storage(e.to_string()))?;
        writer
            .flush()
            .map_err(|e| IndexError::Storage(e.to_string()))
    }
}
