//! 特征记录 ID：摄像头 + 片段 + 帧序号 + 帧内序号
//!
//! 例如 `c0a87193` `20151010142000` `00501` `00`：
//! 摄像头 IP 的十六进制、片段时间戳、5 位帧序号、2 位区域序号（从 0 开始）。
//! Every field has a fixed width, so distinct tuples never concatenate to the
//! same id.

use std::fmt;
use std::net::Ipv4Addr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::core::error::{IndexError, IndexResult};
use crate::core::video::SegmentId;

pub const CAMERA_ID_LEN: usize = 8;
/// 5 位帧序号的上限
pub const MAX_FRAME_POSITION: u64 = 99_999;
/// 2 位区域序号的上限
pub const MAX_SEQUENCE: usize = 99;

static CANONICAL_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^(?P<camera>[0-9A-Za-z]{8})(?P<segment>\d{14})",
        r"(?P<frame>\d{5})(?P<seq>\d{2})$"
    ))
    .expect("record id pattern is valid")
});

/// 摄像头标识
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CameraId(String);

impl CameraId {
    /// IPv4 地址转成 8 位小写十六进制，其他 ID 必须正好是 8 个 ASCII 字母或数字
    pub fn parse(raw: &str) -> IndexResult<Self> {
        let raw = raw.trim();
        if let Ok(ip) = raw.parse::<Ipv4Addr>() {
            return Ok(Self::from_ipv4(ip));
        }
        if raw.len() != CAMERA_ID_LEN || !raw.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(IndexError::InvalidCamera(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn from_ipv4(ip: Ipv4Addr) -> Self {
        Self(ip.octets().iter().map(|o| format!("{:02x}", o)).collect())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 一条特征记录的存储键
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

/// `RecordId::parse` 拆出的各字段
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordParts {
    pub camera: String,
    pub segment: String,
    pub frame_position: u64,
    pub sequence: usize,
}

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 去掉区域序号后的帧键，同一帧的所有记录共享
    pub fn frame_key(&self) -> &str {
        &self.0[..self.0.len().saturating_sub(2)]
    }

    pub fn parse(raw: &str) -> IndexResult<RecordParts> {
        let caps = CANONICAL_ID
            .captures(raw)
            .ok_or_else(|| IndexError::InvalidRecordId(raw.to_string()))?;
        let number = |name: &str| {
            caps[name]
                .parse::<u64>()
                .map_err(|_| IndexError::InvalidRecordId(raw.to_string()))
        };

        Ok(RecordParts {
            camera: caps["camera"].to_string(),
            segment: caps["segment"].to_string(),
            frame_position: number("frame")?,
            sequence: number("seq")? as usize,
        })
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 生成记录 ID，纯函数
///
/// `sequence` is the zero-based rank of the region in the detector output.
/// Values that do not fit their fixed-width field are rejected instead of
/// widening the id.
pub fn make_id(
    camera: &CameraId,
    segment: &SegmentId,
    frame_position: u64,
    sequence: usize,
) -> IndexResult<RecordId> {
    if frame_position > MAX_FRAME_POSITION {
        return Err(IndexError::IdOverflow(format!(
            "frame position {} exceeds {}",
            frame_position, MAX_FRAME_POSITION
        )));
    }
    if sequence > MAX_SEQUENCE {
        return Err(IndexError::IdOverflow(format!(
            "sequence {} exceeds {}",
            sequence, MAX_SEQUENCE
        )));
    }
    Ok(RecordId(format!(
        "{}{}{:05}{:02}",
        camera, segment, frame_position, sequence
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn camera() -> CameraId {
        CameraId::parse("192.168.113.147").unwrap()
    }

    fn segment() -> SegmentId {
        SegmentId::new("20151010142000").unwrap()
    }

    #[test]
    fn test_camera_from_ipv4() {
        assert_eq!(camera().as_str(), "c0a87193");
        assert_eq!(CameraId::parse("192.168.3.1").unwrap().as_str(), "c0a80301");
    }

    #[test]
    fn test_camera_opaque_ids() {
        assert_eq!(CameraId::parse(" lobby002 ").unwrap().as_str(), "lobby002");
        assert!(CameraId::parse("").is_err());
        assert!(CameraId::parse("lobby").is_err());
        assert!(CameraId::parse("lobby0002").is_err());
        assert!(CameraId::parse("cam-0001").is_err());
    }

    #[test]
    fn test_make_id_layout() {
        let id = make_id(&camera(), &segment(), 501, 0).unwrap();
        assert_eq!(id.as_str(), "c0a87193201510101420000050100");
        assert_eq!(id.frame_key(), "c0a871932015101014200000501");
    }

    #[test]
    fn test_ids_differ_only_in_sequence() {
        let ids: Vec<RecordId> = (0..3)
            .map(|seq| make_id(&camera(), &segment(), 42, seq).unwrap())
            .collect();

        assert_eq!(ids[0], make_id(&camera(), &segment(), 42, 0).unwrap());
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[1], ids[2]);
        assert_ne!(ids[0], ids[2]);
        for (seq, id) in ids.iter().enumerate() {
            assert_eq!(id.frame_key(), ids[0].frame_key());
            assert_eq!(RecordId::parse(id.as_str()).unwrap().sequence, seq);
        }
    }

    #[test]
    fn test_field_overflow_is_rejected() {
        assert!(make_id(&camera(), &segment(), MAX_FRAME_POSITION, MAX_SEQUENCE).is_ok());
        assert!(matches!(
            make_id(&camera(), &segment(), MAX_FRAME_POSITION + 1, 0),
            Err(IndexError::IdOverflow(_))
        ));
        assert!(matches!(
            make_id(&camera(), &segment(), 0, MAX_SEQUENCE + 1),
            Err(IndexError::IdOverflow(_))
        ));
    }

    #[test]
    fn test_field_boundaries_cannot_collide() {
        // 字段宽度可变时，这几组会拼出相同的字符串
        assert!(SegmentId::new("seg1").is_err());
        assert!(make_id(&CameraId::parse("10.0.0.1").unwrap(), &segment(), 100_000, 0).is_err());
        assert!(CameraId::parse("lobby").is_err());

        let cameras = [
            CameraId::parse("10.0.0.1").unwrap(),
            CameraId::parse("10.0.0.11").unwrap(),
            CameraId::parse("lobby001").unwrap(),
            CameraId::parse("lobby011").unwrap(),
        ];
        let segments = [
            SegmentId::new("20151007221022").unwrap(),
            SegmentId::new("12015100722102").unwrap(),
        ];
        let mut seen = HashSet::new();
        for cam in &cameras {
            for seg in &segments {
                for frame in [0, 1, 10, 100, 20_005, MAX_FRAME_POSITION] {
                    for seq in [0, 1, 10, MAX_SEQUENCE] {
                        let id = make_id(cam, seg, frame, seq).unwrap();
                        assert_eq!(id.as_str().len(), 29);
                        let parts = RecordId::parse(id.as_str()).unwrap();
                        assert_eq!(parts.camera, cam.as_str());
                        assert_eq!(parts.segment, seg.as_str());
                        assert_eq!(parts.frame_position, frame);
                        assert_eq!(parts.sequence, seq);
                        assert!(seen.insert(id), "duplicate id");
                    }
                }
            }
        }
    }

    #[test]
    fn test_parse_roundtrip_fields() {
        let parts = RecordId::parse("c0a87194201510101420100827000").unwrap();
        assert_eq!(
            parts,
            RecordParts {
                camera: "c0a87194".to_string(),
                segment: "20151010142010".to_string(),
                frame_position: 8270,
                sequence: 0,
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(RecordId::parse("not-an-id").is_err());
        assert!(RecordId::parse("c0a8719320151010142000005010").is_err());
        assert!(RecordId::parse("c0a871932015101014200012345600").is_err());
    }
}
