use thiserror::Error;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("配置解析失败: {0}")]
    Config(#[from] json5::Error),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
    #[error("降维模型无效: {0}")]
    ModelShape(String),
    #[error("Invalid camera id: {0:?}")]
    InvalidCamera(String),
    #[error("Invalid segment id: {0:?}")]
    InvalidSegment(String),
    #[error("Invalid record id: {0:?}")]
    InvalidRecordId(String),
    #[error("记录 ID 字段溢出: {0}")]
    IdOverflow(String),
    #[error("Invalid frame data: {0}")]
    InvalidFrame(String),
    #[error("Region out of frame bounds: {0}")]
    RegionOutOfBounds(String),
    #[error("Region detection failed: {0}")]
    Detection(String),
    #[error("Storage emit failed: {0}")]
    Storage(String),
    #[error("Emit queue full")]
    QueueFull,
    #[error("Emit queue closed")]
    QueueClosed,
}

/// 错误分类：决定失败时是终止启动、跳过单个区域，还是记录后继续
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    StartupFatal,
    RegionTransient,
    CollaboratorTransient,
}

impl IndexError {
    pub fn class(&self) -> ErrorClass {
        match self {
            IndexError::Io(_)
            | IndexError::Json(_)
            | IndexError::Config(_)
            | IndexError::InvalidConfig(_)
            | IndexError::ModelShape(_)
            | IndexError::InvalidCamera(_)
            | IndexError::InvalidSegment(_)
            | IndexError::InvalidRecordId(_) => ErrorClass::StartupFatal,
            IndexError::InvalidFrame(_)
            | IndexError::IdOverflow(_)
            | IndexError::RegionOutOfBounds(_)
            | IndexError::Detection(_) => ErrorClass::RegionTransient,
            IndexError::Storage(_) | IndexError::QueueFull | IndexError::QueueClosed => {
                ErrorClass::CollaboratorTransient
            }
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.class() == ErrorClass::StartupFatal
    }
}

pub type IndexResult<T> = Result<T, IndexError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert!(IndexError::ModelShape("mean".into()).is_fatal());
        assert_eq!(
            IndexError::RegionOutOfBounds("r".into()).class(),
            ErrorClass::RegionTransient
        );
        assert_eq!(IndexError::QueueFull.class(), ErrorClass::CollaboratorTransient);
        assert!(!IndexError::Storage("down".into()).is_fatal());
        assert!(IndexError::InvalidSegment("seg1".into()).is_fatal());
        assert_eq!(
            IndexError::IdOverflow("frame".into()).class(),
            ErrorClass::RegionTransient
        );
    }
}
