//! PCA 降维：减均值后投影到预训练特征向量上

use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use super::assembler::{FlatFeatureVector, FEATURE_LEN};
use crate::core::error::{IndexError, IndexResult};

/// 降维后的特征指纹
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(Vec<f32>);

impl Fingerprint {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// 预训练 PCA 模型（启动时加载一次，之后只读）
#[derive(Debug, Clone, Deserialize)]
pub struct ReductionModel {
    mean: Vec<f32>,
    eigenvalues: Vec<f32>,
    /// 每行一个主成分，长度 1152
    eigenvectors: Vec<Vec<f32>>,
}

impl ReductionModel {
    pub fn new(
        mean: Vec<f32>,
        eigenvalues: Vec<f32>,
        eigenvectors: Vec<Vec<f32>>,
    ) -> IndexResult<Self> {
        let model = Self {
            mean,
            eigenvalues,
            eigenvectors,
        };
        model.validate()?;
        Ok(model)
    }

    /// 从 JSON 文件加载：`{"mean": [...], "eigenvalues": [...], "eigenvectors": [[...], ...]}`
    pub fn load(path: impl AsRef<Path>) -> IndexResult<Self> {
        let path = path.as_ref();
        info!("🔧 Loading reduction model from: {}", path.display());

        let raw = fs::read_to_string(path)?;
        let model: ReductionModel = serde_json::from_str(&raw)?;
        model.validate()?;

        info!("✅ Reduction model loaded, rank {}", model.rank());
        Ok(model)
    }

    fn validate(&self) -> IndexResult<()> {
        if self.mean.len() != FEATURE_LEN {
            return Err(IndexError::ModelShape(format!(
                "mean has {} values, expected {}",
                self.mean.len(),
                FEATURE_LEN
            )));
        }
        if self.eigenvectors.is_empty() {
            return Err(IndexError::ModelShape("no eigenvectors".to_string()));
        }
        if self.eigenvalues.len() != self.eigenvectors.len() {
            return Err(IndexError::ModelShape(format!(
                "{} eigenvalues for {} eigenvectors",
                self.eigenvalues.len(),
                self.eigenvectors.len()
            )));
        }
        if let Some((row, v)) = self
            .eigenvectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != FEATURE_LEN)
        {
            return Err(IndexError::ModelShape(format!(
                "eigenvector {} has {} values, expected {}",
                row,
                v.len(),
                FEATURE_LEN
            )));
        }

        let all_finite = self
            .mean
            .iter()
            .chain(self.eigenvalues.iter())
            .chain(self.eigenvectors.iter().flatten())
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(IndexError::ModelShape("non-finite value".to_string()));
        }
        Ok(())
    }

    /// 保留前 `components` 个主成分
    pub fn truncated(mut self, components: usize) -> IndexResult<Self> {
        if components == 0 || components > self.rank() {
            return Err(IndexError::ModelShape(format!(
                "cannot keep {} of {} components",
                components,
                self.rank()
            )));
        }
        self.eigenvalues.truncate(components);
        self.eigenvectors.truncate(components);
        Ok(self)
    }

    pub fn rank(&self) -> usize {
        self.eigenvectors.len()
    }

    pub fn eigenvalues(&self) -> &[f32] {
        &self.eigenvalues
    }

    pub fn reduce(&self, feature: &FlatFeatureVector) -> Fingerprint {
        let centered: Vec<f32> = feature
            .as_slice()
            .iter()
            .zip(self.mean.iter())
            .map(|(x, m)| x - m)
            .collect();

        Fingerprint(
            self.eigenvectors
                .iter()
                .map(|row| row.iter().zip(centered.iter()).map(|(e, c)| e * c).sum())
                .collect(),
        )
    }
}
