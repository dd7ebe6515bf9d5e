/// 分类器接口 (Classifier)
///
/// # 架构说明
///
/// 检测模型本身是外部黑盒: 输入固定尺寸的正方形 RGB 图,
/// 输出 crop space 中带标签和置信度的框。
///
/// ## 核心流程
/// ```text
/// 裁剪图 (INF_SIZE x INF_SIZE) → detect → Vec<Recognition>
/// ```
///
/// 线程数与硬件加速开关为 fire-and-forget 配置, 在下一次 detect 时生效
use std::path::{Path, PathBuf};

use image::RgbImage;
use thiserror::Error;

use crate::detection::Recognition;

pub mod replay;

pub use replay::ReplayClassifier;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("模型资源缺失: {path}: {source}")]
    AssetMissing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("模型资源格式错误: {0}")]
    Malformed(String),
    #[error("JSON 解析错误: {0}")]
    Json(#[from] serde_json::Error),
    #[error("输入尺寸不匹配: 期望 {expected}x{expected}, 实际 {width}x{height}")]
    InputSize { expected: u32, width: u32, height: u32 },
    #[error("推理失败: {0}")]
    Inference(String),
}

/// 统一的分类器接口
pub trait Classifier: Send {
    /// 推理: 裁剪图 → 原始检测
    fn detect(&mut self, crop: &RgbImage) -> Result<Vec<Recognition>, ClassifierError>;

    /// 线程数提示
    fn set_num_threads(&mut self, num_threads: usize);

    /// 硬件加速开关
    fn set_use_acceleration(&mut self, enabled: bool);
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn detect(&mut self, crop: &RgbImage) -> Result<Vec<Recognition>, ClassifierError> {
        (**self).detect(crop)
    }

    fn set_num_threads(&mut self, num_threads: usize) {
        (**self).set_num_threads(num_threads)
    }

    fn set_use_acceleration(&mut self, enabled: bool) {
        (**self).set_use_acceleration(enabled)
    }
}

/// 投递给检测线程的分类器配置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierOption {
    NumThreads(usize),
    UseAcceleration(bool),
}

impl ClassifierOption {
    pub fn apply<C: Classifier + ?Sized>(self, classifier: &mut C) {
        match self {
            ClassifierOption::NumThreads(n) => classifier.set_num_threads(n),
            ClassifierOption::UseAcceleration(on) => classifier.set_use_acceleration(on),
        }
    }
}

/// 读取标签文件: 每行一个标签, 空行忽略
pub fn load_labels(path: &Path) -> Result<Vec<String>, ClassifierError> {
    let text = std::fs::read_to_string(path).map_err(|source| ClassifierError::AssetMissing {
        path: path.to_path_buf(),
        source,
    })?;
    let labels: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if labels.is_empty() {
        return Err(ClassifierError::Malformed(format!(
            "标签文件为空: {}",
            path.display()
        )));
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_labels_skips_blank_lines() {
        let path = std::env::temp_dir().join(format!("speedsign-labels-{}.txt", std::process::id()));
        std::fs::write(&path, "???\n80\n\n90\n 100 \n120\n").unwrap();
        let labels = load_labels(&path).unwrap();
        assert_eq!(labels, vec!["???", "80", "90", "100", "120"]);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_missing_labels_is_asset_error() {
        let err = load_labels(Path::new("/nonexistent/speedsign.txt")).unwrap_err();
        assert!(matches!(err, ClassifierError::AssetMissing { .. }));
    }
}
