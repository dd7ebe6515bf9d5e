//! 回放分类器: 按帧循环回放录制好的模型原始输出
//!
//! 录制文件为 JSON, 每帧一个数组:
//! ```json
//! [
//!   [{"label": "90", "confidence": 0.93, "bbox": [120, 80, 210, 170]}],
//!   [],
//!   [{"label": "???", "confidence": 0.4, "bbox": null}]
//! ]
//! ```
use std::path::Path;

use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, info};

use super::{load_labels, Classifier, ClassifierError};
use crate::detection::Recognition;
use crate::utils::Rect;

#[derive(Debug, Deserialize)]
struct RecordedRecognition {
    label: String,
    confidence: f32,
    #[serde(default)]
    bbox: Option<[f32; 4]>,
}

pub struct ReplayClassifier {
    input_size: u32,
    frames: Vec<Vec<Recognition>>,
    cursor: usize,
    num_threads: usize,
    use_acceleration: bool,
}

impl ReplayClassifier {
    /// 从标签文件和录制文件创建
    ///
    /// 文件缺失或标签不在标签表中均视为构造失败
    pub fn from_files(
        labels_path: &Path,
        recording_path: &Path,
        input_size: u32,
    ) -> Result<Self, ClassifierError> {
        let labels = load_labels(labels_path)?;
        let json = std::fs::read_to_string(recording_path).map_err(|source| {
            ClassifierError::AssetMissing {
                path: recording_path.to_path_buf(),
                source,
            }
        })?;
        let classifier = Self::from_json(&json, &labels, input_size)?;
        info!(
            "回放分类器加载完成: {} 帧, {} 个标签",
            classifier.frames.len(),
            labels.len()
        );
        Ok(classifier)
    }

    pub fn from_json(json: &str, labels: &[String], input_size: u32) -> Result<Self, ClassifierError> {
        let recorded: Vec<Vec<RecordedRecognition>> = serde_json::from_str(json)?;
        let mut frames = Vec::with_capacity(recorded.len());
        for frame in recorded {
            let mut items = Vec::with_capacity(frame.len());
            for r in frame {
                if !labels.iter().any(|l| l == &r.label) {
                    return Err(ClassifierError::Malformed(format!("未知标签: {}", r.label)));
                }
                let location = r.bbox.map(|[l, t, rr, b]| Rect::new(l, t, rr, b));
                items.push(Recognition::new(r.label, r.confidence, location));
            }
            frames.push(items);
        }
        Ok(Self::new(frames, input_size))
    }

    pub fn new(frames: Vec<Vec<Recognition>>, input_size: u32) -> Self {
        Self {
            input_size,
            frames,
            cursor: 0,
            num_threads: 1,
            use_acceleration: false,
        }
    }

    pub fn num_threads(&self) -> usize {
        self.num_threads
    }

    pub fn use_acceleration(&self) -> bool {
        self.use_acceleration
    }
}

impl Classifier for ReplayClassifier {
    fn detect(&mut self, crop: &RgbImage) -> Result<Vec<Recognition>, ClassifierError> {
        let (width, height) = crop.dimensions();
        if width != self.input_size || height != self.input_size {
            return Err(ClassifierError::InputSize {
                expected: self.input_size,
                width,
                height,
            });
        }
        if self.frames.is_empty() {
            return Ok(Vec::new());
        }
        let out = self.frames[self.cursor % self.frames.len()].clone();
        self.cursor = self.cursor.wrapping_add(1);
        Ok(out)
    }

    fn set_num_threads(&mut self, num_threads: usize) {
        debug!("分类器线程数: {}", num_threads);
        self.num_threads = num_threads.max(1);
    }

    fn set_use_acceleration(&mut self, enabled: bool) {
        debug!("分类器硬件加速: {}", enabled);
        self.use_acceleration = enabled;
    }
}
