//! 检测结果映射 (Detection Mapper)
//!
//! 置信度过滤 → 逆变换回帧坐标 → 更新历史 / 规划远端写入
//!
//! 只在检测线程上使用, 上一次接受的标签是单一所有者的普通字段

use super::history::HistoryRing;
use super::types::{Detection, Recognition, SignEvent};
use crate::utils::AffineMatrix;

/// 一次远端存储写入 (key = 当前地址, value = 限速标签)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreWrite {
    pub key: String,
    pub value: String,
}

/// 单帧映射结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MappedFrame {
    /// 通过过滤的帧坐标检测, 保持输入顺序
    pub detections: Vec<Detection>,
    /// 需要发出的远端写入 (fire-and-forget)
    pub store_writes: Vec<StoreWrite>,
    /// 标签发生变化的检测 (展示层提示用)
    pub announcements: Vec<SignEvent>,
    pub history_changed: bool,
}

#[derive(Debug, Default)]
pub struct DetectionMapper {
    previous_label: String,
    history: HistoryRing,
}

impl DetectionMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// 上一次接受的标签 (初始为空)
    pub fn previous_label(&self) -> &str {
        &self.previous_label
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    /// 过滤并映射一帧的原始检测
    ///
    /// - 无位置/退化框, 或置信度低于 `threshold` 的检测被丢弃
    /// - 标签与上一次接受的标签不同 (且非空) 时压入历史
    /// - 上一次标签为空或不同时, 规划一次 `(address_key, label)` 写入
    pub fn map_and_filter(
        &mut self,
        raw: Vec<Recognition>,
        inverse: &AffineMatrix,
        threshold: f32,
        address_key: &str,
    ) -> MappedFrame {
        let mut out = MappedFrame::default();

        for recognition in raw {
            let Some(crop_rect) = recognition.location else {
                continue;
            };
            if crop_rect.is_degenerate() {
                continue;
            }
            // NaN 置信度同样丢弃
            if !(recognition.confidence >= threshold) {
                continue;
            }

            let detection = Detection {
                location: inverse.map_rect(&crop_rect),
                label: recognition.label,
                confidence: recognition.confidence,
            };

            let changed = self.previous_label != detection.label;

            if changed && !detection.label.is_empty() {
                if self.history.push(&detection.label) {
                    out.history_changed = true;
                }
                out.announcements.push(SignEvent::from(&detection));
            }

            if self.previous_label.is_empty() || changed {
                out.store_writes.push(StoreWrite {
                    key: address_key.to_string(),
                    value: detection.label.clone(),
                });
            }

            self.previous_label.clone_from(&detection.label);
            out.detections.push(detection);
        }

        out
    }
}
