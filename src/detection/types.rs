/// 检测系统数据结构定义
/// Data structures for the speed-sign detection system
use crate::utils::Rect;

// ========== 公共常量 ==========

/// 模型输入尺寸 (正方形)
pub const INF_SIZE: u32 = 512;

/// 最低跟踪置信度
pub const MINIMUM_CONFIDENCE: f32 = 0.8;

/// 默认预览尺寸
pub const PREVIEW_WIDTH: u32 = 640;
pub const PREVIEW_HEIGHT: u32 = 480;

// ========== 数据结构 ==========

/// 分类器原始输出 (crop space)
#[derive(Clone, Debug, PartialEq)]
pub struct Recognition {
    pub label: String,
    pub confidence: f32,
    /// 分类器可能不给出位置
    pub location: Option<Rect>,
}

impl Recognition {
    pub fn new(label: impl Into<String>, confidence: f32, location: Option<Rect>) -> Self {
        Self {
            label: label.into(),
            confidence,
            location,
        }
    }
}

/// 映射回帧坐标后的检测结果 (frame space)
///
/// 坐标只在映射时改写一次, 之后按值交给跟踪器
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
    pub location: Rect,
}

/// 限速牌事件 (提供给展示层的 label, confidence, box 三元组)
#[derive(Clone, Debug, PartialEq)]
pub struct SignEvent {
    pub label: String,
    pub confidence: f32,
    pub location: Rect,
}

impl From<&Detection> for SignEvent {
    fn from(det: &Detection) -> Self {
        Self {
            label: det.label.clone(),
            confidence: det.confidence,
            location: det.location,
        }
    }
}

/// 单帧处理统计 (帧尺寸 / 裁剪尺寸 / 推理耗时)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameStats {
    pub token: u64,
    pub frame_size: (u32, u32),
    pub crop_size: u32,
    pub inference_ms: f64,
    pub detections: usize,
}
