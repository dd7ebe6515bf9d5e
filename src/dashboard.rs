//! 展示层接口
//!
//! 核心只输出 (label, confidence, box) 事件、历史快照、速度与地址文本,
//! 具体如何显示由实现方决定

use tracing::info;

use crate::detection::{FrameStats, SignEvent};

pub trait Dashboard: Send + Sync {
    /// 识别到与上一次不同的限速牌
    fn show_sign(&self, _event: &SignEvent) {}

    /// 历史变化后的快照 (最新在前)
    fn show_history(&self, _labels: &[String]) {}

    fn show_speed(&self, _text: &str) {}

    fn show_address(&self, _text: &str) {}

    fn show_frame_stats(&self, _stats: &FrameStats) {}
}

/// 用日志代替界面
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDashboard;

impl Dashboard for LogDashboard {
    fn show_sign(&self, event: &SignEvent) {
        info!(
            "🚦 限速 {} (置信度 {:.2}) @ ({:.0}, {:.0}, {:.0}x{:.0})",
            event.label,
            event.confidence,
            event.location.left,
            event.location.top,
            event.location.width(),
            event.location.height()
        );
    }

    fn show_history(&self, labels: &[String]) {
        info!("最近限速: [{}]", labels.join(", "));
    }

    fn show_speed(&self, text: &str) {
        info!("速度: {}", text);
    }

    fn show_address(&self, text: &str) {
        info!("地址: {}", text);
    }

    fn show_frame_stats(&self, stats: &FrameStats) {
        tracing::debug!(
            "帧 {}: {}x{} → {}x{}, 推理 {:.1}ms, {} 个结果",
            stats.token,
            stats.frame_size.0,
            stats.frame_size.1,
            stats.crop_size,
            stats.crop_size,
            stats.inference_ms,
            stats.detections
        );
    }
}
