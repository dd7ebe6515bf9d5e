//! 跟踪器接口与叠加层绘制
//! Tracker contract and overlay rendering

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use tracing::{debug, trace};

use super::types::Detection;
use crate::utils::{transformation_matrix, AffineMatrix};

/// 外部跟踪器契约
///
/// `track_results` 在检测线程调用, `draw` 在显示线程调用
pub trait Tracker: Send {
    /// 相机配置变化时调用一次
    fn set_frame_configuration(&mut self, width: u32, height: u32, rotation: i32);

    /// 接收帧坐标检测结果, `token` 为帧序号 (causality token)
    fn track_results(&mut self, detections: Vec<Detection>, token: u64);

    /// 绘制当前状态
    fn draw(&self, canvas: &mut RgbImage);
}

/// 叠加层重绘请求 (fire-and-forget)
pub trait Overlay: Send + Sync {
    fn request_redraw(&self);
}

/// 不做任何事的叠加层 (无显示时使用)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOverlay;

impl Overlay for NoopOverlay {
    fn request_redraw(&self) {}
}

/// 每个标签一个颜色
const COLORS: [(u8, u8, u8); 8] = [
    (0, 0, 255),
    (255, 0, 0),
    (255, 255, 0),
    (0, 255, 255),
    (170, 0, 255),
    (0, 255, 0),
    (255, 140, 0),
    (255, 105, 180),
];

const LABEL_FONT_SIZE: f32 = 18.0;
const BOX_THICKNESS: i32 = 2;

fn color_for(label: &str) -> Rgb<u8> {
    let hash = label
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    let (r, g, b) = COLORS[hash % COLORS.len()];
    Rgb([r, g, b])
}

/// 跟踪对象 (最近一次结果中的一个检测)
#[derive(Clone, Debug)]
pub struct TrackedSign {
    pub detection: Detection,
    pub color: Rgb<u8>,
}

/// 只保留最新一组结果的叠加层跟踪器
///
/// 晚到的旧结果 (token 小于已见最大值) 直接丢弃
#[derive(Default)]
pub struct OverlayTracker {
    frame_width: u32,
    frame_height: u32,
    rotation: i32,
    latest_token: Option<u64>,
    tracked: Vec<TrackedSign>,
    font: Option<FontVec>,
}

impl OverlayTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置标签字体 (不设置时只画框)
    pub fn with_font(mut self, font: FontVec) -> Self {
        self.font = Some(font);
        self
    }

    pub fn tracked(&self) -> &[TrackedSign] {
        &self.tracked
    }

    pub fn latest_token(&self) -> Option<u64> {
        self.latest_token
    }

    /// 帧坐标 → 画布坐标
    ///
    /// 旋转 90°/270° 时帧宽高互换, 按较小缩放比等比放入画布
    fn frame_to_canvas(&self, canvas_width: u32, canvas_height: u32) -> Option<AffineMatrix> {
        if self.frame_width == 0 || self.frame_height == 0 {
            return None;
        }
        let rotated = self.rotation.rem_euclid(180) == 90;
        let (fw, fh) = if rotated {
            (self.frame_height, self.frame_width)
        } else {
            (self.frame_width, self.frame_height)
        };
        let multiplier =
            (canvas_height as f32 / fh as f32).min(canvas_width as f32 / fw as f32);
        let dst_w = (multiplier * fw as f32) as u32;
        let dst_h = (multiplier * fh as f32) as u32;
        transformation_matrix(
            self.frame_width,
            self.frame_height,
            dst_w,
            dst_h,
            self.rotation,
            false,
        )
        .ok()
    }
}

impl Tracker for OverlayTracker {
    fn set_frame_configuration(&mut self, width: u32, height: u32, rotation: i32) {
        debug!("跟踪器帧配置: {}x{}, 旋转 {}°", width, height, rotation);
        self.frame_width = width;
        self.frame_height = height;
        self.rotation = rotation;
        self.tracked.clear();
        self.latest_token = None;
    }

    fn track_results(&mut self, detections: Vec<Detection>, token: u64) {
        if self.latest_token.is_some_and(|latest| token < latest) {
            trace!("丢弃过期结果: token={} < {:?}", token, self.latest_token);
            return;
        }
        self.latest_token = Some(token);
        self.tracked = detections
            .into_iter()
            .map(|detection| TrackedSign {
                color: color_for(&detection.label),
                detection,
            })
            .collect();
    }

    fn draw(&self, canvas: &mut RgbImage) {
        let Some(matrix) = self.frame_to_canvas(canvas.width(), canvas.height()) else {
            return;
        };

        for sign in &self.tracked {
            // 只画画布内的部分, 坐标不受分类器输出范围约束
            let Some(r) = matrix
                .map_rect(&sign.detection.location)
                .clamp_to(canvas.width(), canvas.height())
            else {
                continue;
            };
            let (x, y) = (r.left.round() as i32, r.top.round() as i32);
            let (w, h) = (r.width().round() as i32, r.height().round() as i32);

            for inset in 0..BOX_THICKNESS {
                let (bw, bh) = (w - 2 * inset, h - 2 * inset);
                if bw <= 0 || bh <= 0 {
                    break;
                }
                let rect = imageproc::rect::Rect::at(x + inset, y + inset)
                    .of_size(bw as u32, bh as u32);
                draw_hollow_rect_mut(canvas, rect, sign.color);
            }

            if let Some(font) = &self.font {
                let caption = format!(
                    "{} {:.2}",
                    sign.detection.label, sign.detection.confidence
                );
                let text_y = (y - LABEL_FONT_SIZE as i32).max(0);
                draw_text_mut(
                    canvas,
                    sign.color,
                    x,
                    text_y,
                    PxScale::from(LABEL_FONT_SIZE),
                    font,
                    &caption,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Rect;

    fn det(label: &str, rect: Rect) -> Detection {
        Detection {
            label: label.to_string(),
            confidence: 0.9,
            location: rect,
        }
    }

    #[test]
    fn test_stale_results_are_ignored() {
        let mut tracker = OverlayTracker::new();
        tracker.set_frame_configuration(640, 480, 0);
        tracker.track_results(vec![det("90", Rect::new(0.0, 0.0, 10.0, 10.0))], 5);
        tracker.track_results(vec![], 3);
        assert_eq!(tracker.tracked().len(), 1);
        assert_eq!(tracker.latest_token(), Some(5));

        tracker.track_results(vec![], 6);
        assert!(tracker.tracked().is_empty());
    }

    #[test]
    fn test_draw_box_on_canvas() {
        let mut tracker = OverlayTracker::new();
        tracker.set_frame_configuration(640, 480, 0);
        tracker.track_results(vec![det("100", Rect::new(100.0, 100.0, 200.0, 150.0))], 1);

        let mut canvas = RgbImage::new(640, 480);
        tracker.draw(&mut canvas);
        let color = color_for("100");
        assert_eq!(canvas.get_pixel(100, 100), &color);
        assert_eq!(canvas.get_pixel(150, 101), &color);
        assert_eq!(canvas.get_pixel(150, 125), &Rgb([0, 0, 0]));
    }

    #[test]
    fn test_huge_box_is_clamped_to_canvas() {
        let mut tracker = OverlayTracker::new();
        tracker.set_frame_configuration(640, 480, 0);
        tracker.track_results(
            vec![
                det("90", Rect::new(1e12, 1e12, 2e12, 2e12)),
                det("100", Rect::new(600.0, 400.0, 1e12, 1e12)),
            ],
            1,
        );
        let mut canvas = RgbImage::new(640, 480);
        tracker.draw(&mut canvas);
        assert_eq!(canvas.get_pixel(600, 400), &color_for("100"));
    }

    #[test]
    fn test_draw_without_configuration_is_noop() {
        let mut tracker = OverlayTracker::new();
        tracker.track_results(vec![det("100", Rect::new(1.0, 1.0, 20.0, 20.0))], 1);
        let mut canvas = RgbImage::new(32, 32);
        tracker.draw(&mut canvas);
        assert!(canvas.pixels().all(|p| p == &Rgb([0, 0, 0])));
    }

    #[test]
    fn test_rotated_canvas_mapping_swaps_axes() {
        let mut tracker = OverlayTracker::new();
        tracker.set_frame_configuration(640, 480, 90);
        let m = tracker.frame_to_canvas(480, 640).unwrap();
        let full = m.map_rect(&Rect::new(0.0, 0.0, 640.0, 480.0));
        assert!((full.width() - 480.0).abs() < 1e-3);
        assert!((full.height() - 640.0).abs() < 1e-3);
    }
}
