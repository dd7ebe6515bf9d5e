//! 调试用: 保存送入模型的裁剪图 (带 crop space 检测框)

use std::path::{Path, PathBuf};

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use tracing::{debug, warn};

use super::types::Recognition;
use crate::utils::gen_time_string;

const PREVIEW_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

pub struct CropPreview {
    dir: PathBuf,
    threshold: f32,
}

impl CropPreview {
    pub fn new(dir: impl Into<PathBuf>, threshold: f32) -> Self {
        Self {
            dir: dir.into(),
            threshold,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// 在裁剪图副本上画出通过阈值的框
    pub fn annotate(&self, crop: &RgbImage, raw: &[Recognition]) -> RgbImage {
        let mut copy = crop.clone();
        for rect in raw
            .iter()
            .filter(|r| r.confidence >= self.threshold)
            .filter_map(|r| r.location)
            .filter_map(|rect| rect.clamp_to(crop.width(), crop.height()))
        {
            for inset in 0..2 {
                let w = rect.width().round() as i32 - 2 * inset;
                let h = rect.height().round() as i32 - 2 * inset;
                if w <= 0 || h <= 0 {
                    break;
                }
                let r = imageproc::rect::Rect::at(
                    rect.left.round() as i32 + inset,
                    rect.top.round() as i32 + inset,
                )
                .of_size(w as u32, h as u32);
                draw_hollow_rect_mut(&mut copy, r, PREVIEW_COLOR);
            }
        }
        copy
    }

    /// 保存失败只记录日志, 不影响检测流程
    pub fn save(&self, crop: &RgbImage, raw: &[Recognition], token: u64) -> Option<PathBuf> {
        if let Err(e) = std::fs::create_dir_all(&self.dir) {
            warn!("无法创建预览目录 {}: {}", self.dir.display(), e);
            return None;
        }
        let path = self
            .dir
            .join(format!("crop_{}_{}.png", gen_time_string("-"), token));
        match self.annotate(crop, raw).save(&path) {
            Ok(()) => {
                debug!("预览已保存: {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("保存预览失败 {}: {}", path.display(), e);
                None
            }
        }
    }
}
