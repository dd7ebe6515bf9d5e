/// 图片目录帧源: 代替相机, 按 fps 节拍回放
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{FrameSource, RawFrame};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "bmp", "webp"];

pub struct ImageDirSource {
    files: Vec<PathBuf>,
    cursor: usize,
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl ImageDirSource {
    /// `fps` 为 0 时不限速
    pub fn open(dir: &Path, fps: u32) -> io::Result<Self> {
        let mut files: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| is_image(p))
            .collect();
        files.sort();

        info!("📂 帧目录 {}: {} 张图片", dir.display(), files.len());

        Ok(Self {
            files,
            cursor: 0,
            interval: (fps > 0).then(|| Duration::from_secs_f64(1.0 / fps as f64)),
            last: None,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn pace(&mut self) {
        if let (Some(interval), Some(last)) = (self.interval, self.last) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                thread::sleep(interval - elapsed);
            }
        }
        self.last = Some(Instant::now());
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

impl FrameSource for ImageDirSource {
    fn next_frame(&mut self) -> Option<RawFrame> {
        while self.cursor < self.files.len() {
            let path = &self.files[self.cursor];
            self.cursor += 1;

            match image::open(path) {
                Ok(img) => {
                    let rgba = img.to_rgba8();
                    let (width, height) = rgba.dimensions();
                    debug!("读取帧 {} ({}x{})", path.display(), width, height);
                    self.pace();
                    return Some(RawFrame::new(width, height, rgba.into_raw()));
                }
                // 坏文件跳过
                Err(e) => warn!("无法解码 {}: {}", path.display(), e),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("speedsign_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_frames_in_name_order() {
        let dir = temp_dir("frames");
        RgbaImage::from_pixel(4, 2, Rgba([1, 2, 3, 255]))
            .save(dir.join("b.png"))
            .unwrap();
        RgbaImage::from_pixel(3, 5, Rgba([9, 9, 9, 255]))
            .save(dir.join("a.png"))
            .unwrap();
        fs::write(dir.join("notes.txt"), "skip").unwrap();
        fs::write(dir.join("c.png"), "not a png").unwrap();

        let mut source = ImageDirSource::open(&dir, 0).unwrap();
        assert_eq!(source.len(), 3);

        let first = source.next_frame().unwrap();
        assert_eq!((first.width, first.height), (3, 5));
        assert!(first.is_complete());

        let second = source.next_frame().unwrap();
        assert_eq!((second.width, second.height), (4, 2));
        assert_eq!(&second.rgba_data[..4], &[1, 2, 3, 255]);

        assert!(source.next_frame().is_none());
        let _ = fs::remove_dir_all(&dir);
    }
}
