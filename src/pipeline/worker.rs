/// 检测线程 (Detection Worker)
/// 职责: 接收裁剪图 → 分类 → 映射/去重 → 投递存储写入 → 交给跟踪器
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use crossbeam_channel::Receiver;
use image::RgbImage;
use tracing::{debug, info, warn};

use super::{DetectionJob, WorkerCommand};
use crate::dashboard::Dashboard;
use crate::detection::{CropPreview, DetectionMapper, FrameStats, Overlay, Recognition, Tracker};
use crate::models::Classifier;
use crate::remote::StoreSink;
use crate::speed::CurrentAddress;

pub(crate) struct DetectionWorker {
    pub(crate) classifier: Box<dyn Classifier>,
    pub(crate) mapper: DetectionMapper,
    pub(crate) threshold: f32,
    pub(crate) crop_size: u32,
    pub(crate) tracker: Arc<Mutex<dyn Tracker>>,
    pub(crate) overlay: Arc<dyn Overlay>,
    pub(crate) store: Arc<dyn StoreSink>,
    pub(crate) dashboard: Arc<dyn Dashboard>,
    pub(crate) address: CurrentAddress,
    pub(crate) preview: Option<CropPreview>,
    pub(crate) last_stats: Arc<Mutex<Option<FrameStats>>>,
}

impl DetectionWorker {
    pub(crate) fn run(mut self, rx: Receiver<WorkerCommand>) {
        info!("🔍 检测线程启动");
        for command in rx.iter() {
            match command {
                WorkerCommand::Configure(option) => {
                    debug!("应用分类器配置: {:?}", option);
                    option.apply(&mut self.classifier);
                }
                WorkerCommand::Detect(job) => self.process(job),
            }
        }
        info!("检测线程退出");
    }

    fn process(&mut self, job: DetectionJob) {
        // guard 在本函数结束 (或 panic 展开) 时释放调度器
        let DetectionJob {
            token,
            frame_size,
            crop,
            inverse,
            guard: _guard,
        } = job;

        let start = Instant::now();
        // 分类器 panic 也按本帧无结果处理, 检测线程继续运行
        let raw = match panic::catch_unwind(AssertUnwindSafe(|| self.classifier.detect(&crop))) {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                warn!("帧 {} 推理失败: {}", token, e);
                Vec::new()
            }
            Err(_) => {
                warn!("帧 {} 推理时分类器 panic", token);
                Vec::new()
            }
        };
        let inference_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!("帧 {} 推理耗时 {:.1}ms, 原始结果 {} 个", token, inference_ms, raw.len());

        self.save_preview(&crop, &raw, token);

        let address = self.address.get();
        let mapped = self
            .mapper
            .map_and_filter(raw, &inverse, self.threshold, &address);

        for write in mapped.store_writes {
            self.store.schedule(write);
        }
        for event in &mapped.announcements {
            self.dashboard.show_sign(event);
        }
        if mapped.history_changed {
            self.dashboard
                .show_history(&self.mapper.history().snapshot());
        }

        let detections = mapped.detections.len();
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .track_results(mapped.detections, token);
        self.overlay.request_redraw();

        let stats = FrameStats {
            token,
            frame_size,
            crop_size: self.crop_size,
            inference_ms,
            detections,
        };
        self.dashboard.show_frame_stats(&stats);
        *self.last_stats.lock().unwrap_or_else(PoisonError::into_inner) = Some(stats);
    }

    fn save_preview(&self, crop: &RgbImage, raw: &[Recognition], token: u64) {
        if let Some(preview) = &self.preview {
            preview.save(crop, raw, token);
        }
    }
}
