/// 识别流水线 (Recognition Pipeline)
///
/// 双线程架构:
/// - 帧到达线程: 计数 → 请求重绘 → 单飞接纳 → 仿射裁剪 → 投递
/// - 检测线程:   推理 → 映射/去重 → 远端写入 → 跟踪器
///
/// 两个线程之间共享的只有调度器忙标志; 当前地址由外部输入
pub mod worker;

use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

use crate::config::PipelineConfig;
use crate::dashboard::Dashboard;
use crate::detection::{
    AdmitGuard, CropPreview, DetectionMapper, FrameScheduler, FrameStats, Overlay, Tracker,
};
use crate::input::RawFrame;
use crate::models::{Classifier, ClassifierOption};
use crate::remote::StoreSink;
use crate::speed::CurrentAddress;
use crate::utils::{
    build_transform, warp_affine_rgb, AffineMatrix, InterpolationMethod, TransformError,
    TransformPair,
};
use worker::DetectionWorker;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("帧缓冲区与尺寸不符: {width}x{height}, {len} 字节")]
    FrameBuffer { width: u32, height: u32, len: usize },
    #[error("帧尺寸 {actual:?} 与配置 {expected:?} 不符")]
    FrameSize {
        expected: Option<(u32, u32)>,
        actual: (u32, u32),
    },
    #[error("变换计算失败: {0}")]
    Transform(#[from] TransformError),
    #[error("检测线程已退出")]
    WorkerGone,
    #[error("无法启动检测线程: {0}")]
    Spawn(#[source] std::io::Error),
}

/// 投递给检测线程的单帧任务
pub struct DetectionJob {
    pub token: u64,
    pub frame_size: (u32, u32),
    pub crop: RgbImage,
    /// 裁剪 → 帧 (随任务携带, 之后的重配置不影响在途任务)
    pub inverse: AffineMatrix,
    pub guard: AdmitGuard,
}

pub enum WorkerCommand {
    Detect(DetectionJob),
    Configure(ClassifierOption),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOutcome {
    /// 检测忙, 本帧丢弃
    Dropped,
    /// 已交给检测线程, 附带帧序号
    Dispatched(u64),
}

/// 外部协作方
pub struct PipelineParts {
    pub classifier: Box<dyn Classifier>,
    pub tracker: Arc<Mutex<dyn Tracker>>,
    pub overlay: Arc<dyn Overlay>,
    pub store: Arc<dyn StoreSink>,
    pub dashboard: Arc<dyn Dashboard>,
    pub address: CurrentAddress,
    pub preview: Option<CropPreview>,
}

#[derive(Debug, Clone, Copy)]
struct FrameGeometry {
    width: u32,
    height: u32,
    rotation: i32,
    transform: TransformPair,
}

pub struct Pipeline {
    crop_size: u32,
    maintain_aspect: bool,
    frame_counter: u64,
    scheduler: Arc<FrameScheduler>,
    geometry: Option<FrameGeometry>,
    overlay: Arc<dyn Overlay>,
    tracker: Arc<Mutex<dyn Tracker>>,
    last_stats: Arc<Mutex<Option<FrameStats>>>,
    tx: Option<Sender<WorkerCommand>>,
    worker: Option<JoinHandle<()>>,
}

impl Pipeline {
    /// 启动检测线程; 需要再调用 [`Pipeline::reconfigure`] 才能处理帧
    pub fn new(config: &PipelineConfig, parts: PipelineParts) -> Result<Self, PipelineError> {
        let last_stats = Arc::new(Mutex::new(None));
        // 单飞保证在途任务最多一个, 队列里只会多出少量配置命令
        let (tx, rx) = crossbeam_channel::unbounded();

        let worker = DetectionWorker {
            classifier: parts.classifier,
            mapper: DetectionMapper::new(),
            threshold: config.confidence_threshold,
            crop_size: config.crop_size,
            tracker: Arc::clone(&parts.tracker),
            overlay: Arc::clone(&parts.overlay),
            store: parts.store,
            dashboard: parts.dashboard,
            address: parts.address,
            preview: parts.preview,
            last_stats: Arc::clone(&last_stats),
        };
        let handle = thread::Builder::new()
            .name("detector".into())
            .spawn(move || worker.run(rx))
            .map_err(PipelineError::Spawn)?;

        Ok(Self {
            crop_size: config.crop_size,
            maintain_aspect: config.maintain_aspect,
            frame_counter: 0,
            scheduler: Arc::new(FrameScheduler::new()),
            geometry: None,
            overlay: parts.overlay,
            tracker: parts.tracker,
            last_stats,
            tx: Some(tx),
            worker: Some(handle),
        })
    }

    /// 相机配置 (分辨率/方向) 变化时调用, 重新计算变换并通知跟踪器
    pub fn reconfigure(
        &mut self,
        width: u32,
        height: u32,
        rotation: i32,
    ) -> Result<(), PipelineError> {
        let transform = build_transform(
            width,
            height,
            self.crop_size,
            rotation,
            self.maintain_aspect,
        )?;
        info!(
            "初始化帧尺寸 {}x{}, 传感器方向 {}°, 裁剪 {}x{}",
            width, height, rotation, self.crop_size, self.crop_size
        );
        self.tracker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .set_frame_configuration(width, height, rotation);
        self.geometry = Some(FrameGeometry {
            width,
            height,
            rotation,
            transform,
        });
        Ok(())
    }

    /// 当前配置的帧尺寸
    pub fn frame_size(&self) -> Option<(u32, u32)> {
        self.geometry.map(|g| (g.width, g.height))
    }

    pub fn rotation(&self) -> Option<i32> {
        self.geometry.map(|g| g.rotation)
    }

    pub fn transform(&self) -> Option<TransformPair> {
        self.geometry.map(|g| g.transform)
    }

    /// 已到达的帧数 (包括被丢弃的)
    pub fn frame_count(&self) -> u64 {
        self.frame_counter
    }

    pub fn is_busy(&self) -> bool {
        self.scheduler.is_busy()
    }

    /// 最近一次完成检测的统计
    pub fn last_stats(&self) -> Option<FrameStats> {
        self.last_stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 处理一帧; 从不阻塞在检测上
    pub fn on_frame(&mut self, frame: &RawFrame) -> Result<FrameOutcome, PipelineError> {
        self.frame_counter += 1;
        let token = self.frame_counter;
        self.overlay.request_redraw();

        let geometry = match self.geometry {
            Some(g) if (g.width, g.height) == (frame.width, frame.height) => g,
            other => {
                return Err(PipelineError::FrameSize {
                    expected: other.map(|g| (g.width, g.height)),
                    actual: (frame.width, frame.height),
                })
            }
        };

        let Some(guard) = self.scheduler.admit() else {
            trace!("检测忙, 丢弃帧 {}", token);
            return Ok(FrameOutcome::Dropped);
        };
        debug!("接纳帧 {}", token);

        // 以下任何错误返回都会析构 guard, 调度器随之释放
        let rgb = rgba_to_rgb(frame)?;
        let crop = warp_affine_rgb(
            &rgb,
            &geometry.transform.forward,
            (self.crop_size, self.crop_size),
            InterpolationMethod::Bilinear,
        )?;

        let job = DetectionJob {
            token,
            frame_size: (frame.width, frame.height),
            crop,
            inverse: geometry.transform.inverse,
            guard,
        };
        let tx = self.tx.as_ref().ok_or(PipelineError::WorkerGone)?;
        tx.send(WorkerCommand::Detect(job))
            .map_err(|_| PipelineError::WorkerGone)?;

        Ok(FrameOutcome::Dispatched(token))
    }

    /// 下一次推理前生效
    pub fn set_num_threads(&self, num_threads: usize) {
        self.configure(ClassifierOption::NumThreads(num_threads));
    }

    pub fn set_use_acceleration(&self, enabled: bool) {
        self.configure(ClassifierOption::UseAcceleration(enabled));
    }

    fn configure(&self, option: ClassifierOption) {
        match &self.tx {
            Some(tx) if tx.send(WorkerCommand::Configure(option)).is_ok() => {}
            _ => warn!("检测线程已退出, 忽略配置 {:?}", option),
        }
    }

    /// 关闭队列并等待检测线程处理完在途任务, 返回最后一帧的统计
    pub fn shutdown(mut self) -> Option<FrameStats> {
        self.close();
        self.last_stats()
    }

    fn close(&mut self) {
        self.tx.take();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("检测线程异常退出");
            }
        }
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.close();
    }
}

/// RGBA8888 → RGB888
fn rgba_to_rgb(frame: &RawFrame) -> Result<RgbImage, PipelineError> {
    let mismatch = || PipelineError::FrameBuffer {
        width: frame.width,
        height: frame.height,
        len: frame.rgba_data.len(),
    };
    if !frame.is_complete() {
        return Err(mismatch());
    }
    let rgb: Vec<u8> = frame
        .rgba_data
        .chunks_exact(4)
        .flat_map(|p| [p[0], p[1], p[2]])
        .collect();
    RgbImage::from_raw(frame.width, frame.height, rgb).ok_or_else(mismatch)
}
