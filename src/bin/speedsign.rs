/// 限速牌识别 (Speed Sign Recognition)
///
/// 系统架构:
/// 1. 主线程:     帧回放, 单飞接纳与仿射裁剪
/// 2. 检测线程:   推理, 映射去重, 交给跟踪器
/// 3. 存储线程:   远端写入 (fire-and-forget)
/// 4. 速度线程:   定位样本 → 滤波速度, 地理编码线程 → 当前街道
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use ab_glyph::FontVec;
use anyhow::{Context, Result};
use clap::Parser;
use image::RgbImage;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use speedsign_rs::config::{Args, PipelineConfig};
use speedsign_rs::dashboard::{Dashboard, LogDashboard};
use speedsign_rs::detection::{CropPreview, NoopOverlay, OverlayTracker, Tracker};
use speedsign_rs::input::{
    check_location_availability, read_location_samples, FrameSource, ImageDirSource,
    LocationAvailability, LocationStatus,
};
use speedsign_rs::models::ReplayClassifier;
use speedsign_rs::pipeline::{FrameOutcome, Pipeline, PipelineParts};
use speedsign_rs::remote::{FirebaseStore, LogStore, StoreWriter};
use speedsign_rs::speed::{CurrentAddress, NominatimGeocoder, SpeedMonitor};
use speedsign_rs::utils::gen_time_string;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// 定位样本间隔 (模拟 GPS 1Hz)
const LOCATION_INTERVAL: Duration = Duration::from_secs(1);

struct SpeedSubsystem {
    monitor: SpeedMonitor,
    feeder: JoinHandle<()>,
    stop: Arc<AtomicBool>,
}

impl SpeedSubsystem {
    fn shutdown(self) {
        self.stop.store(true, Ordering::Release);
        if self.feeder.join().is_err() {
            warn!("定位回放线程异常退出");
        }
        self.monitor.join();
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("speedsign_rs={0},speedsign={0}", level)));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn start_speed_subsystem(
    args: &Args,
    config: &PipelineConfig,
    address: &CurrentAddress,
    dashboard: &Arc<dyn Dashboard>,
) -> Result<Option<SpeedSubsystem>> {
    let availability = LocationAvailability::from_source(args.location.as_deref());
    let path = match (check_location_availability(availability), &args.location) {
        (LocationStatus::Ready, Some(path)) => path,
        _ => return Ok(None),
    };

    let samples = match read_location_samples(path) {
        Ok(samples) => samples,
        Err(e) => {
            warn!("⚠️  定位样本不可用, 跳过速度与地址: {}", e);
            return Ok(None);
        }
    };
    info!("📍 定位样本 {} 条", samples.len());

    let (tx, rx) = crossbeam_channel::unbounded();
    let geocoder = NominatimGeocoder::new(&config.geocoder_url, &config.user_agent);
    let monitor = SpeedMonitor::spawn(
        rx,
        geocoder,
        config.speed_filter_ratio,
        address.clone(),
        Arc::clone(dashboard),
    )?;

    let stop = Arc::new(AtomicBool::new(false));
    let feeder_stop = Arc::clone(&stop);
    let feeder = thread::Builder::new()
        .name("location-feed".into())
        .spawn(move || {
            for sample in samples {
                if feeder_stop.load(Ordering::Acquire) || tx.send(sample).is_err() {
                    break;
                }
                thread::sleep(LOCATION_INTERVAL);
            }
        })
        .context("无法启动定位回放线程")?;

    Ok(Some(SpeedSubsystem {
        monitor,
        feeder,
        stop,
    }))
}

fn load_font(path: &Path) -> Option<FontVec> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!("⚠️  无法读取字体 {}: {}", path.display(), e);
            return None;
        }
    };
    match FontVec::try_from_vec(bytes) {
        Ok(font) => Some(font),
        Err(e) => {
            warn!("⚠️  字体格式无效 {}: {}", path.display(), e);
            None
        }
    }
}

/// 把最终跟踪状态画在预览尺寸的画布上
fn save_overlay(tracker: &Mutex<OverlayTracker>, config: &PipelineConfig, dir: &Path) {
    let mut canvas = RgbImage::new(config.preview_width, config.preview_height);
    tracker
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .draw(&mut canvas);
    let path = dir.join(format!("overlay_{}.png", gen_time_string("-")));
    match canvas.save(&path) {
        Ok(()) => info!("🖼️  叠加层已保存: {}", path.display()),
        Err(e) => warn!("保存叠加层失败: {}", e),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args.log_level);

    info!("🚀 限速牌识别启动");

    let config = match args.config.clone().or_else(PipelineConfig::default_path) {
        Some(path) => PipelineConfig::load(&path)
            .with_context(|| format!("加载配置失败: {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    config.log_summary();

    // 分类器无法构造时直接退出
    let classifier =
        match ReplayClassifier::from_files(&args.labels, &args.detections, config.crop_size) {
            Ok(c) => c,
            Err(e) => {
                error!("❌ 分类器初始化失败: {}", e);
                return Err(e).context("分类器初始化失败");
            }
        };

    let store = Arc::new(match &config.store_url {
        Some(url) => StoreWriter::spawn(FirebaseStore::new(url.as_str(), config.store_root.as_str())),
        None => StoreWriter::spawn(LogStore),
    });
    let dashboard: Arc<dyn Dashboard> = Arc::new(LogDashboard);
    let address = CurrentAddress::new();

    let speed = start_speed_subsystem(&args, &config, &address, &dashboard)?;

    let mut overlay_tracker = OverlayTracker::new();
    if let Some(font) = args.font.as_deref().and_then(load_font) {
        overlay_tracker = overlay_tracker.with_font(font);
    }
    let tracker = Arc::new(Mutex::new(overlay_tracker));

    let preview = args
        .save_preview
        .as_ref()
        .map(|dir| CropPreview::new(dir, config.confidence_threshold));

    let mut pipeline = Pipeline::new(
        &config,
        PipelineParts {
            classifier: Box::new(classifier),
            tracker: tracker.clone(),
            overlay: Arc::new(NoopOverlay),
            store: store.clone(),
            dashboard: Arc::clone(&dashboard),
            address: address.clone(),
            preview,
        },
    )?;
    pipeline.set_num_threads(args.threads);
    pipeline.set_use_acceleration(args.accelerate);

    let mut source = ImageDirSource::open(&args.frames, args.fps)
        .with_context(|| format!("无法打开帧目录: {}", args.frames.display()))?;
    if source.is_empty() {
        warn!("⚠️  帧目录中没有图片");
    }

    let (mut dispatched, mut dropped, mut failed) = (0u64, 0u64, 0u64);
    while let Some(frame) = source.next_frame() {
        if pipeline.frame_size() != Some((frame.width, frame.height)) {
            pipeline
                .reconfigure(frame.width, frame.height, args.rotation)
                .context("帧配置失败")?;
        }
        match pipeline.on_frame(&frame) {
            Ok(FrameOutcome::Dispatched(_)) => dispatched += 1,
            Ok(FrameOutcome::Dropped) => dropped += 1,
            Err(e) => {
                warn!("帧处理失败: {}", e);
                failed += 1;
            }
        }
    }

    info!(
        "📊 共 {} 帧: 检测 {}, 丢弃 {}, 失败 {}",
        pipeline.frame_count(),
        dispatched,
        dropped,
        failed
    );
    if let Some(stats) = pipeline.shutdown() {
        info!(
            "最后一帧 #{}: 推理 {:.1}ms, {} 个结果",
            stats.token, stats.inference_ms, stats.detections
        );
    }

    if let Some(dir) = &args.save_preview {
        save_overlay(&tracker, &config, dir);
    }

    if let Some(speed) = speed {
        speed.shutdown();
    }
    // 最后一个引用释放时等待剩余写入完成
    drop(store);

    info!("✅ 退出");
    Ok(())
}
