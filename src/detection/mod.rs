/// 检测系统 (Detection System)
///
/// 运行在检测线程上的各个部件
/// - Scheduler: 单飞调度 (忙时丢帧)
/// - Mapper:    置信度过滤 + 坐标逆变换 + 标签去重
/// - History:   最近 4 个不同标签
/// - Tracker:   跟踪器接口与叠加层
pub mod history;
pub mod mapper;
pub mod preview;
pub mod scheduler;
pub mod tracker;
pub mod types;

pub use history::{HistoryRing, HISTORY_CAPACITY};
pub use mapper::{DetectionMapper, MappedFrame, StoreWrite};
pub use preview::CropPreview;
pub use scheduler::{AdmitGuard, FrameScheduler};
pub use tracker::{NoopOverlay, Overlay, OverlayTracker, TrackedSign, Tracker};
pub use types::{Detection, FrameStats, Recognition, SignEvent};
