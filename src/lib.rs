#![allow(clippy::type_complexity)]
// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license
pub mod config; // 命令行与配置文件
pub mod dashboard; // 展示层接口
pub mod detection; // 限速牌检测系统
pub mod input; // 帧与定位输入
pub mod models; // 分类器接口与实现
pub mod pipeline; // 识别流水线
pub mod remote; // 远端存储
pub mod speed; // 速度与地址
pub mod utils; // 仿射变换等工具

pub use crate::config::{Args, ConfigError, PipelineConfig};
pub use crate::dashboard::{Dashboard, LogDashboard};
pub use crate::detection::{
    Detection, DetectionMapper, FrameScheduler, HistoryRing, Overlay, OverlayTracker, Recognition,
    SignEvent, StoreWrite, Tracker,
};
pub use crate::input::{FrameSource, ImageDirSource, LocationSample, RawFrame};
pub use crate::models::{Classifier, ClassifierError, ReplayClassifier};
pub use crate::pipeline::{FrameOutcome, Pipeline, PipelineError, PipelineParts};
pub use crate::remote::{FirebaseStore, LogStore, RemoteStore, StoreError, StoreSink, StoreWriter};
pub use crate::speed::{recursive_filter, CurrentAddress, SpeedFilter, SpeedMonitor};
pub use crate::utils::{build_transform, AffineMatrix, Rect, TransformError, TransformPair};
