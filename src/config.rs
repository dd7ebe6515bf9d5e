//! 配置 - 命令行参数 + JSON 配置文件

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::detection::types::{INF_SIZE, MINIMUM_CONFIDENCE, PREVIEW_HEIGHT, PREVIEW_WIDTH};
use crate::remote::firebase::DEFAULT_ROOT;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件读写失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("配置文件解析失败: {0}")]
    Json(#[from] serde_json::Error),
    #[error("配置项 {field} 无效: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// 限速牌识别参数
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "限速牌识别 - 帧回放 + 地址标注", long_about = None)]
pub struct Args {
    /// 帧图片目录 (按文件名顺序回放)
    #[arg(short, long)]
    pub frames: PathBuf,

    /// 配置文件, 不存在时写入默认值
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 标签文件 (每行一个)
    #[arg(short, long, default_value = "models/labelmap.txt")]
    pub labels: PathBuf,

    /// 录制的分类器输出 (JSON)
    #[arg(short, long, default_value = "models/detections.json")]
    pub detections: PathBuf,

    /// 定位样本 (JSON Lines), 不给出则视为未授权
    #[arg(long)]
    pub location: Option<PathBuf>,

    /// 传感器方向 (0/90/180/270)
    #[arg(short, long, default_value_t = 90, allow_hyphen_values = true)]
    pub rotation: i32,

    /// 回放帧率, 0 为不限速
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// 推理线程数
    #[arg(short, long, default_value_t = 1)]
    pub threads: usize,

    /// 启用硬件加速
    #[arg(long, default_value_t = false)]
    pub accelerate: bool,

    /// 保存裁剪预览图的目录
    #[arg(long)]
    pub save_preview: Option<PathBuf>,

    /// 叠加层字体 (TTF/OTF)
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// 日志级别 (trace/debug/info/warn/error), RUST_LOG 优先
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// 流水线参数配置
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === 检测参数 ===
    pub crop_size: u32,            // 模型输入边长
    pub confidence_threshold: f32, // 最低置信度
    pub maintain_aspect: bool,     // 裁剪时保持宽高比

    // === 预览 ===
    pub preview_width: u32,
    pub preview_height: u32,

    // === 速度 ===
    pub speed_filter_ratio: f32,

    // === 远端服务 ===
    pub store_url: Option<String>, // 为空时只记录日志
    pub store_root: String,
    pub geocoder_url: String,
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            crop_size: INF_SIZE,
            confidence_threshold: MINIMUM_CONFIDENCE,
            maintain_aspect: false,

            preview_width: PREVIEW_WIDTH,
            preview_height: PREVIEW_HEIGHT,

            speed_filter_ratio: 2.0,

            store_url: None,
            store_root: DEFAULT_ROOT.to_string(),
            geocoder_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: concat!("speedsign-rs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl PipelineConfig {
    /// `<config_dir>/speedsign/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("speedsign").join("config.json"))
    }

    /// 从JSON文件加载配置, 文件不存在时写入默认值
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(json) => {
                let config: Self = serde_json::from_str(&json)?;
                config.validate()?;
                info!("✅ 配置已从 {} 加载", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📝 配置文件不存在, 创建默认配置...");
                let config = Self::default();
                if let Err(e) = config.save(path) {
                    warn!("⚠️  无法写入默认配置: {}", e);
                }
                Ok(config)
            }
            Err(source) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// 保存配置到JSON文件
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(io_err)?;
        info!("💾 配置已保存到 {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.crop_size == 0 {
            return Err(ConfigError::Invalid {
                field: "crop_size",
                reason: "必须大于 0".into(),
            });
        }
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Invalid {
                field: "confidence_threshold",
                reason: format!("{} 不在 [0, 1] 内", self.confidence_threshold),
            });
        }
        if !self.speed_filter_ratio.is_finite() || self.speed_filter_ratio <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "speed_filter_ratio",
                reason: format!("{} 不是正数", self.speed_filter_ratio),
            });
        }
        Ok(())
    }

    /// 打印当前配置
    pub fn log_summary(&self) {
        info!("🎛️  当前配置:");
        info!("  裁剪尺寸: {}", self.crop_size);
        info!("  置信度阈值: {:.2}", self.confidence_threshold);
        info!("  保持宽高比: {}", self.maintain_aspect);
        info!("  速度滤波系数: {:.1}", self.speed_filter_ratio);
        match &self.store_url {
            Some(url) => info!("  远端存储: {}/{}", url, self.store_root),
            None => info!("  远端存储: 未配置 (仅日志)"),
        }
    }
}
