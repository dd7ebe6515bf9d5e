//! 定位样本
//!
//! 录制文件为 JSON Lines, 每行一个 `{"speed_mps": .., "lat": .., "lon": ..}`

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum LocationError {
    #[error("无法读取定位文件 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("定位文件第 {line} 行格式错误: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    /// 速度 (m/s)
    pub speed_mps: f32,
    pub lat: f64,
    pub lon: f64,
}

/// 启动时检查一次, 之后不再跟踪变化
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocationAvailability {
    pub permission_granted: bool,
    pub service_enabled: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationStatus {
    /// 可以启动速度子系统
    Ready,
    /// 服务关闭, 已提示用户
    ServiceDisabled,
    /// 未授权, 跳过速度子系统
    PermissionDenied,
}

impl LocationAvailability {
    /// 命令行给出定位文件即视为授权, 文件存在即视为服务开启
    pub fn from_source(path: Option<&Path>) -> Self {
        Self {
            permission_granted: path.is_some(),
            service_enabled: path.map(|p| p.is_file()).unwrap_or(false),
        }
    }
}

pub fn check_location_availability(availability: LocationAvailability) -> LocationStatus {
    if !availability.permission_granted {
        info!("未授予定位权限, 跳过速度与地址");
        return LocationStatus::PermissionDenied;
    }
    if !availability.service_enabled {
        warn!(
            "GPS Not Enabled: This app requires GPS or Location Service. \
             Would you like to enable Location Service now?"
        );
        return LocationStatus::ServiceDisabled;
    }
    LocationStatus::Ready
}

/// 读取全部样本, 空行忽略
pub fn read_location_samples(path: &Path) -> Result<Vec<LocationSample>, LocationError> {
    let text = fs::read_to_string(path).map_err(|source| LocationError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_location_lines(&text)
}

fn parse_location_lines(text: &str) -> Result<Vec<LocationSample>, LocationError> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(i, l)| {
            serde_json::from_str(l).map_err(|source| LocationError::Parse { line: i + 1, source })
        })
        .collect()
}
