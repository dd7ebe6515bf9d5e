/// 速度与地址子系统
///
/// - Filter:   速度信号平滑
/// - Geocoder: 逆地理编码
/// - Monitor:  消费定位样本, 驱动滤波与地址查询
pub mod filter;
pub mod geocoder;
pub mod monitor;

pub use filter::{recursive_filter, InvalidRatio, SpeedFilter};
pub use geocoder::{GeocodeError, Geocoder, NominatimGeocoder};
pub use monitor::{format_speed, SpeedMonitor, MPS_TO_KMH};

use std::sync::{Arc, PoisonError, RwLock};

/// 当前街道名, 作为远端存储的键
///
/// 由地理编码线程写入, 检测线程读取
#[derive(Debug, Clone, Default)]
pub struct CurrentAddress {
    inner: Arc<RwLock<String>>,
}

impl CurrentAddress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(value.into())),
        }
    }

    pub fn get(&self) -> String {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn set(&self, value: impl Into<String>) {
        *self.inner.write().unwrap_or_else(PoisonError::into_inner) = value.into();
    }
}
