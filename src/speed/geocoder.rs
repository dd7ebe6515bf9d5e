//! 逆地理编码 (经纬度 → 街道名)

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeocodeError {
    #[error("HTTP 请求失败: {0}")]
    Transport(String),
    #[error("响应格式错误: {0}")]
    Malformed(String),
}

/// 外部地理编码服务契约
///
/// `Ok(None)` 表示该位置没有地址
pub trait Geocoder: Send + 'static {
    fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>, GeocodeError>;
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    road: Option<String>,
    pedestrian: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimReply {
    address: Option<NominatimAddress>,
    error: Option<String>,
}

/// OpenStreetMap Nominatim `/reverse` 接口
pub struct NominatimGeocoder {
    agent: ureq::Agent,
    base_url: String,
    user_agent: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: impl Into<String>, user_agent: impl Into<String>) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(10))
            .build();
        Self {
            agent,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: user_agent.into(),
        }
    }

    /// 从响应体中取出街道名
    pub fn parse_street(body: &str) -> Result<Option<String>, GeocodeError> {
        let reply: NominatimReply =
            serde_json::from_str(body).map_err(|e| GeocodeError::Malformed(e.to_string()))?;
        if reply.error.is_some() {
            return Ok(None);
        }
        Ok(reply
            .address
            .and_then(|a| a.road.or(a.pedestrian))
            .filter(|s| !s.trim().is_empty()))
    }
}

impl Geocoder for NominatimGeocoder {
    fn reverse_geocode(&self, lat: f64, lon: f64) -> Result<Option<String>, GeocodeError> {
        let url = format!("{}/reverse", self.base_url);
        let body = self
            .agent
            .get(&url)
            .set("User-Agent", &self.user_agent)
            .query("format", "jsonv2")
            .query("lat", &lat.to_string())
            .query("lon", &lon.to_string())
            .call()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?
            .into_string()
            .map_err(|e| GeocodeError::Transport(e.to_string()))?;
        Self::parse_street(&body)
    }
}
