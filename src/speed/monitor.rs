//! 速度监视线程
//!
//! 定位样本 → km/h → 递归滤波 → 显示; 同时把经纬度投递给地理编码线程
//! (单槽队列, 忙时丢弃), 地理编码的延迟或失败不会阻塞滤波

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, TrySendError};
use tracing::{debug, info, trace, warn};

use super::filter::{InvalidRatio, SpeedFilter};
use super::geocoder::Geocoder;
use super::CurrentAddress;
use crate::dashboard::Dashboard;
use crate::input::LocationSample;

pub const MPS_TO_KMH: f32 = 3.6;

pub const NO_ADDRESS: &str = "no address";
pub const ADDRESS_UNAVAILABLE: &str = "address unavailable";

/// 速度显示文本 (取整)
pub fn format_speed(kmh: f32) -> String {
    if kmh.is_nan() {
        "-- Km/h".to_string()
    } else {
        format!("{:.0} Km/h", kmh)
    }
}

pub struct SpeedMonitor {
    monitor: Option<JoinHandle<()>>,
    geocoder: Option<JoinHandle<()>>,
}

impl SpeedMonitor {
    /// 启动监视线程与地理编码线程; 样本通道关闭后两者依次退出
    pub fn spawn<G: Geocoder>(
        samples: Receiver<LocationSample>,
        geocoder: G,
        filter_ratio: f32,
        address: CurrentAddress,
        dashboard: Arc<dyn Dashboard>,
    ) -> Result<Self, InvalidRatio> {
        let mut filter = SpeedFilter::new(filter_ratio)?;
        let (geo_tx, geo_rx) = crossbeam_channel::bounded::<(f64, f64)>(1);

        dashboard.show_speed("Km/h");

        let geo_dashboard = Arc::clone(&dashboard);
        let geocoder = thread::Builder::new()
            .name("geocoder".into())
            .spawn(move || {
                for (lat, lon) in geo_rx.iter() {
                    let text = match geocoder.reverse_geocode(lat, lon) {
                        Ok(Some(street)) => {
                            let text = format!("Street: {}", street);
                            address.set(street);
                            text
                        }
                        Ok(None) => NO_ADDRESS.to_string(),
                        Err(e) => {
                            warn!("逆地理编码失败 ({:.5}, {:.5}): {}", lat, lon, e);
                            ADDRESS_UNAVAILABLE.to_string()
                        }
                    };
                    geo_dashboard.show_address(&text);
                }
                debug!("地理编码线程退出");
            })
            .map_err(|e| warn!("无法启动地理编码线程: {}", e))
            .ok();

        let monitor = thread::Builder::new()
            .name("speed-monitor".into())
            .spawn(move || {
                info!("速度监视线程启动");
                for sample in samples.iter() {
                    let kmh = filter.update(sample.speed_mps * MPS_TO_KMH);
                    dashboard.show_speed(&format_speed(kmh));

                    match geo_tx.try_send((sample.lat, sample.lon)) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => trace!("地理编码忙, 跳过本次查询"),
                        Err(TrySendError::Disconnected(_)) => {}
                    }
                }
                info!("速度监视线程退出");
            })
            .map_err(|e| warn!("无法启动速度监视线程: {}", e))
            .ok();

        Ok(Self { monitor, geocoder })
    }

    /// 等待两个线程退出 (需先关闭样本通道)
    pub fn join(mut self) {
        for handle in [self.monitor.take(), self.geocoder.take()].into_iter().flatten() {
            if handle.join().is_err() {
                warn!("速度子系统线程异常退出");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speed::GeocodeError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        speeds: Mutex<Vec<String>>,
        addresses: Mutex<Vec<String>>,
    }

    impl Dashboard for Recorder {
        fn show_speed(&self, text: &str) {
            self.speeds.lock().unwrap().push(text.to_string());
        }

        fn show_address(&self, text: &str) {
            self.addresses.lock().unwrap().push(text.to_string());
        }
    }

    struct FixedGeocoder(Result<Option<String>, ()>);

    impl Geocoder for FixedGeocoder {
        fn reverse_geocode(&self, _lat: f64, _lon: f64) -> Result<Option<String>, GeocodeError> {
            self.0
                .clone()
                .map_err(|_| GeocodeError::Transport("offline".into()))
        }
    }

    fn run(geocoder: FixedGeocoder, speeds: &[f32]) -> (Arc<Recorder>, CurrentAddress) {
        let recorder = Arc::new(Recorder::default());
        let address = CurrentAddress::new();
        let (tx, rx) = crossbeam_channel::unbounded();
        let monitor =
            SpeedMonitor::spawn(rx, geocoder, 2.0, address.clone(), recorder.clone()).unwrap();
        for &speed_mps in speeds {
            tx.send(LocationSample {
                speed_mps,
                lat: 10.77,
                lon: 106.70,
            })
            .unwrap();
        }
        drop(tx);
        monitor.join();
        (recorder, address)
    }

    #[test]
    fn test_speed_is_filtered_across_samples() {
        // 10 m/s = 36 km/h, 20 m/s = 72 km/h → (72/2 + 36/2) = 54
        let (recorder, _) = run(FixedGeocoder(Ok(None)), &[10.0, 20.0]);
        let speeds = recorder.speeds.lock().unwrap().clone();
        assert_eq!(speeds, vec!["Km/h", "36 Km/h", "54 Km/h"]);
    }

    #[test]
    fn test_street_becomes_address_key() {
        let (recorder, address) = run(FixedGeocoder(Ok(Some("Le Loi".into()))), &[1.0]);
        assert_eq!(address.get(), "Le Loi");
        assert_eq!(recorder.addresses.lock().unwrap()[0], "Street: Le Loi");
    }

    #[test]
    fn test_geocoder_failure_is_placeholder() {
        let (recorder, address) = run(FixedGeocoder(Err(())), &[1.0]);
        assert_eq!(address.get(), "");
        assert_eq!(recorder.addresses.lock().unwrap()[0], ADDRESS_UNAVAILABLE);
    }

    #[test]
    fn test_format_speed() {
        assert_eq!(format_speed(49.6), "50 Km/h");
        assert_eq!(format_speed(f32::NAN), "-- Km/h");
    }
}
