/// 输入系统 (Input System)
///
/// - ImageDirSource: 按文件名顺序回放目录中的图片帧
/// - Location:       定位样本与定位服务可用性
pub mod image_dir;
pub mod location;

pub use image_dir::ImageDirSource;
pub use location::{
    check_location_availability, read_location_samples, LocationAvailability, LocationError,
    LocationSample, LocationStatus,
};

/// 原始相机帧 (RGBA8888, 按行紧密排列)
#[derive(Clone, Debug)]
pub struct RawFrame {
    pub rgba_data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, rgba_data: Vec<u8>) -> Self {
        Self {
            rgba_data,
            width,
            height,
        }
    }

    /// 缓冲区长度是否与尺寸一致
    pub fn is_complete(&self) -> bool {
        self.rgba_data.len() as u64 == self.width as u64 * self.height as u64 * 4
    }
}

/// 帧来源; 返回 None 表示流结束
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<RawFrame>;
}
