/// 工具模块
/// Utility modules
pub mod affine_transform;

pub use affine_transform::{
    build_transform, transformation_matrix, warp_affine_rgb, AffineMatrix, InterpolationMethod,
    Rect, TransformError, TransformPair,
};

/// 生成时间字符串 (用于文件命名)
pub fn gen_time_string(delimiter: &str) -> String {
    let t_now = chrono::Local::now();
    let fmt = format!(
        "%Y{}%m{}%d{}%H{}%M{}%S{}%f",
        delimiter, delimiter, delimiter, delimiter, delimiter, delimiter
    );
    t_now.format(&fmt).to_string()
}
