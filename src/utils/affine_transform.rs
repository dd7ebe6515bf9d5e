/// 仿射变换工具模块
/// 帧坐标 (frame space) 与模型输入坐标 (crop space) 之间的正/逆变换
use image::{Rgb, RgbImage};
use thiserror::Error;

/// 仿射变换矩阵 (2x3, 第三行固定为 0 0 1)
/// | a11 a12 b1 |
/// | a21 a22 b2 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineMatrix {
    pub a11: f32,
    pub a12: f32,
    pub b1: f32,
    pub a21: f32,
    pub a22: f32,
    pub b2: f32,
}

impl Default for AffineMatrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl AffineMatrix {
    /// 创建单位仿射矩阵
    pub fn identity() -> Self {
        Self {
            a11: 1.0,
            a12: 0.0,
            b1: 0.0,
            a21: 0.0,
            a22: 1.0,
            b2: 0.0,
        }
    }

    /// 转换为2x3数组
    pub fn to_array(&self) -> [[f32; 3]; 2] {
        [[self.a11, self.a12, self.b1], [self.a21, self.a22, self.b2]]
    }

    /// 应用仿射变换到点 (x, y)
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let new_x = self.a11 * x + self.a12 * y + self.b1;
        let new_y = self.a21 * x + self.a22 * y + self.b2;
        (new_x, new_y)
    }

    /// 变换矩形: 映射四个角点后取外接轴对齐矩形
    pub fn map_rect(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(rect.left, rect.top),
            self.transform_point(rect.right, rect.top),
            self.transform_point(rect.left, rect.bottom),
            self.transform_point(rect.right, rect.bottom),
        ];

        let mut out = Rect::new(f32::INFINITY, f32::INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY);
        for (x, y) in corners {
            out.left = out.left.min(x);
            out.top = out.top.min(y);
            out.right = out.right.max(x);
            out.bottom = out.bottom.max(y);
        }
        out
    }

    pub fn determinant(&self) -> f32 {
        self.a11 * self.a22 - self.a12 * self.a21
    }

    /// 计算逆矩阵 (用于反向映射)
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-10 {
            return None; // 矩阵不可逆
        }

        let inv_det = 1.0 / det;
        Some(Self {
            a11: self.a22 * inv_det,
            a12: -self.a12 * inv_det,
            b1: (self.a12 * self.b2 - self.a22 * self.b1) * inv_det,
            a21: -self.a21 * inv_det,
            a22: self.a11 * inv_det,
            b2: (self.a21 * self.b1 - self.a11 * self.b2) * inv_det,
        })
    }

    /// 创建平移矩阵
    pub fn translation(dx: f32, dy: f32) -> Self {
        Self {
            b1: dx,
            b2: dy,
            ..Self::identity()
        }
    }

    /// 创建缩放矩阵
    pub fn scale(sx: f32, sy: f32) -> Self {
        Self {
            a11: sx,
            a22: sy,
            ..Self::identity()
        }
    }

    /// 创建旋转矩阵 (角度制, y轴向下时为顺时针)
    ///
    /// 90° 的整数倍直接取精确的 sin/cos, 避免 cos(90°) ≈ -4e-8 这类残差
    pub fn rotation(angle_degrees: f32) -> Self {
        let (sin_a, cos_a) = if angle_degrees % 90.0 == 0.0 {
            match (angle_degrees / 90.0).rem_euclid(4.0) as i32 {
                0 => (0.0, 1.0),
                1 => (1.0, 0.0),
                2 => (0.0, -1.0),
                _ => (-1.0, 0.0),
            }
        } else {
            angle_degrees.to_radians().sin_cos()
        };
        Self {
            a11: cos_a,
            a12: -sin_a,
            b1: 0.0,
            a21: sin_a,
            a22: cos_a,
            b2: 0.0,
        }
    }

    /// 矩阵组合 (self * other): 先应用 other, 再应用 self
    pub fn compose(&self, other: &Self) -> Self {
        Self {
            a11: self.a11 * other.a11 + self.a12 * other.a21,
            a12: self.a11 * other.a12 + self.a12 * other.a22,
            b1: self.a11 * other.b1 + self.a12 * other.b2 + self.b1,
            a21: self.a21 * other.a11 + self.a22 * other.a21,
            a22: self.a21 * other.a12 + self.a22 * other.a22,
            b2: self.a21 * other.b1 + self.a22 * other.b2 + self.b2,
        }
    }

    /// 在当前变换之后追加 `next`
    pub fn then(&self, next: &Self) -> Self {
        next.compose(self)
    }
}

/// 轴对齐矩形 (left, top, right, bottom)
#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl Rect {
    pub fn new(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> f32 {
        self.right - self.left
    }

    pub fn height(&self) -> f32 {
        self.bottom - self.top
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.left + self.right) / 2.0, (self.top + self.bottom) / 2.0)
    }

    /// 坐标非有限值或面积为零的框视为退化框
    pub fn is_degenerate(&self) -> bool {
        let finite = self.left.is_finite()
            && self.top.is_finite()
            && self.right.is_finite()
            && self.bottom.is_finite();
        !finite || self.width() <= 0.0 || self.height() <= 0.0
    }

    /// 裁到 `[0, width] x [0, height]` 内; 退化或完全在外时返回 None
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        if self.is_degenerate() {
            return None;
        }
        let (w, h) = (width as f32, height as f32);
        let clamped = Rect::new(
            self.left.clamp(0.0, w),
            self.top.clamp(0.0, h),
            self.right.clamp(0.0, w),
            self.bottom.clamp(0.0, h),
        );
        (!clamped.is_degenerate()).then_some(clamped)
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("源尺寸无效: {width}x{height}")]
    DegenerateSource { width: u32, height: u32 },
    #[error("目标尺寸无效: {width}x{height}")]
    DegenerateTarget { width: u32, height: u32 },
    #[error("变换矩阵不可逆: {0:?}")]
    Singular(AffineMatrix),
}

/// 正/逆变换对: forward 为 帧 → 裁剪, inverse 为 裁剪 → 帧
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformPair {
    pub forward: AffineMatrix,
    pub inverse: AffineMatrix,
}

/// 计算把 `src_width x src_height` 的帧旋转 `rotation_degrees` 后填满
/// `dst_width x dst_height` 的变换矩阵
///
/// - 有旋转时: 先把帧中心平移到原点, 旋转, 缩放, 再平移到目标中心
/// - 无旋转时: 仅缩放 (左上角对齐)
/// - `maintain_aspect` 为真时取两个方向中较大的缩放比, 保证填满目标 (边缘可能被裁掉)
pub fn transformation_matrix(
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    dst_height: u32,
    rotation_degrees: i32,
    maintain_aspect: bool,
) -> Result<AffineMatrix, TransformError> {
    if src_width == 0 || src_height == 0 {
        return Err(TransformError::DegenerateSource {
            width: src_width,
            height: src_height,
        });
    }
    if dst_width == 0 || dst_height == 0 {
        return Err(TransformError::DegenerateTarget {
            width: dst_width,
            height: dst_height,
        });
    }
    if rotation_degrees % 90 != 0 {
        tracing::warn!("旋转角度 {}° 不是 90° 的整数倍", rotation_degrees);
    }

    let mut matrix = AffineMatrix::identity();
    if rotation_degrees != 0 {
        matrix = matrix
            .then(&AffineMatrix::translation(
                -(src_width as f32) / 2.0,
                -(src_height as f32) / 2.0,
            ))
            .then(&AffineMatrix::rotation(rotation_degrees as f32));
    }

    // 旋转 ±90° 时宽高互换
    let transpose = (rotation_degrees.abs() + 90) % 180 == 0;
    let (in_width, in_height) = if transpose {
        (src_height, src_width)
    } else {
        (src_width, src_height)
    };

    if in_width != dst_width || in_height != dst_height {
        let scale_x = dst_width as f32 / in_width as f32;
        let scale_y = dst_height as f32 / in_height as f32;
        let scale = if maintain_aspect {
            let s = scale_x.max(scale_y);
            AffineMatrix::scale(s, s)
        } else {
            AffineMatrix::scale(scale_x, scale_y)
        };
        matrix = matrix.then(&scale);
    }

    if rotation_degrees != 0 {
        matrix = matrix.then(&AffineMatrix::translation(
            dst_width as f32 / 2.0,
            dst_height as f32 / 2.0,
        ));
    }

    Ok(matrix)
}

/// 构建 帧 → 正方形模型输入 的正/逆变换对
///
/// 每次相机配置 (分辨率/旋转) 变化时调用一次, 不要逐帧调用
pub fn build_transform(
    src_width: u32,
    src_height: u32,
    dst_size: u32,
    rotation_degrees: i32,
    maintain_aspect: bool,
) -> Result<TransformPair, TransformError> {
    let forward = transformation_matrix(
        src_width,
        src_height,
        dst_size,
        dst_size,
        rotation_degrees,
        maintain_aspect,
    )?;
    let inverse = forward
        .inverse()
        .ok_or(TransformError::Singular(forward))?;
    Ok(TransformPair { forward, inverse })
}

/// 插值方法
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InterpolationMethod {
    Nearest, // 最近邻插值
    #[default]
    Bilinear, // 双线性插值
}

/// 仿射变换 (RGB图像), 超出源图像的区域填黑
///
/// # 参数
/// - `src`: 源图像
/// - `matrix`: 源 → 目标 的仿射变换矩阵
/// - `dst_size`: 目标图像尺寸 (width, height)
pub fn warp_affine_rgb(
    src: &RgbImage,
    matrix: &AffineMatrix,
    dst_size: (u32, u32),
    interpolation: InterpolationMethod,
) -> Result<RgbImage, TransformError> {
    let (dst_width, dst_height) = dst_size;
    let mut dst = RgbImage::new(dst_width, dst_height);

    // 使用逆变换进行反向映射
    let inv_matrix = matrix.inverse().ok_or(TransformError::Singular(*matrix))?;

    for (dst_x, dst_y, pixel) in dst.enumerate_pixels_mut() {
        // 以像素中心采样
        let (src_x, src_y) =
            inv_matrix.transform_point(dst_x as f32 + 0.5, dst_y as f32 + 0.5);
        *pixel = match interpolation {
            InterpolationMethod::Nearest => sample_nearest(src, src_x - 0.5, src_y - 0.5),
            InterpolationMethod::Bilinear => sample_bilinear(src, src_x - 0.5, src_y - 0.5),
        };
    }

    Ok(dst)
}

fn pixel_at(src: &RgbImage, x: i64, y: i64) -> [f32; 3] {
    if x < 0 || y < 0 || x >= src.width() as i64 || y >= src.height() as i64 {
        return [0.0; 3];
    }
    let p = src.get_pixel(x as u32, y as u32).0;
    [p[0] as f32, p[1] as f32, p[2] as f32]
}

/// 最近邻插值
fn sample_nearest(src: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let p = pixel_at(src, x.round() as i64, y.round() as i64);
    Rgb([p[0] as u8, p[1] as u8, p[2] as u8])
}

/// 双线性插值
fn sample_bilinear(src: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;
    let (x0, y0) = (x0 as i64, y0 as i64);

    let p00 = pixel_at(src, x0, y0);
    let p10 = pixel_at(src, x0 + 1, y0);
    let p01 = pixel_at(src, x0, y0 + 1);
    let p11 = pixel_at(src, x0 + 1, y0 + 1);

    let mut out = [0u8; 3];
    for c in 0..3 {
        let v0 = p00[c] * (1.0 - fx) + p10[c] * fx;
        let v1 = p01[c] * (1.0 - fx) + p11[c] * fx;
        out[c] = (v0 * (1.0 - fy) + v1 * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}
