//! 简单递归滤波 (单极点 IIR 低通)

use thiserror::Error;

/// 新值 = curr / ratio + prev * (1 - 1/ratio)
///
/// - `prev` 为 NaN 时视为未初始化, 直接返回 `curr`
/// - `curr` 为 NaN 时视为无效样本, 保持 `prev`
///
/// `ratio` 越大响应越慢; 不检查 `ratio`, 传 0 时按浮点除零语义计算
pub fn recursive_filter(prev: f32, curr: f32, ratio: f32) -> f32 {
    if prev.is_nan() {
        return curr;
    }
    if curr.is_nan() {
        return prev;
    }
    curr / ratio + prev * (1.0 - 1.0 / ratio)
}

#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("滤波系数必须为正有限数, 实际为 {0}")]
pub struct InvalidRatio(pub f32);

/// 跨样本保持状态的速度滤波器
#[derive(Debug, Clone, Copy)]
pub struct SpeedFilter {
    value: f32,
    ratio: f32,
}

impl SpeedFilter {
    pub fn new(ratio: f32) -> Result<Self, InvalidRatio> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(InvalidRatio(ratio));
        }
        Ok(Self {
            value: f32::NAN,
            ratio,
        })
    }

    pub fn update(&mut self, sample: f32) -> f32 {
        self.value = recursive_filter(self.value, sample, self.ratio);
        self.value
    }

    /// 尚未收到有效样本时为 None
    pub fn value(&self) -> Option<f32> {
        (!self.value.is_nan()).then_some(self.value)
    }

    pub fn reset(&mut self) {
        self.value = f32::NAN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_rules() {
        assert_eq!(recursive_filter(f32::NAN, 10.0, 2.0), 10.0);
        assert_eq!(recursive_filter(10.0, f32::NAN, 2.0), 10.0);
        assert_eq!(recursive_filter(10.0, 20.0, 2.0), 15.0);
        assert!(recursive_filter(f32::NAN, f32::NAN, 2.0).is_nan());
    }

    #[test]
    fn test_ratio_one_tracks_input() {
        assert_eq!(recursive_filter(10.0, 42.0, 1.0), 42.0);
    }

    #[test]
    fn test_state_accumulates() {
        let mut f = SpeedFilter::new(2.0).unwrap();
        assert_eq!(f.value(), None);
        assert!(f.update(f32::NAN).is_nan());
        assert_eq!(f.value(), None);
        assert_eq!(f.update(10.0), 10.0);
        assert_eq!(f.update(20.0), 15.0);
        assert_eq!(f.update(f32::NAN), 15.0);
        assert_eq!(f.update(15.0), 15.0);
        f.reset();
        assert_eq!(f.value(), None);
    }

    #[test]
    fn test_invalid_ratio() {
        assert_eq!(SpeedFilter::new(0.0).unwrap_err(), InvalidRatio(0.0));
        assert!(SpeedFilter::new(-1.0).is_err());
        assert!(SpeedFilter::new(f32::NAN).is_err());
    }
}
