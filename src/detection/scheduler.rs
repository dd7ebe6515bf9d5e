//! 单飞调度器 (Frame Scheduler)
//!
//! 检测比帧到达慢得多: 忙时直接丢弃新帧, 从不阻塞帧到达线程, 也不排队

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct FrameScheduler {
    busy: AtomicBool,
}

impl FrameScheduler {
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    /// 尝试接纳一帧; 已有检测在进行时返回 false
    pub fn try_admit(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// 释放忙标志, 每个被接纳的帧必须恰好调用一次
    pub fn release(&self) {
        self.busy.store(false, Ordering::Release);
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// 接纳一帧并返回守卫, 守卫析构时自动 release
    pub fn admit(self: &Arc<Self>) -> Option<AdmitGuard> {
        if self.try_admit() {
            Some(AdmitGuard {
                scheduler: Arc::clone(self),
            })
        } else {
            None
        }
    }
}

/// 在任何退出路径 (成功/失败/panic 展开) 上释放调度器
#[derive(Debug)]
pub struct AdmitGuard {
    scheduler: Arc<FrameScheduler>,
}

impl Drop for AdmitGuard {
    fn drop(&mut self) {
        self.scheduler.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_admit_is_dropped() {
        let scheduler = FrameScheduler::new();
        assert!(scheduler.try_admit());
        assert!(!scheduler.try_admit());
        scheduler.release();
        assert!(scheduler.try_admit());
    }

    #[test]
    fn test_guard_releases_on_drop() {
        let scheduler = Arc::new(FrameScheduler::new());
        let guard = scheduler.admit().unwrap();
        assert!(scheduler.is_busy());
        assert!(scheduler.admit().is_none());
        drop(guard);
        assert!(!scheduler.is_busy());
        assert!(scheduler.admit().is_some());
    }

    #[test]
    fn test_guard_releases_on_panic() {
        let scheduler = Arc::new(FrameScheduler::new());
        let guard = scheduler.admit().unwrap();
        let result = std::thread::spawn(move || {
            let _guard = guard;
            panic!("检测失败");
        })
        .join();
        assert!(result.is_err());
        assert!(!scheduler.is_busy());
    }

    #[test]
    fn test_only_one_winner_across_threads() {
        let scheduler = Arc::new(FrameScheduler::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = Arc::clone(&scheduler);
                std::thread::spawn(move || s.try_admit())
            })
            .collect();
        let admitted = handles
            .into_iter()
            .filter_map(|h| h.join().ok())
            .filter(|ok| *ok)
            .count();
        assert_eq!(admitted, 1);
    }
}
