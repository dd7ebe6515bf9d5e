//! 最近识别历史 (History Ring)
//!
//! 固定容量, 最新在前, 相邻元素不重复

use std::collections::VecDeque;

/// 历史容量
pub const HISTORY_CAPACITY: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct HistoryRing {
    labels: VecDeque<String>,
}

impl HistoryRing {
    pub fn new() -> Self {
        Self {
            labels: VecDeque::with_capacity(HISTORY_CAPACITY + 1),
        }
    }

    /// 最新的一条
    pub fn head(&self) -> Option<&str> {
        self.labels.front().map(String::as_str)
    }

    /// 压入新标签, 返回是否真的改变了历史
    ///
    /// 与当前最新一条相同时不做任何事; 超出容量时淘汰最旧的一条
    pub fn push(&mut self, label: &str) -> bool {
        if self.head() == Some(label) {
            return false;
        }
        self.labels.push_front(label.to_string());
        self.labels.truncate(HISTORY_CAPACITY);
        true
    }

    /// 最新在前的快照
    pub fn snapshot(&self) -> Vec<String> {
        self.labels.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}
