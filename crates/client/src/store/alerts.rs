/// 告警历史（定长环形缓冲，最新在前）

use common::models::constants::ALERT_HISTORY_CAPACITY;
use common::Alert;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct AlertHistory {
    entries: VecDeque<Alert>,
    capacity: usize,
}

impl AlertHistory {
    pub fn new() -> Self {
        Self::with_capacity(ALERT_HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// 插入最新告警，满时淘汰最旧的一条并返回
    pub fn push(&mut self, alert: Alert) -> Option<Alert> {
        if self.capacity == 0 {
            return Some(alert);
        }

        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_back()
        } else {
            None
        };
        self.entries.push_front(alert);
        evicted
    }

    /// 按最新在前的顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.entries.iter()
    }

    pub fn latest(&self) -> Option<&Alert> {
        self.entries.front()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn to_vec(&self) -> Vec<Alert> {
        self.entries.iter().cloned().collect()
    }
}

impl Default for AlertHistory {
    fn default() -> Self {
        Self::new()
    }
}
