/// 会话状态存储
///
/// 保存最新分析、告警历史、仪表盘快照、推荐集合和错误槽位，
/// 每次变更后同步通知所有订阅者。只由消息路由器和快照轮询器写入。

pub mod alerts;

pub use alerts::AlertHistory;

use common::{Alert, DashboardSnapshot, Error, RecommendationSet, StreamingAnalysis};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// 订阅回调
pub type Subscriber = Arc<dyn Fn(&StoreEvent) + Send + Sync>;

/// 订阅 ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 存储变更事件
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    AnalysisUpdated,
    AlertAdded {
        alert_id: String,
        /// 被淘汰的最旧告警
        evicted: Option<String>,
    },
    DashboardUpdated,
    RecommendationsUpdated,
    ErrorReported(Error),
    ErrorCleared,
}

/// 会话数据
#[derive(Debug, Clone, Default)]
pub struct SessionData {
    pub analysis: Option<StreamingAnalysis>,
    pub alerts: AlertHistory,
    pub dashboard: Option<DashboardSnapshot>,
    pub recommendations: Option<RecommendationSet>,
    pub last_error: Option<Error>,
}

#[derive(Default)]
struct StoreInner {
    data: RwLock<SessionData>,
    subscribers: RwLock<Vec<(SubscriptionId, Subscriber)>>,
    next_id: AtomicU64,
}

/// 会话状态存储（可克隆，共享同一份数据）
#[derive(Clone, Default)]
pub struct SessionStateStore {
    inner: Arc<StoreInner>,
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

impl SessionStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ------------------------------------------------------------------
    // 订阅
    // ------------------------------------------------------------------

    /// 注册变更回调
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        write(&self.inner.subscribers).push((id, Arc::new(callback)));
        debug!("新增订阅: {:?}", id);
        id
    }

    /// 取消订阅，重复调用无副作用；返回本次是否真正移除
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = write(&self.inner.subscribers);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        read(&self.inner.subscribers).len()
    }

    // ------------------------------------------------------------------
    // 读取
    // ------------------------------------------------------------------

    pub fn latest_analysis(&self) -> Option<StreamingAnalysis> {
        read(&self.inner.data).analysis.clone()
    }

    /// 告警列表，最新在前
    pub fn alerts(&self) -> Vec<Alert> {
        read(&self.inner.data).alerts.to_vec()
    }

    pub fn dashboard(&self) -> Option<DashboardSnapshot> {
        read(&self.inner.data).dashboard.clone()
    }

    pub fn recommendations(&self) -> Option<RecommendationSet> {
        read(&self.inner.data).recommendations.clone()
    }

    pub fn last_error(&self) -> Option<Error> {
        read(&self.inner.data).last_error.clone()
    }

    /// 所有槽位的一致性快照
    pub fn snapshot(&self) -> SessionData {
        read(&self.inner.data).clone()
    }

    // ------------------------------------------------------------------
    // 写入（仅供路由器和轮询器使用）
    // ------------------------------------------------------------------

    pub(crate) fn replace_analysis(&self, analysis: StreamingAnalysis) {
        self.apply(|data| {
            data.analysis = Some(analysis);
            Some(StoreEvent::AnalysisUpdated)
        });
    }

    pub(crate) fn push_alert(&self, alert: Alert) {
        self.apply(|data| {
            let alert_id = alert.id.clone();
            let evicted = data.alerts.push(alert).map(|a| a.id);
            Some(StoreEvent::AlertAdded { alert_id, evicted })
        });
    }

    pub(crate) fn replace_dashboard(&self, dashboard: DashboardSnapshot) {
        self.apply(|data| {
            data.dashboard = Some(dashboard);
            Some(StoreEvent::DashboardUpdated)
        });
    }

    pub(crate) fn replace_recommendations(&self, recommendations: RecommendationSet) {
        self.apply(|data| {
            data.recommendations = Some(recommendations);
            Some(StoreEvent::RecommendationsUpdated)
        });
    }

    pub(crate) fn report_error(&self, error: Error) {
        self.apply(|data| {
            data.last_error = Some(error.clone());
            Some(StoreEvent::ErrorReported(error))
        });
    }

    /// 连接恢复后清除重连耗尽错误，其它错误保留
    pub(crate) fn clear_connectivity_error(&self) {
        self.apply(|data| match &data.last_error {
            Some(err) if err.is_connectivity() => {
                data.last_error = None;
                Some(StoreEvent::ErrorCleared)
            }
            _ => None,
        });
    }

    /// 在写锁内完成变更，释放锁之后再通知订阅者
    fn apply<F>(&self, mutate: F)
    where
        F: FnOnce(&mut SessionData) -> Option<StoreEvent>,
    {
        let event = {
            let mut data = write(&self.inner.data);
            mutate(&mut data)
        };

        if let Some(event) = event {
            self.notify(&event);
        }
    }

    fn notify(&self, event: &StoreEvent) {
        let subscribers: Vec<Subscriber> = read(&self.inner.subscribers)
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();

        for callback in subscribers {
            callback(event);
        }
    }
}
