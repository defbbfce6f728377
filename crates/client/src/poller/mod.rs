/// 快照轮询
///
/// 与连接状态无关，按固定间隔通过 REST 拉取仪表盘和推荐数据并整体替换存储槽位；
/// 拉取失败时保留旧数据

pub mod fetcher;

pub use fetcher::{HttpSnapshotFetcher, SnapshotFetcher};

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::store::SessionStateStore;

pub struct SnapshotPoller {
    fetcher: Arc<dyn SnapshotFetcher>,
    store: SessionStateStore,
    interval: Duration,
}

impl SnapshotPoller {
    pub fn new(
        fetcher: Arc<dyn SnapshotFetcher>,
        store: SessionStateStore,
        interval: Duration,
    ) -> Self {
        Self {
            fetcher,
            store,
            interval,
        }
    }

    /// 执行一轮拉取
    pub async fn poll_once(&self) {
        let (dashboard, recommendations) = tokio::join!(
            self.fetcher.fetch_dashboard(),
            self.fetcher.fetch_recommendations()
        );

        match dashboard {
            Ok(dashboard) => self.store.replace_dashboard(dashboard),
            Err(e) => warn!("拉取仪表盘失败，保留旧数据: {}", e),
        }

        match recommendations {
            Ok(recommendations) => self.store.replace_recommendations(recommendations),
            Err(e) => warn!("拉取推荐失败，保留旧数据: {}", e),
        }
    }

    /// 启动后台轮询，首轮立即执行
    pub fn spawn(self) -> PollerHandle {
        let cancel = CancellationToken::new();
        let refresh = Arc::new(Notify::new());
        let task = tokio::spawn(self.run(cancel.clone(), refresh.clone()));

        PollerHandle {
            cancel,
            refresh: RefreshTrigger(refresh),
            task: Some(task),
        }
    }

    async fn run(self, cancel: CancellationToken, refresh: Arc<Notify>) {
        info!("启动快照轮询，间隔 {:?}", self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
                _ = refresh.notified() => {
                    debug!("立即刷新快照");
                    ticker.reset();
                }
            }

            // 取消时丢弃进行中的拉取，不再写入存储
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = self.poll_once() => {}
            }
        }

        debug!("快照轮询已停止");
    }
}

/// 触发一次立即刷新
#[derive(Clone)]
pub struct RefreshTrigger(Arc<Notify>);

impl RefreshTrigger {
    pub fn fire(&self) {
        self.0.notify_one();
    }
}

/// 轮询任务句柄，被丢弃时停止轮询
pub struct PollerHandle {
    cancel: CancellationToken,
    refresh: RefreshTrigger,
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    pub fn refresh_now(&self) {
        self.refresh.fire();
    }

    pub fn refresh_trigger(&self) -> RefreshTrigger {
        self.refresh.clone()
    }

    /// 停止轮询并等待任务退出，返回后不会再写入存储
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
