/// 流式会话
///
/// 组合状态存储、连接管理器和快照轮询器，是展示层使用的入口

use common::Result;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::SessionConfig;
use crate::poller::{HttpSnapshotFetcher, PollerHandle, RefreshTrigger, SnapshotFetcher, SnapshotPoller};
use crate::store::{SessionStateStore, StoreEvent, SubscriptionId};
use crate::ws::{ConnectionManager, ConnectionState, MessageRouter, Transport, WsTransport};

pub struct StreamingSession {
    store: SessionStateStore,
    connection: ConnectionManager,
    poller: PollerHandle,
    gap_fill: JoinHandle<()>,
}

impl StreamingSession {
    /// 使用 WebSocket 传输和 HTTP 拉取创建会话
    pub fn connect(config: &SessionConfig) -> Result<Self> {
        let transport = Arc::new(WsTransport::new(config.timing.request_timeout));
        let fetcher = Arc::new(HttpSnapshotFetcher::new(
            config.api_base.clone(),
            config.identity.session_id.clone(),
            config.identity.credential.clone(),
            config.timing.request_timeout,
        )?);
        Self::start(config, transport, fetcher)
    }

    /// 创建会话并启动轮询；流式连接需要显式 `open()`
    pub fn start(
        config: &SessionConfig,
        transport: Arc<dyn Transport>,
        fetcher: Arc<dyn SnapshotFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        info!("创建流式会话: session_id={}", config.identity.session_id);

        let store = SessionStateStore::new();
        let connection = ConnectionManager::spawn(
            config.connection_options(),
            transport,
            MessageRouter::new(store.clone()),
        );
        let poller =
            SnapshotPoller::new(fetcher, store.clone(), config.timing.poll_interval).spawn();
        let gap_fill = spawn_gap_fill(connection.watch_state(), poller.refresh_trigger());

        Ok(Self {
            store,
            connection,
            poller,
            gap_fill,
        })
    }

    pub fn store(&self) -> &SessionStateStore {
        &self.store
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&StoreEvent) + Send + Sync + 'static,
    {
        self.store.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }

    pub async fn open(&self) -> Result<()> {
        self.connection.open().await
    }

    pub async fn close(&self) -> Result<()> {
        self.connection.close().await
    }

    pub fn refresh_now(&self) {
        self.poller.refresh_now();
    }

    /// 销毁会话：关闭连接、停止轮询。返回后存储不再变化
    pub async fn shutdown(self) -> Result<()> {
        self.gap_fill.abort();
        let closed = self.connection.close().await;
        self.poller.stop().await;
        info!("流式会话已销毁");
        closed
    }
}

/// 每次进入 Connected 都立即拉取一次快照，补齐断线期间丢失的推送
fn spawn_gap_fill(
    mut state: watch::Receiver<ConnectionState>,
    trigger: RefreshTrigger,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            if *state.borrow_and_update() == ConnectionState::Connected {
                info!("连接已建立，立即拉取快照");
                trigger.fire();
            }
        }
    })
}
