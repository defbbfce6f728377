/// Insight Stream - 流式客户端
///
/// 维护到分析服务的长连接，断线自动重连，推送消息写入会话状态存储，
/// 并通过 REST 定时轮询兜底

pub mod config;
pub mod poller;
pub mod session;
pub mod store;
pub mod ws;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, SessionConfig, SessionIdentity, Timing};
pub use poller::{HttpSnapshotFetcher, SnapshotFetcher, SnapshotPoller};
pub use session::StreamingSession;
pub use store::{SessionStateStore, StoreEvent, SubscriptionId};
pub use ws::{ConnectionManager, ConnectionState, MessageRouter, ReconnectPolicy, Transport};
