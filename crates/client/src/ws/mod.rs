/// WebSocket 流式连接模块
///
/// 连接生命周期、重连退避、心跳、入站消息路由

pub mod client;
pub mod handler;
pub mod heartbeat;
pub mod reconnect;
pub mod transport;

pub use client::{ConnectionManager, ConnectionOptions, ConnectionState};
pub use handler::{MessageRouter, RouteOutcome};
pub use heartbeat::{HeartbeatHandle, HeartbeatScheduler};
pub use reconnect::ReconnectPolicy;
pub use transport::{Transport, TransportLink, WsTransport};
