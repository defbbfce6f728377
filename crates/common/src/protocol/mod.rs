/// 流式会话协议模块
///
/// 入站推送消息、出站心跳消息以及 WebSocket 帧编解码

pub mod codec;
pub mod message;

pub use codec::Frame;
pub use message::{tags, InboundMessage, OutboundMessage};
