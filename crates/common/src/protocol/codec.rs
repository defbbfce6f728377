/// 消息编解码辅助函数

use tokio_tungstenite::tungstenite::Message as WsMessage;

use super::OutboundMessage;
use crate::errors::{Error, Result};

/// 解码后的 WebSocket 帧
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// 文本数据帧
    Text(String),
    /// 对端关闭连接，附带关闭原因
    Closed(Option<String>),
    /// Ping/Pong 等控制帧
    Control,
}

/// 编码出站消息为 WebSocket 消息
pub fn encode(msg: &OutboundMessage) -> Result<WsMessage> {
    Ok(WsMessage::Text(msg.to_json()?))
}

/// 解码 WebSocket 消息
pub fn decode(ws_msg: WsMessage) -> Result<Frame> {
    match ws_msg {
        WsMessage::Text(text) => Ok(Frame::Text(text)),
        WsMessage::Binary(data) => String::from_utf8(data)
            .map(Frame::Text)
            .map_err(|e| Error::Decode(format!("二进制帧不是合法 UTF-8: {}", e))),
        WsMessage::Close(frame) => Ok(Frame::Closed(frame.map(|f| f.reason.to_string()))),
        _ => Ok(Frame::Control),
    }
}
