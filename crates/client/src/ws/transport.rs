/// 流式传输层
///
/// `Transport` 负责建立一条链路，链路由一对通道表示：
/// 出站消息通道和入站文本帧通道。入站通道关闭即表示链路断开。

use async_trait::async_trait;
use common::protocol::{codec, Frame};
use common::{Error, OutboundMessage, Result};
use futures_util::{Sink, SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

/// 一条已建立的链路
pub struct TransportLink {
    /// 出站消息
    pub outbound: mpsc::UnboundedSender<OutboundMessage>,

    /// 入站文本帧；`Err` 表示传输错误，通道关闭表示对端断开
    pub inbound: mpsc::UnboundedReceiver<Result<String>>,

    /// 链路被丢弃时取消底层收发任务
    _guard: Option<DropGuard>,
}

impl TransportLink {
    pub fn new(
        outbound: mpsc::UnboundedSender<OutboundMessage>,
        inbound: mpsc::UnboundedReceiver<Result<String>>,
    ) -> Self {
        Self {
            outbound,
            inbound,
            _guard: None,
        }
    }

    pub fn with_guard(mut self, guard: DropGuard) -> Self {
        self._guard = Some(guard);
        self
    }
}

/// 传输层抽象
#[async_trait]
pub trait Transport: Send + Sync {
    /// 建立到 `endpoint` 的链路，凭证以 Bearer 方式携带
    async fn connect(&self, endpoint: &str, credential: &str) -> Result<TransportLink>;
}

/// 基于 WebSocket 的传输实现
#[derive(Debug, Clone)]
pub struct WsTransport {
    connect_timeout: Duration,
}

impl WsTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn connect(&self, endpoint: &str, credential: &str) -> Result<TransportLink> {
        let mut request = endpoint
            .into_client_request()
            .map_err(|e| Error::Transport(format!("无效的端点地址 {}: {}", endpoint, e)))?;

        if !credential.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", credential))
                .map_err(|e| Error::Transport(format!("无效的凭证: {}", e)))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (ws_stream, _) = tokio::time::timeout(self.connect_timeout, connect_async(request))
            .await
            .map_err(|_| Error::Transport(format!("连接超时: {}", endpoint)))?
            .map_err(|e| Error::Transport(e.to_string()))?;
        info!("✅ WebSocket 连接成功: {}", endpoint);

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundMessage>();
        let (in_tx, in_rx) = mpsc::unbounded_channel::<Result<String>>();
        let cancel = CancellationToken::new();

        // 启动发送任务
        let send_cancel = cancel.clone();
        let close_timeout = self.connect_timeout;
        tokio::spawn(async move {
            loop {
                let msg = tokio::select! {
                    _ = send_cancel.cancelled() => break,
                    msg = out_rx.recv() => match msg {
                        Some(msg) => msg,
                        None => break,
                    },
                };

                let frame = match codec::encode(&msg) {
                    Ok(frame) => frame,
                    Err(e) => {
                        error!("序列化消息失败: {}", e);
                        continue;
                    }
                };

                if let Err(e) = ws_sender.send(frame).await {
                    error!("发送消息失败: {}", e);
                    break;
                }
            }

            close_sink(&mut ws_sender, close_timeout).await;
            send_cancel.cancel();
            debug!("发送任务结束");
        });

        // 启动接收任务
        let recv_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    _ = recv_cancel.cancelled() => break,
                    next = ws_receiver.next() => next,
                };

                match next {
                    Some(Ok(msg)) => match codec::decode(msg) {
                        Ok(Frame::Text(text)) => {
                            if in_tx.send(Ok(text)).is_err() {
                                break;
                            }
                        }
                        Ok(Frame::Closed(reason)) => {
                            warn!("收到连接关闭消息: {:?}", reason);
                            break;
                        }
                        Ok(Frame::Control) => {}
                        Err(e) => warn!("丢弃无法解码的帧: {}", e),
                    },
                    Some(Err(e)) => {
                        error!("接收消息错误: {}", e);
                        let _ = in_tx.send(Err(Error::Transport(e.to_string())));
                        break;
                    }
                    None => break,
                }
            }

            recv_cancel.cancel();
            debug!("接收任务结束");
        });

        Ok(TransportLink::new(out_tx, in_rx).with_guard(cancel.drop_guard()))
    }
}

/// 发送关闭帧；对端无响应时超过期限即放弃，返回是否正常关闭
async fn close_sink<S>(sink: &mut S, limit: Duration) -> bool
where
    S: Sink<WsMessage> + Unpin,
{
    match tokio::time::timeout(limit, sink.close()).await {
        Ok(_) => true,
        Err(_) => {
            warn!("关闭连接超时 ({:?})，放弃等待对端", limit);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    /// 关闭永远挂起的写端
    struct StalledSink;

    impl Sink<WsMessage> for StalledSink {
        type Error = Error;

        fn poll_ready(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn start_send(self: Pin<&mut Self>, _: WsMessage) -> Result<()> {
            Ok(())
        }

        fn poll_flush(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_close(self: Pin<&mut Self>, _: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Pending
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_gives_up_on_unresponsive_peer() {
        let started = tokio::time::Instant::now();
        let closed = close_sink(&mut StalledSink, Duration::from_secs(10)).await;

        assert!(!closed);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_close_completes_on_responsive_sink() {
        let mut sink = futures_util::sink::drain::<WsMessage>().sink_map_err(|_| Error::Shutdown);
        assert!(close_sink(&mut sink, Duration::from_secs(10)).await);
    }

    #[tokio::test]
    async fn test_invalid_endpoint_is_transport_error() {
        let transport = WsTransport::new(Duration::from_secs(1));
        let err = transport.connect("not a url", "token").await.err().unwrap();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_refused_connection_is_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = WsTransport::new(Duration::from_secs(2));
        let endpoint = format!("ws://{}/ws/analysis/s-1", addr);
        let err = transport.connect(&endpoint, "").await.err().unwrap();
        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_round_trip_against_local_server() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

            let heartbeat = ws.next().await.unwrap().unwrap();
            assert!(heartbeat.to_text().unwrap().contains("heartbeat"));

            ws.send(tokio_tungstenite::tungstenite::Message::Text(
                r#"{"type":"heartbeat_response"}"#.to_string(),
            ))
            .await
            .unwrap();
            ws.close(None).await.unwrap();
        });

        let transport = WsTransport::new(Duration::from_secs(2));
        let endpoint = format!("ws://{}/ws/analysis/s-1", addr);
        let mut link = transport.connect(&endpoint, "secret").await.unwrap();

        link.outbound.send(OutboundMessage::heartbeat()).unwrap();
        let frame = link.inbound.recv().await.unwrap().unwrap();
        assert_eq!(frame, r#"{"type":"heartbeat_response"}"#);

        // 服务端关闭后入站通道结束
        assert!(link.inbound.recv().await.is_none());
        server.await.unwrap();
    }
}
