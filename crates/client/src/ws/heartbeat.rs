/// 心跳调度
///
/// 连接建立后立即发送一次心跳，之后按固定间隔发送，不等待确认

use common::OutboundMessage;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

#[derive(Debug, Clone, Copy)]
pub struct HeartbeatScheduler {
    interval: Duration,
}

impl HeartbeatScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// 启动心跳任务，返回的句柄被丢弃时心跳停止
    pub fn start(&self, outbound: mpsc::UnboundedSender<OutboundMessage>) -> HeartbeatHandle {
        let period = self.interval;
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;

                if outbound.send(OutboundMessage::heartbeat()).is_err() {
                    debug!("出站通道已关闭，心跳任务结束");
                    break;
                }
                debug!("发送心跳");
            }
        });

        HeartbeatHandle { task }
    }
}

/// 心跳任务句柄
pub struct HeartbeatHandle {
    task: JoinHandle<()>,
}

impl HeartbeatHandle {
    #[cfg(test)]
    pub(crate) fn stop(self) {
        drop(self);
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
