/// 流式连接管理器
///
/// 单个驱动任务持有连接状态机：外部命令、连接结果、重连定时器都排入队列顺序处理，
/// 入站帧直接从当前链路读取。`close()` 之后旧链路被丢弃，迟到的回调无法再写入存储。

use common::{Error, Result};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::handler::MessageRouter;
use super::heartbeat::{HeartbeatHandle, HeartbeatScheduler};
use super::reconnect::ReconnectPolicy;
use super::transport::{Transport, TransportLink};

/// 连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Reconnecting { attempt } => write!(f, "reconnecting({})", attempt),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// 连接参数
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// 会话级端点
    pub endpoint: String,

    /// Bearer 凭证
    pub credential: String,

    pub policy: ReconnectPolicy,

    pub heartbeat_interval: Duration,
}

enum Command {
    Open(oneshot::Sender<()>),
    Close(oneshot::Sender<()>),
}

/// 驱动任务内部事件，带代数用于识别过期回调
enum Event {
    ConnectFinished {
        generation: u64,
        result: Result<TransportLink>,
    },
    ReconnectDue {
        generation: u64,
    },
}

/// 连接管理器句柄
///
/// 可克隆；所有句柄都被释放后驱动任务关闭连接并退出
#[derive(Clone)]
pub struct ConnectionManager {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionManager {
    /// 创建管理器并启动驱动任务，初始状态为 Disconnected
    pub fn spawn(
        options: ConnectionOptions,
        transport: Arc<dyn Transport>,
        router: MessageRouter,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

        let driver = Driver {
            heartbeat: HeartbeatScheduler::new(options.heartbeat_interval),
            options,
            transport,
            router,
            state: state_tx,
            events: event_tx,
            generation: 0,
            attempts: 0,
            link: None,
            heartbeat_task: None,
            connect_task: None,
            reconnect_timer: None,
        };
        tokio::spawn(driver.run(command_rx, event_rx));

        Self {
            commands: command_tx,
            state: state_rx,
        }
    }

    /// 建立连接；已连接或正在连接时无操作，其它状态下重置重连计数
    pub async fn open(&self) -> Result<()> {
        self.request(Command::Open).await
    }

    /// 主动关闭：取消重连、停止心跳、断开链路。返回时关闭已生效
    pub async fn close(&self) -> Result<()> {
        self.request(Command::Close).await
    }

    async fn request(&self, make: impl FnOnce(oneshot::Sender<()>) -> Command) -> Result<()> {
        let (ack_tx, ack_rx) = oneshot::channel();
        self.commands.send(make(ack_tx)).map_err(|_| Error::Shutdown)?;
        ack_rx.await.map_err(|_| Error::Shutdown)
    }

    /// 获取当前状态
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// 订阅状态变化
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }
}

struct Driver {
    options: ConnectionOptions,
    transport: Arc<dyn Transport>,
    router: MessageRouter,
    heartbeat: HeartbeatScheduler,
    state: watch::Sender<ConnectionState>,
    events: mpsc::UnboundedSender<Event>,

    /// 每次 open/close 递增，旧代数的事件直接丢弃
    generation: u64,

    /// 连续失败次数
    attempts: u32,

    link: Option<TransportLink>,
    heartbeat_task: Option<HeartbeatHandle>,
    connect_task: Option<JoinHandle<()>>,
    reconnect_timer: Option<JoinHandle<()>>,
}

impl Driver {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            tokio::select! {
                biased;
                command = commands.recv() => match command {
                    Some(Command::Open(ack)) => {
                        self.open();
                        let _ = ack.send(());
                    }
                    Some(Command::Close(ack)) => {
                        self.close();
                        let _ = ack.send(());
                    }
                    None => {
                        debug!("连接管理器句柄已全部释放，驱动任务退出");
                        self.close();
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
                frame = next_frame(&mut self.link) => self.handle_frame(frame),
            }
        }
    }

    fn current(&self) -> ConnectionState {
        *self.state.borrow()
    }

    fn set_state(&self, next: ConnectionState) {
        let previous = self.current();
        if previous != next {
            debug!("连接状态: {} -> {}", previous, next);
            self.state.send_replace(next);
        }
    }

    fn open(&mut self) {
        match self.current() {
            ConnectionState::Connected | ConnectionState::Connecting => {
                debug!("连接已存在，忽略 open");
                return;
            }
            _ => {}
        }

        self.teardown();
        self.attempts = 0;
        self.set_state(ConnectionState::Connecting);
        self.start_connect();
    }

    fn close(&mut self) {
        self.teardown();
        self.attempts = 0;
        if self.current() != ConnectionState::Disconnected {
            info!("连接已关闭");
            self.set_state(ConnectionState::Disconnected);
        }
    }

    /// 取消所有定时器和进行中的连接，丢弃当前链路
    fn teardown(&mut self) {
        self.generation += 1;

        if let Some(task) = self.connect_task.take() {
            task.abort();
        }
        if let Some(timer) = self.reconnect_timer.take() {
            timer.abort();
        }
        self.heartbeat_task = None;
        self.link = None;
    }

    fn start_connect(&mut self) {
        let generation = self.generation;
        let transport = self.transport.clone();
        let endpoint = self.options.endpoint.clone();
        let credential = self.options.credential.clone();
        let events = self.events.clone();

        info!("尝试连接到: {}", endpoint);
        self.connect_task = Some(tokio::spawn(async move {
            let result = transport.connect(&endpoint, &credential).await;
            let _ = events.send(Event::ConnectFinished { generation, result });
        }));
    }

    fn handle_event(&mut self, event: Event) {
        match event {
            Event::ConnectFinished { generation, result } => {
                if generation != self.generation {
                    debug!("丢弃过期的连接结果: generation={}", generation);
                    return;
                }
                self.connect_task = None;

                match result {
                    Ok(link) => self.on_link_up(link),
                    Err(e) => {
                        warn!("连接失败: {}", e);
                        self.schedule_reconnect();
                    }
                }
            }
            Event::ReconnectDue { generation } => {
                if generation != self.generation {
                    debug!("丢弃过期的重连定时器: generation={}", generation);
                    return;
                }
                self.reconnect_timer = None;

                if let ConnectionState::Reconnecting { attempt } = self.current() {
                    info!("开始第 {} 次重连", attempt);
                    self.start_connect();
                }
            }
        }
    }

    fn on_link_up(&mut self, link: TransportLink) {
        self.attempts = 0;
        self.heartbeat_task = Some(self.heartbeat.start(link.outbound.clone()));
        self.link = Some(link);
        self.router.connection_restored();
        self.set_state(ConnectionState::Connected);
        info!("✅ 流式连接已建立");
    }

    fn handle_frame(&mut self, frame: Option<Result<String>>) {
        match frame {
            Some(Ok(text)) => {
                self.router.route(&text);
            }
            Some(Err(e)) => {
                error!("连接错误: {}", e);
                self.on_link_down();
            }
            None => {
                warn!("连接已断开");
                self.on_link_down();
            }
        }
    }

    fn on_link_down(&mut self) {
        self.heartbeat_task = None;
        self.link = None;
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        if !self.options.policy.should_retry(self.attempts) {
            error!("重连次数已耗尽 ({} 次)，停止自动重连", self.attempts);
            self.router.report_error(Error::ExhaustedRetries {
                attempts: self.attempts,
            });
            self.set_state(ConnectionState::Failed);
            return;
        }

        let delay = self.options.policy.delay(self.attempts);
        self.attempts += 1;
        self.set_state(ConnectionState::Reconnecting {
            attempt: self.attempts,
        });
        warn!("{:?} 后进行第 {} 次重连...", delay, self.attempts);

        let generation = self.generation;
        let events = self.events.clone();
        self.reconnect_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = events.send(Event::ReconnectDue { generation });
        }));
    }
}

/// 读取当前链路的下一帧；没有链路时永远挂起
async fn next_frame(link: &mut Option<TransportLink>) -> Option<Result<String>> {
    match link {
        Some(link) => link.inbound.recv().await,
        None => std::future::pending().await,
    }
}
