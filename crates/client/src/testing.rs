/// 测试辅助：内存传输、可控的快照拉取器和样例数据

use async_trait::async_trait;
use chrono::Utc;
use common::{
    Alert, AlertLevel, DashboardSnapshot, Error, OutboundMessage, RecommendationSet, Result,
    StreamingAnalysis,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::poller::SnapshotFetcher;
use crate::ws::{Transport, TransportLink};

pub(crate) fn sample_analysis(engagement: f64) -> StreamingAnalysis {
    StreamingAnalysis {
        analysis_id: format!("a-{}", engagement),
        session_id: "s-1".to_string(),
        timestamp: Utc::now(),
        emotional_state: "calm".to_string(),
        engagement_level: engagement,
        attention_level: 0.6,
        overstimulation_risk: 0.1,
        intervention_needed: false,
        confidence_score: 0.9,
        insights: vec!["steady".to_string()],
        recommendations: Vec::new(),
    }
}

pub(crate) fn sample_alert(id: &str) -> Alert {
    Alert {
        id: id.to_string(),
        session_id: "s-1".to_string(),
        timestamp: Utc::now(),
        level: AlertLevel::High,
        intervention_type: "sensory_break".to_string(),
        message: "overstimulation rising".to_string(),
        auto_resolved: false,
    }
}

pub(crate) fn analysis_frame(engagement: f64) -> String {
    json!({ "type": "streaming_analysis", "data": sample_analysis(engagement) }).to_string()
}

pub(crate) fn alert_frame(id: &str) -> String {
    json!({ "type": "intervention_alert", "data": sample_alert(id) }).to_string()
}

/// 测试端持有的链路另一头
pub(crate) struct MockPeer {
    pub to_client: mpsc::UnboundedSender<Result<String>>,
    pub from_client: mpsc::UnboundedReceiver<OutboundMessage>,
}

/// 内存传输，记录每次连接请求
pub(crate) struct MockTransport {
    accept: AtomicBool,
    stall: AtomicBool,
    requests: Mutex<Vec<(String, String, Instant)>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

impl MockTransport {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Arc::new(Self {
            accept: AtomicBool::new(true),
            stall: AtomicBool::new(false),
            requests: Mutex::new(Vec::new()),
            peers: tx,
        });
        (transport, rx)
    }

    pub fn set_accept(&self, accept: bool) {
        self.accept.store(accept, Ordering::SeqCst);
    }

    /// 之后的连接请求永不完成
    pub fn set_stall(&self, stall: bool) {
        self.stall.store(stall, Ordering::SeqCst);
    }

    pub fn connect_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn connect_times(&self) -> Vec<Instant> {
        self.requests.lock().unwrap().iter().map(|(_, _, at)| *at).collect()
    }

    pub fn last_request(&self) -> Option<(String, String)> {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|(endpoint, credential, _)| (endpoint.clone(), credential.clone()))
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, endpoint: &str, credential: &str) -> Result<TransportLink> {
        self.requests.lock().unwrap().push((
            endpoint.to_string(),
            credential.to_string(),
            Instant::now(),
        ));

        if self.stall.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }

        if !self.accept.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection refused".to_string()));
        }

        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let _ = self.peers.send(MockPeer {
            to_client: in_tx,
            from_client: out_rx,
        });
        Ok(TransportLink::new(out_tx, in_rx))
    }
}

/// 可控的快照拉取器
pub(crate) struct MockFetcher {
    dashboard: Mutex<Result<DashboardSnapshot>>,
    recommendations: Mutex<Result<RecommendationSet>>,
    calls: AtomicUsize,
}

impl MockFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dashboard: Mutex::new(Err(Error::Fetch("unavailable".to_string()))),
            recommendations: Mutex::new(Err(Error::Fetch("unavailable".to_string()))),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_dashboard(&self, result: Result<DashboardSnapshot>) {
        *self.dashboard.lock().unwrap() = result;
    }

    pub fn set_recommendations(&self, result: Result<RecommendationSet>) {
        *self.recommendations.lock().unwrap() = result;
    }

    /// 仪表盘拉取次数（每轮轮询一次）
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotFetcher for MockFetcher {
    async fn fetch_dashboard(&self) -> Result<DashboardSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.dashboard.lock().unwrap().clone()
    }

    async fn fetch_recommendations(&self) -> Result<RecommendationSet> {
        self.recommendations.lock().unwrap().clone()
    }
}
