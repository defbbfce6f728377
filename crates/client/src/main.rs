/// Insight Stream - 客户端
///
/// 连接到分析服务，订阅实时分析和干预告警并输出到日志

use insight_client::{Config, SessionStateStore, StoreEvent, StreamingSession};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenvy::dotenv().ok();
    let cfg = Config::from_env()?;

    // 初始化日志
    // 可以通过环境变量 RUST_LOG 设置日志级别，例如：
    // RUST_LOG=insight_client=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cfg.log_level));
    if cfg.log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::fmt()
            .json()
            .with_current_span(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_target(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_env_filter(filter)
            .init();
    }

    info!("🚀 启动 Insight Stream 客户端...");
    info!("✅ 配置加载成功");

    let session_config = cfg.session_config();
    info!("🎯 流式端点: {}", session_config.stream_endpoint());
    info!("📌 会话 ID: {}", session_config.identity.session_id);

    let session = StreamingSession::connect(&session_config)?;

    let store = session.store().clone();
    session.subscribe(move |event| log_event(&store, event));

    // 输出连接状态变化
    let mut state = session.watch_state();
    tokio::spawn(async move {
        while state.changed().await.is_ok() {
            let current = *state.borrow_and_update();
            info!("🔌 连接状态: {}", current);
        }
    });

    session.open().await?;

    tokio::signal::ctrl_c().await?;
    info!("收到退出信号，正在关闭...");
    session.shutdown().await?;

    Ok(())
}

fn log_event(store: &SessionStateStore, event: &StoreEvent) {
    match event {
        StoreEvent::AnalysisUpdated => {
            if let Some(analysis) = store.latest_analysis() {
                info!(
                    "📊 实时分析: state={}, engagement={:.2}, attention={:.2}, risk={:.2}, intervention={}",
                    analysis.emotional_state,
                    analysis.engagement_level,
                    analysis.attention_level,
                    analysis.overstimulation_risk,
                    analysis.intervention_needed
                );
            }
        }
        StoreEvent::AlertAdded { alert_id, .. } => {
            if let Some(alert) = store.alerts().into_iter().find(|a| &a.id == alert_id) {
                warn!("🚨 干预告警 [{:?}] {}: {}", alert.level, alert.intervention_type, alert.message);
            }
        }
        StoreEvent::DashboardUpdated => info!("仪表盘已更新"),
        StoreEvent::RecommendationsUpdated => info!("推荐已更新"),
        StoreEvent::ErrorReported(e) => error!("❌ {}", e),
        StoreEvent::ErrorCleared => info!("连接已恢复"),
    }
}
