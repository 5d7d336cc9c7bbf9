use link_changer_rust::{config::AppConfig, logging, server, AppState};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load_or_default("config/app.toml").await;
    let _log_guard = logging::init_logging(&config.log);

    info!("启动网盘转链服务 v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "账号配置: 夸克={}, 百度={}, 推送={}",
        if config.quark.cookie.is_empty() { "未配置" } else { "已配置" },
        if config.baidu.cookie.is_empty() { "未配置" } else { "已配置" },
        if config.notify.has_any() { "已启用" } else { "未启用" },
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::new(config);
    let app = server::router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("服务监听于 http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
