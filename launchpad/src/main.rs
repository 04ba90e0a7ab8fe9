use std::path::PathBuf;

use anyhow::Context;
use launchpad::logging::init_logger;
use launchpad::{PartialConfig, Server};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 设置环境 (dotenv, 日志)
    dotenv::dotenv().ok();
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into());
    init_logger(&log_level, false, None)?;

    tracing::info!("Launchpad starting...");

    // 2. 加载配置
    let options = PartialConfig::from_env();
    let routes_dir = std::env::var("ROUTES_DIR").ok().map(PathBuf::from);

    // 3. 组装功能
    let mut server = Server::new(options);
    server.configure().await.context("configure failed")?;

    if let Some(dir) = routes_dir {
        server
            .register_routes_from_directory(&dir)
            .with_context(|| format!("failed to load routes from {}", dir.display()))?;
    }

    // 4. 启动 HTTP 服务器，Ctrl-C 优雅关闭
    server.start_server().await.context("start failed")?;

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received");

    server.stop().await?;
    Ok(())
}
