use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::signal;
use tracing::{error, info, warn};

use task_scheduler::{Application, ShutdownManager};
use task_scheduler_core::{config::AppConfig, init_logging};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("task-scheduler")
        .version(env!("CARGO_PKG_VERSION"))
        .about("周期任务调度系统")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径，未指定时依次查找默认位置"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别，覆盖配置文件")
                .value_parser(["trace", "debug", "info", "warn", "error"]),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式，覆盖配置文件")
                .value_parser(["json", "pretty"]),
        )
        .arg(
            Arg::new("env")
                .short('e')
                .long("env")
                .value_name("NAME")
                .help("队列命名空间，覆盖配置文件和 APP_ENV"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config");
    let mut config = AppConfig::load(config_path.map(String::as_str))
        .with_context(|| format!("加载配置失败: {config_path:?}"))?;

    if let Some(level) = matches.get_one::<String>("log-level") {
        config.observability.log_level = level.clone();
    }
    if let Some(format) = matches.get_one::<String>("log-format") {
        config.observability.log_format = format.clone();
    }
    if let Some(environment) = matches.get_one::<String>("env") {
        config.scheduler.environment = environment.clone();
        config.validate()?;
    }

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    )?;

    info!("启动周期任务调度系统");
    info!("队列命名空间: {}", config.scheduler.environment);

    if config.observability.metrics_enabled {
        let address: std::net::SocketAddr = config
            .observability
            .metrics_bind_address
            .parse()
            .context("无效的指标绑定地址")?;
        PrometheusBuilder::new()
            .with_http_listener(address)
            .install()
            .context("安装Prometheus指标导出器失败")?;
        info!("Prometheus指标导出器监听在 http://{address}/metrics");
    }

    let app = Application::new(config).await?;
    let shutdown_manager = ShutdownManager::new();

    let shutdown_rx = shutdown_manager.subscribe().await;
    let app_handle = tokio::spawn(async move {
        if let Err(e) = app.run(shutdown_rx).await {
            error!("应用运行失败: {e:#}");
        }
    });

    wait_for_shutdown_signal().await;
    info!("收到关闭信号，开始优雅关闭...");
    shutdown_manager.shutdown().await;

    match tokio::time::timeout(Duration::from_secs(30), app_handle).await {
        Ok(Ok(())) => info!("应用已优雅关闭"),
        Ok(Err(e)) => error!("应用关闭时发生错误: {e}"),
        Err(_) => warn!("应用关闭超时，强制退出"),
    }

    info!("周期任务调度系统已退出");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("安装Ctrl+C信号处理器失败");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("安装SIGTERM信号处理器失败")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("收到Ctrl+C信号");
        },
        _ = terminate => {
            info!("收到SIGTERM信号");
        },
    }
}
