//! 工具函数模块

use tracing_subscriber::EnvFilter;

/// 初始化日志输出
///
/// 优先使用 `RUST_LOG` 环境变量，未设置时使用 `default_filter`（如 `"info"`、
/// `"flare_cloudmap_resolver=debug"`）。已经安装过全局 subscriber 时返回 `false`
///
/// # 示例
/// ```rust,no_run
/// use flare_cloudmap_resolver::utils::init_tracing;
///
/// init_tracing("info,flare_cloudmap_resolver=debug");
/// ```
pub fn init_tracing(default_filter: &str) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok()
}
