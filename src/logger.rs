//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 初始化全局日志
///
/// 设置了 `RUST_LOG` 时以其为准；否则默认 info，`verbose` 时为 debug。
pub fn init(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,{}={}", env!("CARGO_CRATE_NAME"), default_level))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
