/// 日志工具模块
///
/// 提供启动横幅、进度与统计信息的输出辅助函数
use std::time::Duration;

use tracing::info;

use crate::config::Config;
use crate::ledger::LedgerCounts;
use crate::orchestrator::RunSummary;

/// 记录程序启动信息
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 并发视频 ID 抽取模式");
    info!(
        "启动时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("📄 输入文件: {}", config.input_file);
    info!("💾 进度文件: {}", config.checkpoint_path());
    info!(
        "📊 工作者: {} | 会话池: {} | 间隔: {}-{}ms | 限流冷却: {}ms",
        config.max_workers,
        config.pool_size,
        config.pacing_min_ms,
        config.pacing_max_ms,
        config.rate_limit_cooldown_ms
    );
    info!("{}", "=".repeat(60));
}

/// 记录目标加载信息
pub fn log_targets_loaded(total: usize, done: usize, duplicates: usize, pending: usize) {
    info!("✓ 输入共 {} 个目标", total);
    if done > 0 {
        info!("⏭️ 跳过 {} 个已完成目标", done);
    }
    if duplicates > 0 {
        info!("⏭️ 跳过 {} 个重复目标", duplicates);
    }
    info!("📋 本次待处理: {} 个\n", pending);
}

/// 记录进度：完成数、百分比、速率与预计剩余时间
pub fn log_progress(completed: usize, total: usize, found: usize, elapsed: Duration) {
    let percent = if total == 0 {
        100.0
    } else {
        completed as f64 * 100.0 / total as f64
    };
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { completed as f64 / secs } else { 0.0 };
    let eta = if rate > 0.0 {
        Duration::from_secs_f64(total.saturating_sub(completed) as f64 / rate)
    } else {
        Duration::ZERO
    };

    info!(
        "📈 进度 {}/{} ({:.1}%) | 找到 {} | {:.2} 个/秒 | 预计剩余 {}",
        completed,
        total,
        percent,
        found,
        rate,
        format_duration(eta)
    );
}

/// 格式化时长：`1h02m03s` / `2m05s` / `7s`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    if h > 0 {
        format!("{}h{:02}m{:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m{:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// 打印最终统计信息
pub fn print_final_stats(
    summary: &RunSummary,
    counts: LedgerCounts,
    unique_videos: usize,
    output_path: &str,
) {
    info!("\n{}", "=".repeat(60));
    if summary.interrupted {
        info!("⏹️ 已中断，进度已保存");
    } else {
        info!("📊 全部处理完成统计");
    }
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("本次尝试: {}/{}", summary.completed, summary.pending);
    info!("✅ 找到视频: {}", summary.found);
    info!("➖ 没有视频: {}", summary.not_found);
    info!("⚠️ 可疑页面: {}", summary.suspicious);
    info!("🛑 被限流: {}", summary.rate_limited);
    info!("❌ 暂时性错误: {}", summary.transient);
    if summary.abandoned > 0 {
        info!("⏹️ 中断放弃: {}", summary.abandoned);
    }
    info!("成功率: {:.1}%", summary.success_rate());
    info!(
        "耗时: {} | 平均每个目标: {:.2}s",
        format_duration(summary.elapsed),
        summary.average_per_target().as_secs_f64()
    );
    info!("{}", "─".repeat(60));
    info!(
        "账本累计: {} 个目标 (找到 {} / 没有 {} / 可疑 {}) | 不重复视频: {}",
        counts.total(),
        counts.found,
        counts.not_found,
        counts.suspicious,
        unique_videos
    );
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_path);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_durations() {
        assert_eq!(format_duration(Duration::from_secs(7)), "7s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m05s");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1h02m03s");
    }

    #[test]
    fn truncates_by_chars() {
        assert_eq!(truncate_text("导航到页面失败", 3), "导航到...");
        assert_eq!(truncate_text("ok", 10), "ok");
    }
}
