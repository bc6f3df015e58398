//! 批量处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责资源的创建与回收：
//!
//! 1. **应用初始化**：加载输入表格，校验配置
//! 2. **恢复进度**：读取进度文件，全部完成时不启动浏览器
//! 3. **资源管理**：会话池、账本任务的创建与关闭
//! 4. **中断处理**：Ctrl-C / SIGTERM 触发取消，已完成的结果照常保存
//! 5. **结果输出**：写出结果表格，汇总统计

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::browser::ChromiumFactory;
use crate::config::Config;
use crate::infrastructure::{SessionFactory, SessionPool};
use crate::ledger::{CheckpointStore, Ledger, LedgerCounts, LedgerHandle};
use crate::models::{load_targets, Target};
use crate::orchestrator::scheduler::{RunSummary, Scheduler};
use crate::services::{Extractor, ResultsWriter};
use crate::utils::logging::{log_startup, log_targets_loaded, print_final_stats};

/// 一次批量运行的结果
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub summary: RunSummary,
    /// 账本累计的终态数量（含之前的运行）
    pub counts: LedgerCounts,
    pub unique_videos: usize,
    /// 写入结果表格的行数
    pub rows_written: usize,
}

/// 应用主结构
pub struct App {
    config: Config,
    targets: Vec<Target>,
}

impl App {
    /// 初始化应用：加载输入表格
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(&config);

        let targets = load_targets(&config.input_file)
            .await
            .with_context(|| format!("无法加载输入文件 {}", config.input_file))?;

        Ok(Self { config, targets })
    }

    /// 运行应用主逻辑
    pub async fn run(self) -> Result<BatchReport> {
        if self.targets.is_empty() {
            warn!("⚠️ 输入文件中没有目标");
        }

        let cancel = CancellationToken::new();
        let interrupt = tokio::spawn(listen_for_interrupt(cancel.clone()));

        let factory = Arc::new(ChromiumFactory::new(self.config.browser_settings()));
        let result = run_batch(factory, &self.config, self.targets, cancel).await;
        interrupt.abort();

        let report = result?;
        print_final_stats(
            &report.summary,
            report.counts,
            report.unique_videos,
            &self.config.output_file,
        );
        Ok(report)
    }
}

/// 用给定的会话工厂跑完一批目标
///
/// 顺序：恢复进度 → 启动会话池 → 启动账本任务 → 调度 → 关闭会话池
/// → 保存最终进度 → 写出结果表格。
pub async fn run_batch<F: SessionFactory>(
    factory: Arc<F>,
    config: &Config,
    targets: Vec<Target>,
    cancel: CancellationToken,
) -> Result<BatchReport> {
    let extractor = Arc::new(Extractor::new(config.extractor_policy())?);
    let store = CheckpointStore::new(config.checkpoint_path());
    let ledger = store.load();

    let (summary, ledger) = if all_done(&ledger, &targets) {
        info!("✓ 所有目标均已完成，直接输出结果");
        let mut summary = RunSummary {
            total_targets: targets.len(),
            ..RunSummary::default()
        };
        summary.already_done = ledger_hits(&ledger, &targets);
        summary.duplicates = targets.len() - summary.already_done;
        log_targets_loaded(summary.total_targets, summary.already_done, summary.duplicates, 0);
        (summary, ledger)
    } else {
        let pool = Arc::new(
            SessionPool::initialize(factory, config.pool_settings())
                .await
                .context("会话池初始化失败")?,
        );
        let (handle, ledger_task) =
            LedgerHandle::spawn(ledger, store.clone(), config.checkpoint_interval);

        let scheduler = Scheduler::new(
            pool.clone(),
            extractor,
            handle.clone(),
            config.scheduler_policy(),
            cancel,
        );
        let summary = scheduler.run(targets).await;
        drop(scheduler);

        pool.close_all().await;

        let closed = handle.shutdown().await.context("账本任务意外退出")?;
        if let Err(e) = ledger_task.await {
            error!("账本任务执行失败: {}", e);
        }
        match &closed.final_checkpoint {
            Ok(()) => info!("💾 最终进度已保存到 {}", store.path().display()),
            Err(e) => error!("❌ 保存最终进度失败: {}", e),
        }

        let stats = pool.stats();
        if stats.acquired != stats.settled {
            warn!(
                "⚠️ 会话租约未全部结束: 发出 {} / 结束 {}",
                stats.acquired, stats.settled
            );
        }
        (
            RunSummary {
                pool: stats,
                ..summary
            },
            closed.ledger,
        )
    };

    let rows_written = ResultsWriter::new(&config.output_file)
        .write(ledger.results())
        .with_context(|| format!("写入结果文件 {} 失败", config.output_file))?;

    Ok(BatchReport {
        summary,
        counts: ledger.counts(),
        unique_videos: ledger.unique_videos(),
        rows_written,
    })
}

fn all_done(ledger: &Ledger, targets: &[Target]) -> bool {
    targets.iter().all(|t| ledger.is_done(&t.key()))
}

/// 输入中在账本里已完成的不重复目标数
fn ledger_hits(ledger: &Ledger, targets: &[Target]) -> usize {
    let mut keys: Vec<String> = targets.iter().map(Target::key).collect();
    keys.sort_unstable();
    keys.dedup();
    keys.iter().filter(|k| ledger.is_done(k)).count()
}

async fn listen_for_interrupt(cancel: CancellationToken) {
    match shutdown_signal().await {
        Ok(name) => {
            warn!("⏹️ 收到 {}，正在停止并保存进度...", name);
            cancel.cancel();
        }
        Err(e) => error!("无法监听中断信号: {}", e),
    }
}

/// 等待 Ctrl-C 或 SIGTERM，返回信号名
#[cfg(unix)]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "Ctrl-C"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
}
