//! 工作者调度器 - 编排层
//!
//! W 个并发尝试由 Semaphore 限制，每个尝试：
//!
//! ```text
//! 等待退避闸门 → 获取会话 → 抽取 → 归还 / 销毁会话 → 写入账本 → 随机间隔
//! ```
//!
//! 任一尝试遇到限流会触发全局退避；中断时不再派发新目标，
//! 进行中的尝试被放弃，其会话被销毁，目标不写入账本。

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::infrastructure::{PoolStats, SessionFactory, SessionPool};
use crate::ledger::{LedgerHandle, RecordStatus};
use crate::models::{AttemptOutcome, Target};
use crate::services::{BackoffGate, Extractor, Pacer};
use crate::utils::logging::{log_progress, log_targets_loaded, truncate_text};

/// 调度策略
#[derive(Debug, Clone)]
pub struct SchedulerPolicy {
    /// 同时进行的尝试数 W
    pub max_workers: usize,
    pub pacing_min: Duration,
    pub pacing_max: Duration,
    /// 限流后的全局冷却时间
    pub cooldown: Duration,
    /// 每完成多少次尝试输出一次进度
    pub progress_interval: usize,
}

/// 一次运行的统计
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// 输入中的目标数
    pub total_targets: usize,
    /// 账本中已完成而跳过的目标数
    pub already_done: usize,
    /// 输入中重复出现而跳过的目标数
    pub duplicates: usize,
    /// 本次待处理的目标数
    pub pending: usize,
    /// 完成的尝试数
    pub completed: usize,
    pub found: usize,
    pub not_found: usize,
    pub suspicious: usize,
    pub rate_limited: usize,
    pub transient: usize,
    /// 因中断而放弃的尝试数
    pub abandoned: usize,
    pub interrupted: bool,
    pub elapsed: Duration,
    pub pool: PoolStats,
}

impl RunSummary {
    /// 本次尝试中找到视频的比例（百分比）
    pub fn success_rate(&self) -> f64 {
        if self.completed == 0 {
            return 0.0;
        }
        self.found as f64 * 100.0 / self.completed as f64
    }

    pub fn average_per_target(&self) -> Duration {
        if self.completed == 0 {
            return Duration::ZERO;
        }
        self.elapsed / self.completed as u32
    }
}

#[derive(Debug, Default)]
struct RunCounters {
    completed: AtomicUsize,
    found: AtomicUsize,
    not_found: AtomicUsize,
    suspicious: AtomicUsize,
    rate_limited: AtomicUsize,
    transient: AtomicUsize,
    abandoned: AtomicUsize,
}

impl RunCounters {
    /// 记录一次完成的尝试，返回已完成的总数
    fn observe(&self, outcome: &AttemptOutcome) -> usize {
        let counter = match outcome {
            AttemptOutcome::Found(_) => &self.found,
            AttemptOutcome::NotFound => &self.not_found,
            AttemptOutcome::Suspicious(_) => &self.suspicious,
            AttemptOutcome::RateLimited(_) => &self.rate_limited,
            AttemptOutcome::TransientError(_) => &self.transient,
        };
        counter.fetch_add(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// 所有尝试共享的状态
struct Shared<F: SessionFactory> {
    pool: Arc<SessionPool<F>>,
    extractor: Arc<Extractor>,
    ledger: LedgerHandle,
    gate: BackoffGate,
    pacer: Pacer,
    cancel: CancellationToken,
    counters: RunCounters,
    progress_interval: usize,
    pending: AtomicUsize,
    started: Instant,
}

/// 工作者调度器
pub struct Scheduler<F: SessionFactory> {
    shared: Arc<Shared<F>>,
    max_workers: usize,
}

impl<F: SessionFactory> Scheduler<F> {
    pub fn new(
        pool: Arc<SessionPool<F>>,
        extractor: Arc<Extractor>,
        ledger: LedgerHandle,
        policy: SchedulerPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let shared = Shared {
            pool,
            extractor,
            ledger,
            gate: BackoffGate::new(policy.cooldown),
            pacer: Pacer::new(policy.pacing_min, policy.pacing_max),
            cancel,
            counters: RunCounters::default(),
            progress_interval: policy.progress_interval.max(1),
            pending: AtomicUsize::new(0),
            started: Instant::now(),
        };
        Self {
            shared: Arc::new(shared),
            max_workers: policy.max_workers.max(1),
        }
    }

    /// 处理所有目标，直到全部派发并完成或被中断
    pub async fn run(&self, targets: Vec<Target>) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary {
            total_targets: targets.len(),
            ..RunSummary::default()
        };

        let pending = self.select_pending(targets, &mut summary).await;
        summary.pending = pending.len();
        self.shared.pending.store(pending.len(), Ordering::SeqCst);
        log_targets_loaded(
            summary.total_targets,
            summary.already_done,
            summary.duplicates,
            summary.pending,
        );

        let semaphore = Arc::new(Semaphore::new(self.max_workers));
        let mut tasks = JoinSet::new();

        for (index, target) in pending.into_iter().enumerate() {
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.shared.cancel.cancelled() => break,
            };
            if self.shared.cancel.is_cancelled() {
                break;
            }

            let shared = self.shared.clone();
            tasks.spawn(async move {
                let _permit = permit;
                shared.attempt(index + 1, target).await;
            });

            while let Some(joined) = tasks.try_join_next() {
                log_join_error(joined);
            }
        }

        if self.shared.cancel.is_cancelled() {
            info!("⏹️ 收到中断信号，停止派发新目标");
        }
        while let Some(joined) = tasks.join_next().await {
            log_join_error(joined);
        }

        let counters = &self.shared.counters;
        summary.completed = counters.completed.load(Ordering::SeqCst);
        summary.found = counters.found.load(Ordering::SeqCst);
        summary.not_found = counters.not_found.load(Ordering::SeqCst);
        summary.suspicious = counters.suspicious.load(Ordering::SeqCst);
        summary.rate_limited = counters.rate_limited.load(Ordering::SeqCst);
        summary.transient = counters.transient.load(Ordering::SeqCst);
        summary.abandoned = counters.abandoned.load(Ordering::SeqCst);
        summary.interrupted = self.shared.cancel.is_cancelled();
        summary.elapsed = started.elapsed();
        summary.pool = self.shared.pool.stats();
        summary
    }

    /// 去掉账本中已完成的目标和输入中重复的目标，保持输入顺序
    async fn select_pending(&self, targets: Vec<Target>, summary: &mut RunSummary) -> Vec<Target> {
        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(targets.len());

        for target in targets {
            let key = target.key();
            if !seen.insert(key.clone()) {
                summary.duplicates += 1;
                continue;
            }
            match self.shared.ledger.is_done(key).await {
                Ok(true) => summary.already_done += 1,
                Ok(false) => pending.push(target),
                Err(e) => {
                    error!("❌ 查询账本失败，停止派发: {}", e);
                    break;
                }
            }
        }
        pending
    }
}

impl<F: SessionFactory> Shared<F> {
    async fn attempt(&self, index: usize, target: Target) {
        let Some(outcome) = self.extract_with_session(index, &target).await else {
            self.counters.abandoned.fetch_add(1, Ordering::SeqCst);
            debug!("[目标 {}] {} 已放弃", index, target);
            return;
        };

        match &outcome {
            AttemptOutcome::Found(video_id) => {
                info!("[目标 {}] ✅ {} 视频 ID: {}", index, target, video_id)
            }
            AttemptOutcome::NotFound => debug!("[目标 {}] {} 未找到视频", index, target),
            AttemptOutcome::RateLimited(reason) => {
                warn!("[目标 {}] 🛑 {} 被限流: {}", index, target, reason)
            }
            AttemptOutcome::Suspicious(reason) => {
                warn!("[目标 {}] ⚠️ {} 可疑页面: {}", index, target, reason)
            }
            AttemptOutcome::TransientError(reason) => warn!(
                "[目标 {}] ❌ {} 暂时性错误: {}",
                index,
                target,
                truncate_text(reason, 200)
            ),
        }

        match self.ledger.record(target.clone(), outcome.clone()).await {
            Ok(RecordStatus::Duplicate) => debug!("[目标 {}] 账本中已有结果，忽略", index),
            Ok(_) => {}
            Err(e) => error!("[目标 {}] ❌ 写入账本失败: {}", index, e),
        }

        let completed = self.counters.observe(&outcome);
        let pending = self.pending.load(Ordering::SeqCst);
        if completed % self.progress_interval == 0 || completed == pending {
            log_progress(
                completed,
                pending,
                self.counters.found.load(Ordering::SeqCst),
                self.started.elapsed(),
            );
        }

        tokio::select! {
            _ = self.pacer.pause() => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    /// 获取会话并抽取；被中断时返回 None
    async fn extract_with_session(&self, index: usize, target: &Target) -> Option<AttemptOutcome> {
        loop {
            tokio::select! {
                _ = self.gate.wait_ready() => {}
                _ = self.cancel.cancelled() => return None,
            }

            let acquired = tokio::select! {
                acquired = self.pool.acquire() => acquired,
                _ = self.cancel.cancelled() => return None,
            };
            let mut lease = match acquired {
                Ok(lease) => lease,
                Err(e) => return Some(AttemptOutcome::TransientError(e.to_string())),
            };

            // 等待会话期间闸门被触发
            if self.gate.is_active() {
                debug!("[目标 {}] 退避中，归还会话", index);
                self.pool.release(lease).await;
                continue;
            }

            let Some(session) = lease.session_mut() else {
                self.pool.discard(lease).await;
                return Some(AttemptOutcome::TransientError("租约中没有会话".to_string()));
            };

            let extracted = tokio::select! {
                outcome = self.extractor.extract(session, target) => Some(outcome),
                _ = self.cancel.cancelled() => None,
            };

            match extracted {
                None => {
                    self.pool.retire(lease).await;
                    return None;
                }
                Some(outcome @ AttemptOutcome::TransientError(_)) => {
                    self.pool.discard(lease).await;
                    return Some(outcome);
                }
                Some(AttemptOutcome::RateLimited(reason)) => {
                    // 先关闭闸门再归还，拿到这个会话的工作者必然看到退避
                    self.gate.trigger(&reason);
                    self.pool.release(lease).await;
                    return Some(AttemptOutcome::RateLimited(reason));
                }
                Some(outcome) => {
                    self.pool.release(lease).await;
                    return Some(outcome);
                }
            }
        }
    }
}

fn log_join_error(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!("任务执行失败: {}", e);
    }
}
