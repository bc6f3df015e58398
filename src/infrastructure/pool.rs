//! 渲染会话池 - 基础设施层
//!
//! 启动时一次性创建 P 个会话，之后在所有抽取任务之间复用。
//! 池耗尽时调用方拿到一个临时会话，用完即销毁，不会进入池中。

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::PoolError;
use crate::infrastructure::renderer::SessionFactory;

/// 会话池配置
#[derive(Debug, Clone)]
pub struct PoolSettings {
    /// 池容量 P
    pub capacity: usize,
    /// acquire 的最长等待时间，超时后改用临时会话
    pub acquire_timeout: Duration,
}

/// 租约来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaseKind {
    /// 来自池中的会话，用完归还
    Pooled,
    /// 池耗尽时临时创建，用完销毁
    Throwaway,
}

#[derive(Debug, Default)]
struct PoolCounters {
    created: AtomicUsize,
    destroyed: AtomicUsize,
    acquired: AtomicUsize,
    settled: AtomicUsize,
    throwaway: AtomicUsize,
}

/// 会话池计数快照
///
/// 整个运行期间 `acquired == settled` 说明没有租约被遗漏。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// 创建过的会话总数（含临时会话）
    pub created: usize,
    /// 销毁过的会话总数
    pub destroyed: usize,
    /// 发出的租约数
    pub acquired: usize,
    /// 已归还 / 销毁的租约数
    pub settled: usize,
    /// 临时会话数
    pub throwaway: usize,
}

/// 会话租约
///
/// 正常路径通过 [`SessionPool::release`] 或 [`SessionPool::discard`] 结束。
/// 如果租约在 panic 等路径上被直接丢弃，会在后台销毁其会话。
pub struct SessionLease<F: SessionFactory> {
    session: Option<F::Session>,
    kind: LeaseKind,
    factory: Arc<F>,
    counters: Arc<PoolCounters>,
    runtime: Handle,
}

impl<F: SessionFactory> SessionLease<F> {
    pub fn kind(&self) -> LeaseKind {
        self.kind
    }

    pub fn is_throwaway(&self) -> bool {
        self.kind == LeaseKind::Throwaway
    }

    /// 获取会话的可变引用
    pub fn session_mut(&mut self) -> Option<&mut F::Session> {
        self.session.as_mut()
    }

    fn take(&mut self) -> Option<F::Session> {
        let session = self.session.take();
        if session.is_some() {
            self.counters.settled.fetch_add(1, Ordering::SeqCst);
        }
        session
    }
}

impl<F: SessionFactory> Drop for SessionLease<F> {
    fn drop(&mut self) {
        if let Some(session) = self.take() {
            warn!("⚠️ 会话租约未归还即被丢弃，后台销毁会话");
            let factory = self.factory.clone();
            let counters = self.counters.clone();
            self.runtime.spawn(async move {
                factory.destroy(session).await;
                counters.destroyed.fetch_add(1, Ordering::SeqCst);
            });
        }
    }
}

/// 固定容量的渲染会话池
pub struct SessionPool<F: SessionFactory> {
    factory: Arc<F>,
    settings: PoolSettings,
    idle_tx: mpsc::Sender<F::Session>,
    idle_rx: Mutex<mpsc::Receiver<F::Session>>,
    closed: AtomicBool,
    counters: Arc<PoolCounters>,
}

impl<F: SessionFactory> SessionPool<F> {
    /// 创建会话池并预先启动 P 个会话
    ///
    /// 单个会话创建失败只记录日志，对应槽位留空；
    /// 一个会话都没有创建成功时返回 [`PoolError::NoSessions`]。
    pub async fn initialize(factory: Arc<F>, settings: PoolSettings) -> Result<Self, PoolError> {
        let capacity = settings.capacity.max(1);
        info!("🚀 正在创建 {} 个浏览器会话...", capacity);

        let (idle_tx, idle_rx) = mpsc::channel(capacity);
        let counters = Arc::new(PoolCounters::default());

        let results = join_all((0..capacity).map(|_| factory.create())).await;
        let mut ready = 0;
        for (slot, result) in results.into_iter().enumerate() {
            match result {
                Ok(session) => {
                    counters.created.fetch_add(1, Ordering::SeqCst);
                    if idle_tx.try_send(session).is_ok() {
                        ready += 1;
                    }
                }
                Err(e) => error!("创建会话失败 (槽位 {}): {}", slot + 1, e),
            }
        }

        if ready == 0 {
            return Err(PoolError::NoSessions {
                requested: capacity,
            });
        }
        if ready < capacity {
            warn!("⚠️ 会话池降级运行: {}/{} 个会话可用", ready, capacity);
        } else {
            info!("✓ 会话池就绪: {} 个会话", ready);
        }

        Ok(Self {
            factory,
            settings: PoolSettings {
                capacity,
                ..settings
            },
            idle_tx,
            idle_rx: Mutex::new(idle_rx),
            closed: AtomicBool::new(false),
            counters,
        })
    }

    pub fn capacity(&self) -> usize {
        self.settings.capacity
    }

    /// 当前空闲的池内会话数
    pub fn idle(&self) -> usize {
        self.idle_tx.max_capacity() - self.idle_tx.capacity()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.counters.created.load(Ordering::SeqCst),
            destroyed: self.counters.destroyed.load(Ordering::SeqCst),
            acquired: self.counters.acquired.load(Ordering::SeqCst),
            settled: self.counters.settled.load(Ordering::SeqCst),
            throwaway: self.counters.throwaway.load(Ordering::SeqCst),
        }
    }

    /// 获取一个会话
    ///
    /// 最多等待 `acquire_timeout`，超时后创建一个临时会话。
    pub async fn acquire(&self) -> Result<SessionLease<F>, PoolError> {
        let waited = timeout(self.settings.acquire_timeout, async {
            self.idle_rx.lock().await.recv().await
        })
        .await;

        let (session, kind) = match waited {
            Ok(Some(session)) => (session, LeaseKind::Pooled),
            Ok(None) | Err(_) => {
                warn!(
                    "⚠️ 会话池在 {:?} 内无可用会话，创建临时会话",
                    self.settings.acquire_timeout
                );
                let session = self
                    .factory
                    .create()
                    .await
                    .map_err(PoolError::ThrowawayFailed)?;
                self.counters.created.fetch_add(1, Ordering::SeqCst);
                self.counters.throwaway.fetch_add(1, Ordering::SeqCst);
                (session, LeaseKind::Throwaway)
            }
        };

        self.counters.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(SessionLease {
            session: Some(session),
            kind,
            factory: self.factory.clone(),
            counters: self.counters.clone(),
            runtime: Handle::current(),
        })
    }

    /// 归还健康会话
    ///
    /// 临时会话、池已关闭或池已满时直接销毁。
    pub async fn release(&self, mut lease: SessionLease<F>) {
        let Some(session) = lease.take() else {
            return;
        };

        if lease.kind == LeaseKind::Throwaway || self.closed.load(Ordering::SeqCst) {
            debug!("销毁{}会话", if lease.is_throwaway() { "临时" } else { "池内" });
            self.destroy(session).await;
            return;
        }

        if let Err(err) = self.idle_tx.try_send(session) {
            debug!("会话池已满，销毁多余会话");
            self.destroy(err.into_inner()).await;
        }
    }

    /// 销毁可能已损坏的会话
    ///
    /// 池内会话会尝试补充一个新会话到对应槽位，补充失败则池降级运行。
    pub async fn discard(&self, mut lease: SessionLease<F>) {
        let Some(session) = lease.take() else {
            return;
        };
        self.destroy(session).await;

        if lease.kind == LeaseKind::Throwaway || self.closed.load(Ordering::SeqCst) {
            return;
        }

        match self.factory.create().await {
            Ok(replacement) => {
                self.counters.created.fetch_add(1, Ordering::SeqCst);
                match self.idle_tx.try_send(replacement) {
                    Ok(()) => debug!("已补充新会话"),
                    Err(err) => self.destroy(err.into_inner()).await,
                }
            }
            Err(e) => warn!("⚠️ 补充会话失败，会话池降级运行: {}", e),
        }
    }

    /// 销毁会话且不补充，用于中断时被放弃的尝试
    pub async fn retire(&self, mut lease: SessionLease<F>) {
        if let Some(session) = lease.take() {
            self.destroy(session).await;
        }
    }

    /// 销毁所有空闲会话，之后归还的会话也会被直接销毁
    ///
    /// 正在使用中的会话由各自的持有者负责归还或销毁。
    pub async fn close_all(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut rx = self.idle_rx.lock().await;
        let mut closed = 0;
        while let Ok(session) = rx.try_recv() {
            self.destroy(session).await;
            closed += 1;
        }
        info!("🧹 已关闭 {} 个空闲会话", closed);
    }

    async fn destroy(&self, session: F::Session) {
        self.factory.destroy(session).await;
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}
