//! 账本任务
//!
//! 账本只有一个写入者：后台任务独占 [`Ledger`]，其余组件通过
//! [`LedgerHandle`] 发送命令，并在 oneshot 通道上等待回复。

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::CheckpointError;
use crate::ledger::checkpoint::CheckpointStore;
use crate::ledger::state::{Ledger, RecordStatus};
use crate::models::{AttemptOutcome, Target};

const COMMAND_BUFFER: usize = 256;

enum LedgerCommand {
    Record {
        target: Target,
        outcome: AttemptOutcome,
        reply: oneshot::Sender<RecordStatus>,
    },
    IsDone {
        key: String,
        reply: oneshot::Sender<bool>,
    },
    Checkpoint {
        reply: oneshot::Sender<Result<(), CheckpointError>>,
    },
    Shutdown {
        reply: oneshot::Sender<ClosedLedger>,
    },
}

/// 关闭后的账本
#[derive(Debug)]
pub struct ClosedLedger {
    pub ledger: Ledger,
    /// 最后一次保存的结果
    pub final_checkpoint: Result<(), CheckpointError>,
}

/// 账本任务的句柄，可在多个工作者之间克隆
#[derive(Clone)]
pub struct LedgerHandle {
    tx: mpsc::Sender<LedgerCommand>,
}

impl LedgerHandle {
    /// 启动账本任务
    ///
    /// `checkpoint_interval` 为每多少次 `record` 自动保存一次。
    pub fn spawn(
        ledger: Ledger,
        store: CheckpointStore,
        checkpoint_interval: usize,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let task = LedgerTask {
            ledger,
            store,
            checkpoint_interval: checkpoint_interval.max(1),
            since_checkpoint: 0,
        };
        let join = tokio::spawn(task.run(rx));
        (Self { tx }, join)
    }

    pub async fn is_done(&self, key: impl Into<String>) -> Result<bool, CheckpointError> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::IsDone {
            key: key.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| CheckpointError::LedgerClosed)
    }

    /// 记录一次尝试的结果，返回时该结果已对 `is_done` 可见
    pub async fn record(
        &self,
        target: Target,
        outcome: AttemptOutcome,
    ) -> Result<RecordStatus, CheckpointError> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Record {
            target,
            outcome,
            reply,
        })
        .await?;
        rx.await.map_err(|_| CheckpointError::LedgerClosed)
    }

    /// 立即保存一次
    pub async fn checkpoint(&self) -> Result<(), CheckpointError> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Checkpoint { reply }).await?;
        rx.await.map_err(|_| CheckpointError::LedgerClosed)?
    }

    /// 保存最终进度并结束账本任务
    pub async fn shutdown(self) -> Result<ClosedLedger, CheckpointError> {
        let (reply, rx) = oneshot::channel();
        self.send(LedgerCommand::Shutdown { reply }).await?;
        rx.await.map_err(|_| CheckpointError::LedgerClosed)
    }

    async fn send(&self, command: LedgerCommand) -> Result<(), CheckpointError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| CheckpointError::LedgerClosed)
    }
}

struct LedgerTask {
    ledger: Ledger,
    store: CheckpointStore,
    checkpoint_interval: usize,
    since_checkpoint: usize,
}

impl LedgerTask {
    async fn run(mut self, mut rx: mpsc::Receiver<LedgerCommand>) {
        while let Some(command) = rx.recv().await {
            match command {
                LedgerCommand::Record {
                    target,
                    outcome,
                    reply,
                } => {
                    let status = self.ledger.record(&target, &outcome);
                    debug!("账本记录 {} -> {} ({:?})", target.key(), outcome.label(), status);
                    let _ = reply.send(status);

                    self.since_checkpoint += 1;
                    if self.since_checkpoint >= self.checkpoint_interval {
                        if let Err(e) = self.save() {
                            error!("❌ 自动保存进度失败: {}", e);
                        }
                    }
                }
                LedgerCommand::IsDone { key, reply } => {
                    let _ = reply.send(self.ledger.is_done(&key));
                }
                LedgerCommand::Checkpoint { reply } => {
                    let _ = reply.send(self.save());
                }
                LedgerCommand::Shutdown { reply } => {
                    let final_checkpoint = self.save();
                    let _ = reply.send(ClosedLedger {
                        ledger: self.ledger,
                        final_checkpoint,
                    });
                    return;
                }
            }
        }

        // 所有句柄都被丢弃而没有调用 shutdown
        match self.save() {
            Ok(()) => info!("💾 账本句柄已全部释放，进度已保存"),
            Err(e) => error!("❌ 账本关闭时保存进度失败: {}", e),
        }
    }

    fn save(&mut self) -> Result<(), CheckpointError> {
        self.since_checkpoint = 0;
        self.store.save(&self.ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::assert_ok;

    #[tokio::test]
    async fn record_is_visible_to_is_done() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("progress.json"));
        let (handle, join) = LedgerHandle::spawn(Ledger::new(), store, 100);

        assert!(!handle.is_done("c1_a1").await.unwrap());
        let status = handle
            .record(Target::new("c1", "a1"), AttemptOutcome::NotFound)
            .await
            .unwrap();
        assert_eq!(status, RecordStatus::Inserted);
        assert!(handle.is_done("c1_a1").await.unwrap());

        let closed = handle.shutdown().await.unwrap();
        assert_ok!(closed.final_checkpoint);
        join.await.unwrap();
    }

    #[tokio::test]
    async fn auto_checkpoint_after_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let (handle, _join) =
            LedgerHandle::spawn(Ledger::new(), CheckpointStore::new(&path), 2);

        handle
            .record(Target::new("c1", "a1"), AttemptOutcome::Found("v1".into()))
            .await
            .unwrap();
        assert!(!path.exists());

        handle
            .record(Target::new("c2", "a2"), AttemptOutcome::NotFound)
            .await
            .unwrap();
        // 回复先于保存发出，用一次往返确认保存已完成
        handle.is_done("c2_a2").await.unwrap();

        let reloaded = CheckpointStore::new(&path).load();
        assert_eq!(reloaded.len(), 2);
    }

    #[tokio::test]
    async fn handle_fails_after_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("progress.json"));
        let (handle, join) = LedgerHandle::spawn(Ledger::new(), store, 10);
        let other = handle.clone();

        handle.shutdown().await.unwrap();
        join.await.unwrap();
        assert!(matches!(
            other.is_done("c1_a1").await,
            Err(CheckpointError::LedgerClosed)
        ));
    }
}
