//! 进度账本 - 持久化层
//!
//! - `state`：内存中的账本，先写入者为准
//! - `checkpoint`：进度文件的原子读写
//! - `writer`：独占账本的后台任务与其句柄

pub mod checkpoint;
pub mod state;
pub mod writer;

pub use checkpoint::{CheckpointFile, CheckpointStore, FlaggedRecord};
pub use state::{FoundRecord, Ledger, LedgerCounts, LedgerEntry, RecordStatus, TerminalOutcome};
pub use writer::{ClosedLedger, LedgerHandle};
