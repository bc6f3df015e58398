//! 进度文件读写
//!
//! 保存时先写临时文件、fsync，再原子重命名；读取失败一律退化为空账本。

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::CheckpointError;
use crate::ledger::state::{FoundRecord, Ledger};

/// 被标记为可疑的目标
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlaggedRecord {
    pub key: String,
    pub reason: String,
}

/// 进度文件结构
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointFile {
    #[serde(default, alias = "processed_urls")]
    pub processed_keys: Vec<String>,
    #[serde(default)]
    pub results: Vec<FoundRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flagged: Vec<FlaggedRecord>,
}

/// 进度文件存储
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取进度文件
    ///
    /// 文件不存在、无法读取或解析失败时返回空账本，不会中止程序。
    pub fn load(&self) -> Ledger {
        let content = match std::fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("📄 未找到进度文件 {}，从头开始", self.path.display());
                return Ledger::new();
            }
            Err(e) => {
                warn!("⚠️ 读取进度文件 {} 失败，从头开始: {}", self.path.display(), e);
                return Ledger::new();
            }
        };

        match serde_json::from_slice::<CheckpointFile>(&content) {
            Ok(file) => {
                let ledger = Ledger::from_checkpoint(file);
                info!(
                    "📄 已加载进度文件 {}: {} 个已完成目标, {} 个视频",
                    self.path.display(),
                    ledger.len(),
                    ledger.results().len()
                );
                ledger
            }
            Err(e) => {
                warn!("⚠️ 进度文件 {} 已损坏，从头开始: {}", self.path.display(), e);
                Ledger::new()
            }
        }
    }

    /// 原子写入完整账本
    pub fn save(&self, ledger: &Ledger) -> Result<(), CheckpointError> {
        let bytes = serde_json::to_vec(&ledger.to_checkpoint())?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let write_failed = |source: std::io::Error| CheckpointError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(write_failed)?;
        tmp.write_all(&bytes).map_err(write_failed)?;
        tmp.as_file().sync_all().map_err(write_failed)?;
        tmp.persist(&self.path).map_err(|e| write_failed(e.error))?;

        debug!("💾 进度已保存: {} 个目标", ledger.len());
        Ok(())
    }
}
