//! 结果写入服务 - 业务能力层
//!
//! 只负责"写结果表格"能力，不关心流程

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::OutputError;
use crate::ledger::FoundRecord;

/// 结果表格的表头
pub const OUTPUT_HEADER: [&str; 3] = ["Creative_ID", "Advertiser_ID", "Video_ID"];

/// 结果写入服务
///
/// 每个 Found 条目写一行，顺序与写入账本的顺序一致，文件整体覆盖。
pub struct ResultsWriter {
    path: PathBuf,
}

impl ResultsWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 写入全部结果，返回写入的行数
    pub fn write(&self, results: &[FoundRecord]) -> Result<usize, OutputError> {
        let write_failed = |source: csv::Error| OutputError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        let mut writer = csv::Writer::from_path(&self.path).map_err(write_failed)?;
        writer.write_record(OUTPUT_HEADER).map_err(write_failed)?;
        for record in results {
            writer
                .write_record([
                    record.creative_id.as_str(),
                    record.advertiser_id.as_str(),
                    record.video_id.as_str(),
                ])
                .map_err(write_failed)?;
        }
        writer.flush().map_err(|source| OutputError::FlushFailed {
            path: self.path.display().to_string(),
            source,
        })?;

        info!("📝 已写入 {} 条结果到 {}", results.len(), self.path.display());
        Ok(results.len())
    }
}
