//! 账本状态
//!
//! 纯内存结构，不做任何 I/O，也不做同步；由账本任务独占。

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ledger::checkpoint::{CheckpointFile, FlaggedRecord};
use crate::models::{AttemptOutcome, Target};

/// 终态结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    Found(String),
    NotFound,
    Suspicious(String),
}

/// 账本条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub target_key: String,
    pub outcome: TerminalOutcome,
}

impl LedgerEntry {
    pub fn video_id(&self) -> Option<&str> {
        match &self.outcome {
            TerminalOutcome::Found(id) => Some(id),
            _ => None,
        }
    }
}

/// 找到视频的结果行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoundRecord {
    #[serde(alias = "cr")]
    pub creative_id: String,
    #[serde(alias = "ar")]
    pub advertiser_id: String,
    pub video_id: String,
}

impl FoundRecord {
    pub fn key(&self) -> String {
        format!("{}_{}", self.creative_id, self.advertiser_id)
    }
}

/// `record` 的处理结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// 首次写入终态
    Inserted,
    /// 已存在终态，本次写入被忽略
    Duplicate,
    /// 可重试结果，不写入
    Retryable,
}

/// 账本中各类终态的数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    pub found: usize,
    pub not_found: usize,
    pub suspicious: usize,
}

impl LedgerCounts {
    pub fn total(&self) -> usize {
        self.found + self.not_found + self.suspicious
    }
}

/// 进度账本：target_key → 终态条目
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    entries: HashMap<String, LedgerEntry>,
    order: Vec<String>,
    results: Vec<FoundRecord>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entry(&self, key: &str) -> Option<&LedgerEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 按写入顺序排列的找到视频的结果
    pub fn results(&self) -> &[FoundRecord] {
        &self.results
    }

    /// 记录一次尝试的结果，先写入者为准
    pub fn record(&mut self, target: &Target, outcome: &AttemptOutcome) -> RecordStatus {
        let terminal = match outcome {
            AttemptOutcome::Found(id) => TerminalOutcome::Found(id.clone()),
            AttemptOutcome::NotFound => TerminalOutcome::NotFound,
            AttemptOutcome::Suspicious(reason) => TerminalOutcome::Suspicious(reason.clone()),
            AttemptOutcome::RateLimited(_) | AttemptOutcome::TransientError(_) => {
                return RecordStatus::Retryable
            }
        };

        let key = target.key();
        if self.entries.contains_key(&key) {
            return RecordStatus::Duplicate;
        }
        if let TerminalOutcome::Found(video_id) = &terminal {
            self.results.push(FoundRecord {
                creative_id: target.creative_id.clone(),
                advertiser_id: target.advertiser_id.clone(),
                video_id: video_id.clone(),
            });
        }
        self.insert(key, terminal);
        RecordStatus::Inserted
    }

    fn insert(&mut self, key: String, outcome: TerminalOutcome) {
        self.order.push(key.clone());
        self.entries.insert(
            key.clone(),
            LedgerEntry {
                target_key: key,
                outcome,
            },
        );
    }

    pub fn counts(&self) -> LedgerCounts {
        let mut counts = LedgerCounts::default();
        for entry in self.entries.values() {
            match entry.outcome {
                TerminalOutcome::Found(_) => counts.found += 1,
                TerminalOutcome::NotFound => counts.not_found += 1,
                TerminalOutcome::Suspicious(_) => counts.suspicious += 1,
            }
        }
        counts
    }

    /// 不重复的视频 ID 数量
    pub fn unique_videos(&self) -> usize {
        let mut ids: Vec<&str> = self.results.iter().map(|r| r.video_id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    }

    /// 转换为进度文件结构
    pub fn to_checkpoint(&self) -> CheckpointFile {
        let flagged = self
            .order
            .iter()
            .filter_map(|key| match &self.entries.get(key)?.outcome {
                TerminalOutcome::Suspicious(reason) => Some(FlaggedRecord {
                    key: key.clone(),
                    reason: reason.clone(),
                }),
                _ => None,
            })
            .collect();

        CheckpointFile {
            processed_keys: self.order.clone(),
            results: self.results.clone(),
            flagged,
        }
    }

    /// 从进度文件恢复
    ///
    /// 有结果的键恢复为 Found，标记过的键恢复为 Suspicious，其余为 NotFound。
    /// 旧文件中可能出现只在 results 里出现的键，同样视为已完成。
    pub fn from_checkpoint(file: CheckpointFile) -> Self {
        let mut ledger = Ledger::new();

        for record in file.results {
            let key = record.key();
            if ledger.entries.contains_key(&key) {
                continue;
            }
            ledger.insert(key, TerminalOutcome::Found(record.video_id.clone()));
            ledger.results.push(record);
        }
        for flagged in file.flagged {
            if !ledger.entries.contains_key(&flagged.key) {
                ledger.insert(flagged.key, TerminalOutcome::Suspicious(flagged.reason));
            }
        }
        for key in file.processed_keys {
            if !ledger.entries.contains_key(&key) {
                ledger.insert(key, TerminalOutcome::NotFound);
            }
        }

        ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_write_wins() {
        let mut ledger = Ledger::new();
        let target = Target::new("c1", "a1");

        assert_eq!(
            ledger.record(&target, &AttemptOutcome::Found("abc123".into())),
            RecordStatus::Inserted
        );
        assert_eq!(
            ledger.record(&target, &AttemptOutcome::NotFound),
            RecordStatus::Duplicate
        );

        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.entry("c1_a1").and_then(|e| e.video_id()), Some("abc123"));
        assert_eq!(ledger.results().len(), 1);
    }

    #[test]
    fn retryable_outcomes_are_not_terminal() {
        let mut ledger = Ledger::new();
        let target = Target::new("c1", "a1");

        assert_eq!(
            ledger.record(&target, &AttemptOutcome::RateLimited("429".into())),
            RecordStatus::Retryable
        );
        assert_eq!(
            ledger.record(&target, &AttemptOutcome::TransientError("boom".into())),
            RecordStatus::Retryable
        );
        assert!(!ledger.is_done("c1_a1"));

        // 之后的终态仍然可以写入
        assert_eq!(
            ledger.record(&target, &AttemptOutcome::NotFound),
            RecordStatus::Inserted
        );
        assert!(ledger.is_done("c1_a1"));
    }

    #[test]
    fn checkpoint_restores_every_terminal_kind() {
        let mut ledger = Ledger::new();
        ledger.record(&Target::new("c1", "a1"), &AttemptOutcome::Found("v1".into()));
        ledger.record(&Target::new("c2", "a2"), &AttemptOutcome::NotFound);
        ledger.record(&Target::new("c3", "a3"), &AttemptOutcome::Suspicious("captcha".into()));

        let restored = Ledger::from_checkpoint(ledger.to_checkpoint());
        assert_eq!(restored.counts(), ledger.counts());
        assert_eq!(
            restored.entry("c3_a3").map(|e| e.outcome.clone()),
            Some(TerminalOutcome::Suspicious("captcha".into()))
        );
        assert_eq!(restored.results(), ledger.results());
    }

    #[test]
    fn unique_videos_ignores_repeats() {
        let mut ledger = Ledger::new();
        ledger.record(&Target::new("c1", "a1"), &AttemptOutcome::Found("v1".into()));
        ledger.record(&Target::new("c2", "a1"), &AttemptOutcome::Found("v1".into()));
        ledger.record(&Target::new("c3", "a1"), &AttemptOutcome::Found("v2".into()));
        assert_eq!(ledger.unique_videos(), 2);
    }
}
