//! # Video ID Scrape
//!
//! 从广告透明度页面批量抽取嵌入的 YouTube 视频 ID，可中断、可恢复
//!
//! ## 架构设计
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（渲染会话），只暴露能力
//! - `RenderSession` / `SessionFactory` - 渲染能力契约
//! - `SessionPool` - 固定容量的会话池，耗尽时创建临时会话
//! - `browser/` - 基于 chromiumoxide 的会话实现
//!
//! ### ② 持久化层（Ledger）
//! - `ledger/` - 进度账本，单一写入者，原子保存
//!
//! ### ③ 业务能力层（Services）
//! - `Extractor` - 导航 → 反爬检查 → 三层框架 → 视频 ID
//! - `BlockDetector` - 限流 / 验证码页面识别
//! - `Pacer` / `BackoffGate` - 随机间隔与全局退避
//! - `ResultsWriter` - 写结果表格
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/scheduler` - 并发调度，进度统计
//! - `orchestrator/batch_processor` - 应用生命周期，中断处理
//!
//! ## 模块结构

pub mod browser;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod ledger;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use config::Config;
pub use infrastructure::{RenderSession, SessionFactory, SessionPool};
pub use ledger::{Ledger, LedgerHandle};
pub use models::{AttemptOutcome, Target};
pub use orchestrator::{run_batch, App, BatchReport};
