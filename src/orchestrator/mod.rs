//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `batch_processor` - 批量处理器
//! - 管理应用生命周期（初始化、运行、清理）
//! - 持有会话池和账本任务
//! - 处理中断，输出全局统计信息
//!
//! ### `scheduler` - 工作者调度器
//! - 控制并发数量（Semaphore）
//! - 每个目标一次尝试：退避 → 会话 → 抽取 → 账本 → 间隔
//! - 输出进度
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<Target>)
//!     ↓
//! scheduler (每个目标一次尝试)
//!     ↓
//! services (能力层：extractor / throttle / results_writer)
//!     ↓
//! infrastructure (基础设施：会话池、渲染会话)
//! ```

pub mod batch_processor;
pub mod scheduler;

pub use batch_processor::{run_batch, App, BatchReport};
pub use scheduler::{RunSummary, Scheduler, SchedulerPolicy};
