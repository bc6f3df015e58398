//! 基础设施层（Infrastructure Layer）
//!
//! 持有稀缺资源（浏览器会话），只向上暴露能力：
//!
//! - `renderer` - 渲染能力契约（`RenderSession` / `SessionFactory`）
//! - `js_executor` - 持有 chromiumoxide Page，提供 eval() 能力
//! - `pool` - 固定容量的会话池，带临时会话兜底

pub mod js_executor;
pub mod pool;
pub mod renderer;

pub use js_executor::JsExecutor;
pub use pool::{LeaseKind, PoolSettings, PoolStats, SessionLease, SessionPool};
pub use renderer::{FrameHandle, PageSnapshot, RenderSession, SessionFactory};
