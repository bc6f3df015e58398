//! chromiumoxide 渲染适配器
//!
//! 实现 `infrastructure::renderer` 中的契约：每个会话是一个独立的
//! Chromium 进程加一个页面，框架遍历通过 JsExecutor 执行脚本完成。

pub mod headless;
pub mod session;

pub use headless::{launch_headless_browser, BrowserSettings};
pub use session::{ChromiumFactory, ChromiumSession};
