//! 渲染能力接口 - 基础设施层
//!
//! 核心流程只依赖这里的契约，不认识任何具体的浏览器引擎。

use std::time::Duration;

use async_trait::async_trait;

use crate::error::RenderError;

/// 导航完成后的页面快照，用于反爬检查
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSnapshot {
    pub url: String,
    pub title: String,
    pub body: String,
}

/// 嵌套框架句柄
///
/// 用从顶层文档出发的选择器路径表示：路径最后一项是框架元素本身，
/// 之前各项是需要依次进入的外层框架。空路径表示顶层文档。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameHandle {
    path: Vec<String>,
}

impl FrameHandle {
    /// 顶层文档
    pub fn root() -> Self {
        Self::default()
    }

    /// 在当前框架内部查找的子框架
    pub fn child(&self, selector: impl Into<String>) -> Self {
        let mut path = self.path.clone();
        path.push(selector.into());
        Self { path }
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    /// 嵌套深度，顶层文档为 0
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn selector(&self) -> Option<&str> {
        self.path.last().map(String::as_str)
    }
}

/// 一个可复用的渲染会话
///
/// 同一时间只被一个抽取任务独占。
#[async_trait]
pub trait RenderSession: Send + 'static {
    /// 导航到 URL 并返回页面快照
    async fn navigate(&mut self, url: &str, timeout: Duration)
        -> Result<PageSnapshot, RenderError>;

    /// 在 `parent` 内等待匹配 `selector` 的框架出现
    ///
    /// 超时返回 [`RenderError::Timeout`]。
    async fn wait_for_frame(
        &mut self,
        parent: &FrameHandle,
        selector: &str,
        timeout: Duration,
    ) -> Result<FrameHandle, RenderError>;

    /// 读取框架元素的属性
    async fn read_attribute(
        &mut self,
        handle: &FrameHandle,
        name: &str,
    ) -> Result<Option<String>, RenderError>;
}

/// 会话工厂：负责创建与销毁重量级的渲染会话
#[async_trait]
pub trait SessionFactory: Send + Sync + 'static {
    type Session: RenderSession;

    async fn create(&self) -> Result<Self::Session, RenderError>;

    async fn destroy(&self, session: Self::Session);
}
