use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::{EnableParams, SetBlockedUrLsParams};
use chromiumoxide::{Browser, Page};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, warn};

use crate::browser::headless::{launch_headless_browser, BrowserSettings};
use crate::error::RenderError;
use crate::infrastructure::js_executor::ProbeStatus;
use crate::infrastructure::{FrameHandle, JsExecutor, PageSnapshot, RenderSession, SessionFactory};

/// 等待框架时的轮询间隔
const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// 一个 Chromium 进程 + 一个页面
pub struct ChromiumSession {
    id: usize,
    browser: Browser,
    executor: JsExecutor,
    handler: JoinHandle<()>,
    _profile_dir: TempDir,
}

impl ChromiumSession {
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl RenderSession for ChromiumSession {
    async fn navigate(&mut self, url: &str, wait: Duration) -> Result<PageSnapshot, RenderError> {
        debug!("[会话 {}] 导航到: {}", self.id, url);
        let page = self.executor.page();

        match timeout(wait, page.goto(url)).await {
            Err(_) => {
                return Err(RenderError::NavigationTimeout {
                    url: url.to_string(),
                    waited: wait,
                })
            }
            Ok(Err(e)) => return Err(RenderError::navigation_failed(url, e)),
            Ok(Ok(_)) => {}
        }

        let title = page.get_title().await?.unwrap_or_default();
        let body = page.content().await?;
        let current_url = page.url().await?.unwrap_or_else(|| url.to_string());

        Ok(PageSnapshot {
            url: current_url,
            title,
            body,
        })
    }

    async fn wait_for_frame(
        &mut self,
        parent: &FrameHandle,
        selector: &str,
        wait: Duration,
    ) -> Result<FrameHandle, RenderError> {
        let handle = parent.child(selector);
        let deadline = Instant::now() + wait;

        loop {
            let probe = self
                .executor
                .probe_frame(handle.path(), r#"return { status: "found" };"#)
                .await?;
            match probe.status {
                ProbeStatus::Found => return Ok(handle),
                ProbeStatus::Detached => {
                    return Err(RenderError::Detached {
                        selector: probe.value.unwrap_or_else(|| selector.to_string()),
                    })
                }
                ProbeStatus::Missing => {}
            }
            if Instant::now() >= deadline {
                return Err(RenderError::Timeout {
                    selector: selector.to_string(),
                    waited: wait,
                });
            }
            sleep(FRAME_POLL_INTERVAL).await;
        }
    }

    async fn read_attribute(
        &mut self,
        handle: &FrameHandle,
        name: &str,
    ) -> Result<Option<String>, RenderError> {
        let Some(selector) = handle.selector() else {
            return Err(RenderError::Detached {
                selector: "document".to_string(),
            });
        };
        let on_found = format!(
            "return {{ status: \"found\", value: el.getAttribute({}) }};",
            serde_json::to_string(name)?
        );
        let probe = self.executor.probe_frame(handle.path(), &on_found).await?;

        match probe.status {
            ProbeStatus::Found => Ok(probe.value),
            _ => Err(RenderError::Detached {
                selector: selector.to_string(),
            }),
        }
    }
}

/// 让页面不再下载图片、样式、字体和视频
async fn block_heavy_resources(page: &Page, settings: &BrowserSettings) -> Result<(), RenderError> {
    let patterns = settings.blocked_url_patterns();
    if patterns.is_empty() {
        return Ok(());
    }
    page.execute(EnableParams::default()).await?;
    page.execute(SetBlockedUrLsParams::new(patterns)).await?;
    Ok(())
}

/// 创建 / 销毁 Chromium 会话
pub struct ChromiumFactory {
    settings: BrowserSettings,
    launched: AtomicUsize,
}

impl ChromiumFactory {
    pub fn new(settings: BrowserSettings) -> Self {
        Self {
            settings,
            launched: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SessionFactory for ChromiumFactory {
    type Session = ChromiumSession;

    async fn create(&self) -> Result<ChromiumSession, RenderError> {
        let id = self.launched.fetch_add(1, Ordering::SeqCst) + 1;
        let profile_dir = tempfile::Builder::new()
            .prefix("video-id-scrape-")
            .tempdir()
            .map_err(RenderError::launch_failed)?;

        let (browser, handler) = launch_headless_browser(&self.settings, profile_dir.path()).await?;
        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(RenderError::launch_failed(e));
            }
        };
        if let Err(e) = block_heavy_resources(&page, &self.settings).await {
            handler.abort();
            return Err(e);
        }
        debug!("[会话 {}] 已创建", id);

        Ok(ChromiumSession {
            id,
            browser,
            executor: JsExecutor::new(page),
            handler,
            _profile_dir: profile_dir,
        })
    }

    async fn destroy(&self, mut session: ChromiumSession) {
        if let Err(e) = session.browser.close().await {
            warn!("[会话 {}] 关闭浏览器失败: {}", session.id, e);
        }
        if let Err(e) = session.browser.wait().await {
            warn!("[会话 {}] 等待浏览器进程退出失败: {}", session.id, e);
        }
        session.handler.abort();
        debug!("[会话 {}] 已销毁", session.id);
    }
}
