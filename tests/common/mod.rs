#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};

use video_id_scrape::config::Config;
use video_id_scrape::error::RenderError;
use video_id_scrape::infrastructure::{FrameHandle, PageSnapshot, RenderSession, SessionFactory};

pub const TEST_URL_TEMPLATE: &str =
    "https://ads.test/advertiser/{advertiser_id}/creative/{creative_id}";

/// 脚本化的页面
#[derive(Debug, Clone)]
pub struct FakePage {
    pub title: String,
    pub body: String,
    /// 可以找到的框架层数
    pub frame_depth: usize,
    pub src: Option<String>,
    pub nav_error: bool,
    pub delay: Duration,
}

impl FakePage {
    fn normal() -> Self {
        Self {
            title: "Ads Transparency Center".to_string(),
            body: format!("<html><body>{}</body></html>", "x".repeat(2048)),
            frame_depth: 0,
            src: None,
            nav_error: false,
            delay: Duration::ZERO,
        }
    }

    pub fn video(video_id: &str) -> Self {
        Self {
            frame_depth: 3,
            src: Some(format!("https://www.youtube.com/embed/{}?autoplay=1", video_id)),
            ..Self::normal()
        }
    }

    pub fn no_video() -> Self {
        Self::normal()
    }

    pub fn rate_limited() -> Self {
        Self {
            title: "429 Too Many Requests".to_string(),
            ..Self::normal()
        }
    }

    /// 限流页面，但框架结构完整
    pub fn rate_limited_over_video(video_id: &str) -> Self {
        Self {
            title: "429 Too Many Requests".to_string(),
            ..Self::video(video_id)
        }
    }

    pub fn captcha_over_video(video_id: &str) -> Self {
        Self {
            body: format!(
                "<html><div class=\"g-recaptcha\"></div>{}</html>",
                "x".repeat(2048)
            ),
            ..Self::video(video_id)
        }
    }

    pub fn broken() -> Self {
        Self {
            nav_error: true,
            ..Self::normal()
        }
    }

    pub fn with_delay(self, delay: Duration) -> Self {
        Self { delay, ..self }
    }
}

#[derive(Debug, Default)]
struct FakeState {
    pages: HashMap<String, FakePage>,
    navigations: Mutex<Vec<(String, Instant)>>,
    frame_waits: AtomicUsize,
    created: AtomicUsize,
    destroyed: AtomicUsize,
    failing_creates: AtomicUsize,
}

/// 按 creative_id 返回预设页面的会话工厂
#[derive(Debug, Clone, Default)]
pub struct FakeFactory {
    state: Arc<FakeState>,
}

impl FakeFactory {
    pub fn new(pages: impl IntoIterator<Item = (&'static str, FakePage)>) -> Self {
        let pages = pages
            .into_iter()
            .map(|(creative_id, page)| (creative_id.to_string(), page))
            .collect();
        Self {
            state: Arc::new(FakeState {
                pages,
                ..FakeState::default()
            }),
        }
    }

    /// 接下来 `n` 次 create 失败
    pub fn fail_next_creates(&self, n: usize) {
        self.state.failing_creates.store(n, Ordering::SeqCst);
    }

    /// 按时间顺序记录的导航：(creative_id, 时刻)
    pub fn navigations(&self) -> Vec<(String, Instant)> {
        self.state
            .navigations
            .lock()
            .unwrap()
            .clone()
    }

    pub fn navigation_count(&self) -> usize {
        self.state.navigations.lock().unwrap().len()
    }

    pub fn frame_waits(&self) -> usize {
        self.state.frame_waits.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> usize {
        self.state.created.load(Ordering::SeqCst)
    }

    pub fn destroyed(&self) -> usize {
        self.state.destroyed.load(Ordering::SeqCst)
    }
}

pub struct FakeSession {
    id: usize,
    state: Arc<FakeState>,
    current: Option<FakePage>,
}

impl FakeSession {
    pub fn id(&self) -> usize {
        self.id
    }
}

/// URL 的最后一段是 creative_id
fn creative_id_of(url: &str) -> String {
    url.rsplit('/').next().unwrap_or_default().to_string()
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<PageSnapshot, RenderError> {
        let creative_id = creative_id_of(url);
        self.state
            .navigations
            .lock()
            .unwrap()
            .push((creative_id.clone(), Instant::now()));

        let page = self
            .state
            .pages
            .get(&creative_id)
            .cloned()
            .unwrap_or_else(FakePage::no_video);
        if !page.delay.is_zero() {
            sleep(page.delay).await;
        }
        if page.nav_error {
            return Err(RenderError::navigation_failed(url, "net::ERR_CONNECTION_RESET"));
        }

        let snapshot = PageSnapshot {
            url: url.to_string(),
            title: page.title.clone(),
            body: page.body.clone(),
        };
        self.current = Some(page);
        Ok(snapshot)
    }

    async fn wait_for_frame(
        &mut self,
        parent: &FrameHandle,
        selector: &str,
        timeout: Duration,
    ) -> Result<FrameHandle, RenderError> {
        self.state.frame_waits.fetch_add(1, Ordering::SeqCst);
        let depth = self.current.as_ref().map_or(0, |p| p.frame_depth);
        if parent.depth() < depth {
            return Ok(parent.child(selector));
        }
        sleep(timeout).await;
        Err(RenderError::Timeout {
            selector: selector.to_string(),
            waited: timeout,
        })
    }

    async fn read_attribute(
        &mut self,
        _handle: &FrameHandle,
        _name: &str,
    ) -> Result<Option<String>, RenderError> {
        Ok(self.current.as_ref().and_then(|p| p.src.clone()))
    }
}

#[async_trait]
impl SessionFactory for FakeFactory {
    type Session = FakeSession;

    async fn create(&self) -> Result<FakeSession, RenderError> {
        let failing = self.state.failing_creates.load(Ordering::SeqCst);
        if failing > 0 {
            self.state.failing_creates.store(failing - 1, Ordering::SeqCst);
            return Err(RenderError::launch_failed(std::io::Error::new(
                std::io::ErrorKind::Other,
                "chrome not found",
            )));
        }
        let id = self.state.created.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FakeSession {
            id,
            state: self.state.clone(),
            current: None,
        })
    }

    async fn destroy(&self, _session: FakeSession) {
        self.state.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

/// 所有文件都放在 `dir` 下、没有随机间隔的配置
pub fn test_config(dir: &Path) -> Config {
    Config {
        input_file: dir.join("targets.csv").display().to_string(),
        output_file: dir.join("video_ids.csv").display().to_string(),
        checkpoint_file: Some(dir.join("progress.json").display().to_string()),
        max_workers: 2,
        pool_size: 2,
        pool_acquire_timeout_ms: 1_000,
        checkpoint_interval: 10,
        progress_interval: 10,
        pacing_min_ms: 0,
        pacing_max_ms: 0,
        rate_limit_cooldown_ms: 60_000,
        url_template: TEST_URL_TEMPLATE.to_string(),
        navigation_timeout_ms: 5_000,
        outer_frame_timeout_ms: 1_000,
        inner_frame_timeout_ms: 1_000,
        media_frame_timeout_ms: 1_000,
        min_body_bytes: 64,
        ..Config::default()
    }
}
