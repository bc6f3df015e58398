use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::RenderError;

/// 浏览器启动参数
#[derive(Debug, Clone)]
pub struct BrowserSettings {
    pub headless: bool,
    pub chrome_executable: Option<String>,
    pub user_agent: String,
    /// 单个 CDP 请求的超时
    pub request_timeout: Duration,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// 不下载的资源扩展名（图片、样式、字体、视频）
    pub blocked_extensions: Vec<String>,
}

impl BrowserSettings {
    /// `Network.setBlockedURLs` 使用的通配模式
    pub fn blocked_url_patterns(&self) -> Vec<String> {
        self.blocked_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.'))
            .filter(|ext| !ext.is_empty())
            .map(|ext| format!("*.{}*", ext))
            .collect()
    }
}

/// 启动一个独立的浏览器实例
///
/// 每个实例使用独立的 profile 目录，多个实例可以并存。
/// 返回浏览器和后台事件处理任务。
pub async fn launch_headless_browser(
    settings: &BrowserSettings,
    profile_dir: &Path,
) -> Result<(Browser, JoinHandle<()>), RenderError> {
    info!("🚀 启动无头浏览器...");
    debug!("profile 目录: {}", profile_dir.display());

    let mut builder = BrowserConfig::builder()
        .user_data_dir(profile_dir)
        .request_timeout(settings.request_timeout)
        .window_size(settings.viewport_width, settings.viewport_height)
        .viewport(Viewport {
            width: settings.viewport_width,
            height: settings.viewport_height,
            ..Viewport::default()
        })
        .args(vec![
            "--disable-gpu".to_string(),
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            // 嵌套的广告框架跨域，关闭同源限制才能逐层进入
            "--disable-web-security".to_string(),
            "--disable-site-isolation-trials".to_string(),
            "--disable-features=IsolateOrigins,site-per-process".to_string(),
            "--disable-background-networking".to_string(),
            "--disable-extensions".to_string(),
            "--blink-settings=imagesEnabled=false".to_string(),
            format!("--user-agent={}", settings.user_agent),
        ]);
    builder = if settings.headless {
        builder.new_headless_mode()
    } else {
        builder.with_head()
    };
    if let Some(executable) = &settings.chrome_executable {
        builder = builder.chrome_executable(PathBuf::from(executable));
    }

    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        RenderError::LaunchFailed { source: e.into() }
    })?;

    // 启动浏览器
    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        RenderError::launch_failed(e)
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    let handler_task = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if let Err(e) = event {
                debug!("浏览器事件处理出错: {}", e);
            }
        }
    });

    // 添加短暂延迟以等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    Ok((browser, handler_task))
}
