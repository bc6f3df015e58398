//! 视频 ID 抽取服务 - 业务能力层
//!
//! 给定一个渲染会话和一个目标：导航 → 反爬检查 → 三层框架遍历 → 读取 src。
//! 所有情况都归类为 [`AttemptOutcome`]，不向上抛错。

use std::time::Duration;

use tracing::debug;

use crate::error::{ConfigError, RenderError};
use crate::infrastructure::{FrameHandle, RenderSession};
use crate::models::{AttemptOutcome, Target};
use crate::services::block_detector::BlockDetector;

/// 外层内容框架
pub const OUTER_FRAME_SELECTOR: &str = r#"iframe[id^="fletch-render"]"#;
/// 内层广告框架
pub const INNER_FRAME_SELECTOR: &str = r#"iframe[id^="google_ad"]"#;
/// 视频框架
pub const MEDIA_FRAME_SELECTOR: &str = r#"iframe[id^="video"]"#;
/// 视频框架上保存嵌入地址的属性
pub const MEDIA_SOURCE_ATTRIBUTE: &str = "src";
/// 嵌入地址中视频 ID 之前的标记
pub const EMBED_MARKER: &str = "youtube.com/embed/";

/// 三层框架各自的等待时间
#[derive(Debug, Clone)]
pub struct FrameWalkTimeouts {
    pub outer: Duration,
    pub inner: Duration,
    pub media: Duration,
}

/// 抽取策略
#[derive(Debug, Clone)]
pub struct ExtractorPolicy {
    /// 含 `{creative_id}` 与 `{advertiser_id}` 占位符的 URL 模板
    pub url_template: String,
    pub navigation_timeout: Duration,
    pub frame_timeouts: FrameWalkTimeouts,
    pub min_body_bytes: usize,
}

/// 视频 ID 抽取器
pub struct Extractor {
    policy: ExtractorPolicy,
    detector: BlockDetector,
}

impl Extractor {
    pub fn new(policy: ExtractorPolicy) -> Result<Self, ConfigError> {
        let detector =
            BlockDetector::new(policy.min_body_bytes).map_err(|e| ConfigError::Invalid {
                field: "block_signatures".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { policy, detector })
    }

    /// 由目标生成页面 URL
    pub fn target_url(&self, target: &Target) -> String {
        self.policy
            .url_template
            .replace("{advertiser_id}", &target.advertiser_id)
            .replace("{creative_id}", &target.creative_id)
    }

    /// 执行一次抽取
    pub async fn extract<S: RenderSession>(
        &self,
        session: &mut S,
        target: &Target,
    ) -> AttemptOutcome {
        match self.walk(session, target).await {
            Ok(outcome) => outcome,
            // 某一层框架没有出现：广告存在但没有视频，或页面结构不同
            Err(e) if e.is_frame_timeout() => {
                debug!("{} {}", target, e);
                AttemptOutcome::NotFound
            }
            Err(e) => AttemptOutcome::TransientError(e.to_string()),
        }
    }

    async fn walk<S: RenderSession>(
        &self,
        session: &mut S,
        target: &Target,
    ) -> Result<AttemptOutcome, RenderError> {
        let url = self.target_url(target);
        let page = session.navigate(&url, self.policy.navigation_timeout).await?;

        // 先做反爬检查，被拦截的页面不会被误判为 NotFound
        if let Some(signal) = self.detector.inspect(&page) {
            return Ok(signal.into_outcome());
        }

        let timeouts = &self.policy.frame_timeouts;
        let outer = session
            .wait_for_frame(&FrameHandle::root(), OUTER_FRAME_SELECTOR, timeouts.outer)
            .await?;
        let inner = session
            .wait_for_frame(&outer, INNER_FRAME_SELECTOR, timeouts.inner)
            .await?;
        let media = session
            .wait_for_frame(&inner, MEDIA_FRAME_SELECTOR, timeouts.media)
            .await?;

        let src = session.read_attribute(&media, MEDIA_SOURCE_ATTRIBUTE).await?;
        debug!("{} 视频框架 src: {:?}", target, src);

        Ok(match src.as_deref().and_then(parse_embed_id) {
            Some(video_id) => AttemptOutcome::Found(video_id.to_string()),
            None => AttemptOutcome::NotFound,
        })
    }
}

/// 从嵌入地址中取出视频 ID：标记之后、第一个 `?` 之前，原样返回
pub fn parse_embed_id(src: &str) -> Option<&str> {
    let (_, rest) = src.split_once(EMBED_MARKER)?;
    let video_id = rest.split('?').next().unwrap_or(rest);
    (!video_id.is_empty()).then_some(video_id)
}
