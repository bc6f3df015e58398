//! 反爬页面识别 - 业务能力层
//!
//! 只负责判断"这个页面是不是被拦截了"，不关心后续流程

use regex::{Regex, RegexBuilder};

use crate::infrastructure::PageSnapshot;
use crate::models::AttemptOutcome;

/// 拦截信号
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockSignal {
    /// 限流页面，需要全局退避
    RateLimited(String),
    /// 验证码 / WAF / 边缘拦截 / 异常小的页面
    Suspicious(String),
}

impl BlockSignal {
    pub fn into_outcome(self) -> AttemptOutcome {
        match self {
            BlockSignal::RateLimited(reason) => AttemptOutcome::RateLimited(reason),
            BlockSignal::Suspicious(reason) => AttemptOutcome::Suspicious(reason),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignalKind {
    RateLimited,
    Suspicious,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    /// 只匹配页面标题
    Title,
    /// 标题和正文都匹配
    Anywhere,
}

struct Signature {
    label: &'static str,
    pattern: &'static str,
    scope: Scope,
    kind: SignalKind,
}

/// 固定的拦截特征，按顺序匹配，限流特征优先
const SIGNATURES: &[Signature] = &[
    Signature {
        label: "http_429",
        pattern: r"\b429\b",
        scope: Scope::Title,
        kind: SignalKind::RateLimited,
    },
    Signature {
        label: "too_many_requests",
        pattern: r"too many requests",
        scope: Scope::Anywhere,
        kind: SignalKind::RateLimited,
    },
    Signature {
        label: "rate_limit",
        pattern: r"rate[ -]?limit(ed|ing)?\b",
        scope: Scope::Anywhere,
        kind: SignalKind::RateLimited,
    },
    Signature {
        label: "unusual_traffic",
        pattern: r"unusual traffic from your (computer )?network",
        scope: Scope::Anywhere,
        kind: SignalKind::RateLimited,
    },
    Signature {
        label: "captcha",
        pattern: r"\b(re)?captcha\b|g-recaptcha|hcaptcha",
        scope: Scope::Anywhere,
        kind: SignalKind::Suspicious,
    },
    Signature {
        label: "google_sorry",
        pattern: r"/sorry/index",
        scope: Scope::Anywhere,
        kind: SignalKind::Suspicious,
    },
    Signature {
        label: "robot_check",
        pattern: r"are you a robot|verify (that )?you are (a )?human",
        scope: Scope::Anywhere,
        kind: SignalKind::Suspicious,
    },
    Signature {
        label: "access_denied",
        pattern: r"access denied|request blocked|403 forbidden",
        scope: Scope::Anywhere,
        kind: SignalKind::Suspicious,
    },
    Signature {
        label: "edge_block",
        pattern: r"attention required|cloudflare ray id|cf-error-details|akamai reference",
        scope: Scope::Anywhere,
        kind: SignalKind::Suspicious,
    },
];

/// 拦截页面识别器
pub struct BlockDetector {
    signatures: Vec<(&'static Signature, Regex)>,
    min_body_bytes: usize,
}

impl BlockDetector {
    /// `min_body_bytes`：正文小于该字节数视为可疑，0 表示不检查
    pub fn new(min_body_bytes: usize) -> Result<Self, regex::Error> {
        let signatures = SIGNATURES
            .iter()
            .map(|sig| {
                RegexBuilder::new(sig.pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (sig, re))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            signatures,
            min_body_bytes,
        })
    }

    /// 检查页面，返回命中的第一个拦截信号
    pub fn inspect(&self, page: &PageSnapshot) -> Option<BlockSignal> {
        for (sig, re) in &self.signatures {
            let hit = match sig.scope {
                Scope::Title => re.is_match(&page.title),
                Scope::Anywhere => re.is_match(&page.title) || re.is_match(&page.body),
            };
            if hit {
                let reason = sig.label.to_string();
                return Some(match sig.kind {
                    SignalKind::RateLimited => BlockSignal::RateLimited(reason),
                    SignalKind::Suspicious => BlockSignal::Suspicious(reason),
                });
            }
        }

        if page.body.len() < self.min_body_bytes {
            return Some(BlockSignal::Suspicious(format!(
                "body_too_small ({} bytes)",
                page.body.len()
            )));
        }

        None
    }
}
