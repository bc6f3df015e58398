use std::fmt;

/// 单次抽取尝试的结果
///
/// 每次尝试恰好产生一个结果，各变体互斥，没有优先级之分。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// 找到视频 ID
    Found(String),
    /// 页面正常，但没有可抽取的视频
    NotFound,
    /// 命中限流页面
    RateLimited(String),
    /// 命中验证码 / WAF / 异常小的页面
    Suspicious(String),
    /// 导航失败、框架分离等暂时性错误
    TransientError(String),
}

impl AttemptOutcome {
    /// 用于日志与统计的短标签
    pub fn label(&self) -> &'static str {
        match self {
            AttemptOutcome::Found(_) => "found",
            AttemptOutcome::NotFound => "not_found",
            AttemptOutcome::RateLimited(_) => "rate_limited",
            AttemptOutcome::Suspicious(_) => "suspicious",
            AttemptOutcome::TransientError(_) => "transient_error",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttemptOutcome::Found(id) => write!(f, "找到视频 {}", id),
            AttemptOutcome::NotFound => write!(f, "未找到视频"),
            AttemptOutcome::RateLimited(reason) => write!(f, "被限流: {}", reason),
            AttemptOutcome::Suspicious(reason) => write!(f, "可疑页面: {}", reason),
            AttemptOutcome::TransientError(reason) => write!(f, "暂时性错误: {}", reason),
        }
    }
}
