use std::time::Duration;

use thiserror::Error;

/// 输入表格错误
#[derive(Debug, Error)]
pub enum InputError {
    /// 文件不存在
    #[error("输入文件不存在: {path}")]
    NotFound { path: String },
    /// 读取文件失败
    #[error("读取输入文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: csv::Error,
    },
    /// 行格式不正确（缺少列）
    #[error("输入文件格式错误 ({path} 第 {line} 行): {reason}")]
    Malformed {
        path: String,
        line: u64,
        reason: String,
    },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 配置文件读取失败
    #[error("读取配置文件失败 ({path}): {source}")]
    FileReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML 解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 配置值不合法
    #[error("配置项 {field} 不合法: {reason}")]
    Invalid { field: String, reason: String },
}

/// 渲染引擎错误
///
/// `Timeout` 在抽取流程中被视为"没有可抽取的内容"，其余变体视为暂时性错误。
#[derive(Debug, Error)]
pub enum RenderError {
    /// 启动浏览器失败
    #[error("启动浏览器失败: {source}")]
    LaunchFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    /// 导航失败
    #[error("导航到 {url} 失败: {reason}")]
    NavigationFailed { url: String, reason: String },
    /// 导航超时
    #[error("导航到 {url} 超时 ({waited:?})")]
    NavigationTimeout { url: String, waited: Duration },
    /// 等待子框架超时
    #[error("等待框架 {selector} 超时 ({waited:?})")]
    Timeout { selector: String, waited: Duration },
    /// 框架已分离或无法访问
    #[error("框架 {selector} 已分离或无法访问")]
    Detached { selector: String },
    /// 执行脚本失败
    #[error("执行脚本失败: {reason}")]
    ScriptFailed { reason: String },
}

impl RenderError {
    /// 创建启动错误
    pub fn launch_failed(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        RenderError::LaunchFailed {
            source: Box::new(source),
        }
    }

    /// 创建导航错误
    pub fn navigation_failed(url: impl Into<String>, reason: impl ToString) -> Self {
        RenderError::NavigationFailed {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// 创建脚本执行错误
    pub fn script_failed(reason: impl ToString) -> Self {
        RenderError::ScriptFailed {
            reason: reason.to_string(),
        }
    }

    /// 是否为框架等待超时
    pub fn is_frame_timeout(&self) -> bool {
        matches!(self, RenderError::Timeout { .. })
    }
}

impl From<chromiumoxide::error::CdpError> for RenderError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        RenderError::script_failed(err)
    }
}

impl From<serde_json::Error> for RenderError {
    fn from(err: serde_json::Error) -> Self {
        RenderError::script_failed(err)
    }
}

/// 会话池错误
#[derive(Debug, Error)]
pub enum PoolError {
    /// 启动时一个会话都没有创建成功
    #[error("会话池初始化失败: 请求 {requested} 个会话, 全部创建失败")]
    NoSessions { requested: usize },
    /// 临时会话创建失败
    #[error("创建临时会话失败: {0}")]
    ThrowawayFailed(#[source] RenderError),
}

/// 进度文件错误
#[derive(Debug, Error)]
pub enum CheckpointError {
    /// 序列化失败
    #[error("序列化进度失败: {0}")]
    Serialize(#[from] serde_json::Error),
    /// 写入失败
    #[error("写入进度文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 账本任务已退出
    #[error("账本任务已关闭")]
    LedgerClosed,
}

/// 结果表格输出错误
#[derive(Debug, Error)]
pub enum OutputError {
    /// 写入 CSV 失败
    #[error("写入结果文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: csv::Error,
    },
    /// 刷新文件失败
    #[error("刷新结果文件失败 ({path}): {source}")]
    FlushFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
