use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::browser::BrowserSettings;
use crate::error::ConfigError;
use crate::infrastructure::PoolSettings;
use crate::orchestrator::SchedulerPolicy;
use crate::services::{ExtractorPolicy, FrameWalkTimeouts};

/// 程序配置文件
///
/// 取值优先级：环境变量 > `CONFIG_FILE` 指向的 TOML 文件 > 默认值
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 输入表格（creative_id, advertiser_id, ...）
    pub input_file: String,
    /// 输出表格
    pub output_file: String,
    /// 进度文件，未设置时由输入文件名推导
    pub checkpoint_file: Option<String>,
    /// 同时进行的抽取任务数量
    pub max_workers: usize,
    /// 浏览器会话池容量
    pub pool_size: usize,
    /// 从会话池获取会话的最长等待时间
    pub pool_acquire_timeout_ms: u64,
    /// 每完成多少次尝试保存一次进度
    pub checkpoint_interval: usize,
    /// 每完成多少次尝试输出一次进度
    pub progress_interval: usize,
    // --- 节流 / 退避 ---
    pub pacing_min_ms: u64,
    pub pacing_max_ms: u64,
    pub rate_limit_cooldown_ms: u64,
    // --- 抽取 ---
    pub url_template: String,
    pub navigation_timeout_ms: u64,
    pub outer_frame_timeout_ms: u64,
    pub inner_frame_timeout_ms: u64,
    pub media_frame_timeout_ms: u64,
    /// 页面正文小于该字节数时视为可疑
    pub min_body_bytes: usize,
    // --- 浏览器 ---
    pub headless: bool,
    pub chrome_executable: Option<String>,
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    /// 不下载的资源扩展名
    pub blocked_extensions: Vec<String>,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_file: "targets.csv".to_string(),
            output_file: "video_ids.csv".to_string(),
            checkpoint_file: None,
            max_workers: 5,
            pool_size: 3,
            pool_acquire_timeout_ms: 30_000,
            checkpoint_interval: 25,
            progress_interval: 10,
            pacing_min_ms: 250,
            pacing_max_ms: 750,
            rate_limit_cooldown_ms: 60_000,
            url_template:
                "https://adstransparency.google.com/advertiser/{advertiser_id}/creative/{creative_id}"
                    .to_string(),
            navigation_timeout_ms: 20_000,
            outer_frame_timeout_ms: 2_500,
            inner_frame_timeout_ms: 500,
            media_frame_timeout_ms: 500,
            min_body_bytes: 1024,
            headless: true,
            chrome_executable: None,
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36".to_string(),
            viewport_width: 1280,
            viewport_height: 720,
            blocked_extensions: [
                "png", "jpg", "jpeg", "gif", "svg", "css", "woff", "woff2", "mp4", "webm", "avi",
                "mov",
            ]
            .iter()
            .map(|ext| ext.to_string())
            .collect(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 加载配置：可选的 TOML 文件，再叠加环境变量，最后校验
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var("CONFIG_FILE") {
            Ok(path) if !path.is_empty() => Self::from_toml_file(&path)?,
            _ => Self::default(),
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// 只使用默认值和环境变量
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    /// 从 TOML 文件读取配置，缺省字段使用默认值
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::TomlParseFailed {
            path: path.display().to_string(),
            source,
        })
    }

    fn with_env_overrides(self) -> Result<Self, ConfigError> {
        Ok(Self {
            input_file: env_string("INPUT_FILE").unwrap_or(self.input_file),
            output_file: env_string("OUTPUT_FILE").unwrap_or(self.output_file),
            checkpoint_file: env_string("CHECKPOINT_FILE").or(self.checkpoint_file),
            max_workers: env_parse("MAX_WORKERS", self.max_workers)?,
            pool_size: env_parse("POOL_SIZE", self.pool_size)?,
            pool_acquire_timeout_ms: env_parse("POOL_ACQUIRE_TIMEOUT_MS", self.pool_acquire_timeout_ms)?,
            checkpoint_interval: env_parse("CHECKPOINT_INTERVAL", self.checkpoint_interval)?,
            progress_interval: env_parse("PROGRESS_INTERVAL", self.progress_interval)?,
            pacing_min_ms: env_parse("PACING_MIN_MS", self.pacing_min_ms)?,
            pacing_max_ms: env_parse("PACING_MAX_MS", self.pacing_max_ms)?,
            rate_limit_cooldown_ms: env_parse("RATE_LIMIT_COOLDOWN_MS", self.rate_limit_cooldown_ms)?,
            url_template: env_string("URL_TEMPLATE").unwrap_or(self.url_template),
            navigation_timeout_ms: env_parse("NAVIGATION_TIMEOUT_MS", self.navigation_timeout_ms)?,
            outer_frame_timeout_ms: env_parse("OUTER_FRAME_TIMEOUT_MS", self.outer_frame_timeout_ms)?,
            inner_frame_timeout_ms: env_parse("INNER_FRAME_TIMEOUT_MS", self.inner_frame_timeout_ms)?,
            media_frame_timeout_ms: env_parse("MEDIA_FRAME_TIMEOUT_MS", self.media_frame_timeout_ms)?,
            min_body_bytes: env_parse("MIN_BODY_BYTES", self.min_body_bytes)?,
            headless: env_parse("HEADLESS", self.headless)?,
            chrome_executable: env_string("CHROME_EXECUTABLE").or(self.chrome_executable),
            user_agent: env_string("USER_AGENT").unwrap_or(self.user_agent),
            viewport_width: env_parse("VIEWPORT_WIDTH", self.viewport_width)?,
            viewport_height: env_parse("VIEWPORT_HEIGHT", self.viewport_height)?,
            blocked_extensions: env_string("BLOCKED_EXTENSIONS")
                .map(|list| list.split(',').map(|ext| ext.trim().to_string()).collect())
                .unwrap_or(self.blocked_extensions),
            verbose_logging: env_parse("VERBOSE_LOGGING", self.verbose_logging)?,
        })
    }

    /// 校验配置取值
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_workers == 0 {
            return Err(invalid("max_workers", "必须大于 0"));
        }
        if self.pool_size == 0 {
            return Err(invalid("pool_size", "必须大于 0"));
        }
        if self.checkpoint_interval == 0 {
            return Err(invalid("checkpoint_interval", "必须大于 0"));
        }
        if self.pacing_min_ms > self.pacing_max_ms {
            return Err(invalid(
                "pacing_min_ms",
                format!("{} 大于 pacing_max_ms {}", self.pacing_min_ms, self.pacing_max_ms),
            ));
        }
        for placeholder in ["{creative_id}", "{advertiser_id}"] {
            if !self.url_template.contains(placeholder) {
                return Err(invalid("url_template", format!("缺少占位符 {}", placeholder)));
            }
        }
        Ok(())
    }

    /// 进度文件路径，默认与输入文件同目录：`<input>_progress.json`
    pub fn checkpoint_path(&self) -> String {
        if let Some(path) = &self.checkpoint_file {
            return path.clone();
        }
        let input = Path::new(&self.input_file);
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "targets".to_string());
        input
            .with_file_name(format!("{}_progress.json", stem))
            .to_string_lossy()
            .to_string()
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            capacity: self.pool_size,
            acquire_timeout: Duration::from_millis(self.pool_acquire_timeout_ms),
        }
    }

    pub fn extractor_policy(&self) -> ExtractorPolicy {
        ExtractorPolicy {
            url_template: self.url_template.clone(),
            navigation_timeout: Duration::from_millis(self.navigation_timeout_ms),
            frame_timeouts: FrameWalkTimeouts {
                outer: Duration::from_millis(self.outer_frame_timeout_ms),
                inner: Duration::from_millis(self.inner_frame_timeout_ms),
                media: Duration::from_millis(self.media_frame_timeout_ms),
            },
            min_body_bytes: self.min_body_bytes,
        }
    }

    pub fn scheduler_policy(&self) -> SchedulerPolicy {
        SchedulerPolicy {
            max_workers: self.max_workers,
            pacing_min: Duration::from_millis(self.pacing_min_ms),
            pacing_max: Duration::from_millis(self.pacing_max_ms),
            cooldown: Duration::from_millis(self.rate_limit_cooldown_ms),
            progress_interval: self.progress_interval.max(1),
        }
    }

    pub fn browser_settings(&self) -> BrowserSettings {
        BrowserSettings {
            headless: self.headless,
            chrome_executable: self.chrome_executable.clone(),
            user_agent: self.user_agent.clone(),
            request_timeout: Duration::from_millis(self.navigation_timeout_ms),
            viewport_width: self.viewport_width,
            viewport_height: self.viewport_height,
            blocked_extensions: self.blocked_extensions.clone(),
        }
    }
}

fn env_string(var_name: &str) -> Option<String> {
    std::env::var(var_name).ok().filter(|v| !v.is_empty())
}

fn env_parse<T: FromStr>(var_name: &str, default: T) -> Result<T, ConfigError> {
    match env_string(var_name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::EnvVarParseFailed {
            var_name: var_name.to_string(),
            value,
            expected_type: std::any::type_name::<T>().to_string(),
        }),
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field: field.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn default_frame_waits_stay_short() {
        let timeouts = Config::default().extractor_policy().frame_timeouts;
        assert_eq!(timeouts.outer, Duration::from_millis(2_500));
        assert_eq!(timeouts.inner, Duration::from_millis(500));
        assert_eq!(timeouts.media, Duration::from_millis(500));
    }

    #[test]
    fn default_browser_blocks_media_and_styles() {
        let browser = Config::default().browser_settings();
        assert_eq!((browser.viewport_width, browser.viewport_height), (1280, 720));
        let patterns = browser.blocked_url_patterns();
        for ext in ["png", "css", "woff2", "mp4", "mov"] {
            assert!(patterns.contains(&format!("*.{}*", ext)), "缺少 {}", ext);
        }
    }

    #[test]
    fn checkpoint_path_follows_input_file() {
        let config = Config {
            input_file: "data/ads_2024.csv".to_string(),
            ..Config::default()
        };
        assert_eq!(config.checkpoint_path(), "data/ads_2024_progress.json");
    }

    #[test]
    fn rejects_inverted_pacing_range() {
        let config = Config {
            pacing_min_ms: 900,
            pacing_max_ms: 100,
            ..Config::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Invalid { field, .. }) if field == "pacing_min_ms"
        ));
    }

    #[test]
    fn rejects_template_without_placeholders() {
        let config = Config {
            url_template: "https://example.com/{creative_id}".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_overrides_only_given_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scrape.toml");
        std::fs::write(&path, "max_workers = 8\npool_size = 4\nheadless = false\n").unwrap();

        let config = Config::from_toml_file(&path).unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.pool_size, 4);
        assert!(!config.headless);
        assert_eq!(config.checkpoint_interval, Config::default().checkpoint_interval);
    }
}
