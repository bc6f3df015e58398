//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"和"探测嵌套框架"的能力

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::RenderError;

/// 框架探测状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// 路径上的元素全部找到
    Found,
    /// 某一层还没有出现
    Missing,
    /// 某一层框架存在但无法进入其文档
    Detached,
}

/// 框架探测结果
#[derive(Debug, Clone, Deserialize)]
pub struct FrameProbe {
    pub status: ProbeStatus,
    /// `Found` 时为 `on_found` 返回的值，`Detached` 时为无法进入的选择器
    #[serde(default)]
    pub value: Option<String>,
}

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval_as() 能力
/// - 按选择器路径逐层进入 contentDocument
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于导航等操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(
        &self,
        js_code: impl Into<String>,
    ) -> Result<T, RenderError> {
        let result = self.page.evaluate(js_code.into()).await?;
        Ok(result.into_value()?)
    }

    /// 沿 `path` 探测一次嵌套框架
    ///
    /// 找到路径上最后一个元素后执行 `on_found`，其中可使用变量 `el`，
    /// 需要返回 `{ status: "found", value }`。
    pub async fn probe_frame(&self, path: &[String], on_found: &str) -> Result<FrameProbe, RenderError> {
        let script = frame_walk_script(path, on_found)?;
        self.eval_as(script).await
    }
}

fn frame_walk_script(path: &[String], on_found: &str) -> Result<String, RenderError> {
    let path_json = serde_json::to_string(path)?;
    Ok(format!(
        r#"
        (() => {{
            const path = {path_json};
            let doc = document;
            for (let i = 0; i < path.length; i++) {{
                const el = doc.querySelector(path[i]);
                if (!el) {{
                    return {{ status: "missing" }};
                }}
                if (i === path.length - 1) {{
                    {on_found}
                }}
                if (!el.contentDocument) {{
                    return {{ status: "detached", value: path[i] }};
                }}
                doc = el.contentDocument;
            }}
            return {{ status: "missing" }};
        }})()
        "#
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_script_embeds_selectors_as_json() {
        let path = vec![r#"iframe[id^="fletch-render"]"#.to_string()];
        let script = frame_walk_script(&path, "return 1;").unwrap();
        assert!(script.contains(r#"["iframe[id^=\"fletch-render\"]"]"#));
        assert!(script.contains("return 1;"));
    }

    #[test]
    fn probe_statuses_parse_from_lowercase() {
        let probe: FrameProbe =
            serde_json::from_str(r#"{"status": "detached", "value": "iframe#x"}"#).unwrap();
        assert_eq!(probe.status, ProbeStatus::Detached);
        assert_eq!(probe.value.as_deref(), Some("iframe#x"));

        let probe: FrameProbe = serde_json::from_str(r#"{"status": "missing"}"#).unwrap();
        assert_eq!(probe.status, ProbeStatus::Missing);
        assert!(probe.value.is_none());
    }
}
