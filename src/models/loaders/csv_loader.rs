use std::io::ErrorKind;
use std::path::Path;

use tokio::fs;
use tracing::{debug, info};

use crate::error::InputError;
use crate::models::Target;

/// 从 CSV 文件读取抽取目标
///
/// 跳过表头，只使用前两列 (creative_id, advertiser_id)，其余列忽略。
/// 同一文件重复读取得到相同顺序。
pub async fn load_targets(path: impl AsRef<Path>) -> Result<Vec<Target>, InputError> {
    let path = path.as_ref();
    let path_str = path.display().to_string();

    let content = fs::read(path).await.map_err(|e| {
        if e.kind() == ErrorKind::NotFound {
            InputError::NotFound {
                path: path_str.clone(),
            }
        } else {
            InputError::ReadFailed {
                path: path_str.clone(),
                source: csv::Error::from(e),
            }
        }
    })?;

    let targets = parse_targets(&content, &path_str)?;
    info!("✓ 从 {} 读取到 {} 个目标", path_str, targets.len());
    Ok(targets)
}

/// 解析 CSV 内容
pub fn parse_targets(content: &[u8], path: &str) -> Result<Vec<Target>, InputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content);

    let mut targets = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| InputError::Malformed {
            path: path.to_string(),
            line: e.position().map(|p| p.line()).unwrap_or_default(),
            reason: e.to_string(),
        })?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();

        let (creative_id, advertiser_id) = match (record.get(0), record.get(1)) {
            (Some(cr), Some(ar)) => (cr, ar),
            _ => {
                if record.iter().all(str::is_empty) {
                    debug!("跳过空行: 第 {} 行", line);
                    continue;
                }
                return Err(InputError::Malformed {
                    path: path.to_string(),
                    line,
                    reason: format!("需要至少 2 列, 实际 {} 列", record.len()),
                });
            }
        };

        if creative_id.is_empty() && advertiser_id.is_empty() {
            debug!("跳过空行: 第 {} 行", line);
            continue;
        }

        targets.push(Target::new(creative_id, advertiser_id));
    }

    Ok(targets)
}
