use std::fmt;

use serde::{Deserialize, Serialize};

/// 抽取目标：一对广告创意 ID 与广告主 ID
///
/// 两个字段都是不透明字符串，读取后保持原样，不做裁剪。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub creative_id: String,
    pub advertiser_id: String,
}

impl Target {
    pub fn new(creative_id: impl Into<String>, advertiser_id: impl Into<String>) -> Self {
        Self {
            creative_id: creative_id.into(),
            advertiser_id: advertiser_id.into(),
        }
    }

    /// 账本中的唯一键：`{creative_id}_{advertiser_id}`
    pub fn key(&self) -> String {
        format!("{}_{}", self.creative_id, self.advertiser_id)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[创意 {} 广告主 {}]", self.creative_id, self.advertiser_id)
    }
}
