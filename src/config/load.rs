use crate::config::types::HighlightConfig;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// 預設設定檔（位於目前工作目錄）
pub const DEFAULT_SETTINGS_FILE: &str = "settings.json";

impl HighlightConfig {
    /// 讀取設定
    ///
    /// 指定路徑時檔案必須存在；未指定時嘗試讀取 `settings.json`，不存在則使用預設值。
    /// 不做範圍檢查，呼叫端套用命令列覆寫後再呼叫 [`HighlightConfig::validate`]。
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::load_from_file(path)?,
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.exists() {
                    Self::load_from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))
    }
}
