use crate::error::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// 既定のSKUパターン（例: FS1003-24, PB0011-180）
pub const DEFAULT_SKU_PATTERN: &str = r"\b[A-Z]{1,3}[0-9]{4}-[0-9]{2,4}\b";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SKU検出用の正規表現
    pub sku_pattern: String,
    /// マニフェストのファイル名（出力ディレクトリ直下）
    pub manifest_file_name: String,
    /// 画像形式タグが無い場合の拡張子
    pub fallback_extension: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sku_pattern: DEFAULT_SKU_PATTERN.into(),
            manifest_file_name: "mapping.json".into(),
            fallback_extension: "png".into(),
        }
    }
}

impl Config {
    /// 既定パスの設定ファイルを読み込む（無ければデフォルト）
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            log::debug!("設定ファイルなし、デフォルトを使用: {}", config_path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(config_path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CatalogError::Config("ホームディレクトリが見つかりません".into()))?;
        Ok(home.join(".config").join("catalog-sku").join("config.json"))
    }

    fn validate(&self) -> Result<()> {
        if self.manifest_file_name.trim().is_empty() {
            return Err(CatalogError::Config("manifest_file_name が空です".into()));
        }
        if self.fallback_extension.contains(['.', '/', '\\']) {
            return Err(CatalogError::Config(format!(
                "fallback_extension が不正: {}",
                self.fallback_extension
            )));
        }
        Ok(())
    }
}
