//! SKUトークンの検出

use crate::config::DEFAULT_SKU_PATTERN;
use crate::error::Result;
use regex::Regex;

lazy_static::lazy_static! {
    static ref DEFAULT_SKU_RE: Regex = Regex::new(DEFAULT_SKU_PATTERN).unwrap();
}

#[derive(Debug, Clone)]
pub struct SkuScanner {
    pattern: Regex,
}

impl Default for SkuScanner {
    fn default() -> Self {
        Self {
            pattern: DEFAULT_SKU_RE.clone(),
        }
    }
}

impl SkuScanner {
    pub fn new(pattern: &str) -> Result<Self> {
        if pattern == DEFAULT_SKU_PATTERN {
            return Ok(Self::default());
        }
        Ok(Self {
            pattern: Regex::new(pattern)?,
        })
    }

    /// テキスト中のSKUを初出順・重複なしで返す
    pub fn scan(&self, text: &str) -> Vec<String> {
        let mut skus: Vec<String> = Vec::new();
        for m in self.pattern.find_iter(text) {
            if !skus.iter().any(|s| s == m.as_str()) {
                skus.push(m.as_str().to_string());
            }
        }
        skus
    }
}
