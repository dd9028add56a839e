//! mapping.json（実行結果のマニフェスト）

use crate::error::Result;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// SKU 1件分の出力記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    pub sku: String,
    /// 1始まりのページ番号
    pub page: usize,
    /// 画像のオブジェクト番号
    pub xref: u32,
    pub ext: String,
    /// 出力した画像ファイルのパス
    pub file: String,
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// 入力PDFのパス
    pub pdf: String,
    /// PDFの総ページ数
    pub pages: usize,
    /// 実際に処理したページ数（--max-pages 指定時は少なくなる）
    pub processed_pages: usize,
    pub exported: usize,
    pub skipped_pages_no_sku: usize,
    pub skipped_pages_no_image: usize,
    /// SKU → 出力記録（出力順）
    pub items: IndexMap<String, MatchRecord>,
    /// 検出したが出力できなかったSKU（初出順）
    pub unmatched: Vec<String>,
    pub generated_at: String,
}

impl Manifest {
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
