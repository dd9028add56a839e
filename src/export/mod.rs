pub mod manifest;

pub use manifest::{Manifest, MatchRecord};

use crate::error::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// 出力ディレクトリを（再帰的に）用意する
pub fn prepare_output_dir(dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    Ok(())
}

/// `<dir>/<SKU>.<ext>` のパス
pub fn image_path(dir: &Path, sku: &str, ext: &str) -> PathBuf {
    dir.join(format!("{}.{}", sku, ext))
}

/// 画像バイト列をそのまま書き出す（再エンコードしない）
pub fn write_image(dir: &Path, sku: &str, ext: &str, bytes: &[u8]) -> Result<PathBuf> {
    let path = image_path(dir, sku, ext);
    let file = File::create(&path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(bytes)?;
    writer.flush()?;
    Ok(path)
}
