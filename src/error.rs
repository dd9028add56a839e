use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("設定エラー: {0}")]
    Config(String),

    #[error("PDFを開けません: {path}: {source}")]
    PdfOpen {
        path: String,
        #[source]
        source: lopdf::Error,
    },

    #[error("PDF解析エラー: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("ページ番号が範囲外です: {index} (全{count}ページ)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("画像オブジェクトが見つかりません: xref {0}")]
    ImageNotFound(u32),

    #[error("未対応の画像形式: xref {xref}: {reason}")]
    UnsupportedImage { xref: u32, reason: String },

    #[error("PNG変換エラー: {0}")]
    ImageEncode(#[from] image::ImageError),

    #[error("SKUパターンが不正: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("JSON解析エラー: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("IOエラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;
